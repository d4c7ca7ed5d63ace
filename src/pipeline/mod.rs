//! Pipeline stages for markdown-to-docx migration.
//!
//! Each submodule implements one step and talks to the platform only through
//! [`crate::platform::DocumentPlatform`], so every stage can be driven by an
//! in-memory fake.
//!
//! ## Data Flow
//!
//! ```text
//! auth ──▶ ingest ──▶ upload ──▶ import ──▶ binder ──▶ cleanup
//! (token)  (local md)  (.md file) (docx job) (images)  (delete / compensate)
//! ```
//!
//! 1. [`auth`]    — exchange app credentials for a tenant token, once
//! 2. [`ingest`]  — read the markdown and collect local image references
//! 3. [`upload`]  — upload the raw markdown, optionally into a new folder
//! 4. [`import`]  — create the conversion job and poll it to a document token
//! 5. [`binder`]  — bind each local image to its placeholder block, in order;
//!    [`media`] reads the bytes and pixel size
//! 6. [`cleanup`] — delete the intermediate upload, or roll everything back

pub mod auth;
pub mod binder;
pub mod cleanup;
pub mod import;
pub mod ingest;
pub mod media;
pub mod upload;
