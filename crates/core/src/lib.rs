//! Domain logic for pagekit.
//!
//! Everything in this crate is synchronous and free of database access:
//! archive validation and extraction, the builder markup converter, the
//! on-disk template store, and the MIME lookup used when serving files.

pub mod archive;
pub mod converter;
pub mod error;
pub mod mime;
pub mod storage;
pub mod template;
pub mod types;
