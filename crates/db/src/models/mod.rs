//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row plus the DTOs used to insert or patch it.

pub mod template;
