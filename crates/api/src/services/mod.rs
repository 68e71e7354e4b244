//! Services shared by handlers and background jobs.

pub mod template_storage;
