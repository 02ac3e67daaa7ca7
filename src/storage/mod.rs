//! Storage module
//!
//! On-disk document storage for uploaded job files.

pub mod document_store;

pub use document_store::{DocumentKind, DocumentStore};
