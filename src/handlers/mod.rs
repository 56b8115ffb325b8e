//! HTTP request handlers.

pub mod files;
