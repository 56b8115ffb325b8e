//! Metadata store engines.

pub mod memory;
pub mod store;
pub mod workers_kv;
