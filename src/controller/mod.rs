//! API Controller modules

pub mod admin;
pub mod metric;
pub mod summary;
pub mod version;
