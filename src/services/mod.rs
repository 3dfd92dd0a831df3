//! Request resolution and listing aggregation.

pub mod http_date;
pub mod listing;
pub mod mount_table;
pub mod object_server;
pub mod readme_cache;
pub mod version;
