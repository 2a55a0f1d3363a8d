//! Common utilities and types shared across the data node

pub mod config;
pub mod error;
pub mod metadata;
pub mod utils;

pub use self::config::{DataNodeConfig, NodeIdentity};
pub use error::{Error, Result};
pub use metadata::CallOrigin;
pub use utils::{
    discover_local_ip, format_bytes, http_endpoint, upload_dir_name, validate_file_name,
};
