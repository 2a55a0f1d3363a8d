//! Wire types and generated service stubs for the `dfs` package.

mod messages;

pub use messages::*;

include!(concat!(env!("OUT_DIR"), "/dfs.DataNode.rs"));
include!(concat!(env!("OUT_DIR"), "/dfs.Master.rs"));
