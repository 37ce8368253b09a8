//! XML-RPC binding.

mod client;
pub mod codec;
mod value;

pub use client::{
    XmlRpcClient, REQUIRED_EPOCH, REQUIRED_MAJOR, REQUIRED_MINOR, REQUIRED_REVISION,
    REQUIRED_WIKI_RPC_VERSION,
};
pub use value::Value;
