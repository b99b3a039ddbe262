//! Common types, wire codec, and errors shared across `nvp-bridge` crates.

pub mod error;
pub mod nvp;
pub mod protocol;

pub use error::{BridgeError, ConfigError, ErrorCategory, TransportError, TransportErrorKind};
pub use nvp::NvpMap;
pub use protocol::{ApiRequest, ApiResponse, EndpointMode};
