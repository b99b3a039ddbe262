//! `nvp-bridge`: authenticated name-value-pair calls to a remote payment API.
//!
//! The bridge is a thin primitive: it validates its configuration once,
//! gates every call through an enable switch and a method whitelist, sends a
//! single TLS-verified HTTPS POST and hands back the decoded response.
//! Interpreting the response, and any retry policy, belongs to the caller.
//!
//! ```no_run
//! use nvp_bridge::{ApiRequest, Bridge, BridgeConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BridgeConfig::from_env()?;
//! let bridge = Bridge::new(config)?;
//!
//! let resp = bridge
//!     .call_api(
//!         ApiRequest::new("SetExpressCheckout")
//!             .param("PAYMENTREQUEST_0_AMT", "299.00")
//!             .param("PAYMENTREQUEST_0_CURRENCYCODE", "USD"),
//!     )
//!     .await?;
//! println!("token: {:?}", resp.get("TOKEN"));
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod config;
pub mod debug;
pub mod telemetry;
pub mod tls;
pub mod transport;

pub use bridge::Bridge;
pub use config::{BridgeConfig, Credentials, RawConfig, Whitelist};
pub use debug::{DebugSink, DebugTrace, FileDebugSink, TracingDebugSink};
pub use transport::{HttpsTransport, OutboundRequest, Transport, TransportResponse};

pub use common::{
    ApiRequest, ApiResponse, BridgeError, ConfigError, EndpointMode, ErrorCategory, NvpMap,
    TransportError, TransportErrorKind,
};
