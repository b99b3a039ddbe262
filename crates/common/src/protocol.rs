//! Request and response values exchanged between a caller and the bridge.
//!
//! Both are built fresh for every call and never retained by the bridge.

use std::fmt;
use std::net::SocketAddr;

use crate::nvp::NvpMap;

// ---------------------------------------------------------------------------
// Endpoint selection
// ---------------------------------------------------------------------------

/// Sandbox NVP endpoint.
pub const SANDBOX_ENDPOINT: &str = "https://api-3t.sandbox.paypal.com/nvp";

/// Live NVP endpoint.
pub const LIVE_ENDPOINT: &str = "https://api-3t.paypal.com/nvp";

/// Which of the two fixed remote endpoints the bridge talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointMode {
    Sandbox,
    Live,
}

impl EndpointMode {
    /// Parse the configuration spelling. Only the exact lowercase names are accepted.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sandbox" => Some(EndpointMode::Sandbox),
            "live" => Some(EndpointMode::Live),
            _ => None,
        }
    }

    /// Fixed HTTPS URL of this endpoint.
    pub fn url(self) -> &'static str {
        match self {
            EndpointMode::Sandbox => SANDBOX_ENDPOINT,
            EndpointMode::Live => LIVE_ENDPOINT,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EndpointMode::Sandbox => "sandbox",
            EndpointMode::Live => "live",
        }
    }
}

impl fmt::Display for EndpointMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A single API call: the remote method name and its caller-supplied fields.
///
/// `METHOD`, `VERSION` and the credential fields are added by the bridge; any
/// caller parameter with one of those names is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    /// Remote API method, e.g. `SetExpressCheckout`.
    pub method: String,
    /// Caller fields, sent after the fixed fields in key order.
    pub params: NvpMap,
    /// Network address of whoever triggered the call, recorded in debug traces.
    pub caller: Option<SocketAddr>,
}

impl ApiRequest {
    /// Create a request for `method` with no parameters.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params: NvpMap::new(),
            caller: None,
        }
    }

    /// Add (or replace) one parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add all parameters from `params`, replacing existing keys.
    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Record the address of the party the call is made on behalf of.
    pub fn caller(mut self, addr: SocketAddr) -> Self {
        self.caller = Some(addr);
        self
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Decoded response of a successful exchange.
///
/// The bridge does not interpret any field; checking `ACK` and friends is up
/// to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    fields: NvpMap,
    endpoint: EndpointMode,
    status: u16,
}

impl ApiResponse {
    pub fn new(fields: NvpMap, endpoint: EndpointMode, status: u16) -> Self {
        Self {
            fields,
            endpoint,
            status,
        }
    }

    /// Look up a single response field.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn fields(&self) -> &NvpMap {
        &self.fields
    }

    pub fn into_fields(self) -> NvpMap {
        self.fields
    }

    /// Endpoint that served this response.
    pub fn endpoint(&self) -> EndpointMode {
        self.endpoint
    }

    /// HTTP status line code of the exchange.
    pub fn status(&self) -> u16 {
        self.status
    }
}
