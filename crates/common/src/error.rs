//! Error taxonomy shared across crates.
//!
//! Every error carries a stable numeric code so callers can branch on it
//! programmatically. Codes stay at 599 and below so that higher-level layers
//! built on the bridge can claim the 600+ range for themselves:
//!
//! - `1xx` configuration errors ([`ConfigError`], plus [`BridgeError::Disabled`] at 108)
//! - `2xx` security errors ([`BridgeError::MethodNotWhitelisted`])
//! - `3xx` transport errors: 300 + the curl-compatible native code of the
//!   [`TransportErrorKind`]
//! - `4xx` response decoding errors

use thiserror::Error;

use crate::nvp::NvpError;

/// Configuration could not be turned into a usable bridge.
///
/// Fatal at construction time: no bridge instance exists after one of these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration source itself could not be read or deserialised.
    #[error("configuration source could not be loaded: {0}")]
    Source(String),

    #[error("API credentials are not set properly")]
    CredentialsInvalid,

    #[error("API endpoint and/or API version are not set")]
    EndpointOrVersionMissing,

    /// Only `sandbox` and `live` are accepted.
    #[error("API endpoint {0:?} is invalid; only 'sandbox' and 'live' are allowed")]
    EndpointModeInvalid(String),

    #[error("path to the CA certificate bundle is not set")]
    CaBundleMissing,

    #[error("timeout is not set or is not a positive integer number of seconds")]
    TimeoutInvalid,

    #[error("the debug and/or enabled values are not set")]
    DebugOrEnabledMissing,

    /// The TLS/HTTP client stack cannot be used in this process.
    #[error("HTTPS transport is not available: {0}")]
    TransportUnavailable(String),

    /// The CA bundle path is set but yields no usable trust anchors.
    #[error("CA certificate bundle could not be loaded: {0}")]
    CaBundleInvalid(String),
}

impl ConfigError {
    /// Stable numeric code for this error.
    pub fn code(&self) -> u16 {
        match self {
            ConfigError::Source(_) => 100,
            ConfigError::CredentialsInvalid => 101,
            ConfigError::EndpointOrVersionMissing => 102,
            ConfigError::EndpointModeInvalid(_) => 103,
            ConfigError::CaBundleMissing => 104,
            ConfigError::TimeoutInvalid => 105,
            ConfigError::DebugOrEnabledMissing => 106,
            ConfigError::TransportUnavailable(_) => 107,
            ConfigError::CaBundleInvalid(_) => 109,
        }
    }
}

/// Failure class of an HTTPS exchange.
///
/// The discriminants mirror libcurl's error numbers so that the resulting
/// [`BridgeError::code`] values match what existing callers already branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The request URI or headers could not be built.
    UrlMalformed,
    /// TCP connection to the endpoint could not be established.
    Connect,
    /// The configured timeout elapsed before the exchange completed.
    Timeout,
    /// The TLS handshake failed for a reason other than certificate validation.
    TlsHandshake,
    /// Writing the request failed after the connection was established.
    SendFailed,
    /// Reading the response failed.
    RecvFailed,
    /// The peer certificate or hostname did not verify against the CA bundle.
    PeerVerification,
}

impl TransportErrorKind {
    /// curl-compatible native error number.
    pub fn native_code(self) -> u16 {
        match self {
            TransportErrorKind::UrlMalformed => 3,
            TransportErrorKind::Connect => 7,
            TransportErrorKind::Timeout => 28,
            TransportErrorKind::TlsHandshake => 35,
            TransportErrorKind::SendFailed => 55,
            TransportErrorKind::RecvFailed => 56,
            TransportErrorKind::PeerVerification => 60,
        }
    }
}

/// An HTTPS exchange failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("transport failed ({kind:?}): {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Native code of the underlying failure (see [`TransportErrorKind::native_code`]).
    pub fn native_code(&self) -> u16 {
        self.kind.native_code()
    }
}

/// Coarse classification used to decide how a caller can recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Fatal; fix the configuration and rebuild the bridge.
    Configuration,
    /// The requested method is not allowed; pick another one.
    Security,
    /// The bridge is switched off; only reconfiguration helps.
    Disabled,
    /// The exchange failed; the caller may retry at its own discretion.
    Transport,
    /// The remote answered with something that is not a valid NVP body.
    Decode,
}

/// Top-level bridge error type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The bridge is configured as not enabled; no request was sent.
    #[error("the bridge is disabled")]
    Disabled,

    /// Whitelist enforcement is on and the method is not in the allow-set.
    #[error("not authorised to call API method {0:?}")]
    MethodNotWhitelisted(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("malformed API response: {0}")]
    Decode(#[from] NvpError),
}

impl BridgeError {
    /// Stable numeric code for this error.
    pub fn code(&self) -> u16 {
        match self {
            BridgeError::Config(e) => e.code(),
            BridgeError::Disabled => 108,
            BridgeError::MethodNotWhitelisted(_) => 201,
            BridgeError::Transport(e) => 300 + e.native_code(),
            BridgeError::Decode(_) => 401,
        }
    }

    /// Recovery class of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            BridgeError::Config(_) => ErrorCategory::Configuration,
            BridgeError::Disabled => ErrorCategory::Disabled,
            BridgeError::MethodNotWhitelisted(_) => ErrorCategory::Security,
            BridgeError::Transport(_) => ErrorCategory::Transport,
            BridgeError::Decode(_) => ErrorCategory::Decode,
        }
    }
}
