//! [`Bridge`]: the request bridge itself.
//!
//! # Call sequence
//!
//! 1. Guard checks: the bridge must be enabled and, if the whitelist is
//!    enforced, the method must be on it. Neither check touches the network.
//! 2. The outbound fields are assembled: `METHOD`, `VERSION`, `USER`, `PWD`,
//!    `SIGNATURE`, then the caller's parameters. Caller parameters never
//!    override the fixed fields.
//! 3. One HTTPS POST through the [`Transport`], bounded by the configured timeout.
//! 4. The response body is decoded into a flat map and returned untouched.
//!
//! # Security invariants
//!
//! - Credentials are **never** logged, traced, or included in error messages.
//! - TLS verification against the configured CA bundle cannot be disabled.
//! - No retry happens at this layer.

use std::sync::Arc;
use std::time::Instant;

use common::{nvp, ApiRequest, ApiResponse, BridgeError, ConfigError};
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::config::{BridgeConfig, Whitelist};
use crate::debug::{DebugSink, DebugTrace, FileDebugSink, TracingDebugSink};
use crate::transport::{HttpsTransport, OutboundRequest, Transport, TransportResponse};

/// Field names filled in by the bridge; callers cannot set them.
pub const RESERVED_FIELDS: [&str; 5] = ["METHOD", "VERSION", "USER", "PWD", "SIGNATURE"];

/// Issues authenticated NVP calls with a fixed, validated configuration.
///
/// Cheap to share behind an `Arc`; concurrent calls only read the
/// configuration.
pub struct Bridge {
    config: BridgeConfig,
    transport: Arc<dyn Transport>,
    debug_sink: Option<Arc<dyn DebugSink>>,
    user_agent: String,
}

impl Bridge {
    /// Build a bridge that talks HTTPS, trusting only the configured CA bundle.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::CaBundleInvalid`] if the bundle cannot be read or
    /// holds no usable certificate.
    pub fn new(config: BridgeConfig) -> Result<Self, ConfigError> {
        let transport = HttpsTransport::from_ca_bundle(config.ca_bundle_path())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Build a bridge on top of any [`Transport`].
    ///
    /// If debug mode is enabled, traces go to the configured debug log file or,
    /// without one, to the `tracing` subscriber.
    pub fn with_transport(config: BridgeConfig, transport: Arc<dyn Transport>) -> Self {
        let debug_sink: Option<Arc<dyn DebugSink>> = if config.debug() {
            Some(match config.debug_log_path() {
                Some(path) => Arc::new(FileDebugSink::new(path)),
                None => Arc::new(TracingDebugSink),
            })
        } else {
            None
        };

        let user_agent = format!(
            "nvp-bridge/{} (using v{} API)",
            env!("CARGO_PKG_VERSION"),
            config.api_version()
        );

        info!(
            endpoint = %config.endpoint(),
            api_version = config.api_version(),
            timeout_secs = config.timeout().as_secs(),
            whitelist = %whitelist_summary(config.whitelist()),
            debug = config.debug(),
            enabled = config.enabled(),
            "bridge ready"
        );

        Self {
            config,
            transport,
            debug_sink,
            user_agent,
        }
    }

    /// Replace the debug sink. Has no effect unless debug mode is enabled.
    pub fn with_debug_sink(mut self, sink: Arc<dyn DebugSink>) -> Self {
        if self.config.debug() {
            self.debug_sink = Some(sink);
        }
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// User agent sent with every request.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Call a remote API method and return its decoded response.
    ///
    /// Occupies the calling task until the exchange completes or the
    /// configured timeout elapses.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::Disabled`] if the bridge is not enabled.
    /// - [`BridgeError::MethodNotWhitelisted`] if the whitelist rejects the method.
    /// - [`BridgeError::Transport`] if the HTTPS exchange fails.
    /// - [`BridgeError::Decode`] if the response is not a valid NVP body.
    pub async fn call_api(&self, request: ApiRequest) -> Result<ApiResponse, BridgeError> {
        self.authorise(&request.method)?;

        let outbound = OutboundRequest {
            url: self.config.endpoint().url().to_owned(),
            body: self.encode(&request),
            user_agent: self.user_agent.clone(),
            timeout: self.config.timeout(),
        };

        let started_at = OffsetDateTime::now_utc();
        let clock = Instant::now();
        let mut transport_log = vec![format!(
            "POST {} ({} bytes)",
            outbound.url,
            outbound.body.len()
        )];

        let result = self.transport.post(outbound).await;
        let elapsed = clock.elapsed();

        match &result {
            Ok(resp) => transport_log.push(format!("HTTP {} ({} bytes)", resp.status, resp.body.len())),
            Err(e) => transport_log.push(format!("error {}: {}", e.native_code(), e.message)),
        }

        if let Some(sink) = &self.debug_sink {
            let trace = DebugTrace {
                method: request.method.clone(),
                endpoint: self.config.endpoint(),
                caller: request.caller,
                started_at,
                finished_at: OffsetDateTime::now_utc(),
                elapsed,
                transport_log,
            };
            if let Err(e) = sink.record(&trace) {
                warn!(error = %e, method = %request.method, "failed to record debug trace");
            }
        }

        debug!(
            method = %request.method,
            elapsed_secs = elapsed.as_secs_f64(),
            ok = result.is_ok(),
            "API call finished"
        );

        let TransportResponse { status, body } = result?;
        if !(200..300).contains(&status) {
            warn!(method = %request.method, status, "API endpoint returned non-success HTTP status");
        }

        let fields = nvp::decode(&body)?;
        Ok(ApiResponse::new(fields, self.config.endpoint(), status))
    }

    fn authorise(&self, method: &str) -> Result<(), BridgeError> {
        if !self.config.enabled() {
            return Err(BridgeError::Disabled);
        }
        if !self.config.whitelist().permits(method) {
            warn!(method, "API method rejected by whitelist");
            return Err(BridgeError::MethodNotWhitelisted(method.to_owned()));
        }
        Ok(())
    }

    /// Fixed fields first, then caller parameters minus any reserved names.
    fn encode(&self, request: &ApiRequest) -> Zeroizing<String> {
        let credentials = self.config.credentials();
        let fixed = [
            ("METHOD", request.method.as_str()),
            ("VERSION", self.config.api_version()),
            ("USER", credentials.user()),
            ("PWD", credentials.password()),
            ("SIGNATURE", credentials.signature()),
        ];

        let caller = request.params.iter().filter_map(|(key, value)| {
            if RESERVED_FIELDS.contains(&key.as_str()) {
                warn!(field = %key, "ignoring caller parameter that shadows a reserved field");
                None
            } else {
                Some((key.as_str(), value.as_str()))
            }
        });

        Zeroizing::new(nvp::encode(fixed.into_iter().chain(caller)))
    }
}

fn whitelist_summary(whitelist: &Whitelist) -> String {
    match whitelist {
        Whitelist::Enforced(allowed) if allowed.is_empty() => "deny-all".into(),
        Whitelist::Enforced(allowed) => format!("{} methods", allowed.len()),
        Whitelist::Disabled => "off".into(),
    }
}
