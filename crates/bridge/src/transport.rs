//! Outbound HTTPS exchange.
//!
//! [`Transport`] is the seam between the bridge and the network. The bridge
//! builds a fully encoded [`OutboundRequest`]; the transport performs exactly
//! one POST and reports either the raw response or a classified
//! [`TransportError`]. [`HttpsTransport`] is the production implementation on
//! hyper + rustls.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use common::{ConfigError, TransportError, TransportErrorKind};
use http_body_util::{BodyExt, Full};
use hyper::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use hyper::{Method, Request};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use rustls::ClientConfig;
use zeroize::Zeroizing;

/// MIME type of NVP request bodies.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// One encoded POST, ready to send.
#[derive(Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    /// Absolute HTTPS URL of the endpoint.
    pub url: String,
    /// Form-urlencoded body, credentials included. Wiped on drop.
    pub body: Zeroizing<String>,
    pub user_agent: String,
    /// Upper bound on the whole exchange, response body included.
    pub timeout: Duration,
}

impl fmt::Debug for OutboundRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundRequest")
            .field("url", &self.url)
            .field("body", &format_args!("[REDACTED; {} bytes]", self.body.len()))
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Raw result of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

/// Performs a single HTTPS POST.
///
/// Implementations must not retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError>;
}

// ---------------------------------------------------------------------------
// hyper + rustls implementation
// ---------------------------------------------------------------------------

/// HTTPS-only transport with TLS verification against a fixed root store.
#[derive(Clone)]
pub struct HttpsTransport {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl HttpsTransport {
    /// Build a pooled client from a prepared rustls configuration.
    pub fn new(tls: Arc<ClientConfig>) -> Self {
        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config((*tls).clone())
            .https_only()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { client }
    }

    /// Load the CA bundle at `path` and build a client trusting only it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::CaBundleInvalid`] if the bundle cannot be used.
    pub fn from_ca_bundle(path: &std::path::Path) -> Result<Self, ConfigError> {
        Ok(Self::new(crate::tls::load_client_config(path)?))
    }

    async fn exchange(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
        let req = Request::builder()
            .method(Method::POST)
            .uri(request.url.as_str())
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .header(ACCEPT, "text/plain")
            .header(USER_AGENT, request.user_agent.as_str())
            .body(Full::new(Bytes::copy_from_slice(request.body.as_bytes())))
            .map_err(|e| TransportError::new(TransportErrorKind::UrlMalformed, e.to_string()))?;

        let resp = self.client.request(req).await.map_err(|e| {
            let kind = if e.is_connect() {
                classify(&e).unwrap_or(TransportErrorKind::Connect)
            } else {
                classify(&e).unwrap_or(TransportErrorKind::SendFailed)
            };
            TransportError::new(kind, error_chain(&e))
        })?;

        let status = resp.status().as_u16();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| TransportError::new(TransportErrorKind::RecvFailed, error_chain(&e)))?
            .to_bytes();

        Ok(TransportResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpsTransport {
    async fn post(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
        let timeout = request.timeout;
        match tokio::time::timeout(timeout, self.exchange(request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::new(
                TransportErrorKind::Timeout,
                format!("no complete response within {}s", timeout.as_secs()),
            )),
        }
    }
}

/// Find a TLS or socket level cause in the error chain.
fn classify(err: &(dyn StdError + 'static)) -> Option<TransportErrorKind> {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(tls) = e.downcast_ref::<rustls::Error>() {
            return Some(classify_tls(tls));
        }
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if let Some(tls) = wrapped_tls_error(io) {
                return Some(classify_tls(tls));
            }
            match io.kind() {
                std::io::ErrorKind::TimedOut => return Some(TransportErrorKind::Timeout),
                std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::AddrNotAvailable => return Some(TransportErrorKind::Connect),
                _ => {}
            }
        }
        current = e.source();
    }
    None
}

/// Unwrap nested `io::Error` payloads down to a rustls error.
///
/// hyper-rustls reports handshake failures as `io::Error(Other)` around
/// `io::Error(InvalidData)` around the `rustls::Error`, and `io::Error::source`
/// does not expose the payload.
fn wrapped_tls_error(mut io: &std::io::Error) -> Option<&rustls::Error> {
    loop {
        let inner = io.get_ref()?;
        if let Some(tls) = inner.downcast_ref::<rustls::Error>() {
            return Some(tls);
        }
        io = inner.downcast_ref::<std::io::Error>()?;
    }
}

fn classify_tls(err: &rustls::Error) -> TransportErrorKind {
    match err {
        rustls::Error::InvalidCertificate(_) | rustls::Error::NoCertificatesPresented => {
            TransportErrorKind::PeerVerification
        }
        _ => TransportErrorKind::TlsHandshake,
    }
}

/// Render an error and all of its causes on one line.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}
