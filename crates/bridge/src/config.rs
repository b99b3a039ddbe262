//! Configuration loading and validation for the bridge.
//!
//! [`RawConfig`] is what a configuration source hands over: every value is
//! optional and unchecked. [`BridgeConfig::validate`] consumes it and either
//! returns a fully populated, immutable [`BridgeConfig`] or the first
//! [`ConfigError`] found. The raw value is moved into validation and is not
//! `Clone`; credential strings are held in [`Zeroizing`] buffers from the
//! moment they are read, so they are wiped on every path, failed validation
//! included.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use common::{ConfigError, EndpointMode};
use serde::{Deserialize, Deserializer};
use zeroize::Zeroizing;

/// Environment variable prefix used by [`RawConfig::from_env`].
pub const ENV_PREFIX: &str = "NVP_BRIDGE";

// ---------------------------------------------------------------------------
// Raw configuration
// ---------------------------------------------------------------------------

/// Unvalidated configuration values, as supplied by a configuration source.
#[derive(Deserialize)]
pub struct RawConfig {
    /// API user name. **Required.**
    pub user: Option<Zeroizing<String>>,

    /// API password. **Required.**
    pub password: Option<Zeroizing<String>>,

    /// API signature. **Required.**
    pub signature: Option<Zeroizing<String>>,

    /// `sandbox` or `live`. **Required.**
    pub endpoint: Option<String>,

    /// Remote API version sent as `VERSION`, e.g. `"74.0"`. **Required.**
    pub api_version: Option<String>,

    /// PEM bundle of trusted CA certificates. **Required.**
    pub ca_bundle_path: Option<String>,

    /// Hard upper bound on a single call, whole seconds. **Required.**
    pub timeout_secs: Option<String>,

    /// Anything other than exactly `false` enforces the whitelist.
    pub enforce_whitelist: Option<String>,

    /// Methods the bridge may call when the whitelist is enforced.
    #[serde(default, deserialize_with = "method_list")]
    pub api_method_whitelist: Option<Vec<String>>,

    /// `true` enables per-call debug traces. **Required.**
    pub debug: Option<String>,

    /// `true` enables the bridge; anything else disables every call. **Required.**
    pub enabled: Option<String>,

    /// Append-only file receiving debug traces.
    pub debug_log_path: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

/// Accepts either a list or a comma separated string.
fn method_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MethodList {
        List(Vec<String>),
        Csv(String),
    }

    Ok(Option::<MethodList>::deserialize(deserializer)?.map(|list| match list {
        MethodList::List(items) => items,
        MethodList::Csv(csv) => csv.split(',').map(str::to_owned).collect(),
    }))
}

impl RawConfig {
    /// Load raw values from `NVP_BRIDGE_*` environment variables.
    ///
    /// Only reads; nothing is checked here beyond deserialisation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Source`] if the environment cannot be read or
    /// deserialised.
    pub fn from_env() -> Result<Self, ConfigError> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .map_err(|e| {
                ConfigError::Source(format!("failed to build configuration from environment: {e}"))
            })?;

        cfg.try_deserialize()
            .map_err(|e| ConfigError::Source(format!("failed to deserialise configuration: {e}")))
    }
}

impl fmt::Debug for RawConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawConfig")
            .field("user", &self.user.as_deref())
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("signature", &self.signature.as_ref().map(|_| "[REDACTED]"))
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .field("ca_bundle_path", &self.ca_bundle_path)
            .field("timeout_secs", &self.timeout_secs)
            .field("enforce_whitelist", &self.enforce_whitelist)
            .field("api_method_whitelist", &self.api_method_whitelist)
            .field("debug", &self.debug)
            .field("enabled", &self.enabled)
            .field("debug_log_path", &self.debug_log_path)
            .field("log_level", &self.log_level)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Validated configuration
// ---------------------------------------------------------------------------

/// API credential triple sent with every request.
///
/// The bytes are overwritten when the value is dropped.
pub struct Credentials {
    user: Zeroizing<String>,
    password: Zeroizing<String>,
    signature: Zeroizing<String>,
}

impl Credentials {
    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user.as_str())
            .field("password", &"[REDACTED]")
            .field("signature", &"[REDACTED]")
            .finish()
    }
}

/// Which API methods the bridge may call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Whitelist {
    /// Only the listed methods (exact, case-sensitive). Empty denies everything.
    Enforced(BTreeSet<String>),
    /// Any method may be called.
    Disabled,
}

impl Whitelist {
    /// Returns `true` if `method` may be called.
    pub fn permits(&self, method: &str) -> bool {
        match self {
            Whitelist::Enforced(allowed) => allowed.contains(method),
            Whitelist::Disabled => true,
        }
    }
}

/// Validated, immutable bridge configuration.
#[derive(Debug)]
pub struct BridgeConfig {
    credentials: Credentials,
    endpoint: EndpointMode,
    api_version: String,
    ca_bundle_path: PathBuf,
    timeout: Duration,
    whitelist: Whitelist,
    debug: bool,
    enabled: bool,
    debug_log_path: Option<PathBuf>,
}

impl BridgeConfig {
    /// Validate `raw`, returning a descriptive error on the first failure.
    ///
    /// Checks run in a fixed order: credentials, endpoint and version, CA
    /// bundle path, timeout, whitelist, debug and enabled flags, TLS
    /// capability.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] of the first check that fails.
    pub fn validate(raw: RawConfig) -> Result<Self, ConfigError> {
        let RawConfig {
            user,
            password,
            signature,
            endpoint,
            api_version,
            ca_bundle_path,
            timeout_secs,
            enforce_whitelist,
            api_method_whitelist,
            debug,
            enabled,
            debug_log_path,
            log_level: _,
        } = raw;

        let (Some(user), Some(password), Some(signature)) = (
            non_empty_secret(user),
            non_empty_secret(password),
            non_empty_secret(signature),
        ) else {
            return Err(ConfigError::CredentialsInvalid);
        };
        let credentials = Credentials {
            user,
            password,
            signature,
        };

        let (Some(endpoint), Some(api_version)) = (non_empty(endpoint), non_empty(api_version))
        else {
            return Err(ConfigError::EndpointOrVersionMissing);
        };
        let endpoint =
            EndpointMode::parse(&endpoint).ok_or(ConfigError::EndpointModeInvalid(endpoint))?;

        let ca_bundle_path = non_empty(ca_bundle_path)
            .map(PathBuf::from)
            .ok_or(ConfigError::CaBundleMissing)?;

        let timeout = timeout_secs
            .as_deref()
            .and_then(parse_positive_secs)
            .map(Duration::from_secs)
            .ok_or(ConfigError::TimeoutInvalid)?;

        let whitelist = build_whitelist(enforce_whitelist.as_deref(), api_method_whitelist);

        let (Some(debug), Some(enabled)) = (non_empty(debug), non_empty(enabled)) else {
            return Err(ConfigError::DebugOrEnabledMissing);
        };

        crate::tls::ensure_available()?;

        Ok(Self {
            credentials,
            endpoint,
            api_version,
            ca_bundle_path,
            timeout,
            whitelist,
            debug: debug == "true",
            enabled: enabled == "true",
            debug_log_path: non_empty(debug_log_path).map(PathBuf::from),
        })
    }

    /// Load from the environment and validate in one step.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Source`] if the environment cannot be read, or
    /// the first validation failure.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::validate(RawConfig::from_env()?)
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn endpoint(&self) -> EndpointMode {
        self.endpoint
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn ca_bundle_path(&self) -> &Path {
        &self.ca_bundle_path
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn whitelist(&self) -> &Whitelist {
        &self.whitelist
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn debug_log_path(&self) -> Option<&Path> {
        self.debug_log_path.as_deref()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn non_empty_secret(value: Option<Zeroizing<String>>) -> Option<Zeroizing<String>> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_positive_secs(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse::<u64>().ok().filter(|secs| *secs > 0)
}

fn build_whitelist(enforce: Option<&str>, methods: Option<Vec<String>>) -> Whitelist {
    match enforce.map(str::trim) {
        Some("false") => Whitelist::Disabled,
        // Absent: fail safe and allow nothing.
        None => Whitelist::Enforced(BTreeSet::new()),
        Some(_) => Whitelist::Enforced(
            methods
                .unwrap_or_default()
                .into_iter()
                .map(|m| m.trim().to_owned())
                .filter(|m| !m.is_empty())
                .collect(),
        ),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn secret(value: &str) -> Option<Zeroizing<String>> {
        Some(Zeroizing::new(value.to_owned()))
    }

    /// A raw configuration that passes every check.
    pub(crate) fn valid_raw() -> RawConfig {
        RawConfig {
            user: secret("u"),
            password: secret("p"),
            signature: secret("s"),
            endpoint: Some("sandbox".into()),
            api_version: Some("74.0".into()),
            ca_bundle_path: Some("/etc/ssl/certs/ca-certificates.crt".into()),
            timeout_secs: Some("20".into()),
            enforce_whitelist: Some("true".into()),
            api_method_whitelist: Some(vec!["SetExpressCheckout".into()]),
            debug: Some("false".into()),
            enabled: Some("true".into()),
            debug_log_path: None,
            log_level: default_log_level(),
        }
    }

    fn code_of(raw: RawConfig) -> u16 {
        BridgeConfig::validate(raw).unwrap_err().code()
    }

    #[test]
    fn accepts_valid_config() {
        let cfg = BridgeConfig::validate(valid_raw()).unwrap();
        assert_eq!(cfg.credentials().user(), "u");
        assert_eq!(cfg.credentials().password(), "p");
        assert_eq!(cfg.credentials().signature(), "s");
        assert_eq!(cfg.endpoint(), EndpointMode::Sandbox);
        assert_eq!(cfg.api_version(), "74.0");
        assert_eq!(cfg.timeout(), Duration::from_secs(20));
        assert!(cfg.whitelist().permits("SetExpressCheckout"));
        assert!(!cfg.whitelist().permits("DoExpressCheckoutPayment"));
        assert!(!cfg.debug());
        assert!(cfg.enabled());
        assert!(cfg.debug_log_path().is_none());
    }

    #[test]
    fn missing_credentials() {
        for strip in 0..3 {
            let mut raw = valid_raw();
            match strip {
                0 => raw.user = None,
                1 => raw.password = secret(""),
                _ => raw.signature = secret("   "),
            }
            assert_eq!(code_of(raw), 101);
        }
    }

    #[test]
    fn missing_endpoint_or_version() {
        let mut raw = valid_raw();
        raw.endpoint = None;
        assert_eq!(code_of(raw), 102);

        let mut raw = valid_raw();
        raw.api_version = Some(String::new());
        assert_eq!(code_of(raw), 102);
    }

    #[test]
    fn invalid_endpoint_mode() {
        let mut raw = valid_raw();
        raw.endpoint = Some("production".into());
        assert_eq!(
            BridgeConfig::validate(raw).unwrap_err(),
            ConfigError::EndpointModeInvalid("production".into())
        );
    }

    #[test]
    fn live_endpoint_selected() {
        let mut raw = valid_raw();
        raw.endpoint = Some("live".into());
        let cfg = BridgeConfig::validate(raw).unwrap();
        assert_eq!(cfg.endpoint(), EndpointMode::Live);
    }

    #[test]
    fn missing_ca_bundle() {
        let mut raw = valid_raw();
        raw.ca_bundle_path = None;
        assert_eq!(code_of(raw), 104);
    }

    #[test]
    fn invalid_timeouts() {
        for bad in [None, Some(""), Some("0"), Some("-5"), Some("20.5"), Some("twenty")] {
            let mut raw = valid_raw();
            raw.timeout_secs = bad.map(str::to_owned);
            assert_eq!(code_of(raw), 105, "timeout {bad:?}");
        }
    }

    #[test]
    fn missing_debug_or_enabled() {
        let mut raw = valid_raw();
        raw.debug = None;
        assert_eq!(code_of(raw), 106);

        let mut raw = valid_raw();
        raw.enabled = Some(String::new());
        assert_eq!(code_of(raw), 106);
    }

    #[test]
    fn flags_are_true_only_for_literal_true() {
        let mut raw = valid_raw();
        raw.debug = Some("yes".into());
        raw.enabled = Some("TRUE".into());
        let cfg = BridgeConfig::validate(raw).unwrap();
        assert!(!cfg.debug());
        assert!(!cfg.enabled());
    }

    #[test]
    fn first_failure_wins() {
        let mut raw = valid_raw();
        raw.user = None;
        raw.timeout_secs = None;
        assert_eq!(code_of(raw), 101);
    }

    #[test]
    fn whitelist_absent_enforce_flag_denies_all() {
        let mut raw = valid_raw();
        raw.enforce_whitelist = None;
        let cfg = BridgeConfig::validate(raw).unwrap();
        assert_eq!(cfg.whitelist(), &Whitelist::Enforced(BTreeSet::new()));
        assert!(!cfg.whitelist().permits("SetExpressCheckout"));
    }

    #[test]
    fn whitelist_enforced_with_empty_list_denies_all() {
        let mut raw = valid_raw();
        raw.api_method_whitelist = Some(vec![]);
        let cfg = BridgeConfig::validate(raw).unwrap();
        assert!(!cfg.whitelist().permits("SetExpressCheckout"));

        let mut raw = valid_raw();
        raw.api_method_whitelist = None;
        let cfg = BridgeConfig::validate(raw).unwrap();
        assert!(!cfg.whitelist().permits("SetExpressCheckout"));
    }

    #[test]
    fn whitelist_any_value_but_false_enforces() {
        let mut raw = valid_raw();
        raw.enforce_whitelist = Some("0".into());
        let cfg = BridgeConfig::validate(raw).unwrap();
        assert!(matches!(cfg.whitelist(), Whitelist::Enforced(_)));
    }

    #[test]
    fn whitelist_explicit_false_disables() {
        let mut raw = valid_raw();
        raw.enforce_whitelist = Some("false".into());
        let cfg = BridgeConfig::validate(raw).unwrap();
        assert_eq!(cfg.whitelist(), &Whitelist::Disabled);
        assert!(cfg.whitelist().permits("RefundTransaction"));
    }

    #[test]
    fn whitelist_entries_trimmed_and_deduplicated() {
        let mut raw = valid_raw();
        raw.api_method_whitelist = Some(vec![
            " SetExpressCheckout".into(),
            "SetExpressCheckout".into(),
            "".into(),
            "GetExpressCheckoutDetails ".into(),
        ]);
        let cfg = BridgeConfig::validate(raw).unwrap();
        match cfg.whitelist() {
            Whitelist::Enforced(set) => assert_eq!(set.len(), 2),
            Whitelist::Disabled => panic!("expected enforcement"),
        }
        assert!(!cfg.whitelist().permits("setexpresscheckout"));
    }

    #[test]
    fn debug_log_path_kept_when_set() {
        let mut raw = valid_raw();
        raw.debug_log_path = Some("/var/log/nvp-bridge.log".into());
        let cfg = BridgeConfig::validate(raw).unwrap();
        assert_eq!(cfg.debug_log_path(), Some(Path::new("/var/log/nvp-bridge.log")));
    }

    #[test]
    fn method_list_accepts_csv() {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(default, deserialize_with = "method_list")]
            methods: Option<Vec<String>>,
        }

        let cfg = config::Config::builder()
            .set_override("methods", "SetExpressCheckout,DoExpressCheckoutPayment")
            .unwrap()
            .build()
            .unwrap();
        let w: Wrapper = cfg.try_deserialize().unwrap();
        assert_eq!(
            w.methods,
            Some(vec![
                "SetExpressCheckout".to_owned(),
                "DoExpressCheckoutPayment".to_owned()
            ])
        );
    }

    #[test]
    fn raw_credentials_deserialize_from_environment_strings() {
        let cfg = config::Config::builder()
            .set_override("user", "merchant_api1.example.com")
            .unwrap()
            .set_override("password", "hunter2")
            .unwrap()
            .build()
            .unwrap();
        let raw: RawConfig = cfg.try_deserialize().unwrap();
        assert_eq!(raw.user.as_deref().map(String::as_str), Some("merchant_api1.example.com"));
        assert_eq!(raw.password.as_deref().map(String::as_str), Some("hunter2"));
        assert!(raw.signature.is_none());
        assert_eq!(raw.log_level, "info");
    }

    #[test]
    fn raw_debug_redacts_secrets() {
        let rendered = format!("{:?}", valid_raw());
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("\"p\""));
        assert!(!rendered.contains("\"s\""));
    }

    #[test]
    fn credentials_debug_redacts_secrets() {
        let cfg = BridgeConfig::validate(valid_raw()).unwrap();
        let rendered = format!("{:?}", cfg.credentials());
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("\"p\""));
    }

    #[test]
    fn defaults_are_correct() {
        assert_eq!(default_log_level(), "info");
    }
}
