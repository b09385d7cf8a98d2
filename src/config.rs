//! Configuration: TOML file with `GATEPASS_*` environment overrides.
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GateError, GateResult};
use crate::models::ECLevel;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Verification authority connection.
    pub authority: AuthorityConfig,
    /// Decode tiers.
    pub decode: DecodeConfig,
    /// Payment QR display.
    pub payment: PaymentConfig,
}

/// Verification authority connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// Base URL, e.g. `https://portal.example.com/api`
    pub base_url: String,
    /// Path of the verify endpoint, appended to `base_url`
    pub verify_path: String,
    /// Bearer token sent with each verification.
    pub bearer_token: Option<String>,
    /// Transport timeout in seconds; unset means no timeout.
    pub timeout_secs: Option<u64>,
}

impl AuthorityConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            verify_path: "/visitors/verify".to_string(),
            bearer_token: None,
            timeout_secs: None,
        }
    }
}

/// Decode tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Use the built-in decoder when no native detector is available or it finds nothing.
    pub computed_fallback: bool,
    /// Downscale images whose longer side exceeds this before computed decoding.
    pub max_dimension: Option<u32>,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            computed_fallback: true,
            max_dimension: None,
        }
    }
}

/// Payment QR display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    /// Payee virtual address (`pa`)
    pub payee_address: String,
    /// Payee display name (`pn`)
    pub payee_name: String,
    /// ISO currency code (`cu`)
    pub currency: String,
    /// Error correction level of generated symbols.
    pub ec_level: ECLevel,
    /// Pixels per module in rendered images.
    pub scale: u32,
    /// Light border in modules.
    pub quiet_zone: u32,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            payee_address: "mysociety@okicici".to_string(),
            payee_name: "Smart Community".to_string(),
            currency: "INR".to_string(),
            ec_level: ECLevel::M,
            scale: 8,
            quiet_zone: 4,
        }
    }
}

impl GateConfig {
    /// Load from a TOML file; a missing file yields the defaults.
    pub fn load(path: &Path) -> GateResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| GateError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml(&contents)
    }

    /// Parse TOML; absent keys keep their defaults.
    pub fn from_toml(contents: &str) -> GateResult<Self> {
        toml::from_str(contents).map_err(|e| GateError::Config(format!("Invalid config: {}", e)))
    }

    /// Load a file (if given) and apply process environment overrides.
    pub fn load_with_env(path: Option<&Path>) -> GateResult<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env_with(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Apply `GATEPASS_*` overrides from `lookup`. Unparseable values are ignored.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let authority = &mut self.authority;
        authority.base_url = parse_env_string(&lookup, "GATEPASS_AUTHORITY_URL", &authority.base_url);
        authority.verify_path =
            parse_env_string(&lookup, "GATEPASS_VERIFY_PATH", &authority.verify_path);
        if let Some(token) = lookup("GATEPASS_AUTHORITY_TOKEN").filter(|t| !t.trim().is_empty()) {
            authority.bearer_token = Some(token.trim().to_string());
        }
        if let Some(secs) = parse_env_u64(&lookup, "GATEPASS_AUTHORITY_TIMEOUT_SECS") {
            authority.timeout_secs = (secs > 0).then_some(secs);
        }

        let decode = &mut self.decode;
        decode.computed_fallback =
            parse_env_bool(&lookup, "GATEPASS_COMPUTED_FALLBACK", decode.computed_fallback);
        if let Some(max) = parse_env_u64(&lookup, "GATEPASS_MAX_DIMENSION") {
            decode.max_dimension = u32::try_from(max).ok().filter(|&m| m > 0);
        }

        let payment = &mut self.payment;
        payment.payee_address = parse_env_string(&lookup, "GATEPASS_PAYEE_ADDRESS", &payment.payee_address);
        payment.payee_name = parse_env_string(&lookup, "GATEPASS_PAYEE_NAME", &payment.payee_name);
        payment.currency = parse_env_string(&lookup, "GATEPASS_CURRENCY", &payment.currency);
        if let Some(level) = lookup("GATEPASS_QR_EC_LEVEL").and_then(|v| ECLevel::from_letter(&v)) {
            payment.ec_level = level;
        }
    }
}

fn parse_env_string(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<u64> {
    lookup(name).and_then(|v| v.trim().parse::<u64>().ok())
}

fn parse_env_bool(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: bool) -> bool {
    lookup(name)
        .and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}
