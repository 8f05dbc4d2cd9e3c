//! Service configuration documents carried in TXT records.
//!
//! A TXT payload holds a JSON list of documents behind a `grpc_config=`
//! prefix. Selecting a document for a particular client is client-side
//! logic; this module only carries the documents and their metadata.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::DnsError;

/// Prefix of a TXT payload carrying service configuration.
pub const SERVICE_CONFIG_PREFIX: &str = "grpc_config=";

/// One service configuration document.
///
/// Keys other than the recognized ones are preserved in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    /// Load balancing policy name (e.g. `round_robin`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balancing_policy: Option<String>,

    /// Per-method overrides, carried opaquely.
    #[serde(default)]
    pub method_config: Vec<Value>,

    /// Selection weight, 0-100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<u8>,

    /// Client languages this document applies to. Absent means all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_language: Option<Vec<String>>,

    /// Unrecognized keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServiceConfig {
    /// A `round_robin` document with the given method overrides.
    pub fn round_robin(method_config: Vec<Value>) -> Self {
        Self {
            load_balancing_policy: Some("round_robin".to_string()),
            method_config,
            percentage: None,
            client_language: None,
            extra: Map::new(),
        }
    }

    /// Set the selection weight.
    pub fn with_percentage(mut self, percentage: u8) -> Self {
        self.percentage = Some(percentage);
        self
    }

    /// Restrict the document to the given client languages.
    pub fn with_client_language<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.client_language = Some(languages.into_iter().map(Into::into).collect());
        self
    }

    fn validate(&self) -> Result<(), DnsError> {
        match self.percentage {
            Some(p) if p > 100 => Err(DnsError::invalid(
                "percentage",
                format!("{p} is outside 0-100"),
            )),
            _ => Ok(()),
        }
    }
}

/// Method config list naming `service`/`Foo` with wait-for-ready set.
pub fn method_config_for(service: &str) -> Vec<Value> {
    vec![json!({
        "name": [{
            "service": service,
            "method": "Foo",
            "waitForReady": true,
        }],
    })]
}

/// Serialize documents into a TXT payload: prefix plus compact JSON.
pub fn encode_service_configs(configs: &[ServiceConfig]) -> Result<String, DnsError> {
    for config in configs {
        config.validate()?;
    }
    Ok(format!(
        "{SERVICE_CONFIG_PREFIX}{}",
        serde_json::to_string(configs)?
    ))
}

/// Parse a TXT payload produced by [`encode_service_configs`].
pub fn decode_service_configs(text: &str) -> Result<Vec<ServiceConfig>, DnsError> {
    let body = text.strip_prefix(SERVICE_CONFIG_PREFIX).ok_or_else(|| {
        DnsError::invalid(
            "text",
            format!("TXT payload does not start with `{SERVICE_CONFIG_PREFIX}`"),
        )
    })?;
    let configs: Vec<ServiceConfig> = serde_json::from_str(body)?;
    for config in &configs {
        config.validate()?;
    }
    Ok(configs)
}

/// Index of the first document with a nonzero (or absent) percentage.
///
/// Deterministic stand-in for weighted selection; only the all-or-nothing
/// weightings used by the stock fixtures are meaningful here.
pub fn first_weighted_index(configs: &[ServiceConfig]) -> Option<usize> {
    configs
        .iter()
        .position(|config| config.percentage.map_or(true, |p| p > 0))
}
