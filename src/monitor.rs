//! The `PodMonitor` resource as it is read from the Kubernetes API.
//!
//! Optional scalars are kept as `Option` all the way through, so a value the
//! user set explicitly (even to its default) is never confused with one they
//! left out.

use crate::error::{Error, Result};
use crate::secrets::{SecretRef, SourceKind};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodMonitor {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodMonitorSpec,
}

impl PodMonitor {
    /// `namespace/name`, the key this monitor is tracked under.
    pub fn key(&self) -> String {
        format!("{}/{}", self.metadata.namespace, self.metadata.name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub namespace: String,
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodMonitorSpec {
    /// Pod label whose value replaces the `job` label.
    pub job_label: Option<String>,
    /// Pod labels copied onto every scraped target.
    #[serde(default)]
    pub pod_target_labels: Vec<String>,
    #[serde(default)]
    pub pod_metrics_endpoints: Vec<PodMetricsEndpoint>,
    pub selector: Option<LabelSelector>,
    pub namespace_selector: Option<NamespaceSelector>,
    pub sample_limit: Option<u64>,
    pub target_limit: Option<u64>,
    pub attach_metadata: Option<AttachMetadata>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceSelector {
    #[serde(default)]
    pub any: bool,
    #[serde(default)]
    pub match_names: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelectorRequirement {
    pub key: String,
    /// One of `In`, `NotIn`, `Exists` and `DoesNotExist`.
    pub operator: String,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachMetadata {
    #[serde(default)]
    pub node: bool,
}

/// A container port, either by name or by number.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Port {
    Number(u16),
    Name(String),
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Port::Number(number) => write!(f, "{number}"),
            Port::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodMetricsEndpoint {
    pub port: Option<Port>,
    pub path: Option<String>,
    pub scheme: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, Vec<String>>,
    #[serde(default, with = "humantime_serde::option")]
    pub interval: Option<Duration>,
    #[serde(default, with = "humantime_serde::option")]
    pub scrape_timeout: Option<Duration>,
    pub honor_labels: Option<bool>,
    pub honor_timestamps: Option<bool>,
    pub enable_http2: Option<bool>,
    pub follow_redirects: Option<bool>,
    pub filter_running: Option<bool>,
    pub proxy_url: Option<String>,
    pub tls_config: Option<SafeTlsConfig>,
    pub oauth2: Option<OAuth2>,
    pub authorization: Option<SafeAuthorization>,
    pub basic_auth: Option<BasicAuth>,
    #[serde(default)]
    pub relabelings: Vec<RelabelRule>,
    #[serde(default)]
    pub metric_relabelings: Vec<RelabelRule>,
}

/// A relabel rule as written by the user. Unset fields are filled in by
/// [`crate::relabel::with_defaults`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelabelRule {
    #[serde(default)]
    pub source_labels: Vec<String>,
    pub separator: Option<String>,
    pub target_label: Option<String>,
    pub regex: Option<String>,
    pub modulus: Option<u64>,
    pub replacement: Option<String>,
    pub action: Option<String>,
}

/// Selects a key of a secret or config map in the monitor's namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeySelector {
    pub name: String,
    pub key: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretOrConfigMap {
    pub secret: Option<KeySelector>,
    pub config_map: Option<KeySelector>,
}

impl SecretOrConfigMap {
    /// The referenced key, or `None` when neither source is set.
    pub fn source(&self, namespace: &str, field: &str) -> Result<Option<SecretRef>> {
        match (&self.secret, &self.config_map) {
            (Some(_), Some(_)) => Err(Error::validation(
                field,
                "only one of secret and configMap can be set",
            )),
            (Some(secret), None) => Ok(Some(SecretRef::new(
                namespace,
                SourceKind::Secret,
                secret,
            ))),
            (None, Some(config_map)) => Ok(Some(SecretRef::new(
                namespace,
                SourceKind::ConfigMap,
                config_map,
            ))),
            (None, None) => Ok(None),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeTlsConfig {
    #[serde(default)]
    pub ca: SecretOrConfigMap,
    #[serde(default)]
    pub cert: SecretOrConfigMap,
    pub key_secret: Option<KeySelector>,
    pub server_name: Option<String>,
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2 {
    pub client_id: SecretOrConfigMap,
    pub client_secret: KeySelector,
    pub token_url: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub endpoint_params: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeAuthorization {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub credentials: Option<KeySelector>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicAuth {
    pub username: Option<KeySelector>,
    pub password: Option<KeySelector>,
}
