use crate::http::HttpClientConfig;
use crate::relabel::RelabelConfig;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use url::Url;

/// A Prometheus configuration document containing only scrape jobs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Config {
    pub scrape_configs: Vec<ScrapeConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScrapeConfig {
    pub job_name: String,
    pub honor_labels: bool,
    pub honor_timestamps: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Vec<String>>,
    #[serde(serialize_with = "serialize_duration")]
    pub scrape_interval: Duration,
    #[serde(serialize_with = "serialize_duration")]
    pub scrape_timeout: Duration,
    pub metrics_path: String,
    pub scheme: Scheme,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_limit: Option<u64>,
    #[serde(flatten)]
    pub http_client_config: HttpClientConfig,
    pub relabel_configs: Vec<RelabelConfig>,
    pub metric_relabel_configs: Vec<RelabelConfig>,
    pub kubernetes_sd_configs: Vec<KubernetesSdConfig>,
}

/// Format `duration` the way Prometheus parses durations, e.g. `1m30s` or
/// `1s500ms`. Precision below a millisecond is dropped.
pub fn format_duration(duration: Duration) -> String {
    const UNITS: [(&str, u128); 5] = [
        ("d", 86_400_000),
        ("h", 3_600_000),
        ("m", 60_000),
        ("s", 1_000),
        ("ms", 1),
    ];

    let mut millis = duration.as_millis();
    if millis == 0 {
        return "0s".to_string();
    }

    let mut formatted = String::new();
    for (unit, size) in UNITS {
        let count = millis / size;
        if count > 0 {
            formatted.push_str(&format!("{count}{unit}"));
            millis %= size;
        }
    }
    formatted
}

fn serialize_duration<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_duration(*duration))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    pub fn parse(input: &str) -> Option<Scheme> {
        match input.to_lowercase().as_str() {
            "http" => Some(Scheme::Http),
            "https" => Some(Scheme::Https),
            _ => None,
        }
    }
}

/// The kind of Kubernetes object targets are discovered from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Pod,
    Service,
    Endpoints,
    EndpointSlice,
    Node,
    Ingress,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Pod => "pod",
            Role::Service => "service",
            Role::Endpoints => "endpoints",
            Role::EndpointSlice => "endpointslice",
            Role::Node => "node",
            Role::Ingress => "ingress",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NamespaceDiscovery {
    pub own_namespace: bool,
    /// An empty list means every namespace.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AttachMetadata {
    pub node: bool,
}

/// `kubernetes_sd_configs` entry.
///
/// When neither `kubeconfig_file` nor `api_server` is set, Prometheus falls
/// back to the in-cluster service account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KubernetesSdConfig {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubeconfig_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_server: Option<Url>,
    #[serde(flatten)]
    pub http_client_config: Option<HttpClientConfig>,
    pub namespaces: NamespaceDiscovery,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attach_metadata: Option<AttachMetadata>,
}

impl KubernetesSdConfig {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            kubeconfig_file: None,
            api_server: None,
            http_client_config: None,
            namespaces: NamespaceDiscovery::default(),
            attach_metadata: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn sd_config_without_connection_serializes_minimal() {
        let mut sd = KubernetesSdConfig::new(Role::Pod);
        sd.namespaces.names = vec!["operator".to_string()];

        let expected: serde_yaml::Value = serde_yaml::from_str(
            r#"
            role: pod
            namespaces:
              own_namespace: false
              names: [operator]
            "#,
        )
        .unwrap();

        assert_eq!(serde_yaml::to_value(&sd).unwrap(), expected);
    }

    #[rstest]
    #[case(Duration::from_secs(60), "1m")]
    #[case(Duration::from_secs(90), "1m30s")]
    #[case(Duration::from_millis(1500), "1s500ms")]
    #[case(Duration::from_secs(2 * 3600 + 5), "2h5s")]
    #[case(Duration::from_secs(86_400), "1d")]
    #[case(Duration::ZERO, "0s")]
    fn prometheus_duration_notation(#[case] duration: Duration, #[case] expected: &str) {
        assert_eq!(format_duration(duration), expected);
    }

    #[test]
    fn scheme_parse() {
        assert_eq!(Scheme::parse("HTTPS"), Some(Scheme::Https));
        assert_eq!(Scheme::parse("ftp"), None);
    }

    #[test]
    fn durations_use_prometheus_notation() {
        let config = ScrapeConfig {
            job_name: "pod/operator/podmonitor/0".to_string(),
            honor_labels: false,
            honor_timestamps: true,
            params: BTreeMap::new(),
            scrape_interval: Duration::from_secs(60),
            scrape_timeout: Duration::from_secs(10),
            metrics_path: "/metrics".to_string(),
            scheme: Scheme::Http,
            sample_limit: None,
            target_limit: None,
            http_client_config: HttpClientConfig::default(),
            relabel_configs: Vec::new(),
            metric_relabel_configs: Vec::new(),
            kubernetes_sd_configs: Vec::new(),
        };

        let value = serde_yaml::to_value(&config).unwrap();

        assert_eq!(value["scrape_interval"], serde_yaml::Value::from("1m"));
        assert_eq!(value["scrape_timeout"], serde_yaml::Value::from("10s"));
        assert_eq!(value["scheme"], serde_yaml::Value::from("http"));
        assert_eq!(value["follow_redirects"], serde_yaml::Value::Bool(true));
    }
}
