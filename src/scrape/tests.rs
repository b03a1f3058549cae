use super::*;
use crate::config::ClientArguments;
use crate::monitor::{KeySelector, SecretOrConfigMap};
use crate::secrets::{InMemorySecrets, SecretRef, SourceKind};
use pretty_assertions::assert_eq;
use prom_config::{KubernetesSdConfig, NamespaceDiscovery};
use rstest::rstest;

const POD_MONITOR: &str = r#"
metadata:
  namespace: operator
  name: podmonitor
spec:
  podMetricsEndpoints:
    - port: metrics
"#;

fn pod_monitor(input: &str) -> PodMonitor {
    serde_yaml::from_str(input).unwrap()
}

fn secrets() -> InMemorySecrets {
    let mut secrets = InMemorySecrets::new("/mnt");
    secrets.insert(
        SecretRef::new(
            "operator",
            SourceKind::Secret,
            &KeySelector {
                name: "oauth".to_string(),
                key: "id".to_string(),
            },
        ),
        "client-id",
    );
    secrets
}

fn oauth2_endpoint(secret_name: &str) -> PodMetricsEndpoint {
    PodMetricsEndpoint {
        port: Some(crate::monitor::Port::Name("metrics".to_string())),
        oauth2: Some(crate::monitor::OAuth2 {
            client_id: SecretOrConfigMap {
                secret: Some(KeySelector {
                    name: secret_name.to_string(),
                    key: "id".to_string(),
                }),
                config_map: None,
            },
            client_secret: KeySelector {
                name: secret_name.to_string(),
                key: "secret".to_string(),
            },
            token_url: "https://auth.example.com/token".to_string(),
            scopes: Vec::new(),
            endpoint_params: BTreeMap::new(),
        }),
        ..Default::default()
    }
}

#[test]
fn single_named_port() {
    let config = CompilerConfig::default();
    let secrets = secrets();
    let generator = ConfigGenerator::new(&config, &secrets);

    let scrape_configs = generator
        .generate_pod_monitor(&pod_monitor(POD_MONITOR))
        .unwrap();

    assert_eq!(scrape_configs.len(), 1);
    let scrape_config = &scrape_configs[0];

    assert_eq!(
        scrape_config,
        &ScrapeConfig {
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
            relabel_configs: scrape_config.relabel_configs.clone(),
            metric_relabel_configs: Vec::new(),
            kubernetes_sd_configs: vec![KubernetesSdConfig {
                namespaces: NamespaceDiscovery {
                    own_namespace: false,
                    names: vec!["operator".to_string()],
                },
                ..KubernetesSdConfig::new(Role::Pod)
            }],
        }
    );

    let targets: Vec<_> = scrape_config
        .relabel_configs
        .iter()
        .map(|config| config.target_label.as_deref())
        .collect();
    assert_eq!(
        targets,
        vec![
            Some("__tmp_prometheus_job_name"),
            None,
            None,
            Some("namespace"),
            Some("container"),
            Some("pod"),
            Some("job"),
            Some("endpoint"),
        ]
    );
}

#[test]
fn selectors_and_namespaces() {
    let config = CompilerConfig::default();
    let secrets = secrets();
    let generator = ConfigGenerator::new(&config, &secrets);

    let monitor = pod_monitor(
        r#"
        metadata:
          namespace: operator
          name: podmonitor
        spec:
          namespaceSelector:
            matchNames: [ns_a, ns_b]
          selector:
            matchLabels:
              foo: bar
          podMetricsEndpoints:
            - port: metrics
        "#,
    );

    let scrape_config = generator
        .generate_pod_monitor(&monitor)
        .unwrap()
        .remove(0);

    assert_eq!(
        scrape_config.kubernetes_sd_configs[0].namespaces.names,
        vec!["ns_a".to_string(), "ns_b".to_string()]
    );
    assert_eq!(scrape_config.relabel_configs.len(), 9);
    assert_eq!(
        scrape_config.relabel_configs[2].regex.as_str(),
        "(bar);true"
    );
}

#[test]
fn any_namespace_discovers_everywhere() {
    let config = CompilerConfig::default();
    let secrets = secrets();
    let generator = ConfigGenerator::new(&config, &secrets);

    let monitor = pod_monitor(
        r#"
        metadata:
          namespace: operator
          name: podmonitor
        spec:
          namespaceSelector:
            any: true
          podMetricsEndpoints:
            - port: metrics
        "#,
    );

    let scrape_configs = generator.generate_pod_monitor(&monitor).unwrap();

    assert!(scrape_configs[0].kubernetes_sd_configs[0]
        .namespaces
        .names
        .is_empty());
}

#[test]
fn endpoint_settings() {
    let config = CompilerConfig::default();
    let secrets = secrets();
    let generator = ConfigGenerator::new(&config, &secrets);

    let monitor = pod_monitor(
        r#"
        metadata:
          namespace: operator
          name: podmonitor
        spec:
          sampleLimit: 5000
          targetLimit: 10
          attachMetadata:
            node: true
          podMetricsEndpoints:
            - port: 8080
            - port: web
              path: /federate
              scheme: HTTPS
              interval: 30s
              scrapeTimeout: 15s
              honorLabels: true
              honorTimestamps: false
              enableHttp2: false
              proxyUrl: http://proxy.internal:3128
              params:
                match[]: ['{job="api"}']
        "#,
    );

    let scrape_configs = generator.generate_pod_monitor(&monitor).unwrap();
    assert_eq!(scrape_configs.len(), 2);

    let first = &scrape_configs[0];
    assert_eq!(first.job_name, "pod/operator/podmonitor/0");
    assert_eq!(first.sample_limit, Some(5000));
    assert_eq!(first.target_limit, Some(10));
    assert_eq!(
        first.kubernetes_sd_configs[0].attach_metadata,
        Some(prom_config::AttachMetadata { node: true })
    );

    let second = &scrape_configs[1];
    assert_eq!(second.job_name, "pod/operator/podmonitor/1");
    assert_eq!(second.metrics_path, "/federate");
    assert_eq!(second.scheme, Scheme::Https);
    assert_eq!(second.scrape_interval, Duration::from_secs(30));
    assert_eq!(second.scrape_timeout, Duration::from_secs(15));
    assert!(second.honor_labels);
    assert!(!second.honor_timestamps);
    assert!(second.http_client_config.follow_redirects);
    assert!(!second.http_client_config.enable_http2);
    assert_eq!(
        second
            .http_client_config
            .proxy_url
            .as_ref()
            .map(Url::as_str),
        Some("http://proxy.internal:3128/")
    );
    assert_eq!(
        second.params.get("match[]"),
        Some(&vec![r#"{job="api"}"#.to_string()])
    );
}

#[rstest]
#[case::defaults(None, None, 60, 10)]
#[case::short_interval(Some(5), None, 5, 5)]
#[case::explicit_timeout(Some(30), Some(30), 30, 30)]
fn scrape_durations(
    #[case] interval: Option<u64>,
    #[case] timeout: Option<u64>,
    #[case] expected_interval: u64,
    #[case] expected_timeout: u64,
) {
    let config = CompilerConfig::default();
    let secrets = secrets();
    let generator = ConfigGenerator::new(&config, &secrets);

    let mut monitor = pod_monitor(POD_MONITOR);
    let endpoint = &mut monitor.spec.pod_metrics_endpoints[0];
    endpoint.interval = interval.map(Duration::from_secs);
    endpoint.scrape_timeout = timeout.map(Duration::from_secs);

    let scrape_config = generator.generate_pod_monitor(&monitor).unwrap().remove(0);

    assert_eq!(
        scrape_config.scrape_interval,
        Duration::from_secs(expected_interval)
    );
    assert_eq!(
        scrape_config.scrape_timeout,
        Duration::from_secs(expected_timeout)
    );
}

#[rstest]
#[case::timeout_above_interval("interval: 10s\n      scrapeTimeout: 20s", "scrapeTimeout")]
#[case::unknown_scheme("scheme: ftp", "scheme")]
#[case::bad_proxy("proxyUrl: not a url", "proxyUrl")]
#[case::bad_regex("relabelings:\n        - targetLabel: x\n          regex: '('", "relabelings[0].regex")]
fn invalid_endpoint(#[case] settings: &str, #[case] field: &str) {
    let config = CompilerConfig::default();
    let secrets = secrets();
    let generator = ConfigGenerator::new(&config, &secrets);

    let monitor = pod_monitor(&format!(
        r#"
metadata:
  namespace: operator
  name: podmonitor
spec:
  podMetricsEndpoints:
    - port: metrics
    - port: web
      {settings}
"#
    ));

    let err = generator.generate_pod_monitor(&monitor).unwrap_err();

    assert_eq!(err.namespace, "operator");
    assert_eq!(err.name, "podmonitor");
    assert_eq!(err.endpoint, 1);
    assert!(matches!(err.source, Error::Validation { .. }));
    assert_eq!(err.source.field(), Some(field));
}

#[test]
fn oauth2_client_id_is_inlined() {
    let config = CompilerConfig::default();
    let secrets = secrets();
    let generator = ConfigGenerator::new(&config, &secrets);

    let monitor = PodMonitor {
        spec: crate::monitor::PodMonitorSpec {
            pod_metrics_endpoints: vec![oauth2_endpoint("oauth")],
            ..Default::default()
        },
        ..pod_monitor(POD_MONITOR)
    };

    let scrape_config = generator.generate_pod_monitor(&monitor).unwrap().remove(0);
    let oauth2 = scrape_config.http_client_config.oauth2.unwrap();

    assert_eq!(oauth2.client_id, "client-id");
    assert_eq!(
        oauth2.client_secret_file,
        "/mnt/secrets/operator/oauth/secret"
    );
}

#[test]
fn unreadable_secret_fails_the_whole_monitor() {
    let config = CompilerConfig::default();
    let secrets = secrets();
    let generator = ConfigGenerator::new(&config, &secrets);

    let mut monitor = pod_monitor(POD_MONITOR);
    monitor
        .spec
        .pod_metrics_endpoints
        .push(oauth2_endpoint("missing"));

    let err = generator.generate_pod_monitor(&monitor).unwrap_err();

    assert_eq!(err.endpoint, 1);
    assert!(matches!(err.source, Error::SecretResolution { .. }));
    assert_eq!(err.source.field(), Some("oauth2.clientId"));
}

#[test]
fn monitors_are_isolated() {
    let config = CompilerConfig::default();
    let secrets = secrets();
    let generator = ConfigGenerator::new(&config, &secrets);

    let healthy = pod_monitor(POD_MONITOR);
    let broken = PodMonitor {
        metadata: crate::monitor::ObjectMeta {
            namespace: "operator".to_string(),
            name: "broken".to_string(),
        },
        spec: crate::monitor::PodMonitorSpec {
            pod_metrics_endpoints: vec![oauth2_endpoint("missing")],
            ..Default::default()
        },
    };

    let results = generator.generate_many(&[healthy, broken]);

    assert_eq!(results.len(), 2);
    assert_eq!(results["operator/podmonitor"].as_ref().unwrap().len(), 1);
    assert!(results["operator/broken"].is_err());
}

#[test]
fn kubeconfig_client_is_used_for_discovery() {
    let config = CompilerConfig {
        client: ClientArguments {
            kubeconfig_file: Some("/etc/kubeconfig".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    let secrets = secrets();
    let generator = ConfigGenerator::new(&config, &secrets);

    let scrape_config = generator
        .generate_pod_monitor(&pod_monitor(POD_MONITOR))
        .unwrap()
        .remove(0);

    assert_eq!(
        scrape_config.kubernetes_sd_configs[0]
            .kubeconfig_file
            .as_deref(),
        Some("/etc/kubeconfig")
    );
}

#[test]
fn monitor_without_endpoints() {
    let config = CompilerConfig::default();
    let secrets = secrets();
    let generator = ConfigGenerator::new(&config, &secrets);

    let mut monitor = pod_monitor(POD_MONITOR);
    monitor.spec.pod_metrics_endpoints.clear();

    assert!(generator.generate_pod_monitor(&monitor).unwrap().is_empty());
}

#[test]
fn compilation_is_idempotent() {
    let config = CompilerConfig::default();
    let secrets = secrets();
    let generator = ConfigGenerator::new(&config, &secrets);
    let monitor = pod_monitor(POD_MONITOR);

    let first = generator.generate_pod_monitor(&monitor).unwrap();
    let second = generator.generate_pod_monitor(&monitor).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        crate::render::render(&first).unwrap(),
        crate::render::render(&second).unwrap()
    );
}
