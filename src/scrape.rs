//! Assembly of complete scrape configs from pod monitors.

use crate::auth::AuthBuilder;
use crate::config::CompilerConfig;
use crate::discovery::generate_sd_config;
use crate::error::{Error, MonitorError, Result};
use crate::monitor::{PodMetricsEndpoint, PodMonitor};
use crate::namespace;
use crate::relabel::{compile_metric_relabelings, compile_relabelings};
use crate::secrets::SecretAccessor;
use humantime::format_duration;
use prom_config::{HttpClientConfig, Role, Scheme, ScrapeConfig};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

#[cfg(test)]
mod tests;

const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Every target of a pod monitor is discovered through the pod role.
const POD_MONITOR_ROLE: Role = Role::Pod;

/// `<role>/<namespace>/<name>/<endpoint index>`
pub fn job_name(role: Role, namespace: &str, name: &str, index: usize) -> String {
    format!("{role}/{namespace}/{name}/{index}")
}

/// Compiles monitors against one set of client settings and one secret
/// accessor. Both are only ever read, so a generator can be shared between
/// threads compiling independent monitors.
pub struct ConfigGenerator<'a> {
    config: &'a CompilerConfig,
    secrets: &'a dyn SecretAccessor,
}

impl<'a> ConfigGenerator<'a> {
    pub fn new(config: &'a CompilerConfig, secrets: &'a dyn SecretAccessor) -> Self {
        Self { config, secrets }
    }

    /// Build the scrape config for the endpoint at `index` of `monitor`.
    pub fn generate_endpoint(
        &self,
        monitor: &PodMonitor,
        endpoint: &PodMetricsEndpoint,
        index: usize,
    ) -> Result<ScrapeConfig> {
        let spec = &monitor.spec;
        let own_namespace = monitor.metadata.namespace.as_str();

        let (scrape_interval, scrape_timeout) = self.durations(endpoint)?;

        let scheme = match endpoint.scheme.as_deref() {
            Some(scheme) => Scheme::parse(scheme).ok_or_else(|| {
                Error::validation("scheme", format!("{scheme:?} is neither http nor https"))
            })?,
            None => Scheme::default(),
        };

        let metrics_path = endpoint
            .path
            .as_deref()
            .filter(|path| !path.is_empty())
            .unwrap_or(DEFAULT_METRICS_PATH)
            .to_string();

        let mut http_client_config = HttpClientConfig::default();
        if let Some(proxy_url) = &endpoint.proxy_url {
            http_client_config.proxy_url =
                Some(Url::parse(proxy_url).map_err(|err| Error::validation("proxyUrl", err))?);
        }
        if let Some(follow_redirects) = endpoint.follow_redirects {
            http_client_config.follow_redirects = follow_redirects;
        }
        if let Some(enable_http2) = endpoint.enable_http2 {
            http_client_config.enable_http2 = enable_http2;
        }
        AuthBuilder::new(own_namespace, self.secrets).apply(endpoint, &mut http_client_config)?;

        let relabel_configs = compile_relabelings(monitor, endpoint)?;
        let metric_relabel_configs = compile_metric_relabelings(endpoint)?;

        let namespaces = namespace::resolve(spec.namespace_selector.as_ref(), own_namespace);
        let sd_config = generate_sd_config(
            &self.config.client,
            POD_MONITOR_ROLE,
            namespaces,
            spec.attach_metadata.as_ref(),
        );

        Ok(ScrapeConfig {
            job_name: job_name(
                POD_MONITOR_ROLE,
                own_namespace,
                &monitor.metadata.name,
                index,
            ),
            honor_labels: endpoint.honor_labels.unwrap_or(false),
            honor_timestamps: endpoint.honor_timestamps.unwrap_or(true),
            params: endpoint.params.clone(),
            scrape_interval,
            scrape_timeout,
            metrics_path,
            scheme,
            sample_limit: spec.sample_limit,
            target_limit: spec.target_limit,
            http_client_config,
            relabel_configs,
            metric_relabel_configs,
            kubernetes_sd_configs: vec![sd_config],
        })
    }

    /// Interval and timeout of an endpoint. The timeout never exceeds the
    /// interval.
    fn durations(&self, endpoint: &PodMetricsEndpoint) -> Result<(Duration, Duration)> {
        let defaults = &self.config.defaults;

        let interval = endpoint.interval.unwrap_or(defaults.scrape_interval);
        if interval.is_zero() {
            return Err(Error::validation("interval", "must be greater than zero"));
        }

        let timeout = match endpoint.scrape_timeout {
            Some(timeout) if timeout.is_zero() => {
                return Err(Error::validation(
                    "scrapeTimeout",
                    "must be greater than zero",
                ))
            }
            Some(timeout) if timeout > interval => {
                return Err(Error::validation(
                    "scrapeTimeout",
                    format!(
                        "{} is longer than the scrape interval of {}",
                        format_duration(timeout),
                        format_duration(interval)
                    ),
                ))
            }
            Some(timeout) => timeout,
            None => defaults.scrape_timeout.min(interval),
        };

        Ok((interval, timeout))
    }

    /// Build one scrape config per endpoint of `monitor`, in declaration
    /// order. The first failing endpoint fails the whole monitor.
    pub fn generate_pod_monitor(
        &self,
        monitor: &PodMonitor,
    ) -> std::result::Result<Vec<ScrapeConfig>, MonitorError> {
        let scrape_configs = monitor
            .spec
            .pod_metrics_endpoints
            .iter()
            .enumerate()
            .map(|(index, endpoint)| {
                self.generate_endpoint(monitor, endpoint, index)
                    .map_err(|source| MonitorError {
                        namespace: monitor.metadata.namespace.clone(),
                        name: monitor.metadata.name.clone(),
                        endpoint: index,
                        source,
                    })
            })
            .collect::<std::result::Result<Vec<_>, _>>();

        match &scrape_configs {
            Ok(scrape_configs) => debug!(
                monitor = %monitor.key(),
                scrape_configs = scrape_configs.len(),
                "Generated scrape configs"
            ),
            Err(err) => debug!(
                monitor = %monitor.key(),
                endpoint = err.endpoint,
                err = %err.source,
                "Unable to generate scrape configs"
            ),
        }

        scrape_configs
    }

    /// Compile every monitor independently. The result is keyed by
    /// `namespace/name`; a failing monitor has no effect on the others.
    pub fn generate_many(
        &self,
        monitors: &[PodMonitor],
    ) -> BTreeMap<String, std::result::Result<Vec<ScrapeConfig>, MonitorError>> {
        monitors
            .iter()
            .map(|monitor| (monitor.key(), self.generate_pod_monitor(monitor)))
            .collect()
    }
}
