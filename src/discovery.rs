use crate::auth::{client_authorization, client_basic_auth, client_tls_config};
use crate::config::ClientArguments;
use crate::monitor::AttachMetadata;
use prom_config::{HttpClientConfig, KubernetesSdConfig, NamespaceDiscovery, Role, Secret};

/// Build the `kubernetes_sd_configs` entry for a monitor.
///
/// A kubeconfig file takes precedence over an API server. With neither, the
/// entry only carries the role and namespaces, and Prometheus uses the
/// in-cluster service account.
pub fn generate_sd_config(
    client: &ClientArguments,
    role: Role,
    namespaces: Vec<String>,
    attach_metadata: Option<&AttachMetadata>,
) -> KubernetesSdConfig {
    let mut sd = KubernetesSdConfig::new(role);

    sd.namespaces = NamespaceDiscovery {
        own_namespace: false,
        names: namespaces,
    };

    if let Some(kubeconfig_file) = &client.kubeconfig_file {
        sd.kubeconfig_file = Some(kubeconfig_file.clone());
    } else if let Some(api_server) = &client.api_server {
        sd.api_server = Some(api_server.clone());
        sd.http_client_config = Some(api_client_config(client));
    }

    sd.attach_metadata = attach_metadata.map(|metadata| prom_config::AttachMetadata {
        node: metadata.node,
    });

    sd
}

fn api_client_config(client: &ClientArguments) -> HttpClientConfig {
    let arguments = &client.http_client;
    let defaults = HttpClientConfig::default();

    HttpClientConfig {
        basic_auth: arguments.basic_auth.as_ref().map(client_basic_auth),
        authorization: arguments.authorization.as_ref().map(client_authorization),
        bearer_token: arguments.bearer_token.clone().map(Secret::new),
        bearer_token_file: arguments.bearer_token_file.clone(),
        tls_config: arguments
            .tls_config
            .as_ref()
            .map(client_tls_config)
            .unwrap_or_default(),
        proxy_url: arguments.proxy_url.clone(),
        follow_redirects: arguments
            .follow_redirects
            .unwrap_or(defaults.follow_redirects),
        enable_http2: arguments.enable_http2.unwrap_or(defaults.enable_http2),
        ..defaults
    }
}
