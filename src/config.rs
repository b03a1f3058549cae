use anyhow::{bail, Context};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_SCRAPE_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_SCRAPE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MOUNT_ROOT: &str = "/var/run/monitor-compiler";

/// This struct represents the monitor-compiler.toml configuration. Every
/// section is optional, an empty file yields in-cluster discovery with the
/// Prometheus scrape defaults.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct CompilerConfig {
    /// How discovered scrape jobs connect to the Kubernetes API.
    #[serde(default)]
    pub client: ClientArguments,

    /// Where referenced secrets and config maps are projected.
    #[serde(default)]
    pub secrets: SecretsConfig,

    /// Values used for endpoints that leave them unset.
    #[serde(default)]
    pub defaults: ScrapeDefaults,
}

impl CompilerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read config file {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(input: &str) -> anyhow::Result<Self> {
        let config: CompilerConfig = toml::from_str(input).context("Unable to parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.client.validate()?;
        self.defaults.validate()
    }
}

/// Connection to the Kubernetes API server used by service discovery.
///
/// Either `kubeconfig-file` or `api-server` (with optional HTTP client
/// settings) may be given. With neither, the in-cluster service account is
/// used.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ClientArguments {
    pub api_server: Option<Url>,
    pub kubeconfig_file: Option<String>,
    #[serde(flatten)]
    pub http_client: HttpClientArguments,
}

impl ClientArguments {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_server.is_some() && self.kubeconfig_file.is_some() {
            bail!("only one of api-server and kubeconfig-file can be set");
        }

        if self.kubeconfig_file.is_some() && self.http_client.is_customized() {
            bail!("custom HTTP client configuration is not allowed when kubeconfig-file is set");
        }

        if self.api_server.is_none() && self.http_client.is_customized() {
            bail!("api-server must be set when custom HTTP client configuration is provided");
        }

        self.http_client.validate()
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct HttpClientArguments {
    pub basic_auth: Option<BasicAuthArguments>,
    pub authorization: Option<AuthorizationArguments>,
    pub bearer_token: Option<String>,
    pub bearer_token_file: Option<String>,
    pub tls_config: Option<TlsArguments>,
    pub proxy_url: Option<Url>,
    pub follow_redirects: Option<bool>,
    pub enable_http2: Option<bool>,
}

impl HttpClientArguments {
    /// Whether any setting was given at all. A setting that was explicitly
    /// set to its default value still counts.
    pub fn is_customized(&self) -> bool {
        self.basic_auth.is_some()
            || self.authorization.is_some()
            || self.bearer_token.is_some()
            || self.bearer_token_file.is_some()
            || self.tls_config.is_some()
            || self.proxy_url.is_some()
            || self.follow_redirects.is_some()
            || self.enable_http2.is_some()
    }

    fn validate(&self) -> anyhow::Result<()> {
        let has_bearer = self.bearer_token.is_some() || self.bearer_token_file.is_some();

        if self.bearer_token.is_some() && self.bearer_token_file.is_some() {
            bail!("at most one of bearer-token and bearer-token-file can be set");
        }

        if let Some(basic_auth) = &self.basic_auth {
            if has_bearer || self.authorization.is_some() {
                bail!("basic-auth cannot be combined with a bearer token or authorization");
            }
            if basic_auth.username.is_empty() {
                bail!("basic-auth requires a username");
            }
            if basic_auth.password.is_some() && basic_auth.password_file.is_some() {
                bail!("at most one of basic-auth password and password-file can be set");
            }
        }

        if let Some(authorization) = &self.authorization {
            if has_bearer {
                bail!("authorization cannot be combined with a bearer token");
            }
            if authorization.credentials.is_some() && authorization.credentials_file.is_some() {
                bail!("at most one of authorization credentials and credentials-file can be set");
            }
            if let Some(kind) = &authorization.kind {
                if kind.trim().eq_ignore_ascii_case("basic") {
                    bail!("authorization type cannot be Basic, use basic-auth instead");
                }
            }
        }

        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct BasicAuthArguments {
    pub username: String,
    pub password: Option<String>,
    pub password_file: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct AuthorizationArguments {
    /// Defaults to `Bearer`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub credentials: Option<String>,
    pub credentials_file: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct TlsArguments {
    pub ca_file: Option<String>,
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
    pub server_name: Option<String>,
    pub insecure_skip_verify: Option<bool>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct SecretsConfig {
    #[serde(default = "default_mount_root")]
    pub mount_root: PathBuf,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            mount_root: default_mount_root(),
        }
    }
}

fn default_mount_root() -> PathBuf {
    PathBuf::from(DEFAULT_MOUNT_ROOT)
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ScrapeDefaults {
    #[serde(with = "humantime_serde", default = "default_scrape_interval")]
    pub scrape_interval: Duration,
    #[serde(with = "humantime_serde", default = "default_scrape_timeout")]
    pub scrape_timeout: Duration,
}

impl ScrapeDefaults {
    fn validate(&self) -> anyhow::Result<()> {
        if self.scrape_interval.is_zero() {
            bail!("defaults.scrape-interval must be greater than zero");
        }
        if self.scrape_timeout.is_zero() {
            bail!("defaults.scrape-timeout must be greater than zero");
        }
        Ok(())
    }
}

impl Default for ScrapeDefaults {
    fn default() -> Self {
        Self {
            scrape_interval: DEFAULT_SCRAPE_INTERVAL,
            scrape_timeout: DEFAULT_SCRAPE_TIMEOUT,
        }
    }
}

fn default_scrape_interval() -> Duration {
    DEFAULT_SCRAPE_INTERVAL
}

fn default_scrape_timeout() -> Duration {
    DEFAULT_SCRAPE_TIMEOUT
}
