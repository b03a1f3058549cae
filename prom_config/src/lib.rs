//! Value objects mirroring the subset of the Prometheus configuration file
//! that is produced for Kubernetes pod scraping.
//!
//! Everything in here only knows how to serialize itself the way Prometheus
//! expects to read it. Deciding *what* goes into these structs is the job of
//! the compiler crate.

pub mod http;
pub mod relabel;
pub mod scrape;

pub use http::{Authorization, BasicAuth, HttpClientConfig, OAuth2, Secret, TlsConfig};
pub use relabel::{Action, Regex, RelabelConfig};
pub use scrape::{
    AttachMetadata, Config, KubernetesSdConfig, NamespaceDiscovery, Role, Scheme, ScrapeConfig,
};
