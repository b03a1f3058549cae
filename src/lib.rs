//! Compiles `PodMonitor` resources into Prometheus scrape configurations.
//!
//! ```no_run
//! use monitor_compiler::{CompilerConfig, ConfigGenerator, MountedSecrets, PodMonitor};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = CompilerConfig::load("monitor-compiler.toml".as_ref())?;
//! let secrets = MountedSecrets::from_config(&config.secrets);
//! let monitor: PodMonitor = serde_yaml::from_str(&std::fs::read_to_string("podmonitor.yaml")?)?;
//!
//! let scrape_configs = ConfigGenerator::new(&config, &secrets).generate_pod_monitor(&monitor)?;
//! println!("{}", monitor_compiler::render::render(&scrape_configs)?);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod discovery;
pub mod error;
pub mod monitor;
pub mod namespace;
pub mod relabel;
pub mod render;
pub mod scrape;
pub mod secrets;

pub use config::CompilerConfig;
pub use error::{Error, MonitorError, Result};
pub use monitor::{PodMetricsEndpoint, PodMonitor};
pub use scrape::ConfigGenerator;
pub use secrets::{InMemorySecrets, MountedSecrets, SecretAccessor, SecretRef};
