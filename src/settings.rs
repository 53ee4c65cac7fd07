use config::{Config, File};
use serde::{de, Deserialize};
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://epistat.sciensano.be/Data/";

/// Wrapper under [`serde::de::IgnoredAny`] which implements
/// [`PartialEq`] and [`Eq`] for fields to be ignored.
#[derive(Copy, Clone, Debug, Default, Deserialize)]
struct IgnoredAny(de::IgnoredAny);

impl PartialEq for IgnoredAny {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for IgnoredAny {}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub server: ServerSettings,
    pub tracing: TracingSettings,
    pub sources: SourcesSettings,
    pub cache: CacheSettings,
    pub population: PopulationSettings,

    // Is required as we deny unknown fields, but allow users provide
    // path to config through COVID_STATS__CONFIG env variable.
    #[serde(rename = "config")]
    config_path: IgnoredAny,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from_str("0.0.0.0:8080").expect("should be valid address"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TracingFormat {
    #[default]
    Default,
    Json,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TracingSettings {
    pub enabled: bool,
    pub format: TracingFormat,
}

impl Default for TracingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            format: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SourcesSettings {
    pub base_url: Url,
    /// Seconds between two polls of the same endpoint.
    pub interval: u64,
    /// Relative spread applied to every interval, `0.04` means ±4%.
    pub jitter: f64,
    /// Seconds.
    pub request_timeout: u64,
}

impl Default for SourcesSettings {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("valid url"),
            interval: 60 * 60,
            jitter: 0.04,
            request_timeout: 30,
        }
    }
}

impl SourcesSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    /// Seconds an accumulated report is served before being regenerated.
    pub ttl: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { ttl: 5 * 60 }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PopulationSettings {
    /// JSON file with population figures. Rate reports stay empty without it.
    pub path: Option<PathBuf>,
    /// Seconds a rate report waits for the figures before giving up.
    pub ready_timeout: u64,
}

impl Default for PopulationSettings {
    fn default() -> Self {
        Self {
            path: None,
            ready_timeout: 10 * 60,
        }
    }
}

impl PopulationSettings {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout)
    }
}

impl Settings {
    /// Reads the file named by `COVID_STATS__CONFIG`, if set, and the
    /// `COVID_STATS__*` environment overrides.
    pub fn new() -> anyhow::Result<Self> {
        Self::build(None)
    }

    /// Like [`Settings::new`], with `config_path` taking precedence over
    /// the `COVID_STATS__CONFIG` variable.
    pub fn build(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let config_path = match config_path {
            Some(path) => Some(path.to_string_lossy().into_owned()),
            None => std::env::var("COVID_STATS__CONFIG").ok(),
        };

        let mut builder = Config::builder();
        if let Some(config_path) = config_path {
            builder = builder.add_source(File::with_name(&config_path));
        };
        // `__` separates nested keys, so names with underscores (`base_url`) stay addressable
        builder =
            builder.add_source(config::Environment::with_prefix("COVID_STATS").separator("__"));

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;

        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let jitter = self.sources.jitter;
        if !(0.0..=1.0).contains(&jitter) {
            anyhow::bail!("sources.jitter should be within [0, 1], got {jitter}");
        }
        if self.sources.interval == 0 {
            anyhow::bail!("sources.interval should be positive");
        }
        Ok(())
    }
}
