use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;
use tokio::sync::watch;

#[derive(Error, Debug)]
pub enum PopulationError {
    #[error("invalid age bracket '{0}'")]
    InvalidAgeBracket(String),
    #[error("population figures will never become available")]
    Abandoned,
    #[error("couldn't read population file {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("couldn't parse population file {0}: {1}")]
    Parse(PathBuf, serde_json::Error),
}

/// Inclusive age range, open-ended when `high` is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeBracket {
    pub low: u32,
    pub high: Option<u32>,
}

impl AgeBracket {
    pub fn contains(&self, age: u32) -> bool {
        age >= self.low && self.high.map_or(true, |high| age <= high)
    }
}

impl FromStr for AgeBracket {
    type Err = PopulationError;

    /// Parses `"low-high"` or `"low+"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PopulationError::InvalidAgeBracket(s.to_string());
        let bracket = match s.strip_suffix('+') {
            Some(low) => AgeBracket {
                low: low.trim().parse().map_err(|_| invalid())?,
                high: None,
            },
            None => {
                let (low, high) = s.split_once('-').ok_or_else(invalid)?;
                AgeBracket {
                    low: low.trim().parse().map_err(|_| invalid())?,
                    high: Some(high.trim().parse().map_err(|_| invalid())?),
                }
            }
        };
        match bracket.high {
            Some(high) if high < bracket.low => Err(invalid()),
            _ => Ok(bracket),
        }
    }
}

impl fmt::Display for AgeBracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.high {
            Some(high) => write!(f, "{}-{}", self.low, high),
            None => write!(f, "{}+", self.low),
        }
    }
}

/// Source of population figures used to turn counts into rates.
#[async_trait]
pub trait PopulationProvider: Send + Sync {
    fn for_region(&self, region: &str) -> Option<u64>;
    fn for_age_bracket(&self, bracket: &AgeBracket) -> Option<u64>;

    /// Resolves once figures are available.
    async fn wait_till_ready(&self) -> Result<(), PopulationError>;
}

/// Population counts per region and per single year of age.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Figures {
    #[serde(default)]
    pub regions: HashMap<String, u64>,
    #[serde(default)]
    pub ages: BTreeMap<u32, u64>,
}

/// In-memory [`PopulationProvider`]. Starts empty; lookups return `None`
/// and waiters suspend until [`Population::load`] is called.
pub struct Population {
    figures: RwLock<Figures>,
    ready_sender: watch::Sender<bool>,
    ready: watch::Receiver<bool>,
}

impl Default for Population {
    fn default() -> Self {
        let (ready_sender, ready) = watch::channel(false);
        Self {
            figures: Default::default(),
            ready_sender,
            ready,
        }
    }
}

impl Population {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_figures(figures: Figures) -> Self {
        let population = Self::new();
        population.load(figures);
        population
    }

    pub fn load(&self, figures: Figures) {
        tracing::info!(
            regions = figures.regions.len(),
            ages = figures.ages.len(),
            "population figures loaded"
        );
        *self.figures.write() = figures;
        self.ready_sender.send_replace(true);
    }

    /// Loads figures from a JSON file of the form
    /// `{"regions": {"Flanders": 6653062}, "ages": {"0": 61234}}`.
    pub async fn load_file(&self, path: &Path) -> Result<(), PopulationError> {
        let content = tokio::fs::read(path)
            .await
            .map_err(|err| PopulationError::Read(path.to_path_buf(), err))?;
        let figures = serde_json::from_slice(&content)
            .map_err(|err| PopulationError::Parse(path.to_path_buf(), err))?;
        self.load(figures);
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }
}

#[async_trait]
impl PopulationProvider for Population {
    fn for_region(&self, region: &str) -> Option<u64> {
        self.figures.read().regions.get(region).copied()
    }

    fn for_age_bracket(&self, bracket: &AgeBracket) -> Option<u64> {
        let figures = self.figures.read();
        let mut counts = match bracket.high {
            Some(high) => figures.ages.range(bracket.low..=high).peekable(),
            None => figures.ages.range(bracket.low..).peekable(),
        };
        counts.peek()?;
        Some(counts.map(|(_, count)| count).sum())
    }

    async fn wait_till_ready(&self) -> Result<(), PopulationError> {
        let mut ready = self.ready.clone();
        ready
            .wait_for(|ready| *ready)
            .await
            .map_err(|_| PopulationError::Abandoned)?;
        Ok(())
    }
}
