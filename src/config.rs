use std::collections::HashSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::tracker::client::DEFAULT_PAGE_SIZE;

pub const DEFAULT_JIRA_URL: &str = "https://issues.citrite.net";
pub const DEFAULT_INFLUX_WRITE_URL: &str = "http://localhost:8086/write?db=inforad";

const DRV_FIELD: &str = "customfield_18131";
const STORY_POINTS_FIELD: &str = "customfield_11332";

/// A dashboard key fed by the match count of a saved filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountQuery {
    pub key: String,
    pub filter: u64,
}

/// A dashboard key fed by the sum of a numeric field over a saved filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSumQuery {
    pub key: String,
    pub filter: u64,
    pub field: String,
    /// Decimal places kept in the reported value. `None` reports the raw sum.
    #[serde(default)]
    pub decimals: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityConfig {
    /// When false, no velocity metric is computed or written.
    pub enabled: bool,
    pub key: String,
    pub board: u64,
    /// Sprint name pattern, matched from the start of the name.
    /// Omitted in a config file means every sprint name is eligible.
    #[serde(default)]
    pub sprint_pattern: Option<String>,
    pub window: usize,
}

/// Run configuration. Built once and passed to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub jira_url: String,
    pub influx_write_url: String,
    pub page_size: u32,
    pub counts: Vec<CountQuery>,
    pub field_sums: Vec<FieldSumQuery>,
    pub velocity: VelocityConfig,
}

/// Largest `decimals` a field sum may request; beyond this `10^decimals`
/// is no longer exact in an f64.
pub const MAX_DECIMALS: u32 = 15;

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key: "sprint_velocity".into(),
            board: 70,
            sprint_pattern: Some(r"^xs-ring3\s.+".into()),
            window: 3,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let counts = [
            ("dc_inbox", 47168),
            ("CA,priority=Blocker", 47165),
            ("CA,priority=Critical", 47166),
            ("CA,priority=Major", 47167),
            ("CA,priority=MinorAndTrivial", 47876),
            ("CA,priority=Non-bug", 48477),
            ("CA,workflow=Blocked", 52664),
            ("SCTX", 47170),
            ("XOP", 47169),
            ("PAR", 47171),
            ("Hotlist", 47531),
            ("Staging", 48797),
            ("FalconMustFix", 57062),
        ]
        .into_iter()
        .map(|(key, filter)| CountQuery {
            key: key.to_string(),
            filter,
        })
        .collect();

        let field_sums = vec![
            FieldSumQuery {
                key: "CA,priority=QRF".into(),
                filter: 47875,
                field: DRV_FIELD.into(),
                decimals: Some(3),
            },
            FieldSumQuery {
                key: "backlog_depth".into(),
                filter: 50374,
                field: STORY_POINTS_FIELD.into(),
                decimals: Some(2),
            },
            FieldSumQuery {
                key: "sprint_burndown".into(),
                filter: 50375,
                field: STORY_POINTS_FIELD.into(),
                decimals: None,
            },
        ];

        Self {
            jira_url: DEFAULT_JIRA_URL.into(),
            influx_write_url: DEFAULT_INFLUX_WRITE_URL.into(),
            page_size: DEFAULT_PAGE_SIZE,
            counts,
            field_sums,
            velocity: VelocityConfig::default(),
        }
    }
}

impl Config {
    /// Default config file location: `~/.jiradash/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".jiradash").join("config.toml"))
    }

    /// Load from an explicit path, else the default path if it exists,
    /// else the built-in defaults. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => Self::from_file(p)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(p) => Self::from_file(&p)?,
                None => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        log::debug!("Loaded config from {}", path.display());
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.jira_url)?;
        Url::parse(&self.influx_write_url)?;
        if self.page_size == 0 {
            return Err(Error::Config("page_size must be positive".into()));
        }

        let mut seen = HashSet::new();
        let keys = self
            .counts
            .iter()
            .map(|c| c.key.as_str())
            .chain(self.field_sums.iter().map(|f| f.key.as_str()))
            .chain(self.velocity().map(|v| v.key.as_str()));
        for key in keys {
            if key.is_empty() {
                return Err(Error::Config("metric key must not be empty".into()));
            }
            if !seen.insert(key) {
                return Err(Error::Config(format!("duplicate metric key: {key}")));
            }
        }

        for f in &self.field_sums {
            if f.decimals.is_some_and(|d| d > MAX_DECIMALS) {
                return Err(Error::Config(format!(
                    "{}: decimals must be at most {MAX_DECIMALS}",
                    f.key
                )));
            }
        }

        if let Some(v) = self.velocity() {
            if v.window == 0 {
                return Err(Error::Config("velocity window must be positive".into()));
            }
            v.pattern()?;
        }
        Ok(())
    }

    /// Velocity settings, unless velocity is disabled.
    pub fn velocity(&self) -> Option<&VelocityConfig> {
        Some(&self.velocity).filter(|v| v.enabled)
    }
}

impl VelocityConfig {
    /// Compiled sprint name pattern, anchored at the start of the name.
    pub fn pattern(&self) -> Result<Option<Regex>> {
        match &self.sprint_pattern {
            Some(p) => Ok(Some(anchored_pattern(p)?)),
            None => Ok(None),
        }
    }
}

/// Compile `pattern` so it only matches at the start of the input.
pub fn anchored_pattern(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("^(?:{pattern})"))?)
}
