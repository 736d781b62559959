//! Configuration documents.
//!
//! Every struct here deserializes from JSON with `#[serde(default)]`, so a
//! document only needs the fields it changes:
//!
//! ```
//! use skirmish_core::config::SimConfig;
//!
//! let config = SimConfig::from_json_str(r#"{ "rounds": 3 }"#).unwrap();
//! assert_eq!(config.rounds, 3);
//! assert_eq!(config.matches[0].mode.as_str(), "deathmatch");
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, MapId, ModeId};
use crate::error::{read_json, ConfigError};
use crate::plugins::{DeathmatchConfig, DeathmatchPlugin, ScavengerConfig};
use crate::tables::ResourceTables;

/// Mode and map of one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Game mode, used to select the plugin.
    pub mode: ModeId,
    /// Map the match runs on.
    pub map: MapId,
}

impl MatchConfig {
    /// Creates a match configuration.
    #[must_use]
    pub fn new(mode: &str, map: &str) -> Self {
        Self {
            mode: ModeId::new(mode),
            map: MapId::new(map),
        }
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            mode: ModeId::new(DeathmatchPlugin::MODE),
            map: MapId::default(),
        }
    }
}

/// Settings of the built-in modes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModesConfig {
    /// Deathmatch loadout and rewards.
    pub deathmatch: DeathmatchConfig,
    /// Scavenger tuning.
    pub scavenger: ScavengerConfig,
}

/// Settings of the headless match harness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Static definitions file. The standard catalog is used when absent.
    pub catalog: Option<PathBuf>,
    /// Resource tables file. The standard tables are used when absent.
    pub tables: Option<PathBuf>,
    /// Built-in mode settings.
    pub modes: ModesConfig,
    /// Matches to run side by side.
    pub matches: Vec<MatchConfig>,
    /// Participants joining each match.
    pub players_per_match: usize,
    /// Scripted kill rounds per match.
    pub rounds: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            catalog: None,
            tables: None,
            modes: ModesConfig::default(),
            matches: vec![
                MatchConfig::default(),
                MatchConfig::new("scavenger", "woods"),
                MatchConfig::new("deathmatch", "cobalt"),
            ],
            players_per_match: 4,
            rounds: 8,
        }
    }
}

impl SimConfig {
    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`], [`ConfigError::Parse`] or
    /// [`ConfigError::Invalid`].
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = read_json(path)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.players_per_match < 2 {
            return Err(ConfigError::Invalid(format!(
                "players_per_match must be at least 2, got {}",
                self.players_per_match
            )));
        }
        if self.matches.is_empty() {
            return Err(ConfigError::Invalid("no matches configured".to_string()));
        }
        Ok(())
    }

    /// Loads the configured catalog, or the standard one.
    ///
    /// # Errors
    ///
    /// Propagates [`Catalog::from_path`] failures.
    pub fn load_catalog(&self) -> Result<Catalog, ConfigError> {
        self.catalog
            .as_deref()
            .map_or_else(|| Ok(Catalog::standard()), Catalog::from_path)
    }

    /// Loads the configured resource tables, or the standard ones.
    ///
    /// # Errors
    ///
    /// Propagates [`ResourceTables::from_path`] failures.
    pub fn load_tables(&self) -> Result<ResourceTables, ConfigError> {
        self.tables
            .as_deref()
            .map_or_else(|| Ok(ResourceTables::standard()), ResourceTables::from_path)
    }
}
