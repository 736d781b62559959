//! Hosting several matches side by side.
//!
//! Matches share nothing mutable: each owns its roster, bus and plugin
//! instance, and only the catalog and resource tables are shared, by `Arc`.
//! [`MatchHost::step_all`] therefore steps every match on the rayon pool,
//! while events inside one match stay strictly sequential.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use skirmish_core::catalog::Catalog;
//! use skirmish_core::config::{MatchConfig, ModesConfig};
//! use skirmish_core::host::MatchHost;
//! use skirmish_core::plugin::PluginManager;
//! use skirmish_core::tables::ResourceTables;
//!
//! let plugins = PluginManager::with_builtin_modes(&ModesConfig::default());
//! let mut host = MatchHost::new(Arc::new(Catalog::standard()), Arc::new(ResourceTables::standard()));
//! let a = host.open(MatchConfig::new("deathmatch", "main"), &plugins).unwrap();
//! let b = host.open(MatchConfig::new("scavenger", "woods"), &plugins).unwrap();
//!
//! host.get_mut(a).unwrap().join("ada");
//! host.get_mut(b).unwrap().join("bob");
//!
//! let reports = host.step_all();
//! assert_eq!(reports.len(), 2);
//! assert_eq!(host.len(), 2);
//! ```

use std::sync::Arc;

use rayon::prelude::*;
use tracing::info;

use crate::catalog::Catalog;
use crate::config::MatchConfig;
use crate::error::BusError;
use crate::plugin::PluginManager;
use crate::roster::Roster;
use crate::simulation::{MatchSimulation, TickReport};
use crate::tables::ResourceTables;

/// Index of a match within a [`MatchHost`].
pub type MatchIndex = usize;

/// A set of independently running matches.
#[derive(Debug)]
pub struct MatchHost {
    catalog: Arc<Catalog>,
    tables: Arc<ResourceTables>,
    matches: Vec<MatchSimulation>,
}

impl MatchHost {
    /// Creates a host sharing the given definitions and tables.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>, tables: Arc<ResourceTables>) -> Self {
        Self {
            catalog,
            tables,
            matches: Vec::new(),
        }
    }

    /// Starts a match and returns its index.
    ///
    /// # Errors
    ///
    /// Propagates plugin activation failures.
    pub fn open(
        &mut self,
        config: MatchConfig,
        plugins: &PluginManager,
    ) -> Result<MatchIndex, BusError> {
        let sim = MatchSimulation::new(
            config,
            Arc::clone(&self.catalog),
            Arc::clone(&self.tables),
            plugins,
        )?;
        self.matches.push(sim);
        Ok(self.matches.len() - 1)
    }

    /// Returns a match by index.
    #[must_use]
    pub fn get(&self, index: MatchIndex) -> Option<&MatchSimulation> {
        self.matches.get(index)
    }

    /// Returns a match mutably by index.
    #[must_use]
    pub fn get_mut(&mut self, index: MatchIndex) -> Option<&mut MatchSimulation> {
        self.matches.get_mut(index)
    }

    /// Iterates mutably over all matches, in index order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut MatchSimulation> {
        self.matches.iter_mut()
    }

    /// Number of matches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// Returns `true` if no match is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Steps every match once, in parallel. Reports are in index order.
    pub fn step_all(&mut self) -> Vec<TickReport> {
        self.matches.par_iter_mut().map(MatchSimulation::step).collect()
    }

    /// Ends every match and returns the final rosters in index order.
    pub fn close_all(self) -> Vec<Roster> {
        info!(matches = self.matches.len(), "closing all matches");
        self.matches.into_iter().map(MatchSimulation::end).collect()
    }
}
