//! Planner configuration (§11): layered defaults → `planner.toml` → env,
//! following the teacher's figment-based configuration discipline.

use crate::driver::{CompilerOptions, RuntimeFeatures};
use crate::error::ConfigError;
use crate::provider::{IndexEstimator, StorageProvider};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// The subset of `CompilerOptions` that is plain data and therefore
/// serializable; the provider and estimator are always supplied by the
/// caller via [`PlannerConfig::into_options`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannerConfig {
    pub join_scan_enabled: bool,
    pub broadcast_join: bool,
    pub aggregate_in_exchange: bool,
    pub allow_unresolved: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            join_scan_enabled: true,
            broadcast_join: true,
            aggregate_in_exchange: true,
            allow_unresolved: false,
        }
    }
}

impl PlannerConfig {
    /// Load configuration by layering compiled-in defaults, an optional
    /// `planner.toml` in the current directory, then `YUGAWARA_`-prefixed
    /// environment variables, in that order.
    pub fn load() -> Result<Self, ConfigError> {
        Figment::from(Serialized::defaults(PlannerConfig::default()))
            .merge(Toml::file("planner.toml"))
            .merge(Env::prefixed("YUGAWARA_"))
            .extract()
            .map_err(ConfigError::Load)
    }

    /// Build a full [`CompilerOptions`] by pairing this configuration with
    /// caller-supplied provider/estimator implementations.
    pub fn into_options<'a>(
        self,
        storage_provider: &'a dyn StorageProvider,
        index_estimator: &'a dyn IndexEstimator,
    ) -> CompilerOptions<'a> {
        CompilerOptions {
            storage_provider,
            index_estimator,
            runtime_features: RuntimeFeatures {
                broadcast_join: self.broadcast_join,
                aggregate_in_exchange: self.aggregate_in_exchange,
            },
            join_scan_enabled: self.join_scan_enabled,
            allow_unresolved: self.allow_unresolved,
        }
    }
}
