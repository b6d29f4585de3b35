//! Configuration loader, resolver policy and path helpers.
//!
//! Uses Figment to merge `cem.toml` + `cem.<env>.toml` + `CEM_*` env vars.
//! The `resolver` section carries the population thresholds and favorite
//! ratios that used to be hardcoded per customer.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_in(Path::new("."))
    }

    /// Load `cem.toml`, `cem.<env>.toml` and `CEM_*` variables, resolving
    /// the files against `base`.
    pub fn load_in(base: &Path) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file(resolve_with_base(base, "cem.toml")));
        match env_name.as_str() {
            "dev" | "development" => {
                figment = figment.merge(Toml::file(resolve_with_base(base, "cem.dev.toml")));
            }
            "prod" | "production" => {
                figment = figment.merge(Toml::file(resolve_with_base(base, "cem.prod.toml")));
            }
            "test" | "testing" => {
                figment = figment.merge(Toml::file(resolve_with_base(base, "cem.test.toml")));
            }
            _ => {}
        }
        figment = figment.merge(Env::prefixed("CEM_").split("__"));

        let config = Self::from_figment(figment);
        config.policy()?;
        tracing::debug!(env = %env_name, base = %base.display(), "configuration loaded");
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("failed to get '{key}': {e}")))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.figment.contains(key)
    }

    /// Resolver policy under the `resolver` key, defaulted field by field.
    pub fn policy(&self) -> Result<ResolverPolicy> {
        let policy: ResolverPolicy = Figment::from(Serialized::defaults(ResolverPolicy::default()))
            .merge(self.figment.focus("resolver"))
            .extract()
            .map_err(|e| Error::InvalidConfig(format!("failed to read 'resolver': {e}")))?;
        policy.validate()?;
        Ok(policy)
    }
}

/// Population fractions deciding whether a scenario facet is worth showing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationThresholds {
    pub minimum_value_population: f64,
    pub maximum_value_population: f64,
    pub minimum_useful_values: usize,
}

impl Default for PopulationThresholds {
    fn default() -> Self {
        Self { minimum_value_population: 0.0, maximum_value_population: 1.0, minimum_useful_values: 2 }
    }
}

impl PopulationThresholds {
    /// A value is useful when its population lies strictly inside the
    /// configured fractions of `total`.
    pub fn is_useful(&self, population: u64, total: u64) -> bool {
        let population = population as f64;
        let total = total as f64;
        population > self.minimum_value_population * total && population < self.maximum_value_population * total
    }

    fn validate(&self, scope: &str) -> Result<()> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.minimum_value_population) || !in_unit(self.maximum_value_population) {
            return Err(Error::InvalidConfig(format!("{scope}: population fractions must lie in [0, 1]")));
        }
        if self.minimum_value_population > self.maximum_value_population {
            return Err(Error::InvalidConfig(format!(
                "{scope}: minimum_value_population {} exceeds maximum_value_population {}",
                self.minimum_value_population, self.maximum_value_population
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverPolicy {
    pub default_group: String,
    pub preference_index: String,
    pub thresholds: PopulationThresholds,
    /// Per-scenario replacements for `thresholds`.
    pub scenario_overrides: BTreeMap<String, PopulationThresholds>,
    pub refinement_favorite_ratio: f64,
    pub alternative_favorite_ratio: f64,
}

impl Default for ResolverPolicy {
    fn default() -> Self {
        Self {
            default_group: "search".to_string(),
            preference_index: "default".to_string(),
            thresholds: PopulationThresholds::default(),
            scenario_overrides: BTreeMap::new(),
            refinement_favorite_ratio: 1.0 / 3.0,
            alternative_favorite_ratio: 0.5,
        }
    }
}

impl ResolverPolicy {
    pub fn thresholds_for(&self, scenario: &str) -> &PopulationThresholds {
        self.scenario_overrides.get(scenario).unwrap_or(&self.thresholds)
    }

    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate("thresholds")?;
        for (scenario, thresholds) in &self.scenario_overrides {
            thresholds.validate(&format!("scenario_overrides.{scenario}"))?;
        }
        for (name, ratio) in [
            ("refinement_favorite_ratio", self.refinement_favorite_ratio),
            ("alternative_favorite_ratio", self.alternative_favorite_ratio),
        ] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(Error::InvalidConfig(format!("{name} must lie in [0, 1], got {ratio}")));
            }
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
