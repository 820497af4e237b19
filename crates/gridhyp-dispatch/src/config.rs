//! Dispatch parameters.
//!
//! Every field has a default so partial TOML files are accepted:
//!
//! ```toml
//! loss_factor = 0.02
//! default_abatement_coefficient = 0.1
//! marginal_mode = "regional"
//! start_at_max = ["NUC_A"]
//!
//! [adequacy_margins]
//! nuclear = 0.05
//!
//! [regional]
//! tolerance_mw = 0.1
//! ```

use std::path::Path;

use anyhow::Context;
use gridhyp_core::{EnergySource, GridError};
use serde::{Deserialize, Serialize};

use crate::DispatchError;

/// How the marginal block of an area is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginalMode {
    /// The marginal unit closes the gap on its own
    #[default]
    Basic,
    /// The near-marginal cohort is rebalanced across regions
    Regional,
}

/// Share of capacity withheld from dispatch, per energy source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdequacyMargins {
    pub nuclear: f64,
    pub thermal: f64,
    pub hydro: f64,
}

impl Default for AdequacyMargins {
    fn default() -> Self {
        Self {
            nuclear: 0.05,
            thermal: 0.1,
            hydro: 0.1,
        }
    }
}

impl AdequacyMargins {
    /// Margin ratio for a source; sources without a band get 0.
    pub fn ratio(&self, source: EnergySource) -> f64 {
        match source {
            EnergySource::Nuclear => self.nuclear,
            EnergySource::Thermal => self.thermal,
            EnergySource::Hydro => self.hydro,
            _ => 0.0,
        }
    }
}

/// Tolerances of the regional refinement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionalConfig {
    /// Marginal-cost band defining the cohort around the marginal unit
    pub cost_epsilon: f64,
    /// Absolute tolerance on the redistributed volume (MW)
    pub tolerance_mw: f64,
    /// Minimum curvature of a region term
    pub degeneracy_epsilon: f64,
}

impl Default for RegionalConfig {
    fn default() -> Self {
        Self {
            cost_epsilon: 0.005,
            tolerance_mw: 0.1,
            degeneracy_epsilon: 1e-5,
        }
    }
}

/// Parameters of one dispatch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Network-wide active loss factor applied to every load
    pub loss_factor: f64,
    /// Capacity reduction for units without outage rates (used when in (0, 1))
    pub default_abatement_coefficient: f64,
    /// Minimum setpoint (MW) for enabling voltage control
    pub p_threshold: f64,
    /// Minimum reactive span at P = 0 (Mvar) for enabling voltage control
    pub q_threshold: f64,
    pub adequacy_margins: AdequacyMargins,
    pub marginal_mode: MarginalMode,
    /// Component number of the main area
    pub main_component: usize,
    /// Generators started at full available power when selected
    pub start_at_max: Vec<String>,
    pub regional: RegionalConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            loss_factor: 0.0,
            default_abatement_coefficient: 0.0,
            p_threshold: 0.0,
            q_threshold: 0.0,
            adequacy_margins: AdequacyMargins::default(),
            marginal_mode: MarginalMode::Basic,
            main_component: 0,
            start_at_max: Vec::new(),
            regional: RegionalConfig::default(),
        }
    }
}

impl DispatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loss_factor(mut self, loss_factor: f64) -> Self {
        self.loss_factor = loss_factor;
        self
    }

    pub fn with_default_abatement(mut self, coefficient: f64) -> Self {
        self.default_abatement_coefficient = coefficient;
        self
    }

    /// Set voltage control thresholds (MW, Mvar)
    pub fn with_voltage_thresholds(mut self, p_threshold: f64, q_threshold: f64) -> Self {
        self.p_threshold = p_threshold;
        self.q_threshold = q_threshold;
        self
    }

    pub fn with_adequacy_margins(mut self, margins: AdequacyMargins) -> Self {
        self.adequacy_margins = margins;
        self
    }

    pub fn with_marginal_mode(mut self, mode: MarginalMode) -> Self {
        self.marginal_mode = mode;
        self
    }

    pub fn with_main_component(mut self, component: usize) -> Self {
        self.main_component = component;
        self
    }

    /// Add a generator (by name) to the start-at-max set
    pub fn with_start_at_max(mut self, gen_name: impl Into<String>) -> Self {
        self.start_at_max.push(gen_name.into());
        self
    }

    pub fn with_regional(mut self, regional: RegionalConfig) -> Self {
        self.regional = regional;
        self
    }

    pub fn is_start_at_max(&self, gen_name: &str) -> bool {
        self.start_at_max.iter().any(|n| n == gen_name)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, DispatchError> {
        let config: Self = toml::from_str(s).map_err(GridError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DispatchError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading dispatch config {}", path.display()))
            .map_err(GridError::from)?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String, DispatchError> {
        toml::to_string_pretty(self).map_err(|e| GridError::Parse(e.to_string()).into())
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if !self.loss_factor.is_finite() || self.loss_factor < 0.0 {
            return Err(DispatchError::Config(format!(
                "loss factor {} must be finite and non-negative",
                self.loss_factor
            )));
        }
        for (label, value) in [
            ("default abatement coefficient", self.default_abatement_coefficient),
            ("p threshold", self.p_threshold),
            ("q threshold", self.q_threshold),
        ] {
            if !value.is_finite() {
                return Err(DispatchError::Config(format!("{} {} is not finite", label, value)));
            }
        }
        let m = &self.adequacy_margins;
        for (label, ratio) in [("nuclear", m.nuclear), ("thermal", m.thermal), ("hydro", m.hydro)] {
            if !(0.0..1.0).contains(&ratio) {
                return Err(DispatchError::Config(format!(
                    "{} adequacy margin {} outside [0, 1)",
                    label, ratio
                )));
            }
        }
        let r = &self.regional;
        if r.cost_epsilon.is_nan() || r.cost_epsilon < 0.0 {
            return Err(DispatchError::Config(format!(
                "regional cost epsilon {} must be non-negative",
                r.cost_epsilon
            )));
        }
        if r.tolerance_mw.is_nan()
            || r.tolerance_mw <= 0.0
            || r.degeneracy_epsilon.is_nan()
            || r.degeneracy_epsilon <= 0.0
        {
            return Err(DispatchError::Config(
                "regional tolerances must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
