//! Economic and reliability attributes attached to generators.
//!
//! A [`GeneratorProfile`] is configuration, not working state: it is attached
//! to a [`Gen`](crate::Gen) once and read by every dispatch run. Every field is
//! optional and "absent" is always an explicit `None`, never a sentinel value.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Diagnostics, GridError, GridResult, Network};

/// Per-generator market and reliability data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorProfile {
    /// Market-imposed active power (MW). Positive must generate, negative must consume.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planned_setpoint: Option<f64>,
    /// Ordering key for the merit order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startup_cost: Option<f64>,
    /// Cost used to group near-marginal units.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marginal_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planned_outage_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forced_outage_rate: Option<f64>,
}

impl GeneratorProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_planned_setpoint(mut self, mw: f64) -> Self {
        self.planned_setpoint = Some(mw);
        self
    }

    pub fn with_startup_cost(mut self, cost: f64) -> Self {
        self.startup_cost = Some(cost);
        self
    }

    pub fn with_marginal_cost(mut self, cost: f64) -> Self {
        self.marginal_cost = Some(cost);
        self
    }

    /// Set both outage rates at once.
    pub fn with_outage_rates(mut self, forced: f64, planned: f64) -> Self {
        self.forced_outage_rate = Some(forced);
        self.planned_outage_rate = Some(planned);
        self
    }

    /// The imposed setpoint, if one is present and non-zero.
    pub fn imposed_setpoint(&self) -> Option<f64> {
        self.planned_setpoint.filter(|p| *p != 0.0)
    }

    /// Startup cost as a sort key; absent sorts last.
    pub fn startup_cost_key(&self) -> f64 {
        self.startup_cost.unwrap_or(f64::INFINITY)
    }

    /// `(forced, planned)` when both outage rates are known. A profile with
    /// only one of them falls back to the default abatement like a profile
    /// with none.
    pub fn outage_rates(&self) -> Option<(f64, f64)> {
        self.forced_outage_rate.zip(self.planned_outage_rate)
    }

    /// Check that present outage rates lie in `[0, 1]` and costs are not NaN.
    pub fn validate(&self) -> GridResult<()> {
        self.check().map_err(GridError::Validation)
    }

    pub(crate) fn check(&self) -> Result<(), String> {
        for (label, rate) in [
            ("forced outage rate", self.forced_outage_rate),
            ("planned outage rate", self.planned_outage_rate),
        ] {
            if let Some(r) = rate {
                if !(0.0..=1.0).contains(&r) {
                    return Err(format!("{} {} outside [0, 1]", label, r));
                }
            }
        }
        for (label, value) in [
            ("planned setpoint", self.planned_setpoint),
            ("startup cost", self.startup_cost),
            ("marginal cost", self.marginal_cost),
        ] {
            if value.is_some_and(f64::is_nan) {
                return Err(format!("{} is NaN", label));
            }
        }
        Ok(())
    }
}

/// Profiles keyed by generator name, as stored in a profile file.
///
/// ```
/// use gridhyp_core::ProfileSet;
///
/// let set = ProfileSet::from_toml_str(r#"
/// [G1]
/// startup_cost = 10.0
/// forced_outage_rate = 0.1
/// planned_outage_rate = 0.05
/// "#).unwrap();
/// assert_eq!(set.get("G1").unwrap().startup_cost, Some(10.0));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileSet {
    profiles: BTreeMap<String, GeneratorProfile>,
}

impl ProfileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, gen_name: impl Into<String>, profile: GeneratorProfile) {
        self.profiles.insert(gen_name.into(), profile);
    }

    pub fn get(&self, gen_name: &str) -> Option<&GeneratorProfile> {
        self.profiles.get(gen_name)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &GeneratorProfile)> {
        self.profiles.iter()
    }

    pub fn from_json_str(s: &str) -> GridResult<Self> {
        let set: Self = serde_json::from_str(s)?;
        set.validate()?;
        Ok(set)
    }

    pub fn from_toml_str(s: &str) -> GridResult<Self> {
        let set: Self = toml::from_str(s)?;
        set.validate()?;
        Ok(set)
    }

    pub fn to_json_string(&self) -> GridResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a profile file, choosing the format from its extension.
    pub fn load(path: impl AsRef<Path>) -> GridResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            Some("toml") => Self::from_toml_str(&text),
            other => Err(GridError::Config(format!(
                "unsupported profile file extension {:?} for {}",
                other,
                path.display()
            ))),
        }
    }

    fn validate(&self) -> GridResult<()> {
        for (name, profile) in &self.profiles {
            profile
                .validate()
                .map_err(|e| GridError::Validation(format!("profile for {}: {}", name, e)))?;
        }
        Ok(())
    }

    /// Attach every profile to the generator of the same name.
    ///
    /// Names matching no generator are reported as `profile` warnings.
    /// Returns the number of profiles attached.
    pub fn apply_to(&self, network: &mut Network, diag: &mut Diagnostics) -> GridResult<usize> {
        let nodes = network.generator_nodes_by_name();
        let mut attached = 0;
        for (name, profile) in &self.profiles {
            match nodes.get(name).and_then(|&index| network.generator_at_mut(index)) {
                Some(gen) => {
                    profile
                        .check()
                        .map_err(|e| GridError::Validation(format!("{}: {}", name, e)))?;
                    gen.profile = Some(profile.clone());
                    attached += 1;
                }
                None => {
                    warn!(generator = %name, "profile matches no generator");
                    diag.add_warning_with_entity(
                        "profile",
                        "Profile matches no generator in the network",
                        name,
                    );
                }
            }
        }
        debug!(attached, total = self.profiles.len(), "applied generator profiles");
        Ok(attached)
    }
}
