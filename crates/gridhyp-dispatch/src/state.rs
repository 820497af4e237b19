//! Per-generator working state of one dispatch run.

use gridhyp_core::{EnergySource, Gen, GenId, GeneratorProfile, NodeIndex};
use serde::Serialize;

/// Mutable state of a generator, created fresh for every run.
///
/// Once `imposed` is set the setpoint is frozen for the rest of the run.
#[derive(Debug, Clone)]
pub struct UnitState {
    /// Read-only view of the generator as seen when the run started
    pub gen: Gen,
    /// Where the generator lives in the network graph, when known
    pub node: Option<NodeIndex>,
    pub available: bool,
    pub available_power_mw: f64,
    setpoint_mw: f64,
    pub imposed: bool,
    pub usable: bool,
    /// Member of the start-at-max override set
    pub forced_max: bool,
    /// Listed in the area's started units
    pub started: bool,
}

impl UnitState {
    pub fn new(gen: Gen) -> Self {
        Self {
            gen,
            node: None,
            available: false,
            available_power_mw: 0.0,
            setpoint_mw: 0.0,
            imposed: false,
            usable: false,
            forced_max: false,
            started: false,
        }
    }

    /// Remember the graph node of the generator so commit can reach it
    /// without a lookup.
    pub fn at_node(mut self, node: NodeIndex) -> Self {
        self.node = Some(node);
        self
    }

    pub fn id(&self) -> GenId {
        self.gen.id
    }

    pub fn name(&self) -> &str {
        &self.gen.name
    }

    pub fn energy_source(&self) -> EnergySource {
        self.gen.energy_source
    }

    pub fn profile(&self) -> Option<&GeneratorProfile> {
        self.gen.profile.as_ref()
    }

    pub fn setpoint_mw(&self) -> f64 {
        self.setpoint_mw
    }

    /// Startup cost used for ordering; a unit without profile sorts last.
    pub fn startup_cost_key(&self) -> f64 {
        self.profile()
            .map(GeneratorProfile::startup_cost_key)
            .unwrap_or(f64::INFINITY)
    }

    pub fn marginal_cost(&self) -> Option<f64> {
        self.profile().and_then(|p| p.marginal_cost)
    }

    /// Lowest setpoint the allocator may use: `min(0, pmin)`.
    pub fn floor_mw(&self) -> f64 {
        self.gen.pmin.value().min(0.0)
    }

    /// Candidate for the greedy allocator.
    pub fn is_dispatchable(&self) -> bool {
        self.usable && !self.imposed
    }

    /// Freeze the unit at its planned setpoint.
    pub fn impose(&mut self, setpoint_mw: f64) {
        self.available_power_mw = 0.0;
        self.setpoint_mw = setpoint_mw;
        self.imposed = true;
        self.available = true;
        self.usable = true;
    }

    /// Exclude the unit from this run.
    pub fn exclude(&mut self) {
        self.available = false;
        self.usable = false;
    }

    pub fn make_available(&mut self, power_mw: f64) {
        self.available_power_mw = power_mw;
        self.available = true;
        self.usable = true;
    }

    /// Set the allocated setpoint. Returns `false` (and changes nothing)
    /// for an imposed unit.
    pub fn assign(&mut self, setpoint_mw: f64) -> bool {
        if self.imposed {
            return false;
        }
        self.setpoint_mw = setpoint_mw;
        true
    }
}

/// Serializable snapshot of a started unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartedUnit {
    pub name: String,
    pub setpoint_mw: f64,
    pub imposed: bool,
}

impl From<&UnitState> for StartedUnit {
    fn from(unit: &UnitState) -> Self {
        Self {
            name: unit.name().to_string(),
            setpoint_mw: unit.setpoint_mw(),
            imposed: unit.imposed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridhyp_core::BusId;

    fn unit(pmin: f64) -> UnitState {
        UnitState::new(Gen::new(GenId::new(1), "G1".into(), BusId::new(1)).with_p_limits(pmin, 100.0))
    }

    #[test]
    fn test_fresh_state() {
        let u = unit(0.0);
        assert!(!u.available);
        assert!(!u.usable);
        assert_eq!(u.available_power_mw, 0.0);
        assert_eq!(u.setpoint_mw(), 0.0);
        assert_eq!(u.startup_cost_key(), f64::INFINITY);
    }

    #[test]
    fn test_imposed_setpoint_is_frozen() {
        let mut u = unit(0.0);
        u.impose(-10.0);
        assert!(!u.assign(50.0));
        assert_eq!(u.setpoint_mw(), -10.0);
        assert!(!u.is_dispatchable());
    }

    #[test]
    fn test_floor() {
        assert_eq!(unit(-10.0).floor_mw(), -10.0);
        assert_eq!(unit(20.0).floor_mw(), 0.0);
    }
}
