//! Balancing areas and the partitioner building them.
//!
//! One [`Area`] exists per connected component holding at least one
//! in-service generator or load. Areas live for a single run.

use std::collections::BTreeMap;

use gridhyp_core::{ComponentMap, Diagnostics, Load, Network, Node};
use serde::Serialize;
use tracing::{debug, warn};

use crate::state::UnitState;

/// Progress of an area through a dispatch run.
///
/// `Pending -> Evaluated -> Stacked -> Committed`, with `Infeasible` and
/// `Isolated` as the two inactive outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaStatus {
    Pending,
    Evaluated,
    Stacked,
    Committed,
    /// Demand exceeds imposed plus available generation
    Infeasible,
    /// Secondary component with nothing to balance
    Isolated,
}

impl AreaStatus {
    pub fn is_active(self) -> bool {
        !matches!(self, AreaStatus::Infeasible | AreaStatus::Isolated)
    }
}

/// An independently balanced part of the network.
#[derive(Debug, Clone)]
pub struct Area {
    /// Connected-component number
    pub component: usize,
    pub name: String,
    pub status: AreaStatus,
    pub units: Vec<UnitState>,
    pub loads: Vec<Load>,
    /// Loads including losses (MW)
    pub load_consumption_mw: f64,
    /// Fictitious share of `load_consumption_mw`
    pub fictitious_consumption_mw: f64,
    /// Loads including losses plus negative imposed setpoints (MW)
    pub total_consumption_mw: f64,
    pub imposed_power_mw: f64,
    pub available_capacity_mw: f64,
    /// Indices into `units`, in start order
    pub started: Vec<usize>,
    /// Index into `units` of the unit closing the gap
    pub marginal: Option<usize>,
}

impl Area {
    pub fn new(component: usize) -> Self {
        Self {
            component,
            name: format!("Area{}", component),
            status: AreaStatus::Pending,
            units: Vec::new(),
            loads: Vec::new(),
            load_consumption_mw: 0.0,
            fictitious_consumption_mw: 0.0,
            total_consumption_mw: 0.0,
            imposed_power_mw: 0.0,
            available_capacity_mw: 0.0,
            started: Vec::new(),
            marginal: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Record a unit as started once.
    pub fn mark_started(&mut self, index: usize) {
        let unit = &mut self.units[index];
        if !unit.started {
            unit.started = true;
            self.started.push(index);
        }
    }

    pub fn started_units(&self) -> impl Iterator<Item = &UnitState> {
        self.started.iter().map(move |&i| &self.units[i])
    }

    /// Sum of the setpoints of every started unit.
    pub fn committed_mw(&self) -> f64 {
        self.started_units().map(UnitState::setpoint_mw).sum()
    }

    pub fn marginal_unit(&self) -> Option<&UnitState> {
        self.marginal.map(|i| &self.units[i])
    }
}

/// Group in-service generators and loads into areas by connected component.
///
/// Elements whose bus belongs to no component are skipped with a `topology`
/// warning. The result is ordered by component number.
pub fn partition(
    network: &Network,
    components: &ComponentMap,
    diag: &mut Diagnostics,
) -> BTreeMap<usize, Area> {
    let mut areas: BTreeMap<usize, Area> = BTreeMap::new();

    for index in network.graph.node_indices() {
        match &network.graph[index] {
            Node::Gen(gen) if gen.status => match components.component_of(gen.bus) {
                Some(c) => areas
                    .entry(c)
                    .or_insert_with(|| Area::new(c))
                    .units
                    .push(UnitState::new(gen.clone()).at_node(index)),
                None => {
                    warn!(generator = %gen.name, bus = %gen.bus, "generator bus not in any component");
                    diag.add_warning_with_entity(
                        "topology",
                        "Generator bus belongs to no connected component; generator ignored",
                        &gen.name,
                    );
                }
            },
            Node::Load(load) => match components.component_of(load.bus) {
                Some(c) => areas
                    .entry(c)
                    .or_insert_with(|| Area::new(c))
                    .loads
                    .push(load.clone()),
                None => {
                    warn!(load = %load.name, bus = %load.bus, "load bus not in any component");
                    diag.add_warning_with_entity(
                        "topology",
                        "Load bus belongs to no connected component; load ignored",
                        &load.name,
                    );
                }
            },
            _ => {}
        }
    }

    debug!(areas = areas.len(), "partitioned network into areas");
    areas
}
