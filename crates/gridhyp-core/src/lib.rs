//! # gridhyp-core: Network model for dispatch hypotheses
//!
//! Provides the data structures the dispatch engine reads from and writes back
//! to: buses, generators, loads and branches held in an undirected petgraph.
//!
//! ## Design Philosophy
//!
//! Networks are modeled as **undirected multigraphs** where:
//! - **Nodes**: Buses, Generators (gen), Loads (load)
//! - **Edges**: Branches (lines and transformers)
//!
//! Generators and loads reference their bus by [`BusId`]; electrical
//! connectivity is carried by the branches between buses (see
//! [`connectivity`]).
//!
//! ## Quick Start
//!
//! ```rust
//! use gridhyp_core::*;
//!
//! let mut network = Network::new();
//!
//! let b1 = network.graph.add_node(Node::Bus(Bus {
//!     id: BusId::new(1),
//!     name: "Bus 1".to_string(),
//!     base_kv: Kilovolts(225.0),
//!     ..Bus::default()
//! }));
//! let b2 = network.graph.add_node(Node::Bus(Bus {
//!     id: BusId::new(2),
//!     name: "Bus 2".to_string(),
//!     base_kv: Kilovolts(225.0),
//!     ..Bus::default()
//! }));
//!
//! network.graph.add_node(Node::Gen(
//!     Gen::new(GenId::new(1), "G1".to_string(), BusId::new(1))
//!         .with_energy_source(EnergySource::Thermal)
//!         .with_p_limits(0.0, 100.0),
//! ));
//! network.graph.add_node(Node::Load(Load::new(
//!     LoadId::new(1),
//!     "L1".to_string(),
//!     BusId::new(2),
//!     50.0,
//! )));
//! network.graph.add_edge(
//!     b1,
//!     b2,
//!     Edge::Branch(Branch::new(BranchId::new(1), "L1-2".into(), BusId::new(1), BusId::new(2))),
//! );
//!
//! network
//!     .attach_profile(GenId::new(1), GeneratorProfile::new().with_startup_cost(12.0))
//!     .unwrap();
//! assert_eq!(network.stats().num_gens, 1);
//! ```
//!
//! ## Modules
//!
//! - [`connectivity`] - Connected components between buses
//! - [`diagnostics`] - Severity-leveled issue reporting
//! - [`profile`] - Generator economic/reliability profiles and profile files
//! - [`units`] - Unit newtypes

use std::collections::HashMap;

use petgraph::{prelude::*, Undirected};
use serde::{Deserialize, Serialize};

pub mod connectivity;
pub mod diagnostics;
pub mod error;
pub mod profile;
pub mod units;

pub use connectivity::{connected_components, ComponentMap};
pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{GridError, GridResult};
pub use petgraph::graph::NodeIndex;
pub use profile::{GeneratorProfile, ProfileSet};
pub use units::{Kilovolts, Megavars, Megawatts};

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadId(usize);

macro_rules! impl_id {
    ($name:ident) => {
        impl $name {
            #[inline]
            pub fn new(value: usize) -> Self {
                $name(value)
            }
            #[inline]
            pub fn value(&self) -> usize {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

impl_id!(BusId);
impl_id!(BranchId);
impl_id!(GenId);
impl_id!(LoadId);

/// Primary energy of a generating unit.
///
/// Only nuclear, thermal and hydro carry an adequacy margin; hydro units are
/// never started by the merit order unless explicitly imposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergySource {
    Hydro,
    Nuclear,
    Thermal,
    Wind,
    Solar,
    #[default]
    Other,
}

impl std::fmt::Display for EnergySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EnergySource::Hydro => "hydro",
            EnergySource::Nuclear => "nuclear",
            EnergySource::Thermal => "thermal",
            EnergySource::Wind => "wind",
            EnergySource::Solar => "solar",
            EnergySource::Other => "other",
        };
        f.write_str(s)
    }
}

/// Nature of a load.
///
/// Fictitious loads are non-physical balancing injections; they still count
/// toward demand but are tracked separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadKind {
    #[default]
    Undefined,
    Auxiliary,
    Fictitious,
}

// Basic component structs
#[derive(Debug, Clone)]
pub struct Bus {
    pub id: BusId,
    pub name: String,
    /// Base voltage in kilovolts
    pub base_kv: Kilovolts,
    pub area_id: Option<i64>,
    pub zone_id: Option<i64>,
}

impl Default for Bus {
    fn default() -> Self {
        Self {
            id: BusId(0),
            name: String::new(),
            base_kv: Kilovolts(0.0),
            area_id: None,
            zone_id: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
    pub from_bus: BusId,
    pub to_bus: BusId,
    /// Series resistance (per-unit)
    pub resistance: f64,
    /// Series reactance (per-unit)
    pub reactance: f64,
    /// Operational status flag; out-of-service branches do not connect buses
    pub status: bool,
}

impl Default for Branch {
    fn default() -> Self {
        Self {
            id: BranchId(0),
            name: String::new(),
            from_bus: BusId(0),
            to_bus: BusId(0),
            resistance: 0.0,
            reactance: 0.0,
            status: true,
        }
    }
}

impl Branch {
    pub fn new(id: BranchId, name: String, from_bus: BusId, to_bus: BusId) -> Self {
        Self {
            id,
            name,
            from_bus,
            to_bus,
            ..Self::default()
        }
    }

    pub fn with_impedance(mut self, resistance: f64, reactance: f64) -> Self {
        self.resistance = resistance;
        self.reactance = reactance;
        self
    }

    pub fn out_of_service(mut self) -> Self {
        self.status = false;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Gen {
    pub id: GenId,
    pub name: String,
    pub bus: BusId,
    pub energy_source: EnergySource,
    /// Minimum active power output
    pub pmin: Megawatts,
    /// Maximum active power output
    pub pmax: Megawatts,
    /// Minimum reactive power at zero active power
    pub qmin: Megavars,
    /// Maximum reactive power at zero active power
    pub qmax: Megavars,
    /// Target active power (MW), written back by dispatch
    pub target_p: Megawatts,
    /// Primary voltage control flag, enabled by dispatch
    pub voltage_regulator_on: bool,
    /// In-service status
    pub status: bool,
    /// Optional economic/reliability profile (at most one per generator)
    pub profile: Option<GeneratorProfile>,
}

impl Default for Gen {
    fn default() -> Self {
        Self::new(GenId(0), String::new(), BusId(0))
    }
}

impl Gen {
    /// Create a new generator with zero limits and no profile
    pub fn new(id: GenId, name: String, bus: BusId) -> Self {
        Self {
            id,
            name,
            bus,
            energy_source: EnergySource::Other,
            pmin: Megawatts(0.0),
            pmax: Megawatts(0.0),
            qmin: Megavars(0.0),
            qmax: Megavars(0.0),
            target_p: Megawatts(0.0),
            voltage_regulator_on: false,
            status: true,
            profile: None,
        }
    }

    /// Set active power limits (in MW)
    pub fn with_p_limits(mut self, pmin: f64, pmax: f64) -> Self {
        self.pmin = Megawatts(pmin);
        self.pmax = Megawatts(pmax);
        self
    }

    /// Set reactive power limits at P = 0 (in Mvar)
    pub fn with_q_limits(mut self, qmin: f64, qmax: f64) -> Self {
        self.qmin = Megavars(qmin);
        self.qmax = Megavars(qmax);
        self
    }

    pub fn with_energy_source(mut self, source: EnergySource) -> Self {
        self.energy_source = source;
        self
    }

    pub fn with_profile(mut self, profile: GeneratorProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Reactive capability span at zero active power.
    pub fn reactive_span(&self) -> Megavars {
        self.qmax - self.qmin
    }
}

#[derive(Debug, Clone)]
pub struct Load {
    pub id: LoadId,
    pub name: String,
    pub bus: BusId,
    /// Active power demand (MW)
    pub p0: Megawatts,
    /// Reactive power demand (Mvar)
    pub q0: Megavars,
    pub kind: LoadKind,
}

impl Load {
    pub fn new(id: LoadId, name: String, bus: BusId, p0_mw: f64) -> Self {
        Self {
            id,
            name,
            bus,
            p0: Megawatts(p0_mw),
            q0: Megavars(0.0),
            kind: LoadKind::Undefined,
        }
    }

    pub fn with_kind(mut self, kind: LoadKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_fictitious(&self) -> bool {
        self.kind == LoadKind::Fictitious
    }
}

// Enum to represent different types of nodes in the graph
#[derive(Debug, Clone)]
pub enum Node {
    Bus(Bus),
    Gen(Gen),
    Load(Load),
}

// Enum to represent different types of edges in the graph
#[derive(Debug, Clone)]
pub enum Edge {
    Branch(Branch),
}

/// The core power network graph
#[derive(Debug, Default)]
pub struct Network {
    pub graph: Graph<Node, Edge, Undirected>,
}

impl Network {
    pub fn new() -> Self {
        Self {
            graph: Graph::new_undirected(),
        }
    }

    /// Compute basic statistics about the network
    pub fn stats(&self) -> NetworkStats {
        let mut stats = NetworkStats::default();

        for node in self.graph.node_weights() {
            match node {
                Node::Bus(_) => stats.num_buses += 1,
                Node::Gen(g) => {
                    stats.num_gens += 1;
                    stats.total_gen_capacity_mw += g.pmax.value();
                    if g.profile.is_some() {
                        stats.num_profiles += 1;
                    }
                }
                Node::Load(l) => {
                    stats.num_loads += 1;
                    stats.total_load_mw += l.p0.value();
                }
            }
        }

        stats.num_branches = self.graph.edge_count();
        stats
    }

    /// Get total target active power of in-service generators (MW)
    pub fn total_generation_mw(&self) -> f64 {
        self.generators()
            .into_iter()
            .filter(|g| g.status)
            .map(|g| g.target_p)
            .sum::<Megawatts>()
            .value()
    }

    /// Get total active power load (MW)
    pub fn total_load_mw(&self) -> f64 {
        self.loads().into_iter().map(|l| l.p0).sum::<Megawatts>().value()
    }

    /// Get total generation capacity of in-service generators (MW)
    pub fn total_capacity_mw(&self) -> f64 {
        self.generators()
            .into_iter()
            .filter(|g| g.status)
            .map(|g| g.pmax.value())
            .filter(|v| v.is_finite())
            .sum()
    }

    /// Get all buses as a vector
    pub fn buses(&self) -> Vec<&Bus> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Bus(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    /// Get all generators as a vector
    pub fn generators(&self) -> Vec<&Gen> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Gen(g) => Some(g),
                _ => None,
            })
            .collect()
    }

    /// Get all loads as a vector
    pub fn loads(&self) -> Vec<&Load> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Load(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    /// Get all branches as a vector
    pub fn branches(&self) -> Vec<&Branch> {
        self.graph
            .edge_weights()
            .map(|e| match e {
                Edge::Branch(b) => b,
            })
            .collect()
    }

    /// Find a bus by id
    pub fn bus(&self, id: BusId) -> Option<&Bus> {
        self.graph.node_weights().find_map(|n| match n {
            Node::Bus(b) if b.id == id => Some(b),
            _ => None,
        })
    }

    /// Find a generator by id
    pub fn generator(&self, id: GenId) -> Option<&Gen> {
        self.graph.node_weights().find_map(|n| match n {
            Node::Gen(g) if g.id == id => Some(g),
            _ => None,
        })
    }

    /// Mutable access to a generator by id
    pub fn generator_mut(&mut self, id: GenId) -> Option<&mut Gen> {
        self.graph.node_weights_mut().find_map(|n| match n {
            Node::Gen(g) if g.id == id => Some(g),
            _ => None,
        })
    }

    /// Resolve a generator name to its id
    pub fn gen_id_by_name(&self, name: &str) -> Option<GenId> {
        self.graph.node_weights().find_map(|n| match n {
            Node::Gen(g) if g.name == name => Some(g.id),
            _ => None,
        })
    }

    /// Generator stored at a node index, as resolved by
    /// [`generator_nodes_by_name`](Self::generator_nodes_by_name).
    pub fn generator_at_mut(&mut self, index: NodeIndex) -> Option<&mut Gen> {
        match self.graph.node_weight_mut(index) {
            Some(Node::Gen(g)) => Some(g),
            _ => None,
        }
    }

    /// Node index of every generator, keyed by name, in one pass.
    pub fn generator_nodes_by_name(&self) -> HashMap<String, NodeIndex> {
        self.graph
            .node_indices()
            .filter_map(|i| match &self.graph[i] {
                Node::Gen(g) => Some((g.name.clone(), i)),
                _ => None,
            })
            .collect()
    }

    /// Check every attached profile, naming the first offending generator.
    pub fn validate_profiles(&self) -> GridResult<()> {
        for gen in self.generators() {
            if let Some(profile) = &gen.profile {
                profile
                    .check()
                    .map_err(|e| GridError::Validation(format!("{}: {}", gen.name, e)))?;
            }
        }
        Ok(())
    }

    /// Attach a profile to a generator, replacing any previous one.
    ///
    /// The profile is validated first; an invalid profile leaves the
    /// generator unchanged.
    pub fn attach_profile(&mut self, id: GenId, profile: GeneratorProfile) -> GridResult<()> {
        profile.validate()?;
        let gen = self
            .generator_mut(id)
            .ok_or_else(|| GridError::Network(format!("unknown generator {}", id)))?;
        gen.profile = Some(profile);
        Ok(())
    }

    /// Remove and return a generator's profile.
    pub fn detach_profile(&mut self, id: GenId) -> GridResult<Option<GeneratorProfile>> {
        let gen = self
            .generator_mut(id)
            .ok_or_else(|| GridError::Network(format!("unknown generator {}", id)))?;
        Ok(gen.profile.take())
    }
}

/// Statistics about a network's size and capacity
#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub num_buses: usize,
    pub num_gens: usize,
    pub num_loads: usize,
    pub num_branches: usize,
    pub num_profiles: usize,
    pub total_load_mw: f64,
    pub total_gen_capacity_mw: f64,
}

impl std::fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses, {} branches, {} gens ({:.0} MW, {} profiled), {} loads ({:.0} MW)",
            self.num_buses,
            self.num_branches,
            self.num_gens,
            self.total_gen_capacity_mw,
            self.num_profiles,
            self.num_loads,
            self.total_load_mw
        )
    }
}
