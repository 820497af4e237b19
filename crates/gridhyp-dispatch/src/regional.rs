//! Regional rebalancing of the marginal block.
//!
//! After stacking, the units whose marginal cost lies within
//! `cost_epsilon` of the marginal unit's form a cohort. Their total output
//! (the equilibrium) is redistributed across regions to minimize
//! `Σ (balance_excl_r + x_r)²`, where `balance_excl_r` is the balance of
//! region `r` without the cohort and `x_r` the cohort output placed in `r`,
//! bounded by the cohort capacity of `r`. Within a region the volume is
//! shared pro rata to available power.
//!
//! Any failure leaves the stacked setpoints untouched.

use std::collections::{BTreeMap, HashMap, HashSet};

use gridhyp_core::{BusId, Diagnostics, Gen, Load, Network};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::area::Area;
use crate::breakpoint::{solve_separable_qp, QpTerm, QpTolerances};
use crate::config::RegionalConfig;
use crate::demand::load_demand_mw;

/// Region receiving every untagged element.
pub const UNKNOWN_REGION: &str = "unknown";

/// Assigns generators and loads to regions.
pub trait RegionTagger {
    fn gen_region(&self, gen: &Gen) -> Option<String>;
    fn load_region(&self, load: &Load) -> Option<String>;
}

/// Region = zone id of the element's bus.
#[derive(Debug, Clone, Default)]
pub struct BusZoneTagger {
    zones: HashMap<BusId, i64>,
}

impl BusZoneTagger {
    pub fn from_network(network: &Network) -> Self {
        let zones = network
            .buses()
            .into_iter()
            .filter_map(|b| b.zone_id.map(|z| (b.id, z)))
            .collect();
        Self { zones }
    }

    fn region_of(&self, bus: BusId) -> Option<String> {
        self.zones.get(&bus).map(|z| format!("zone-{}", z))
    }
}

impl RegionTagger for BusZoneTagger {
    fn gen_region(&self, gen: &Gen) -> Option<String> {
        self.region_of(gen.bus)
    }

    fn load_region(&self, load: &Load) -> Option<String> {
        self.region_of(load.bus)
    }
}

/// Explicit element name to region map.
#[derive(Debug, Clone, Default)]
pub struct NamedRegions {
    regions: HashMap<String, String>,
}

impl NamedRegions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, element: impl Into<String>, region: impl Into<String>) -> Self {
        self.regions.insert(element.into(), region.into());
        self
    }
}

impl RegionTagger for NamedRegions {
    fn gen_region(&self, gen: &Gen) -> Option<String> {
        self.regions.get(&gen.name).cloned()
    }

    fn load_region(&self, load: &Load) -> Option<String> {
        self.regions.get(&load.name).cloned()
    }
}

/// Sub-partition of an area.
#[derive(Debug, Clone, Default)]
pub struct Region {
    pub name: String,
    /// Loads with losses plus negative imposed setpoints (MW)
    pub consumption_mw: f64,
    /// Setpoints of started units outside the cohort (MW)
    pub started_power_mw: f64,
    /// Cohort available power (MW)
    pub available_power_mw: f64,
    /// Indices into the area's units
    pub cohort: Vec<usize>,
}

impl Region {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Production minus consumption, cohort excluded.
    pub fn balance(&self) -> f64 {
        self.started_power_mw - self.consumption_mw
    }
}

/// Balance of one region around the refinement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionBalance {
    pub name: String,
    pub before_mw: f64,
    pub after_mw: f64,
}

/// Result of a successful refinement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionalOutcome {
    pub equilibrium_mw: f64,
    pub cohort: Vec<String>,
    pub regions: Vec<RegionBalance>,
}

/// Cohort of the marginal unit: dispatchable, not forced to max, with a
/// marginal cost within `cost_epsilon` of the marginal unit's.
pub fn marginal_cohort(area: &Area, cost_epsilon: f64) -> Option<Vec<usize>> {
    let reference = area.marginal_unit()?.marginal_cost()?;
    Some(
        area.units
            .iter()
            .enumerate()
            .filter(|(_, u)| u.is_dispatchable() && !u.forced_max)
            .filter(|(_, u)| {
                u.marginal_cost()
                    .is_some_and(|c| (c - reference).abs() <= cost_epsilon)
            })
            .map(|(i, _)| i)
            .collect(),
    )
}

/// Build the regions of an area around a cohort.
pub fn build_regions(
    area: &Area,
    cohort: &[usize],
    tagger: &dyn RegionTagger,
    loss_factor: f64,
) -> BTreeMap<String, Region> {
    let in_cohort: HashSet<usize> = cohort.iter().copied().collect();
    let mut regions = BTreeMap::new();
    regions.insert(UNKNOWN_REGION.to_string(), Region::new(UNKNOWN_REGION));

    for load in &area.loads {
        let name = tagger
            .load_region(load)
            .unwrap_or_else(|| UNKNOWN_REGION.to_string());
        regions
            .entry(name.clone())
            .or_insert_with(|| Region::new(&name))
            .consumption_mw += load_demand_mw(load, loss_factor);
    }

    for (index, unit) in area.units.iter().enumerate() {
        let name = tagger
            .gen_region(&unit.gen)
            .unwrap_or_else(|| UNKNOWN_REGION.to_string());
        let region = regions
            .entry(name.clone())
            .or_insert_with(|| Region::new(&name));

        if in_cohort.contains(&index) {
            region.cohort.push(index);
            region.available_power_mw += unit.available_power_mw;
        } else if unit.imposed && unit.setpoint_mw() < 0.0 {
            region.consumption_mw -= unit.setpoint_mw();
        } else if unit.started {
            region.started_power_mw += unit.setpoint_mw();
        }
    }

    regions
}

/// Rebalance the cohort of a stacked area across regions.
///
/// Returns `None` when there is nothing to refine or when the refinement is
/// abandoned; the latter is recorded as a `regional` warning.
pub fn adjust(
    area: &mut Area,
    tagger: &dyn RegionTagger,
    loss_factor: f64,
    config: &RegionalConfig,
    diag: &mut Diagnostics,
) -> Option<RegionalOutcome> {
    let Some(marginal) = area.marginal else {
        debug!(area = %area.name, "no marginal unit, regional refinement skipped");
        return None;
    };

    let Some(cohort) = marginal_cohort(area, config.cost_epsilon) else {
        let name = area.units[marginal].name().to_string();
        warn!(area = %area.name, generator = %name, "marginal unit has no marginal cost");
        diag.add_warning_with_entity(
            "regional",
            &format!("Marginal unit {} has no marginal cost; regional refinement skipped", name),
            &area.name,
        );
        return None;
    };

    let regions = build_regions(area, &cohort, tagger, loss_factor);
    let with_capacity = regions
        .values()
        .filter(|r| r.available_power_mw > 0.0)
        .count();
    if with_capacity < 2 {
        debug!(area = %area.name, "cohort confined to one region, nothing to rebalance");
        return None;
    }

    let equilibrium: f64 = cohort.iter().map(|&i| area.units[i].setpoint_mw()).sum();
    let before: Vec<f64> = regions
        .values()
        .map(|r| {
            r.balance()
                + r.cohort
                    .iter()
                    .map(|&i| area.units[i].setpoint_mw())
                    .sum::<f64>()
        })
        .collect();

    let terms: Vec<QpTerm> = regions
        .values()
        .map(|r| QpTerm::new(1.0, 2.0 * r.balance(), 0.0, r.available_power_mw))
        .collect();
    let tolerances = QpTolerances {
        degeneracy_epsilon: config.degeneracy_epsilon,
        residual: config.tolerance_mw,
    };

    let volumes = match solve_separable_qp(&terms, equilibrium, &tolerances) {
        Ok(x) => x,
        Err(failure) => {
            warn!(area = %area.name, %failure, "regional refinement abandoned");
            diag.add_warning_with_entity(
                "regional",
                &format!("Regional refinement abandoned: {}", failure),
                &area.name,
            );
            return None;
        }
    };

    let mut balances = Vec::with_capacity(regions.len());
    for ((region, &volume), before_mw) in regions.values().zip(&volumes).zip(before) {
        for &index in &region.cohort {
            let unit = &mut area.units[index];
            let share = if region.available_power_mw > 0.0 {
                volume * unit.available_power_mw / region.available_power_mw
            } else {
                0.0
            };
            unit.assign(share);
            area.mark_started(index);
        }
        balances.push(RegionBalance {
            name: region.name.clone(),
            before_mw,
            after_mw: region.balance() + volume,
        });
    }

    info!(
        area = %area.name,
        equilibrium_mw = equilibrium,
        cohort = cohort.len(),
        regions = balances.len(),
        "regional refinement applied"
    );

    Some(RegionalOutcome {
        equilibrium_mw: equilibrium,
        cohort: cohort
            .iter()
            .map(|&i| area.units[i].name().to_string())
            .collect(),
        regions: balances,
    })
}
