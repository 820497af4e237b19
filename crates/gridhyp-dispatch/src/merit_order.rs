//! Merit-order stacking of an evaluated area.
//!
//! Units are walked by ascending startup cost; each one is filled until the
//! remaining demand fits in the next unit, which becomes the marginal unit.

use std::cmp::Ordering;

use gridhyp_core::{Diagnostics, Megawatts, Network};
use tracing::{debug, error, info};

use crate::area::{Area, AreaStatus};
use crate::config::DispatchConfig;
use crate::DispatchError;

/// Tolerance (MW) of the isolation gate and the consistency check.
pub const BALANCE_TOLERANCE_MW: f64 = 1.0;

/// Decide whether an evaluated area can be stacked.
///
/// Secondary areas with neither imposed power nor consumption become
/// `Isolated`; areas whose demand exceeds imposed plus available generation
/// become `Infeasible`. Returns whether the area stays active.
pub fn check_feasibility(area: &mut Area, main_component: usize, diag: &mut Diagnostics) -> bool {
    if area.component != main_component
        && Megawatts(area.imposed_power_mw).is_negligible(BALANCE_TOLERANCE_MW)
        && Megawatts(area.total_consumption_mw).is_negligible(BALANCE_TOLERANCE_MW)
    {
        debug!(area = %area.name, "secondary area with nothing to balance");
        area.status = AreaStatus::Isolated;
        return false;
    }

    if area.imposed_power_mw + area.available_capacity_mw < area.total_consumption_mw {
        let which = if area.component == main_component {
            "Main connected component not treated".to_string()
        } else {
            format!("Connected component {} not treated", area.component)
        };
        error!(
            area = %area.name,
            consumption_mw = area.total_consumption_mw,
            imposed_mw = area.imposed_power_mw,
            capacity_mw = area.available_capacity_mw,
            "starting generators impossible: demand exceeds imposed and available generation"
        );
        diag.add_error_with_entity(
            "feasibility",
            &format!(
                "Demand {:.2} MW exceeds imposed {:.2} MW plus available {:.2} MW. {}",
                area.total_consumption_mw, area.imposed_power_mw, area.available_capacity_mw, which
            ),
            &area.name,
        );
        area.status = AreaStatus::Infeasible;
        return false;
    }

    true
}

/// Dispatchable unit indices ordered by startup cost.
///
/// The sort is stable, so equal costs keep partition order; units without
/// a profile sort last.
pub fn merit_order(area: &Area) -> Vec<usize> {
    let mut order: Vec<usize> = area
        .units
        .iter()
        .enumerate()
        .filter(|(_, u)| u.is_dispatchable())
        .map(|(i, _)| i)
        .collect();
    order.sort_by(|&a, &b| {
        area.units[a]
            .startup_cost_key()
            .partial_cmp(&area.units[b].startup_cost_key())
            .unwrap_or(Ordering::Equal)
    });
    order
}

/// Greedy allocation of `consumption - imposed` over the merit order.
pub fn stack(area: &mut Area, diag: &mut Diagnostics) {
    let required = area.total_consumption_mw - area.imposed_power_mw;
    info!(area = %area.name, required_mw = required, "required active power generation");
    diag.add_info_with_entity(
        "stacking",
        &format!("Required active power generation of {:.2} MW", required),
        &area.name,
    );

    let mut remaining = required;
    for index in merit_order(area) {
        let unit = &mut area.units[index];

        if unit.forced_max {
            unit.assign(unit.available_power_mw);
            remaining -= unit.available_power_mw;
            area.mark_started(index);
            continue;
        }

        let floor = unit.floor_mw();
        if unit.available_power_mw < remaining {
            unit.assign(unit.available_power_mw);
            remaining -= unit.available_power_mw;
        } else if remaining < floor {
            unit.assign(floor);
            remaining -= floor;
        } else {
            unit.assign(remaining);
            debug!(generator = unit.name(), setpoint_mw = remaining, "marginal unit");
            area.mark_started(index);
            area.marginal = Some(index);
            break;
        }
        area.mark_started(index);
    }

    area.status = AreaStatus::Stacked;
}

/// Write started setpoints back to the network and enable voltage control
/// on units meeting both thresholds.
pub fn commit(
    area: &mut Area,
    network: &mut Network,
    config: &DispatchConfig,
    diag: &mut Diagnostics,
) -> Result<(), DispatchError> {
    for &index in &area.started {
        let unit = &area.units[index];
        let gen = match unit.node {
            Some(node) => network.generator_at_mut(node).filter(|g| g.id == unit.id()),
            None => network.generator_mut(unit.id()),
        };
        let gen = gen.ok_or_else(|| {
            DispatchError::Precondition(format!(
                "generator {} disappeared from the network during dispatch",
                unit.name()
            ))
        })?;
        gen.target_p = Megawatts(unit.setpoint_mw());
        debug!(generator = unit.name(), target_mw = unit.setpoint_mw(), "committed setpoint");

        if unit.setpoint_mw() >= config.p_threshold
            && gen.reactive_span().value() >= config.q_threshold
        {
            gen.voltage_regulator_on = true;
            info!(generator = unit.name(), "voltage control on");
            diag.add_info_with_entity("stacking", "Voltage control on", unit.name());
        }
    }
    area.status = AreaStatus::Committed;
    Ok(())
}

/// Compare committed generation against load plus losses.
///
/// Negative imposed setpoints are part of the committed sum, so the
/// reference is the load consumption rather than the total consumption.
/// A mismatch beyond [`BALANCE_TOLERANCE_MW`] is reported, not fatal.
pub fn check_consistency(area: &Area, diag: &mut Diagnostics) -> bool {
    let committed = area.committed_mw();
    let expected = area.load_consumption_mw;
    if (committed - expected).abs() > BALANCE_TOLERANCE_MW {
        error!(
            area = %area.name,
            consumption_mw = expected,
            committed_mw = committed,
            "wrong committed generation"
        );
        diag.add_error_with_entity(
            "consistency",
            &format!(
                "Committed generation {:.2} MW differs from load plus losses {:.2} MW",
                committed, expected
            ),
            &area.name,
        );
        return false;
    }
    true
}
