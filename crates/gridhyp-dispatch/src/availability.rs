//! Available and imposed generation of an area.
//!
//! For each unit, in order:
//! 1. a non-zero planned setpoint imposes the unit (positive adds to imposed
//!    power, negative adds its magnitude to area consumption);
//! 2. hydro units outside the start-at-max set are excluded;
//! 3. any other unit gets an available power from its outage data, reduced by
//!    the adequacy margin of its energy source.
//!
//! Outage rates are used only when both are known; a profile with one or
//! none of them gets the default abatement instead. A non-hydro unit without
//! a profile is dispatched the same way and sorts last in the merit order.

use std::collections::HashSet;

use gridhyp_core::{Diagnostics, EnergySource, GeneratorProfile};
use tracing::debug;

use crate::area::{Area, AreaStatus};
use crate::config::DispatchConfig;
use crate::state::UnitState;

/// Available power of a unit before the start decision (MW).
pub fn available_power_mw(unit: &UnitState, config: &DispatchConfig) -> f64 {
    let pmax = unit.gen.pmax.value();
    let raw = if unit.forced_max {
        pmax
    } else {
        match unit.profile().and_then(GeneratorProfile::outage_rates) {
            Some((forced, planned)) => pmax * (1.0 - forced) * (1.0 - planned),
            None => {
                let k = config.default_abatement_coefficient;
                if k > 0.0 && k < 1.0 {
                    pmax * (1.0 - k)
                } else {
                    pmax
                }
            }
        }
    };
    raw * (1.0 - config.adequacy_margins.ratio(unit.energy_source()))
}

/// Classify every unit of the area and accumulate imposed power and
/// available capacity.
pub fn evaluate_availability(area: &mut Area, config: &DispatchConfig, diag: &mut Diagnostics) {
    let mut imposed = 0.0;
    let mut extra_consumption = 0.0;
    let mut capacity = 0.0;
    let start_at_max: HashSet<&str> = config.start_at_max.iter().map(String::as_str).collect();

    for (index, unit) in area.units.iter_mut().enumerate() {
        unit.forced_max = start_at_max.contains(unit.name());

        if let Some(setpoint) = unit.profile().and_then(|p| p.imposed_setpoint()) {
            if setpoint > 0.0 {
                imposed += setpoint;
            } else {
                extra_consumption -= setpoint;
            }
            unit.impose(setpoint);
            unit.started = true;
            area.started.push(index);
            debug!(generator = unit.name(), setpoint_mw = setpoint, "imposed setpoint");
            continue;
        }

        if unit.energy_source() == EnergySource::Hydro && !unit.forced_max {
            unit.exclude();
            debug!(generator = unit.name(), "hydro unit excluded from stacking");
            continue;
        }

        let power = available_power_mw(unit, config);
        unit.make_available(power);
        capacity += power;
    }

    if extra_consumption > 0.0 {
        diag.add_info_with_entity(
            "availability",
            &format!(
                "Negative imposed setpoints add {:.2} MW to area consumption",
                extra_consumption
            ),
            &area.name,
        );
    }

    area.imposed_power_mw = imposed;
    area.total_consumption_mw += extra_consumption;
    area.available_capacity_mw = capacity;
    area.status = AreaStatus::Evaluated;
    debug!(
        area = %area.name,
        imposed_mw = imposed,
        capacity_mw = capacity,
        consumption_mw = area.total_consumption_mw,
        "evaluated area generation"
    );
}
