//! Area demand including losses.

use gridhyp_core::{Diagnostics, Load};
use tracing::{debug, info};

use crate::area::Area;

/// Demand of a single load with losses applied.
pub fn load_demand_mw(load: &Load, loss_factor: f64) -> f64 {
    load.p0.value() * (1.0 + loss_factor)
}

/// Sum `p0 * (1 + loss_factor)` over the area's loads.
///
/// Fictitious loads are part of the total and are also tracked on their own.
/// Sets the load and total consumption of the area.
pub fn evaluate_demand(area: &mut Area, loss_factor: f64, diag: &mut Diagnostics) {
    let mut consumption = 0.0;
    let mut fictitious = 0.0;

    for load in &area.loads {
        let demand = load_demand_mw(load, loss_factor);
        consumption += demand;
        if load.is_fictitious() {
            fictitious += demand;
        }
    }

    if fictitious != 0.0 {
        info!(area = %area.name, fictitious_mw = fictitious, "fictitious consumption added to area demand");
        diag.add_info_with_entity(
            "demand",
            &format!("Fictitious consumption of {:.2} MW added to area consumption", fictitious),
            &area.name,
        );
    }

    area.load_consumption_mw = consumption;
    area.fictitious_consumption_mw = fictitious;
    area.total_consumption_mw = consumption;
    debug!(area = %area.name, consumption_mw = consumption, "evaluated area demand");
}
