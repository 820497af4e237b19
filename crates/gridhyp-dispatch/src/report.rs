//! Outcome of a dispatch run.

use gridhyp_core::Diagnostics;
use serde::Serialize;

use crate::area::{Area, AreaStatus};
use crate::regional::RegionalOutcome;
use crate::state::StartedUnit;

/// Per-area summary.
#[derive(Debug, Clone, Serialize)]
pub struct AreaReport {
    pub component: usize,
    pub name: String,
    pub status: AreaStatus,
    pub load_consumption_mw: f64,
    pub total_consumption_mw: f64,
    pub imposed_power_mw: f64,
    pub available_capacity_mw: f64,
    pub fictitious_consumption_mw: f64,
    /// Sum of committed setpoints; zero for inactive areas
    pub committed_mw: f64,
    /// Unit that closed the gap during stacking. A regional refinement may
    /// move its setpoint afterwards; the final marginal block is then the
    /// cohort listed in `regional`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marginal_unit: Option<String>,
    pub started: Vec<StartedUnit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regional: Option<RegionalOutcome>,
}

impl AreaReport {
    pub fn from_area(area: &Area, regional: Option<RegionalOutcome>) -> Self {
        let committed = area.status == AreaStatus::Committed;
        Self {
            component: area.component,
            name: area.name.clone(),
            status: area.status,
            load_consumption_mw: area.load_consumption_mw,
            total_consumption_mw: area.total_consumption_mw,
            imposed_power_mw: area.imposed_power_mw,
            available_capacity_mw: area.available_capacity_mw,
            fictitious_consumption_mw: area.fictitious_consumption_mw,
            committed_mw: if committed { area.committed_mw() } else { 0.0 },
            marginal_unit: area.marginal_unit().map(|u| u.name().to_string()),
            started: if committed {
                area.started_units().map(StartedUnit::from).collect()
            } else {
                Vec::new()
            },
            regional,
        }
    }

    pub fn setpoint_of(&self, gen_name: &str) -> Option<f64> {
        self.started
            .iter()
            .find(|u| u.name == gen_name)
            .map(|u| u.setpoint_mw)
    }
}

/// Areas in component order plus every diagnostic of the run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub areas: Vec<AreaReport>,
    pub diagnostics: Diagnostics,
}

impl DispatchReport {
    pub fn area(&self, component: usize) -> Option<&AreaReport> {
        self.areas.iter().find(|a| a.component == component)
    }

    pub fn total_committed_mw(&self) -> f64 {
        self.areas.iter().map(|a| a.committed_mw).sum()
    }

    pub fn committed_areas(&self) -> impl Iterator<Item = &AreaReport> {
        self.areas
            .iter()
            .filter(|a| a.status == AreaStatus::Committed)
    }

    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl std::fmt::Display for DispatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for area in &self.areas {
            writeln!(
                f,
                "{} [{:?}]: consumption {:.2} MW, imposed {:.2} MW, committed {:.2} MW",
                area.name,
                area.status,
                area.total_consumption_mw,
                area.imposed_power_mw,
                area.committed_mw
            )?;
        }
        write!(f, "{}", self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_area_reports_nothing_committed() {
        let mut area = Area::new(1);
        area.total_consumption_mw = 900.0;
        area.status = AreaStatus::Infeasible;
        let report = AreaReport::from_area(&area, None);
        assert_eq!(report.committed_mw, 0.0);
        assert!(report.started.is_empty());
    }

    #[test]
    fn test_report_lookup_and_json() {
        let mut report = DispatchReport::default();
        let mut area = Area::new(0);
        area.status = AreaStatus::Committed;
        report.areas.push(AreaReport::from_area(&area, None));
        assert!(report.area(0).is_some());
        assert!(report.area(1).is_none());
        let json = report.to_json_string().unwrap();
        assert!(json.contains("\"status\": \"committed\""));
        assert!(report.to_string().contains("Area0"));
    }
}
