//! Top-level dispatch run over every area of a network.

use std::collections::HashSet;

use gridhyp_core::{connected_components, Diagnostics, Network};
use tracing::{debug, info, warn};

use crate::area::{partition, Area};
use crate::availability::evaluate_availability;
use crate::config::{DispatchConfig, MarginalMode};
use crate::demand::evaluate_demand;
use crate::merit_order::{check_consistency, check_feasibility, commit, stack};
use crate::regional::{adjust, BusZoneTagger, RegionTagger, RegionalOutcome};
use crate::report::{AreaReport, DispatchReport};
use crate::DispatchError;

/// Builds a generator startup hypothesis for a network.
///
/// ```
/// use gridhyp_core::*;
/// use gridhyp_dispatch::{DispatchConfig, GeneratorsStartup};
///
/// let mut network = Network::new();
/// network.graph.add_node(Node::Bus(Bus { id: BusId::new(1), ..Bus::default() }));
/// network.graph.add_node(Node::Gen(
///     Gen::new(GenId::new(1), "G1".into(), BusId::new(1)).with_p_limits(0.0, 100.0),
/// ));
/// network.graph.add_node(Node::Load(Load::new(LoadId::new(1), "L1".into(), BusId::new(1), 40.0)));
///
/// let report = GeneratorsStartup::new(DispatchConfig::default())
///     .apply(&mut network)
///     .unwrap();
/// assert!((report.total_committed_mw() - 40.0).abs() < 1e-9);
/// ```
pub struct GeneratorsStartup {
    config: DispatchConfig,
    tagger: Option<Box<dyn RegionTagger>>,
}

impl GeneratorsStartup {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            tagger: None,
        }
    }

    /// Region tagging for the regional mode; defaults to bus zones.
    pub fn with_region_tagger(mut self, tagger: impl RegionTagger + 'static) -> Self {
        self.tagger = Some(Box::new(tagger));
        self
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Dispatch every area and write setpoints back to the network.
    ///
    /// Only configuration and precondition violations are returned as errors:
    /// an invalid configuration, an invalid generator profile, or a generator
    /// vanishing between evaluation and commit. The first two are detected
    /// before the network is touched.
    pub fn apply(&self, network: &mut Network) -> Result<DispatchReport, DispatchError> {
        self.config.validate()?;
        network.validate_profiles()?;

        let mut diag = Diagnostics::new();
        let gen_names: HashSet<&str> = network
            .generators()
            .into_iter()
            .map(|g| g.name.as_str())
            .collect();
        for name in &self.config.start_at_max {
            if !gen_names.contains(name.as_str()) {
                warn!(generator = %name, "start-at-max generator not found");
                diag.add_warning_with_entity(
                    "availability",
                    "Start-at-max generator not found in the network",
                    name,
                );
            }
        }

        let components = connected_components(network);
        let areas = partition(network, &components, &mut diag);
        info!(
            areas = areas.len(),
            stats = %network.stats(),
            mode = ?self.config.marginal_mode,
            "starting generator dispatch"
        );

        let zone_tagger = self.zone_tagger(network);
        let tagger: Option<&dyn RegionTagger> = match (&self.tagger, &zone_tagger) {
            (Some(custom), _) => Some(&**custom),
            (None, Some(zones)) => Some(zones),
            (None, None) => None,
        };

        let mut report = DispatchReport::default();
        for (_, mut area) in areas {
            debug!(component = area.component, "dispatching area");
            let regional = self.dispatch_area(&mut area, network, tagger, &mut diag)?;
            report.areas.push(AreaReport::from_area(&area, regional));
        }

        info!(
            committed_mw = report.total_committed_mw(),
            summary = %diag.summary(),
            "generator dispatch finished"
        );
        report.diagnostics = diag;
        Ok(report)
    }

    /// Bus-zone regions, built only when the regional mode needs them and no
    /// tagger was supplied.
    fn zone_tagger(&self, network: &Network) -> Option<BusZoneTagger> {
        match (self.config.marginal_mode, &self.tagger) {
            (MarginalMode::Regional, None) => Some(BusZoneTagger::from_network(network)),
            _ => None,
        }
    }

    fn dispatch_area(
        &self,
        area: &mut Area,
        network: &mut Network,
        tagger: Option<&dyn RegionTagger>,
        diag: &mut Diagnostics,
    ) -> Result<Option<RegionalOutcome>, DispatchError> {
        let config = &self.config;
        evaluate_demand(area, config.loss_factor, diag);
        evaluate_availability(area, config, diag);

        if !check_feasibility(area, config.main_component, diag) {
            return Ok(None);
        }

        stack(area, diag);

        let regional = match (config.marginal_mode, tagger) {
            (MarginalMode::Regional, Some(tagger)) => {
                adjust(area, tagger, config.loss_factor, &config.regional, diag)
            }
            _ => None,
        };

        commit(area, network, config, diag)?;
        check_consistency(area, diag);
        Ok(regional)
    }
}
