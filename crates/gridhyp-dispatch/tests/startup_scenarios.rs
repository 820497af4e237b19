//! End-to-end merit-order startup scenarios

use gridhyp_core::{
    Branch, BranchId, Bus, BusId, Edge, EnergySource, Gen, GenId, GeneratorProfile, GridError,
    Load, LoadId, Megawatts, Network, Node, ProfileSet,
};
use gridhyp_dispatch::{AreaStatus, DispatchConfig, DispatchError, GeneratorsStartup};

fn add_bus(network: &mut Network, id: usize) {
    network.graph.add_node(Node::Bus(Bus {
        id: BusId::new(id),
        name: format!("bus{}", id),
        ..Bus::default()
    }));
}

fn connect(network: &mut Network, id: usize, from: usize, to: usize) {
    let find = |network: &Network, bus: usize| {
        network
            .graph
            .node_indices()
            .find(|i| matches!(&network.graph[*i], Node::Bus(b) if b.id == BusId::new(bus)))
            .expect("bus exists")
    };
    let a = find(network, from);
    let b = find(network, to);
    network.graph.add_edge(
        a,
        b,
        Edge::Branch(Branch::new(
            BranchId::new(id),
            format!("line{}_{}", from, to),
            BusId::new(from),
            BusId::new(to),
        )),
    );
}

fn thermal(id: usize, bus: usize, pmax: f64, startup: f64) -> Gen {
    Gen::new(GenId::new(id), format!("T{}", id), BusId::new(bus))
        .with_energy_source(EnergySource::Thermal)
        .with_p_limits(0.0, pmax)
        .with_profile(
            GeneratorProfile::new()
                .with_startup_cost(startup)
                .with_outage_rates(0.1, 0.05),
        )
}

fn load(id: usize, bus: usize, p0: f64) -> Load {
    Load::new(LoadId::new(id), format!("L{}", id), BusId::new(bus), p0)
}

/// Three thermal units (100 MW, forced 0.1, planned 0.05) and a hydro unit
/// imposed at -10 MW, with 170 MW of load on two buses.
fn fixture_network() -> Network {
    let mut network = Network::new();
    add_bus(&mut network, 1);
    add_bus(&mut network, 2);
    connect(&mut network, 1, 1, 2);

    network.graph.add_node(Node::Gen(thermal(1, 1, 100.0, 10.0)));
    network.graph.add_node(Node::Gen(thermal(2, 1, 100.0, 20.0)));
    network.graph.add_node(Node::Gen(thermal(3, 2, 100.0, 30.0)));
    network.graph.add_node(Node::Gen(
        Gen::new(GenId::new(4), "H4".into(), BusId::new(2))
            .with_energy_source(EnergySource::Hydro)
            .with_p_limits(-10.0, 20.0)
            .with_profile(GeneratorProfile::new().with_planned_setpoint(-10.0)),
    ));
    network.graph.add_node(Node::Load(load(1, 1, 120.0)));
    network.graph.add_node(Node::Load(load(2, 2, 50.0)));
    network
}

fn target(network: &Network, name: &str) -> f64 {
    network
        .generators()
        .into_iter()
        .find(|g| g.name == name)
        .map(|g| g.target_p.value())
        .expect("generator exists")
}

#[test]
fn test_reference_fixture() {
    let mut network = fixture_network();
    let config = DispatchConfig::new().with_loss_factor(0.02);
    let report = GeneratorsStartup::new(config).apply(&mut network).unwrap();

    let area = report.area(0).unwrap();
    assert_eq!(area.status, AreaStatus::Committed);
    assert!((area.load_consumption_mw - 173.4).abs() < 1e-6);
    // The negative imposed setpoint counts as demand
    assert!((area.total_consumption_mw - 183.4).abs() < 1e-6);
    assert!((area.available_capacity_mw - 3.0 * 76.95).abs() < 1e-6);
    assert_eq!(area.marginal_unit.as_deref(), Some("T3"));

    assert!((target(&network, "T1") - 76.95).abs() < 1e-6);
    assert!((target(&network, "T2") - 76.95).abs() < 1e-6);
    assert!((target(&network, "T3") - 29.5).abs() < 1e-6);
    assert!((target(&network, "H4") + 10.0).abs() < 1e-9);

    assert!((area.committed_mw - 173.4).abs() < 1e-6);
    assert_eq!(report.diagnostics.issues_by_category("consistency").count(), 0);
}

#[test]
fn test_voltage_control_on_started_units() {
    let mut network = fixture_network();
    let report = GeneratorsStartup::new(DispatchConfig::new().with_loss_factor(0.02))
        .apply(&mut network)
        .unwrap();
    assert_eq!(report.area(0).unwrap().started.len(), 4);

    for gen in network.generators() {
        // H4 sits below the zero active power threshold
        assert_eq!(gen.voltage_regulator_on, gen.name != "H4", "{}", gen.name);
    }
}

#[test]
fn test_conservation_per_area() {
    let mut network = fixture_network();
    // Second component: one bus, one unit, one load
    add_bus(&mut network, 3);
    network.graph.add_node(Node::Gen(thermal(5, 3, 80.0, 1.0)));
    network.graph.add_node(Node::Load(load(3, 3, 30.0)));

    let report = GeneratorsStartup::new(DispatchConfig::new().with_loss_factor(0.01))
        .apply(&mut network)
        .unwrap();

    assert_eq!(report.committed_areas().count(), 2);
    for area in report.committed_areas() {
        assert!(
            (area.committed_mw - area.load_consumption_mw).abs() <= 1.0,
            "{} committed {} for {}",
            area.name,
            area.committed_mw,
            area.load_consumption_mw
        );
    }
    assert!(!report.diagnostics.has_errors());
}

#[test]
fn test_merit_order_property() {
    let mut network = Network::new();
    add_bus(&mut network, 1);
    let costs = [40.0, 5.0, 25.0, 15.0, 35.0, 10.0];
    for (i, cost) in costs.iter().enumerate() {
        network.graph.add_node(Node::Gen(thermal(i + 1, 1, 50.0, *cost)));
    }
    network.graph.add_node(Node::Load(load(1, 1, 150.0)));

    GeneratorsStartup::new(DispatchConfig::default())
        .apply(&mut network)
        .unwrap();

    let gens = network.generators();
    for expensive in &gens {
        if expensive.target_p.value() <= 0.0 {
            continue;
        }
        let expensive_cost = expensive.profile.as_ref().unwrap().startup_cost.unwrap();
        for cheap in &gens {
            let cheap_cost = cheap.profile.as_ref().unwrap().startup_cost.unwrap();
            assert!(
                !(cheap_cost < expensive_cost && cheap.target_p.value() == 0.0),
                "{} committed while cheaper {} idle",
                expensive.name,
                cheap.name
            );
        }
    }
    // 150 MW over 38.475 MW units: three full, the fourth marginal
    assert!((network.total_generation_mw() - 150.0).abs() < 1e-6);
    assert_eq!(target(&network, "T1"), 0.0);
    assert_eq!(target(&network, "T5"), 0.0);
}

#[test]
fn test_imposed_units_are_idempotent() {
    let mut network = fixture_network();
    network
        .attach_profile(
            GenId::new(2),
            GeneratorProfile::new()
                .with_startup_cost(20.0)
                .with_planned_setpoint(42.0),
        )
        .unwrap();
    let startup = GeneratorsStartup::new(DispatchConfig::new().with_loss_factor(0.02));

    startup.apply(&mut network).unwrap();
    let first = (target(&network, "T2"), target(&network, "H4"));
    startup.apply(&mut network).unwrap();
    let second = (target(&network, "T2"), target(&network, "H4"));

    assert_eq!(first, (42.0, -10.0));
    assert_eq!(first, second);
}

#[test]
fn test_hydro_without_profile_never_started() {
    let mut network = Network::new();
    add_bus(&mut network, 1);
    network.graph.add_node(Node::Gen(
        Gen::new(GenId::new(1), "H1".into(), BusId::new(1))
            .with_energy_source(EnergySource::Hydro)
            .with_p_limits(0.0, 500.0),
    ));
    network.graph.add_node(Node::Gen(thermal(2, 1, 100.0, 50.0)));
    network.graph.add_node(Node::Load(load(1, 1, 60.0)));

    let report = GeneratorsStartup::new(DispatchConfig::default())
        .apply(&mut network)
        .unwrap();

    assert_eq!(target(&network, "H1"), 0.0);
    assert!((target(&network, "T2") - 60.0).abs() < 1e-9);
    assert!(report.area(0).unwrap().setpoint_of("H1").is_none());
}

#[test]
fn test_isolated_area_untouched() {
    let mut network = fixture_network();
    add_bus(&mut network, 9);
    let mut idle = thermal(9, 9, 50.0, 1.0);
    idle.target_p = Megawatts(12.0);
    network.graph.add_node(Node::Gen(idle));

    let report = GeneratorsStartup::new(DispatchConfig::new().with_loss_factor(0.02))
        .apply(&mut network)
        .unwrap();

    let island = report.area(1).unwrap();
    assert_eq!(island.status, AreaStatus::Isolated);
    assert_eq!(island.committed_mw, 0.0);
    assert_eq!(target(&network, "T9"), 12.0);
    assert_eq!(report.area(0).unwrap().status, AreaStatus::Committed);
}

#[test]
fn test_infeasible_area_left_at_zero() {
    let mut network = Network::new();
    add_bus(&mut network, 1);
    for i in 1..=4 {
        network.graph.add_node(Node::Gen(thermal(i, 1, 100.0, i as f64)));
    }
    network.graph.add_node(Node::Load(load(1, 1, 900.0)));

    let report = GeneratorsStartup::new(DispatchConfig::default())
        .apply(&mut network)
        .unwrap();

    let area = report.area(0).unwrap();
    assert_eq!(area.status, AreaStatus::Infeasible);
    assert!(area.available_capacity_mw <= 400.0);
    assert_eq!(network.total_generation_mw(), 0.0);
    assert!(network.generators().iter().all(|g| !g.voltage_regulator_on));
    assert_eq!(report.diagnostics.issues_by_category("feasibility").count(), 1);
}

#[test]
fn test_default_abatement_without_outage_rates() {
    let mut network = Network::new();
    add_bus(&mut network, 1);
    for i in 1..=2 {
        network.graph.add_node(Node::Gen(
            Gen::new(GenId::new(i), format!("T{}", i), BusId::new(1))
                .with_energy_source(EnergySource::Thermal)
                .with_p_limits(0.0, 100.0)
                .with_profile(GeneratorProfile::new().with_startup_cost(i as f64)),
        ));
    }
    network.graph.add_node(Node::Load(load(1, 1, 100.0)));

    let report = GeneratorsStartup::new(DispatchConfig::new().with_default_abatement(0.1))
        .apply(&mut network)
        .unwrap();

    // 100 * (1 - 0.1) * (1 - 0.1 thermal margin)
    assert!((report.area(0).unwrap().available_capacity_mw - 162.0).abs() < 1e-9);
    assert!((target(&network, "T1") - 81.0).abs() < 1e-9);
    assert!((target(&network, "T2") - 19.0).abs() < 1e-9);
}

#[test]
fn test_start_at_max_override() {
    let mut network = fixture_network();
    let config = DispatchConfig::new()
        .with_loss_factor(0.02)
        .with_start_at_max("T1");
    GeneratorsStartup::new(config).apply(&mut network).unwrap();

    // T1 ignores its outage rates: 100 * 0.9 thermal margin
    assert!((target(&network, "T1") - 90.0).abs() < 1e-6);
    assert!((target(&network, "T2") - 76.95).abs() < 1e-6);
    assert!((target(&network, "T3") - 16.45).abs() < 1e-6);
}

#[test]
fn test_profiles_loaded_from_file() {
    let mut network = Network::new();
    add_bus(&mut network, 1);
    for i in 1..=2 {
        network.graph.add_node(Node::Gen(
            Gen::new(GenId::new(i), format!("G{}", i), BusId::new(1)).with_p_limits(0.0, 100.0),
        ));
    }
    network.graph.add_node(Node::Load(load(1, 1, 120.0)));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profiles.toml");
    std::fs::write(
        &path,
        "[G1]\nstartup_cost = 9.0\n\n[G2]\nstartup_cost = 1.0\nforced_outage_rate = 0.5\nplanned_outage_rate = 0.0\n",
    )
    .unwrap();

    let mut diag = gridhyp_core::Diagnostics::new();
    let attached = ProfileSet::load(&path)
        .unwrap()
        .apply_to(&mut network, &mut diag)
        .unwrap();
    assert_eq!(attached, 2);

    GeneratorsStartup::new(DispatchConfig::default())
        .apply(&mut network)
        .unwrap();
    assert!((target(&network, "G2") - 50.0).abs() < 1e-9);
    assert!((target(&network, "G1") - 70.0).abs() < 1e-9);
}

#[test]
fn test_out_of_range_outage_rate_rejected() {
    let mut network = Network::new();
    add_bus(&mut network, 1);
    network.graph.add_node(Node::Gen(
        Gen::new(GenId::new(1), "G1".into(), BusId::new(1))
            .with_energy_source(EnergySource::Thermal)
            .with_p_limits(0.0, 100.0)
            .with_profile(GeneratorProfile::new().with_outage_rates(1.5, 0.0)),
    ));
    network.graph.add_node(Node::Gen(thermal(2, 1, 100.0, 2.0)));
    network.graph.add_node(Node::Load(load(1, 1, 50.0)));

    let result = GeneratorsStartup::new(DispatchConfig::default()).apply(&mut network);
    assert!(matches!(
        result,
        Err(DispatchError::Grid(GridError::Validation(_)))
    ));
    assert!(network.generators().iter().all(|g| g.target_p.value() == 0.0));

    // The same profile cannot be attached afterwards either
    let err = network
        .attach_profile(
            GenId::new(2),
            GeneratorProfile::new().with_outage_rates(0.1, 1.5),
        )
        .unwrap_err();
    assert!(matches!(err, GridError::Validation(_)));
}

#[test]
fn test_many_units_on_one_bus() {
    let mut network = Network::new();
    add_bus(&mut network, 1);
    let n = 20_000;
    for i in 1..=n {
        network.graph.add_node(Node::Gen(
            Gen::new(GenId::new(i), format!("U{}", i), BusId::new(1))
                .with_p_limits(0.0, 1.0)
                .with_profile(GeneratorProfile::new().with_startup_cost(i as f64)),
        ));
    }
    network.graph.add_node(Node::Load(load(1, 1, 12_345.5)));

    let report = GeneratorsStartup::new(DispatchConfig::default())
        .apply(&mut network)
        .unwrap();

    let area = report.area(0).unwrap();
    assert_eq!(area.started.len(), 12_346);
    assert_eq!(area.marginal_unit.as_deref(), Some("U12346"));
    assert!((network.total_generation_mw() - 12_345.5).abs() < 1e-6);
}
