use super::*;
use crate::config::{EnergyCosts, ReproductionMode, TickPolicy, Topology};
use crate::spatial::Location;
use proptest::prelude::*;

fn manual_config(costs: EnergyCosts) -> SimConfig {
    SimConfig {
        energy_costs: costs,
        ..SimConfig::default()
    }
}

fn place_with_rules(space: &mut Space, x: i32, y: i32, pairs: &[(u16, u16)]) -> CellId {
    let id = space.place_cell_at(Location::new(x, y)).unwrap();
    for &pair in pairs {
        space.add_rule(id, RulePair::from(pair)).unwrap();
    }
    id
}

fn first_rule(space: &Space, id: CellId) -> ProductRule {
    *space.cell(id).unwrap().rules().next().unwrap()
}

fn rule_for(space: &Space, id: CellId, pair: (u16, u16)) -> ProductRule {
    *space
        .cell(id)
        .unwrap()
        .rules()
        .find(|r| r.pair() == RulePair::from(pair))
        .unwrap()
}

/// Two adjacent cells, `a: 1->2` and `b: 2->3`, free energy and one type-1
/// product in the urn.
fn producer_consumer(mode: ReproductionMode) -> (Space, CellId, CellId) {
    let config = SimConfig {
        reproduction_mode: mode,
        ..manual_config(EnergyCosts::uniform(0.0))
    };
    let mut space = Space::empty(config).unwrap();
    let a = place_with_rules(&mut space, 5, 5, &[(1, 2)]);
    let b = place_with_rules(&mut space, 6, 5, &[(2, 3)]);
    space.deposit_product(1, 10.0).unwrap();
    (space, a, b)
}

fn brute_force_neighbors(space: &Space, id: CellId) -> BTreeSet<CellId> {
    let here = space.cells[id.0].location();
    space
        .cells
        .iter()
        .filter(|c| c.is_alive() && c.id() != id)
        .filter(|c| space.bounds.within(space.config.vision_radius, here, c.location()))
        .map(|c| c.id())
        .collect()
}

#[test]
fn new_space_deals_every_rule_and_product() {
    let space = Space::new(SimConfig::default()).unwrap();
    assert_eq!(space.cells().len(), 20);
    assert_eq!(space.total_rules(), 200);
    assert_eq!(space.urn().len(), 200);
    assert_eq!(space.total_products(), 200);
    assert_eq!(space.step_count(), 0);
    assert_eq!(space.events(), EventCounters::default());
    for cell in space.cells() {
        assert!(space.bounds().contains(cell.location()));
        assert_eq!(cell.is_alive(), cell.rule_count() > 0);
    }
    space.assert_invariants();
}

#[test]
fn new_rejects_invalid_config() {
    let config = SimConfig {
        cell_count: 0,
        ..SimConfig::default()
    };
    assert!(matches!(
        Space::new(config),
        Err(SpaceInitError::Config(SimConfigError::InvalidCellCount))
    ));
}

#[test]
fn placement_fails_when_exclusion_cannot_be_met() {
    let config = SimConfig {
        space_width: 3,
        space_height: 3,
        cell_count: 4,
        cell_exclusion_radius: 2.0,
        placement_attempts: 50,
        ..SimConfig::default()
    };
    let err = Space::new(config).unwrap_err();
    assert!(matches!(err, SpaceInitError::Placement(CoreError::NotFound(_))));
    assert!(err.source().is_some());
}

#[test]
fn explicit_placement_rejects_off_grid_spots() {
    let mut space = Space::empty(SimConfig::default()).unwrap();
    assert!(matches!(
        space.place_cell_at(Location::new(0, 3)),
        Err(CoreError::InvalidArgument(_))
    ));
    assert!(matches!(
        space.place_cell_at(Location::new(3, 11)),
        Err(CoreError::InvalidArgument(_))
    ));
}

#[test]
fn add_rule_validates_types_and_cell() {
    let mut space = Space::empty(SimConfig::default()).unwrap();
    let a = space.place_cell_at(Location::new(1, 1)).unwrap();
    assert!(matches!(
        space.add_rule(a, RulePair::new(1, 4)),
        Err(CoreError::InvalidArgument(_))
    ));
    assert!(matches!(
        space.add_rule(CellId(9), RulePair::new(1, 2)),
        Err(CoreError::NotFound(_))
    ));
    assert_eq!(space.total_rules(), 0);
}

#[test]
fn lone_cell_keeps_transformed_product() {
    let mut space = Space::empty(manual_config(EnergyCosts::uniform(2.0))).unwrap();
    let a = place_with_rules(&mut space, 5, 5, &[(1, 2)]);
    space.deposit_product(1, 10.0).unwrap();

    let outcome = space.activate_random_rule();

    assert_eq!(
        outcome,
        TickOutcome::Stepped {
            cell: a,
            outcome: ChainOutcome::Retained
        }
    );
    assert_eq!(space.step_count(), 1);
    assert!(space.urn().is_empty());
    let stored: Vec<_> = space.cell(a).unwrap().stored_products().collect();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].kind(), 2);
    assert!((stored[0].energy() - 8.0).abs() < 1e-12);
    assert_eq!(space.storage_breakdown(a).unwrap(), BTreeMap::from([(2, 1)]));
}

#[test]
fn source_mode_reproduces_in_sender() {
    let (mut space, a, b) = producer_consumer(ReproductionMode::Source);
    assert!(space.cell(a).unwrap().neighbors().contains(&b));
    let rule = first_rule(&space, a);
    space.set_active_rule(a, rule).unwrap();
    let before = space.total_rules();

    let ChainOutcome::Delivered { to, delivery } = space.chain_step(a) else {
        panic!("product should reach the neighbor");
    };

    assert_eq!(to, b);
    match delivery {
        Delivery::Stored { reproduced_in } | Delivery::Orphaned { reproduced_in } => {
            assert_eq!(reproduced_in, Some(a));
        }
        other => panic!("unexpected delivery {other:?}"),
    }
    assert_eq!(space.total_rules(), before);
    assert_eq!(space.events().reproductions, 1);
    assert_eq!(space.events().deletions, 1);
    space.assert_invariants();
}

#[test]
fn reproduction_is_paired_with_one_deletion() {
    let (mut space, a, _) = producer_consumer(ReproductionMode::Source);
    let rule = first_rule(&space, a);
    space.set_active_rule(a, rule).unwrap();
    let total_before = space.total_rules();
    let a_before = space.cell(a).unwrap().rule_count();

    let rep = space.reproduce_active_rule(a).unwrap();

    assert_eq!(rep.parent, a);
    assert_eq!(rep.pair, RulePair::new(1, 2));
    let (removed_from, _) = rep.removed.expect("a deletion always follows");
    let expected = a_before + 1 - usize::from(removed_from == a);
    assert_eq!(space.cell(a).unwrap().rule_count(), expected);
    assert_eq!(space.total_rules(), total_before);
    assert_eq!(space.last_reproduction_step(), space.step_count());
    space.assert_invariants();
}

#[test]
fn target_mode_reproduces_in_receiver() {
    let (mut space, a, b) = producer_consumer(ReproductionMode::Target);
    space.deposit_product(2, 4.0).unwrap();
    let product = space
        .urn
        .request_product(2, &[], false, &mut space.rng)
        .unwrap();

    let delivery = space.receive_product(b, a, product);

    match delivery {
        Delivery::Stored { reproduced_in } | Delivery::Orphaned { reproduced_in } => {
            assert_eq!(reproduced_in, Some(b));
        }
        other => panic!("unexpected delivery {other:?}"),
    }
    assert_eq!(space.total_rules(), 2);
    space.assert_invariants();
}

#[test]
fn receiver_without_matching_rule_returns_product_to_urn() {
    let (mut space, a, b) = producer_consumer(ReproductionMode::Target);
    let product = space
        .urn
        .request_product(1, &[], false, &mut space.rng)
        .unwrap();
    assert_eq!(space.receive_product(b, a, product), Delivery::Rejected);
    assert_eq!(space.urn().count(1), 1);
    assert_eq!(space.events().reproductions, 0);
    space.assert_invariants();
}

#[test]
fn inert_product_goes_back_to_the_urn() {
    let mut space = Space::empty(SimConfig::default()).unwrap();
    let a = place_with_rules(&mut space, 5, 5, &[(1, 2)]);
    space.deposit_product(1, 0.0).unwrap();
    space.set_active_rule(a, first_rule(&space, a)).unwrap();

    assert_eq!(space.chain_step(a), ChainOutcome::Inert);
    assert_eq!(space.urn().count(1), 1);
    assert_eq!(space.cell(a).unwrap().stored_count(), 0);
    space.assert_invariants();
}

#[test]
fn empty_urn_is_a_soft_outcome() {
    let mut space = Space::empty(SimConfig::default()).unwrap();
    let a = place_with_rules(&mut space, 5, 5, &[(1, 2)]);
    space.deposit_product(3, 5.0).unwrap();
    space.set_active_rule(a, first_rule(&space, a)).unwrap();
    assert_eq!(space.chain_step(a), ChainOutcome::NoProduct);
    assert_eq!(space.urn().len(), 1);
}

#[test]
fn spent_product_never_blocks_storage() {
    let mut space = Space::empty(manual_config(EnergyCosts::uniform(2.0))).unwrap();
    let a = place_with_rules(&mut space, 5, 5, &[(1, 2), (2, 3)]);
    space.deposit_product(1, 2.0).unwrap();
    space.set_active_rule(a, rule_for(&space, a, (1, 2))).unwrap();

    assert_eq!(space.chain_step(a), ChainOutcome::Retained);
    assert_eq!(space.cell(a).unwrap().stored_count(), 0);
    assert_eq!(space.urn().count(2), 1);
    assert_eq!(space.cells[a.0].has_compatible_product(&mut space.rng), None);

    space.deposit_product(2, 10.0).unwrap();
    space.set_active_rule(a, rule_for(&space, a, (2, 3))).unwrap();
    for _ in 0..50 {
        space.chain_step(a);
    }
    let stored: Vec<_> = space.cell(a).unwrap().stored_products().collect();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].kind(), 3);
    assert!((stored[0].energy() - 8.0).abs() < 1e-12);
    assert_eq!(space.urn().count(2), 1);
    assert_eq!(space.urn().active_count(2), 0);
    space.assert_invariants();
}

#[test]
fn spent_product_popped_from_storage_moves_to_the_urn() {
    let mut space = Space::empty(SimConfig::default()).unwrap();
    let a = place_with_rules(&mut space, 5, 5, &[(1, 2)]);
    space.deposit_product(1, 0.0).unwrap();
    let spent = space
        .urn
        .request_product(1, &[], false, &mut space.rng)
        .unwrap();
    space.cells[a.0].add_product(spent);
    space.set_active_rule(a, first_rule(&space, a)).unwrap();

    assert_eq!(space.chain_step(a), ChainOutcome::Inert);
    assert_eq!(space.cell(a).unwrap().stored_count(), 0);
    assert_eq!(space.urn().count(1), 1);
    space.assert_invariants();
}

#[test]
fn product_spent_on_reproduction_goes_to_the_urn() {
    let costs = EnergyCosts {
        pass: 0.0,
        transform: 0.0,
        reproduce: 4.0,
    };
    let mut space = Space::empty(manual_config(costs)).unwrap();
    let a = place_with_rules(&mut space, 5, 5, &[(1, 2), (1, 2)]);
    let b = place_with_rules(&mut space, 6, 5, &[(2, 3), (2, 3)]);
    space.deposit_product(2, 4.0).unwrap();
    let product = space
        .urn
        .request_product(2, &[], false, &mut space.rng)
        .unwrap();

    let delivery = space.receive_product(b, a, product);

    assert!(matches!(
        delivery,
        Delivery::Stored { reproduced_in: Some(_) } | Delivery::Orphaned { .. }
    ));
    assert!(space.cells().iter().all(|c| c.stored_count() == 0));
    assert_eq!(space.urn().count(2), 1);
    assert_eq!(space.events().reproductions, 1);
    space.assert_invariants();
}

#[test]
fn random_cell_tick_prefers_rules_for_stored_products() {
    let mut space = Space::empty(manual_config(EnergyCosts::uniform(0.0))).unwrap();
    let a = place_with_rules(&mut space, 5, 5, &[(1, 2), (3, 1)]);
    for _ in 0..200 {
        space.deposit_product(3, 5.0).unwrap();
        let product = space
            .urn
            .request_product(3, &[], false, &mut space.rng)
            .unwrap();
        space.cells[a.0].add_product(product);

        let outcome = space.activate_random_cell();

        assert_eq!(
            outcome,
            TickOutcome::Stepped {
                cell: a,
                outcome: ChainOutcome::Retained
            }
        );
        let active = space.cell(a).unwrap().active_rule().unwrap();
        assert_eq!(active.pair(), RulePair::new(3, 1));
        let made = space.cells[a.0].take_product(1).unwrap();
        space.urn.return_product(made);
        assert_eq!(space.cell(a).unwrap().stored_count(), 0);
    }
    space.assert_invariants();
}

#[test]
fn random_cell_tick_falls_back_to_any_rule_when_storage_is_empty() {
    let mut space = Space::empty(manual_config(EnergyCosts::uniform(0.0))).unwrap();
    let a = place_with_rules(&mut space, 5, 5, &[(1, 2), (3, 1)]);
    let mut seen = BTreeSet::new();
    for _ in 0..200 {
        let outcome = space.activate_random_cell();
        assert_eq!(
            outcome,
            TickOutcome::Stepped {
                cell: a,
                outcome: ChainOutcome::NoProduct
            }
        );
        seen.insert(space.cell(a).unwrap().active_rule().unwrap().pair());
    }
    assert_eq!(
        seen,
        BTreeSet::from([RulePair::new(1, 2), RulePair::new(3, 1)])
    );
}

#[test]
fn insufficient_energy_stops_at_each_stage() {
    let costs = EnergyCosts {
        pass: 0.0,
        transform: 5.0,
        reproduce: 0.0,
    };
    let mut space = Space::empty(manual_config(costs)).unwrap();
    let a = place_with_rules(&mut space, 5, 5, &[(1, 2)]);
    space.deposit_product(1, 3.0).unwrap();
    space.set_active_rule(a, first_rule(&space, a)).unwrap();
    assert_eq!(
        space.chain_step(a),
        ChainOutcome::EnergyExhausted(EnergyStage::Transform)
    );
    let p = space.urn().products().next().unwrap();
    assert_eq!((p.kind(), p.energy()), (1, 3.0));

    let costs = EnergyCosts {
        pass: 5.0,
        transform: 1.0,
        reproduce: 0.0,
    };
    let mut space = Space::empty(manual_config(costs)).unwrap();
    let a = place_with_rules(&mut space, 5, 5, &[(1, 2)]);
    place_with_rules(&mut space, 6, 5, &[(2, 3)]);
    space.deposit_product(1, 3.0).unwrap();
    space.set_active_rule(a, first_rule(&space, a)).unwrap();
    assert_eq!(
        space.chain_step(a),
        ChainOutcome::EnergyExhausted(EnergyStage::Pass)
    );
    let p = space.urn().products().next().unwrap();
    assert_eq!((p.kind(), p.energy()), (2, 2.0));
    space.assert_invariants();

    let (mut space, a, b) = producer_consumer(ReproductionMode::Target);
    space.config.energy_costs.reproduce = 100.0;
    space.set_active_rule(a, first_rule(&space, a)).unwrap();
    assert_eq!(
        space.chain_step(a),
        ChainOutcome::Delivered {
            to: b,
            delivery: Delivery::Exhausted
        }
    );
    assert_eq!(space.total_rules(), 2);
    space.assert_invariants();
}

#[test]
fn selective_request_retargets_active_rule() {
    let config = SimConfig {
        request_policy: RequestPolicyKind::Selective,
        ..manual_config(EnergyCosts::uniform(0.0))
    };
    let mut space = Space::empty(config).unwrap();
    let a = place_with_rules(&mut space, 5, 5, &[(1, 2), (3, 1)]);
    space.deposit_product(3, 5.0).unwrap();
    let wants_one = space
        .cell(a)
        .unwrap()
        .rules()
        .copied()
        .find(|r| r.input() == 1)
        .unwrap();
    space.set_active_rule(a, wants_one).unwrap();

    assert_eq!(space.chain_step(a), ChainOutcome::Retained);
    assert_eq!(space.storage_breakdown(a).unwrap(), BTreeMap::from([(1, 1)]));
    assert_eq!(
        space.cell(a).unwrap().active_rule().map(|r| r.pair()),
        Some(RulePair::new(3, 1))
    );
}

#[test]
fn dead_cell_stays_dead_and_drained() {
    let (mut space, a, b) = producer_consumer(ReproductionMode::Source);
    let product = space.urn.request_product(1, &[], false, &mut space.rng).unwrap();
    space.cells[b.0].add_product(product);
    let rule = first_rule(&space, b);

    space.remove_rule(b, &rule).unwrap();

    let dead = space.cell(b).unwrap();
    assert!(!dead.is_alive());
    assert_eq!(dead.stored_count(), 0);
    assert!(dead.neighbors().is_empty());
    assert!(!space.cell(a).unwrap().neighbors().contains(&b));
    assert!(space.grid.occupants(dead.location()).is_empty());
    assert_eq!(space.urn().len(), 1);
    assert_eq!(space.events().deaths, 1);
    for _ in 0..200 {
        assert_eq!(space.select_random_cell(None), Some(a));
    }
    assert!(matches!(
        space.add_rule(b, RulePair::new(1, 2)),
        Err(CoreError::InvalidArgument(_))
    ));
    assert!(space.reproduce_active_rule(b).is_none());
    assert!(space.move_cell(b).is_err());
    space.assert_invariants();
}

#[test]
fn losing_last_rule_for_a_type_releases_stored_units() {
    let mut space = Space::empty(SimConfig::default()).unwrap();
    let a = place_with_rules(&mut space, 5, 5, &[(1, 2), (2, 3)]);
    space.deposit_product(1, 5.0).unwrap();
    let product = space.urn.request_product(1, &[], false, &mut space.rng).unwrap();
    space.cells[a.0].add_product(product);
    let eats_one = *space
        .cell(a)
        .unwrap()
        .rules()
        .find(|r| r.input() == 1)
        .unwrap();
    space.remove_rule(a, &eats_one).unwrap();
    assert!(space.cell(a).unwrap().is_alive());
    assert_eq!(space.cell(a).unwrap().stored_count(), 0);
    assert_eq!(space.urn().count(1), 1);
}

#[test]
fn cell_selection_is_weighted_by_rule_count() {
    let mut space = Space::empty(SimConfig::default()).unwrap();
    let light = place_with_rules(&mut space, 1, 1, &[(1, 2)]);
    let mid = place_with_rules(&mut space, 4, 4, &[(1, 2), (2, 3)]);
    let heavy = place_with_rules(&mut space, 7, 7, &[(1, 2), (2, 3), (3, 1), (1, 3), (2, 1)]);
    let trials = 16_000;
    let mut hits = BTreeMap::new();
    for _ in 0..trials {
        let id = space.select_random_cell(None).unwrap();
        *hits.entry(id).or_insert(0usize) += 1;
    }
    for (id, weight) in [(light, 1.0), (mid, 2.0), (heavy, 5.0)] {
        let share = hits[&id] as f64 / trials as f64;
        assert!((share - weight / 8.0).abs() < 0.02, "{id}: share {share}");
    }
    for _ in 0..500 {
        assert_ne!(space.select_random_cell(Some(heavy)), Some(heavy));
    }
}

#[test]
fn neighbors_wrap_across_the_boundary() {
    let mut space = Space::empty(SimConfig::default()).unwrap();
    let a = space.place_cell_at(Location::new(1, 1)).unwrap();
    let b = space.place_cell_at(Location::new(10, 10)).unwrap();
    let c = space.place_cell_at(Location::new(5, 5)).unwrap();
    assert!(space.cell(a).unwrap().neighbors().contains(&b));
    assert!(space.cell(b).unwrap().neighbors().contains(&a));
    assert!(space.cell(c).unwrap().neighbors().is_empty());
}

#[test]
fn stepping_updates_neighbors_on_both_sides() {
    let mut space = Space::empty(SimConfig::default()).unwrap();
    let a = space.place_cell_at(Location::new(5, 5)).unwrap();
    let b = space.place_cell_at(Location::new(7, 5)).unwrap();
    assert!(space.cell(a).unwrap().neighbors().is_empty());

    assert_eq!(space.shift_cell(a, 1, 0), Location::new(6, 5));
    assert!(space.cell(a).unwrap().neighbors().contains(&b));
    assert!(space.cell(b).unwrap().neighbors().contains(&a));

    space.shift_cell(a, -1, 1);
    assert!(space.cell(a).unwrap().neighbors().is_empty());
    assert!(space.cell(b).unwrap().neighbors().is_empty());
}

#[test]
fn compatibility_ring_across_three_neighbors_is_a_hypercycle() {
    let mut space = Space::empty(SimConfig::default()).unwrap();
    place_with_rules(&mut space, 2, 2, &[(1, 2)]);
    place_with_rules(&mut space, 3, 2, &[(2, 3)]);
    let c = place_with_rules(&mut space, 2, 3, &[(3, 1)]);

    let report = space.report(100);
    assert!(report.active);
    assert_eq!(report.cycles.cycle_count, 1);
    assert_eq!(report.cycles.hypercycle_count, 1);
    assert_eq!(report.cycles.plus3_cell_complexity, 1);
    assert_eq!(report.cycles.plus3_rule_complexity, 1);
    assert_eq!(report.alive_cells, 3);

    // Out of reach, the ring breaks.
    for _ in 0..4 {
        space.shift_cell(c, 1, 1);
    }
    assert_eq!(space.report(100).cycles.cycle_count, 0);
}

#[test]
fn well_mixed_links_every_living_pair() {
    let config = SimConfig {
        topology: Topology::WellMixed,
        ..SimConfig::default()
    };
    let mut space = Space::empty(config).unwrap();
    place_with_rules(&mut space, 1, 1, &[(1, 2)]);
    place_with_rules(&mut space, 5, 5, &[(2, 1)]);
    let net = space.build_rule_net();
    assert_eq!(net.node_count(), 2);
    assert_eq!(net.edge_count(), 2);
}

#[test]
fn stale_runs_report_zeroed_metrics() {
    let mut space = Space::empty(SimConfig::default()).unwrap();
    place_with_rules(&mut space, 2, 2, &[(1, 2)]);
    place_with_rules(&mut space, 3, 2, &[(2, 1)]);
    space.step_count = 100;
    let report = space.report(100);
    assert!(!report.active);
    assert_eq!(report.cycles.cycle_count, 0);
    assert_eq!(report.cycles.step, 100);
    assert!(space.report(10_000).active);
}

#[test]
fn run_experiment_samples_and_validates() {
    let mut space = Space::new(SimConfig::default()).unwrap();
    assert_eq!(
        space.run_experiment(10, 0).unwrap_err(),
        ExperimentError::InvalidSampleEvery
    );
    let summary = space.run_experiment(300, 100).unwrap();
    assert_eq!(summary.samples.len(), 3);
    assert_eq!(summary.samples.last().map(|s| s.step), Some(300));
    assert_eq!(summary.steps, 300);
    assert_eq!(summary.events, space.events());
    assert_eq!(summary.report.total_rules, space.total_rules());
    let json = serde_json::to_string(&summary).expect("serialize");
    let parsed: RunSummary = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(parsed.report, summary.report);
}

#[test]
fn same_seed_same_run() {
    let run = || {
        let mut space = Space::new(SimConfig::default()).unwrap();
        space.run_experiment(500, 50).unwrap()
    };
    assert_eq!(run(), run());
}

#[test]
fn long_run_conserves_products_and_rules() {
    for (topology, tick_policy, request_policy) in [
        (Topology::Spatial, TickPolicy::RandomRule, RequestPolicyKind::Uniform),
        (Topology::Spatial, TickPolicy::RandomCell, RequestPolicyKind::Selective),
        (Topology::WellMixed, TickPolicy::RandomRule, RequestPolicyKind::Uniform),
    ] {
        let config = SimConfig {
            topology,
            tick_policy,
            request_policy,
            ..SimConfig::default()
        };
        let mut space = Space::new(config).unwrap();
        let rules = space.total_rules();
        let products = space.total_products();
        let mut dead: BTreeSet<usize> = BTreeSet::new();
        let start: Vec<Location> = space.cells().iter().map(Cell::location).collect();
        for _ in 0..3_000 {
            space.step();
            assert_eq!(space.total_rules(), rules);
            let stored: usize = space.cells().iter().map(Cell::stored_count).sum();
            assert_eq!(space.urn().len() + stored, products);
            for id in &dead {
                let cell = &space.cells()[*id];
                assert!(!cell.is_alive());
                assert_eq!(cell.stored_count(), 0);
            }
            dead.extend(space.cells().iter().filter(|c| !c.is_alive()).map(|c| c.id().0));
        }
        assert_eq!(space.step_count(), 3_000);
        if topology == Topology::WellMixed {
            let now: Vec<Location> = space.cells().iter().map(Cell::location).collect();
            assert_eq!(now, start);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn neighbor_sets_match_brute_force_under_motion(
        seed in any::<u64>(),
        edge in 3i32..12,
        radius in prop::sample::select(vec![1.0f64, 1.5, 2.0, 2.5]),
        moves in 50usize..200,
    ) {
        let capacity = (edge * edge) as usize;
        let config = SimConfig {
            seed,
            space_width: edge,
            space_height: edge,
            cell_count: capacity.min(25),
            vision_radius: radius,
            invariant_checks: false,
            ..SimConfig::default()
        };
        let mut space = Space::new(config).unwrap();
        for _ in 0..moves {
            let Some(id) = space.select_random_cell(None) else { break };
            space.move_cell(id).unwrap();
            for cell in space.cells().iter().filter(|c| c.is_alive()) {
                let expected = brute_force_neighbors(&space, cell.id());
                prop_assert_eq!(cell.neighbors(), &expected);
            }
        }
        space.assert_invariants();
    }
}
