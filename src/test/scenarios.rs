use super::{approx, line3, no_attrs, plan};
use crate::net::{NetPlanError, RoutingCycleType, RoutingType};

#[test]
fn route_on_a_line_loads_both_links() {
    let t = line3();
    let p = &t.plan;
    assert!(approx(p.link(t.l01).unwrap().carried_traffic_not_including_protection(), 5.0));
    assert!(approx(p.link(t.l12).unwrap().carried_traffic_not_including_protection(), 5.0));
    assert!(approx(p.demand(t.demand).unwrap().carried_traffic(), 5.0));
    assert!(!p.is_demand_blocked(t.demand).unwrap());
    p.check_caches_consistency().unwrap();
}

#[test]
fn failing_a_link_blocks_the_demand_and_repair_restores_it() {
    let mut t = line3();
    t.plan.set_link_failure_state(t.l01, false).unwrap();
    {
        let p = &t.plan;
        assert!(p.route(t.route).unwrap().is_down());
        assert_eq!(p.link(t.l01).unwrap().carried_traffic_not_including_protection(), 0.0);
        assert_eq!(p.link(t.l12).unwrap().carried_traffic_not_including_protection(), 0.0);
        assert!(approx(p.demand(t.demand).unwrap().blocked_traffic(), 5.0));
        assert!(p.is_demand_blocked(t.demand).unwrap());
    }

    t.plan.set_link_failure_state(t.l01, true).unwrap();
    let p = &t.plan;
    assert!(p.route(t.route).unwrap().is_up());
    assert_eq!(p.route(t.route).unwrap().carried_traffic(), 5.0);
    assert_eq!(p.link(t.l01).unwrap().carried_traffic_not_including_protection(), 5.0);
    assert_eq!(p.link(t.l12).unwrap().occupied_capacity_not_including_protection(), 5.0);
    assert_eq!(p.demand(t.demand).unwrap().blocked_traffic(), 0.0);
}

#[test]
fn two_node_forwarding_loop_is_a_closed_cycle() {
    let mut p = plan();
    let layer = p.default_layer();
    let n0 = p.add_node("n0", 0.0, 0.0, no_attrs()).unwrap();
    let n1 = p.add_node("n1", 1.0, 0.0, no_attrs()).unwrap();
    let n2 = p.add_node("n2", 2.0, 0.0, no_attrs()).unwrap();
    let l01 = p.add_link(layer, n0, n1, 10.0, 1.0, 200_000.0, no_attrs()).unwrap();
    p.add_link(layer, n1, n2, 10.0, 1.0, 200_000.0, no_attrs()).unwrap();
    let l10 = p.add_link(layer, n1, n0, 10.0, 1.0, 200_000.0, no_attrs()).unwrap();
    p.set_routing_type(layer, RoutingType::HopByHopRouting).unwrap();
    let d = p.add_demand(layer, n0, n2, 5.0, no_attrs()).unwrap();

    p.set_forwarding_rules(layer, &[(d, l01, 1.0), (d, l10, 1.0)], true).unwrap();

    let demand = p.demand(d).unwrap();
    assert_eq!(demand.routing_cycle_type(), RoutingCycleType::ClosedCycles);
    assert_eq!(demand.carried_traffic(), 0.0);
    assert!(approx(demand.blocked_traffic(), 5.0));
    // 入口被困在环中：环上链路不承载任何流量
    assert!(demand.hop_by_hop_traffic().is_empty());
    assert_eq!(p.link(l01).unwrap().carried_traffic_not_including_protection(), 0.0);
    assert_eq!(p.link(l10).unwrap().carried_traffic_not_including_protection(), 0.0);
    p.check_caches_consistency().unwrap();
}

#[test]
fn coupled_link_capacity_follows_the_demand() {
    let mut p = plan();
    let l1 = p.default_layer();
    let l2 = p.add_layer("upper", "", "Gbps", "Gbps", no_attrs()).unwrap();
    let a = p.add_node("a", 0.0, 0.0, no_attrs()).unwrap();
    let b = p.add_node("b", 1.0, 0.0, no_attrs()).unwrap();
    let fiber = p.add_link(l1, a, b, 100.0, 10.0, 200_000.0, no_attrs()).unwrap();
    let d = p.add_demand(l1, a, b, 5.0, no_attrs()).unwrap();
    p.add_route(d, 5.0, 5.0, vec![fiber.into()], Default::default(), no_attrs()).unwrap();
    let e = p.add_link(l2, a, b, 42.0, 10.0, 200_000.0, no_attrs()).unwrap();

    p.couple(d, e).unwrap();
    assert_eq!(p.link(e).unwrap().capacity(), 5.0);
    assert!(matches!(
        p.set_link_capacity(e, 7.0),
        Err(NetPlanError::CoupledLinkCapacity(id)) if id == e
    ));

    p.decouple_link(e).unwrap();
    assert_eq!(p.link(e).unwrap().capacity(), 5.0);
    p.set_link_capacity(e, 7.0).unwrap();
    assert_eq!(p.link(e).unwrap().capacity(), 7.0);
    assert!(p.demand(d).unwrap().coupled_link().is_none());
}

#[test]
fn coupling_back_down_the_layer_stack_is_rejected() {
    let mut p = plan();
    let la = p.default_layer();
    let lb = p.add_layer("B", "", "Gbps", "Gbps", no_attrs()).unwrap();
    let lc = p.add_layer("C", "", "Gbps", "Gbps", no_attrs()).unwrap();
    let x = p.add_node("x", 0.0, 0.0, no_attrs()).unwrap();
    let y = p.add_node("y", 1.0, 0.0, no_attrs()).unwrap();

    // A -> B -> C
    let da = p.add_demand(la, x, y, 1.0, no_attrs()).unwrap();
    p.couple_to_new_link_created(da, lb).unwrap();
    let db = p.add_demand(lb, x, y, 1.0, no_attrs()).unwrap();
    p.couple_to_new_link_created(db, lc).unwrap();

    let before: Vec<_> = p.coupling_dag().edges().map(|(l, u, s)| (l, u, s.clone())).collect();

    // 直接：B 的需求耦合到 A 的链路
    let link_a = p.add_link(la, x, y, 1.0, 1.0, 200_000.0, no_attrs()).unwrap();
    let db2 = p.add_demand(lb, x, y, 0.0, no_attrs()).unwrap();
    assert!(matches!(p.couple(db2, link_a), Err(NetPlanError::CouplingCycle { .. })));

    // 传递：C 的需求耦合到 A 的链路
    let dc = p.add_demand(lc, x, y, 0.0, no_attrs()).unwrap();
    assert!(matches!(p.couple(dc, link_a), Err(NetPlanError::CouplingCycle { .. })));
    assert!(matches!(
        p.couple_to_new_link_created(dc, la),
        Err(NetPlanError::CouplingCycle { .. })
    ));

    let after: Vec<_> = p.coupling_dag().edges().map(|(l, u, s)| (l, u, s.clone())).collect();
    assert_eq!(before, after);
    assert!(p.coupling_dag().is_acyclic());
    assert!(p.link(link_a).unwrap().coupled_demand().is_none());
}
