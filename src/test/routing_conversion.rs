use super::{approx, line3, no_attrs};
use crate::net::{NetPlanError, RoutingType};

#[test]
fn source_to_hop_by_hop_keeps_the_carried_traffic() {
    let mut t = line3();
    t.plan.set_routing_type(t.layer, RoutingType::HopByHopRouting).unwrap();
    let p = &t.plan;
    assert_eq!(p.layer(t.layer).unwrap().routing_type(), RoutingType::HopByHopRouting);
    assert_eq!(p.routes_of(t.layer).unwrap().count(), 0);
    assert!(p.route(t.route).is_err());
    assert_eq!(p.forwarding_rule_matrix(t.layer).unwrap(), vec![vec![1.0, 1.0]]);
    assert!(approx(p.demand(t.demand).unwrap().carried_traffic(), 5.0));
    assert!(approx(p.link(t.l12).unwrap().carried_traffic_not_including_protection(), 5.0));
    p.check_caches_consistency().unwrap();
}

#[test]
fn round_trip_through_hop_by_hop_rebuilds_equivalent_routes() {
    let mut t = line3();
    // 先让路由处于故障状态：转换使用无故障时的流量
    t.plan.set_link_failure_state(t.l12, false).unwrap();
    t.plan.set_routing_type(t.layer, RoutingType::HopByHopRouting).unwrap();
    assert_eq!(t.plan.forwarding_rule_matrix(t.layer).unwrap(), vec![vec![1.0, 1.0]]);
    assert_eq!(t.plan.demand(t.demand).unwrap().carried_traffic(), 0.0);

    t.plan.set_link_failure_state(t.l12, true).unwrap();
    t.plan.set_routing_type(t.layer, RoutingType::SourceRouting).unwrap();
    let routes: Vec<_> = t.plan.routes_of(t.layer).unwrap().collect();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].path(), &[t.l01.into(), t.l12.into()]);
    assert!(approx(routes[0].carried_traffic(), 5.0));
    assert_eq!(t.plan.forwarding_rule_matrix(t.layer).unwrap(), vec![vec![0.0, 0.0]]);
}

#[test]
fn link_traffic_matrix_builds_routes_on_source_routing_layer() {
    let mut t = line3();
    let l02 = t
        .plan
        .add_link(t.layer, t.nodes[0], t.nodes[2], 10.0, 1.0, 200_000.0, no_attrs())
        .unwrap();
    // 列顺序：l01, l12, l02
    t.plan
        .set_routing_from_demand_link_carried_traffic(t.layer, &[vec![2.0, 2.0, 3.0]])
        .unwrap();
    let p = &t.plan;
    assert_eq!(p.demand(t.demand).unwrap().routes().len(), 2);
    assert!(approx(p.demand(t.demand).unwrap().carried_traffic(), 5.0));
    assert!(approx(p.link(l02).unwrap().carried_traffic_not_including_protection(), 3.0));
    assert!(approx(p.link(t.l01).unwrap().carried_traffic_not_including_protection(), 2.0));
    assert!(p.is_demand_bifurcated(t.demand).unwrap());

    assert!(matches!(
        t.plan.set_routing_from_demand_link_carried_traffic(t.layer, &[vec![-1.0, 0.0, 0.0]]),
        Err(NetPlanError::InvalidQuantity { .. })
    ));
}

#[test]
fn service_chain_demands_block_hop_by_hop_conversion() {
    let mut p = super::plan();
    let layer = p.default_layer();
    let a = p.add_node("a", 0.0, 0.0, no_attrs()).unwrap();
    let b = p.add_node("b", 1.0, 0.0, no_attrs()).unwrap();
    let d = p.add_demand(layer, a, b, 1.0, no_attrs()).unwrap();
    p.set_service_chain_sequence_of_resource_types(d, vec!["firewall".into()])
        .unwrap();
    assert!(matches!(
        p.set_routing_type(layer, RoutingType::HopByHopRouting),
        Err(NetPlanError::InvalidArgument(_))
    ));
    assert_eq!(p.layer(layer).unwrap().routing_type(), RoutingType::SourceRouting);
}

#[test]
fn hop_by_hop_to_source_keeps_traffic_when_a_branch_drops() {
    let mut p = super::plan();
    let layer = p.default_layer();
    let n: Vec<_> = (0..4)
        .map(|i| p.add_node(&format!("n{i}"), i as f64, 0.0, no_attrs()).unwrap())
        .collect();
    let a = p.add_link(layer, n[0], n[1], 10.0, 1.0, 200_000.0, no_attrs()).unwrap();
    let b = p.add_link(layer, n[0], n[2], 10.0, 1.0, 200_000.0, no_attrs()).unwrap();
    let c = p.add_link(layer, n[2], n[3], 10.0, 1.0, 200_000.0, no_attrs()).unwrap();
    p.set_routing_type(layer, RoutingType::HopByHopRouting).unwrap();
    let d = p.add_demand(layer, n[0], n[3], 10.0, no_attrs()).unwrap();
    // n1 没有转发规则，经 a 的一半流量被丢弃
    p.set_forwarding_rules(layer, &[(d, a, 0.5), (d, b, 0.5), (d, c, 1.0)], true)
        .unwrap();
    let before = p.demand(d).unwrap().carried_traffic();
    assert!(approx(before, 5.0));

    p.set_routing_type(layer, RoutingType::SourceRouting).unwrap();
    let routes: Vec<_> = p.routes_of(layer).unwrap().collect();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].path(), &[b.into(), c.into()]);
    assert!(approx(p.demand(d).unwrap().carried_traffic(), before));
    assert_eq!(p.link(a).unwrap().carried_traffic_not_including_protection(), 0.0);
    p.check_caches_consistency().unwrap();
}

#[test]
fn hop_by_hop_to_source_keeps_traffic_around_a_closed_cycle() {
    let mut p = super::plan();
    let layer = p.default_layer();
    let n: Vec<_> = (0..4)
        .map(|i| p.add_node(&format!("n{i}"), i as f64, 0.0, no_attrs()).unwrap())
        .collect();
    let into_loop = p.add_link(layer, n[0], n[1], 10.0, 1.0, 200_000.0, no_attrs()).unwrap();
    let direct = p.add_link(layer, n[0], n[3], 10.0, 1.0, 200_000.0, no_attrs()).unwrap();
    let l12 = p.add_link(layer, n[1], n[2], 10.0, 1.0, 200_000.0, no_attrs()).unwrap();
    let l21 = p.add_link(layer, n[2], n[1], 10.0, 1.0, 200_000.0, no_attrs()).unwrap();
    p.set_routing_type(layer, RoutingType::HopByHopRouting).unwrap();
    let d = p.add_demand(layer, n[0], n[3], 10.0, no_attrs()).unwrap();
    p.set_forwarding_rules(
        layer,
        &[(d, into_loop, 0.5), (d, direct, 0.5), (d, l12, 1.0), (d, l21, 1.0)],
        true,
    )
    .unwrap();
    let before = p.demand(d).unwrap().carried_traffic();
    assert!(approx(before, 5.0));

    p.set_routing_type(layer, RoutingType::SourceRouting).unwrap();
    let routes: Vec<_> = p.routes_of(layer).unwrap().collect();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].path(), &[direct.into()]);
    assert!(approx(p.demand(d).unwrap().carried_traffic(), before));
    p.check_caches_consistency().unwrap();
}
