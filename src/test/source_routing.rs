use std::collections::BTreeMap;

use super::{approx, line3, no_attrs};
use crate::net::{LinkId, NetPlanError, NetworkElementId, PathElement};

#[test]
fn discontinuous_or_wrong_layer_paths_are_rejected() {
    let mut t = line3();
    let bad = t.plan.add_route(
        t.demand,
        1.0,
        1.0,
        vec![PathElement::Link(t.l12), PathElement::Link(t.l01)],
        BTreeMap::new(),
        no_attrs(),
    );
    assert!(matches!(bad, Err(NetPlanError::InvalidPath(_))));

    let short = t
        .plan
        .add_route(t.demand, 1.0, 1.0, vec![PathElement::Link(t.l01)], BTreeMap::new(), no_attrs());
    assert!(matches!(short, Err(NetPlanError::InvalidPath(_))));

    let other = t.plan.add_layer("other", "", "Gbps", "Gbps", no_attrs()).unwrap();
    let foreign = t
        .plan
        .add_link(other, t.nodes[0], t.nodes[2], 1.0, 1.0, 200_000.0, no_attrs())
        .unwrap();
    assert!(t
        .plan
        .add_route(t.demand, 1.0, 1.0, vec![foreign.into()], BTreeMap::new(), no_attrs())
        .is_err());
    assert_eq!(t.plan.demand(t.demand).unwrap().routes().len(), 1);

    assert!(matches!(
        t.plan.set_route_carried_traffic(t.route, -1.0, 0.0),
        Err(NetPlanError::InvalidQuantity { .. })
    ));
}

#[test]
fn carried_traffic_below_precision_rounds_to_zero() {
    let mut t = line3();
    t.plan.set_route_carried_traffic(t.route, 1e-5, 1e-5).unwrap();
    assert_eq!(t.plan.route(t.route).unwrap().carried_traffic(), 0.0);
    assert_eq!(t.plan.link(t.l01).unwrap().carried_traffic_not_including_protection(), 0.0);
    assert!(t.plan.is_demand_blocked(t.demand).unwrap());
}

#[test]
fn reroute_onto_a_backup_segment_and_revert() {
    let mut t = line3();
    let detour_mid = t.plan.add_node("m", 1.5, 1.0, no_attrs()).unwrap();
    let a = t
        .plan
        .add_link(t.layer, t.nodes[1], detour_mid, 10.0, 50.0, 200_000.0, no_attrs())
        .unwrap();
    let b = t
        .plan
        .add_link(t.layer, detour_mid, t.nodes[2], 10.0, 50.0, 200_000.0, no_attrs())
        .unwrap();
    let seg = t.plan.add_protection_segment(vec![a, b], 5.0, no_attrs()).unwrap();
    t.plan.add_backup_segment_to_route(t.route, seg).unwrap();

    t.plan
        .set_route_path(t.route, vec![t.l01.into(), PathElement::Segment(seg)])
        .unwrap();
    assert_eq!(t.plan.link(t.l12).unwrap().carried_traffic_not_including_protection(), 0.0);
    assert!(approx(t.plan.segment(seg).unwrap().carried_traffic(), 5.0));
    assert!(approx(t.plan.link(a).unwrap().carried_traffic_including_protection(), 5.0));
    assert_eq!(
        t.plan.route_node_sequence(t.route).unwrap(),
        vec![t.nodes[0], t.nodes[1], detour_mid, t.nodes[2]]
    );
    assert_eq!(t.plan.route_real_links(t.route).unwrap(), vec![t.l01, a, b]);
    assert!(matches!(
        t.plan.remove_backup_segment_from_route(t.route, seg),
        Err(NetPlanError::InvalidArgument(_))
    ));

    t.plan.revert_route_to_initial_path(t.route).unwrap();
    assert_eq!(t.plan.route(t.route).unwrap().path(), &[t.l01.into(), t.l12.into()]);
    assert!(approx(t.plan.link(t.l12).unwrap().carried_traffic_not_including_protection(), 5.0));
    t.plan.remove_backup_segment_from_route(t.route, seg).unwrap();
    assert!(t.plan.segment(seg).unwrap().backup_of_routes().is_empty());
}

#[test]
fn revert_fails_when_initial_path_element_is_gone() {
    let mut t = line3();
    let l02 = t
        .plan
        .add_link(t.layer, t.nodes[0], t.nodes[2], 10.0, 1.0, 200_000.0, no_attrs())
        .unwrap();
    t.plan.set_route_path(t.route, vec![l02.into()]).unwrap();
    t.plan.remove_link(t.l12).unwrap();
    assert!(matches!(
        t.plan.revert_route_to_initial_path(t.route),
        Err(NetPlanError::RevertImpossible { .. })
    ));
    assert_eq!(t.plan.route(t.route).unwrap().path(), &[l02.into()]);
}

#[test]
fn route_length_delay_and_loops() {
    let mut t = line3();
    assert!(approx(t.plan.route_length_km(t.route).unwrap(), 200.0));
    assert!(approx(t.plan.route_propagation_delay_ms(t.route).unwrap(), 1.0));
    assert!(!t.plan.route_has_loops(t.route).unwrap());
    assert!(approx(t.plan.worst_case_propagation_delay_ms(t.demand).unwrap(), 1.0));

    let l10 = t
        .plan
        .add_link(t.layer, t.nodes[1], t.nodes[0], 10.0, 1.0, 200_000.0, no_attrs())
        .unwrap();
    let looped = t
        .plan
        .add_route(
            t.demand,
            0.0,
            0.0,
            vec![t.l01.into(), l10.into(), t.l01.into(), t.l12.into()],
            BTreeMap::new(),
            no_attrs(),
        )
        .unwrap();
    assert!(t.plan.route_has_loops(looped).unwrap());
    // 同一链路经过两次，缓存记录重数
    assert_eq!(t.plan.link(t.l01).unwrap().traversing_routes()[&looped], 2);
    t.plan.set_route_carried_traffic(looped, 1.0, 1.0).unwrap();
    assert!(approx(t.plan.link(t.l01).unwrap().carried_traffic_not_including_protection(), 7.0));
}

#[test]
fn shortest_paths_return_every_tie() {
    let mut t = line3();
    let l02 = t
        .plan
        .add_link(t.layer, t.nodes[0], t.nodes[2], 10.0, 1.0, 200_000.0, no_attrs())
        .unwrap();
    let mut hops = t.plan.compute_shortest_path_routes(t.demand, |_| 1.0).unwrap();
    assert_eq!(hops, vec![vec![l02]]);

    hops = t
        .plan
        .compute_shortest_path_routes(t.demand, |l| if l.link_id() == l02 { 2.0 } else { 1.0 })
        .unwrap();
    hops.sort();
    let mut expected = vec![vec![l02], vec![t.l01, t.l12]];
    expected.sort();
    assert_eq!(hops, expected);

    t.plan.set_link_failure_state(l02, false).unwrap();
    let hops = t.plan.compute_shortest_path_routes(t.demand, |_| 1.0).unwrap();
    assert_eq!(hops, vec![vec![t.l01, t.l12]]);
}

#[test]
fn demands_from_traffic_matrix_skip_diagonal_and_zeros() {
    let mut t = line3();
    let m = vec![vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 2.0], vec![3.0, 0.0, 0.0]];
    let ids = t.plan.add_demands_from_traffic_matrix(t.layer, &m).unwrap();
    assert_eq!(ids.len(), 3);
    assert_eq!(t.plan.demand_offered_traffic_vector(t.layer).unwrap(), vec![5.0, 1.0, 2.0, 3.0]);
    assert!(matches!(
        t.plan.add_demands_from_traffic_matrix(t.layer, &[vec![1.0]]),
        Err(NetPlanError::MatrixSize { .. })
    ));
}

#[test]
fn unicast_routing_information_can_be_wiped() {
    let mut t = line3();
    t.plan.add_protection_segment(vec![t.l12], 1.0, no_attrs()).unwrap();
    t.plan.remove_all_unicast_routing_information(t.layer).unwrap();
    assert_eq!(t.plan.routes_of(t.layer).unwrap().count(), 0);
    assert_eq!(t.plan.segments_of(t.layer).unwrap().count(), 0);
    assert_eq!(t.plan.demand(t.demand).unwrap().carried_traffic(), 0.0);
    assert_eq!(t.plan.link(t.l12).unwrap().reserved_capacity_for_protection(), 0.0);
    t.plan.check_caches_consistency().unwrap();
}

#[test]
fn attributes_live_on_any_element() {
    let mut t = line3();
    let el = NetworkElementId::Link(t.l01);
    t.plan.set_attribute(el, "vendor", "acme").unwrap();
    assert_eq!(t.plan.attribute(el, "vendor").unwrap(), Some("acme"));
    assert_eq!(t.plan.network_element(t.l01.0), Some(el));
    t.plan.remove_attribute(el, "vendor").unwrap();
    assert_eq!(t.plan.attribute(el, "vendor").unwrap(), None);
    // 路由的 id 不能当作链路 id 使用
    assert!(t.plan.set_attribute(NetworkElementId::Link(LinkId(t.route.0)), "x", "y").is_err());
}
