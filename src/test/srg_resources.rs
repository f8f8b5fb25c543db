use std::collections::BTreeMap;

use super::{approx, line3, no_attrs, plan};
use crate::net::{NetPlanError, NetworkElement, PathElement};

#[test]
fn srg_failure_takes_down_all_members() {
    let mut t = line3();
    let srg = t.plan.add_srg(1000.0, 10.0, no_attrs()).unwrap();
    t.plan.add_link_to_srg(srg, t.l12).unwrap();
    t.plan.add_node_to_srg(srg, t.nodes[0]).unwrap();
    assert!(approx(t.plan.srg_availability(srg).unwrap(), 1000.0 / 1010.0));
    assert!(t.plan.link(t.l12).unwrap().srgs().contains(&srg));

    t.plan.set_srg_failure_state(srg, false).unwrap();
    assert!(t.plan.link(t.l12).unwrap().is_down());
    assert!(t.plan.node(t.nodes[0]).unwrap().is_down());
    assert!(t.plan.route(t.route).unwrap().is_down());

    t.plan.set_srg_failure_state(srg, true).unwrap();
    assert!(t.plan.route(t.route).unwrap().is_up());
}

#[test]
fn removing_members_and_groups_keeps_both_sides_in_sync() {
    let mut t = line3();
    let s1 = t.plan.add_srg(1.0, 1.0, no_attrs()).unwrap();
    let s2 = t.plan.add_srg(1.0, 1.0, no_attrs()).unwrap();
    t.plan.add_link_to_srg(s1, t.l01).unwrap();
    t.plan.add_link_to_srg(s2, t.l01).unwrap();
    t.plan.add_node_to_srg(s2, t.nodes[1]).unwrap();

    t.plan.remove_link_from_srg(s1, t.l01).unwrap();
    assert!(!t.plan.link(t.l01).unwrap().srgs().contains(&s1));

    t.plan.remove_srg(s1).unwrap();
    assert_eq!(t.plan.srg(s2).unwrap().index(), 0);
    assert_eq!(t.plan.srg_ids(), &[s2]);

    t.plan.remove_node(t.nodes[1]).unwrap();
    assert!(t.plan.srg(s2).unwrap().nodes().is_empty());
    // l01 与 n1 相连，随节点一起删除
    assert!(t.plan.srg(s2).unwrap().links().is_empty());
    t.plan.set_srg_mean_times(s2, 50.0, 0.0).unwrap();
    assert_eq!(t.plan.srg_availability(s2).unwrap(), 1.0);
    t.plan.check_caches_consistency().unwrap();
}

#[test]
fn service_chain_routes_occupy_resources() {
    let mut p = plan();
    let layer = p.default_layer();
    let a = p.add_node("a", 0.0, 0.0, no_attrs()).unwrap();
    let b = p.add_node("b", 1.0, 0.0, no_attrs()).unwrap();
    let c = p.add_node("c", 2.0, 0.0, no_attrs()).unwrap();
    let ab = p.add_link(layer, a, b, 10.0, 1.0, 200_000.0, no_attrs()).unwrap();
    let bc = p.add_link(layer, b, c, 10.0, 1.0, 200_000.0, no_attrs()).unwrap();
    let fw = p.add_resource("firewall", "fw-b", b, 4.0, "cpu", no_attrs()).unwrap();
    let nat = p.add_resource("nat", "nat-c", c, 4.0, "cpu", no_attrs()).unwrap();
    assert_eq!(p.resources_of_type(b, "firewall").unwrap(), vec![fw]);

    let d = p.add_demand(layer, a, c, 3.0, no_attrs()).unwrap();
    p.set_service_chain_sequence_of_resource_types(d, vec!["firewall".into(), "nat".into()])
        .unwrap();
    let chains = p.compute_minimum_cost_service_chains(d, |_| 1.0, |_| 0.0).unwrap();
    let expected = vec![
        PathElement::Link(ab),
        PathElement::Resource(fw),
        PathElement::Link(bc),
        PathElement::Resource(nat),
    ];
    assert_eq!(chains, vec![expected.clone()]);

    // 缺少 nat 的路径不满足业务链
    assert!(matches!(
        p.add_route(d, 3.0, 3.0, vec![ab.into(), fw.into(), bc.into()], BTreeMap::new(), no_attrs()),
        Err(NetPlanError::InvalidPath(_))
    ));

    let r = p
        .add_route(d, 3.0, 3.0, expected, BTreeMap::from([(fw, 2.0), (nat, 5.0)]), no_attrs())
        .unwrap();
    assert!(approx(p.resource(fw).unwrap().occupied_capacity(), 2.0));
    assert!(approx(p.resource(nat).unwrap().utilization(), 1.25));
    assert_eq!(p.route(r).unwrap().resource_occupation(fw), 2.0);

    p.set_node_failure_state(b, false).unwrap();
    assert_eq!(p.resource(fw).unwrap().occupied_capacity(), 0.0);
    p.set_node_failure_state(b, true).unwrap();

    p.set_route_resource_occupation(r, BTreeMap::from([(fw, 1.0)])).unwrap();
    assert_eq!(p.resource(nat).unwrap().occupied_capacity(), 0.0);

    p.remove_resource(fw).unwrap();
    assert!(p.route(r).is_err());
    assert_eq!(p.demand(d).unwrap().carried_traffic(), 0.0);
    p.check_caches_consistency().unwrap();
}

#[test]
fn service_chain_sequence_rejects_empty_resource_types() {
    let mut t = line3();
    let d = t.plan.add_demand(t.layer, t.nodes[0], t.nodes[2], 1.0, no_attrs()).unwrap();
    assert!(matches!(
        t.plan.set_service_chain_sequence_of_resource_types(d, vec!["firewall".into(), String::new()]),
        Err(NetPlanError::InvalidArgument(_))
    ));
    assert!(!t.plan.demand(d).unwrap().is_service_chain_request());

    t.plan
        .set_service_chain_sequence_of_resource_types(d, vec!["firewall".into()])
        .unwrap();
    assert_eq!(t.plan.demand(d).unwrap().resource_type_sequence(), ["firewall".to_string()]);
    t.plan.check_caches_consistency().unwrap();
}
