use std::collections::BTreeMap;

use super::{approx, line3, no_attrs};
use crate::net::PathElement;

#[test]
fn node_failure_takes_down_routes_through_it_and_restores_exactly() {
    let mut t = line3();
    let before = t.plan.to_document();
    t.plan.set_node_failure_state(t.nodes[1], false).unwrap();
    {
        let p = &t.plan;
        assert!(p.route(t.route).unwrap().is_down());
        assert_eq!(p.route(t.route).unwrap().carried_traffic(), 0.0);
        assert_eq!(p.route(t.route).unwrap().occupied_capacity(), 0.0);
        assert_eq!(p.route(t.route).unwrap().carried_traffic_if_not_failing(), 5.0);
        assert!(p.nodes_down().contains(&t.nodes[1]));
        // 链路本身仍为 up，只是不可用
        assert!(p.link(t.l01).unwrap().is_up());
        assert_eq!(p.link(t.l01).unwrap().carried_traffic_not_including_protection(), 0.0);
    }
    t.plan.set_all_links_and_nodes_up().unwrap();
    assert_eq!(t.plan.to_document(), before);
}

#[test]
fn failing_an_unrelated_link_leaves_the_route_alone() {
    let mut t = line3();
    let spare = t
        .plan
        .add_link(t.layer, t.nodes[2], t.nodes[0], 10.0, 1.0, 200_000.0, no_attrs())
        .unwrap();
    t.plan.set_link_failure_state(spare, false).unwrap();
    assert!(t.plan.route(t.route).unwrap().is_up());
    assert_eq!(t.plan.links_down(t.layer).unwrap().len(), 1);
    assert!(approx(t.plan.demand(t.demand).unwrap().carried_traffic(), 5.0));
}

#[test]
fn batch_failure_and_repair_in_one_call() {
    let mut t = line3();
    t.plan
        .set_links_and_nodes_failure_state(&[], &[t.l01, t.l12], &[], &[t.nodes[2]])
        .unwrap();
    assert_eq!(t.plan.links_down(t.layer).unwrap().len(), 2);
    assert!(t.plan.route(t.route).unwrap().is_down());

    // 只修复 l01，l12 与 n2 仍然 down
    t.plan
        .set_links_and_nodes_failure_state(&[t.l01], &[], &[], &[])
        .unwrap();
    assert!(t.plan.route(t.route).unwrap().is_down());

    t.plan
        .set_links_and_nodes_failure_state(&[t.l12], &[], &[t.nodes[2]], &[])
        .unwrap();
    assert!(t.plan.route(t.route).unwrap().is_up());
    assert!(approx(t.plan.link(t.l12).unwrap().carried_traffic_not_including_protection(), 5.0));
}

#[test]
fn segment_carries_traffic_only_while_up() {
    let mut t = line3();
    let seg = t
        .plan
        .add_protection_segment(vec![t.l12], 3.0, no_attrs())
        .unwrap();
    let r2 = t
        .plan
        .add_route(
            t.demand,
            2.0,
            2.0,
            vec![PathElement::Link(t.l01), PathElement::Segment(seg)],
            BTreeMap::new(),
            no_attrs(),
        )
        .unwrap();
    {
        let p = &t.plan;
        let l12 = p.link(t.l12).unwrap();
        assert!(approx(l12.reserved_capacity_for_protection(), 3.0));
        assert!(approx(l12.carried_traffic_not_including_protection(), 5.0));
        assert!(approx(l12.carried_traffic_including_protection(), 7.0));
        assert!(approx(p.segment(seg).unwrap().carried_traffic(), 2.0));
        assert!(approx(p.demand(t.demand).unwrap().carried_traffic(), 7.0));
    }

    t.plan.set_link_failure_state(t.l12, false).unwrap();
    let p = &t.plan;
    assert!(p.segment(seg).unwrap().is_down());
    assert_eq!(p.segment(seg).unwrap().reserved_capacity(), 0.0);
    assert!(p.route(r2).unwrap().is_down());
    assert_eq!(p.demand(t.demand).unwrap().carried_traffic(), 0.0);
    p.check_caches_consistency().unwrap();
}
