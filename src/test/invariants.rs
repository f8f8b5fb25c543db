use std::collections::BTreeMap;

use proptest::prelude::*;

use super::{no_attrs, plan};
use crate::net::{NetPlan, NetworkElement, PathElement};

#[derive(Debug, Clone)]
enum Op {
    AddNode,
    AddLink(usize, usize),
    AddDemand(usize, usize),
    AddRoute(usize),
    RemoveNode(usize),
    RemoveLink(usize),
    RemoveDemand(usize),
    RemoveRoute(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => Just(Op::AddNode),
        3 => (0usize..8, 0usize..8).prop_map(|(a, b)| Op::AddLink(a, b)),
        2 => (0usize..8, 0usize..8).prop_map(|(a, b)| Op::AddDemand(a, b)),
        3 => (0usize..16).prop_map(Op::AddRoute),
        1 => (0usize..8).prop_map(Op::RemoveNode),
        1 => (0usize..16).prop_map(Op::RemoveLink),
        1 => (0usize..16).prop_map(Op::RemoveDemand),
        1 => (0usize..16).prop_map(Op::RemoveRoute),
    ]
}

/// 非法参数（自环、越界）返回错误是预期行为，只要状态保持一致即可
fn apply(p: &mut NetPlan, op: &Op) {
    let layer = p.default_layer();
    let nodes = p.node_ids().to_vec();
    let links = p.layer(layer).unwrap().links.clone();
    let demands = p.layer(layer).unwrap().demands.clone();
    let routes = p.layer(layer).unwrap().routes.clone();
    match *op {
        Op::AddNode => {
            let i = nodes.len();
            p.add_node(&format!("n{i}"), i as f64, 0.0, no_attrs()).unwrap();
        }
        Op::AddLink(a, b) if a < nodes.len() && b < nodes.len() => {
            let _ = p.add_link(layer, nodes[a], nodes[b], 10.0, 1.0, 200_000.0, no_attrs());
        }
        Op::AddDemand(a, b) if a < nodes.len() && b < nodes.len() => {
            let _ = p.add_demand(layer, nodes[a], nodes[b], 1.0, no_attrs());
        }
        Op::AddRoute(i) if !demands.is_empty() => {
            let d = p.demand(demands[i % demands.len()]).unwrap();
            let (ingress, egress, id) = (d.ingress(), d.egress(), d.demand_id());
            if let Some(l) = links.iter().find(|l| {
                let l = p.link(**l).unwrap();
                l.origin() == ingress && l.destination() == egress
            }) {
                p.add_route(id, 1.0, 1.0, vec![PathElement::Link(*l)], BTreeMap::new(), no_attrs())
                    .unwrap();
            }
        }
        Op::RemoveNode(i) if i < nodes.len() => {
            p.remove_node(nodes[i]).unwrap();
        }
        Op::RemoveLink(i) if i < links.len() => {
            p.remove_link(links[i]).unwrap();
        }
        Op::RemoveDemand(i) if i < demands.len() => {
            p.remove_demand(demands[i]).unwrap();
        }
        Op::RemoveRoute(i) if i < routes.len() => {
            p.remove_route(routes[i]).unwrap();
        }
        _ => {}
    }
}

fn assert_dense_indices(p: &NetPlan) {
    for (i, n) in p.nodes().enumerate() {
        assert_eq!(n.index(), i, "node {} index", n.node_id());
    }
    for layer in p.layers() {
        let id = layer.layer_id();
        for (i, l) in p.links_of(id).unwrap().enumerate() {
            assert_eq!(l.index(), i);
        }
        for (i, d) in p.demands_of(id).unwrap().enumerate() {
            assert_eq!(d.index(), i);
        }
        for (i, r) in p.routes_of(id).unwrap().enumerate() {
            assert_eq!(r.index(), i);
        }
    }
}

fn assert_link_route_symmetry(p: &NetPlan) {
    let layer = p.default_layer();
    for link in p.links_of(layer).unwrap() {
        for (r, count) in link.traversing_routes() {
            let route = p.route(*r).unwrap();
            let seen = route.direct_links().filter(|l| *l == link.link_id()).count();
            assert_eq!(seen, *count);
        }
    }
    for route in p.routes_of(layer).unwrap() {
        for l in route.direct_links() {
            assert!(p.link(l).unwrap().traversing_routes().contains_key(&route.route_id()));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_edits_keep_indices_dense_and_caches_symmetric(ops in prop::collection::vec(op(), 1..40)) {
        let mut p = plan();
        for _ in 0..3 {
            apply(&mut p, &Op::AddNode);
        }
        for op in &ops {
            apply(&mut p, op);
            assert_dense_indices(&p);
            assert_link_route_symmetry(&p);
        }
        prop_assert!(p.check_caches_consistency().is_ok());
    }
}

#[test]
fn removing_a_middle_link_shifts_later_indices() {
    let mut t = super::line3();
    let l20 = t
        .plan
        .add_link(t.layer, t.nodes[2], t.nodes[0], 1.0, 1.0, 200_000.0, no_attrs())
        .unwrap();
    assert_eq!(t.plan.link(l20).unwrap().index(), 2);
    t.plan.remove_link(t.l01).unwrap();
    assert_eq!(t.plan.link(t.l12).unwrap().index(), 0);
    assert_eq!(t.plan.link(l20).unwrap().index(), 1);
    // 经过被删链路的路由随之删除
    assert!(t.plan.route(t.route).is_err());
    assert_eq!(t.plan.demand(t.demand).unwrap().carried_traffic(), 0.0);
}

#[test]
fn copy_is_independent_and_identical() {
    let t = super::line3();
    let mut copy = t.plan.copy();
    copy.check_caches_consistency().unwrap();
    assert_eq!(copy.to_document(), t.plan.to_document());

    copy.set_offered_traffic(t.demand, 9.0).unwrap();
    copy.remove_route(t.route).unwrap();
    copy.set_link_failure_state(t.l12, false).unwrap();

    assert_eq!(t.plan.demand(t.demand).unwrap().offered_traffic(), 5.0);
    assert!(t.plan.route(t.route).is_ok());
    assert!(t.plan.link(t.l12).unwrap().is_up());
    assert_eq!(t.plan.link(t.l01).unwrap().carried_traffic_not_including_protection(), 5.0);
}

#[test]
fn removed_ids_are_never_reused() {
    let mut t = super::line3();
    let old = t.l12;
    t.plan.remove_link(old).unwrap();
    let fresh = t
        .plan
        .add_link(t.layer, t.nodes[1], t.nodes[2], 1.0, 1.0, 200_000.0, no_attrs())
        .unwrap();
    assert!(fresh.0 > old.0);
    assert!(t.plan.link(old).is_err());
    assert!(t.plan.network_element(old.0).is_none());
}

#[test]
fn unmodifiable_plan_rejects_edits_but_allows_reads() {
    let mut t = super::line3();
    t.plan.set_modifiable(false);
    assert!(matches!(
        t.plan.set_offered_traffic(t.demand, 1.0),
        Err(crate::net::NetPlanError::NotModifiable)
    ));
    assert!(t.plan.add_node("x", 0.0, 0.0, no_attrs()).is_err());
    assert!(t.plan.set_link_failure_state(t.l01, false).is_err());
    assert_eq!(t.plan.demand(t.demand).unwrap().offered_traffic(), 5.0);
    t.plan.set_modifiable(true);
    t.plan.set_offered_traffic(t.demand, 1.0).unwrap();
}
