use std::collections::BTreeMap;

use crate::config::PlanConfig;
use crate::net::{DemandId, LayerId, LinkId, NetPlan, NodeId, PathElement, RouteId};

mod coupling;
mod failure;
mod invariants;
mod io_document;
mod routing_conversion;
mod scenarios;
mod source_routing;
mod srg_resources;

pub(crate) fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

pub(crate) fn plan() -> NetPlan {
    NetPlan::new(PlanConfig {
        precision_factor: 1e-3,
        check_consistency: true,
    })
}

pub(crate) fn no_attrs() -> BTreeMap<String, String> {
    BTreeMap::new()
}

/// n0 -> n1 -> n2，两条容量 10 的链路，一条 n0 -> n2 需求（offered 5），一条路由承载 5
pub(crate) struct Line3 {
    pub plan: NetPlan,
    pub layer: LayerId,
    pub nodes: [NodeId; 3],
    pub l01: LinkId,
    pub l12: LinkId,
    pub demand: DemandId,
    pub route: RouteId,
}

pub(crate) fn line3() -> Line3 {
    let mut plan = plan();
    let layer = plan.default_layer();
    let n0 = plan.add_node("n0", 0.0, 0.0, no_attrs()).unwrap();
    let n1 = plan.add_node("n1", 1.0, 0.0, no_attrs()).unwrap();
    let n2 = plan.add_node("n2", 2.0, 0.0, no_attrs()).unwrap();
    let l01 = plan.add_link(layer, n0, n1, 10.0, 100.0, 200_000.0, no_attrs()).unwrap();
    let l12 = plan.add_link(layer, n1, n2, 10.0, 100.0, 200_000.0, no_attrs()).unwrap();
    let demand = plan.add_demand(layer, n0, n2, 5.0, no_attrs()).unwrap();
    let route = plan
        .add_route(
            demand,
            5.0,
            5.0,
            vec![PathElement::Link(l01), PathElement::Link(l12)],
            BTreeMap::new(),
            no_attrs(),
        )
        .unwrap();
    Line3 {
        plan,
        layer,
        nodes: [n0, n1, n2],
        l01,
        l12,
        demand,
        route,
    }
}
