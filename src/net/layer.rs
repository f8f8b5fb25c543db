//! 网络层
//!
//! 一个层是链路/需求/路由/保护段的命名空间，并持有本层的路由模式：
//! 源路由（显式路由对象）或逐跳路由（需求×链路的分流比例矩阵 f_de）。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::element::ElementMeta;
use super::id::{DemandId, LayerId, LinkId, RouteId, SegmentId};

/// 路由模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingType {
    SourceRouting,
    HopByHopRouting,
}

#[derive(Debug, Clone)]
pub struct Layer {
    pub(crate) meta: ElementMeta,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) demand_traffic_units: String,
    pub(crate) link_capacity_units: String,
    pub(crate) routing_type: RoutingType,
    pub(crate) links: Vec<LinkId>,
    pub(crate) demands: Vec<DemandId>,
    pub(crate) routes: Vec<RouteId>,
    pub(crate) segments: Vec<SegmentId>,
    /// 稀疏转发规则 (demand, link) -> 比例
    pub(crate) forwarding_rules: BTreeMap<(DemandId, LinkId), f64>,
    pub(crate) links_down: BTreeSet<LinkId>,
}

impl Layer {
    pub(crate) fn new(
        meta: ElementMeta,
        name: String,
        description: String,
        demand_traffic_units: String,
        link_capacity_units: String,
    ) -> Self {
        Self {
            meta,
            name,
            description,
            demand_traffic_units,
            link_capacity_units,
            routing_type: RoutingType::SourceRouting,
            links: Vec::new(),
            demands: Vec::new(),
            routes: Vec::new(),
            segments: Vec::new(),
            forwarding_rules: BTreeMap::new(),
            links_down: BTreeSet::new(),
        }
    }

    pub fn layer_id(&self) -> LayerId {
        LayerId(self.meta.id)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn demand_traffic_units(&self) -> &str {
        &self.demand_traffic_units
    }

    pub fn link_capacity_units(&self) -> &str {
        &self.link_capacity_units
    }

    pub fn routing_type(&self) -> RoutingType {
        self.routing_type
    }

    pub fn is_source_routing(&self) -> bool {
        self.routing_type == RoutingType::SourceRouting
    }

    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    pub fn demands(&self) -> &[DemandId] {
        &self.demands
    }

    pub fn routes(&self) -> &[RouteId] {
        &self.routes
    }

    pub fn segments(&self) -> &[SegmentId] {
        &self.segments
    }

    pub fn forwarding_rules(&self) -> &BTreeMap<(DemandId, LinkId), f64> {
        &self.forwarding_rules
    }

    pub fn forwarding_rule(&self, demand: DemandId, link: LinkId) -> f64 {
        self.forwarding_rules
            .get(&(demand, link))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn links_down(&self) -> &BTreeSet<LinkId> {
        &self.links_down
    }
}
