//! 业务需求类型
//!
//! 需求的承载流量是派生量：源路由模式下为各路由承载流量之和，
//! 逐跳模式下由转发规则矩阵求解得到。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::element::ElementMeta;
use super::id::{DemandId, LayerId, LinkId, NodeId, RouteId};

/// 路由环路分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingCycleType {
    Loopless,
    /// 存在环路，但流量最终会离开环路
    OpenCycles,
    /// 存在流量无法离开的闭合环路
    ClosedCycles,
}

/// 单播业务需求
#[derive(Debug, Clone)]
pub struct Demand {
    pub(crate) meta: ElementMeta,
    pub(crate) layer: LayerId,
    pub(crate) ingress: NodeId,
    pub(crate) egress: NodeId,
    pub(crate) offered_traffic: f64,
    pub(crate) carried_traffic: f64,
    pub(crate) routing_cycle_type: RoutingCycleType,
    /// 上层耦合链路
    pub(crate) coupled_link: Option<LinkId>,
    /// 业务链必须依次经过的资源类型
    pub(crate) resource_type_sequence: Vec<String>,
    pub(crate) routes: BTreeSet<RouteId>,
    /// 逐跳模式下的 x_de
    pub(crate) hop_by_hop_traffic: BTreeMap<LinkId, f64>,
}

impl Demand {
    pub(crate) fn new(
        meta: ElementMeta,
        layer: LayerId,
        ingress: NodeId,
        egress: NodeId,
        offered_traffic: f64,
    ) -> Self {
        Self {
            meta,
            layer,
            ingress,
            egress,
            offered_traffic,
            carried_traffic: 0.0,
            routing_cycle_type: RoutingCycleType::Loopless,
            coupled_link: None,
            resource_type_sequence: Vec::new(),
            routes: BTreeSet::new(),
            hop_by_hop_traffic: BTreeMap::new(),
        }
    }

    pub fn demand_id(&self) -> DemandId {
        DemandId(self.meta.id)
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn ingress(&self) -> NodeId {
        self.ingress
    }

    pub fn egress(&self) -> NodeId {
        self.egress
    }

    pub fn offered_traffic(&self) -> f64 {
        self.offered_traffic
    }

    pub fn carried_traffic(&self) -> f64 {
        self.carried_traffic
    }

    /// 被阻塞的流量（不小于 0）
    pub fn blocked_traffic(&self) -> f64 {
        (self.offered_traffic - self.carried_traffic).max(0.0)
    }

    pub fn is_blocked(&self, precision_factor: f64) -> bool {
        self.carried_traffic < self.offered_traffic - precision_factor
    }

    pub fn routing_cycle_type(&self) -> RoutingCycleType {
        self.routing_cycle_type
    }

    pub fn coupled_link(&self) -> Option<LinkId> {
        self.coupled_link
    }

    pub fn is_coupled(&self) -> bool {
        self.coupled_link.is_some()
    }

    pub fn resource_type_sequence(&self) -> &[String] {
        &self.resource_type_sequence
    }

    pub fn is_service_chain_request(&self) -> bool {
        !self.resource_type_sequence.is_empty()
    }

    pub fn routes(&self) -> &BTreeSet<RouteId> {
        &self.routes
    }

    pub fn hop_by_hop_traffic(&self) -> &BTreeMap<LinkId, f64> {
        &self.hop_by_hop_traffic
    }
}
