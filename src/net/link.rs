//! 链路类型
//!
//! 单向链路，属于唯一一个层。链路上的流量、占用容量均为缓存值，
//! 由 `NetPlan` 在每次修改后根据经过的路由/保护段/逐跳流量重新汇总。

use std::collections::{BTreeMap, BTreeSet};

use super::element::ElementMeta;
use super::id::{DemandId, LayerId, LinkId, NodeId, RouteId, SegmentId, SrgId};

/// 网络链路
#[derive(Debug, Clone)]
pub struct Link {
    pub(crate) meta: ElementMeta,
    pub(crate) layer: LayerId,
    pub(crate) origin: NodeId,
    pub(crate) destination: NodeId,
    pub(crate) capacity: f64,
    pub(crate) length_km: f64,
    pub(crate) propagation_speed_km_per_s: f64,
    pub(crate) is_up: bool,
    /// 下层耦合需求：存在时容量等于该需求的承载流量
    pub(crate) coupled_demand: Option<DemandId>,
    /// 直接经过本链路的路由 -> 经过次数
    pub(crate) traversing_routes: BTreeMap<RouteId, usize>,
    /// 经过本链路的保护段 -> 经过次数
    pub(crate) traversing_segments: BTreeMap<SegmentId, usize>,
    pub(crate) srgs: BTreeSet<SrgId>,
    /// 逐跳路由模式下各需求在本链路上的流量 x_de
    pub(crate) hop_by_hop_traffic: BTreeMap<DemandId, f64>,
    pub(crate) carried_traffic: f64,
    pub(crate) occupied_capacity: f64,
    /// 经由保护段承载的流量
    pub(crate) carried_traffic_in_segments: f64,
    /// 保护段预留的容量
    pub(crate) reserved_for_protection: f64,
}

impl Link {
    pub(crate) fn new(
        meta: ElementMeta,
        layer: LayerId,
        origin: NodeId,
        destination: NodeId,
        capacity: f64,
        length_km: f64,
        propagation_speed_km_per_s: f64,
    ) -> Self {
        Self {
            meta,
            layer,
            origin,
            destination,
            capacity,
            length_km,
            propagation_speed_km_per_s,
            is_up: true,
            coupled_demand: None,
            traversing_routes: BTreeMap::new(),
            traversing_segments: BTreeMap::new(),
            srgs: BTreeSet::new(),
            hop_by_hop_traffic: BTreeMap::new(),
            carried_traffic: 0.0,
            occupied_capacity: 0.0,
            carried_traffic_in_segments: 0.0,
            reserved_for_protection: 0.0,
        }
    }

    pub fn link_id(&self) -> LinkId {
        LinkId(self.meta.id)
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn origin(&self) -> NodeId {
        self.origin
    }

    pub fn destination(&self) -> NodeId {
        self.destination
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn length_km(&self) -> f64 {
        self.length_km
    }

    pub fn propagation_speed_km_per_s(&self) -> f64 {
        self.propagation_speed_km_per_s
    }

    /// 传播时延（毫秒）
    pub fn propagation_delay_ms(&self) -> f64 {
        if self.propagation_speed_km_per_s == f64::INFINITY {
            return 0.0;
        }
        if self.propagation_speed_km_per_s <= 0.0 {
            return f64::INFINITY;
        }
        1000.0 * self.length_km / self.propagation_speed_km_per_s
    }

    /// 链路自身的 up 标志（不考虑端点节点）
    pub fn is_up(&self) -> bool {
        self.is_up
    }

    pub fn is_down(&self) -> bool {
        !self.is_up
    }

    pub fn coupled_demand(&self) -> Option<DemandId> {
        self.coupled_demand
    }

    pub fn is_coupled(&self) -> bool {
        self.coupled_demand.is_some()
    }

    pub fn traversing_routes(&self) -> &BTreeMap<RouteId, usize> {
        &self.traversing_routes
    }

    pub fn traversing_segments(&self) -> &BTreeMap<SegmentId, usize> {
        &self.traversing_segments
    }

    pub fn srgs(&self) -> &BTreeSet<SrgId> {
        &self.srgs
    }

    pub fn hop_by_hop_traffic(&self) -> &BTreeMap<DemandId, f64> {
        &self.hop_by_hop_traffic
    }

    /// 不含保护段的承载流量
    pub fn carried_traffic_not_including_protection(&self) -> f64 {
        self.carried_traffic
    }

    /// 含经由保护段承载的流量
    pub fn carried_traffic_including_protection(&self) -> f64 {
        self.carried_traffic + self.carried_traffic_in_segments
    }

    pub fn occupied_capacity_not_including_protection(&self) -> f64 {
        self.occupied_capacity
    }

    /// 路由直接占用的容量加上保护段预留的容量
    pub fn occupied_capacity_including_protection(&self) -> f64 {
        self.occupied_capacity + self.reserved_for_protection
    }

    pub fn reserved_capacity_for_protection(&self) -> f64 {
        self.reserved_for_protection
    }

    pub fn utilization_not_including_protection(&self) -> f64 {
        ratio(self.occupied_capacity_not_including_protection(), self.capacity)
    }

    pub fn utilization_including_protection(&self) -> f64 {
        ratio(self.occupied_capacity_including_protection(), self.capacity)
    }

    /// 占用超过容量（含容差）
    pub fn is_oversubscribed(&self, precision_factor: f64) -> bool {
        self.occupied_capacity_including_protection() > self.capacity + precision_factor
    }
}

fn ratio(occupied: f64, capacity: f64) -> f64 {
    if capacity == 0.0 {
        if occupied == 0.0 { 0.0 } else { f64::INFINITY }
    } else {
        occupied / capacity
    }
}
