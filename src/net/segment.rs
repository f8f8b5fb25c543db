//! 保护段类型
//!
//! 保护段是同一层内的一段连续链路，预留一定容量；
//! 路由可以把它作为路径元素替换进自己的路径。

use std::collections::{BTreeMap, BTreeSet};

use super::element::ElementMeta;
use super::id::{LayerId, LinkId, NodeId, RouteId, SegmentId};

#[derive(Debug, Clone)]
pub struct ProtectionSegment {
    pub(crate) meta: ElementMeta,
    pub(crate) layer: LayerId,
    pub(crate) links: Vec<LinkId>,
    pub(crate) origin: NodeId,
    pub(crate) destination: NodeId,
    pub(crate) reserved_capacity: f64,
    /// 把本段登记为备份的路由
    pub(crate) backup_of_routes: BTreeSet<RouteId>,
    /// 当前路径中经过本段的路由 -> 次数
    pub(crate) traversing_routes: BTreeMap<RouteId, usize>,
    pub(crate) carried_traffic: f64,
    pub(crate) is_down: bool,
}

impl ProtectionSegment {
    pub fn segment_id(&self) -> SegmentId {
        SegmentId(self.meta.id)
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    pub fn origin(&self) -> NodeId {
        self.origin
    }

    pub fn destination(&self) -> NodeId {
        self.destination
    }

    pub fn reserved_capacity_if_not_failing(&self) -> f64 {
        self.reserved_capacity
    }

    /// down 时预留容量不计入链路占用
    pub fn reserved_capacity(&self) -> f64 {
        if self.is_down { 0.0 } else { self.reserved_capacity }
    }

    pub fn backup_of_routes(&self) -> &BTreeSet<RouteId> {
        &self.backup_of_routes
    }

    pub fn traversing_routes(&self) -> &BTreeMap<RouteId, usize> {
        &self.traversing_routes
    }

    pub fn carried_traffic(&self) -> f64 {
        self.carried_traffic
    }

    pub fn is_down(&self) -> bool {
        self.is_down
    }
}
