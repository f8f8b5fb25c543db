//! 路由类型
//!
//! 路由是一条多重图上的游走：同一链路/资源可以出现多次。
//! “若无故障”的承载流量与占用容量始终保留；只要路径上任何链路或节点 down，
//! 观测到的承载流量与占用容量都强制为 0。

use std::collections::{BTreeMap, BTreeSet};

use super::element::ElementMeta;
use super::id::{DemandId, LayerId, LinkId, PathElement, ResourceId, RouteId, SegmentId};

/// 显式路径路由
#[derive(Debug, Clone)]
pub struct Route {
    pub(crate) meta: ElementMeta,
    pub(crate) layer: LayerId,
    pub(crate) demand: DemandId,
    pub(crate) path: Vec<PathElement>,
    /// 创建时的路径，用于回退
    pub(crate) initial_path: Vec<PathElement>,
    pub(crate) carried_traffic_if_not_failing: f64,
    /// 每次经过链路时占用的容量
    pub(crate) occupied_capacity_if_not_failing: f64,
    /// 每次经过资源时占用的资源容量
    pub(crate) resource_occupation_if_not_failing: BTreeMap<ResourceId, f64>,
    /// 可替换进路径的备份保护段
    pub(crate) backup_segments: BTreeSet<SegmentId>,
    pub(crate) is_down: bool,
}

impl Route {
    pub fn route_id(&self) -> RouteId {
        RouteId(self.meta.id)
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn demand(&self) -> DemandId {
        self.demand
    }

    pub fn path(&self) -> &[PathElement] {
        &self.path
    }

    pub fn initial_path(&self) -> &[PathElement] {
        &self.initial_path
    }

    /// 路径中直接出现的链路（不展开保护段）
    pub fn direct_links(&self) -> impl Iterator<Item = LinkId> + '_ {
        self.path.iter().filter_map(|e| match e {
            PathElement::Link(l) => Some(*l),
            _ => None,
        })
    }

    pub fn segments(&self) -> impl Iterator<Item = SegmentId> + '_ {
        self.path.iter().filter_map(|e| match e {
            PathElement::Segment(s) => Some(*s),
            _ => None,
        })
    }

    pub fn resources(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.path.iter().filter_map(|e| match e {
            PathElement::Resource(r) => Some(*r),
            _ => None,
        })
    }

    pub fn carried_traffic_if_not_failing(&self) -> f64 {
        self.carried_traffic_if_not_failing
    }

    pub fn occupied_capacity_if_not_failing(&self) -> f64 {
        self.occupied_capacity_if_not_failing
    }

    pub fn resource_occupation_if_not_failing(&self) -> &BTreeMap<ResourceId, f64> {
        &self.resource_occupation_if_not_failing
    }

    /// 观测到的承载流量（down 时为 0）
    pub fn carried_traffic(&self) -> f64 {
        if self.is_down {
            0.0
        } else {
            self.carried_traffic_if_not_failing
        }
    }

    pub fn occupied_capacity(&self) -> f64 {
        if self.is_down {
            0.0
        } else {
            self.occupied_capacity_if_not_failing
        }
    }

    pub fn resource_occupation(&self, resource: ResourceId) -> f64 {
        if self.is_down {
            return 0.0;
        }
        self.resource_occupation_if_not_failing
            .get(&resource)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn backup_segments(&self) -> &BTreeSet<SegmentId> {
        &self.backup_segments
    }

    pub fn is_down(&self) -> bool {
        self.is_down
    }

    pub fn is_up(&self) -> bool {
        !self.is_down
    }
}
