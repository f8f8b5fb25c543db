//! 节点类型
//!
//! 节点在所有层之间共享，不拥有链路，只缓存与之相关的各类元素。

use std::collections::BTreeSet;

use super::element::ElementMeta;
use super::id::{DemandId, LinkId, NodeId, ResourceId, RouteId, SegmentId, SrgId};

/// 网络节点
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) meta: ElementMeta,
    pub(crate) name: String,
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) is_up: bool,
    pub(crate) outgoing_links: BTreeSet<LinkId>,
    pub(crate) incoming_links: BTreeSet<LinkId>,
    pub(crate) outgoing_demands: BTreeSet<DemandId>,
    pub(crate) incoming_demands: BTreeSet<DemandId>,
    /// 节点序列中经过本节点的路由
    pub(crate) associated_routes: BTreeSet<RouteId>,
    pub(crate) associated_segments: BTreeSet<SegmentId>,
    pub(crate) srgs: BTreeSet<SrgId>,
    pub(crate) resources: BTreeSet<ResourceId>,
}

impl Node {
    pub(crate) fn new(meta: ElementMeta, name: String, x: f64, y: f64) -> Self {
        Self {
            meta,
            name,
            x,
            y,
            is_up: true,
            outgoing_links: BTreeSet::new(),
            incoming_links: BTreeSet::new(),
            outgoing_demands: BTreeSet::new(),
            incoming_demands: BTreeSet::new(),
            associated_routes: BTreeSet::new(),
            associated_segments: BTreeSet::new(),
            srgs: BTreeSet::new(),
            resources: BTreeSet::new(),
        }
    }

    pub fn node_id(&self) -> NodeId {
        NodeId(self.meta.id)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    pub fn is_up(&self) -> bool {
        self.is_up
    }

    pub fn is_down(&self) -> bool {
        !self.is_up
    }

    /// 所有层的出链路
    pub fn outgoing_links(&self) -> &BTreeSet<LinkId> {
        &self.outgoing_links
    }

    pub fn incoming_links(&self) -> &BTreeSet<LinkId> {
        &self.incoming_links
    }

    pub fn outgoing_demands(&self) -> &BTreeSet<DemandId> {
        &self.outgoing_demands
    }

    pub fn incoming_demands(&self) -> &BTreeSet<DemandId> {
        &self.incoming_demands
    }

    pub fn associated_routes(&self) -> &BTreeSet<RouteId> {
        &self.associated_routes
    }

    pub fn associated_segments(&self) -> &BTreeSet<SegmentId> {
        &self.associated_segments
    }

    pub fn srgs(&self) -> &BTreeSet<SrgId> {
        &self.srgs
    }

    /// 部署在本节点上的资源
    pub fn resources(&self) -> &BTreeSet<ResourceId> {
        &self.resources
    }
}
