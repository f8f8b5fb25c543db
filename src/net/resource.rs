//! 资源类型
//!
//! 部署在节点上、带类型的容量（如 "CPU"、"FW"），业务链需求的路由会依次经过。

use std::collections::BTreeMap;

use super::element::ElementMeta;
use super::id::{NodeId, ResourceId, RouteId};

#[derive(Debug, Clone)]
pub struct Resource {
    pub(crate) meta: ElementMeta,
    pub(crate) resource_type: String,
    pub(crate) name: String,
    pub(crate) host_node: NodeId,
    pub(crate) capacity: f64,
    pub(crate) capacity_units: String,
    /// 经过本资源的路由 -> 次数
    pub(crate) traversing_routes: BTreeMap<RouteId, usize>,
    pub(crate) occupied_capacity: f64,
}

impl Resource {
    pub fn resource_id(&self) -> ResourceId {
        ResourceId(self.meta.id)
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host_node(&self) -> NodeId {
        self.host_node
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn capacity_units(&self) -> &str {
        &self.capacity_units
    }

    pub fn traversing_routes(&self) -> &BTreeMap<RouteId, usize> {
        &self.traversing_routes
    }

    pub fn occupied_capacity(&self) -> f64 {
        self.occupied_capacity
    }

    pub fn utilization(&self) -> f64 {
        if self.capacity == 0.0 {
            if self.occupied_capacity == 0.0 { 0.0 } else { f64::INFINITY }
        } else {
            self.occupied_capacity / self.capacity
        }
    }
}
