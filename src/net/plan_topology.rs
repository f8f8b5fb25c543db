//! 拓扑元素：节点、链路、共享风险组、资源

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use super::element::ElementMeta;
use super::error::NetPlanError;
use super::id::{ElementKind, LayerId, LinkId, NodeId, ResourceId, SrgId};
use super::link::Link;
use super::node::Node;
use super::plan::{NetPlan, not_found, remove_from_order};
use super::resource::Resource;
use super::srg::SharedRiskGroup;

impl NetPlan {
    // ---------------------------------------------------------------------
    // 节点
    // ---------------------------------------------------------------------

    #[tracing::instrument(skip(self, attributes))]
    pub fn add_node(
        &mut self,
        name: &str,
        x: f64,
        y: f64,
        attributes: BTreeMap<String, String>,
    ) -> Result<NodeId, NetPlanError> {
        self.ensure_modifiable()?;
        if !x.is_finite() || !y.is_finite() {
            return Err(NetPlanError::InvalidArgument(format!("node position ({x}, {y}) is not finite")));
        }
        let raw = self.alloc_id(ElementKind::Node);
        let id = NodeId(raw);
        let meta = ElementMeta::new(raw, self.node_order.len(), attributes);
        self.nodes.insert(id, Node::new(meta, name.to_string(), x, y));
        self.node_order.push(id);
        debug!(node = %id, name, "➕ 添加节点");
        self.after_mutation();
        Ok(id)
    }

    /// 删除节点：先删除所有相关的保护段、路由、链路、需求与资源，再退出 SRG
    #[tracing::instrument(skip(self))]
    pub fn remove_node(&mut self, node: NodeId) -> Result<Node, NetPlanError> {
        self.ensure_modifiable()?;
        let n = self.node(node)?;
        let segments: Vec<_> = n.associated_segments.iter().copied().collect();
        let routes: Vec<_> = n.associated_routes.iter().copied().collect();
        let links: Vec<_> = n.outgoing_links.union(&n.incoming_links).copied().collect();
        let demands: Vec<_> = n.outgoing_demands.union(&n.incoming_demands).copied().collect();
        let resources: Vec<_> = n.resources.iter().copied().collect();
        let srgs: Vec<_> = n.srgs.iter().copied().collect();

        for s in segments {
            if self.segments.contains_key(&s) {
                self.remove_segment_internal(s)?;
            }
        }
        for r in routes {
            if self.routes.contains_key(&r) {
                self.remove_route_internal(r)?;
            }
        }
        for e in links {
            if self.links.contains_key(&e) {
                self.remove_link_internal(e)?;
            }
        }
        for d in demands {
            if self.demands.contains_key(&d) {
                self.remove_demand_internal(d)?;
            }
        }
        for r in resources {
            self.remove_resource_internal(r)?;
        }
        for srg in srgs {
            self.srg_mut(srg)?.nodes.remove(&node);
        }

        let removed = self.nodes.remove(&node).ok_or(not_found(ElementKind::Node, node.0))?;
        self.element_kinds.remove(&node.0);
        self.nodes_down.remove(&node);
        let pos = remove_from_order(&mut self.node_order, node);
        for (i, id) in self.node_order.iter().enumerate().skip(pos) {
            if let Some(n) = self.nodes.get_mut(id) {
                n.meta.index = i;
            }
        }
        info!(node = %node, "🗑️  删除节点");
        self.after_mutation();
        Ok(removed)
    }

    pub fn set_node_name(&mut self, node: NodeId, name: impl Into<String>) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        self.node_mut(node)?.name = name.into();
        Ok(())
    }

    pub fn set_node_position(&mut self, node: NodeId, x: f64, y: f64) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        if !x.is_finite() || !y.is_finite() {
            return Err(NetPlanError::InvalidArgument(format!("node position ({x}, {y}) is not finite")));
        }
        let n = self.node_mut(node)?;
        n.x = x;
        n.y = y;
        Ok(())
    }

    /// 节点在某层的出链路
    pub fn outgoing_links_in_layer(&self, node: NodeId, layer: LayerId) -> Result<Vec<LinkId>, NetPlanError> {
        self.layer(layer)?;
        Ok(self
            .node(node)?
            .outgoing_links
            .iter()
            .copied()
            .filter(|l| self.links[l].layer == layer)
            .collect())
    }

    /// 节点在某层的入链路
    pub fn incoming_links_in_layer(&self, node: NodeId, layer: LayerId) -> Result<Vec<LinkId>, NetPlanError> {
        self.layer(layer)?;
        Ok(self
            .node(node)?
            .incoming_links
            .iter()
            .copied()
            .filter(|l| self.links[l].layer == layer)
            .collect())
    }

    /// 某层中 `a -> b` 的全部链路
    pub fn node_pair_links(&self, layer: LayerId, a: NodeId, b: NodeId) -> Result<Vec<LinkId>, NetPlanError> {
        self.node(b)?;
        Ok(self
            .outgoing_links_in_layer(a, layer)?
            .into_iter()
            .filter(|l| self.links[l].destination == b)
            .collect())
    }

    // ---------------------------------------------------------------------
    // 链路
    // ---------------------------------------------------------------------

    /// 添加单向链路；自环、负容量/长度、非正传播速度都会被拒绝
    #[tracing::instrument(skip(self, attributes))]
    #[allow(clippy::too_many_arguments)]
    pub fn add_link(
        &mut self,
        layer: LayerId,
        origin: NodeId,
        destination: NodeId,
        capacity: f64,
        length_km: f64,
        propagation_speed_km_per_s: f64,
        attributes: BTreeMap<String, String>,
    ) -> Result<LinkId, NetPlanError> {
        self.ensure_modifiable()?;
        self.layer(layer)?;
        self.node(origin)?;
        self.node(destination)?;
        if origin == destination {
            return Err(NetPlanError::SelfLoop(origin.0));
        }
        let capacity = self.check_quantity("capacity", capacity)?;
        let length_km = self.check_quantity("length", length_km)?;
        if propagation_speed_km_per_s.is_nan() || propagation_speed_km_per_s <= 0.0 {
            return Err(NetPlanError::InvalidQuantity {
                what: "propagation speed",
                value: propagation_speed_km_per_s,
            });
        }

        let raw = self.alloc_id(ElementKind::Link);
        let id = LinkId(raw);
        let index = self.layer(layer)?.links.len();
        let meta = ElementMeta::new(raw, index, attributes);
        self.links.insert(
            id,
            Link::new(meta, layer, origin, destination, capacity, length_km, propagation_speed_km_per_s),
        );
        self.layer_mut(layer)?.links.push(id);
        self.node_mut(origin)?.outgoing_links.insert(id);
        self.node_mut(destination)?.incoming_links.insert(id);
        debug!(link = %id, layer = %layer, origin = %origin, destination = %destination, capacity, "➕ 添加链路");
        self.after_mutation();
        Ok(id)
    }

    /// 同时添加 a->b 与 b->a 两条参数相同的链路
    #[allow(clippy::too_many_arguments)]
    pub fn add_link_bidirectional(
        &mut self,
        layer: LayerId,
        a: NodeId,
        b: NodeId,
        capacity: f64,
        length_km: f64,
        propagation_speed_km_per_s: f64,
        attributes: BTreeMap<String, String>,
    ) -> Result<(LinkId, LinkId), NetPlanError> {
        let ab = self.add_link(layer, a, b, capacity, length_km, propagation_speed_km_per_s, attributes.clone())?;
        let ba = self.add_link(layer, b, a, capacity, length_km, propagation_speed_km_per_s, attributes)?;
        Ok((ab, ba))
    }

    /// 删除链路：经过它的路由与保护段、耦合关系、SRG 成员关系和转发规则一并删除
    #[tracing::instrument(skip(self))]
    pub fn remove_link(&mut self, link: LinkId) -> Result<Link, NetPlanError> {
        self.ensure_modifiable()?;
        self.link(link)?;
        let removed = self.remove_link_internal(link)?;
        info!(link = %link, "🗑️  删除链路");
        self.after_mutation();
        Ok(removed)
    }

    pub(crate) fn remove_link_internal(&mut self, link: LinkId) -> Result<Link, NetPlanError> {
        let l = self.link(link)?;
        let layer = l.layer;
        let routes: Vec<_> = l.traversing_routes.keys().copied().collect();
        let segments: Vec<_> = l.traversing_segments.keys().copied().collect();
        let srgs: Vec<_> = l.srgs.iter().copied().collect();
        let coupled = l.coupled_demand.is_some();

        for s in segments {
            if self.segments.contains_key(&s) {
                self.remove_segment_internal(s)?;
            }
        }
        for r in routes {
            if self.routes.contains_key(&r) {
                self.remove_route_internal(r)?;
            }
        }
        if coupled {
            self.decouple_link_internal(link)?;
        }
        for srg in srgs {
            self.srg_mut(srg)?.links.remove(&link);
        }

        let lay = self.layer_mut(layer)?;
        let mut affected = BTreeSet::new();
        lay.forwarding_rules.retain(|(d, e), _| {
            if *e == link {
                affected.insert(*d);
                false
            } else {
                true
            }
        });
        lay.links_down.remove(&link);
        let pos = remove_from_order(&mut lay.links, link);
        let shifted: Vec<LinkId> = lay.links[pos..].to_vec();
        for (i, id) in shifted.into_iter().enumerate() {
            if let Some(l) = self.links.get_mut(&id) {
                l.meta.index = pos + i;
            }
        }

        let removed = self.links.remove(&link).ok_or(not_found(ElementKind::Link, link.0))?;
        self.element_kinds.remove(&link.0);
        self.node_mut(removed.origin)?.outgoing_links.remove(&link);
        self.node_mut(removed.destination)?.incoming_links.remove(&link);

        // 经过本链路的逐跳流量已随链路消失，其余需求的转发结果需要重新求解
        for d in removed.hop_by_hop_traffic.keys() {
            affected.insert(*d);
        }
        for d in affected {
            if let Some(demand) = self.demands.get_mut(&d) {
                demand.hop_by_hop_traffic.remove(&link);
            }
            if self.demands.contains_key(&d) {
                self.update_hop_by_hop_demand(d)?;
            }
        }
        Ok(removed)
    }

    /// 删除本层全部链路（连带路由、保护段与耦合）
    pub fn remove_all_links(&mut self, layer: LayerId) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        let links = self.layer(layer)?.links.clone();
        for e in links.into_iter().rev() {
            if self.links.contains_key(&e) {
                self.remove_link_internal(e)?;
            }
        }
        info!(layer = %layer, "🗑️  删除本层全部链路");
        self.after_mutation();
        Ok(())
    }

    /// 设置链路容量；耦合链路的容量由下层需求决定，不能直接设置
    pub fn set_link_capacity(&mut self, link: LinkId, capacity: f64) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        if self.link(link)?.coupled_demand.is_some() {
            return Err(NetPlanError::CoupledLinkCapacity(link));
        }
        let capacity = self.check_quantity("capacity", capacity)?;
        self.link_mut(link)?.capacity = capacity;
        debug!(link = %link, capacity, "设置链路容量");
        self.after_mutation();
        Ok(())
    }

    pub fn set_link_length(&mut self, link: LinkId, length_km: f64) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        self.link(link)?;
        let length_km = self.check_quantity("length", length_km)?;
        self.link_mut(link)?.length_km = length_km;
        Ok(())
    }

    pub fn set_link_propagation_speed(&mut self, link: LinkId, speed_km_per_s: f64) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        self.link(link)?;
        if speed_km_per_s.is_nan() || speed_km_per_s <= 0.0 {
            return Err(NetPlanError::InvalidQuantity {
                what: "propagation speed",
                value: speed_km_per_s,
            });
        }
        self.link_mut(link)?.propagation_speed_km_per_s = speed_km_per_s;
        Ok(())
    }

    pub fn is_link_oversubscribed(&self, link: LinkId) -> Result<bool, NetPlanError> {
        Ok(self.link(link)?.is_oversubscribed(self.config.precision_factor))
    }

    /// 按 index 排列的链路容量向量
    pub fn link_capacity_vector(&self, layer: LayerId) -> Result<Vec<f64>, NetPlanError> {
        Ok(self.links_of(layer)?.map(Link::capacity).collect())
    }

    /// 按 index 排列的链路承载流量向量（不含保护段）
    pub fn link_carried_traffic_vector(&self, layer: LayerId) -> Result<Vec<f64>, NetPlanError> {
        Ok(self
            .links_of(layer)?
            .map(Link::carried_traffic_not_including_protection)
            .collect())
    }

    /// 本层被超额订阅的链路
    pub fn oversubscribed_links(&self, layer: LayerId) -> Result<Vec<LinkId>, NetPlanError> {
        let precision = self.config.precision_factor;
        Ok(self
            .links_of(layer)?
            .filter(|l| l.is_oversubscribed(precision))
            .map(Link::link_id)
            .collect())
    }

    // ---------------------------------------------------------------------
    // 共享风险组
    // ---------------------------------------------------------------------

    #[tracing::instrument(skip(self, attributes))]
    pub fn add_srg(
        &mut self,
        mean_time_to_fail_hours: f64,
        mean_time_to_repair_hours: f64,
        attributes: BTreeMap<String, String>,
    ) -> Result<SrgId, NetPlanError> {
        self.ensure_modifiable()?;
        let mttf = self.check_quantity("mean time to fail", mean_time_to_fail_hours)?;
        let mttr = self.check_quantity("mean time to repair", mean_time_to_repair_hours)?;
        let raw = self.alloc_id(ElementKind::Srg);
        let id = SrgId(raw);
        let meta = ElementMeta::new(raw, self.srg_order.len(), attributes);
        self.srgs.insert(
            id,
            SharedRiskGroup {
                meta,
                nodes: BTreeSet::new(),
                links: BTreeSet::new(),
                mean_time_to_fail_hours: mttf,
                mean_time_to_repair_hours: mttr,
            },
        );
        self.srg_order.push(id);
        debug!(srg = %id, mttf, mttr, "➕ 添加共享风险组");
        self.after_mutation();
        Ok(id)
    }

    pub fn add_node_to_srg(&mut self, srg: SrgId, node: NodeId) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        self.srg(srg)?;
        self.node_mut(node)?.srgs.insert(srg);
        self.srg_mut(srg)?.nodes.insert(node);
        self.after_mutation();
        Ok(())
    }

    pub fn add_link_to_srg(&mut self, srg: SrgId, link: LinkId) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        self.srg(srg)?;
        self.link_mut(link)?.srgs.insert(srg);
        self.srg_mut(srg)?.links.insert(link);
        self.after_mutation();
        Ok(())
    }

    pub fn remove_node_from_srg(&mut self, srg: SrgId, node: NodeId) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        self.srg(srg)?;
        self.node_mut(node)?.srgs.remove(&srg);
        self.srg_mut(srg)?.nodes.remove(&node);
        self.after_mutation();
        Ok(())
    }

    pub fn remove_link_from_srg(&mut self, srg: SrgId, link: LinkId) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        self.srg(srg)?;
        self.link_mut(link)?.srgs.remove(&srg);
        self.srg_mut(srg)?.links.remove(&link);
        self.after_mutation();
        Ok(())
    }

    pub fn set_srg_mean_times(
        &mut self,
        srg: SrgId,
        mean_time_to_fail_hours: f64,
        mean_time_to_repair_hours: f64,
    ) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        self.srg(srg)?;
        let mttf = self.check_quantity("mean time to fail", mean_time_to_fail_hours)?;
        let mttr = self.check_quantity("mean time to repair", mean_time_to_repair_hours)?;
        let s = self.srg_mut(srg)?;
        s.mean_time_to_fail_hours = mttf;
        s.mean_time_to_repair_hours = mttr;
        Ok(())
    }

    /// 删除 SRG（成员元素不受影响）
    pub fn remove_srg(&mut self, srg: SrgId) -> Result<SharedRiskGroup, NetPlanError> {
        self.ensure_modifiable()?;
        let removed = self.srgs.remove(&srg).ok_or(not_found(ElementKind::Srg, srg.0))?;
        self.element_kinds.remove(&srg.0);
        for n in &removed.nodes {
            if let Some(node) = self.nodes.get_mut(n) {
                node.srgs.remove(&srg);
            }
        }
        for l in &removed.links {
            if let Some(link) = self.links.get_mut(l) {
                link.srgs.remove(&srg);
            }
        }
        let pos = remove_from_order(&mut self.srg_order, srg);
        for (i, id) in self.srg_order.iter().enumerate().skip(pos) {
            if let Some(s) = self.srgs.get_mut(id) {
                s.meta.index = i;
            }
        }
        debug!(srg = %srg, "🗑️  删除共享风险组");
        self.after_mutation();
        Ok(removed)
    }

    pub fn srg_availability(&self, srg: SrgId) -> Result<f64, NetPlanError> {
        Ok(self.srg(srg)?.availability())
    }

    // ---------------------------------------------------------------------
    // 资源
    // ---------------------------------------------------------------------

    #[tracing::instrument(skip(self, attributes))]
    pub fn add_resource(
        &mut self,
        resource_type: &str,
        name: &str,
        host_node: NodeId,
        capacity: f64,
        capacity_units: &str,
        attributes: BTreeMap<String, String>,
    ) -> Result<ResourceId, NetPlanError> {
        self.ensure_modifiable()?;
        self.node(host_node)?;
        if resource_type.is_empty() {
            return Err(NetPlanError::InvalidArgument("resource type must not be empty".into()));
        }
        let capacity = self.check_quantity("resource capacity", capacity)?;
        let raw = self.alloc_id(ElementKind::Resource);
        let id = ResourceId(raw);
        let meta = ElementMeta::new(raw, self.resource_order.len(), attributes);
        self.resources.insert(
            id,
            Resource {
                meta,
                resource_type: resource_type.to_string(),
                name: name.to_string(),
                host_node,
                capacity,
                capacity_units: capacity_units.to_string(),
                traversing_routes: BTreeMap::new(),
                occupied_capacity: 0.0,
            },
        );
        self.resource_order.push(id);
        self.node_mut(host_node)?.resources.insert(id);
        debug!(resource = %id, resource_type, host = %host_node, capacity, "➕ 添加资源");
        self.after_mutation();
        Ok(id)
    }

    /// 删除资源及经过它的全部路由
    pub fn remove_resource(&mut self, resource: ResourceId) -> Result<Resource, NetPlanError> {
        self.ensure_modifiable()?;
        self.resource(resource)?;
        let removed = self.remove_resource_internal(resource)?;
        info!(resource = %resource, "🗑️  删除资源");
        self.after_mutation();
        Ok(removed)
    }

    pub(crate) fn remove_resource_internal(&mut self, resource: ResourceId) -> Result<Resource, NetPlanError> {
        let routes: Vec<_> = self.resource(resource)?.traversing_routes.keys().copied().collect();
        for r in routes {
            if self.routes.contains_key(&r) {
                self.remove_route_internal(r)?;
            }
        }
        let removed = self
            .resources
            .remove(&resource)
            .ok_or(not_found(ElementKind::Resource, resource.0))?;
        self.element_kinds.remove(&resource.0);
        if let Some(node) = self.nodes.get_mut(&removed.host_node) {
            node.resources.remove(&resource);
        }
        let pos = remove_from_order(&mut self.resource_order, resource);
        for (i, id) in self.resource_order.iter().enumerate().skip(pos) {
            if let Some(r) = self.resources.get_mut(id) {
                r.meta.index = i;
            }
        }
        Ok(removed)
    }

    pub fn set_resource_capacity(&mut self, resource: ResourceId, capacity: f64) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        self.resource(resource)?;
        let capacity = self.check_quantity("resource capacity", capacity)?;
        self.resource_mut(resource)?.capacity = capacity;
        self.after_mutation();
        Ok(())
    }

    /// 某节点上指定类型的资源
    pub fn resources_of_type(&self, node: NodeId, resource_type: &str) -> Result<Vec<ResourceId>, NetPlanError> {
        Ok(self
            .node(node)?
            .resources
            .iter()
            .copied()
            .filter(|r| self.resources[r].resource_type == resource_type)
            .collect())
    }
}
