//! 网络规划聚合根
//!
//! `NetPlan` 是所有元素唯一的工厂与删除者：分配全局 id、维护各类 id -> 元素映射、
//! 层间耦合 DAG 和可修改标志。所有跨元素的缓存更新都在这里编排。
//!
//! `impl NetPlan` 按关注点分散在多个文件中：
//! - `plan_topology.rs`：节点、链路、SRG、资源
//! - `plan_traffic.rs`：需求、路由、保护段
//! - `plan_routing.rs`：缓存刷新、逐跳路由、路由模式转换
//! - `plan_failure.rs`：故障传播
//! - `plan_coupling.rs`：层间耦合
//! - `check.rs`：一致性检查

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, info};

use super::coupling::LayerCouplingDag;
use super::demand::Demand;
use super::element::ElementMeta;
use super::error::NetPlanError;
use super::id::{
    DemandId, ElementKind, LayerId, LinkId, NetworkElementId, NodeId, ResourceId, RouteId,
    SegmentId, SrgId,
};
use super::layer::Layer;
use super::link::Link;
use super::node::Node;
use super::resource::Resource;
use super::route::Route;
use super::segment::ProtectionSegment;
use super::srg::SharedRiskGroup;
use crate::config::PlanConfig;

/// 默认层的名称与单位
pub const DEFAULT_LAYER_NAME: &str = "default";
pub const DEFAULT_TRAFFIC_UNITS: &str = "Gbps";

/// 多层网络规划模型
#[derive(Debug, Clone)]
pub struct NetPlan {
    pub(crate) config: PlanConfig,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) attributes: BTreeMap<String, String>,
    pub(crate) modifiable: bool,
    pub(crate) next_id: u64,
    /// 全局 id -> 元素种类
    pub(crate) element_kinds: HashMap<u64, ElementKind>,

    pub(crate) layer_order: Vec<LayerId>,
    pub(crate) node_order: Vec<NodeId>,
    pub(crate) srg_order: Vec<SrgId>,
    pub(crate) resource_order: Vec<ResourceId>,
    pub(crate) default_layer: LayerId,

    pub(crate) layers: HashMap<LayerId, Layer>,
    pub(crate) nodes: HashMap<NodeId, Node>,
    pub(crate) links: HashMap<LinkId, Link>,
    pub(crate) demands: HashMap<DemandId, Demand>,
    pub(crate) routes: HashMap<RouteId, Route>,
    pub(crate) segments: HashMap<SegmentId, ProtectionSegment>,
    pub(crate) srgs: HashMap<SrgId, SharedRiskGroup>,
    pub(crate) resources: HashMap<ResourceId, Resource>,

    pub(crate) nodes_down: BTreeSet<NodeId>,
    pub(crate) coupling: LayerCouplingDag,
}

impl Default for NetPlan {
    fn default() -> Self {
        Self::new(PlanConfig::default())
    }
}

impl NetPlan {
    /// 创建一个只含默认层的空规划
    pub fn new(config: PlanConfig) -> Self {
        let mut plan = Self::without_layers(config);
        let layer = plan.insert_layer(
            DEFAULT_LAYER_NAME.to_string(),
            String::new(),
            DEFAULT_TRAFFIC_UNITS.to_string(),
            DEFAULT_TRAFFIC_UNITS.to_string(),
            BTreeMap::new(),
        );
        plan.default_layer = layer;
        plan
    }

    /// 不含任何层的规划；调用方必须随后插入至少一个层并设置默认层
    pub(crate) fn without_layers(config: PlanConfig) -> Self {
        Self {
            config,
            name: String::new(),
            description: String::new(),
            attributes: BTreeMap::new(),
            modifiable: true,
            next_id: 0,
            element_kinds: HashMap::new(),
            layer_order: Vec::new(),
            node_order: Vec::new(),
            srg_order: Vec::new(),
            resource_order: Vec::new(),
            default_layer: LayerId(0),
            layers: HashMap::new(),
            nodes: HashMap::new(),
            links: HashMap::new(),
            demands: HashMap::new(),
            routes: HashMap::new(),
            segments: HashMap::new(),
            srgs: HashMap::new(),
            resources: HashMap::new(),
            nodes_down: BTreeSet::new(),
            coupling: LayerCouplingDag::default(),
        }
    }

    pub fn config(&self) -> &PlanConfig {
        &self.config
    }

    pub fn precision_factor(&self) -> f64 {
        self.config.precision_factor
    }

    /// 开关每次修改之后的完整一致性检查
    pub fn set_consistency_checking(&mut self, enabled: bool) {
        self.config.check_consistency = enabled;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        self.name = name.into();
        Ok(())
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        self.description = description.into();
        Ok(())
    }

    pub fn plan_attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn set_plan_attribute(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        self.attributes.insert(key.into(), value.into());
        Ok(())
    }

    pub fn is_modifiable(&self) -> bool {
        self.modifiable
    }

    /// 清除后所有修改操作都会在触碰状态之前失败
    pub fn set_modifiable(&mut self, modifiable: bool) {
        info!(modifiable, "设置规划可修改标志");
        self.modifiable = modifiable;
    }

    /// 完全独立的深拷贝（不与原对象共享任何可变缓存）
    pub fn copy(&self) -> NetPlan {
        self.clone()
    }

    /// 用另一个规划的完整状态替换当前状态
    pub fn copy_from(&mut self, other: &NetPlan) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        *self = other.clone();
        self.modifiable = true;
        Ok(())
    }

    /// 按全局 id 查找任意元素
    pub fn network_element(&self, id: u64) -> Option<NetworkElementId> {
        self.element_kinds
            .get(&id)
            .map(|kind| NetworkElementId::from_kind(*kind, id))
    }

    // ---------------------------------------------------------------------
    // 查询
    // ---------------------------------------------------------------------

    pub fn layer(&self, id: LayerId) -> Result<&Layer, NetPlanError> {
        self.layers.get(&id).ok_or(not_found(ElementKind::Layer, id.0))
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, NetPlanError> {
        self.nodes.get(&id).ok_or(not_found(ElementKind::Node, id.0))
    }

    pub fn link(&self, id: LinkId) -> Result<&Link, NetPlanError> {
        self.links.get(&id).ok_or(not_found(ElementKind::Link, id.0))
    }

    pub fn demand(&self, id: DemandId) -> Result<&Demand, NetPlanError> {
        self.demands.get(&id).ok_or(not_found(ElementKind::Demand, id.0))
    }

    pub fn route(&self, id: RouteId) -> Result<&Route, NetPlanError> {
        self.routes.get(&id).ok_or(not_found(ElementKind::Route, id.0))
    }

    pub fn segment(&self, id: SegmentId) -> Result<&ProtectionSegment, NetPlanError> {
        self.segments
            .get(&id)
            .ok_or(not_found(ElementKind::ProtectionSegment, id.0))
    }

    pub fn srg(&self, id: SrgId) -> Result<&SharedRiskGroup, NetPlanError> {
        self.srgs.get(&id).ok_or(not_found(ElementKind::Srg, id.0))
    }

    pub fn resource(&self, id: ResourceId) -> Result<&Resource, NetPlanError> {
        self.resources
            .get(&id)
            .ok_or(not_found(ElementKind::Resource, id.0))
    }

    pub fn default_layer(&self) -> LayerId {
        self.default_layer
    }

    pub fn layer_ids(&self) -> &[LayerId] {
        &self.layer_order
    }

    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_order
    }

    pub fn srg_ids(&self) -> &[SrgId] {
        &self.srg_order
    }

    pub fn resource_ids(&self) -> &[ResourceId] {
        &self.resource_order
    }

    pub fn layers(&self) -> impl Iterator<Item = &Layer> + '_ {
        self.layer_order.iter().map(move |id| &self.layers[id])
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.node_order.iter().map(move |id| &self.nodes[id])
    }

    pub fn links_of(&self, layer: LayerId) -> Result<impl Iterator<Item = &Link> + '_, NetPlanError> {
        let layer = self.layer(layer)?;
        Ok(layer.links.iter().map(move |id| &self.links[id]))
    }

    pub fn demands_of(&self, layer: LayerId) -> Result<impl Iterator<Item = &Demand> + '_, NetPlanError> {
        let layer = self.layer(layer)?;
        Ok(layer.demands.iter().map(move |id| &self.demands[id]))
    }

    pub fn routes_of(&self, layer: LayerId) -> Result<impl Iterator<Item = &Route> + '_, NetPlanError> {
        let layer = self.layer(layer)?;
        Ok(layer.routes.iter().map(move |id| &self.routes[id]))
    }

    pub fn segments_of(
        &self,
        layer: LayerId,
    ) -> Result<impl Iterator<Item = &ProtectionSegment> + '_, NetPlanError> {
        let layer = self.layer(layer)?;
        Ok(layer.segments.iter().map(move |id| &self.segments[id]))
    }

    pub fn layer_by_name(&self, name: &str) -> Option<LayerId> {
        self.layers().find(|l| l.name == name).map(|l| l.layer_id())
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes().find(|n| n.name == name).map(|n| n.node_id())
    }

    pub fn coupling_dag(&self) -> &LayerCouplingDag {
        &self.coupling
    }

    pub fn nodes_down(&self) -> &BTreeSet<NodeId> {
        &self.nodes_down
    }

    pub fn number_of_nodes(&self) -> usize {
        self.node_order.len()
    }

    pub fn number_of_layers(&self) -> usize {
        self.layer_order.len()
    }

    // ---------------------------------------------------------------------
    // 属性
    // ---------------------------------------------------------------------

    pub fn element_meta(&self, element: NetworkElementId) -> Result<&ElementMeta, NetPlanError> {
        let meta = match element {
            NetworkElementId::Node(id) => self.nodes.get(&id).map(|e| &e.meta),
            NetworkElementId::Link(id) => self.links.get(&id).map(|e| &e.meta),
            NetworkElementId::Demand(id) => self.demands.get(&id).map(|e| &e.meta),
            NetworkElementId::Route(id) => self.routes.get(&id).map(|e| &e.meta),
            NetworkElementId::Segment(id) => self.segments.get(&id).map(|e| &e.meta),
            NetworkElementId::Layer(id) => self.layers.get(&id).map(|e| &e.meta),
            NetworkElementId::Srg(id) => self.srgs.get(&id).map(|e| &e.meta),
            NetworkElementId::Resource(id) => self.resources.get(&id).map(|e| &e.meta),
        };
        meta.ok_or(not_found(element.kind(), element.raw()))
    }

    fn element_meta_mut(&mut self, element: NetworkElementId) -> Result<&mut ElementMeta, NetPlanError> {
        let meta = match element {
            NetworkElementId::Node(id) => self.nodes.get_mut(&id).map(|e| &mut e.meta),
            NetworkElementId::Link(id) => self.links.get_mut(&id).map(|e| &mut e.meta),
            NetworkElementId::Demand(id) => self.demands.get_mut(&id).map(|e| &mut e.meta),
            NetworkElementId::Route(id) => self.routes.get_mut(&id).map(|e| &mut e.meta),
            NetworkElementId::Segment(id) => self.segments.get_mut(&id).map(|e| &mut e.meta),
            NetworkElementId::Layer(id) => self.layers.get_mut(&id).map(|e| &mut e.meta),
            NetworkElementId::Srg(id) => self.srgs.get_mut(&id).map(|e| &mut e.meta),
            NetworkElementId::Resource(id) => self.resources.get_mut(&id).map(|e| &mut e.meta),
        };
        meta.ok_or(not_found(element.kind(), element.raw()))
    }

    pub fn attribute(&self, element: NetworkElementId, key: &str) -> Result<Option<&str>, NetPlanError> {
        Ok(self.element_meta(element)?.attribute(key))
    }

    pub fn set_attribute(
        &mut self,
        element: NetworkElementId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        let meta = self.element_meta_mut(element)?;
        meta.attributes.insert(key.into(), value.into());
        Ok(())
    }

    pub fn remove_attribute(
        &mut self,
        element: NetworkElementId,
        key: &str,
    ) -> Result<Option<String>, NetPlanError> {
        self.ensure_modifiable()?;
        let meta = self.element_meta_mut(element)?;
        Ok(meta.attributes.remove(key))
    }

    // ---------------------------------------------------------------------
    // 层
    // ---------------------------------------------------------------------

    /// 添加一个新层（源路由模式）
    #[tracing::instrument(skip(self, attributes))]
    pub fn add_layer(
        &mut self,
        name: &str,
        description: &str,
        demand_traffic_units: &str,
        link_capacity_units: &str,
        attributes: BTreeMap<String, String>,
    ) -> Result<LayerId, NetPlanError> {
        self.ensure_modifiable()?;
        let id = self.insert_layer(
            name.to_string(),
            description.to_string(),
            demand_traffic_units.to_string(),
            link_capacity_units.to_string(),
            attributes,
        );
        info!(layer = %id, "➕ 添加网络层");
        self.after_mutation();
        Ok(id)
    }

    pub(crate) fn insert_layer(
        &mut self,
        name: String,
        description: String,
        demand_traffic_units: String,
        link_capacity_units: String,
        attributes: BTreeMap<String, String>,
    ) -> LayerId {
        let raw = self.alloc_id(ElementKind::Layer);
        let id = LayerId(raw);
        let meta = ElementMeta::new(raw, self.layer_order.len(), attributes);
        self.layers.insert(
            id,
            Layer::new(meta, name, description, demand_traffic_units, link_capacity_units),
        );
        self.layer_order.push(id);
        self.coupling.add_layer(id);
        id
    }

    pub fn set_default_layer(&mut self, layer: LayerId) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        self.layer(layer)?;
        self.default_layer = layer;
        Ok(())
    }

    pub fn set_layer_name(&mut self, layer: LayerId, name: impl Into<String>) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        self.layer_mut(layer)?.name = name.into();
        Ok(())
    }

    pub fn set_layer_description(
        &mut self,
        layer: LayerId,
        description: impl Into<String>,
    ) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        self.layer_mut(layer)?.description = description.into();
        Ok(())
    }

    /// 修改需求流量单位；存在以本层需求为下端的耦合时不允许修改
    pub fn set_demand_traffic_units(&mut self, layer: LayerId, units: &str) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        self.layer(layer)?;
        if !self.coupling.upper_layers(layer).is_empty() {
            return Err(NetPlanError::Coupling(format!(
                "demands of layer {layer} are coupled; traffic units are fixed"
            )));
        }
        self.layer_mut(layer)?.demand_traffic_units = units.to_string();
        Ok(())
    }

    /// 修改链路容量单位；存在以本层链路为上端的耦合时不允许修改
    pub fn set_link_capacity_units(&mut self, layer: LayerId, units: &str) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        self.layer(layer)?;
        if !self.coupling.lower_layers(layer).is_empty() {
            return Err(NetPlanError::Coupling(format!(
                "links of layer {layer} are coupled; capacity units are fixed"
            )));
        }
        self.layer_mut(layer)?.link_capacity_units = units.to_string();
        Ok(())
    }

    /// 删除一个层及其全部链路、需求、路由和保护段（不能删除最后一个层）
    #[tracing::instrument(skip(self))]
    pub fn remove_layer(&mut self, layer: LayerId) -> Result<Layer, NetPlanError> {
        self.ensure_modifiable()?;
        self.layer(layer)?;
        if self.layer_order.len() == 1 {
            return Err(NetPlanError::LastLayer);
        }
        self.clear_layer(layer)?;

        let mut removed = self
            .layers
            .remove(&layer)
            .ok_or(not_found(ElementKind::Layer, layer.0))?;
        self.element_kinds.remove(&layer.0);
        self.coupling.remove_layer(layer);
        let pos = remove_from_order(&mut self.layer_order, layer);
        for (i, id) in self.layer_order.iter().enumerate().skip(pos) {
            if let Some(l) = self.layers.get_mut(id) {
                l.meta.index = i;
            }
        }
        if self.default_layer == layer {
            self.default_layer = self.layer_order[0];
        }
        removed.forwarding_rules.clear();
        removed.links_down.clear();
        info!(layer = %layer, "🗑️  删除网络层");
        self.after_mutation();
        Ok(removed)
    }

    /// 删除层内全部元素（按依赖顺序：保护段 -> 路由 -> 链路 -> 需求）
    fn clear_layer(&mut self, layer: LayerId) -> Result<(), NetPlanError> {
        let segments = self.layer(layer)?.segments.clone();
        for s in segments.into_iter().rev() {
            self.remove_segment_internal(s)?;
        }
        let routes = self.layer(layer)?.routes.clone();
        for r in routes.into_iter().rev() {
            self.remove_route_internal(r)?;
        }
        let links = self.layer(layer)?.links.clone();
        for e in links.into_iter().rev() {
            self.remove_link_internal(e)?;
        }
        let demands = self.layer(layer)?.demands.clone();
        for d in demands.into_iter().rev() {
            self.remove_demand_internal(d)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // 内部工具
    // ---------------------------------------------------------------------

    pub(crate) fn ensure_modifiable(&self) -> Result<(), NetPlanError> {
        if self.modifiable {
            Ok(())
        } else {
            Err(NetPlanError::NotModifiable)
        }
    }

    pub(crate) fn alloc_id(&mut self, kind: ElementKind) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.element_kinds.insert(id, kind);
        id
    }

    /// 修改成功后的调试期一致性检查；违例属于引擎缺陷，直接 panic
    pub(crate) fn after_mutation(&self) {
        if !self.config.check_consistency {
            return;
        }
        debug!("执行一致性检查");
        if let Err(e) = self.check_caches_consistency() {
            panic!("{e}");
        }
    }

    pub(crate) fn layer_mut(&mut self, id: LayerId) -> Result<&mut Layer, NetPlanError> {
        self.layers
            .get_mut(&id)
            .ok_or(not_found(ElementKind::Layer, id.0))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, NetPlanError> {
        self.nodes
            .get_mut(&id)
            .ok_or(not_found(ElementKind::Node, id.0))
    }

    pub(crate) fn link_mut(&mut self, id: LinkId) -> Result<&mut Link, NetPlanError> {
        self.links
            .get_mut(&id)
            .ok_or(not_found(ElementKind::Link, id.0))
    }

    pub(crate) fn demand_mut(&mut self, id: DemandId) -> Result<&mut Demand, NetPlanError> {
        self.demands
            .get_mut(&id)
            .ok_or(not_found(ElementKind::Demand, id.0))
    }

    pub(crate) fn route_mut(&mut self, id: RouteId) -> Result<&mut Route, NetPlanError> {
        self.routes
            .get_mut(&id)
            .ok_or(not_found(ElementKind::Route, id.0))
    }

    pub(crate) fn segment_mut(&mut self, id: SegmentId) -> Result<&mut ProtectionSegment, NetPlanError> {
        self.segments
            .get_mut(&id)
            .ok_or(not_found(ElementKind::ProtectionSegment, id.0))
    }

    pub(crate) fn resource_mut(&mut self, id: ResourceId) -> Result<&mut Resource, NetPlanError> {
        self.resources
            .get_mut(&id)
            .ok_or(not_found(ElementKind::Resource, id.0))
    }

    pub(crate) fn srg_mut(&mut self, id: SrgId) -> Result<&mut SharedRiskGroup, NetPlanError> {
        self.srgs.get_mut(&id).ok_or(not_found(ElementKind::Srg, id.0))
    }

    /// 链路可用：自身 up 且两个端点 up
    pub(crate) fn link_usable(&self, link: &Link) -> bool {
        link.is_up && !self.nodes_down.contains(&link.origin) && !self.nodes_down.contains(&link.destination)
    }

    pub(crate) fn ensure_in_layer(
        &self,
        kind: ElementKind,
        id: u64,
        actual: LayerId,
        expected: LayerId,
    ) -> Result<(), NetPlanError> {
        if actual == expected {
            Ok(())
        } else {
            Err(NetPlanError::WrongLayer {
                kind,
                id,
                layer: expected,
            })
        }
    }

    pub(crate) fn check_quantity(&self, what: &'static str, value: f64) -> Result<f64, NetPlanError> {
        if !value.is_finite() || value < -self.config.precision_factor {
            return Err(NetPlanError::InvalidQuantity { what, value });
        }
        Ok(self.config.round_to_zero(value).max(0.0))
    }
}

pub(crate) fn not_found(kind: ElementKind, id: u64) -> NetPlanError {
    NetPlanError::NotFound { kind, id }
}

/// 从有序集合中移除 id，返回其原位置（之后的元素需要重新编号）
pub(crate) fn remove_from_order<T: PartialEq + Copy>(order: &mut Vec<T>, id: T) -> usize {
    match order.iter().position(|x| *x == id) {
        Some(pos) => {
            order.remove(pos);
            pos
        }
        None => order.len(),
    }
}
