//! 流量元素：需求、路由、保护段

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use super::demand::{Demand, RoutingCycleType};
use super::element::ElementMeta;
use super::error::NetPlanError;
use super::id::{DemandId, ElementKind, LayerId, LinkId, NodeId, PathElement, ResourceId, RouteId, SegmentId};
use super::layer::RoutingType;
use super::link::Link;
use super::plan::{NetPlan, not_found, remove_from_order};
use super::plan_routing::Touched;
use super::resource::Resource;
use super::route::Route;
use super::segment::ProtectionSegment;
use crate::paths::{self, CandidateLink, CandidateResource};

impl NetPlan {
    // ---------------------------------------------------------------------
    // 需求
    // ---------------------------------------------------------------------

    #[tracing::instrument(skip(self, attributes))]
    pub fn add_demand(
        &mut self,
        layer: LayerId,
        ingress: NodeId,
        egress: NodeId,
        offered_traffic: f64,
        attributes: BTreeMap<String, String>,
    ) -> Result<DemandId, NetPlanError> {
        self.ensure_modifiable()?;
        let routing_type = self.layer(layer)?.routing_type;
        self.node(ingress)?;
        self.node(egress)?;
        if ingress == egress {
            return Err(NetPlanError::SelfLoop(ingress.0));
        }
        let offered = self.check_quantity("offered traffic", offered_traffic)?;

        let raw = self.alloc_id(ElementKind::Demand);
        let id = DemandId(raw);
        let meta = ElementMeta::new(raw, self.layer(layer)?.demands.len(), attributes);
        self.demands.insert(id, Demand::new(meta, layer, ingress, egress, offered));
        self.layer_mut(layer)?.demands.push(id);
        self.node_mut(ingress)?.outgoing_demands.insert(id);
        self.node_mut(egress)?.incoming_demands.insert(id);
        if routing_type == RoutingType::HopByHopRouting {
            self.update_hop_by_hop_demand(id)?;
        }
        debug!(demand = %id, layer = %layer, ingress = %ingress, egress = %egress, offered, "➕ 添加需求");
        self.after_mutation();
        Ok(id)
    }

    /// 按节点 index 的 N×N 流量矩阵批量添加需求（对角线与零元素跳过）
    pub fn add_demands_from_traffic_matrix(
        &mut self,
        layer: LayerId,
        traffic: &[Vec<f64>],
    ) -> Result<Vec<DemandId>, NetPlanError> {
        self.ensure_modifiable()?;
        self.layer(layer)?;
        let n = self.node_order.len();
        if traffic.len() != n || traffic.iter().any(|row| row.len() != n) {
            return Err(NetPlanError::MatrixSize {
                expected_rows: n,
                expected_cols: n,
                rows: traffic.len(),
                cols: traffic.first().map_or(0, Vec::len),
            });
        }
        if let Some(bad) = traffic.iter().flatten().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(NetPlanError::InvalidQuantity {
                what: "offered traffic",
                value: *bad,
            });
        }
        let nodes = self.node_order.clone();
        let mut added = Vec::new();
        for (i, a) in nodes.iter().enumerate() {
            for (j, b) in nodes.iter().enumerate() {
                if i != j && traffic[i][j] > 0.0 {
                    added.push(self.add_demand(layer, *a, *b, traffic[i][j], BTreeMap::new())?);
                }
            }
        }
        info!(layer = %layer, demands = added.len(), "由流量矩阵添加需求");
        Ok(added)
    }

    /// 删除需求及其路由；若已耦合则先解耦
    #[tracing::instrument(skip(self))]
    pub fn remove_demand(&mut self, demand: DemandId) -> Result<Demand, NetPlanError> {
        self.ensure_modifiable()?;
        self.demand(demand)?;
        let removed = self.remove_demand_internal(demand)?;
        info!(demand = %demand, "🗑️  删除需求");
        self.after_mutation();
        Ok(removed)
    }

    pub(crate) fn remove_demand_internal(&mut self, demand: DemandId) -> Result<Demand, NetPlanError> {
        let d = self.demand(demand)?;
        let layer = d.layer;
        let routes: Vec<_> = d.routes.iter().copied().collect();
        let coupled = d.coupled_link.is_some();
        for r in routes {
            self.remove_route_internal(r)?;
        }
        if coupled {
            self.decouple_demand_internal(demand)?;
        }

        let removed = self.demands.remove(&demand).ok_or(not_found(ElementKind::Demand, demand.0))?;
        self.element_kinds.remove(&demand.0);
        let mut touched = Touched::default();
        for l in removed.hop_by_hop_traffic.keys() {
            if let Some(link) = self.links.get_mut(l) {
                link.hop_by_hop_traffic.remove(&demand);
            }
            touched.links.insert(*l);
        }
        let lay = self.layer_mut(layer)?;
        lay.forwarding_rules.retain(|(d, _), _| *d != demand);
        let pos = remove_from_order(&mut lay.demands, demand);
        let shifted: Vec<DemandId> = lay.demands[pos..].to_vec();
        for (i, id) in shifted.into_iter().enumerate() {
            if let Some(d) = self.demands.get_mut(&id) {
                d.meta.index = pos + i;
            }
        }
        self.node_mut(removed.ingress)?.outgoing_demands.remove(&demand);
        self.node_mut(removed.egress)?.incoming_demands.remove(&demand);
        self.refresh(touched);
        Ok(removed)
    }

    pub fn remove_all_demands(&mut self, layer: LayerId) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        let demands = self.layer(layer)?.demands.clone();
        for d in demands.into_iter().rev() {
            self.remove_demand_internal(d)?;
        }
        info!(layer = %layer, "🗑️  删除本层全部需求");
        self.after_mutation();
        Ok(())
    }

    /// 设置提供流量；逐跳层会立即重新求解该需求
    #[tracing::instrument(skip(self))]
    pub fn set_offered_traffic(&mut self, demand: DemandId, offered_traffic: f64) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        let layer = self.demand(demand)?.layer;
        let offered = self.check_quantity("offered traffic", offered_traffic)?;
        self.demand_mut(demand)?.offered_traffic = offered;
        if self.layer(layer)?.routing_type == RoutingType::HopByHopRouting {
            self.update_hop_by_hop_demand(demand)?;
        }
        self.after_mutation();
        Ok(())
    }

    /// 把需求设为业务链请求：仅限源路由层，且需求尚无路由
    pub fn set_service_chain_sequence_of_resource_types(
        &mut self,
        demand: DemandId,
        resource_types: Vec<String>,
    ) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        let d = self.demand(demand)?;
        let layer = d.layer;
        if self.layer(layer)?.routing_type != RoutingType::SourceRouting {
            return Err(NetPlanError::WrongRoutingType {
                layer,
                expected: RoutingType::SourceRouting,
            });
        }
        if !d.routes.is_empty() {
            return Err(NetPlanError::InvalidArgument(format!(
                "demand {demand} already has routes; the resource sequence is fixed"
            )));
        }
        if resource_types.iter().any(String::is_empty) {
            return Err(NetPlanError::InvalidArgument("resource type must not be empty".into()));
        }
        debug!(demand = %demand, resource_types = ?resource_types, "设置业务链资源类型序列");
        self.demand_mut(demand)?.resource_type_sequence = resource_types;
        self.after_mutation();
        Ok(())
    }

    pub fn demand_offered_traffic_vector(&self, layer: LayerId) -> Result<Vec<f64>, NetPlanError> {
        Ok(self.demands_of(layer)?.map(Demand::offered_traffic).collect())
    }

    pub fn demand_carried_traffic_vector(&self, layer: LayerId) -> Result<Vec<f64>, NetPlanError> {
        Ok(self.demands_of(layer)?.map(Demand::carried_traffic).collect())
    }

    pub fn is_demand_blocked(&self, demand: DemandId) -> Result<bool, NetPlanError> {
        Ok(self.demand(demand)?.is_blocked(self.config.precision_factor))
    }

    /// 多于一条路由，或逐跳模式下某节点有多于一条承载流量的出链路
    pub fn is_demand_bifurcated(&self, demand: DemandId) -> Result<bool, NetPlanError> {
        let d = self.demand(demand)?;
        if self.layer(d.layer)?.routing_type == RoutingType::SourceRouting {
            return Ok(d.routes.len() > 1);
        }
        let tol = self.config.precision_factor;
        let mut out_count: BTreeMap<NodeId, usize> = BTreeMap::new();
        for (l, x) in &d.hop_by_hop_traffic {
            if *x > tol {
                *out_count.entry(self.link(*l)?.origin).or_default() += 1;
            }
        }
        Ok(out_count.values().any(|c| *c > 1))
    }

    /// 需求流量可能经历的最大传播时延
    ///
    /// 源路由：各路由时延的最大值。逐跳路由：承载流量的转发子图上的最长路径；
    /// 存在环路时为无穷大。
    pub fn worst_case_propagation_delay_ms(&self, demand: DemandId) -> Result<f64, NetPlanError> {
        let d = self.demand(demand)?;
        if self.layer(d.layer)?.routing_type == RoutingType::SourceRouting {
            let mut worst: f64 = 0.0;
            for r in &d.routes {
                worst = worst.max(self.route_propagation_delay_ms(*r)?);
            }
            return Ok(worst);
        }
        if d.routing_cycle_type != RoutingCycleType::Loopless {
            return Ok(f64::INFINITY);
        }

        let tol = self.config.precision_factor;
        let mut out: BTreeMap<NodeId, Vec<&Link>> = BTreeMap::new();
        for (l, x) in &d.hop_by_hop_traffic {
            if *x > tol {
                let link = self.link(*l)?;
                out.entry(link.origin).or_default().push(link);
            }
        }
        // 无环子图上自底向上的最长时延（逐条路径取运行最大值）
        fn longest(
            node: NodeId,
            egress: NodeId,
            out: &BTreeMap<NodeId, Vec<&Link>>,
            memo: &mut BTreeMap<NodeId, f64>,
        ) -> f64 {
            if node == egress {
                return 0.0;
            }
            if let Some(v) = memo.get(&node) {
                return *v;
            }
            let mut worst: f64 = 0.0;
            for link in out.get(&node).into_iter().flatten() {
                let via = link.propagation_delay_ms() + longest(link.destination, egress, out, memo);
                worst = worst.max(via);
            }
            memo.insert(node, worst);
            worst
        }
        let mut memo = BTreeMap::new();
        Ok(longest(d.ingress, d.egress, &out, &mut memo))
    }

    /// 需求所在层（仅 up 链路）的全部最小代价路径
    pub fn compute_shortest_path_routes<F>(
        &self,
        demand: DemandId,
        link_cost: F,
    ) -> Result<Vec<Vec<LinkId>>, NetPlanError>
    where
        F: Fn(&Link) -> f64,
    {
        let d = self.demand(demand)?;
        let candidates = self.candidate_links(d.layer, &link_cost)?;
        Ok(paths::all_shortest_paths(
            &candidates,
            d.ingress,
            d.egress,
            self.config.precision_factor,
        ))
    }

    /// 按需求的资源类型序列计算全部最小代价业务链
    pub fn compute_minimum_cost_service_chains<F, G>(
        &self,
        demand: DemandId,
        link_cost: F,
        resource_cost: G,
    ) -> Result<Vec<Vec<PathElement>>, NetPlanError>
    where
        F: Fn(&Link) -> f64,
        G: Fn(&Resource) -> f64,
    {
        let d = self.demand(demand)?;
        let candidates = self.candidate_links(d.layer, &link_cost)?;
        let resources: Vec<CandidateResource> = self
            .resource_order
            .iter()
            .map(|r| &self.resources[r])
            .filter(|r| !self.nodes_down.contains(&r.host_node))
            .map(|r| CandidateResource {
                id: r.resource_id(),
                host: r.host_node,
                resource_type: r.resource_type.clone(),
                cost: resource_cost(r),
            })
            .collect();
        Ok(paths::all_min_cost_service_chains(
            &candidates,
            &resources,
            &d.resource_type_sequence,
            d.ingress,
            d.egress,
            self.config.precision_factor,
        ))
    }

    fn candidate_links<F>(&self, layer: LayerId, link_cost: &F) -> Result<Vec<CandidateLink>, NetPlanError>
    where
        F: Fn(&Link) -> f64,
    {
        Ok(self
            .links_of(layer)?
            .filter(|l| self.link_usable(l))
            .map(|l| CandidateLink {
                id: l.link_id(),
                origin: l.origin,
                destination: l.destination,
                cost: link_cost(l),
            })
            .collect())
    }

    // ---------------------------------------------------------------------
    // 路由
    // ---------------------------------------------------------------------

    /// 校验路径：同层、首尾相接、从入口到出口，业务链需求还要求资源类型序列一致
    fn validate_route_path(
        &self,
        demand: DemandId,
        path: &[PathElement],
        resource_occupation: &BTreeMap<ResourceId, f64>,
    ) -> Result<(), NetPlanError> {
        let d = self.demand(demand)?;
        let layer = d.layer;
        if self.layer(layer)?.routing_type != RoutingType::SourceRouting {
            return Err(NetPlanError::WrongRoutingType {
                layer,
                expected: RoutingType::SourceRouting,
            });
        }
        if path.is_empty() {
            return Err(NetPlanError::InvalidPath("empty path".into()));
        }

        let mut at = d.ingress;
        let mut resource_types = Vec::new();
        for e in path {
            match *e {
                PathElement::Link(l) => {
                    let link = self.link(l)?;
                    self.ensure_in_layer(ElementKind::Link, l.0, link.layer, layer)?;
                    if link.origin != at {
                        return Err(NetPlanError::InvalidPath(format!("link {l} does not start at {at}")));
                    }
                    at = link.destination;
                }
                PathElement::Segment(s) => {
                    let seg = self.segment(s)?;
                    self.ensure_in_layer(ElementKind::ProtectionSegment, s.0, seg.layer, layer)?;
                    if seg.origin != at {
                        return Err(NetPlanError::InvalidPath(format!("segment {s} does not start at {at}")));
                    }
                    at = seg.destination;
                }
                PathElement::Resource(r) => {
                    let res = self.resource(r)?;
                    if res.host_node != at {
                        return Err(NetPlanError::InvalidPath(format!("resource {r} is not hosted at {at}")));
                    }
                    resource_types.push(res.resource_type.clone());
                }
            }
        }
        if at != d.egress {
            return Err(NetPlanError::InvalidPath(format!(
                "path ends at {at}, demand egress is {}",
                d.egress
            )));
        }
        if d.is_service_chain_request() && resource_types != d.resource_type_sequence {
            return Err(NetPlanError::InvalidPath(format!(
                "resource types {resource_types:?} do not match the service chain {:?}",
                d.resource_type_sequence
            )));
        }
        for (r, value) in resource_occupation {
            if !path.contains(&PathElement::Resource(*r)) {
                return Err(NetPlanError::InvalidPath(format!("resource {r} is not traversed by the path")));
            }
            if !value.is_finite() || *value < 0.0 {
                return Err(NetPlanError::InvalidQuantity {
                    what: "resource occupation",
                    value: *value,
                });
            }
        }
        Ok(())
    }

    fn attach_route_path(&mut self, route: RouteId, start: NodeId, path: &[PathElement]) {
        for e in path {
            let counter = match e {
                PathElement::Link(l) => self.links.get_mut(l).map(|x| &mut x.traversing_routes),
                PathElement::Segment(s) => self.segments.get_mut(s).map(|x| &mut x.traversing_routes),
                PathElement::Resource(r) => self.resources.get_mut(r).map(|x| &mut x.traversing_routes),
            };
            if let Some(counter) = counter {
                *counter.entry(route).or_default() += 1;
            }
        }
        for n in self.path_nodes(start, path) {
            if let Some(node) = self.nodes.get_mut(&n) {
                node.associated_routes.insert(route);
            }
        }
    }

    fn detach_route_path(&mut self, route: RouteId, start: NodeId, path: &[PathElement]) {
        for n in self.path_nodes(start, path) {
            if let Some(node) = self.nodes.get_mut(&n) {
                node.associated_routes.remove(&route);
            }
        }
        for e in path {
            let counter = match e {
                PathElement::Link(l) => self.links.get_mut(l).map(|x| &mut x.traversing_routes),
                PathElement::Segment(s) => self.segments.get_mut(s).map(|x| &mut x.traversing_routes),
                PathElement::Resource(r) => self.resources.get_mut(r).map(|x| &mut x.traversing_routes),
            };
            if let Some(counter) = counter {
                if let Some(count) = counter.get_mut(&route) {
                    *count -= 1;
                    if *count == 0 {
                        counter.remove(&route);
                    }
                }
            }
        }
    }

    /// 添加显式路由；`occupied_capacity` 是每次经过一条链路时占用的容量
    #[tracing::instrument(skip(self, path, resource_occupation, attributes))]
    pub fn add_route(
        &mut self,
        demand: DemandId,
        carried_traffic: f64,
        occupied_capacity: f64,
        path: Vec<PathElement>,
        resource_occupation: BTreeMap<ResourceId, f64>,
        attributes: BTreeMap<String, String>,
    ) -> Result<RouteId, NetPlanError> {
        self.ensure_modifiable()?;
        let id = self.insert_route(
            demand,
            carried_traffic,
            occupied_capacity,
            path,
            resource_occupation,
            attributes,
        )?;
        debug!(route = %id, demand = %demand, carried_traffic, "➕ 添加路由");
        self.after_mutation();
        Ok(id)
    }

    pub(crate) fn insert_route(
        &mut self,
        demand: DemandId,
        carried_traffic: f64,
        occupied_capacity: f64,
        path: Vec<PathElement>,
        resource_occupation: BTreeMap<ResourceId, f64>,
        attributes: BTreeMap<String, String>,
    ) -> Result<RouteId, NetPlanError> {
        self.validate_route_path(demand, &path, &resource_occupation)?;
        let carried = self.check_quantity("carried traffic", carried_traffic)?;
        let occupied = self.check_quantity("occupied capacity", occupied_capacity)?;
        let d = self.demand(demand)?;
        let (layer, ingress) = (d.layer, d.ingress);

        let raw = self.alloc_id(ElementKind::Route);
        let id = RouteId(raw);
        let meta = ElementMeta::new(raw, self.layer(layer)?.routes.len(), attributes);
        let resource_occupation = resource_occupation
            .into_iter()
            .map(|(r, v)| (r, self.config.round_to_zero(v)))
            .collect();
        self.routes.insert(
            id,
            Route {
                meta,
                layer,
                demand,
                path: path.clone(),
                initial_path: path.clone(),
                carried_traffic_if_not_failing: carried,
                occupied_capacity_if_not_failing: occupied,
                resource_occupation_if_not_failing: resource_occupation,
                backup_segments: BTreeSet::new(),
                is_down: false,
            },
        );
        self.layer_mut(layer)?.routes.push(id);
        self.demand_mut(demand)?.routes.insert(id);
        self.attach_route_path(id, ingress, &path);

        let mut touched = Touched::default();
        touched.routes.insert(id);
        self.refresh(touched);
        Ok(id)
    }

    #[tracing::instrument(skip(self))]
    pub fn remove_route(&mut self, route: RouteId) -> Result<Route, NetPlanError> {
        self.ensure_modifiable()?;
        self.route(route)?;
        let removed = self.remove_route_internal(route)?;
        debug!(route = %route, "🗑️  删除路由");
        self.after_mutation();
        Ok(removed)
    }

    pub(crate) fn remove_route_internal(&mut self, route: RouteId) -> Result<Route, NetPlanError> {
        let r = self.route(route)?;
        let (layer, demand) = (r.layer, r.demand);
        let ingress = self.demand(demand)?.ingress;
        let path = r.path.clone();
        self.detach_route_path(route, ingress, &path);

        let removed = self.routes.remove(&route).ok_or(not_found(ElementKind::Route, route.0))?;
        self.element_kinds.remove(&route.0);
        for s in &removed.backup_segments {
            if let Some(seg) = self.segments.get_mut(s) {
                seg.backup_of_routes.remove(&route);
            }
        }
        self.demand_mut(demand)?.routes.remove(&route);
        let lay = self.layer_mut(layer)?;
        let pos = remove_from_order(&mut lay.routes, route);
        let shifted: Vec<RouteId> = lay.routes[pos..].to_vec();
        for (i, id) in shifted.into_iter().enumerate() {
            if let Some(r) = self.routes.get_mut(&id) {
                r.meta.index = pos + i;
            }
        }

        let mut touched = Touched::default();
        touched.add_path(&path);
        touched.demands.insert(demand);
        self.refresh(touched);
        Ok(removed)
    }

    pub fn remove_all_routes(&mut self, layer: LayerId) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        let routes = self.layer(layer)?.routes.clone();
        for r in routes.into_iter().rev() {
            self.remove_route_internal(r)?;
        }
        info!(layer = %layer, "🗑️  删除本层全部路由");
        self.after_mutation();
        Ok(())
    }

    /// 设置路由若无故障时的承载流量与每次经过链路的占用容量
    #[tracing::instrument(skip(self))]
    pub fn set_route_carried_traffic(
        &mut self,
        route: RouteId,
        carried_traffic: f64,
        occupied_capacity: f64,
    ) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        self.route(route)?;
        let carried = self.check_quantity("carried traffic", carried_traffic)?;
        let occupied = self.check_quantity("occupied capacity", occupied_capacity)?;
        let r = self.route_mut(route)?;
        r.carried_traffic_if_not_failing = carried;
        r.occupied_capacity_if_not_failing = occupied;
        let mut touched = Touched::default();
        touched.routes.insert(route);
        self.refresh(touched);
        self.after_mutation();
        Ok(())
    }

    /// 设置每次经过资源时的占用量
    pub fn set_route_resource_occupation(
        &mut self,
        route: RouteId,
        resource_occupation: BTreeMap<ResourceId, f64>,
    ) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        let r = self.route(route)?;
        self.validate_route_path(r.demand, &r.path, &resource_occupation)?;
        let occupation = resource_occupation
            .into_iter()
            .map(|(r, v)| (r, self.config.round_to_zero(v)))
            .collect();
        self.route_mut(route)?.resource_occupation_if_not_failing = occupation;
        let mut touched = Touched::default();
        touched.routes.insert(route);
        self.refresh(touched);
        self.after_mutation();
        Ok(())
    }

    /// 改路：先释放旧路径的全部占用，再装入新路径
    #[tracing::instrument(skip(self, path))]
    pub fn set_route_path(&mut self, route: RouteId, path: Vec<PathElement>) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        self.reroute(route, path, None)?;
        self.after_mutation();
        Ok(())
    }

    pub fn set_route_carried_traffic_and_path(
        &mut self,
        route: RouteId,
        carried_traffic: f64,
        occupied_capacity: f64,
        path: Vec<PathElement>,
    ) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        let carried = self.check_quantity("carried traffic", carried_traffic)?;
        let occupied = self.check_quantity("occupied capacity", occupied_capacity)?;
        self.reroute(route, path, Some((carried, occupied)))?;
        self.after_mutation();
        Ok(())
    }

    fn reroute(
        &mut self,
        route: RouteId,
        path: Vec<PathElement>,
        traffic: Option<(f64, f64)>,
    ) -> Result<(), NetPlanError> {
        let r = self.route(route)?;
        let demand = r.demand;
        // 资源占用只保留新路径仍然经过的资源
        let occupation: BTreeMap<ResourceId, f64> = r
            .resource_occupation_if_not_failing
            .iter()
            .filter(|(res, _)| path.contains(&PathElement::Resource(**res)))
            .map(|(res, v)| (*res, *v))
            .collect();
        self.validate_route_path(demand, &path, &occupation)?;
        let ingress = self.demand(demand)?.ingress;
        let old_path = r.path.clone();

        self.detach_route_path(route, ingress, &old_path);
        self.attach_route_path(route, ingress, &path);
        let r = self.route_mut(route)?;
        r.path = path;
        r.resource_occupation_if_not_failing = occupation;
        if let Some((carried, occupied)) = traffic {
            r.carried_traffic_if_not_failing = carried;
            r.occupied_capacity_if_not_failing = occupied;
        }

        let mut touched = Touched::default();
        touched.add_path(&old_path);
        touched.routes.insert(route);
        self.refresh(touched);
        debug!(route = %route, "路由改路");
        Ok(())
    }

    /// 回到创建时的路径；原路径中的元素被删除过则失败
    pub fn revert_route_to_initial_path(&mut self, route: RouteId) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        let initial = self.route(route)?.initial_path.clone();
        let missing = initial.iter().find(|e| match e {
            PathElement::Link(l) => !self.links.contains_key(l),
            PathElement::Segment(s) => !self.segments.contains_key(s),
            PathElement::Resource(r) => !self.resources.contains_key(r),
        });
        if let Some(e) = missing {
            return Err(NetPlanError::RevertImpossible {
                route,
                reason: format!("{e:?} was removed"),
            });
        }
        self.reroute(route, initial, None)?;
        self.after_mutation();
        Ok(())
    }

    /// 登记备份保护段：保护段的两端必须都在路由的节点序列上
    pub fn add_backup_segment_to_route(&mut self, route: RouteId, segment: SegmentId) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        let r = self.route(route)?;
        let seg = self.segment(segment)?;
        self.ensure_in_layer(ElementKind::ProtectionSegment, segment.0, seg.layer, r.layer)?;
        let nodes = self.route_node_sequence(route)?;
        if !nodes.contains(&seg.origin) || !nodes.contains(&seg.destination) {
            return Err(NetPlanError::InvalidArgument(format!(
                "segment {segment} end nodes are not on route {route}"
            )));
        }
        self.route_mut(route)?.backup_segments.insert(segment);
        self.segment_mut(segment)?.backup_of_routes.insert(route);
        self.after_mutation();
        Ok(())
    }

    /// 取消备份登记；路由当前正经过该保护段时不允许
    pub fn remove_backup_segment_from_route(
        &mut self,
        route: RouteId,
        segment: SegmentId,
    ) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        let r = self.route(route)?;
        self.segment(segment)?;
        if r.path.contains(&PathElement::Segment(segment)) {
            return Err(NetPlanError::InvalidArgument(format!(
                "route {route} currently traverses segment {segment}"
            )));
        }
        self.route_mut(route)?.backup_segments.remove(&segment);
        self.segment_mut(segment)?.backup_of_routes.remove(&route);
        self.after_mutation();
        Ok(())
    }

    pub fn route_node_sequence(&self, route: RouteId) -> Result<Vec<NodeId>, NetPlanError> {
        let r = self.route(route)?;
        let ingress = self.demand(r.demand)?.ingress;
        Ok(self.path_nodes(ingress, &r.path))
    }

    /// 保护段展开后的真实链路序列
    pub fn route_real_links(&self, route: RouteId) -> Result<Vec<LinkId>, NetPlanError> {
        Ok(self.path_real_links(&self.route(route)?.path))
    }

    pub fn route_length_km(&self, route: RouteId) -> Result<f64, NetPlanError> {
        Ok(self
            .route_real_links(route)?
            .iter()
            .filter_map(|l| self.links.get(l))
            .map(|l| l.length_km)
            .sum())
    }

    pub fn route_propagation_delay_ms(&self, route: RouteId) -> Result<f64, NetPlanError> {
        Ok(self
            .route_real_links(route)?
            .iter()
            .filter_map(|l| self.links.get(l))
            .map(Link::propagation_delay_ms)
            .sum())
    }

    pub fn route_has_loops(&self, route: RouteId) -> Result<bool, NetPlanError> {
        let r = self.route(route)?;
        let ingress = self.demand(r.demand)?.ingress;
        Ok(self.path_has_loops(ingress, &r.path))
    }

    // ---------------------------------------------------------------------
    // 保护段
    // ---------------------------------------------------------------------

    /// 添加保护段：同层、首尾相接的链路序列，仅限源路由层
    #[tracing::instrument(skip(self, attributes))]
    pub fn add_protection_segment(
        &mut self,
        links: Vec<LinkId>,
        reserved_capacity: f64,
        attributes: BTreeMap<String, String>,
    ) -> Result<SegmentId, NetPlanError> {
        self.ensure_modifiable()?;
        let Some(first) = links.first() else {
            return Err(NetPlanError::InvalidPath("empty protection segment".into()));
        };
        let first = self.link(*first)?;
        let (layer, origin) = (first.layer, first.origin);
        if self.layer(layer)?.routing_type != RoutingType::SourceRouting {
            return Err(NetPlanError::WrongRoutingType {
                layer,
                expected: RoutingType::SourceRouting,
            });
        }
        let mut at = origin;
        for l in &links {
            let link = self.link(*l)?;
            self.ensure_in_layer(ElementKind::Link, l.0, link.layer, layer)?;
            if link.origin != at {
                return Err(NetPlanError::InvalidPath(format!("link {l} does not start at {at}")));
            }
            at = link.destination;
        }
        let reserved = self.check_quantity("reserved capacity", reserved_capacity)?;

        let raw = self.alloc_id(ElementKind::ProtectionSegment);
        let id = SegmentId(raw);
        let meta = ElementMeta::new(raw, self.layer(layer)?.segments.len(), attributes);
        for l in &links {
            *self.link_mut(*l)?.traversing_segments.entry(id).or_default() += 1;
        }
        let path: Vec<PathElement> = links.iter().copied().map(PathElement::Link).collect();
        for n in self.path_nodes(origin, &path) {
            self.node_mut(n)?.associated_segments.insert(id);
        }
        self.segments.insert(
            id,
            ProtectionSegment {
                meta,
                layer,
                links,
                origin,
                destination: at,
                reserved_capacity: reserved,
                backup_of_routes: BTreeSet::new(),
                traversing_routes: BTreeMap::new(),
                carried_traffic: 0.0,
                is_down: false,
            },
        );
        self.layer_mut(layer)?.segments.push(id);

        let mut touched = Touched::default();
        touched.segments.insert(id);
        self.refresh(touched);
        debug!(segment = %id, layer = %layer, reserved, "➕ 添加保护段");
        self.after_mutation();
        Ok(id)
    }

    /// 删除保护段；当前路径经过它的路由一并删除
    #[tracing::instrument(skip(self))]
    pub fn remove_segment(&mut self, segment: SegmentId) -> Result<ProtectionSegment, NetPlanError> {
        self.ensure_modifiable()?;
        self.segment(segment)?;
        let removed = self.remove_segment_internal(segment)?;
        debug!(segment = %segment, "🗑️  删除保护段");
        self.after_mutation();
        Ok(removed)
    }

    pub(crate) fn remove_segment_internal(&mut self, segment: SegmentId) -> Result<ProtectionSegment, NetPlanError> {
        let s = self.segment(segment)?;
        let layer = s.layer;
        let routes: Vec<_> = s.traversing_routes.keys().copied().collect();
        for r in routes {
            if self.routes.contains_key(&r) {
                self.remove_route_internal(r)?;
            }
        }

        let removed = self
            .segments
            .remove(&segment)
            .ok_or(not_found(ElementKind::ProtectionSegment, segment.0))?;
        self.element_kinds.remove(&segment.0);
        for r in &removed.backup_of_routes {
            if let Some(route) = self.routes.get_mut(r) {
                route.backup_segments.remove(&segment);
            }
        }
        for l in &removed.links {
            if let Some(link) = self.links.get_mut(l) {
                link.traversing_segments.remove(&segment);
            }
        }
        let path: Vec<PathElement> = removed.links.iter().copied().map(PathElement::Link).collect();
        for n in self.path_nodes(removed.origin, &path) {
            if let Some(node) = self.nodes.get_mut(&n) {
                node.associated_segments.remove(&segment);
            }
        }
        let lay = self.layer_mut(layer)?;
        let pos = remove_from_order(&mut lay.segments, segment);
        let shifted: Vec<SegmentId> = lay.segments[pos..].to_vec();
        for (i, id) in shifted.into_iter().enumerate() {
            if let Some(s) = self.segments.get_mut(&id) {
                s.meta.index = pos + i;
            }
        }

        let mut touched = Touched::default();
        touched.links.extend(removed.links.iter().copied());
        self.refresh(touched);
        Ok(removed)
    }

    pub fn remove_all_segments(&mut self, layer: LayerId) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        let segments = self.layer(layer)?.segments.clone();
        for s in segments.into_iter().rev() {
            if self.segments.contains_key(&s) {
                self.remove_segment_internal(s)?;
            }
        }
        info!(layer = %layer, "🗑️  删除本层全部保护段");
        self.after_mutation();
        Ok(())
    }

    pub fn set_segment_reserved_capacity(&mut self, segment: SegmentId, reserved_capacity: f64) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        self.segment(segment)?;
        let reserved = self.check_quantity("reserved capacity", reserved_capacity)?;
        self.segment_mut(segment)?.reserved_capacity = reserved;
        let mut touched = Touched::default();
        touched.segments.insert(segment);
        self.refresh(touched);
        self.after_mutation();
        Ok(())
    }

    /// 删除本层全部单播路由信息：源路由层删除路由与保护段，逐跳层清空转发规则
    #[tracing::instrument(skip(self))]
    pub fn remove_all_unicast_routing_information(&mut self, layer: LayerId) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        match self.layer(layer)?.routing_type {
            RoutingType::SourceRouting => {
                let routes = self.layer(layer)?.routes.clone();
                for r in routes.into_iter().rev() {
                    self.remove_route_internal(r)?;
                }
                let segments = self.layer(layer)?.segments.clone();
                for s in segments.into_iter().rev() {
                    self.remove_segment_internal(s)?;
                }
            }
            RoutingType::HopByHopRouting => {
                self.layer_mut(layer)?.forwarding_rules.clear();
                self.update_hop_by_hop_layer(layer)?;
            }
        }
        info!(layer = %layer, "🗑️  删除本层全部路由信息");
        self.after_mutation();
        Ok(())
    }
}
