//! 路由状态维护
//!
//! - 缓存刷新：任何源路由修改都记录受影响的路由/保护段/链路/需求/资源，
//!   然后按依赖顺序重新汇总（保护段 down 状态 -> 路由 down 状态 -> 保护段流量 ->
//!   链路 -> 资源 -> 需求 -> 耦合链路容量）。
//! - 逐跳路由：转发规则的校验与提交、按需求重新求解。
//! - 路由模式转换与需求×链路矩阵的读写。

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, trace};

use super::demand::RoutingCycleType;
use super::error::NetPlanError;
use super::hop_by_hop::{self, ForwardingEdge, HopByHopOutcome};
use super::id::{DemandId, ElementKind, LayerId, LinkId, NodeId, PathElement, ResourceId, RouteId, SegmentId};
use super::layer::RoutingType;
use super::link::Link;
use super::plan::NetPlan;
use super::segment::ProtectionSegment;
use crate::paths::decompose_link_flows;

/// 一次修改波及的元素集合
#[derive(Debug, Default, Clone)]
pub(crate) struct Touched {
    pub routes: BTreeSet<RouteId>,
    pub segments: BTreeSet<SegmentId>,
    pub links: BTreeSet<LinkId>,
    pub demands: BTreeSet<DemandId>,
    pub resources: BTreeSet<ResourceId>,
}

impl Touched {
    pub(crate) fn add_path(&mut self, path: &[PathElement]) {
        for e in path {
            match *e {
                PathElement::Link(l) => {
                    self.links.insert(l);
                }
                PathElement::Segment(s) => {
                    self.segments.insert(s);
                }
                PathElement::Resource(r) => {
                    self.resources.insert(r);
                }
            }
        }
    }
}

/// 链路缓存汇总值
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct LinkAggregates {
    pub carried: f64,
    pub occupied: f64,
    pub carried_in_segments: f64,
    pub reserved: f64,
}

impl NetPlan {
    // ---------------------------------------------------------------------
    // 派生状态
    // ---------------------------------------------------------------------

    pub(crate) fn segment_is_down(&self, seg: &ProtectionSegment) -> bool {
        seg.links
            .iter()
            .any(|l| self.links.get(l).is_none_or(|link| !self.link_usable(link)))
    }

    pub(crate) fn path_is_down(&self, path: &[PathElement]) -> bool {
        path.iter().any(|e| match e {
            PathElement::Link(l) => self.links.get(l).is_none_or(|link| !self.link_usable(link)),
            PathElement::Segment(s) => self
                .segments
                .get(s)
                .is_none_or(|seg| self.segment_is_down(seg)),
            PathElement::Resource(r) => self
                .resources
                .get(r)
                .is_none_or(|res| self.nodes_down.contains(&res.host_node)),
        })
    }

    /// 从 `start` 出发沿路径经过的节点序列（含起点）
    pub(crate) fn path_nodes(&self, start: NodeId, path: &[PathElement]) -> Vec<NodeId> {
        let mut nodes = vec![start];
        for e in path {
            match e {
                PathElement::Link(l) => {
                    if let Some(link) = self.links.get(l) {
                        nodes.push(link.destination);
                    }
                }
                PathElement::Segment(s) => {
                    if let Some(seg) = self.segments.get(s) {
                        for l in &seg.links {
                            if let Some(link) = self.links.get(l) {
                                nodes.push(link.destination);
                            }
                        }
                    }
                }
                PathElement::Resource(_) => {}
            }
        }
        nodes
    }

    /// 把保护段展开成真实链路
    pub(crate) fn path_real_links(&self, path: &[PathElement]) -> Vec<LinkId> {
        let mut links = Vec::new();
        for e in path {
            match e {
                PathElement::Link(l) => links.push(*l),
                PathElement::Segment(s) => {
                    if let Some(seg) = self.segments.get(s) {
                        links.extend(seg.links.iter().copied());
                    }
                }
                PathElement::Resource(_) => {}
            }
        }
        links
    }

    pub(crate) fn path_has_loops(&self, start: NodeId, path: &[PathElement]) -> bool {
        let mut seen = BTreeSet::new();
        self.path_nodes(start, path).into_iter().any(|n| !seen.insert(n))
    }

    pub(crate) fn link_aggregates(&self, link: &Link) -> LinkAggregates {
        let mut agg = LinkAggregates::default();
        for (r, count) in &link.traversing_routes {
            if let Some(route) = self.routes.get(r) {
                agg.carried += *count as f64 * route.carried_traffic();
                agg.occupied += *count as f64 * route.occupied_capacity();
            }
        }
        for x in link.hop_by_hop_traffic.values() {
            agg.carried += x;
            agg.occupied += x;
        }
        for (s, count) in &link.traversing_segments {
            if let Some(seg) = self.segments.get(s) {
                agg.carried_in_segments += *count as f64 * seg.carried_traffic;
                agg.reserved += *count as f64 * seg.reserved_capacity();
            }
        }
        let cfg = &self.config;
        LinkAggregates {
            carried: cfg.round_to_zero(agg.carried),
            occupied: cfg.round_to_zero(agg.occupied),
            carried_in_segments: cfg.round_to_zero(agg.carried_in_segments),
            reserved: cfg.round_to_zero(agg.reserved),
        }
    }

    pub(crate) fn segment_carried(&self, seg: &ProtectionSegment) -> f64 {
        let total: f64 = seg
            .traversing_routes
            .iter()
            .filter_map(|(r, count)| self.routes.get(r).map(|route| *count as f64 * route.carried_traffic()))
            .sum();
        self.config.round_to_zero(total)
    }

    pub(crate) fn resource_occupied(&self, res: ResourceId) -> f64 {
        let Some(resource) = self.resources.get(&res) else {
            return 0.0;
        };
        let total: f64 = resource
            .traversing_routes
            .iter()
            .filter_map(|(r, count)| {
                self.routes
                    .get(r)
                    .map(|route| *count as f64 * route.resource_occupation(res))
            })
            .sum();
        self.config.round_to_zero(total)
    }

    /// 源路由层需求的承载流量与环路分类
    pub(crate) fn source_routing_demand_state(&self, d: DemandId) -> (f64, RoutingCycleType) {
        let Some(demand) = self.demands.get(&d) else {
            return (0.0, RoutingCycleType::Loopless);
        };
        let mut carried = 0.0;
        let mut loops = false;
        for r in &demand.routes {
            if let Some(route) = self.routes.get(r) {
                carried += route.carried_traffic();
                loops |= self.path_has_loops(demand.ingress, &route.path);
            }
        }
        let kind = if loops {
            RoutingCycleType::OpenCycles
        } else {
            RoutingCycleType::Loopless
        };
        (self.config.round_to_zero(carried), kind)
    }

    /// 按依赖顺序重新汇总受影响元素的缓存
    pub(crate) fn refresh(&mut self, mut touched: Touched) {
        trace!(
            routes = touched.routes.len(),
            segments = touched.segments.len(),
            links = touched.links.len(),
            "刷新缓存"
        );

        for s in touched.segments.clone() {
            let Some(seg) = self.segments.get(&s) else {
                continue;
            };
            let down = self.segment_is_down(seg);
            touched.links.extend(seg.links.iter().copied());
            touched.routes.extend(seg.traversing_routes.keys().copied());
            if let Some(seg) = self.segments.get_mut(&s) {
                seg.is_down = down;
            }
        }

        for r in touched.routes.clone() {
            let Some(route) = self.routes.get(&r) else {
                continue;
            };
            let down = self.path_is_down(&route.path);
            let demand = route.demand;
            let path = route.path.clone();
            touched.add_path(&path);
            touched.demands.insert(demand);
            if let Some(route) = self.routes.get_mut(&r) {
                route.is_down = down;
            }
        }

        for s in touched.segments.clone() {
            let Some(seg) = self.segments.get(&s) else {
                continue;
            };
            let carried = self.segment_carried(seg);
            touched.links.extend(seg.links.iter().copied());
            if let Some(seg) = self.segments.get_mut(&s) {
                seg.carried_traffic = carried;
            }
        }

        for l in &touched.links {
            let Some(link) = self.links.get(l) else {
                continue;
            };
            let agg = self.link_aggregates(link);
            if let Some(link) = self.links.get_mut(l) {
                link.carried_traffic = agg.carried;
                link.occupied_capacity = agg.occupied;
                link.carried_traffic_in_segments = agg.carried_in_segments;
                link.reserved_for_protection = agg.reserved;
            }
        }

        for res in &touched.resources {
            let occupied = self.resource_occupied(*res);
            if let Some(resource) = self.resources.get_mut(res) {
                resource.occupied_capacity = occupied;
            }
        }

        for d in &touched.demands {
            let Some(demand) = self.demands.get(d) else {
                continue;
            };
            let source_routing = self
                .layers
                .get(&demand.layer)
                .is_some_and(|l| l.routing_type == RoutingType::SourceRouting);
            if !source_routing {
                continue;
            }
            let (carried, kind) = self.source_routing_demand_state(*d);
            if let Some(demand) = self.demands.get_mut(d) {
                demand.carried_traffic = carried;
                demand.routing_cycle_type = kind;
            }
            self.sync_coupled_link_capacity(*d);
        }
    }

    /// 耦合链路的容量始终等于下层需求的承载流量
    pub(crate) fn sync_coupled_link_capacity(&mut self, d: DemandId) {
        let Some(demand) = self.demands.get(&d) else {
            return;
        };
        let (Some(link), carried) = (demand.coupled_link, demand.carried_traffic) else {
            return;
        };
        if let Some(link) = self.links.get_mut(&link) {
            if link.capacity != carried {
                trace!(link = %link.link_id(), capacity = carried, "同步耦合链路容量");
                link.capacity = carried;
            }
        }
    }

    // ---------------------------------------------------------------------
    // 逐跳路由求解
    // ---------------------------------------------------------------------

    /// 求解一个需求的逐跳路由；`consider_failures` 为 false 时视所有元素为 up
    pub(crate) fn solve_hop_by_hop(
        &self,
        d: DemandId,
        consider_failures: bool,
    ) -> Result<HopByHopOutcome, NetPlanError> {
        let demand = self.demand(d)?;
        let layer = self.layer(demand.layer)?;
        let node_index = |n: NodeId| self.nodes.get(&n).map(|node| node.meta.index);
        let (Some(ingress), Some(egress)) = (node_index(demand.ingress), node_index(demand.egress)) else {
            return Err(NetPlanError::InvalidArgument(format!("demand {d} has dangling end nodes")));
        };

        let mut edges = Vec::new();
        for (&(_, l), &ratio) in layer.forwarding_rules.range((d, LinkId(0))..=(d, LinkId(u64::MAX))) {
            let Some(link) = self.links.get(&l) else {
                continue;
            };
            if consider_failures && !self.link_usable(link) {
                continue;
            }
            let (Some(from), Some(to)) = (node_index(link.origin), node_index(link.destination)) else {
                continue;
            };
            edges.push(ForwardingEdge {
                link: l,
                from,
                to,
                ratio,
            });
        }

        Ok(hop_by_hop::solve_demand(
            self.node_order.len(),
            ingress,
            egress,
            demand.offered_traffic,
            &edges,
            self.config.precision_factor,
        ))
    }

    /// 根据转发规则与当前故障状态重新计算一个需求的 x_de、承载流量与环路分类
    pub(crate) fn update_hop_by_hop_demand(&mut self, d: DemandId) -> Result<(), NetPlanError> {
        let outcome = self.solve_hop_by_hop(d, true)?;
        let mut touched = Touched::default();

        let old: Vec<LinkId> = self.demand(d)?.hop_by_hop_traffic.keys().copied().collect();
        for l in old {
            if let Some(link) = self.links.get_mut(&l) {
                link.hop_by_hop_traffic.remove(&d);
            }
            touched.links.insert(l);
        }

        let mut traffic = BTreeMap::new();
        for (l, x) in outcome.link_traffic {
            let x = self.config.round_to_zero(x);
            if x > 0.0 {
                traffic.insert(l, x);
            }
        }
        for (l, x) in &traffic {
            self.link_mut(*l)?.hop_by_hop_traffic.insert(d, *x);
            touched.links.insert(*l);
        }

        let carried = self.config.round_to_zero(outcome.carried_traffic);
        let demand = self.demand_mut(d)?;
        demand.hop_by_hop_traffic = traffic;
        demand.carried_traffic = carried;
        demand.routing_cycle_type = outcome.cycle_type;
        trace!(demand = %d, carried, cycle = ?outcome.cycle_type, "逐跳路由求解完成");

        self.sync_coupled_link_capacity(d);
        self.refresh(touched);
        Ok(())
    }

    pub(crate) fn update_hop_by_hop_layer(&mut self, layer: LayerId) -> Result<(), NetPlanError> {
        let demands = self.layer(layer)?.demands.clone();
        debug!(layer = %layer, demands = demands.len(), "重新求解逐跳路由层");
        for d in demands {
            self.update_hop_by_hop_demand(d)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // 转发规则
    // ---------------------------------------------------------------------

    fn ensure_routing_type(&self, layer: LayerId, expected: RoutingType) -> Result<(), NetPlanError> {
        if self.layer(layer)?.routing_type == expected {
            Ok(())
        } else {
            Err(NetPlanError::WrongRoutingType { layer, expected })
        }
    }

    /// 校验一整层的候选转发规则：比例在 [0,1]，链路与需求同层，出口节点不转发，
    /// 每个 (需求, 节点) 的出比例之和不超过 1 + 容差
    fn validate_forwarding_rules(
        &self,
        layer: LayerId,
        rules: &BTreeMap<(DemandId, LinkId), f64>,
    ) -> Result<(), NetPlanError> {
        let tol = self.config.precision_factor;
        let mut out_sum: BTreeMap<(DemandId, NodeId), f64> = BTreeMap::new();
        for (&(d, l), &ratio) in rules {
            if !(0.0..=1.0 + tol).contains(&ratio) || !ratio.is_finite() {
                return Err(NetPlanError::InvalidForwardingRule(format!(
                    "ratio {ratio} for ({d}, {l}) is outside [0, 1]"
                )));
            }
            let demand = self.demand(d)?;
            let link = self.link(l)?;
            self.ensure_in_layer(ElementKind::Demand, d.0, demand.layer, layer)?;
            self.ensure_in_layer(ElementKind::Link, l.0, link.layer, layer)?;
            if ratio > 0.0 && link.origin == demand.egress {
                return Err(NetPlanError::InvalidForwardingRule(format!(
                    "link {l} leaves the egress node of demand {d}"
                )));
            }
            *out_sum.entry((d, link.origin)).or_default() += ratio;
        }
        if let Some(((d, n), sum)) = out_sum.into_iter().find(|(_, sum)| *sum > 1.0 + tol) {
            return Err(NetPlanError::InvalidForwardingRule(format!(
                "ratios of demand {d} leaving node {n} sum to {sum} > 1"
            )));
        }
        Ok(())
    }

    fn commit_forwarding_rules(
        &mut self,
        layer: LayerId,
        rules: BTreeMap<(DemandId, LinkId), f64>,
        affected: BTreeSet<DemandId>,
    ) -> Result<(), NetPlanError> {
        let tol = self.config.precision_factor;
        let rules = rules
            .into_iter()
            .filter(|(_, ratio)| *ratio > 0.0)
            .map(|(k, ratio)| (k, ratio.min(1.0 + tol)))
            .collect();
        self.layer_mut(layer)?.forwarding_rules = rules;
        for d in affected {
            self.update_hop_by_hop_demand(d)?;
        }
        Ok(())
    }

    /// 设置单条转发规则（比例为 0 即删除）
    #[tracing::instrument(skip(self))]
    pub fn set_forwarding_rule(&mut self, demand: DemandId, link: LinkId, ratio: f64) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        let layer = self.demand(demand)?.layer;
        self.ensure_routing_type(layer, RoutingType::HopByHopRouting)?;
        let mut rules = self.layer(layer)?.forwarding_rules.clone();
        rules.insert((demand, link), ratio);
        self.validate_forwarding_rules(layer, &rules)?;
        self.commit_forwarding_rules(layer, rules, BTreeSet::from([demand]))?;
        debug!(demand = %demand, link = %link, ratio, "设置转发规则");
        self.after_mutation();
        Ok(())
    }

    /// 批量设置转发规则；`replace_previous_rules` 为 true 时先清空涉及需求的旧规则
    #[tracing::instrument(skip(self, rules), fields(rules = rules.len()))]
    pub fn set_forwarding_rules(
        &mut self,
        layer: LayerId,
        rules: &[(DemandId, LinkId, f64)],
        replace_previous_rules: bool,
    ) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        self.ensure_routing_type(layer, RoutingType::HopByHopRouting)?;
        let affected: BTreeSet<DemandId> = rules.iter().map(|(d, _, _)| *d).collect();
        let mut staged = self.layer(layer)?.forwarding_rules.clone();
        if replace_previous_rules {
            staged.retain(|(d, _), _| !affected.contains(d));
        }
        for &(d, l, ratio) in rules {
            staged.insert((d, l), ratio);
        }
        self.validate_forwarding_rules(layer, &staged)?;
        self.commit_forwarding_rules(layer, staged, affected)?;
        self.after_mutation();
        Ok(())
    }

    /// 删除一个需求的全部转发规则
    pub fn remove_forwarding_rules_of_demand(&mut self, demand: DemandId) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        let layer = self.demand(demand)?.layer;
        self.ensure_routing_type(layer, RoutingType::HopByHopRouting)?;
        let mut staged = self.layer(layer)?.forwarding_rules.clone();
        staged.retain(|(d, _), _| *d != demand);
        self.commit_forwarding_rules(layer, staged, BTreeSet::from([demand]))?;
        self.after_mutation();
        Ok(())
    }

    /// 需求×链路的转发比例矩阵（行列按 index 排列）
    pub fn forwarding_rule_matrix(&self, layer: LayerId) -> Result<Vec<Vec<f64>>, NetPlanError> {
        let l = self.layer(layer)?;
        let mut f = vec![vec![0.0; l.links.len()]; l.demands.len()];
        for (&(d, e), &ratio) in &l.forwarding_rules {
            let row = self.demand(d)?.meta.index;
            let col = self.link(e)?.meta.index;
            f[row][col] = ratio;
        }
        Ok(f)
    }

    /// 需求×链路的承载流量矩阵 x_de
    pub fn link_traffic_matrix(&self, layer: LayerId) -> Result<Vec<Vec<f64>>, NetPlanError> {
        let l = self.layer(layer)?;
        let mut x = vec![vec![0.0; l.links.len()]; l.demands.len()];
        for d in &l.demands {
            let demand = self.demand(*d)?;
            let row = demand.meta.index;
            if l.routing_type == RoutingType::HopByHopRouting {
                for (e, traffic) in &demand.hop_by_hop_traffic {
                    x[row][self.link(*e)?.meta.index] += traffic;
                }
                continue;
            }
            for r in &demand.routes {
                let route = self.route(*r)?;
                let carried = route.carried_traffic();
                for e in self.path_real_links(&route.path) {
                    x[row][self.link(e)?.meta.index] += carried;
                }
            }
        }
        Ok(x)
    }

    fn check_matrix_size(&self, layer: LayerId, m: &[Vec<f64>]) -> Result<(), NetPlanError> {
        let l = self.layer(layer)?;
        let (rows, cols) = (l.demands.len(), l.links.len());
        let bad_row = m.iter().find(|row| row.len() != cols);
        if m.len() != rows || bad_row.is_some() {
            return Err(NetPlanError::MatrixSize {
                expected_rows: rows,
                expected_cols: cols,
                rows: m.len(),
                cols: bad_row.or(m.first()).map_or(0, Vec::len),
            });
        }
        Ok(())
    }

    /// 用稠密矩阵整体替换本层转发规则
    pub fn set_forwarding_rules_from_matrix(&mut self, layer: LayerId, f: &[Vec<f64>]) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        self.ensure_routing_type(layer, RoutingType::HopByHopRouting)?;
        self.check_matrix_size(layer, f)?;
        let l = self.layer(layer)?;
        let mut staged = BTreeMap::new();
        for (row, d) in l.demands.iter().enumerate() {
            for (col, e) in l.links.iter().enumerate() {
                if f[row][col] != 0.0 {
                    staged.insert((*d, *e), f[row][col]);
                }
            }
        }
        let affected: BTreeSet<DemandId> = l.demands.iter().copied().collect();
        self.validate_forwarding_rules(layer, &staged)?;
        self.commit_forwarding_rules(layer, staged, affected)?;
        self.after_mutation();
        Ok(())
    }

    /// 由需求的链路流量推导转发比例：出流量 / 入流量（入口节点的入流量含提供流量）
    fn forwarding_rules_from_link_traffic(
        &self,
        d: DemandId,
        traffic: &BTreeMap<LinkId, f64>,
    ) -> Result<BTreeMap<(DemandId, LinkId), f64>, NetPlanError> {
        let demand = self.demand(d)?;
        let tol = self.config.precision_factor;
        let mut incoming: BTreeMap<NodeId, f64> = BTreeMap::new();
        incoming.insert(demand.ingress, demand.offered_traffic);
        for (l, x) in traffic {
            *incoming.entry(self.link(*l)?.destination).or_default() += x;
        }

        let mut ratios: BTreeMap<(DemandId, LinkId), f64> = BTreeMap::new();
        let mut out_sum: BTreeMap<NodeId, f64> = BTreeMap::new();
        for (l, x) in traffic {
            let link = self.link(*l)?;
            if *x <= tol || link.origin == demand.egress {
                continue;
            }
            let inflow = incoming.get(&link.origin).copied().unwrap_or(0.0);
            let ratio = if inflow > 0.0 { x / inflow } else { 0.0 };
            if ratio > 0.0 {
                ratios.insert((d, *l), ratio);
                *out_sum.entry(link.origin).or_default() += ratio;
            }
        }
        // 路由流量超过入流量时按节点归一化，保证比例之和不超过 1
        for ((_, l), ratio) in ratios.iter_mut() {
            let origin = self.link(*l)?.origin;
            let sum = out_sum[&origin];
            if sum > 1.0 {
                *ratio /= sum;
            }
        }
        Ok(ratios)
    }

    /// 把需求的链路流量分解成无环路径，返回 (需求, 路径, 流量)
    fn decompose_demand_traffic(
        &self,
        d: DemandId,
        traffic: &BTreeMap<LinkId, f64>,
    ) -> Result<Vec<(DemandId, Vec<LinkId>, f64)>, NetPlanError> {
        let demand = self.demand(d)?;
        let mut flows = Vec::with_capacity(traffic.len());
        for (l, x) in traffic {
            let link = self.link(*l)?;
            flows.push((*l, link.origin, link.destination, *x));
        }
        Ok(decompose_link_flows(demand.ingress, demand.egress, &flows, self.config.precision_factor)
            .into_iter()
            .map(|(path, x)| (d, path, x))
            .collect())
    }

    /// 切换路由模式：逐跳 -> 源路由时把流量分解为显式路径；源路由 -> 逐跳时把路由流量聚合为 x_de 再推导比例
    #[tracing::instrument(skip(self))]
    pub fn set_routing_type(&mut self, layer: LayerId, routing_type: RoutingType) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        let current = self.layer(layer)?.routing_type;
        if current == routing_type {
            return Ok(());
        }
        let demands = self.layer(layer)?.demands.clone();

        match routing_type {
            RoutingType::HopByHopRouting => {
                if let Some(d) = demands.iter().find(|d| self.demands[*d].is_service_chain_request()) {
                    return Err(NetPlanError::InvalidArgument(format!(
                        "demand {d} is a service chain request and needs source routing"
                    )));
                }
                let mut rules = BTreeMap::new();
                for d in &demands {
                    let traffic = self.route_traffic_if_not_failing(*d)?;
                    rules.extend(self.forwarding_rules_from_link_traffic(*d, &traffic)?);
                }
                let segments = self.layer(layer)?.segments.clone();
                for s in segments.into_iter().rev() {
                    self.remove_segment_internal(s)?;
                }
                let routes = self.layer(layer)?.routes.clone();
                for r in routes.into_iter().rev() {
                    self.remove_route_internal(r)?;
                }
                self.layer_mut(layer)?.routing_type = RoutingType::HopByHopRouting;
                self.commit_forwarding_rules(layer, rules, demands.into_iter().collect())?;
            }
            RoutingType::SourceRouting => {
                let mut paths = Vec::new();
                for d in &demands {
                    let outcome = self.solve_hop_by_hop(*d, false)?;
                    let traffic: BTreeMap<LinkId, f64> = outcome.link_traffic.into_iter().collect();
                    paths.extend(self.decompose_demand_traffic(*d, &traffic)?);
                }
                self.clear_hop_by_hop_state(layer)?;
                self.layer_mut(layer)?.routing_type = RoutingType::SourceRouting;
                for (d, path, x) in paths {
                    let path = path.into_iter().map(PathElement::Link).collect();
                    self.insert_route(d, x, x, path, BTreeMap::new(), BTreeMap::new())?;
                }
                let mut touched = Touched::default();
                touched.demands.extend(demands);
                self.refresh(touched);
            }
        }
        info!(layer = %layer, routing_type = ?routing_type, "🔁 路由模式已切换");
        self.after_mutation();
        Ok(())
    }

    /// 路由若无故障时在每条真实链路上的流量之和
    fn route_traffic_if_not_failing(&self, d: DemandId) -> Result<BTreeMap<LinkId, f64>, NetPlanError> {
        let mut traffic: BTreeMap<LinkId, f64> = BTreeMap::new();
        for r in &self.demand(d)?.routes {
            let route = self.route(*r)?;
            for l in self.path_real_links(&route.path) {
                *traffic.entry(l).or_default() += route.carried_traffic_if_not_failing;
            }
        }
        Ok(traffic)
    }

    /// 清空本层的转发规则及 x_de 缓存
    fn clear_hop_by_hop_state(&mut self, layer: LayerId) -> Result<(), NetPlanError> {
        let demands = self.layer(layer)?.demands.clone();
        let mut touched = Touched::default();
        for d in demands {
            let old: Vec<LinkId> = self.demand(d)?.hop_by_hop_traffic.keys().copied().collect();
            for l in old {
                if let Some(link) = self.links.get_mut(&l) {
                    link.hop_by_hop_traffic.remove(&d);
                }
                touched.links.insert(l);
            }
            let demand = self.demand_mut(d)?;
            demand.hop_by_hop_traffic.clear();
            demand.carried_traffic = 0.0;
            demand.routing_cycle_type = RoutingCycleType::Loopless;
            self.sync_coupled_link_capacity(d);
        }
        self.layer_mut(layer)?.forwarding_rules.clear();
        self.refresh(touched);
        Ok(())
    }

    /// 用需求×链路流量矩阵设置本层路由：逐跳层推导转发比例，源路由层分解为路由（替换已有路由）
    #[tracing::instrument(skip(self, x))]
    pub fn set_routing_from_demand_link_carried_traffic(
        &mut self,
        layer: LayerId,
        x: &[Vec<f64>],
    ) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        self.check_matrix_size(layer, x)?;
        if let Some(bad) = x.iter().flatten().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(NetPlanError::InvalidQuantity {
                what: "link traffic",
                value: *bad,
            });
        }
        let l = self.layer(layer)?;
        let demands = l.demands.clone();
        let links = l.links.clone();
        let routing_type = l.routing_type;

        let mut per_demand = Vec::with_capacity(demands.len());
        for (row, d) in demands.iter().enumerate() {
            let traffic: BTreeMap<LinkId, f64> = links
                .iter()
                .enumerate()
                .filter(|(col, _)| x[row][*col] > 0.0)
                .map(|(col, e)| (*e, x[row][col]))
                .collect();
            per_demand.push((*d, traffic));
        }

        match routing_type {
            RoutingType::HopByHopRouting => {
                let mut rules = BTreeMap::new();
                for (d, traffic) in &per_demand {
                    rules.extend(self.forwarding_rules_from_link_traffic(*d, traffic)?);
                }
                self.validate_forwarding_rules(layer, &rules)?;
                self.commit_forwarding_rules(layer, rules, demands.into_iter().collect())?;
            }
            RoutingType::SourceRouting => {
                let mut paths = Vec::new();
                for (d, traffic) in &per_demand {
                    paths.extend(self.decompose_demand_traffic(*d, traffic)?);
                }
                let routes = self.layer(layer)?.routes.clone();
                for r in routes.into_iter().rev() {
                    self.remove_route_internal(r)?;
                }
                for (d, path, traffic) in paths {
                    let path = path.into_iter().map(PathElement::Link).collect();
                    self.insert_route(d, traffic, traffic, path, BTreeMap::new(), BTreeMap::new())?;
                }
            }
        }
        self.after_mutation();
        Ok(())
    }
}
