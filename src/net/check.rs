//! 一致性检查
//!
//! 从头重新推导所有缓存并与已存储的值比较，返回发现的第一个违例（含元素 id 与期望/实际值）。
//! 测试中显式调用；`PlanConfig::check_consistency` 打开时每次修改之后自动调用。

use std::collections::{BTreeMap, BTreeSet};

use super::error::ConsistencyError;
use super::id::{DemandId, ElementKind, LinkId, NodeId, PathElement, ResourceId, RouteId, SegmentId, SrgId};
use super::layer::RoutingType;
use super::plan::NetPlan;

macro_rules! check {
    ($cond:expr, $element:expr, $($fmt:tt)+) => {
        if !$cond {
            return Err(ConsistencyError::new($element.to_string(), format!($($fmt)+)));
        }
    };
}

impl NetPlan {
    /// 完整的一致性检查
    pub fn check_caches_consistency(&self) -> Result<(), ConsistencyError> {
        self.check_identity()?;
        self.check_topology()?;
        self.check_routes()?;
        self.check_segments()?;
        self.check_aggregates()?;
        self.check_hop_by_hop()?;
        self.check_coupling()?;
        self.check_srgs_and_resources()?;
        Ok(())
    }

    /// id 注册表、index 稠密性、元素所属层
    fn check_identity(&self) -> Result<(), ConsistencyError> {
        let total = self.layers.len()
            + self.nodes.len()
            + self.links.len()
            + self.demands.len()
            + self.routes.len()
            + self.segments.len()
            + self.srgs.len()
            + self.resources.len();
        check!(
            self.element_kinds.len() == total,
            "plan",
            "{} registered ids but {} elements",
            self.element_kinds.len(),
            total
        );
        check!(self.next_id as usize >= total, "plan", "id counter {} behind {} elements", self.next_id, total);
        check!(self.layers.contains_key(&self.default_layer), "plan", "default layer {} missing", self.default_layer);

        macro_rules! dense {
            ($order:expr, $map:expr, $kind:expr) => {
                check!($order.len() == $map.len(), $kind, "ordered {} vs stored {}", $order.len(), $map.len());
                for (i, id) in $order.iter().enumerate() {
                    let Some(e) = $map.get(id) else {
                        return Err(ConsistencyError::new(id.to_string(), "listed but not stored"));
                    };
                    check!(e.meta.index == i, id, "index {} at position {}", e.meta.index, i);
                    check!(e.meta.id == id.0, id, "stored id {}", e.meta.id);
                    check!(self.element_kinds.get(&id.0) == Some(&$kind), id, "registered as {:?}", self.element_kinds.get(&id.0));
                }
            };
        }
        dense!(self.layer_order, self.layers, ElementKind::Layer);
        dense!(self.node_order, self.nodes, ElementKind::Node);
        dense!(self.srg_order, self.srgs, ElementKind::Srg);
        dense!(self.resource_order, self.resources, ElementKind::Resource);

        let (mut links, mut demands, mut routes, mut segments) = (0, 0, 0, 0);
        for layer in self.layers() {
            let lid = layer.layer_id();
            for (i, id) in layer.links.iter().enumerate() {
                let Some(e) = self.links.get(id) else {
                    return Err(ConsistencyError::new(id.to_string(), format!("listed in {lid} but not stored")));
                };
                check!(e.meta.index == i && e.layer == lid, id, "index {} layer {} at {lid}[{i}]", e.meta.index, e.layer);
                check!(self.element_kinds.get(&id.0) == Some(&ElementKind::Link), id, "wrong id registration");
            }
            for (i, id) in layer.demands.iter().enumerate() {
                let Some(e) = self.demands.get(id) else {
                    return Err(ConsistencyError::new(id.to_string(), format!("listed in {lid} but not stored")));
                };
                check!(e.meta.index == i && e.layer == lid, id, "index {} layer {} at {lid}[{i}]", e.meta.index, e.layer);
                check!(self.element_kinds.get(&id.0) == Some(&ElementKind::Demand), id, "wrong id registration");
            }
            for (i, id) in layer.routes.iter().enumerate() {
                let Some(e) = self.routes.get(id) else {
                    return Err(ConsistencyError::new(id.to_string(), format!("listed in {lid} but not stored")));
                };
                check!(e.meta.index == i && e.layer == lid, id, "index {} layer {} at {lid}[{i}]", e.meta.index, e.layer);
                check!(self.element_kinds.get(&id.0) == Some(&ElementKind::Route), id, "wrong id registration");
            }
            for (i, id) in layer.segments.iter().enumerate() {
                let Some(e) = self.segments.get(id) else {
                    return Err(ConsistencyError::new(id.to_string(), format!("listed in {lid} but not stored")));
                };
                check!(e.meta.index == i && e.layer == lid, id, "index {} layer {} at {lid}[{i}]", e.meta.index, e.layer);
                check!(
                    self.element_kinds.get(&id.0) == Some(&ElementKind::ProtectionSegment),
                    id,
                    "wrong id registration"
                );
            }
            links += layer.links.len();
            demands += layer.demands.len();
            routes += layer.routes.len();
            segments += layer.segments.len();
        }
        check!(links == self.links.len(), "plan", "{links} listed links, {} stored", self.links.len());
        check!(demands == self.demands.len(), "plan", "{demands} listed demands, {} stored", self.demands.len());
        check!(routes == self.routes.len(), "plan", "{routes} listed routes, {} stored", self.routes.len());
        check!(segments == self.segments.len(), "plan", "{segments} listed segments, {} stored", self.segments.len());
        Ok(())
    }

    /// 节点邻接缓存、up/down 标志与 down 集合
    fn check_topology(&self) -> Result<(), ConsistencyError> {
        let mut outgoing: BTreeMap<NodeId, BTreeSet<LinkId>> = BTreeMap::new();
        let mut incoming: BTreeMap<NodeId, BTreeSet<LinkId>> = BTreeMap::new();
        for (id, link) in &self.links {
            check!(link.origin != link.destination, id, "self loop at {}", link.origin);
            check!(self.nodes.contains_key(&link.origin), id, "origin {} missing", link.origin);
            check!(self.nodes.contains_key(&link.destination), id, "destination {} missing", link.destination);
            check!(link.capacity >= 0.0 && link.length_km >= 0.0, id, "capacity {} length {}", link.capacity, link.length_km);
            let listed_down = self.layers[&link.layer].links_down.contains(id);
            check!(link.is_up != listed_down, id, "up flag {} but down-set membership {}", link.is_up, listed_down);
            outgoing.entry(link.origin).or_default().insert(*id);
            incoming.entry(link.destination).or_default().insert(*id);
        }
        for layer in self.layers() {
            for l in &layer.links_down {
                check!(layer.links.contains(l), layer.layer_id(), "down link {l} not in layer");
            }
        }

        let mut out_demands: BTreeMap<NodeId, BTreeSet<DemandId>> = BTreeMap::new();
        let mut in_demands: BTreeMap<NodeId, BTreeSet<DemandId>> = BTreeMap::new();
        for (id, d) in &self.demands {
            check!(d.ingress != d.egress, id, "ingress equals egress {}", d.ingress);
            check!(d.offered_traffic >= 0.0 && d.carried_traffic >= 0.0, id, "offered {} carried {}", d.offered_traffic, d.carried_traffic);
            out_demands.entry(d.ingress).or_default().insert(*id);
            in_demands.entry(d.egress).or_default().insert(*id);
        }

        let empty_l = BTreeSet::new();
        let empty_d = BTreeSet::new();
        for (id, node) in &self.nodes {
            check!(node.is_up != self.nodes_down.contains(id), id, "up flag {} disagrees with down set", node.is_up);
            let expected = outgoing.get(id).unwrap_or(&empty_l);
            check!(&node.outgoing_links == expected, id, "outgoing links {:?}, expected {:?}", node.outgoing_links, expected);
            let expected = incoming.get(id).unwrap_or(&empty_l);
            check!(&node.incoming_links == expected, id, "incoming links {:?}, expected {:?}", node.incoming_links, expected);
            let expected = out_demands.get(id).unwrap_or(&empty_d);
            check!(&node.outgoing_demands == expected, id, "outgoing demands {:?}, expected {:?}", node.outgoing_demands, expected);
            let expected = in_demands.get(id).unwrap_or(&empty_d);
            check!(&node.incoming_demands == expected, id, "incoming demands {:?}, expected {:?}", node.incoming_demands, expected);
        }
        for n in &self.nodes_down {
            check!(self.nodes.contains_key(n), n, "down node is not stored");
        }
        Ok(())
    }

    /// 路由路径合法性与经过次数（多重集）缓存
    fn check_routes(&self) -> Result<(), ConsistencyError> {
        let mut on_links: BTreeMap<LinkId, BTreeMap<RouteId, usize>> = BTreeMap::new();
        let mut on_segments: BTreeMap<SegmentId, BTreeMap<RouteId, usize>> = BTreeMap::new();
        let mut on_resources: BTreeMap<ResourceId, BTreeMap<RouteId, usize>> = BTreeMap::new();
        let mut at_nodes: BTreeMap<NodeId, BTreeSet<RouteId>> = BTreeMap::new();

        for (id, route) in &self.routes {
            let Some(demand) = self.demands.get(&route.demand) else {
                return Err(ConsistencyError::new(id.to_string(), format!("demand {} missing", route.demand)));
            };
            check!(demand.layer == route.layer, id, "demand {} in layer {}", route.demand, demand.layer);
            check!(demand.routes.contains(id), id, "not listed in demand {}", route.demand);
            check!(
                self.layers[&route.layer].routing_type == RoutingType::SourceRouting,
                id,
                "route in hop-by-hop layer {}",
                route.layer
            );
            check!(
                route.carried_traffic_if_not_failing >= 0.0 && route.occupied_capacity_if_not_failing >= 0.0,
                id,
                "negative traffic"
            );

            let mut at = demand.ingress;
            for e in &route.path {
                match e {
                    PathElement::Link(l) => {
                        let Some(link) = self.links.get(l) else {
                            return Err(ConsistencyError::new(id.to_string(), format!("link {l} missing")));
                        };
                        check!(link.origin == at && link.layer == route.layer, id, "link {l} breaks the walk at {at}");
                        at = link.destination;
                        *on_links.entry(*l).or_default().entry(*id).or_default() += 1;
                    }
                    PathElement::Segment(s) => {
                        let Some(seg) = self.segments.get(s) else {
                            return Err(ConsistencyError::new(id.to_string(), format!("segment {s} missing")));
                        };
                        check!(seg.origin == at && seg.layer == route.layer, id, "segment {s} breaks the walk at {at}");
                        at = seg.destination;
                        *on_segments.entry(*s).or_default().entry(*id).or_default() += 1;
                    }
                    PathElement::Resource(r) => {
                        let Some(res) = self.resources.get(r) else {
                            return Err(ConsistencyError::new(id.to_string(), format!("resource {r} missing")));
                        };
                        check!(res.host_node == at, id, "resource {r} not hosted at {at}");
                        *on_resources.entry(*r).or_default().entry(*id).or_default() += 1;
                    }
                }
            }
            check!(at == demand.egress, id, "walk ends at {at}, egress {}", demand.egress);
            for n in self.path_nodes(demand.ingress, &route.path) {
                at_nodes.entry(n).or_default().insert(*id);
            }
            for s in &route.backup_segments {
                let Some(seg) = self.segments.get(s) else {
                    return Err(ConsistencyError::new(id.to_string(), format!("backup segment {s} missing")));
                };
                check!(seg.backup_of_routes.contains(id), id, "backup segment {s} does not list the route");
            }
            check!(route.is_down == self.path_is_down(&route.path), id, "is_down {} is stale", route.is_down);
            if route.is_down {
                check!(route.carried_traffic() == 0.0 && route.occupied_capacity() == 0.0, id, "down route carries traffic");
            }
        }
        for (id, demand) in &self.demands {
            for r in &demand.routes {
                check!(self.routes.get(r).is_some_and(|x| x.demand == *id), id, "route {r} not owned");
            }
        }

        let empty = BTreeMap::new();
        for (id, link) in &self.links {
            let expected = on_links.get(id).unwrap_or(&empty);
            check!(&link.traversing_routes == expected, id, "traversing routes {:?}, expected {:?}", link.traversing_routes, expected);
        }
        for (id, seg) in &self.segments {
            let expected = on_segments.get(id).unwrap_or(&empty);
            check!(&seg.traversing_routes == expected, id, "traversing routes {:?}, expected {:?}", seg.traversing_routes, expected);
        }
        for (id, res) in &self.resources {
            let expected = on_resources.get(id).unwrap_or(&empty);
            check!(&res.traversing_routes == expected, id, "traversing routes {:?}, expected {:?}", res.traversing_routes, expected);
        }
        let empty = BTreeSet::new();
        for (id, node) in &self.nodes {
            let expected = at_nodes.get(id).unwrap_or(&empty);
            check!(&node.associated_routes == expected, id, "associated routes {:?}, expected {:?}", node.associated_routes, expected);
        }
        Ok(())
    }

    fn check_segments(&self) -> Result<(), ConsistencyError> {
        let mut on_links: BTreeMap<LinkId, BTreeMap<SegmentId, usize>> = BTreeMap::new();
        let mut at_nodes: BTreeMap<NodeId, BTreeSet<SegmentId>> = BTreeMap::new();
        for (id, seg) in &self.segments {
            check!(!seg.links.is_empty(), id, "empty segment");
            check!(seg.reserved_capacity >= 0.0, id, "negative reserved capacity");
            check!(
                self.layers[&seg.layer].routing_type == RoutingType::SourceRouting,
                id,
                "segment in hop-by-hop layer {}",
                seg.layer
            );
            let mut at = seg.origin;
            at_nodes.entry(at).or_default().insert(*id);
            for l in &seg.links {
                let Some(link) = self.links.get(l) else {
                    return Err(ConsistencyError::new(id.to_string(), format!("link {l} missing")));
                };
                check!(link.origin == at && link.layer == seg.layer, id, "link {l} breaks the segment at {at}");
                at = link.destination;
                at_nodes.entry(at).or_default().insert(*id);
                *on_links.entry(*l).or_default().entry(*id).or_default() += 1;
            }
            check!(at == seg.destination, id, "segment ends at {at}, expected {}", seg.destination);
            for r in &seg.backup_of_routes {
                check!(
                    self.routes.get(r).is_some_and(|x| x.backup_segments.contains(id)),
                    id,
                    "route {r} does not list the segment as backup"
                );
            }
            check!(seg.is_down == self.segment_is_down(seg), id, "is_down {} is stale", seg.is_down);
        }
        let empty = BTreeMap::new();
        for (id, link) in &self.links {
            let expected = on_links.get(id).unwrap_or(&empty);
            check!(&link.traversing_segments == expected, id, "traversing segments {:?}, expected {:?}", link.traversing_segments, expected);
        }
        let empty = BTreeSet::new();
        for (id, node) in &self.nodes {
            let expected = at_nodes.get(id).unwrap_or(&empty);
            check!(&node.associated_segments == expected, id, "associated segments {:?}, expected {:?}", node.associated_segments, expected);
        }
        Ok(())
    }

    /// 链路/保护段/资源/需求上的汇总值，以及故障清零
    fn check_aggregates(&self) -> Result<(), ConsistencyError> {
        let cfg = &self.config;
        for (id, link) in &self.links {
            let agg = self.link_aggregates(link);
            check!(cfg.approx_eq(link.carried_traffic, agg.carried), id, "carried {} expected {}", link.carried_traffic, agg.carried);
            check!(cfg.approx_eq(link.occupied_capacity, agg.occupied), id, "occupied {} expected {}", link.occupied_capacity, agg.occupied);
            check!(
                cfg.approx_eq(link.carried_traffic_in_segments, agg.carried_in_segments),
                id,
                "carried in segments {} expected {}",
                link.carried_traffic_in_segments,
                agg.carried_in_segments
            );
            check!(
                cfg.approx_eq(link.reserved_for_protection, agg.reserved),
                id,
                "reserved {} expected {}",
                link.reserved_for_protection,
                agg.reserved
            );
            if !self.link_usable(link) {
                check!(
                    link.carried_traffic == 0.0 && link.occupied_capacity == 0.0,
                    id,
                    "unusable link carries {} / occupies {}",
                    link.carried_traffic,
                    link.occupied_capacity
                );
            }
        }
        for (id, seg) in &self.segments {
            let expected = self.segment_carried(seg);
            check!(cfg.approx_eq(seg.carried_traffic, expected), id, "carried {} expected {expected}", seg.carried_traffic);
        }
        for (id, res) in &self.resources {
            let expected = self.resource_occupied(*id);
            check!(cfg.approx_eq(res.occupied_capacity, expected), id, "occupied {} expected {expected}", res.occupied_capacity);
        }
        for (id, d) in &self.demands {
            if self.layers[&d.layer].routing_type != RoutingType::SourceRouting {
                continue;
            }
            let (carried, kind) = self.source_routing_demand_state(*id);
            check!(cfg.approx_eq(d.carried_traffic, carried), id, "carried {} expected {carried}", d.carried_traffic);
            check!(d.routing_cycle_type == kind, id, "cycle type {:?} expected {kind:?}", d.routing_cycle_type);
            check!(d.hop_by_hop_traffic.is_empty(), id, "hop-by-hop traffic in a source-routing layer");
        }
        Ok(())
    }

    /// 转发规则合法性、x_de 双向镜像，以及与重新求解结果一致
    fn check_hop_by_hop(&self) -> Result<(), ConsistencyError> {
        let cfg = &self.config;
        let tol = cfg.precision_factor;
        for layer in self.layers() {
            let lid = layer.layer_id();
            if layer.routing_type == RoutingType::SourceRouting {
                check!(layer.forwarding_rules.is_empty(), lid, "forwarding rules in a source-routing layer");
                continue;
            }
            check!(layer.routes.is_empty() && layer.segments.is_empty(), lid, "routes in a hop-by-hop layer");
            let mut out_sum: BTreeMap<(DemandId, NodeId), f64> = BTreeMap::new();
            for (&(d, l), &ratio) in &layer.forwarding_rules {
                let (Some(demand), Some(link)) = (self.demands.get(&d), self.links.get(&l)) else {
                    return Err(ConsistencyError::new(lid.to_string(), format!("rule ({d}, {l}) references a missing element")));
                };
                check!(demand.layer == lid && link.layer == lid, lid, "rule ({d}, {l}) crosses layers");
                check!(ratio > 0.0 && ratio <= 1.0 + tol, lid, "rule ({d}, {l}) ratio {ratio}");
                *out_sum.entry((d, link.origin)).or_default() += ratio;
            }
            for ((d, n), sum) in out_sum {
                check!(sum <= 1.0 + tol, d, "ratios leaving {n} sum to {sum}");
            }

            for d in &layer.demands {
                let demand = &self.demands[d];
                let outcome = match self.solve_hop_by_hop(*d, true) {
                    Ok(o) => o,
                    Err(e) => return Err(ConsistencyError::new(d.to_string(), e.to_string())),
                };
                check!(
                    cfg.approx_eq(demand.carried_traffic, outcome.carried_traffic),
                    d,
                    "carried {} expected {}",
                    demand.carried_traffic,
                    outcome.carried_traffic
                );
                check!(
                    demand.routing_cycle_type == outcome.cycle_type,
                    d,
                    "cycle type {:?} expected {:?}",
                    demand.routing_cycle_type,
                    outcome.cycle_type
                );
                let expected: BTreeMap<LinkId, f64> = outcome.link_traffic.into_iter().collect();
                for (l, x) in &expected {
                    let cached = demand.hop_by_hop_traffic.get(l).copied().unwrap_or(0.0);
                    check!(cfg.approx_eq(cached, *x), d, "x on {l} is {cached}, expected {x}");
                }
                for (l, x) in &demand.hop_by_hop_traffic {
                    check!(*x > 0.0, d, "non-positive x on {l}");
                    check!(expected.contains_key(l), d, "x on {l} should be zero");
                    let mirrored = self.links.get(l).and_then(|link| link.hop_by_hop_traffic.get(d));
                    check!(mirrored == Some(x), d, "x on {l} not mirrored in the link");
                }
            }
        }
        for (id, link) in &self.links {
            for (d, x) in &link.hop_by_hop_traffic {
                let mirrored = self.demands.get(d).and_then(|demand| demand.hop_by_hop_traffic.get(id));
                check!(mirrored == Some(x), id, "x of demand {d} not mirrored in the demand");
            }
        }
        Ok(())
    }

    fn check_coupling(&self) -> Result<(), ConsistencyError> {
        check!(self.coupling.is_acyclic(), "coupling", "layer coupling graph has a cycle");
        check!(
            self.coupling.layer_count() == self.layers.len(),
            "coupling",
            "{} layers in the graph, {} stored",
            self.coupling.layer_count(),
            self.layers.len()
        );
        let mut expected: BTreeSet<(DemandId, LinkId)> = BTreeSet::new();
        for (id, d) in &self.demands {
            let Some(l) = d.coupled_link else {
                continue;
            };
            let Some(link) = self.links.get(&l) else {
                return Err(ConsistencyError::new(id.to_string(), format!("coupled link {l} missing")));
            };
            check!(link.coupled_demand == Some(*id), id, "link {l} points to {:?}", link.coupled_demand);
            check!(link.layer != d.layer, id, "coupled within layer {}", d.layer);
            check!(link.origin == d.ingress && link.destination == d.egress, id, "end nodes differ from link {l}");
            check!(
                self.config.approx_eq(link.capacity, d.carried_traffic),
                l,
                "capacity {} but coupled demand carries {}",
                link.capacity,
                d.carried_traffic
            );
            check!(
                self.coupling.couplings(d.layer, link.layer).is_some_and(|s| s.contains(&(*id, l))),
                id,
                "coupling with {l} missing from the layer graph"
            );
            expected.insert((*id, l));
        }
        for (id, link) in &self.links {
            if let Some(d) = link.coupled_demand {
                check!(
                    self.demands.get(&d).is_some_and(|x| x.coupled_link == Some(*id)),
                    id,
                    "demand {d} does not point back"
                );
            }
        }
        let mut in_graph = BTreeSet::new();
        for (lower, upper, set) in self.coupling.edges() {
            check!(!set.is_empty(), "coupling", "empty edge {lower} -> {upper}");
            in_graph.extend(set.iter().copied());
        }
        check!(in_graph == expected, "coupling", "graph couplings {in_graph:?}, element couplings {expected:?}");
        Ok(())
    }

    fn check_srgs_and_resources(&self) -> Result<(), ConsistencyError> {
        let mut node_srgs: BTreeMap<NodeId, BTreeSet<SrgId>> = BTreeMap::new();
        let mut link_srgs: BTreeMap<LinkId, BTreeSet<SrgId>> = BTreeMap::new();
        for (id, srg) in &self.srgs {
            for n in &srg.nodes {
                check!(self.nodes.contains_key(n), id, "member node {n} missing");
                node_srgs.entry(*n).or_default().insert(*id);
            }
            for l in &srg.links {
                check!(self.links.contains_key(l), id, "member link {l} missing");
                link_srgs.entry(*l).or_default().insert(*id);
            }
        }
        let empty = BTreeSet::new();
        for (id, node) in &self.nodes {
            check!(&node.srgs == node_srgs.get(id).unwrap_or(&empty), id, "srgs {:?} disagree", node.srgs);
        }
        for (id, link) in &self.links {
            check!(&link.srgs == link_srgs.get(id).unwrap_or(&empty), id, "srgs {:?} disagree", link.srgs);
        }

        let mut hosted: BTreeMap<NodeId, BTreeSet<ResourceId>> = BTreeMap::new();
        for (id, res) in &self.resources {
            check!(self.nodes.contains_key(&res.host_node), id, "host {} missing", res.host_node);
            check!(res.capacity >= 0.0, id, "negative capacity");
            hosted.entry(res.host_node).or_default().insert(*id);
        }
        let empty = BTreeSet::new();
        for (id, node) in &self.nodes {
            check!(&node.resources == hosted.get(id).unwrap_or(&empty), id, "resources {:?} disagree", node.resources);
        }
        Ok(())
    }
}
