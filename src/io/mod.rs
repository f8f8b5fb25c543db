//! 规划文档的序列化
//!
//! 带版本号的 JSON 文档：每个元素一条记录。节点、SRG、资源、耦合在顶层；
//! 每个层一个块，包含链路、需求，以及按路由模式二选一的路由 + 保护段或转发规则。
//! 反序列化保留文档中的元素 id。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use tracing::info;

use crate::config::PlanConfig;
use crate::net::{
    DemandId, LayerId, LinkId, NetPlan, NetPlanError, NodeId, PathElement, ResourceId, RouteId, RoutingType,
    SegmentId, SrgId,
};

/// 当前文档格式版本
pub const SCHEMA_VERSION: u32 = 1;

type Attributes = BTreeMap<String, String>;

fn default_true() -> bool {
    true
}

fn infinite_speed() -> f64 {
    f64::INFINITY
}

fn is_infinite(v: &f64) -> bool {
    v.is_infinite()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDocument {
    pub schema_version: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub attributes: Attributes,
    /// 下一个可分配的 id
    #[serde(default)]
    pub next_id: u64,
    pub default_layer: LayerId,
    pub nodes: Vec<NodeRecord>,
    pub layers: Vec<LayerRecord>,
    #[serde(default)]
    pub srgs: Vec<SrgRecord>,
    #[serde(default)]
    pub resources: Vec<ResourceRecord>,
    #[serde(default)]
    pub couplings: Vec<CouplingRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    #[serde(default)]
    pub name: String,
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_true")]
    pub up: bool,
    #[serde(default)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRecord {
    pub id: LayerId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub demand_traffic_units: String,
    pub link_capacity_units: String,
    pub routing_type: RoutingType,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub links: Vec<LinkRecord>,
    #[serde(default)]
    pub demands: Vec<DemandRecord>,
    #[serde(default)]
    pub segments: Vec<SegmentRecord>,
    #[serde(default)]
    pub routes: Vec<RouteRecord>,
    #[serde(default)]
    pub forwarding_rules: Vec<ForwardingRuleRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub id: LinkId,
    pub origin: NodeId,
    pub destination: NodeId,
    pub capacity: f64,
    #[serde(default)]
    pub length_km: f64,
    /// JSON 不能表示无穷大：缺省即无穷（零传播时延）
    #[serde(default = "infinite_speed", skip_serializing_if = "is_infinite")]
    pub propagation_speed_km_per_s: f64,
    #[serde(default = "default_true")]
    pub up: bool,
    #[serde(default)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandRecord {
    pub id: DemandId,
    pub ingress: NodeId,
    pub egress: NodeId,
    pub offered_traffic: f64,
    #[serde(default)]
    pub resource_type_sequence: Vec<String>,
    #[serde(default)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceOccupationRecord {
    pub resource: ResourceId,
    pub occupation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub id: RouteId,
    pub demand: DemandId,
    pub carried_traffic: f64,
    pub occupied_capacity: f64,
    pub path: Vec<PathElement>,
    /// 为空时等于 `path`
    #[serde(default)]
    pub initial_path: Vec<PathElement>,
    #[serde(default)]
    pub resource_occupation: Vec<ResourceOccupationRecord>,
    #[serde(default)]
    pub backup_segments: Vec<SegmentId>,
    #[serde(default)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub id: SegmentId,
    pub links: Vec<LinkId>,
    pub reserved_capacity: f64,
    #[serde(default)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForwardingRuleRecord {
    pub demand: DemandId,
    pub link: LinkId,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SrgRecord {
    pub id: SrgId,
    #[serde(default)]
    pub nodes: Vec<NodeId>,
    #[serde(default)]
    pub links: Vec<LinkId>,
    pub mean_time_to_fail_hours: f64,
    pub mean_time_to_repair_hours: f64,
    #[serde(default)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: ResourceId,
    pub resource_type: String,
    #[serde(default)]
    pub name: String,
    pub host_node: NodeId,
    pub capacity: f64,
    #[serde(default)]
    pub capacity_units: String,
    #[serde(default)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CouplingRecord {
    pub demand: DemandId,
    pub link: LinkId,
}

impl PlanDocument {
    pub fn from_json_str(raw: &str) -> Result<Self, NetPlanError> {
        let doc: PlanDocument = serde_json::from_str(raw)?;
        if doc.schema_version != SCHEMA_VERSION {
            return Err(NetPlanError::InvalidArgument(format!(
                "unsupported schema_version {} (expected {SCHEMA_VERSION})",
                doc.schema_version
            )));
        }
        Ok(doc)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, NetPlanError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn to_json_string(&self) -> Result<String, NetPlanError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json_file(&self, path: impl AsRef<Path>) -> Result<(), NetPlanError> {
        fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

/// 让下一个分配的 id 恰好是文档中的 id
fn claim(plan: &mut NetPlan, seen: &mut BTreeSet<u64>, id: u64) -> Result<(), NetPlanError> {
    if !seen.insert(id) {
        return Err(NetPlanError::InvalidArgument(format!("duplicate element id {id}")));
    }
    plan.next_id = id;
    Ok(())
}

impl NetPlan {
    /// 导出为文档
    pub fn to_document(&self) -> PlanDocument {
        let nodes = self
            .nodes()
            .map(|n| NodeRecord {
                id: n.node_id(),
                name: n.name().to_string(),
                x: n.position().0,
                y: n.position().1,
                up: n.is_up(),
                attributes: n.meta.attributes.clone(),
            })
            .collect();

        let layers = self
            .layers()
            .map(|layer| {
                let lid = layer.layer_id();
                let links = layer
                    .links
                    .iter()
                    .map(|id| &self.links[id])
                    .map(|l| LinkRecord {
                        id: l.link_id(),
                        origin: l.origin(),
                        destination: l.destination(),
                        capacity: l.capacity(),
                        length_km: l.length_km(),
                        propagation_speed_km_per_s: l.propagation_speed_km_per_s(),
                        up: l.is_up(),
                        attributes: l.meta.attributes.clone(),
                    })
                    .collect();
                let demands = layer
                    .demands
                    .iter()
                    .map(|id| &self.demands[id])
                    .map(|d| DemandRecord {
                        id: d.demand_id(),
                        ingress: d.ingress(),
                        egress: d.egress(),
                        offered_traffic: d.offered_traffic(),
                        resource_type_sequence: d.resource_type_sequence().to_vec(),
                        attributes: d.meta.attributes.clone(),
                    })
                    .collect();
                let segments = layer
                    .segments
                    .iter()
                    .map(|id| &self.segments[id])
                    .map(|s| SegmentRecord {
                        id: s.segment_id(),
                        links: s.links().to_vec(),
                        reserved_capacity: s.reserved_capacity_if_not_failing(),
                        attributes: s.meta.attributes.clone(),
                    })
                    .collect();
                let routes = layer
                    .routes
                    .iter()
                    .map(|id| &self.routes[id])
                    .map(|r| RouteRecord {
                        id: r.route_id(),
                        demand: r.demand(),
                        carried_traffic: r.carried_traffic_if_not_failing(),
                        occupied_capacity: r.occupied_capacity_if_not_failing(),
                        path: r.path().to_vec(),
                        initial_path: r.initial_path().to_vec(),
                        resource_occupation: r
                            .resource_occupation_if_not_failing()
                            .iter()
                            .map(|(res, v)| ResourceOccupationRecord {
                                resource: *res,
                                occupation: *v,
                            })
                            .collect(),
                        backup_segments: r.backup_segments().iter().copied().collect(),
                        attributes: r.meta.attributes.clone(),
                    })
                    .collect();
                let forwarding_rules = layer
                    .forwarding_rules
                    .iter()
                    .map(|(&(demand, link), &ratio)| ForwardingRuleRecord { demand, link, ratio })
                    .collect();
                LayerRecord {
                    id: lid,
                    name: layer.name().to_string(),
                    description: layer.description().to_string(),
                    demand_traffic_units: layer.demand_traffic_units().to_string(),
                    link_capacity_units: layer.link_capacity_units().to_string(),
                    routing_type: layer.routing_type(),
                    attributes: layer.meta.attributes.clone(),
                    links,
                    demands,
                    segments,
                    routes,
                    forwarding_rules,
                }
            })
            .collect();

        let srgs = self
            .srg_order
            .iter()
            .map(|id| &self.srgs[id])
            .map(|s| SrgRecord {
                id: s.srg_id(),
                nodes: s.nodes().iter().copied().collect(),
                links: s.links().iter().copied().collect(),
                mean_time_to_fail_hours: s.mean_time_to_fail_hours(),
                mean_time_to_repair_hours: s.mean_time_to_repair_hours(),
                attributes: s.meta.attributes.clone(),
            })
            .collect();

        let resources = self
            .resource_order
            .iter()
            .map(|id| &self.resources[id])
            .map(|r| ResourceRecord {
                id: r.resource_id(),
                resource_type: r.resource_type().to_string(),
                name: r.name().to_string(),
                host_node: r.host_node(),
                capacity: r.capacity(),
                capacity_units: r.capacity_units().to_string(),
                attributes: r.meta.attributes.clone(),
            })
            .collect();

        let mut couplings: Vec<CouplingRecord> = self
            .coupling
            .edges()
            .flat_map(|(_, _, set)| set.iter().map(|&(demand, link)| CouplingRecord { demand, link }))
            .collect();
        couplings.sort_by_key(|c| (c.demand, c.link));

        PlanDocument {
            schema_version: SCHEMA_VERSION,
            name: self.name.clone(),
            description: self.description.clone(),
            attributes: self.attributes.clone(),
            next_id: self.next_id,
            default_layer: self.default_layer,
            nodes,
            layers,
            srgs,
            resources,
            couplings,
        }
    }

    /// 由文档重建规划（保留全部元素 id）
    #[tracing::instrument(skip(doc), fields(layers = doc.layers.len(), nodes = doc.nodes.len()))]
    pub fn from_document(doc: &PlanDocument, config: PlanConfig) -> Result<NetPlan, NetPlanError> {
        if doc.schema_version != SCHEMA_VERSION {
            return Err(NetPlanError::InvalidArgument(format!(
                "unsupported schema_version {}",
                doc.schema_version
            )));
        }
        if doc.layers.is_empty() {
            return Err(NetPlanError::InvalidArgument("a plan needs at least one layer".into()));
        }
        let mut plan = NetPlan::without_layers(PlanConfig {
            check_consistency: false,
            ..config
        });
        let mut seen = BTreeSet::new();
        plan.name = doc.name.clone();
        plan.description = doc.description.clone();
        plan.attributes = doc.attributes.clone();

        for layer in &doc.layers {
            claim(&mut plan, &mut seen, layer.id.0)?;
            plan.insert_layer(
                layer.name.clone(),
                layer.description.clone(),
                layer.demand_traffic_units.clone(),
                layer.link_capacity_units.clone(),
                layer.attributes.clone(),
            );
        }
        plan.layer(doc.default_layer)?;
        plan.default_layer = doc.default_layer;

        for n in &doc.nodes {
            claim(&mut plan, &mut seen, n.id.0)?;
            plan.add_node(&n.name, n.x, n.y, n.attributes.clone())?;
        }
        for r in &doc.resources {
            claim(&mut plan, &mut seen, r.id.0)?;
            plan.add_resource(
                &r.resource_type,
                &r.name,
                r.host_node,
                r.capacity,
                &r.capacity_units,
                r.attributes.clone(),
            )?;
        }

        for layer in &doc.layers {
            for l in &layer.links {
                claim(&mut plan, &mut seen, l.id.0)?;
                plan.add_link(
                    layer.id,
                    l.origin,
                    l.destination,
                    l.capacity,
                    l.length_km,
                    l.propagation_speed_km_per_s,
                    l.attributes.clone(),
                )?;
            }
            // 层还是空的，直接切换模式即可
            plan.layer_mut(layer.id)?.routing_type = layer.routing_type;
            for d in &layer.demands {
                claim(&mut plan, &mut seen, d.id.0)?;
                plan.add_demand(layer.id, d.ingress, d.egress, d.offered_traffic, d.attributes.clone())?;
                if !d.resource_type_sequence.is_empty() {
                    plan.set_service_chain_sequence_of_resource_types(d.id, d.resource_type_sequence.clone())?;
                }
            }
            match layer.routing_type {
                RoutingType::SourceRouting => {
                    if !layer.forwarding_rules.is_empty() {
                        return Err(NetPlanError::InvalidArgument(format!(
                            "source-routing layer {} carries forwarding rules",
                            layer.id
                        )));
                    }
                    for s in &layer.segments {
                        claim(&mut plan, &mut seen, s.id.0)?;
                        plan.add_protection_segment(s.links.clone(), s.reserved_capacity, s.attributes.clone())?;
                    }
                    for r in &layer.routes {
                        claim(&mut plan, &mut seen, r.id.0)?;
                        let occupation = r
                            .resource_occupation
                            .iter()
                            .map(|o| (o.resource, o.occupation))
                            .collect();
                        plan.add_route(
                            r.demand,
                            r.carried_traffic,
                            r.occupied_capacity,
                            r.path.clone(),
                            occupation,
                            r.attributes.clone(),
                        )?;
                        if !r.initial_path.is_empty() {
                            plan.route_mut(r.id)?.initial_path = r.initial_path.clone();
                        }
                        for s in &r.backup_segments {
                            plan.add_backup_segment_to_route(r.id, *s)?;
                        }
                    }
                }
                RoutingType::HopByHopRouting => {
                    if !layer.routes.is_empty() || !layer.segments.is_empty() {
                        return Err(NetPlanError::InvalidArgument(format!(
                            "hop-by-hop layer {} carries routes",
                            layer.id
                        )));
                    }
                    let rules: Vec<_> = layer
                        .forwarding_rules
                        .iter()
                        .map(|f| (f.demand, f.link, f.ratio))
                        .collect();
                    plan.set_forwarding_rules(layer.id, &rules, true)?;
                }
            }
        }

        for s in &doc.srgs {
            claim(&mut plan, &mut seen, s.id.0)?;
            plan.add_srg(s.mean_time_to_fail_hours, s.mean_time_to_repair_hours, s.attributes.clone())?;
            for n in &s.nodes {
                plan.add_node_to_srg(s.id, *n)?;
            }
            for l in &s.links {
                plan.add_link_to_srg(s.id, *l)?;
            }
        }
        for c in &doc.couplings {
            plan.couple(c.demand, c.link)?;
        }

        let links_down: Vec<LinkId> = doc
            .layers
            .iter()
            .flat_map(|l| l.links.iter())
            .filter(|l| !l.up)
            .map(|l| l.id)
            .collect();
        let nodes_down: Vec<NodeId> = doc.nodes.iter().filter(|n| !n.up).map(|n| n.id).collect();
        plan.set_links_and_nodes_failure_state(&[], &links_down, &[], &nodes_down)?;

        let max_id = seen.iter().next_back().map_or(0, |m| m + 1);
        plan.next_id = doc.next_id.max(max_id);
        plan.config.check_consistency = config.check_consistency;
        info!(elements = seen.len(), "📥 规划文档已载入");
        Ok(plan)
    }

    pub fn load_json_file(path: impl AsRef<Path>, config: PlanConfig) -> Result<NetPlan, NetPlanError> {
        let doc = PlanDocument::from_json_file(path)?;
        NetPlan::from_document(&doc, config)
    }

    pub fn save_json_file(&self, path: impl AsRef<Path>) -> Result<(), NetPlanError> {
        self.to_document().write_json_file(path)
    }
}
