//! 故障传播
//!
//! `set_links_and_nodes_failure_state` 是改变 up/down 状态的唯一入口：
//! 1. 切换标志与各层/全局的 down 集合；
//! 2. 收集受影响的链路（直接切换的链路 + 切换节点的所有邻接链路）；
//! 3. 按所在层的路由模式分组；
//! 4. 逐跳层每层重新求解一次全部需求，源路由层只刷新经过受影响链路的路由与保护段。

use std::collections::BTreeSet;

use tracing::{debug, info};

use super::error::NetPlanError;
use super::id::{LayerId, LinkId, NodeId, SrgId};
use super::layer::RoutingType;
use super::plan::NetPlan;
use super::plan_routing::Touched;

impl NetPlan {
    #[tracing::instrument(skip(self))]
    pub fn set_links_and_nodes_failure_state(
        &mut self,
        links_up: &[LinkId],
        links_down: &[LinkId],
        nodes_up: &[NodeId],
        nodes_down: &[NodeId],
    ) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        for l in links_up.iter().chain(links_down) {
            self.link(*l)?;
        }
        for n in nodes_up.iter().chain(nodes_down) {
            self.node(*n)?;
        }

        let mut affected: BTreeSet<LinkId> = BTreeSet::new();
        let mut toggled_nodes: BTreeSet<NodeId> = BTreeSet::new();
        for (links, up) in [(links_up, true), (links_down, false)] {
            for l in links {
                let link = self.link_mut(*l)?;
                if link.is_up == up {
                    continue;
                }
                link.is_up = up;
                let layer = link.layer;
                let lay = self.layer_mut(layer)?;
                if up {
                    lay.links_down.remove(l);
                } else {
                    lay.links_down.insert(*l);
                }
                affected.insert(*l);
            }
        }
        for (nodes, up) in [(nodes_up, true), (nodes_down, false)] {
            for n in nodes {
                let node = self.node_mut(*n)?;
                if node.is_up == up {
                    continue;
                }
                node.is_up = up;
                affected.extend(node.outgoing_links.iter().copied());
                affected.extend(node.incoming_links.iter().copied());
                if up {
                    self.nodes_down.remove(n);
                } else {
                    self.nodes_down.insert(*n);
                }
                toggled_nodes.insert(*n);
            }
        }
        if affected.is_empty() && toggled_nodes.is_empty() {
            return Ok(());
        }

        let mut hop_by_hop_layers: BTreeSet<LayerId> = BTreeSet::new();
        let mut touched = Touched::default();
        for l in &affected {
            let link = self.link(*l)?;
            match self.layer(link.layer)?.routing_type {
                RoutingType::HopByHopRouting => {
                    hop_by_hop_layers.insert(link.layer);
                }
                RoutingType::SourceRouting => {
                    touched.routes.extend(link.traversing_routes.keys().copied());
                    touched.segments.extend(link.traversing_segments.keys().copied());
                    touched.links.insert(*l);
                }
            }
        }
        // 节点上的资源跟随节点状态
        for n in &toggled_nodes {
            for r in &self.node(*n)?.resources {
                touched.resources.insert(*r);
                touched.routes.extend(self.resource(*r)?.traversing_routes.keys().copied());
            }
        }
        debug!(
            links = affected.len(),
            routes = touched.routes.len(),
            hop_by_hop_layers = hop_by_hop_layers.len(),
            "故障传播"
        );

        self.refresh(touched);
        for layer in hop_by_hop_layers {
            self.update_hop_by_hop_layer(layer)?;
        }
        info!(
            links_up = links_up.len(),
            links_down = links_down.len(),
            nodes_up = nodes_up.len(),
            nodes_down = nodes_down.len(),
            "⚡ 故障状态已更新"
        );
        self.after_mutation();
        Ok(())
    }

    pub fn set_link_failure_state(&mut self, link: LinkId, up: bool) -> Result<(), NetPlanError> {
        if up {
            self.set_links_and_nodes_failure_state(&[link], &[], &[], &[])
        } else {
            self.set_links_and_nodes_failure_state(&[], &[link], &[], &[])
        }
    }

    pub fn set_node_failure_state(&mut self, node: NodeId, up: bool) -> Result<(), NetPlanError> {
        if up {
            self.set_links_and_nodes_failure_state(&[], &[], &[node], &[])
        } else {
            self.set_links_and_nodes_failure_state(&[], &[], &[], &[node])
        }
    }

    /// SRG 的全部成员一起失效或修复
    pub fn set_srg_failure_state(&mut self, srg: SrgId, up: bool) -> Result<(), NetPlanError> {
        let s = self.srg(srg)?;
        let links: Vec<LinkId> = s.links.iter().copied().collect();
        let nodes: Vec<NodeId> = s.nodes.iter().copied().collect();
        if up {
            self.set_links_and_nodes_failure_state(&links, &[], &nodes, &[])
        } else {
            self.set_links_and_nodes_failure_state(&[], &links, &[], &nodes)
        }
    }

    /// 修复所有 down 的链路与节点
    pub fn set_all_links_and_nodes_up(&mut self) -> Result<(), NetPlanError> {
        let links: Vec<LinkId> = self
            .layers()
            .flat_map(|l| l.links_down.iter().copied())
            .collect();
        let nodes: Vec<NodeId> = self.nodes_down.iter().copied().collect();
        self.set_links_and_nodes_failure_state(&links, &[], &nodes, &[])
    }

    /// 某层当前 down 的链路
    pub fn links_down(&self, layer: LayerId) -> Result<&BTreeSet<LinkId>, NetPlanError> {
        Ok(&self.layer(layer)?.links_down)
    }
}
