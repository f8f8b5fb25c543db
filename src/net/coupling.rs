//! 层间耦合 DAG
//!
//! 顶点为层，边 lower -> upper 上记录该层对之间所有的 (需求, 链路) 耦合。
//! 任何会产生环的耦合都必须被拒绝，且 DAG 保持不变。

use petgraph::algo::{has_path_connecting, is_cyclic_directed};
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use std::collections::BTreeSet;

use super::id::{DemandId, LayerId, LinkId};

#[derive(Debug, Clone, Default)]
pub struct LayerCouplingDag {
    graph: DiGraphMap<LayerId, BTreeSet<(DemandId, LinkId)>>,
}

impl LayerCouplingDag {
    pub(crate) fn add_layer(&mut self, layer: LayerId) {
        self.graph.add_node(layer);
    }

    pub(crate) fn remove_layer(&mut self, layer: LayerId) {
        self.graph.remove_node(layer);
    }

    /// 添加 lower -> upper 上的一条耦合；若会成环则返回 false 且不做任何修改。
    pub(crate) fn try_add_coupling(
        &mut self,
        lower: LayerId,
        upper: LayerId,
        demand: DemandId,
        link: LinkId,
    ) -> bool {
        if self.would_create_cycle(lower, upper) {
            return false;
        }
        if let Some(set) = self.graph.edge_weight_mut(lower, upper) {
            set.insert((demand, link));
            return true;
        }
        self.graph
            .add_edge(lower, upper, BTreeSet::from([(demand, link)]));
        true
    }

    /// 添加 lower -> upper 边是否会成环（已存在的边不会）
    pub fn would_create_cycle(&self, lower: LayerId, upper: LayerId) -> bool {
        if lower == upper {
            return true;
        }
        if self.graph.contains_edge(lower, upper) {
            return false;
        }
        has_path_connecting(&self.graph, upper, lower, None)
    }

    /// 删除一条耦合；该层对之间最后一条耦合被删除时同时删除边。
    pub(crate) fn remove_coupling(
        &mut self,
        lower: LayerId,
        upper: LayerId,
        demand: DemandId,
        link: LinkId,
    ) {
        let now_empty = match self.graph.edge_weight_mut(lower, upper) {
            Some(set) => {
                set.remove(&(demand, link));
                set.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.graph.remove_edge(lower, upper);
        }
    }

    pub fn contains_layer(&self, layer: LayerId) -> bool {
        self.graph.contains_node(layer)
    }

    pub fn layer_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_coupled(&self, lower: LayerId, upper: LayerId) -> bool {
        self.graph.contains_edge(lower, upper)
    }

    pub fn couplings(&self, lower: LayerId, upper: LayerId) -> Option<&BTreeSet<(DemandId, LinkId)>> {
        self.graph.edge_weight(lower, upper)
    }

    /// 所有 (lower, upper, 耦合集合) 边
    pub fn edges(&self) -> impl Iterator<Item = (LayerId, LayerId, &BTreeSet<(DemandId, LinkId)>)> {
        self.graph.all_edges()
    }

    /// 直接位于 `layer` 之上的层
    pub fn upper_layers(&self, layer: LayerId) -> Vec<LayerId> {
        self.graph
            .neighbors_directed(layer, Direction::Outgoing)
            .collect()
    }

    /// 直接位于 `layer` 之下的层
    pub fn lower_layers(&self, layer: LayerId) -> Vec<LayerId> {
        self.graph
            .neighbors_directed(layer, Direction::Incoming)
            .collect()
    }

    pub fn is_acyclic(&self) -> bool {
        !is_cyclic_directed(&self.graph)
    }
}
