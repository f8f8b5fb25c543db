//! 共享风险组（SRG）

use std::collections::BTreeSet;

use super::element::ElementMeta;
use super::id::{LinkId, NodeId, SrgId};

/// 一起失效的节点与链路集合
#[derive(Debug, Clone)]
pub struct SharedRiskGroup {
    pub(crate) meta: ElementMeta,
    pub(crate) nodes: BTreeSet<NodeId>,
    pub(crate) links: BTreeSet<LinkId>,
    pub(crate) mean_time_to_fail_hours: f64,
    pub(crate) mean_time_to_repair_hours: f64,
}

impl SharedRiskGroup {
    pub fn srg_id(&self) -> SrgId {
        SrgId(self.meta.id)
    }

    pub fn nodes(&self) -> &BTreeSet<NodeId> {
        &self.nodes
    }

    pub fn links(&self) -> &BTreeSet<LinkId> {
        &self.links
    }

    pub fn mean_time_to_fail_hours(&self) -> f64 {
        self.mean_time_to_fail_hours
    }

    pub fn mean_time_to_repair_hours(&self) -> f64 {
        self.mean_time_to_repair_hours
    }

    /// 稳态可用度 MTTF / (MTTF + MTTR)
    pub fn availability(&self) -> f64 {
        let total = self.mean_time_to_fail_hours + self.mean_time_to_repair_hours;
        if total == 0.0 {
            return 0.0;
        }
        self.mean_time_to_fail_hours / total
    }
}
