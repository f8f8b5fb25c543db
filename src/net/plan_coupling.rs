//! 层间耦合
//!
//! 下层需求 d 与上层链路 e 耦合后，e 的容量始终等于 d 的承载流量。
//! 耦合关系双向记录（需求 -> 链路、链路 -> 需求），并在层 DAG 上登记为 lower -> upper 的边。

use std::collections::BTreeMap;

use tracing::info;

use super::error::NetPlanError;
use super::id::{DemandId, LayerId, LinkId};
use super::plan::NetPlan;

impl NetPlan {
    /// 校验耦合的全部前提；不修改任何状态
    fn validate_coupling(&self, demand: DemandId, upper: LayerId) -> Result<LayerId, NetPlanError> {
        let d = self.demand(demand)?;
        let lower = d.layer;
        if lower == upper {
            return Err(NetPlanError::Coupling(format!(
                "demand {demand} and the link are both in layer {lower}"
            )));
        }
        if d.coupled_link.is_some() {
            return Err(NetPlanError::Coupling(format!("demand {demand} is already coupled")));
        }
        let lower_units = &self.layer(lower)?.demand_traffic_units;
        let upper_units = &self.layer(upper)?.link_capacity_units;
        if lower_units != upper_units {
            return Err(NetPlanError::Coupling(format!(
                "demand traffic units {lower_units} differ from link capacity units {upper_units}"
            )));
        }
        if self.coupling.would_create_cycle(lower, upper) {
            return Err(NetPlanError::CouplingCycle { lower, upper });
        }
        Ok(lower)
    }

    /// 耦合下层需求与上层链路：两端节点必须一致，双方都未耦合，且不产生层环
    #[tracing::instrument(skip(self))]
    pub fn couple(&mut self, demand: DemandId, link: LinkId) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        let l = self.link(link)?;
        let upper = l.layer;
        let (origin, destination, link_coupled) = (l.origin, l.destination, l.coupled_demand.is_some());
        let lower = self.validate_coupling(demand, upper)?;
        let d = self.demand(demand)?;
        if d.ingress != origin || d.egress != destination {
            return Err(NetPlanError::Coupling(format!(
                "end nodes of demand {demand} and link {link} differ"
            )));
        }
        if link_coupled {
            return Err(NetPlanError::Coupling(format!("link {link} is already coupled")));
        }
        if !self.coupling.try_add_coupling(lower, upper, demand, link) {
            return Err(NetPlanError::CouplingCycle { lower, upper });
        }

        let carried = self.demand(demand)?.carried_traffic;
        self.demand_mut(demand)?.coupled_link = Some(link);
        let l = self.link_mut(link)?;
        l.coupled_demand = Some(demand);
        l.capacity = carried;
        info!(demand = %demand, link = %link, capacity = carried, "🔗 层间耦合");
        self.after_mutation();
        Ok(())
    }

    /// 在上层新建一条与需求同端点的链路并与之耦合
    pub fn couple_to_new_link_created(&mut self, demand: DemandId, upper: LayerId) -> Result<LinkId, NetPlanError> {
        self.ensure_modifiable()?;
        self.layer(upper)?;
        self.validate_coupling(demand, upper)?;
        let d = self.demand(demand)?;
        let (ingress, egress) = (d.ingress, d.egress);
        let link = self.add_link(upper, ingress, egress, 0.0, 0.0, f64::INFINITY, BTreeMap::new())?;
        self.couple(demand, link)?;
        Ok(link)
    }

    /// 在下层新建一条与链路同端点的需求并与之耦合
    pub fn couple_to_new_demand_created(&mut self, link: LinkId, lower: LayerId) -> Result<DemandId, NetPlanError> {
        self.ensure_modifiable()?;
        let l = self.link(link)?;
        let (upper, origin, destination) = (l.layer, l.origin, l.destination);
        if l.coupled_demand.is_some() {
            return Err(NetPlanError::Coupling(format!("link {link} is already coupled")));
        }
        self.layer(lower)?;
        if lower == upper {
            return Err(NetPlanError::Coupling(format!("link {link} is in layer {lower}")));
        }
        if self.layer(lower)?.demand_traffic_units != self.layer(upper)?.link_capacity_units {
            return Err(NetPlanError::Coupling("demand traffic units differ from link capacity units".into()));
        }
        if self.coupling.would_create_cycle(lower, upper) {
            return Err(NetPlanError::CouplingCycle { lower, upper });
        }
        let demand = self.add_demand(lower, origin, destination, 0.0, BTreeMap::new())?;
        self.couple(demand, link)?;
        Ok(demand)
    }

    /// 解除需求的耦合；链路保留当前容量并恢复为可直接设置
    pub fn decouple_demand(&mut self, demand: DemandId) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        if self.demand(demand)?.coupled_link.is_none() {
            return Err(NetPlanError::Coupling(format!("demand {demand} is not coupled")));
        }
        self.decouple_demand_internal(demand)?;
        self.after_mutation();
        Ok(())
    }

    pub fn decouple_link(&mut self, link: LinkId) -> Result<(), NetPlanError> {
        self.ensure_modifiable()?;
        if self.link(link)?.coupled_demand.is_none() {
            return Err(NetPlanError::Coupling(format!("link {link} is not coupled")));
        }
        self.decouple_link_internal(link)?;
        self.after_mutation();
        Ok(())
    }

    pub(crate) fn decouple_demand_internal(&mut self, demand: DemandId) -> Result<(), NetPlanError> {
        match self.demand(demand)?.coupled_link {
            Some(link) => self.decouple_pair(demand, link),
            None => Ok(()),
        }
    }

    pub(crate) fn decouple_link_internal(&mut self, link: LinkId) -> Result<(), NetPlanError> {
        match self.link(link)?.coupled_demand {
            Some(demand) => self.decouple_pair(demand, link),
            None => Ok(()),
        }
    }

    fn decouple_pair(&mut self, demand: DemandId, link: LinkId) -> Result<(), NetPlanError> {
        let lower = self.demand(demand)?.layer;
        let upper = self.link(link)?.layer;
        self.coupling.remove_coupling(lower, upper, demand, link);
        self.demand_mut(demand)?.coupled_link = None;
        self.link_mut(link)?.coupled_demand = None;
        info!(demand = %demand, link = %link, "✂️  解除层间耦合");
        Ok(())
    }
}
