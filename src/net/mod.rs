//! 网络规划模型模块
//!
//! 此模块包含多层网络规划的核心组件：节点、链路、需求、路由、保护段、层，
//! 以及负责维护所有缓存一致性的聚合根 `NetPlan`。

// 子模块声明
mod id;
mod element;
mod error;
mod node;
mod link;
mod demand;
mod route;
mod segment;
mod srg;
mod resource;
mod layer;
mod coupling;
mod hop_by_hop;
mod plan;
mod plan_topology;
mod plan_traffic;
mod plan_routing;
mod plan_failure;
mod plan_coupling;
mod check;

// 重新导出公共接口
pub use id::{
    DemandId, ElementKind, LayerId, LinkId, NetworkElementId, NodeId, PathElement, ResourceId, RouteId,
    SegmentId, SrgId,
};
pub use element::{ElementMeta, NetworkElement};
pub use error::{ConsistencyError, NetPlanError};
pub use node::Node;
pub use link::Link;
pub use demand::{Demand, RoutingCycleType};
pub use route::Route;
pub use segment::ProtectionSegment;
pub use srg::SharedRiskGroup;
pub use resource::Resource;
pub use layer::{Layer, RoutingType};
pub use coupling::LayerCouplingDag;
pub use plan::{DEFAULT_LAYER_NAME, DEFAULT_TRAFFIC_UNITS, NetPlan};
