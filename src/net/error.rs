//! 错误类型
//!
//! `NetPlanError`：调用方可恢复的错误（参数校验失败、结构上不可能的操作）；
//! `ConsistencyError`：一致性检查发现的内部缓存不一致，属于引擎缺陷。

use thiserror::Error;

use super::id::{DemandId, ElementKind, LayerId, LinkId, RouteId};
use super::layer::RoutingType;

#[derive(Debug, Error)]
pub enum NetPlanError {
    #[error("the network plan is not modifiable")]
    NotModifiable,

    #[error("{kind} {id} does not exist in this plan (removed or foreign)")]
    NotFound { kind: ElementKind, id: u64 },

    #[error("{kind} {id} does not belong to layer {layer}")]
    WrongLayer {
        kind: ElementKind,
        id: u64,
        layer: LayerId,
    },

    #[error("{what} must be non-negative and finite, got {value}")]
    InvalidQuantity { what: &'static str, value: f64 },

    #[error("origin and destination must differ (node {0})")]
    SelfLoop(u64),

    #[error("layer {layer} must use {expected:?} for this operation")]
    WrongRoutingType {
        layer: LayerId,
        expected: RoutingType,
    },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid forwarding rule: {0}")]
    InvalidForwardingRule(String),

    #[error("matrix size mismatch: expected {expected_rows}x{expected_cols}, got {rows}x{cols}")]
    MatrixSize {
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: usize,
    },

    #[error("coupling demand of layer {lower} to a link of layer {upper} would create a layer cycle")]
    CouplingCycle { lower: LayerId, upper: LayerId },

    #[error("coupling rejected: {0}")]
    Coupling(String),

    #[error("capacity of link {0} is derived from its coupled demand")]
    CoupledLinkCapacity(LinkId),

    #[error("route {route} cannot be reverted: {reason}")]
    RevertImpossible { route: RouteId, reason: String },

    #[error("demand {0} has no feasible path")]
    NoPath(DemandId),

    #[error("cannot remove the last layer of the plan")]
    LastLayer,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// 一致性检查发现的首个违例
#[derive(Debug, Clone, Error)]
#[error("consistency violation at {element}: {detail}")]
pub struct ConsistencyError {
    pub element: String,
    pub detail: String,
}

impl ConsistencyError {
    pub(crate) fn new(element: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            element: element.into(),
            detail: detail.into(),
        }
    }
}
