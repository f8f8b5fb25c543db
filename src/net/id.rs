//! 标识符类型
//!
//! 所有网络元素共享一个全局递增的永久 id（不复用、不重编号）；
//! 每种元素用独立的新类型包装，避免不同种类的 id 混用。

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! element_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

element_id!(
    /// 节点标识符
    NodeId, "n"
);
element_id!(
    /// 链路标识符
    LinkId, "e"
);
element_id!(
    /// 业务需求标识符
    DemandId, "d"
);
element_id!(
    /// 路由标识符
    RouteId, "r"
);
element_id!(
    /// 保护段标识符
    SegmentId, "s"
);
element_id!(
    /// 网络层标识符
    LayerId, "L"
);
element_id!(
    /// 共享风险组标识符
    SrgId, "srg"
);
element_id!(
    /// 资源标识符
    ResourceId, "res"
);

/// 元素种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Node,
    Link,
    Demand,
    Route,
    ProtectionSegment,
    Layer,
    Srg,
    Resource,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ElementKind::Node => "node",
            ElementKind::Link => "link",
            ElementKind::Demand => "demand",
            ElementKind::Route => "route",
            ElementKind::ProtectionSegment => "protection segment",
            ElementKind::Layer => "layer",
            ElementKind::Srg => "srg",
            ElementKind::Resource => "resource",
        };
        f.write_str(s)
    }
}

/// 任意网络元素的句柄（封闭枚举）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NetworkElementId {
    Node(NodeId),
    Link(LinkId),
    Demand(DemandId),
    Route(RouteId),
    Segment(SegmentId),
    Layer(LayerId),
    Srg(SrgId),
    Resource(ResourceId),
}

impl NetworkElementId {
    pub fn raw(&self) -> u64 {
        match *self {
            NetworkElementId::Node(id) => id.0,
            NetworkElementId::Link(id) => id.0,
            NetworkElementId::Demand(id) => id.0,
            NetworkElementId::Route(id) => id.0,
            NetworkElementId::Segment(id) => id.0,
            NetworkElementId::Layer(id) => id.0,
            NetworkElementId::Srg(id) => id.0,
            NetworkElementId::Resource(id) => id.0,
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            NetworkElementId::Node(_) => ElementKind::Node,
            NetworkElementId::Link(_) => ElementKind::Link,
            NetworkElementId::Demand(_) => ElementKind::Demand,
            NetworkElementId::Route(_) => ElementKind::Route,
            NetworkElementId::Segment(_) => ElementKind::ProtectionSegment,
            NetworkElementId::Layer(_) => ElementKind::Layer,
            NetworkElementId::Srg(_) => ElementKind::Srg,
            NetworkElementId::Resource(_) => ElementKind::Resource,
        }
    }

    pub(crate) fn from_kind(kind: ElementKind, raw: u64) -> Self {
        match kind {
            ElementKind::Node => NetworkElementId::Node(NodeId(raw)),
            ElementKind::Link => NetworkElementId::Link(LinkId(raw)),
            ElementKind::Demand => NetworkElementId::Demand(DemandId(raw)),
            ElementKind::Route => NetworkElementId::Route(RouteId(raw)),
            ElementKind::ProtectionSegment => NetworkElementId::Segment(SegmentId(raw)),
            ElementKind::Layer => NetworkElementId::Layer(LayerId(raw)),
            ElementKind::Srg => NetworkElementId::Srg(SrgId(raw)),
            ElementKind::Resource => NetworkElementId::Resource(ResourceId(raw)),
        }
    }
}

/// 路由经过的元素：链路、保护段或资源
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PathElement {
    Link(LinkId),
    Segment(SegmentId),
    Resource(ResourceId),
}

impl From<LinkId> for PathElement {
    fn from(id: LinkId) -> Self {
        PathElement::Link(id)
    }
}

impl From<SegmentId> for PathElement {
    fn from(id: SegmentId) -> Self {
        PathElement::Segment(id)
    }
}

impl From<ResourceId> for PathElement {
    fn from(id: ResourceId) -> Self {
        PathElement::Resource(id)
    }
}
