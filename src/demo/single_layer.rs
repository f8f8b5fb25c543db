//! 单层拓扑构建：线形与环形

use std::collections::BTreeMap;

use crate::net::{LinkId, NetPlan, NetPlanError, NodeId, PathElement};

/// 光纤中的默认传播速度（km/s）
const FIBER_SPEED_KM_PER_S: f64 = 200_000.0;

#[derive(Debug, Clone)]
pub struct LineOpts {
    pub nodes: usize,
    pub link_capacity: f64,
    pub link_length_km: f64,
    /// 首尾节点之间的需求流量（0 表示不建需求）
    pub end_to_end_traffic: f64,
}

impl Default for LineOpts {
    fn default() -> Self {
        Self {
            nodes: 3,
            link_capacity: 10.0,
            link_length_km: 100.0,
            end_to_end_traffic: 5.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RingOpts {
    pub nodes: usize,
    pub link_capacity: f64,
    pub link_length_km: f64,
    /// 每对相邻节点之间的需求流量
    pub neighbor_traffic: f64,
}

impl Default for RingOpts {
    fn default() -> Self {
        Self {
            nodes: 4,
            link_capacity: 100.0,
            link_length_km: 50.0,
            neighbor_traffic: 10.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SingleLayerTopology {
    pub nodes: Vec<NodeId>,
    /// 正向（i -> i+1）链路
    pub forward_links: Vec<LinkId>,
    /// 反向（i+1 -> i）链路
    pub backward_links: Vec<LinkId>,
}

fn add_nodes(plan: &mut NetPlan, n: usize) -> Result<Vec<NodeId>, NetPlanError> {
    (0..n)
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / n.max(1) as f64;
            plan.add_node(&format!("n{i}"), angle.cos(), angle.sin(), BTreeMap::new())
        })
        .collect()
}

/// 构建线形拓扑
///
/// 拓扑结构：n0 <-> n1 <-> ... <-> n(k-1)，每个方向一条链路。
/// 若 `end_to_end_traffic > 0`，在默认层加一条 n0 -> n(k-1) 的需求，并沿正向链路路由。
pub fn build_line(plan: &mut NetPlan, opts: &LineOpts) -> Result<SingleLayerTopology, NetPlanError> {
    if opts.nodes < 2 {
        return Err(NetPlanError::InvalidArgument("a line needs at least 2 nodes".into()));
    }
    let layer = plan.default_layer();
    let mut topo = SingleLayerTopology {
        nodes: add_nodes(plan, opts.nodes)?,
        ..Default::default()
    };
    for pair in topo.nodes.windows(2) {
        let (fwd, bwd) = plan.add_link_bidirectional(
            layer,
            pair[0],
            pair[1],
            opts.link_capacity,
            opts.link_length_km,
            FIBER_SPEED_KM_PER_S,
            BTreeMap::new(),
        )?;
        topo.forward_links.push(fwd);
        topo.backward_links.push(bwd);
    }

    if opts.end_to_end_traffic > 0.0 {
        let (first, last) = (topo.nodes[0], topo.nodes[opts.nodes - 1]);
        let d = plan.add_demand(layer, first, last, opts.end_to_end_traffic, BTreeMap::new())?;
        let path = topo.forward_links.iter().copied().map(PathElement::from).collect();
        plan.add_route(
            d,
            opts.end_to_end_traffic,
            opts.end_to_end_traffic,
            path,
            BTreeMap::new(),
            BTreeMap::new(),
        )?;
    }
    Ok(topo)
}

/// 构建环形拓扑
///
/// 每对相邻节点之间有双向链路；每个节点向顺时针邻居发一条需求，沿直连链路路由。
pub fn build_ring(plan: &mut NetPlan, opts: &RingOpts) -> Result<SingleLayerTopology, NetPlanError> {
    if opts.nodes < 3 {
        return Err(NetPlanError::InvalidArgument("a ring needs at least 3 nodes".into()));
    }
    let layer = plan.default_layer();
    let mut topo = SingleLayerTopology {
        nodes: add_nodes(plan, opts.nodes)?,
        ..Default::default()
    };
    for i in 0..opts.nodes {
        let (a, b) = (topo.nodes[i], topo.nodes[(i + 1) % opts.nodes]);
        let (fwd, bwd) = plan.add_link_bidirectional(
            layer,
            a,
            b,
            opts.link_capacity,
            opts.link_length_km,
            FIBER_SPEED_KM_PER_S,
            BTreeMap::new(),
        )?;
        topo.forward_links.push(fwd);
        topo.backward_links.push(bwd);
    }

    if opts.neighbor_traffic > 0.0 {
        for i in 0..opts.nodes {
            let (a, b) = (topo.nodes[i], topo.nodes[(i + 1) % opts.nodes]);
            let d = plan.add_demand(layer, a, b, opts.neighbor_traffic, BTreeMap::new())?;
            plan.add_route(
                d,
                opts.neighbor_traffic,
                opts.neighbor_traffic,
                vec![PathElement::Link(topo.forward_links[i])],
                BTreeMap::new(),
                BTreeMap::new(),
            )?;
        }
    }
    Ok(topo)
}
