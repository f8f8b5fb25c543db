//! 两层 IP-over-WDM 拓扑构建

use std::collections::BTreeMap;

use tracing::info;

use crate::net::{DemandId, LayerId, LinkId, NetPlan, NetPlanError, NodeId, PathElement, SrgId};

const FIBER_SPEED_KM_PER_S: f64 = 200_000.0;

#[derive(Debug, Clone)]
pub struct IpOverWdmOpts {
    /// 环上的节点数
    pub nodes: usize,
    pub fiber_capacity_gbps: f64,
    pub fiber_length_km: f64,
    /// 每条光路的速率；也是对应 IP 链路的容量
    pub lightpath_gbps: f64,
    /// 每个节点到隔一跳节点的 IP 需求流量
    pub ip_traffic_gbps: f64,
    /// 每对光纤一个 SRG
    pub fiber_srgs: bool,
}

impl Default for IpOverWdmOpts {
    fn default() -> Self {
        Self {
            nodes: 4,
            fiber_capacity_gbps: 400.0,
            fiber_length_km: 80.0,
            lightpath_gbps: 100.0,
            ip_traffic_gbps: 20.0,
            fiber_srgs: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IpOverWdmTopology {
    pub wdm: LayerId,
    pub ip: LayerId,
    pub nodes: Vec<NodeId>,
    /// 每对相邻节点的 (正向, 反向) 光纤
    pub fibers: Vec<(LinkId, LinkId)>,
    /// 光路需求（WDM 层），与 `ip_links` 一一耦合
    pub lightpaths: Vec<DemandId>,
    pub ip_links: Vec<LinkId>,
    pub ip_demands: Vec<DemandId>,
    pub srgs: Vec<SrgId>,
}

impl IpOverWdmTopology {
    /// 与 IP 链路耦合的光路需求
    pub fn lightpath_of(&self, ip_link: LinkId) -> Option<DemandId> {
        self.ip_links
            .iter()
            .position(|l| *l == ip_link)
            .map(|i| self.lightpaths[i])
    }
}

/// 构建两层环网
///
/// 下层（默认层，改名为 WDM）是光纤环；每条光纤方向上一条光路需求，
/// 光路与上层（IP）新建的链路耦合。IP 需求按最短路由在 IP 链路上。
pub fn build_ip_over_wdm(plan: &mut NetPlan, opts: &IpOverWdmOpts) -> Result<IpOverWdmTopology, NetPlanError> {
    let n = opts.nodes;
    if n < 3 {
        return Err(NetPlanError::InvalidArgument("an IP-over-WDM ring needs at least 3 nodes".into()));
    }
    let wdm = plan.default_layer();
    plan.set_layer_name(wdm, "WDM")?;
    let ip = plan.add_layer("IP", "packet layer", "Gbps", "Gbps", BTreeMap::new())?;

    let nodes = (0..n)
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / n as f64;
            plan.add_node(&format!("oxc{i}"), angle.cos(), angle.sin(), BTreeMap::new())
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut topo = IpOverWdmTopology {
        wdm,
        ip,
        nodes,
        fibers: Vec::with_capacity(n),
        lightpaths: Vec::new(),
        ip_links: Vec::new(),
        ip_demands: Vec::new(),
        srgs: Vec::new(),
    };

    for i in 0..n {
        let (a, b) = (topo.nodes[i], topo.nodes[(i + 1) % n]);
        let pair = plan.add_link_bidirectional(
            wdm,
            a,
            b,
            opts.fiber_capacity_gbps,
            opts.fiber_length_km,
            FIBER_SPEED_KM_PER_S,
            BTreeMap::new(),
        )?;
        topo.fibers.push(pair);
        if opts.fiber_srgs {
            let srg = plan.add_srg(8760.0, 12.0, BTreeMap::new())?;
            plan.add_link_to_srg(srg, pair.0)?;
            plan.add_link_to_srg(srg, pair.1)?;
            topo.srgs.push(srg);
        }
    }

    // 光路：每条光纤方向一条，直接承载在该光纤上
    for &(fwd, bwd) in &topo.fibers.clone() {
        for fiber in [fwd, bwd] {
            let l = plan.link(fiber)?;
            let (o, d) = (l.origin(), l.destination());
            let lp = plan.add_demand(wdm, o, d, opts.lightpath_gbps, BTreeMap::new())?;
            plan.add_route(
                lp,
                opts.lightpath_gbps,
                opts.lightpath_gbps,
                vec![PathElement::Link(fiber)],
                BTreeMap::new(),
                BTreeMap::new(),
            )?;
            let ip_link = plan.couple_to_new_link_created(lp, ip)?;
            plan.set_link_length(ip_link, opts.fiber_length_km)?;
            topo.lightpaths.push(lp);
            topo.ip_links.push(ip_link);
        }
    }

    if opts.ip_traffic_gbps > 0.0 {
        for i in 0..n {
            let (a, b) = (topo.nodes[i], topo.nodes[(i + 2) % n]);
            if a == b {
                continue;
            }
            let d = plan.add_demand(ip, a, b, opts.ip_traffic_gbps, BTreeMap::new())?;
            let paths = plan.compute_shortest_path_routes(d, |_| 1.0)?;
            let Some(path) = paths.into_iter().next() else {
                return Err(NetPlanError::NoPath(d));
            };
            plan.add_route(
                d,
                opts.ip_traffic_gbps,
                opts.ip_traffic_gbps,
                path.into_iter().map(PathElement::from).collect(),
                BTreeMap::new(),
                BTreeMap::new(),
            )?;
            topo.ip_demands.push(d);
        }
    }

    info!(nodes = n, ip_links = topo.ip_links.len(), "🌐 IP-over-WDM 拓扑构建完成");
    Ok(topo)
}
