//! 逐跳路由求解
//!
//! 把一个需求的转发规则看作吸收马尔可夫链：Q[i][j] 为节点 i 上经由链路到达 j 的比例之和，
//! 出口节点一行置 0（吸收）。基本矩阵 N = (I - Q)^-1 的第 ingress 行给出各节点的期望到达量。
//!
//! - I - Q 奇异：存在流量无法离开的闭合环路（ClosedCycles）。无法逃逸的节点被改为吸收态后再求解，
//!   被困在环中的流量只计入进入环的链路，环内链路不再承载流量，也永远不会送达。
//! - 否则只要某个对角元与 1 的偏差超过容差，就存在开放环路（OpenCycles）。
//! - 其余情况为无环（Loopless）。

use std::collections::VecDeque;

use super::demand::RoutingCycleType;
use super::id::LinkId;

/// 参与求解的一条可用链路
#[derive(Debug, Clone, Copy)]
pub(crate) struct ForwardingEdge {
    pub link: LinkId,
    pub from: usize,
    pub to: usize,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HopByHopOutcome {
    pub cycle_type: RoutingCycleType,
    /// 送达出口的流量
    pub carried_traffic: f64,
    /// 每条链路上的流量 x_de（只包含非零项）
    pub link_traffic: Vec<(LinkId, f64)>,
}

/// 行优先的稠密方阵
#[derive(Debug, Clone, PartialEq)]
struct SquareMatrix {
    n: usize,
    data: Vec<f64>,
}

impl SquareMatrix {
    fn identity(n: usize) -> Self {
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            data[i * n + i] = 1.0;
        }
        Self { n, data }
    }

    fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    fn add(&mut self, i: usize, j: usize, v: f64) {
        self.data[i * self.n + j] += v;
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for j in 0..self.n {
            self.data.swap(a * self.n + j, b * self.n + j);
        }
    }

    /// Gauss-Jordan 消元求逆（部分主元）。主元绝对值低于 `singular_below` 视为奇异。
    fn inverse(&self, singular_below: f64) -> Option<SquareMatrix> {
        let n = self.n;
        let mut a = self.clone();
        let mut inv = SquareMatrix::identity(n);
        for col in 0..n {
            let mut pivot_row = col;
            let mut best = a.get(col, col).abs();
            for r in (col + 1)..n {
                let v = a.get(r, col).abs();
                if v > best {
                    best = v;
                    pivot_row = r;
                }
            }
            if best < singular_below {
                return None;
            }
            a.swap_rows(col, pivot_row);
            inv.swap_rows(col, pivot_row);

            let pivot = a.get(col, col);
            for j in 0..n {
                a.data[col * n + j] /= pivot;
                inv.data[col * n + j] /= pivot;
            }
            for r in 0..n {
                if r == col {
                    continue;
                }
                let factor = a.get(r, col);
                if factor == 0.0 {
                    continue;
                }
                for j in 0..n {
                    a.data[r * n + j] -= factor * a.data[col * n + j];
                    inv.data[r * n + j] -= factor * inv.data[col * n + j];
                }
            }
        }
        Some(inv)
    }
}

fn i_minus_q(n: usize, egress: usize, edges: &[ForwardingEdge], absorbing: &[bool]) -> SquareMatrix {
    let mut m = SquareMatrix::identity(n);
    for e in edges {
        if e.from == egress || absorbing[e.from] {
            continue;
        }
        m.add(e.from, e.to, -e.ratio);
    }
    m
}

/// 无法到达出口、也不会把流量泄漏出网络的节点（闭合类）
fn trapped_nodes(n: usize, egress: usize, edges: &[ForwardingEdge], tolerance: f64) -> Vec<bool> {
    let mut out_sum = vec![0.0; n];
    let mut rev_adj: Vec<Vec<usize>> = vec![Vec::new(); n];
    for e in edges {
        if e.from == egress || e.ratio <= 0.0 {
            continue;
        }
        out_sum[e.from] += e.ratio;
        rev_adj[e.to].push(e.from);
    }

    let mut escapes = vec![false; n];
    let mut q: VecDeque<usize> = VecDeque::new();
    for i in 0..n {
        if i == egress || out_sum[i] < 1.0 - tolerance {
            escapes[i] = true;
            q.push_back(i);
        }
    }
    while let Some(v) = q.pop_front() {
        for &pred in &rev_adj[v] {
            if !escapes[pred] {
                escapes[pred] = true;
                q.push_back(pred);
            }
        }
    }
    escapes.into_iter().map(|e| !e).collect()
}

/// 求解一个需求的逐跳路由状态
pub(crate) fn solve_demand(
    num_nodes: usize,
    ingress: usize,
    egress: usize,
    offered_traffic: f64,
    edges: &[ForwardingEdge],
    tolerance: f64,
) -> HopByHopOutcome {
    let singular_below = tolerance * tolerance;
    let no_absorbing = vec![false; num_nodes];

    let (cycle_type, absorbing, fundamental) =
        match i_minus_q(num_nodes, egress, edges, &no_absorbing).inverse(singular_below) {
            Some(fundamental) => {
                let open = (0..num_nodes).any(|i| (fundamental.get(i, i) - 1.0).abs() > tolerance);
                let kind = if open {
                    RoutingCycleType::OpenCycles
                } else {
                    RoutingCycleType::Loopless
                };
                (kind, no_absorbing.clone(), Some(fundamental))
            }
            None => {
                // 困在闭合环中的节点改为吸收态：流量到达一次后不再转发，也不会送达
                let trapped = trapped_nodes(num_nodes, egress, edges, tolerance);
                let fundamental = i_minus_q(num_nodes, egress, edges, &trapped).inverse(singular_below);
                (RoutingCycleType::ClosedCycles, trapped, fundamental)
            }
        };

    let Some(fundamental) = fundamental else {
        return HopByHopOutcome {
            cycle_type,
            carried_traffic: 0.0,
            link_traffic: Vec::new(),
        };
    };

    let visits: Vec<f64> = (0..num_nodes)
        .map(|j| offered_traffic * fundamental.get(ingress, j))
        .collect();

    let mut link_traffic = Vec::new();
    for e in edges {
        if e.from == egress || absorbing[e.from] {
            continue;
        }
        let x = visits[e.from] * e.ratio;
        if x > 0.0 {
            link_traffic.push((e.link, x));
        }
    }

    HopByHopOutcome {
        cycle_type,
        carried_traffic: visits[egress].max(0.0),
        link_traffic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(link: u64, from: usize, to: usize, ratio: f64) -> ForwardingEdge {
        ForwardingEdge {
            link: LinkId(link),
            from,
            to,
            ratio,
        }
    }

    #[test]
    fn inverse_of_identity_is_identity() {
        let m = SquareMatrix::identity(3);
        assert_eq!(m.inverse(1e-9), Some(SquareMatrix::identity(3)));
    }

    #[test]
    fn single_path_is_loopless_and_delivers_everything() {
        let edges = [edge(10, 0, 1, 1.0), edge(11, 1, 2, 1.0)];
        let out = solve_demand(3, 0, 2, 5.0, &edges, 1e-3);
        assert_eq!(out.cycle_type, RoutingCycleType::Loopless);
        assert!((out.carried_traffic - 5.0).abs() < 1e-9);
        assert_eq!(out.link_traffic.len(), 2);
    }

    #[test]
    fn open_cycle_still_delivers() {
        // 0 -> 1, 1 -> 0 with 0.5, 1 -> 2 with 0.5
        let edges = [edge(10, 0, 1, 1.0), edge(11, 1, 0, 0.5), edge(12, 1, 2, 0.5)];
        let out = solve_demand(3, 0, 2, 4.0, &edges, 1e-3);
        assert_eq!(out.cycle_type, RoutingCycleType::OpenCycles);
        assert!((out.carried_traffic - 4.0).abs() < 1e-9);
    }

    #[test]
    fn closed_cycle_never_delivers() {
        let edges = [edge(10, 0, 1, 1.0), edge(11, 1, 0, 1.0)];
        let out = solve_demand(3, 0, 2, 5.0, &edges, 1e-3);
        assert_eq!(out.cycle_type, RoutingCycleType::ClosedCycles);
        assert_eq!(out.carried_traffic, 0.0);
        // 入口本身被困住，没有链路承载流量
        assert!(out.link_traffic.is_empty());
    }

    #[test]
    fn traffic_entering_a_closed_cycle_stops_at_its_entry() {
        // 0 -> 2 (出口) 0.5，0 -> 1 0.5，1 <-> 3 闭环
        let edges = [
            edge(10, 0, 2, 0.5),
            edge(11, 0, 1, 0.5),
            edge(12, 1, 3, 1.0),
            edge(13, 3, 1, 1.0),
        ];
        let out = solve_demand(4, 0, 2, 4.0, &edges, 1e-3);
        assert_eq!(out.cycle_type, RoutingCycleType::ClosedCycles);
        assert!((out.carried_traffic - 2.0).abs() < 1e-9);
        assert_eq!(out.link_traffic, vec![(LinkId(10), 2.0), (LinkId(11), 2.0)]);
    }

    #[test]
    fn partial_split_loses_the_remainder() {
        let edges = [edge(10, 0, 1, 0.6), edge(11, 1, 2, 1.0)];
        let out = solve_demand(3, 0, 2, 10.0, &edges, 1e-3);
        assert_eq!(out.cycle_type, RoutingCycleType::Loopless);
        assert!((out.carried_traffic - 6.0).abs() < 1e-9);
    }
}
