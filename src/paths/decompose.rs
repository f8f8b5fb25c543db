//! 链路流量 -> 路径分解
//!
//! 从入口出发，每次沿剩余流量最大的出链路前进：到达出口即得到一条路径并扣除瓶颈流量；
//! 遇到环则扣除环上最小流量（环流量不属于任何端到端路径）；走进没有剩余出流量的节点时扣除已走部分的瓶颈流量。
//! 每轮至少清零一条链路，因此必然终止。

use std::collections::BTreeMap;

use crate::net::{LinkId, NodeId};

/// 把单个需求的链路流量 `(链路, 起点, 终点, 流量)` 分解为无环路径及其流量
pub fn decompose_link_flows(
    ingress: NodeId,
    egress: NodeId,
    flows: &[(LinkId, NodeId, NodeId, f64)],
    tolerance: f64,
) -> Vec<(Vec<LinkId>, f64)> {
    let mut residual: BTreeMap<LinkId, (NodeId, NodeId, f64)> = flows
        .iter()
        .filter(|(_, _, _, x)| *x > tolerance)
        .map(|&(l, a, b, x)| (l, (a, b, x)))
        .collect();
    let mut paths = Vec::new();
    if ingress == egress {
        return paths;
    }

    'outer: loop {
        let mut path: Vec<LinkId> = Vec::new();
        let mut visited: BTreeMap<NodeId, usize> = BTreeMap::new();
        let mut node = ingress;
        visited.insert(node, 0);

        loop {
            if node == egress {
                let amount = path
                    .iter()
                    .map(|l| residual[l].2)
                    .fold(f64::INFINITY, f64::min);
                subtract(&mut residual, &path, amount, tolerance);
                paths.push((path, amount));
                continue 'outer;
            }

            // 剩余流量最大的出链路，相同时取 id 最小者
            let next = residual
                .iter()
                .filter(|(_, (a, _, x))| *a == node && *x > tolerance)
                .fold(None::<(LinkId, NodeId, f64)>, |best, (l, (_, b, x))| match best {
                    Some((_, _, bx)) if bx >= *x => best,
                    _ => Some((*l, *b, *x)),
                });
            let Some((link, to, _)) = next else {
                if path.is_empty() {
                    break 'outer;
                }
                // 死胡同：这部分流量到不了出口，扣除后继续分解其余流量
                let amount = path
                    .iter()
                    .map(|l| residual[l].2)
                    .fold(f64::INFINITY, f64::min);
                subtract(&mut residual, &path, amount, tolerance);
                continue 'outer;
            };
            path.push(link);

            if let Some(&start) = visited.get(&to) {
                let cycle = &path[start..];
                let amount = cycle
                    .iter()
                    .map(|l| residual[l].2)
                    .fold(f64::INFINITY, f64::min);
                let cycle = cycle.to_vec();
                subtract(&mut residual, &cycle, amount, tolerance);
                continue 'outer;
            }
            visited.insert(to, path.len());
            node = to;
        }
    }
    paths
}

fn subtract(residual: &mut BTreeMap<LinkId, (NodeId, NodeId, f64)>, links: &[LinkId], amount: f64, tolerance: f64) {
    for l in links {
        if let Some(entry) = residual.get_mut(l) {
            entry.2 -= amount;
            if entry.2 <= tolerance {
                entry.2 = 0.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_parallel_branches() {
        let flows = [
            (LinkId(1), NodeId(0), NodeId(1), 3.0),
            (LinkId(2), NodeId(1), NodeId(3), 3.0),
            (LinkId(3), NodeId(0), NodeId(2), 2.0),
            (LinkId(4), NodeId(2), NodeId(3), 2.0),
        ];
        let paths = decompose_link_flows(NodeId(0), NodeId(3), &flows, 1e-3);
        assert_eq!(
            paths,
            vec![
                (vec![LinkId(1), LinkId(2)], 3.0),
                (vec![LinkId(3), LinkId(4)], 2.0)
            ]
        );
    }

    #[test]
    fn cycle_flow_is_dropped() {
        // 0->1->2，另有 1<->4 的环流
        let flows = [
            (LinkId(1), NodeId(0), NodeId(1), 5.0),
            (LinkId(2), NodeId(1), NodeId(4), 9.0),
            (LinkId(3), NodeId(4), NodeId(1), 9.0),
            (LinkId(4), NodeId(1), NodeId(2), 5.0),
        ];
        let paths = decompose_link_flows(NodeId(0), NodeId(2), &flows, 1e-3);
        assert_eq!(paths, vec![(vec![LinkId(1), LinkId(4)], 5.0)]);
    }

    #[test]
    fn dead_end_branch_does_not_hide_delivered_paths() {
        // 0->1 的流量在 1 处被丢弃，0->2->3 的流量送达
        let flows = [
            (LinkId(1), NodeId(0), NodeId(1), 5.0),
            (LinkId(2), NodeId(0), NodeId(2), 5.0),
            (LinkId(3), NodeId(2), NodeId(3), 5.0),
        ];
        let paths = decompose_link_flows(NodeId(0), NodeId(3), &flows, 1e-3);
        assert_eq!(paths, vec![(vec![LinkId(2), LinkId(3)], 5.0)]);
    }

    #[test]
    fn partial_drop_deep_in_the_path_keeps_the_rest() {
        // 0->1 送 8，1 处丢 3，1->2 送 5
        let flows = [
            (LinkId(1), NodeId(0), NodeId(1), 8.0),
            (LinkId(2), NodeId(1), NodeId(2), 5.0),
        ];
        let paths = decompose_link_flows(NodeId(0), NodeId(2), &flows, 1e-3);
        assert_eq!(paths, vec![(vec![LinkId(1), LinkId(2)], 5.0)]);
    }
}
