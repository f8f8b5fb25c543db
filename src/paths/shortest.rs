//! 全部等价最短路
//!
//! 在状态图 (节点, 已满足的资源类型数) 上做 Dijkstra，同时记录所有代价相同
//! （容差内）的前驱，然后从终点反向枚举全部最优路径。
//! 不带资源约束的最短路就是资源序列为空的特例。

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use crate::net::{LinkId, NodeId, PathElement, ResourceId};

/// 参与计算的链路及其代价
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateLink {
    pub id: LinkId,
    pub origin: NodeId,
    pub destination: NodeId,
    pub cost: f64,
}

/// 参与计算的资源及其代价
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateResource {
    pub id: ResourceId,
    pub host: NodeId,
    pub resource_type: String,
    pub cost: f64,
}

type State = (NodeId, usize);

#[derive(Debug, Clone, Copy, PartialEq)]
struct Entry {
    cost: f64,
    state: State,
}

impl Eq for Entry {}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap 是大顶堆，这里反过来比较得到小顶堆
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.state.cmp(&self.state))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// 从 `from` 到 `to` 的全部最小代价链路序列；不可达时返回空
pub fn all_shortest_paths(links: &[CandidateLink], from: NodeId, to: NodeId, tolerance: f64) -> Vec<Vec<LinkId>> {
    all_min_cost_service_chains(links, &[], &[], from, to, tolerance)
        .into_iter()
        .map(|path| {
            path.into_iter()
                .filter_map(|e| match e {
                    PathElement::Link(l) => Some(l),
                    _ => None,
                })
                .collect()
        })
        .collect()
}

/// 按顺序依次经过 `resource_types` 中每种资源的全部最小代价服务链
///
/// 资源只能在其宿主节点处被经过；代价为负或非有限的链路/资源被忽略。
pub fn all_min_cost_service_chains(
    links: &[CandidateLink],
    resources: &[CandidateResource],
    resource_types: &[String],
    from: NodeId,
    to: NodeId,
    tolerance: f64,
) -> Vec<Vec<PathElement>> {
    let stages = resource_types.len();
    let usable = |cost: f64| cost.is_finite() && cost >= 0.0;

    let mut out_links: BTreeMap<NodeId, Vec<&CandidateLink>> = BTreeMap::new();
    for l in links.iter().filter(|l| usable(l.cost)) {
        out_links.entry(l.origin).or_default().push(l);
    }
    let mut hosted: BTreeMap<NodeId, Vec<&CandidateResource>> = BTreeMap::new();
    for r in resources.iter().filter(|r| usable(r.cost)) {
        hosted.entry(r.host).or_default().push(r);
    }

    let source = (from, 0);
    let target = (to, stages);
    let mut dist: BTreeMap<State, f64> = BTreeMap::new();
    let mut preds: BTreeMap<State, Vec<(State, PathElement)>> = BTreeMap::new();
    let mut heap = BinaryHeap::new();
    dist.insert(source, 0.0);
    heap.push(Entry {
        cost: 0.0,
        state: source,
    });

    while let Some(Entry { cost, state }) = heap.pop() {
        if cost > dist.get(&state).copied().unwrap_or(f64::INFINITY) + tolerance {
            continue;
        }
        let (node, stage) = state;

        let mut next: Vec<(State, PathElement, f64)> = Vec::new();
        for l in out_links.get(&node).into_iter().flatten() {
            next.push(((l.destination, stage), PathElement::Link(l.id), l.cost));
        }
        if stage < stages {
            for r in hosted.get(&node).into_iter().flatten() {
                if r.resource_type == resource_types[stage] {
                    next.push(((node, stage + 1), PathElement::Resource(r.id), r.cost));
                }
            }
        }

        for (v, element, c) in next {
            let nd = cost + c;
            let dv = dist.get(&v).copied().unwrap_or(f64::INFINITY);
            if nd < dv - tolerance {
                dist.insert(v, nd);
                preds.insert(v, vec![(state, element)]);
                heap.push(Entry { cost: nd, state: v });
            } else if (nd - dv).abs() <= tolerance {
                let p = preds.entry(v).or_default();
                if !p.contains(&(state, element)) {
                    p.push((state, element));
                }
            }
        }
    }

    if source == target {
        return vec![Vec::new()];
    }
    if !dist.contains_key(&target) {
        return Vec::new();
    }

    let mut results = Vec::new();
    let mut stack_states = vec![target];
    let mut stack_elements = Vec::new();
    enumerate(&preds, source, &mut stack_states, &mut stack_elements, &mut results);
    results.sort();
    results
}

/// 沿前驱反向枚举；状态图中的零代价环靠 "不重复访问栈上状态" 截断
fn enumerate(
    preds: &BTreeMap<State, Vec<(State, PathElement)>>,
    source: State,
    states: &mut Vec<State>,
    elements: &mut Vec<PathElement>,
    results: &mut Vec<Vec<PathElement>>,
) {
    let Some(&current) = states.last() else {
        return;
    };
    if current == source {
        results.push(elements.iter().rev().copied().collect());
        return;
    }
    for (prev, element) in preds.get(&current).into_iter().flatten() {
        if states.contains(prev) {
            continue;
        }
        states.push(*prev);
        elements.push(*element);
        enumerate(preds, source, states, elements, results);
        elements.pop();
        states.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(id: u64, o: u64, d: u64, cost: f64) -> CandidateLink {
        CandidateLink {
            id: LinkId(id),
            origin: NodeId(o),
            destination: NodeId(d),
            cost,
        }
    }

    #[test]
    fn returns_every_tied_path() {
        // 菱形：0->1->3 与 0->2->3 代价相同，0->3 更贵
        let links = [
            link(10, 0, 1, 1.0),
            link(11, 1, 3, 1.0),
            link(12, 0, 2, 1.0),
            link(13, 2, 3, 1.0),
            link(14, 0, 3, 5.0),
        ];
        let paths = all_shortest_paths(&links, NodeId(0), NodeId(3), 1e-3);
        assert_eq!(
            paths,
            vec![vec![LinkId(10), LinkId(11)], vec![LinkId(12), LinkId(13)]]
        );
    }

    #[test]
    fn unreachable_gives_nothing() {
        let links = [link(1, 0, 1, 1.0)];
        assert!(all_shortest_paths(&links, NodeId(1), NodeId(0), 1e-3).is_empty());
    }

    #[test]
    fn service_chain_visits_resources_in_order() {
        let links = [link(1, 0, 1, 1.0), link(2, 1, 2, 1.0)];
        let resources = [
            CandidateResource {
                id: ResourceId(20),
                host: NodeId(1),
                resource_type: "FW".into(),
                cost: 0.5,
            },
            CandidateResource {
                id: ResourceId(21),
                host: NodeId(2),
                resource_type: "NAT".into(),
                cost: 0.5,
            },
        ];
        let types = vec!["FW".to_string(), "NAT".to_string()];
        let chains = all_min_cost_service_chains(&links, &resources, &types, NodeId(0), NodeId(2), 1e-3);
        assert_eq!(
            chains,
            vec![vec![
                PathElement::Link(LinkId(1)),
                PathElement::Resource(ResourceId(20)),
                PathElement::Link(LinkId(2)),
                PathElement::Resource(ResourceId(21)),
            ]]
        );

        let reversed = vec!["NAT".to_string(), "FW".to_string()];
        assert!(all_min_cost_service_chains(&links, &resources, &reversed, NodeId(0), NodeId(2), 1e-3).is_empty());
    }
}
