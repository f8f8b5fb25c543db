//! 路径计算
//!
//! 需求级 "compute" 操作使用的最短路 / 最小代价服务链，以及把链路流量分解为路径。
//! 与旧的跳数路由表一样，所有等价最优解都会返回，而不是任选一个。

mod decompose;
mod shortest;

pub use decompose::decompose_link_flows;
pub use shortest::{CandidateLink, CandidateResource, all_min_cost_service_chains, all_shortest_paths};
