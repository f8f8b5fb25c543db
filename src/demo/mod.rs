//! 演示拓扑
//!
//! 构建若干小型规范拓扑，供命令行工具和测试使用。

mod multilayer;
mod single_layer;

pub use multilayer::{IpOverWdmOpts, IpOverWdmTopology, build_ip_over_wdm};
pub use single_layer::{LineOpts, RingOpts, SingleLayerTopology, build_line, build_ring};
