//! 规划模型配置
//!
//! 精度因子（precision factor）是全局唯一的容差来源：
//! 所有“小于它即视为 0”或“相差小于它即视为相等”的比较都从这里读取。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::net::NetPlanError;

/// 规划模型配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    /// 容差：绝对值低于该值的流量/容量视为 0
    pub precision_factor: f64,
    /// 每次成功的修改之后执行完整一致性检查（默认仅 debug 构建开启）
    pub check_consistency: bool,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            precision_factor: 1e-3,
            check_consistency: cfg!(debug_assertions),
        }
    }
}

impl PlanConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, NetPlanError> {
        let cfg: PlanConfig = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, NetPlanError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// 精度因子必须是正的有限数
    pub fn validate(&self) -> Result<(), NetPlanError> {
        if !(self.precision_factor.is_finite() && self.precision_factor > 0.0) {
            return Err(NetPlanError::InvalidArgument(format!(
                "precision_factor must be a positive finite number, got {}",
                self.precision_factor
            )));
        }
        Ok(())
    }

    /// 低于精度因子的非负量截断为 0
    pub fn round_to_zero(&self, value: f64) -> f64 {
        if value.abs() < self.precision_factor {
            0.0
        } else {
            value
        }
    }

    pub fn approx_eq(&self, a: f64, b: f64) -> bool {
        if a.is_infinite() || b.is_infinite() {
            return a == b;
        }
        (a - b).abs() <= self.precision_factor
    }
}
