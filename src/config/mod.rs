// ==========================================
// 社区生鲜速达 - 配置层
// ==========================================
// 职责: 计价参数管理, 支持 config_kv 覆写
// 存储: config_kv 表
// ==========================================

pub mod pricing_config;

// 重导出核心配置
pub use pricing_config::{config_keys, PricingConfig};
