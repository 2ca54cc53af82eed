// ==========================================
// 社区生鲜速达 - 订单与购物车一致性引擎
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 店面核心一致性层 (UI 层之下的唯一事实层)
// 红线: 所有变更操作被拒绝时不留下部分状态
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则 (计价/取件码/通知)
pub mod engine;

// 配置层 - 计价参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组件装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{OrderStatus, PaymentMethod, PaymentStatus, Role};

// 领域实体
pub use domain::{
    Cart, CartLine, CartTotals, DeliveryInfo, DeliveryPartner, Kit, KitItem, KitWithItems,
    Notification, Order, OrderItem, Product, Profile,
};

// 引擎
pub use engine::notify::{
    NoOpDispatcher, NotificationDispatcher, NotificationMessage, OptionalDispatcher,
};
pub use engine::pricing::{self, KitTotals};

// 配置
pub use config::PricingConfig;

// API
pub use api::policy::{AccessPolicy, Actor, SqliteAccessPolicy, StaticAccessPolicy};
pub use api::{ApiError, ApiResult, CartApi, CatalogApi, OrderApi, MAX_LINE_QUANTITY};

// 应用装配
pub use app::AppState;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "社区生鲜速达";

// 数据库版本
pub const DB_VERSION: &str = "v0.1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
