// ==========================================
// 社区生鲜速达 - 引擎层
// ==========================================
// 职责: 业务规则 (计价/取件码/通知)
// 说明: 计价与取件码为纯函数; 通知分发经 trait 解耦, 默认实现落库
// ==========================================

pub mod notify;
pub mod otp;
pub mod pricing;

// 重导出核心类型
pub use notify::{
    NoOpDispatcher, NotificationDispatcher, NotificationMessage, OptionalDispatcher,
    RepositoryDispatcher,
};
pub use otp::generate_otp;
pub use pricing::KitTotals;
