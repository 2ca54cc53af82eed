// ==========================================
// 社区生鲜速达 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑, 不含引擎逻辑
// ==========================================

pub mod cart;
pub mod catalog;
pub mod order;
pub mod types;

// 重导出核心类型
pub use cart::{Cart, CartLine, CartTotals};
pub use catalog::{Kit, KitItem, KitWithItems, Product};
pub use order::{DeliveryInfo, DeliveryPartner, Notification, Order, OrderItem, Profile};
pub use types::{OrderStatus, PaymentMethod, PaymentStatus, Role};
