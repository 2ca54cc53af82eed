// ==========================================
// 社区生鲜速达 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口, 屏蔽数据库细节
// 约束: 所有查询使用参数化, 防止 SQL 注入
// ==========================================

pub mod cart_repo;
pub mod catalog_repo;
pub mod error;
pub mod notification_repo;
pub mod order_repo;
pub mod partner_repo;
pub mod role_repo;

// 重导出核心仓储
pub use cart_repo::{CartRepository, KitLineUpsert};
pub use catalog_repo::{KitRepository, ProductRepository};
pub use error::{RepositoryError, RepositoryResult};
pub use notification_repo::NotificationRepository;
pub use order_repo::OrderRepository;
pub use partner_repo::{DeliveryPartnerRepository, ProfileRepository};
pub use role_repo::RoleRepository;
