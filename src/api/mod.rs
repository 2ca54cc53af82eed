// ==========================================
// 社区生鲜速达 - API 层
// ==========================================
// 职责: UI 层调用的业务操作面
// 红线: 每个变更操作入口先过 policy, 拒绝时不留部分状态
// ==========================================

pub mod cart_api;
pub mod catalog_api;
pub mod error;
pub mod order_api;
pub mod policy;

pub use cart_api::{CartApi, MAX_LINE_QUANTITY};
pub use catalog_api::CatalogApi;
pub use error::{ApiError, ApiResult};
pub use order_api::OrderApi;
pub use policy::{AccessPolicy, Actor, SqliteAccessPolicy, StaticAccessPolicy};
