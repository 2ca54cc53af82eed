// ==========================================
// 社区生鲜速达 - API层错误类型
// ==========================================
// 职责: 定义操作层错误分类, 转换 Repository 错误为业务错误
// 红线: 不变式/状态类错误必须带具体 kind 上抛, UI 层要据此
//       渲染不同文案（"未达起送额" vs "取件码错误"）, 禁止降级为
//       泛化失败
// ==========================================

use crate::domain::types::{OrderStatus, Role};
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 输入校验错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("无效数量: {quantity} (数量必须 >= 1)")]
    InvalidQuantity { quantity: i64 },

    // ==========================================
    // 业务不变式违反
    // ==========================================
    /// 礼包行不可单独移除
    #[error("礼包商品不可单独移除: line_id={line_id}")]
    ImmutableKitItem { line_id: String },

    /// 礼包行数量不可跌破加入时的强制下限
    #[error("礼包商品数量不可低于下限: line_id={line_id}, floor={floor}")]
    BelowKitMinimum { line_id: String, floor: i64 },

    /// 未达起送额, 结算被阻断
    #[error("未达起送额: 当前 {subtotal_paise} 分, 起送 {minimum_paise} 分")]
    BelowMinimumOrder { subtotal_paise: i64, minimum_paise: i64 },

    // ==========================================
    // 状态机错误
    // ==========================================
    #[error("无效的状态转换: from={from} to={to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// 订单已终结（已送达/已取消）, 拒绝一切变更与核验
    #[error("订单已终结: order_id={order_id}, status={status}")]
    OrderAlreadyFinalized { order_id: String, status: OrderStatus },

    /// 取件码不符
    #[error("取件码错误")]
    InvalidOtp,

    // ==========================================
    // 鉴权错误
    // ==========================================
    #[error("未登录: 无法解析购物车归属用户")]
    NotAuthenticated,

    #[error("无权执行: role={role}, operation={operation}")]
    PermissionDenied { role: Role, operation: String },

    /// 目标配送员不在岗
    #[error("配送员不在岗: partner_id={partner_id}")]
    PartnerInactive { partner_id: String },

    // ==========================================
    // 资源错误
    // ==========================================
    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将仓储层技术错误转换为操作层业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::DatabaseError(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::DatabaseError(format!("外键约束违反: {}", msg))
            }
            RepositoryError::ValidationError(msg) => ApiError::InvalidInput(msg),
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
