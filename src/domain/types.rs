// ==========================================
// 社区生鲜速达 - 领域类型定义
// ==========================================
// 红线: 状态机采用白名单转移表, 不在表内的转移一律拒绝
// 序列化格式: snake_case (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 订单状态 (Order Status)
// ==========================================
// 主干: placed → confirmed → packed → out_for_delivery → delivered
// cancelled 可从任意非终态进入; delivered/cancelled 为终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Placed,         // 已下单
    Confirmed,      // 已确认
    Packed,         // 已打包
    OutForDelivery, // 配送中
    Delivered,      // 已送达
    Cancelled,      // 已取消
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl OrderStatus {
    /// 从字符串解析状态
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "placed" => Some(OrderStatus::Placed),
            "confirmed" => Some(OrderStatus::Confirmed),
            "packed" => Some(OrderStatus::Packed),
            "out_for_delivery" => Some(OrderStatus::OutForDelivery),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Packed => "packed",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// 判断是否为终态（终态订单拒绝一切状态变更）
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// 当前状态允许到达的下一状态集合
    ///
    /// 注意: delivered 虽在 out_for_delivery 的白名单内，但只能经
    /// OTP 校验路径进入（verify_delivery），update_status 不受理。
    pub fn allowed_next(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Placed => &[OrderStatus::Confirmed, OrderStatus::Cancelled],
            OrderStatus::Confirmed => &[OrderStatus::Packed, OrderStatus::Cancelled],
            OrderStatus::Packed => &[OrderStatus::OutForDelivery, OrderStatus::Cancelled],
            OrderStatus::OutForDelivery => &[OrderStatus::Delivered, OrderStatus::Cancelled],
            OrderStatus::Delivered => &[],
            OrderStatus::Cancelled => &[],
        }
    }

    /// 判断到目标状态的转移是否在白名单内
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        self.allowed_next().contains(&target)
    }
}

// ==========================================
// 支付方式 (Payment Method)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cod, // 货到付款
    Upi, // UPI 在线支付
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl PaymentMethod {
    /// 从字符串解析支付方式
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cod" => Some(PaymentMethod::Cod),
            "upi" => Some(PaymentMethod::Upi),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "cod",
            PaymentMethod::Upi => "upi",
        }
    }
}

// ==========================================
// 支付状态 (Payment Status)
// ==========================================
// completed 仅由送达确认路径写入, 与 total_amount 解耦
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,   // 待支付
    Completed, // 已完成
    Failed,    // 失败
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl PaymentStatus {
    /// 从字符串解析支付状态
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(PaymentStatus::Pending),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }
}

// ==========================================
// 角色 (Role)
// ==========================================
// 由外部身份系统授予, 核心只消费不管理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,           // 管理员
    User,            // 普通用户
    DeliveryPartner, // 配送员
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl Role {
    /// 从字符串解析角色（未知角色回退为普通用户）
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "admin" => Role::Admin,
            "delivery_partner" => Role::DeliveryPartner,
            _ => Role::User,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::DeliveryPartner => "delivery_partner",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_roundtrip() {
        for s in ["placed", "confirmed", "packed", "out_for_delivery", "delivered", "cancelled"] {
            let status = OrderStatus::from_str(s).unwrap();
            assert_eq!(status.to_db_str(), s);
        }
        assert!(OrderStatus::from_str("shipped").is_none());
    }

    #[test]
    fn test_transition_table() {
        use OrderStatus::*;

        assert!(Placed.can_transition_to(Confirmed));
        assert!(Placed.can_transition_to(Cancelled));
        assert!(!Placed.can_transition_to(Packed));
        assert!(!Placed.can_transition_to(Delivered));

        assert!(Confirmed.can_transition_to(Packed));
        assert!(Packed.can_transition_to(OutForDelivery));
        assert!(OutForDelivery.can_transition_to(Delivered));
        assert!(OutForDelivery.can_transition_to(Cancelled));

        // 终态无出边
        assert!(Delivered.allowed_next().is_empty());
        assert!(Cancelled.allowed_next().is_empty());
        assert!(!Cancelled.can_transition_to(Confirmed));
    }

    #[test]
    fn test_order_status_json_wire_format() {
        // UI 层消费 JSON, 状态序列化必须与库内字符串一致
        let json = serde_json::to_string(&OrderStatus::OutForDelivery).unwrap();
        assert_eq!(json, r#""out_for_delivery""#);
        let back: OrderStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, OrderStatus::OutForDelivery);
    }

    #[test]
    fn test_terminal_states() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::OutForDelivery.is_terminal());
    }

    #[test]
    fn test_role_fallback() {
        assert_eq!(Role::from_str("admin"), Role::Admin);
        assert_eq!(Role::from_str("somebody"), Role::User);
    }
}
