// ==========================================
// 社区生鲜速达 - 订单领域模型
// ==========================================
// 红线:
// - 订单由购物车快照原子生成, 生成后明细与金额不可变
// - 只有 status / payment_status / delivery_partner_id / updated_at 可变
// - order_items.unit_price 是冻结价, 与商品现价解耦
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::types::{OrderStatus, PaymentMethod, PaymentStatus};

// ==========================================
// Order - 订单
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,                    // 订单ID
    pub user_id: String,                     // 下单用户
    pub status: OrderStatus,                 // 状态
    pub total_amount_paise: i64,             // 总金额（商品 + 配送费, 分）
    pub delivery_address: String,            // 配送地址
    pub delivery_latitude: Option<f64>,      // 纬度
    pub delivery_longitude: Option<f64>,     // 经度
    pub delivery_instructions: Option<String>, // 配送备注
    pub payment_method: PaymentMethod,       // 支付方式
    pub payment_status: PaymentStatus,       // 支付状态
    pub otp_code: String,                    // 4位取件码（单次有效）
    pub delivery_partner_id: Option<String>, // 配送员（软引用 delivery_partners.user_id）
    pub created_at: DateTime<Utc>,           // 创建时间
    pub updated_at: DateTime<Utc>,           // 更新时间
}

impl Order {
    /// 判断订单是否已终结（终态拒绝一切变更）
    pub fn is_finalized(&self) -> bool {
        self.status.is_terminal()
    }

    /// 判断当前是否可指派配送员
    pub fn can_assign_partner(&self) -> bool {
        !self.status.is_terminal()
    }
}

// ==========================================
// OrderItem - 订单明细（价格冻结快照）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_item_id: String,   // 明细ID
    pub order_id: String,        // 所属订单
    pub product_id: String,      // 商品ID
    pub quantity: i64,           // 数量
    pub unit_price_paise: i64,   // 冻结单价（分）
    pub total_price_paise: i64,  // 行总价 = 单价 × 数量
}

// ==========================================
// DeliveryInfo - 下单时的配送信息
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryInfo {
    pub address: String,               // 配送地址（必填）
    pub latitude: Option<f64>,         // 纬度
    pub longitude: Option<f64>,        // 经度
    pub instructions: Option<String>,  // 配送备注
}

// ==========================================
// DeliveryPartner - 配送员
// ==========================================
// 被订单软引用, 不被订单拥有
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPartner {
    pub user_id: String,           // 用户ID
    pub vehicle_type: String,      // 交通工具
    pub is_active: bool,           // 是否在岗（停用后不可再指派）
    pub created_at: DateTime<Utc>, // 创建时间
    pub updated_at: DateTime<Utc>, // 更新时间
}

// ==========================================
// Profile - 用户资料（用于通知文案拼装）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,           // 用户ID
    pub full_name: Option<String>, // 姓名
    pub phone: Option<String>,     // 电话
    pub address: Option<String>,   // 常用地址
    pub created_at: DateTime<Utc>, // 创建时间
    pub updated_at: DateTime<Utc>, // 更新时间
}

// ==========================================
// Notification - 通知落库记录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub notification_id: String,   // 通知ID
    pub user_id: String,           // 接收用户
    pub title: String,             // 标题
    pub message: String,           // 正文
    pub order_id: Option<String>,  // 关联订单
    pub read_flag: bool,           // 已读标记
    pub created_at: DateTime<Utc>, // 创建时间
}
