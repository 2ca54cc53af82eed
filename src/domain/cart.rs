// ==========================================
// 社区生鲜速达 - 购物车领域模型
// ==========================================
// 红线:
// - 每用户仅一个购物车, 懒创建, 只清空不删除
// - (cart_id, product_id, kit_id) 唯一, 重复加购合并数量而非新增行
// - is_kit_item=true 的行不可单独删除, 数量不可跌破 min_quantity
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Cart - 购物车
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub cart_id: String,           // 购物车ID
    pub user_id: String,           // 归属用户（唯一）
    pub created_at: DateTime<Utc>, // 创建时间
    pub updated_at: DateTime<Utc>, // 更新时间
}

// ==========================================
// CartLine - 购物车行
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub cart_line_id: String,      // 行ID
    pub cart_id: String,           // 所属购物车
    pub product_id: String,        // 商品ID
    pub quantity: i64,             // 数量 (>= 1)
    pub kit_id: Option<String>,    // 来源礼包（散装行为 None）
    pub is_kit_item: bool,         // 是否礼包行
    pub min_quantity: i64,         // 加入时记录的强制下限（散装行恒为 1）
    pub created_at: DateTime<Utc>, // 创建时间
    pub updated_at: DateTime<Utc>, // 更新时间
}

impl CartLine {
    /// 礼包行判定（礼包行只能随整车清空离开购物车）
    pub fn is_locked(&self) -> bool {
        self.is_kit_item
    }
}

// ==========================================
// CartTotals - 聚合视图（按需重算, 不持久化）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    pub total_items: i64,              // Σ quantity
    pub subtotal_paise: i64,           // Σ 现价 × 数量
    pub delivery_charge_paise: i64,    // 配送费（满额免配送）
    pub total_paise: i64,              // subtotal + delivery_charge
    pub below_minimum_order: bool,     // 低于起送额时结算被阻断
    pub to_minimum_order_paise: i64,   // 距起送额差额（已达标为 0）
    pub to_free_delivery_paise: i64,   // 距免配送差额（已达标为 0）
}
