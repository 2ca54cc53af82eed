// ==========================================
// 社区生鲜速达 - 商品目录领域模型
// ==========================================
// 红线: 目录对核心只读, 购物车/订单不得反向修改商品数据
// 金额单位: 分（最小货币单位）
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Product - 商品
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,                  // 商品ID
    pub name: String,                        // 名称
    pub description: Option<String>,         // 描述
    pub unit: String,                        // 计量单位 (如 "500g" / "1kg")
    pub price_paise: i64,                    // 现价（分）
    pub original_price_paise: Option<i64>,   // 原价（分, 有折扣时填写）
    pub discount_percentage: Option<i64>,    // 折扣百分比
    pub category: Option<String>,            // 分类
    pub in_stock: bool,                      // 是否有货
    pub created_at: DateTime<Utc>,           // 创建时间
    pub updated_at: DateTime<Utc>,           // 更新时间
}

impl Product {
    /// 折扣不变式: 设置 discount_percentage 时, 原价必须高于现价
    pub fn discount_is_consistent(&self) -> bool {
        match self.discount_percentage {
            Some(_) => matches!(self.original_price_paise, Some(orig) if orig > self.price_paise),
            None => true,
        }
    }
}

// ==========================================
// Kit - 礼包（锁定式商品组合）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kit {
    pub kit_id: String,             // 礼包ID
    pub name: String,               // 名称
    pub description: Option<String>,// 描述
    pub is_active: bool,            // 是否上架
    pub created_at: DateTime<Utc>,  // 创建时间
    pub updated_at: DateTime<Utc>,  // 更新时间
}

// ==========================================
// KitItem - 礼包明细
// ==========================================
// 红线: is_mandatory=true 的明细数量是购物车内不可跌破的下限
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KitItem {
    pub kit_item_id: String, // 明细ID
    pub kit_id: String,      // 所属礼包
    pub product_id: String,  // 商品ID
    pub quantity: i64,       // 数量
    pub is_mandatory: bool,  // 是否强制
    pub sort_no: i64,        // 展示顺序
}

// ==========================================
// KitWithItems - 礼包 + 明细聚合视图
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KitWithItems {
    pub kit: Kit,
    pub items: Vec<(KitItem, Product)>, // 按 sort_no 排序的明细与商品快照
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price: i64, original: Option<i64>, discount: Option<i64>) -> Product {
        Product {
            product_id: "P001".to_string(),
            name: "黄洋葱".to_string(),
            description: None,
            unit: "1kg".to_string(),
            price_paise: price,
            original_price_paise: original,
            discount_percentage: discount,
            category: Some("蔬菜".to_string()),
            in_stock: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_discount_invariant() {
        // 无折扣总是自洽
        assert!(product(4000, None, None).discount_is_consistent());
        // 有折扣且原价更高
        assert!(product(4000, Some(5000), Some(20)).discount_is_consistent());
        // 有折扣但缺原价 / 原价不高于现价
        assert!(!product(4000, None, Some(20)).discount_is_consistent());
        assert!(!product(4000, Some(4000), Some(20)).discount_is_consistent());
    }
}
