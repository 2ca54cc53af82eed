// ==========================================
// 社区生鲜速达 - 计价引擎
// ==========================================
// 职责: 行总价 / 礼包合计与立省 / 配送费分档 / 起送额闸门
// 红线:
// - 全部金额为整数分, 不做浮点运算
// - 起送额不足以校验错误上抛, 绝不静默调整金额
// - 折扣百分比在 original_total=0 时恒为 0, 不除零
// ==========================================

use crate::config::PricingConfig;
use crate::domain::catalog::Product;
use serde::{Deserialize, Serialize};

/// 行总价: 单价 × 数量（饱和乘法, 极端输入不回绕）
///
/// 购物车展示用商品现价; 一旦进入订单明细, 调用方应改用冻结单价。
pub fn line_total(unit_price_paise: i64, quantity: i64) -> i64 {
    unit_price_paise.saturating_mul(quantity)
}

// ==========================================
// KitTotals - 礼包合计
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitTotals {
    pub offered_total_paise: i64,  // Σ 现价 × 数量
    pub original_total_paise: i64, // Σ (原价 ?? 现价) × 数量
    pub savings_paise: i64,        // original - offered
    pub discount_percent: i64,     // round(100 × savings / original), original=0 时为 0
}

/// 礼包合计与立省
///
/// # 参数
/// - items: (商品, 数量) 列表
pub fn kit_totals(items: &[(Product, i64)]) -> KitTotals {
    let mut offered: i64 = 0;
    let mut original: i64 = 0;

    for (product, quantity) in items {
        offered = offered.saturating_add(line_total(product.price_paise, *quantity));
        let original_price = product.original_price_paise.unwrap_or(product.price_paise);
        original = original.saturating_add(line_total(original_price, *quantity));
    }

    let savings = original - offered;
    let discount_percent = if original > 0 {
        // 四舍五入到整数百分比
        (savings * 100 + original / 2) / original
    } else {
        0
    };

    KitTotals {
        offered_total_paise: offered,
        original_total_paise: original,
        savings_paise: savings,
        discount_percent,
    }
}

/// 配送费分档: 满额免配送, 否则固定配送费
pub fn delivery_charge(cfg: &PricingConfig, subtotal_paise: i64) -> i64 {
    if subtotal_paise >= cfg.free_delivery_threshold_paise {
        0
    } else {
        cfg.delivery_charge_paise
    }
}

/// 起送额闸门: 低于起送额时结算必须被阻断
pub fn is_below_minimum_order(cfg: &PricingConfig, subtotal_paise: i64) -> bool {
    subtotal_paise < cfg.min_order_amount_paise
}

/// 距起送额差额（已达标为 0）
pub fn to_minimum_order(cfg: &PricingConfig, subtotal_paise: i64) -> i64 {
    (cfg.min_order_amount_paise - subtotal_paise).max(0)
}

/// 距免配送差额（已达标为 0）
pub fn to_free_delivery(cfg: &PricingConfig, subtotal_paise: i64) -> i64 {
    (cfg.free_delivery_threshold_paise - subtotal_paise).max(0)
}
