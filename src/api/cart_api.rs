// ==========================================
// 社区生鲜速达 - 购物车 API
// ==========================================
// 职责: 购物车装配操作 (Cart Manager)
// 红线:
// - 每个变更操作入口先做身份/归属检查
// - 礼包行"可加不可删": 不可单独移除, 数量不可跌破下限
// - 聚合 (件数/金额) 按需重算, 不持久化缓存
// ==========================================

use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::policy::Actor;
use crate::config::PricingConfig;
use crate::domain::cart::{Cart, CartLine, CartTotals};
use crate::engine::pricing;
use crate::repository::{CartRepository, KitLineUpsert, KitRepository, ProductRepository};

/// 单行数量上限, 超出按非法数量拒绝
pub const MAX_LINE_QUANTITY: i64 = 9_999;

// ==========================================
// CartApi - 购物车 API
// ==========================================

/// 购物车API
///
/// 职责：
/// 1. 散装加购（合并重复行）
/// 2. 礼包整体加购（原子 upsert, 数量只升不降）
/// 3. 行删除/数量修改（礼包锁保护）
/// 4. 清空与聚合查询
pub struct CartApi {
    cart_repo: Arc<CartRepository>,
    product_repo: Arc<ProductRepository>,
    kit_repo: Arc<KitRepository>,
    pricing_config: PricingConfig,
}

impl CartApi {
    /// 创建新的CartApi实例
    pub fn new(
        cart_repo: Arc<CartRepository>,
        product_repo: Arc<ProductRepository>,
        kit_repo: Arc<KitRepository>,
        pricing_config: PricingConfig,
    ) -> Self {
        Self {
            cart_repo,
            product_repo,
            kit_repo,
            pricing_config,
        }
    }

    /// 解析操作主体的购物车（懒创建）
    fn resolve_cart(&self, actor: &Actor) -> ApiResult<Cart> {
        let user_id = actor.require_user()?;
        Ok(self.cart_repo.get_or_create(user_id)?)
    }

    /// 校验行归属: 目标行必须在操作主体自己的购物车内
    fn resolve_owned_line(&self, actor: &Actor, line_id: &str) -> ApiResult<(Cart, CartLine)> {
        let cart = self.resolve_cart(actor)?;
        let line = self
            .cart_repo
            .find_line(line_id)?
            .ok_or_else(|| ApiError::NotFound(format!("购物车行(id={})不存在", line_id)))?;
        if line.cart_id != cart.cart_id {
            // 越权访问他人购物车行, 按不存在处理
            return Err(ApiError::NotFound(format!("购物车行(id={})不存在", line_id)));
        }
        Ok((cart, line))
    }

    // ==========================================
    // 变更操作
    // ==========================================

    /// 散装加购
    ///
    /// # 参数
    /// - product_id: 商品ID
    /// - quantity: 加购数量 (1 ..= MAX_LINE_QUANTITY)
    ///
    /// # 说明
    /// - 已有同商品散装行时数量累加（单条条件 upsert, 并发不丢更新）
    pub fn add_product(&self, actor: &Actor, product_id: &str, quantity: i64) -> ApiResult<()> {
        if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
            return Err(ApiError::InvalidQuantity { quantity });
        }

        let cart = self.resolve_cart(actor)?;

        let product = self
            .product_repo
            .find_by_id(product_id)?
            .ok_or_else(|| ApiError::NotFound(format!("商品(id={})不存在", product_id)))?;
        if !product.in_stock {
            return Err(ApiError::InvalidInput(format!("商品已售罄: {}", product.name)));
        }

        self.cart_repo
            .upsert_product_line(&cart.cart_id, product_id, quantity)?;

        tracing::info!(
            "散装加购: cart_id={}, product_id={}, quantity={}",
            cart.cart_id,
            product_id,
            quantity
        );
        Ok(())
    }

    /// 礼包整体加购
    ///
    /// # 说明
    /// - 全部明细在单事务内 upsert, 不存在"半个礼包"
    /// - 合并规则: 数量取 max(现有, 礼包数量), 幂等
    /// - 强制明细的数量作为下限记录在行上, 此后不可跌破
    pub fn add_kit(&self, actor: &Actor, kit_id: &str) -> ApiResult<()> {
        let cart = self.resolve_cart(actor)?;

        let kit = self
            .kit_repo
            .find_with_items(kit_id)?
            .ok_or_else(|| ApiError::NotFound(format!("礼包(id={})不存在", kit_id)))?;
        if !kit.kit.is_active {
            return Err(ApiError::InvalidInput(format!("礼包未上架: {}", kit.kit.name)));
        }
        if kit.items.is_empty() {
            return Err(ApiError::InvalidInput(format!("礼包无明细: {}", kit.kit.name)));
        }

        let lines: Vec<KitLineUpsert> = kit
            .items
            .iter()
            .map(|(item, _product)| KitLineUpsert {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
                min_quantity: if item.is_mandatory { item.quantity } else { 1 },
            })
            .collect();

        let count = self.cart_repo.upsert_kit_lines(&cart.cart_id, kit_id, &lines)?;

        tracing::info!(
            "礼包加购: cart_id={}, kit_id={}, 明细 {} 行",
            cart.cart_id,
            kit_id,
            count
        );
        Ok(())
    }

    /// 删除单行
    ///
    /// # 说明
    /// - 礼包行拒绝删除 (ImmutableKitItem), 只能随整车清空离开
    pub fn remove_line(&self, actor: &Actor, line_id: &str) -> ApiResult<()> {
        let (_cart, line) = self.resolve_owned_line(actor, line_id)?;

        if line.is_kit_item {
            return Err(ApiError::ImmutableKitItem {
                line_id: line_id.to_string(),
            });
        }

        if !self.cart_repo.delete_non_kit_line(line_id)? {
            return Err(ApiError::NotFound(format!("购物车行(id={})不存在", line_id)));
        }

        tracing::info!("删除购物车行: line_id={}", line_id);
        Ok(())
    }

    /// 修改行数量
    ///
    /// # 说明
    /// - 数量超出 [1, MAX_LINE_QUANTITY] 直接拒绝 (InvalidQuantity)
    /// - 礼包行跌破加入时记录的下限拒绝 (BelowKitMinimum), 行保持原数量
    pub fn set_quantity(&self, actor: &Actor, line_id: &str, quantity: i64) -> ApiResult<()> {
        if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
            return Err(ApiError::InvalidQuantity { quantity });
        }

        let (_cart, line) = self.resolve_owned_line(actor, line_id)?;

        if line.is_kit_item && quantity < line.min_quantity {
            return Err(ApiError::BelowKitMinimum {
                line_id: line_id.to_string(),
                floor: line.min_quantity,
            });
        }

        // 仓储层条件更新再兜底一次下限（并发下以持久化行为准）
        if !self.cart_repo.update_quantity(line_id, quantity)? {
            // 未命中, 重读定性: 行已被并发删除报 NotFound, 仍在则是跌破下限
            return match self.cart_repo.find_line(line_id)? {
                Some(current) => Err(ApiError::BelowKitMinimum {
                    line_id: line_id.to_string(),
                    floor: current.min_quantity,
                }),
                None => Err(ApiError::NotFound(format!("购物车行(id={})不存在", line_id))),
            };
        }

        tracing::info!("修改行数量: line_id={}, quantity={}", line_id, quantity);
        Ok(())
    }

    /// 清空购物车（仅散装行; 礼包行保留）
    pub fn clear(&self, actor: &Actor) -> ApiResult<usize> {
        let cart = self.resolve_cart(actor)?;
        let removed = self.cart_repo.clear_non_kit_lines(&cart.cart_id)?;
        tracing::info!("清空散装行: cart_id={}, 删除 {} 行", cart.cart_id, removed);
        Ok(removed)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 查询购物车全部行
    pub fn get_cart(&self, actor: &Actor) -> ApiResult<(Cart, Vec<CartLine>)> {
        let cart = self.resolve_cart(actor)?;
        let lines = self.cart_repo.find_lines(&cart.cart_id)?;
        Ok((cart, lines))
    }

    /// 聚合视图: 件数/小计/配送费/起送差额
    ///
    /// 纯函数式重算: 对当前行求和, 幂等且与行序无关, 不落库
    pub fn totals(&self, actor: &Actor) -> ApiResult<CartTotals> {
        let (_cart, lines) = self.get_cart(actor)?;
        self.compute_totals(&lines)
    }

    /// 按行集合计算聚合（结算层复用同一实现, 保证口径一致）
    pub fn compute_totals(&self, lines: &[CartLine]) -> ApiResult<CartTotals> {
        let product_ids: Vec<String> = lines.iter().map(|l| l.product_id.clone()).collect();
        let products = self.product_repo.find_by_ids(&product_ids)?;

        let mut subtotal: i64 = 0;
        let mut total_items: i64 = 0;
        for line in lines {
            let product = products
                .iter()
                .find(|p| p.product_id == line.product_id)
                .ok_or_else(|| {
                    ApiError::NotFound(format!("商品(id={})不存在", line.product_id))
                })?;
            subtotal = subtotal.saturating_add(pricing::line_total(product.price_paise, line.quantity));
            total_items += line.quantity;
        }

        let cfg = &self.pricing_config;
        let charge = pricing::delivery_charge(cfg, subtotal);
        Ok(CartTotals {
            total_items,
            subtotal_paise: subtotal,
            delivery_charge_paise: charge,
            total_paise: subtotal.saturating_add(charge),
            below_minimum_order: pricing::is_below_minimum_order(cfg, subtotal),
            to_minimum_order_paise: pricing::to_minimum_order(cfg, subtotal),
            to_free_delivery_paise: pricing::to_free_delivery(cfg, subtotal),
        })
    }
}
