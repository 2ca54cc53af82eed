// ==========================================
// 社区生鲜速达 - 订单 API
// ==========================================
// 职责: 结算建单 / 状态机推进 / 配送指派 / 取件码核销
// 红线:
// - 建单三步 (订单 + 明细 + 清车) 单事务, 失败整体回滚
// - 状态推进是对持久化状态的 CAS, 落败方重读后如实报错
// - 送达只能走取件码核销, update_status 到 delivered 一律拒绝
// - 通知是尽力而为副作用, 失败不回滚任何业务写入
// ==========================================

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::api::policy::Actor;
use crate::config::PricingConfig;
use crate::domain::order::{DeliveryInfo, DeliveryPartner, Order, OrderItem};
use crate::domain::types::{OrderStatus, PaymentMethod, PaymentStatus, Role};
use crate::engine::notify::{NotificationMessage, OptionalDispatcher};
use crate::engine::otp::generate_otp;
use crate::engine::pricing;
use crate::repository::{
    CartRepository, DeliveryPartnerRepository, OrderRepository, ProductRepository,
    ProfileRepository,
};

/// 金额展示 (分 -> 卢比字符串, 仅用于通知正文)
fn format_rupees(paise: i64) -> String {
    format!("₹{}.{:02}", paise / 100, paise % 100)
}

// ==========================================
// OrderApi - 订单 API
// ==========================================

/// 订单API
///
/// 职责：
/// 1. 结算建单（价格冻结 + 起送门槛 + 取件码生成）
/// 2. 状态机推进（角色门控 + CAS）
/// 3. 配送员指派（含双向通知）
/// 4. 取件码核销送达
/// 5. 订单查询（用户 / 配送员 / 后台）
pub struct OrderApi {
    order_repo: Arc<OrderRepository>,
    cart_repo: Arc<CartRepository>,
    product_repo: Arc<ProductRepository>,
    partner_repo: Arc<DeliveryPartnerRepository>,
    profile_repo: Arc<ProfileRepository>,
    dispatcher: OptionalDispatcher,
    pricing_config: PricingConfig,
}

impl OrderApi {
    /// 创建新的OrderApi实例
    pub fn new(
        order_repo: Arc<OrderRepository>,
        cart_repo: Arc<CartRepository>,
        product_repo: Arc<ProductRepository>,
        partner_repo: Arc<DeliveryPartnerRepository>,
        profile_repo: Arc<ProfileRepository>,
        dispatcher: OptionalDispatcher,
        pricing_config: PricingConfig,
    ) -> Self {
        Self {
            order_repo,
            cart_repo,
            product_repo,
            partner_repo,
            profile_repo,
            dispatcher,
            pricing_config,
        }
    }

    fn load_order(&self, order_id: &str) -> ApiResult<Order> {
        self.order_repo
            .find_by_id(order_id)?
            .ok_or_else(|| ApiError::NotFound(format!("订单(id={})不存在", order_id)))
    }

    // ==========================================
    // 结算建单
    // ==========================================

    /// 结算建单
    ///
    /// # 说明
    /// - 空购物车 / 空地址拒绝 (InvalidInput)
    /// - 小计低于起送门槛拒绝 (BelowMinimumOrder)
    /// - 每行按商品当前价冻结为订单明细, 此后调价不影响已建订单
    /// - 总额 = 小计 + 配送费; 取件码 CSPRNG 均匀抽取 1000-9999
    /// - 订单 + 明细 + 整车清空在同一事务提交
    pub fn create_order(
        &self,
        actor: &Actor,
        delivery: &DeliveryInfo,
        payment_method: PaymentMethod,
    ) -> ApiResult<Order> {
        let user_id = actor.require_user()?;

        if delivery.address.trim().is_empty() {
            return Err(ApiError::InvalidInput("配送地址不能为空".to_string()));
        }

        let cart = self.cart_repo.get_or_create(user_id)?;
        let lines = self.cart_repo.find_lines(&cart.cart_id)?;
        if lines.is_empty() {
            return Err(ApiError::InvalidInput("购物车为空, 无法结算".to_string()));
        }

        let product_ids: Vec<String> = lines.iter().map(|l| l.product_id.clone()).collect();
        let products = self.product_repo.find_by_ids(&product_ids)?;

        let order_id = Uuid::new_v4().to_string();
        let mut subtotal: i64 = 0;
        let mut items: Vec<OrderItem> = Vec::with_capacity(lines.len());
        for line in &lines {
            let product = products
                .iter()
                .find(|p| p.product_id == line.product_id)
                .ok_or_else(|| {
                    ApiError::NotFound(format!("商品(id={})不存在", line.product_id))
                })?;
            let line_total = pricing::line_total(product.price_paise, line.quantity);
            subtotal = subtotal.saturating_add(line_total);
            items.push(OrderItem {
                order_item_id: Uuid::new_v4().to_string(),
                order_id: order_id.clone(),
                product_id: line.product_id.clone(),
                quantity: line.quantity,
                unit_price_paise: product.price_paise,
                total_price_paise: line_total,
            });
        }

        let cfg = &self.pricing_config;
        if pricing::is_below_minimum_order(cfg, subtotal) {
            return Err(ApiError::BelowMinimumOrder {
                subtotal_paise: subtotal,
                minimum_paise: cfg.min_order_amount_paise,
            });
        }

        let now = Utc::now();
        let order = Order {
            order_id: order_id.clone(),
            user_id: user_id.to_string(),
            status: OrderStatus::Placed,
            total_amount_paise: subtotal.saturating_add(pricing::delivery_charge(cfg, subtotal)),
            delivery_address: delivery.address.clone(),
            delivery_latitude: delivery.latitude,
            delivery_longitude: delivery.longitude,
            delivery_instructions: delivery.instructions.clone(),
            payment_method,
            payment_status: PaymentStatus::Pending,
            otp_code: generate_otp(),
            delivery_partner_id: None,
            created_at: now,
            updated_at: now,
        };

        self.order_repo.create_with_items(&order, &items, &cart.cart_id)?;

        tracing::info!(
            "结算建单: order_id={}, user_id={}, 明细 {} 行, 总额 {} 分",
            order_id,
            user_id,
            items.len(),
            order.total_amount_paise
        );

        self.dispatcher.notify_best_effort(NotificationMessage::for_order(
            user_id,
            "订单已提交",
            format!(
                "订单 #{} 已提交, 总额 {}, 等待商家确认",
                &order_id[..8],
                format_rupees(order.total_amount_paise)
            ),
            &order_id,
        ));

        Ok(order)
    }

    // ==========================================
    // 状态机推进
    // ==========================================

    /// 按角色门控校验一次状态推进
    ///
    /// # 说明
    /// - placed 出边仅限管理员; 此后管理员/配送员均可
    /// - 配送员只能操作指派给自己的订单
    fn authorize_transition(
        &self,
        actor: &Actor,
        order: &Order,
        target: OrderStatus,
    ) -> ApiResult<()> {
        let operation = format!("订单状态变更 {} -> {}", order.status, target);
        match order.status {
            OrderStatus::Placed => {
                actor.require_admin(&operation)?;
            }
            _ => {
                actor.require_staff(&operation)?;
            }
        }
        if actor.role == Role::DeliveryPartner {
            let user_id = actor.require_user()?;
            if order.delivery_partner_id.as_deref() != Some(user_id) {
                return Err(ApiError::PermissionDenied {
                    role: actor.role,
                    operation,
                });
            }
        }
        Ok(())
    }

    /// 状态推进
    ///
    /// # 说明
    /// - delivered 只能经取件码核销进入, 本入口一律 InvalidTransition
    /// - 对持久化状态做 CAS; 落败方重读当前状态后如实报错
    /// - 确认/取消成功后向下单用户发尽力通知
    pub fn update_status(
        &self,
        actor: &Actor,
        order_id: &str,
        target: OrderStatus,
    ) -> ApiResult<Order> {
        let order = self.load_order(order_id)?;

        // 送达必须携码核销
        if target == OrderStatus::Delivered {
            return Err(ApiError::InvalidTransition {
                from: order.status,
                to: target,
            });
        }
        if order.status.is_terminal() {
            return Err(ApiError::OrderAlreadyFinalized {
                order_id: order_id.to_string(),
                status: order.status,
            });
        }
        if !order.status.can_transition_to(target) {
            return Err(ApiError::InvalidTransition {
                from: order.status,
                to: target,
            });
        }

        self.authorize_transition(actor, &order, target)?;

        if !self.order_repo.update_status_cas(order_id, order.status, target)? {
            // 并发竞争者先行, 以落库状态为准重新定性
            let current = self.load_order(order_id)?;
            if current.status.is_terminal() {
                return Err(ApiError::OrderAlreadyFinalized {
                    order_id: order_id.to_string(),
                    status: current.status,
                });
            }
            return Err(ApiError::InvalidTransition {
                from: current.status,
                to: target,
            });
        }

        tracing::info!(
            "状态推进: order_id={}, {} -> {}",
            order_id,
            order.status,
            target
        );

        match target {
            OrderStatus::Confirmed => {
                self.dispatcher.notify_best_effort(NotificationMessage::for_order(
                    &order.user_id,
                    "订单已确认",
                    format!("订单 #{} 已确认, 商家正在备货", &order_id[..8]),
                    order_id,
                ));
            }
            OrderStatus::Cancelled => {
                self.dispatcher.notify_best_effort(NotificationMessage::for_order(
                    &order.user_id,
                    "订单已取消",
                    format!("订单 #{} 已取消", &order_id[..8]),
                    order_id,
                ));
            }
            _ => {}
        }

        self.load_order(order_id)
    }

    // ==========================================
    // 配送指派
    // ==========================================

    /// 指派配送员（仅管理员）
    ///
    /// # 说明
    /// - 停用/未登记的配送员拒绝 (PartnerInactive)
    /// - 终态订单拒绝 (OrderAlreadyFinalized)
    /// - 成功后向配送员推送接单详情, 向下单用户推送指派确认;
    ///   任一通知失败不回滚指派
    pub fn assign_delivery_partner(
        &self,
        actor: &Actor,
        order_id: &str,
        partner_id: &str,
    ) -> ApiResult<Order> {
        actor.require_admin("指派配送员")?;

        let order = self.load_order(order_id)?;
        if !order.can_assign_partner() {
            return Err(ApiError::OrderAlreadyFinalized {
                order_id: order_id.to_string(),
                status: order.status,
            });
        }

        let partner_ok = self
            .partner_repo
            .find_by_user_id(partner_id)?
            .map(|p| p.is_active)
            .unwrap_or(false);
        if !partner_ok {
            return Err(ApiError::PartnerInactive {
                partner_id: partner_id.to_string(),
            });
        }

        if !self.order_repo.assign_partner(order_id, partner_id)? {
            // 读到指派之间订单进了终态
            let current = self.load_order(order_id)?;
            return Err(ApiError::OrderAlreadyFinalized {
                order_id: order_id.to_string(),
                status: current.status,
            });
        }

        tracing::info!(
            "配送指派: order_id={}, partner_id={}",
            order_id,
            partner_id
        );

        self.dispatcher.notify_best_effort(NotificationMessage::for_order(
            partner_id,
            "新配送任务",
            self.compose_partner_brief(&order)?,
            order_id,
        ));
        self.dispatcher.notify_best_effort(NotificationMessage::for_order(
            &order.user_id,
            "配送员已指派",
            format!("订单 #{} 已安排配送员, 正在为您配送", &order_id[..8]),
            order_id,
        ));

        self.load_order(order_id)
    }

    /// 拼装配送员接单简报（地址 / 客户 / 明细 / 金额 / 支付方式）
    fn compose_partner_brief(&self, order: &Order) -> ApiResult<String> {
        let profile = self.profile_repo.find_by_user_id(&order.user_id)?;
        let (customer_name, customer_phone) = match &profile {
            Some(p) => (
                p.full_name.clone().unwrap_or_else(|| "未留姓名".to_string()),
                p.phone.clone().unwrap_or_else(|| "未留电话".to_string()),
            ),
            None => ("未留姓名".to_string(), "未留电话".to_string()),
        };

        let items = self.order_repo.find_items(&order.order_id)?;
        let product_ids: Vec<String> = items.iter().map(|i| i.product_id.clone()).collect();
        let products = self.product_repo.find_by_ids(&product_ids)?;

        let mut item_lines = String::new();
        for item in &items {
            let name = products
                .iter()
                .find(|p| p.product_id == item.product_id)
                .map(|p| p.name.as_str())
                .unwrap_or(item.product_id.as_str());
            item_lines.push_str(&format!("- {} x{}\n", name, item.quantity));
        }

        Ok(format!(
            "📦 新配送任务\n订单 #{}\n客户: {}\n电话: {}\n地址: {}\n商品:\n{}金额: {}\n支付方式: {}",
            &order.order_id[..8],
            customer_name,
            customer_phone,
            order.delivery_address,
            item_lines,
            format_rupees(order.total_amount_paise),
            order.payment_method,
        ))
    }

    // ==========================================
    // 取件码核销
    // ==========================================

    /// 取件码核销送达
    ///
    /// # 说明
    /// - 取件码仅去首尾空白, 不做其他归一化
    /// - 成功路径是单条条件更新, 并发提交恰好一个成功;
    ///   命中时原子写入 delivered + completed
    /// - 未命中按重读结果定性: 不存在 -> NotFound;
    ///   已终结 -> OrderAlreadyFinalized; 未到配送中 -> InvalidTransition;
    ///   其余 -> InvalidOtp
    pub fn verify_delivery(
        &self,
        actor: &Actor,
        order_id: &str,
        supplied_otp: &str,
    ) -> ApiResult<Order> {
        actor.require_staff("取件码核销")?;

        let order = self.load_order(order_id)?;
        if actor.role == Role::DeliveryPartner {
            let user_id = actor.require_user()?;
            if order.delivery_partner_id.as_deref() != Some(user_id) {
                return Err(ApiError::PermissionDenied {
                    role: actor.role,
                    operation: "取件码核销".to_string(),
                });
            }
        }

        let otp = supplied_otp.trim();
        if self.order_repo.confirm_delivery(order_id, otp)? {
            tracing::info!("送达核销: order_id={}", order_id);
            self.dispatcher.notify_best_effort(NotificationMessage::for_order(
                &order.user_id,
                "订单已送达",
                format!("订单 #{} 已送达, 感谢您的惠顾", &order_id[..8]),
                order_id,
            ));
            return self.load_order(order_id);
        }

        // 未命中, 重读定性
        let current = self.load_order(order_id)?;
        if current.status.is_terminal() {
            return Err(ApiError::OrderAlreadyFinalized {
                order_id: order_id.to_string(),
                status: current.status,
            });
        }
        if current.status != OrderStatus::OutForDelivery {
            return Err(ApiError::InvalidTransition {
                from: current.status,
                to: OrderStatus::Delivered,
            });
        }
        Err(ApiError::InvalidOtp)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 查询订单及明细（本人 / 被指派配送员 / 管理员可见）
    pub fn get_order(&self, actor: &Actor, order_id: &str) -> ApiResult<(Order, Vec<OrderItem>)> {
        let user_id = actor.require_user()?;
        let order = self.load_order(order_id)?;

        let visible = match actor.role {
            Role::Admin => true,
            Role::DeliveryPartner => {
                order.user_id == user_id || order.delivery_partner_id.as_deref() == Some(user_id)
            }
            Role::User => order.user_id == user_id,
        };
        if !visible {
            return Err(ApiError::NotFound(format!("订单(id={})不存在", order_id)));
        }

        let items = self.order_repo.find_items(order_id)?;
        Ok((order, items))
    }

    /// 查询本人订单（新单在前）
    pub fn list_user_orders(&self, actor: &Actor) -> ApiResult<Vec<Order>> {
        let user_id = actor.require_user()?;
        Ok(self.order_repo.list_by_user(user_id)?)
    }

    /// 查询指派给本配送员的订单（新单在前）
    pub fn list_partner_orders(&self, actor: &Actor) -> ApiResult<Vec<Order>> {
        let user_id = actor.require_staff("配送任务查询")?;
        Ok(self.order_repo.list_by_partner(user_id)?)
    }

    /// 查询全部订单（仅管理员, 新单在前）
    pub fn list_all_orders(&self, actor: &Actor) -> ApiResult<Vec<Order>> {
        actor.require_admin("全部订单查询")?;
        Ok(self.order_repo.list_all()?)
    }

    /// 查询在岗配送员（仅管理员, 指派候选名单）
    pub fn list_active_partners(&self, actor: &Actor) -> ApiResult<Vec<DeliveryPartner>> {
        actor.require_admin("配送员名单查询")?;
        Ok(self.partner_repo.list_active()?)
    }
}
