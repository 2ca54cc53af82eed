// ==========================================
// 社区生鲜速达 - 应用装配
// ==========================================
// 职责: 在一条共享连接上装配全部仓储与 API
// 红线: 全库只开一条连接 (Arc<Mutex<Connection>>),
//       所有仓储共享同一把锁, 事务边界才有意义
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::policy::{AccessPolicy, Actor, SqliteAccessPolicy};
use crate::api::{ApiResult, CartApi, CatalogApi, OrderApi};
use crate::config::PricingConfig;
use crate::db;
use crate::engine::notify::{OptionalDispatcher, RepositoryDispatcher};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{
    CartRepository, DeliveryPartnerRepository, KitRepository, NotificationRepository,
    OrderRepository, ProductRepository, ProfileRepository, RoleRepository,
};

// ==========================================
// AppState - 应用状态
// ==========================================

/// 应用状态: 仓储 + API 的装配结果
///
/// 说明：
/// - 建库即建表（幂等）, 计价参数从 config_kv 覆盖加载
/// - 默认通知落 notifications 表, 可换任意 dispatcher
pub struct AppState {
    conn: Arc<Mutex<Connection>>,

    // 仓储层
    pub product_repo: Arc<ProductRepository>,
    pub kit_repo: Arc<KitRepository>,
    pub cart_repo: Arc<CartRepository>,
    pub order_repo: Arc<OrderRepository>,
    pub partner_repo: Arc<DeliveryPartnerRepository>,
    pub profile_repo: Arc<ProfileRepository>,
    pub notification_repo: Arc<NotificationRepository>,
    pub role_repo: Arc<RoleRepository>,

    // API 层
    pub catalog_api: CatalogApi,
    pub cart_api: CartApi,
    pub order_api: OrderApi,

    // 访问策略
    pub access_policy: SqliteAccessPolicy,

    // 计价参数（装配时快照）
    pub pricing_config: PricingConfig,
}

impl AppState {
    /// 按库文件路径装配
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = db::open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 在已有连接上装配（测试注入内存库）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            db::init_schema(&guard)?;
        }

        let pricing_config = PricingConfig::load(&conn)?;

        let product_repo = Arc::new(ProductRepository::from_connection(Arc::clone(&conn)));
        let kit_repo = Arc::new(KitRepository::from_connection(Arc::clone(&conn)));
        let cart_repo = Arc::new(CartRepository::from_connection(Arc::clone(&conn)));
        let order_repo = Arc::new(OrderRepository::from_connection(Arc::clone(&conn)));
        let partner_repo = Arc::new(DeliveryPartnerRepository::from_connection(Arc::clone(&conn)));
        let profile_repo = Arc::new(ProfileRepository::from_connection(Arc::clone(&conn)));
        let notification_repo =
            Arc::new(NotificationRepository::from_connection(Arc::clone(&conn)));
        let role_repo = Arc::new(RoleRepository::from_connection(Arc::clone(&conn)));

        let dispatcher = OptionalDispatcher::with_dispatcher(Arc::new(
            RepositoryDispatcher::new(Arc::clone(&notification_repo)),
        ));

        let catalog_api = CatalogApi::new(Arc::clone(&product_repo), Arc::clone(&kit_repo));
        let cart_api = CartApi::new(
            Arc::clone(&cart_repo),
            Arc::clone(&product_repo),
            Arc::clone(&kit_repo),
            pricing_config.clone(),
        );
        let order_api = OrderApi::new(
            Arc::clone(&order_repo),
            Arc::clone(&cart_repo),
            Arc::clone(&product_repo),
            Arc::clone(&partner_repo),
            Arc::clone(&profile_repo),
            dispatcher,
            pricing_config.clone(),
        );

        let access_policy = SqliteAccessPolicy::new(Arc::clone(&role_repo));

        Ok(Self {
            conn,
            product_repo,
            kit_repo,
            cart_repo,
            order_repo,
            partner_repo,
            profile_repo,
            notification_repo,
            role_repo,
            catalog_api,
            cart_api,
            order_api,
            access_policy,
            pricing_config,
        })
    }

    /// 把外部会话解析为操作主体（角色以 user_roles / delivery_partners 为准）
    pub fn resolve_actor(&self, user_id: Option<&str>) -> ApiResult<Actor> {
        self.access_policy.resolve_actor(user_id)
    }

    /// 共享连接句柄（测试/运维脚本用）
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }
}
