// ==========================================
// 社区生鲜速达 - 订单仓储
// ==========================================
// 职责: orders / order_items 表的数据访问
// 红线:
// - 订单 + 明细 + 购物车清空必须在同一事务内提交,
//   "有订单无明细"属于损坏状态
// - 状态变更是对持久化状态的 CAS（WHERE status = 期望值）,
//   以受影响行数判定胜负, 并发下不得跳状态/重复生效
// - 送达确认是单条条件更新（WHERE status='out_for_delivery' AND otp_code=?）,
//   并发提交恰好一个成功
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::order::{Order, OrderItem};
use crate::domain::types::{OrderStatus, PaymentMethod, PaymentStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const ORDER_COLUMNS: &str = "order_id, user_id, status, total_amount_paise, delivery_address, \
     delivery_latitude, delivery_longitude, delivery_instructions, payment_method, \
     payment_status, otp_code, delivery_partner_id, created_at, updated_at";

fn parse_utc(s: String) -> DateTime<Utc> {
    s.parse::<DateTime<Utc>>().unwrap_or_else(|_| Utc::now())
}

fn map_order(row: &Row<'_>) -> rusqlite::Result<Order> {
    let status_str: String = row.get(2)?;
    let method_str: String = row.get(8)?;
    let pay_status_str: String = row.get(9)?;
    Ok(Order {
        order_id: row.get(0)?,
        user_id: row.get(1)?,
        status: OrderStatus::from_str(&status_str).unwrap_or(OrderStatus::Placed),
        total_amount_paise: row.get(3)?,
        delivery_address: row.get(4)?,
        delivery_latitude: row.get(5)?,
        delivery_longitude: row.get(6)?,
        delivery_instructions: row.get(7)?,
        payment_method: PaymentMethod::from_str(&method_str).unwrap_or(PaymentMethod::Cod),
        payment_status: PaymentStatus::from_str(&pay_status_str).unwrap_or(PaymentStatus::Pending),
        otp_code: row.get(10)?,
        delivery_partner_id: row.get(11)?,
        created_at: parse_utc(row.get::<_, String>(12)?),
        updated_at: parse_utc(row.get::<_, String>(13)?),
    })
}

// ==========================================
// OrderRepository - 订单仓储
// ==========================================
pub struct OrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OrderRepository {
    /// 创建新的 OrderRepository 实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建订单（订单 + 明细 + 清空购物车, 单事务）
    ///
    /// # 参数
    /// - order: 订单主数据（结算层已算好总额/取件码）
    /// - items: 价格冻结明细
    /// - clear_cart_id: 结算消费的购物车, 提交成功后整车清空
    ///
    /// # 说明
    /// - 三步同事务: 任一失败整体回滚, 不留部分状态
    pub fn create_with_items(
        &self,
        order: &Order,
        items: &[OrderItem],
        clear_cart_id: &str,
    ) -> RepositoryResult<()> {
        if items.is_empty() {
            return Err(RepositoryError::ValidationError(
                "订单必须至少包含一条明细".to_string(),
            ));
        }

        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            r#"
            INSERT INTO orders (
                order_id, user_id, status, total_amount_paise, delivery_address,
                delivery_latitude, delivery_longitude, delivery_instructions,
                payment_method, payment_status, otp_code, delivery_partner_id,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                order.order_id,
                order.user_id,
                order.status.to_db_str(),
                order.total_amount_paise,
                order.delivery_address,
                order.delivery_latitude,
                order.delivery_longitude,
                order.delivery_instructions,
                order.payment_method.to_db_str(),
                order.payment_status.to_db_str(),
                order.otp_code,
                order.delivery_partner_id,
                order.created_at.to_rfc3339(),
                order.updated_at.to_rfc3339(),
            ],
        )?;

        for item in items {
            tx.execute(
                r#"
                INSERT INTO order_items (
                    order_item_id, order_id, product_id, quantity,
                    unit_price_paise, total_price_paise
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    item.order_item_id,
                    item.order_id,
                    item.product_id,
                    item.quantity,
                    item.unit_price_paise,
                    item.total_price_paise,
                ],
            )?;
        }

        // 结算吃掉了全部行, 整车清空（含礼包行）
        tx.execute("DELETE FROM cart_items WHERE cart_id = ?1", params![clear_cart_id])?;

        tx.commit()?;
        Ok(())
    }

    /// 按 order_id 查询订单
    pub fn find_by_id(&self, order_id: &str) -> RepositoryResult<Option<Order>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM orders WHERE order_id = ?1", ORDER_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;

        let result = stmt.query_row(params![order_id], map_order);
        match result {
            Ok(order) => Ok(Some(order)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询订单明细
    pub fn find_items(&self, order_id: &str) -> RepositoryResult<Vec<OrderItem>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT order_item_id, order_id, product_id, quantity,
                   unit_price_paise, total_price_paise
            FROM order_items
            WHERE order_id = ?1
            ORDER BY order_item_id
            "#,
        )?;

        let items = stmt
            .query_map(params![order_id], |row| {
                Ok(OrderItem {
                    order_item_id: row.get(0)?,
                    order_id: row.get(1)?,
                    product_id: row.get(2)?,
                    quantity: row.get(3)?,
                    unit_price_paise: row.get(4)?,
                    total_price_paise: row.get(5)?,
                })
            })?
            .collect::<SqliteResult<Vec<OrderItem>>>()?;
        Ok(items)
    }

    /// 按用户查询订单（新单在前）
    pub fn list_by_user(&self, user_id: &str) -> RepositoryResult<Vec<Order>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM orders WHERE user_id = ?1 ORDER BY created_at DESC",
            ORDER_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let orders = stmt
            .query_map(params![user_id], map_order)?
            .collect::<SqliteResult<Vec<Order>>>()?;
        Ok(orders)
    }

    /// 按配送员查询订单（新单在前）
    pub fn list_by_partner(&self, partner_id: &str) -> RepositoryResult<Vec<Order>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM orders WHERE delivery_partner_id = ?1 ORDER BY created_at DESC",
            ORDER_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let orders = stmt
            .query_map(params![partner_id], map_order)?
            .collect::<SqliteResult<Vec<Order>>>()?;
        Ok(orders)
    }

    /// 查询全部订单（后台视图, 新单在前）
    pub fn list_all(&self) -> RepositoryResult<Vec<Order>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM orders ORDER BY created_at DESC", ORDER_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;

        let orders = stmt
            .query_map([], map_order)?
            .collect::<SqliteResult<Vec<Order>>>()?;
        Ok(orders)
    }

    /// 状态 CAS 更新
    ///
    /// # 参数
    /// - expected: 调用方校验过的当前状态（比较值）
    /// - target: 目标状态
    ///
    /// # 返回
    /// - Ok(true): CAS 命中, 状态已写入并加盖 updated_at
    /// - Ok(false): 持久化状态已不是 expected（并发竞争者先行）, 未写入
    pub fn update_status_cas(
        &self,
        order_id: &str,
        expected: OrderStatus,
        target: OrderStatus,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE orders SET status = ?3, updated_at = ?4 WHERE order_id = ?1 AND status = ?2",
            params![
                order_id,
                expected.to_db_str(),
                target.to_db_str(),
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(affected > 0)
    }

    /// 指派配送员（仅非终态订单生效）
    ///
    /// # 返回
    /// - Ok(true): 指派写入
    /// - Ok(false): 订单不存在或已终结
    pub fn assign_partner(&self, order_id: &str, partner_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE orders
            SET delivery_partner_id = ?2, updated_at = ?3
            WHERE order_id = ?1 AND status NOT IN ('delivered', 'cancelled')
            "#,
            params![order_id, partner_id, Utc::now().to_rfc3339()],
        )?;
        Ok(affected > 0)
    }

    /// 送达确认（条件更新, 并发提交恰好一个成功）
    ///
    /// # 说明
    /// - 命中条件: 配送中 且 取件码一致
    /// - 命中时原子写入 status=delivered + payment_status=completed
    /// - 取件码因订单进入终态而天然单次有效
    ///
    /// # 返回
    /// - Ok(true): 本次提交胜出, 订单已送达
    /// - Ok(false): 未命中（状态不对 / 取件码不符 / 已被并发者确认）
    pub fn confirm_delivery(&self, order_id: &str, otp_code: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE orders
            SET status = 'delivered', payment_status = 'completed', updated_at = ?3
            WHERE order_id = ?1 AND status = 'out_for_delivery' AND otp_code = ?2
            "#,
            params![order_id, otp_code, Utc::now().to_rfc3339()],
        )?;
        Ok(affected > 0)
    }
}
