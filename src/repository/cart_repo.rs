// ==========================================
// 社区生鲜速达 - 购物车仓储
// ==========================================
// 职责: carts / cart_items 表的数据访问
// 红线:
// - 合并加购必须是单条条件 upsert 语句（原子读改写）, 不允许
//   调用方先读后写, 否则双开页签并发加购会丢更新
// - 礼包整体 upsert 必须在同一事务内, 部分插入属于损坏状态
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::cart::{Cart, CartLine};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// cart_items.kit_id 的"非礼包行"存储哨兵
///
/// 说明: UNIQUE(cart_id, product_id, kit_id) 对 NULL 不去重,
/// 因此散装行以空串落库, 读取时映射回 None。
const NO_KIT: &str = "";

fn parse_utc(s: String) -> DateTime<Utc> {
    s.parse::<DateTime<Utc>>().unwrap_or_else(|_| Utc::now())
}

fn map_line(row: &Row<'_>) -> rusqlite::Result<CartLine> {
    let kit_id: String = row.get(4)?;
    Ok(CartLine {
        cart_line_id: row.get(0)?,
        cart_id: row.get(1)?,
        product_id: row.get(2)?,
        quantity: row.get(3)?,
        kit_id: if kit_id.is_empty() { None } else { Some(kit_id) },
        is_kit_item: row.get(5)?,
        min_quantity: row.get(6)?,
        created_at: parse_utc(row.get::<_, String>(7)?),
        updated_at: parse_utc(row.get::<_, String>(8)?),
    })
}

const LINE_COLUMNS: &str = "cart_item_id, cart_id, product_id, quantity, kit_id, \
     is_kit_item, min_quantity, created_at, updated_at";

/// 礼包行 upsert 的输入（由 API 层从 KitItem 折算）
#[derive(Debug, Clone)]
pub struct KitLineUpsert {
    pub product_id: String,
    pub quantity: i64,
    pub min_quantity: i64,
}

// ==========================================
// CartRepository - 购物车仓储
// ==========================================
pub struct CartRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CartRepository {
    /// 创建新的 CartRepository 实例
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

    /// 查询或懒创建用户购物车
    ///
    /// # 说明
    /// - 购物车在首次变更时创建, 之后只清空不删除
    /// - INSERT OR IGNORE + 回读, 并发首购不会建出两辆车（user_id 唯一）
    pub fn get_or_create(&self, user_id: &str) -> RepositoryResult<Cart> {
        let conn = self.get_conn()?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            r#"
            INSERT OR IGNORE INTO carts (cart_id, user_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            "#,
            params![Uuid::new_v4().to_string(), user_id, now],
        )?;

        let mut stmt = conn.prepare(
            "SELECT cart_id, user_id, created_at, updated_at FROM carts WHERE user_id = ?1",
        )?;
        let cart = stmt.query_row(params![user_id], |row| {
            Ok(Cart {
                cart_id: row.get(0)?,
                user_id: row.get(1)?,
                created_at: parse_utc(row.get::<_, String>(2)?),
                updated_at: parse_utc(row.get::<_, String>(3)?),
            })
        })?;
        Ok(cart)
    }

    /// 散装加购（条件 upsert: 命中唯一键则数量累加）
    ///
    /// # 说明
    /// - 单条语句完成"存在则 +quantity, 不存在则插入",
    ///   两个并发加购最终数量为两者之和, 不丢更新
    pub fn upsert_product_line(
        &self,
        cart_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            r#"
            INSERT INTO cart_items (
                cart_item_id, cart_id, product_id, quantity, kit_id,
                is_kit_item, min_quantity, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0, 1, ?6, ?6)
            ON CONFLICT (cart_id, product_id, kit_id) DO UPDATE SET
                quantity = cart_items.quantity + excluded.quantity,
                updated_at = excluded.updated_at
            "#,
            params![
                Uuid::new_v4().to_string(),
                cart_id,
                product_id,
                quantity,
                NO_KIT,
                now
            ],
        )?;
        Ok(())
    }

    /// 礼包整体 upsert（单事务覆盖全部明细）
    ///
    /// # 说明
    /// - 合并规则: quantity = max(现有, 礼包数量), 已抬高的数量不回落,
    ///   保证礼包下限始终可满足
    /// - min_quantity 同样只升不降
    /// - 任一明细失败则整体回滚
    pub fn upsert_kit_lines(
        &self,
        cart_id: &str,
        kit_id: &str,
        lines: &[KitLineUpsert],
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let now = Utc::now().to_rfc3339();

        let mut count = 0;
        for line in lines {
            tx.execute(
                r#"
                INSERT INTO cart_items (
                    cart_item_id, cart_id, product_id, quantity, kit_id,
                    is_kit_item, min_quantity, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, ?7)
                ON CONFLICT (cart_id, product_id, kit_id) DO UPDATE SET
                    quantity = MAX(cart_items.quantity, excluded.quantity),
                    min_quantity = MAX(cart_items.min_quantity, excluded.min_quantity),
                    is_kit_item = 1,
                    updated_at = excluded.updated_at
                "#,
                params![
                    Uuid::new_v4().to_string(),
                    cart_id,
                    line.product_id,
                    line.quantity,
                    kit_id,
                    line.min_quantity,
                    now
                ],
            )?;
            count += 1;
        }

        tx.commit()?;
        Ok(count)
    }

    /// 按行ID查询购物车行
    pub fn find_line(&self, cart_line_id: &str) -> RepositoryResult<Option<CartLine>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM cart_items WHERE cart_item_id = ?1", LINE_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;

        let result = stmt.query_row(params![cart_line_id], map_line);
        match result {
            Ok(line) => Ok(Some(line)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询购物车全部行
    pub fn find_lines(&self, cart_id: &str) -> RepositoryResult<Vec<CartLine>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM cart_items WHERE cart_id = ?1 ORDER BY created_at, cart_item_id",
            LINE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let lines = stmt
            .query_map(params![cart_id], map_line)?
            .collect::<SqliteResult<Vec<CartLine>>>()?;
        Ok(lines)
    }

    /// 更新行数量（礼包下限由 API 层校验后, 此处仍带条件兜底）
    ///
    /// # 返回
    /// - Ok(true): 更新生效
    /// - Ok(false): 条件不满足（行不存在或跌破下限）, 未写入
    pub fn update_quantity(&self, cart_line_id: &str, quantity: i64) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE cart_items
            SET quantity = ?2, updated_at = ?3
            WHERE cart_item_id = ?1 AND ?2 >= min_quantity
            "#,
            params![cart_line_id, quantity, Utc::now().to_rfc3339()],
        )?;
        Ok(affected > 0)
    }

    /// 删除单行（仅散装行, 礼包行在 WHERE 中被排除）
    ///
    /// # 返回
    /// - Ok(true): 删除生效
    /// - Ok(false): 行不存在或为礼包行
    pub fn delete_non_kit_line(&self, cart_line_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM cart_items WHERE cart_item_id = ?1 AND is_kit_item = 0",
            params![cart_line_id],
        )?;
        Ok(affected > 0)
    }

    /// 清空散装行（礼包行保留, 镜像"可加不可删"的承诺）
    pub fn clear_non_kit_lines(&self, cart_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM cart_items WHERE cart_id = ?1 AND is_kit_item = 0",
            params![cart_id],
        )?;
        Ok(affected)
    }
}
