// ==========================================
// 社区生鲜速达 - 商品目录仓储
// ==========================================
// 职责: products / kits / kit_items 表的数据访问
// 红线: 核心业务流程对目录只读; 写接口仅供后台维护与测试播种
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::catalog::{Kit, KitItem, KitWithItems, Product};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const PRODUCT_COLUMNS: &str = "product_id, name, description, unit, price_paise, \
     original_price_paise, discount_percentage, category, in_stock, created_at, updated_at";

fn parse_utc(s: String) -> DateTime<Utc> {
    s.parse::<DateTime<Utc>>().unwrap_or_else(|_| Utc::now())
}

fn map_product(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        product_id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        unit: row.get(3)?,
        price_paise: row.get(4)?,
        original_price_paise: row.get(5)?,
        discount_percentage: row.get(6)?,
        category: row.get(7)?,
        in_stock: row.get(8)?,
        created_at: parse_utc(row.get::<_, String>(9)?),
        updated_at: parse_utc(row.get::<_, String>(10)?),
    })
}

// ==========================================
// ProductRepository - 商品仓储
// ==========================================
pub struct ProductRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductRepository {
    /// 创建新的 ProductRepository 实例
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

    /// 插入商品（INSERT OR REPLACE, 后台维护/播种用）
    ///
    /// # 说明
    /// - 折扣不变式在此处校验: 有折扣必须原价 > 现价
    pub fn upsert(&self, product: &Product) -> RepositoryResult<()> {
        if !product.discount_is_consistent() {
            return Err(RepositoryError::ValidationError(format!(
                "商品折扣不自洽: product_id={}, 原价必须高于现价",
                product.product_id
            )));
        }

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO products (
                product_id, name, description, unit, price_paise,
                original_price_paise, discount_percentage, category, in_stock,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                product.product_id,
                product.name,
                product.description,
                product.unit,
                product.price_paise,
                product.original_price_paise,
                product.discount_percentage,
                product.category,
                product.in_stock,
                product.created_at.to_rfc3339(),
                product.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// 修改商品现价（目录编辑路径, 不影响已生成订单的冻结价）
    pub fn update_price(&self, product_id: &str, price_paise: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE products SET price_paise = ?2, updated_at = ?3 WHERE product_id = ?1",
            params![product_id, price_paise, Utc::now().to_rfc3339()],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Product".to_string(),
                id: product_id.to_string(),
            });
        }
        Ok(())
    }

    /// 按 product_id 查询商品
    pub fn find_by_id(&self, product_id: &str) -> RepositoryResult<Option<Product>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM products WHERE product_id = ?1", PRODUCT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;

        let result = stmt.query_row(params![product_id], map_product);
        match result {
            Ok(product) => Ok(Some(product)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 批量查询商品（按 id 列表, 用于购物车/结算聚合）
    pub fn find_by_ids(&self, product_ids: &[String]) -> RepositoryResult<Vec<Product>> {
        if product_ids.is_empty() {
            return Ok(vec![]);
        }

        let conn = self.get_conn()?;
        let placeholders = product_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT {} FROM products WHERE product_id IN ({})",
            PRODUCT_COLUMNS, placeholders
        );

        let mut stmt = conn.prepare(&sql)?;
        let params_vec: Vec<&dyn rusqlite::ToSql> = product_ids
            .iter()
            .map(|id| id as &dyn rusqlite::ToSql)
            .collect();

        let products = stmt
            .query_map(params_vec.as_slice(), map_product)?
            .collect::<SqliteResult<Vec<Product>>>()?;
        Ok(products)
    }

    /// 查询所有在售商品
    pub fn list_in_stock(&self) -> RepositoryResult<Vec<Product>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM products WHERE in_stock = 1 ORDER BY category, name",
            PRODUCT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let products = stmt
            .query_map([], map_product)?
            .collect::<SqliteResult<Vec<Product>>>()?;
        Ok(products)
    }
}

// ==========================================
// KitRepository - 礼包仓储
// ==========================================
pub struct KitRepository {
    conn: Arc<Mutex<Connection>>,
}

impl KitRepository {
    /// 创建新的 KitRepository 实例
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

    /// 插入礼包及其全部明细（单事务, 后台维护/播种用）
    pub fn upsert_with_items(&self, kit: &Kit, items: &[KitItem]) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            r#"
            INSERT OR REPLACE INTO kits (kit_id, name, description, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                kit.kit_id,
                kit.name,
                kit.description,
                kit.is_active,
                kit.created_at.to_rfc3339(),
                kit.updated_at.to_rfc3339(),
            ],
        )?;

        tx.execute("DELETE FROM kit_items WHERE kit_id = ?1", params![kit.kit_id])?;
        for item in items {
            tx.execute(
                r#"
                INSERT INTO kit_items (kit_item_id, kit_id, product_id, quantity, is_mandatory, sort_no)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    item.kit_item_id,
                    item.kit_id,
                    item.product_id,
                    item.quantity,
                    item.is_mandatory,
                    item.sort_no,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// 按 kit_id 查询礼包主数据
    pub fn find_by_id(&self, kit_id: &str) -> RepositoryResult<Option<Kit>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT kit_id, name, description, is_active, created_at, updated_at
             FROM kits WHERE kit_id = ?1",
        )?;

        let result = stmt.query_row(params![kit_id], |row| {
            Ok(Kit {
                kit_id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                is_active: row.get(3)?,
                created_at: parse_utc(row.get::<_, String>(4)?),
                updated_at: parse_utc(row.get::<_, String>(5)?),
            })
        });

        match result {
            Ok(kit) => Ok(Some(kit)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询礼包明细（含商品快照, 按 sort_no 排序）
    pub fn find_items(&self, kit_id: &str) -> RepositoryResult<Vec<(KitItem, Product)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT ki.kit_item_id, ki.kit_id, ki.product_id, ki.quantity, ki.is_mandatory, ki.sort_no,
                   p.product_id, p.name, p.description, p.unit, p.price_paise,
                   p.original_price_paise, p.discount_percentage, p.category, p.in_stock,
                   p.created_at, p.updated_at
            FROM kit_items ki
            JOIN products p ON p.product_id = ki.product_id
            WHERE ki.kit_id = ?1
            ORDER BY ki.sort_no, ki.kit_item_id
            "#,
        )?;

        let rows = stmt
            .query_map(params![kit_id], |row| {
                let item = KitItem {
                    kit_item_id: row.get(0)?,
                    kit_id: row.get(1)?,
                    product_id: row.get(2)?,
                    quantity: row.get(3)?,
                    is_mandatory: row.get(4)?,
                    sort_no: row.get(5)?,
                };
                let product = Product {
                    product_id: row.get(6)?,
                    name: row.get(7)?,
                    description: row.get(8)?,
                    unit: row.get(9)?,
                    price_paise: row.get(10)?,
                    original_price_paise: row.get(11)?,
                    discount_percentage: row.get(12)?,
                    category: row.get(13)?,
                    in_stock: row.get(14)?,
                    created_at: parse_utc(row.get::<_, String>(15)?),
                    updated_at: parse_utc(row.get::<_, String>(16)?),
                };
                Ok((item, product))
            })?
            .collect::<SqliteResult<Vec<(KitItem, Product)>>>()?;
        Ok(rows)
    }

    /// 查询礼包聚合视图（礼包 + 明细）
    pub fn find_with_items(&self, kit_id: &str) -> RepositoryResult<Option<KitWithItems>> {
        let kit = match self.find_by_id(kit_id)? {
            Some(kit) => kit,
            None => return Ok(None),
        };
        let items = self.find_items(kit_id)?;
        Ok(Some(KitWithItems { kit, items }))
    }

    /// 查询所有上架礼包
    pub fn list_active(&self) -> RepositoryResult<Vec<Kit>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT kit_id, name, description, is_active, created_at, updated_at
             FROM kits WHERE is_active = 1 ORDER BY created_at DESC",
        )?;

        let kits = stmt
            .query_map([], |row| {
                Ok(Kit {
                    kit_id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    is_active: row.get(3)?,
                    created_at: parse_utc(row.get::<_, String>(4)?),
                    updated_at: parse_utc(row.get::<_, String>(5)?),
                })
            })?
            .collect::<SqliteResult<Vec<Kit>>>()?;
        Ok(kits)
    }
}
