// ==========================================
// 社区生鲜速达 - 配送员与用户资料仓储
// ==========================================
// 职责: delivery_partners / profiles 表的数据访问
// 红线: 配送员被订单软引用, 停用不删除
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::order::{DeliveryPartner, Profile};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

fn parse_utc(s: String) -> DateTime<Utc> {
    s.parse::<DateTime<Utc>>().unwrap_or_else(|_| Utc::now())
}

fn map_partner(row: &Row<'_>) -> rusqlite::Result<DeliveryPartner> {
    Ok(DeliveryPartner {
        user_id: row.get(0)?,
        vehicle_type: row.get(1)?,
        is_active: row.get(2)?,
        created_at: parse_utc(row.get::<_, String>(3)?),
        updated_at: parse_utc(row.get::<_, String>(4)?),
    })
}

// ==========================================
// DeliveryPartnerRepository - 配送员仓储
// ==========================================
pub struct DeliveryPartnerRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DeliveryPartnerRepository {
    /// 创建新的 DeliveryPartnerRepository 实例
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

    /// 登记配送员（INSERT OR REPLACE）
    pub fn upsert(&self, partner: &DeliveryPartner) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO delivery_partners (
                user_id, vehicle_type, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                partner.user_id,
                partner.vehicle_type,
                partner.is_active,
                partner.created_at.to_rfc3339(),
                partner.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// 按 user_id 查询配送员
    pub fn find_by_user_id(&self, user_id: &str) -> RepositoryResult<Option<DeliveryPartner>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, vehicle_type, is_active, created_at, updated_at
             FROM delivery_partners WHERE user_id = ?1",
        )?;

        let result = stmt.query_row(params![user_id], map_partner);
        match result {
            Ok(partner) => Ok(Some(partner)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询全部在岗配送员
    pub fn list_active(&self) -> RepositoryResult<Vec<DeliveryPartner>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, vehicle_type, is_active, created_at, updated_at
             FROM delivery_partners WHERE is_active = 1 ORDER BY user_id",
        )?;

        let partners = stmt
            .query_map([], map_partner)?
            .collect::<SqliteResult<Vec<DeliveryPartner>>>()?;
        Ok(partners)
    }

    /// 上/下岗切换
    pub fn set_active(&self, user_id: &str, is_active: bool) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE delivery_partners SET is_active = ?2, updated_at = ?3 WHERE user_id = ?1",
            params![user_id, is_active, Utc::now().to_rfc3339()],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "DeliveryPartner".to_string(),
                id: user_id.to_string(),
            });
        }
        Ok(())
    }
}

// ==========================================
// ProfileRepository - 用户资料仓储
// ==========================================
// 用途: 指派通知需要拼装客户姓名/电话
pub struct ProfileRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProfileRepository {
    /// 创建新的 ProfileRepository 实例
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

    /// 写入用户资料（INSERT OR REPLACE）
    pub fn upsert(&self, profile: &Profile) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO profiles (
                user_id, full_name, phone, address, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                profile.user_id,
                profile.full_name,
                profile.phone,
                profile.address,
                profile.created_at.to_rfc3339(),
                profile.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// 按 user_id 查询用户资料
    pub fn find_by_user_id(&self, user_id: &str) -> RepositoryResult<Option<Profile>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, full_name, phone, address, created_at, updated_at
             FROM profiles WHERE user_id = ?1",
        )?;

        let result = stmt.query_row(params![user_id], |row| {
            Ok(Profile {
                user_id: row.get(0)?,
                full_name: row.get(1)?,
                phone: row.get(2)?,
                address: row.get(3)?,
                created_at: parse_utc(row.get::<_, String>(4)?),
                updated_at: parse_utc(row.get::<_, String>(5)?),
            })
        });

        match result {
            Ok(profile) => Ok(Some(profile)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
