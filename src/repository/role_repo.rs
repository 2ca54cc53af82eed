// ==========================================
// 社区生鲜速达 - 角色仓储
// ==========================================
// 职责: user_roles 表的数据访问
// 说明: 角色判定规则与原系统一致 —
//   有 admin 行即管理员; 有在岗配送员记录即配送员; 其余为普通用户
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::types::Role;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex};

// ==========================================
// RoleRepository - 角色仓储
// ==========================================
pub struct RoleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RoleRepository {
    /// 创建新的 RoleRepository 实例
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

    /// 授予角色（幂等）
    pub fn grant(&self, user_id: &str, role: Role) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO user_roles (user_id, role) VALUES (?1, ?2)",
            params![user_id, role.to_db_str()],
        )?;
        Ok(())
    }

    /// 查询用户的全部授权角色
    pub fn roles_of(&self, user_id: &str) -> RepositoryResult<Vec<Role>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT role FROM user_roles WHERE user_id = ?1")?;

        let roles = stmt
            .query_map(params![user_id], |row| row.get::<_, String>(0))?
            .collect::<SqliteResult<Vec<String>>>()?;
        Ok(roles.iter().map(|s| Role::from_str(s)).collect())
    }

    /// 解析用户的生效角色
    ///
    /// # 规则
    /// - admin 行优先
    /// - 其次看是否为在岗配送员（delivery_partners.is_active = 1）
    /// - 兜底为普通用户
    pub fn resolve_role(&self, user_id: &str) -> RepositoryResult<Role> {
        let roles = self.roles_of(user_id)?;
        if roles.contains(&Role::Admin) {
            return Ok(Role::Admin);
        }

        let conn = self.get_conn()?;
        let is_active_partner = match conn.query_row(
            "SELECT 1 FROM delivery_partners WHERE user_id = ?1 AND is_active = 1 LIMIT 1",
            params![user_id],
            |_row| Ok(true),
        ) {
            Ok(found) => found,
            Err(rusqlite::Error::QueryReturnedNoRows) => false,
            Err(e) => return Err(e.into()),
        };

        if is_active_partner || roles.contains(&Role::DeliveryPartner) {
            Ok(Role::DeliveryPartner)
        } else {
            Ok(Role::User)
        }
    }
}
