// ==========================================
// 社区生鲜速达 - 通知仓储
// ==========================================
// 职责: notifications 表的数据访问
// 说明: 核心只负责落库, 推送/短信等传输通道由外部服务消费此表
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::order::Notification;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex};

fn parse_utc(s: String) -> DateTime<Utc> {
    s.parse::<DateTime<Utc>>().unwrap_or_else(|_| Utc::now())
}

// ==========================================
// NotificationRepository - 通知仓储
// ==========================================
pub struct NotificationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl NotificationRepository {
    /// 创建新的 NotificationRepository 实例
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

    /// 写入一条通知
    pub fn insert(&self, notification: &Notification) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO notifications (
                notification_id, user_id, title, message, order_id, read_flag, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                notification.notification_id,
                notification.user_id,
                notification.title,
                notification.message,
                notification.order_id,
                notification.read_flag,
                notification.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// 按接收用户查询通知（新通知在前）
    pub fn list_by_user(&self, user_id: &str) -> RepositoryResult<Vec<Notification>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT notification_id, user_id, title, message, order_id, read_flag, created_at
            FROM notifications
            WHERE user_id = ?1
            ORDER BY created_at DESC
            "#,
        )?;

        let notifications = stmt
            .query_map(params![user_id], |row| {
                Ok(Notification {
                    notification_id: row.get(0)?,
                    user_id: row.get(1)?,
                    title: row.get(2)?,
                    message: row.get(3)?,
                    order_id: row.get(4)?,
                    read_flag: row.get(5)?,
                    created_at: parse_utc(row.get::<_, String>(6)?),
                })
            })?
            .collect::<SqliteResult<Vec<Notification>>>()?;
        Ok(notifications)
    }

    /// 标记已读
    pub fn mark_read(&self, notification_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE notifications SET read_flag = 1 WHERE notification_id = ?1",
            params![notification_id],
        )?;
        Ok(())
    }
}
