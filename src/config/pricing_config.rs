// ==========================================
// 社区生鲜速达 - 计价配置
// ==========================================
// 职责: 配送费/免配送门槛/起送额三项运营参数
// 存储: config_kv 表 (key-value), 缺省取编译期默认值
// 红线: 金额一律为分, 配置读取失败回退默认值并告警, 不阻断下单链路
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// config_kv 配置键全集
pub mod config_keys {
    /// 固定配送费（分）
    pub const DELIVERY_CHARGE_PAISE: &str = "pricing.delivery_charge_paise";
    /// 免配送费门槛（分）
    pub const FREE_DELIVERY_THRESHOLD_PAISE: &str = "pricing.free_delivery_threshold_paise";
    /// 起送额（分）
    pub const MIN_ORDER_AMOUNT_PAISE: &str = "pricing.min_order_amount_paise";
}

// ==========================================
// PricingConfig - 计价参数
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub delivery_charge_paise: i64,         // 固定配送费
    pub free_delivery_threshold_paise: i64, // 满额免配送
    pub min_order_amount_paise: i64,        // 起送额（低于此值结算被阻断）
}

impl Default for PricingConfig {
    fn default() -> Self {
        // 默认: 配送费 ₹30, 满 ₹550 免配送, 起送 ₹300
        Self {
            delivery_charge_paise: 3_000,
            free_delivery_threshold_paise: 55_000,
            min_order_amount_paise: 30_000,
        }
    }
}

impl PricingConfig {
    /// 从 config_kv 表加载（缺项取默认值）
    pub fn load(conn: &Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let conn = conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let mut cfg = Self::default();
        cfg.delivery_charge_paise =
            read_i64(&conn, config_keys::DELIVERY_CHARGE_PAISE).unwrap_or(cfg.delivery_charge_paise);
        cfg.free_delivery_threshold_paise = read_i64(&conn, config_keys::FREE_DELIVERY_THRESHOLD_PAISE)
            .unwrap_or(cfg.free_delivery_threshold_paise);
        cfg.min_order_amount_paise =
            read_i64(&conn, config_keys::MIN_ORDER_AMOUNT_PAISE).unwrap_or(cfg.min_order_amount_paise);

        if cfg.delivery_charge_paise < 0
            || cfg.free_delivery_threshold_paise < 0
            || cfg.min_order_amount_paise < 0
        {
            tracing::warn!("计价配置含负值, 回退默认值: {:?}", cfg);
            return Ok(Self::default());
        }

        Ok(cfg)
    }

    /// 覆写单个配置项（运营后台用）
    pub fn write_key(conn: &Arc<Mutex<Connection>>, key: &str, value: i64) -> RepositoryResult<()> {
        let conn = conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        conn.execute(
            r#"
            INSERT INTO config_kv (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
            ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value.to_string()],
        )?;
        Ok(())
    }
}

/// 读取整数配置（不存在或解析失败返回 None）
fn read_i64(conn: &Connection, key: &str) -> Option<i64> {
    let value: Option<String> = conn
        .query_row("SELECT value FROM config_kv WHERE key = ?1", params![key], |row| {
            row.get(0)
        })
        .ok();

    match value {
        Some(s) => match s.parse::<i64>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("配置项解析失败: key={}, value={}", key, s);
                None
            }
        },
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};

    fn setup() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    #[test]
    fn test_defaults_when_table_empty() {
        let conn = setup();
        let cfg = PricingConfig::load(&conn).unwrap();
        assert_eq!(cfg, PricingConfig::default());
    }

    #[test]
    fn test_override_from_config_kv() {
        let conn = setup();
        PricingConfig::write_key(&conn, config_keys::DELIVERY_CHARGE_PAISE, 2_000).unwrap();
        PricingConfig::write_key(&conn, config_keys::MIN_ORDER_AMOUNT_PAISE, 20_000).unwrap();

        let cfg = PricingConfig::load(&conn).unwrap();
        assert_eq!(cfg.delivery_charge_paise, 2_000);
        assert_eq!(cfg.min_order_amount_paise, 20_000);
        // 未覆写项保持默认
        assert_eq!(cfg.free_delivery_threshold_paise, 55_000);
    }
}
