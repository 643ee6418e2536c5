// ==========================================
// 物料批次队列 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// 配置键
// ==========================================
pub mod config_keys {
    /// 每次拉取的候选批次数（分页大小）
    pub const CANDIDATE_PAGE_SIZE: &str = "batch_queue/candidate_page_size";
    /// 乐观锁冲突时的最大重试次数
    pub const MAX_CONFLICT_RETRIES: &str = "batch_queue/max_conflict_retries";
    /// 指定批次单一扣料的扣除量
    pub const SPECIFIC_DEDUCT_UNIT: &str = "batch_queue/specific_deduct_unit";
}

/// 默认候选分页大小
pub const DEFAULT_CANDIDATE_PAGE_SIZE: usize = 4;
/// 默认最大冲突重试次数
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

// ==========================================
// BatchQueueConfig - 物料批队列配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchQueueConfig {
    pub candidate_page_size: usize,
    pub max_conflict_retries: u32,
    pub specific_deduct_unit: Decimal,
}

impl Default for BatchQueueConfig {
    fn default() -> Self {
        Self {
            candidate_page_size: DEFAULT_CANDIDATE_PAGE_SIZE,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            specific_deduct_unit: Decimal::ONE,
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取并解析配置值；缺失或非法时使用默认值
    fn get_parsed_or_default<T, F>(&self, key: &str, default: T, valid: F) -> RepositoryResult<T>
    where
        T: FromStr + Copy + std::fmt::Debug,
        F: Fn(&T) -> bool,
    {
        let raw = match self.get_global_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };

        match raw.trim().parse::<T>() {
            Ok(v) if valid(&v) => Ok(v),
            _ => {
                warn!(key = key, value = %raw, default = ?default, "配置值非法，使用默认值");
                Ok(default)
            }
        }
    }

    /// 加载物料批队列配置
    pub fn load_batch_queue_config(&self) -> RepositoryResult<BatchQueueConfig> {
        let page_size = self.get_parsed_or_default(
            config_keys::CANDIDATE_PAGE_SIZE,
            DEFAULT_CANDIDATE_PAGE_SIZE,
            |v| *v > 0,
        )?;
        let max_retries = self.get_parsed_or_default(
            config_keys::MAX_CONFLICT_RETRIES,
            DEFAULT_MAX_CONFLICT_RETRIES,
            |_| true,
        )?;
        let unit = self.get_parsed_or_default(
            config_keys::SPECIFIC_DEDUCT_UNIT,
            Decimal::ONE,
            |v| *v > Decimal::ZERO,
        )?;

        Ok(BatchQueueConfig {
            candidate_page_size: page_size,
            max_conflict_retries: max_retries,
            specific_deduct_unit: unit,
        })
    }

    /// 获取所有 global 配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key",
        )?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        serde_json::to_string(&json!(config_map))
            .map_err(|e| RepositoryError::InternalError(e.to_string()))
    }
}
