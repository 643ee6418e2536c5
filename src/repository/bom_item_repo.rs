// ==========================================
// 物料批次队列 - BOM 物料查询
// ==========================================
// BOM 物料由外部模块维护，本模块只在上料时做存在性校验
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::bom::BomItem;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

// ==========================================
// BomItemLookup Trait
// ==========================================
#[async_trait]
pub trait BomItemLookup: Send + Sync {
    /// 按编码查询 BOM 物料
    async fn find_bom_item_by_code(&self, code: &str) -> RepositoryResult<Option<BomItem>>;
}

// ==========================================
// SqliteBomItemRepository - bom_item 表
// ==========================================
pub struct SqliteBomItemRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBomItemRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入或更新 BOM 物料（供数据同步与测试准备使用）
    pub fn upsert(&self, item: &BomItem) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO bom_item (code, name) VALUES (?1, ?2)
             ON CONFLICT(code) DO UPDATE SET name = ?2",
            params![item.code, item.name],
        )?;
        Ok(())
    }
}

#[async_trait]
impl BomItemLookup for SqliteBomItemRepository {
    async fn find_bom_item_by_code(&self, code: &str) -> RepositoryResult<Option<BomItem>> {
        let conn = self.get_conn()?;
        let item = conn
            .query_row(
                "SELECT code, name FROM bom_item WHERE code = ?1",
                params![code],
                |row| {
                    Ok(BomItem {
                        code: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(item)
    }
}
