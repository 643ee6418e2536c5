// ==========================================
// 物料批次队列 - 物料批仓储实现
// ==========================================
// 实现: BatchMaterialQueueRepository（rusqlite）
// 约束: 所有查询使用参数化；批量变更单事务 + revision 乐观锁
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::batch::{
    BatchChange, BatchMaterialQueueItem, CandidateCursor, NewBatchMaterialQueueItem, QueueItemId,
};
use crate::repository::batch_queue_repo::BatchMaterialQueueRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT
        id, bom_item_code, batch_code, initial_amount, remaining_amount,
        priority, revision, created_at, updated_at
    FROM batch_material_queue
"#;

// ==========================================
// SqliteBatchQueueRepository - 物料批仓储
// ==========================================
pub struct SqliteBatchQueueRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBatchQueueRepository {
    /// 创建新的物料批仓储实例
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

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn query_items(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> RepositoryResult<Vec<BatchMaterialQueueItem>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(sql)?;
        let items = stmt
            .query_map(params, map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn query_one(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> RepositoryResult<Option<BatchMaterialQueueItem>> {
        let conn = self.get_conn()?;
        let item = conn.query_row(sql, params, map_row).optional()?;
        Ok(item)
    }
}

/// 十进制数量以规范化 TEXT 存储
fn decimal_to_sql(value: Decimal) -> String {
    value.normalize().to_string()
}

fn decimal_column(row: &Row, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn map_row(row: &Row) -> rusqlite::Result<BatchMaterialQueueItem> {
    Ok(BatchMaterialQueueItem {
        id: row.get(0)?,
        bom_item_code: row.get(1)?,
        batch_code: row.get(2)?,
        initial_amount: decimal_column(row, 3)?,
        remaining_amount: decimal_column(row, 4)?,
        priority: row.get(5)?,
        revision: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

#[async_trait]
impl BatchMaterialQueueRepository for SqliteBatchQueueRepository {
    async fn find_top_candidates(
        &self,
        bom_item_code: &str,
        count: usize,
    ) -> RepositoryResult<Vec<BatchMaterialQueueItem>> {
        let sql = format!(
            "{} WHERE bom_item_code = ?1 AND depleted_flag = 0 ORDER BY priority ASC, id ASC LIMIT ?2",
            SELECT_COLUMNS
        );
        self.query_items(&sql, params![bom_item_code, count as i64])
    }

    async fn find_candidates_after(
        &self,
        bom_item_code: &str,
        cursor: CandidateCursor,
        count: usize,
    ) -> RepositoryResult<Vec<BatchMaterialQueueItem>> {
        let sql = format!(
            r#"{}
            WHERE bom_item_code = ?1
              AND depleted_flag = 0
              AND (priority > ?2 OR (priority = ?2 AND id > ?3))
            ORDER BY priority ASC, id ASC
            LIMIT ?4"#,
            SELECT_COLUMNS
        );
        self.query_items(
            &sql,
            params![bom_item_code, cursor.priority, cursor.id, count as i64],
        )
    }

    async fn check_batch_exists(
        &self,
        bom_item_code: &str,
        batch_code: &str,
    ) -> RepositoryResult<Option<BatchMaterialQueueItem>> {
        let sql = format!(
            "{} WHERE bom_item_code = ?1 AND batch_code = ?2",
            SELECT_COLUMNS
        );
        self.query_one(&sql, params![bom_item_code, batch_code])
    }

    async fn find_by_id(&self, id: QueueItemId) -> RepositoryResult<Option<BatchMaterialQueueItem>> {
        let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
        self.query_one(&sql, params![id])
    }

    async fn list_by_bom_item_code(
        &self,
        bom_item_code: &str,
        include_depleted: bool,
    ) -> RepositoryResult<Vec<BatchMaterialQueueItem>> {
        let sql = if include_depleted {
            format!(
                "{} WHERE bom_item_code = ?1 ORDER BY priority ASC, id ASC",
                SELECT_COLUMNS
            )
        } else {
            format!(
                "{} WHERE bom_item_code = ?1 AND depleted_flag = 0 ORDER BY priority ASC, id ASC",
                SELECT_COLUMNS
            )
        };
        self.query_items(&sql, params![bom_item_code])
    }

    async fn add(&self, item: NewBatchMaterialQueueItem) -> RepositoryResult<BatchMaterialQueueItem> {
        if item.amount < Decimal::ZERO {
            return Err(RepositoryError::InternalError(format!(
                "上料数量为负: {}",
                item.amount
            )));
        }

        let now = Utc::now();
        let id = {
            let conn = self.get_conn()?;
            conn.execute(
                r#"
                INSERT INTO batch_material_queue (
                    bom_item_code, batch_code, initial_amount, remaining_amount,
                    depleted_flag, priority, revision, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?3, ?4, ?5, 0, ?6, ?6)
                "#,
                params![
                    item.bom_item_code,
                    item.batch_code,
                    decimal_to_sql(item.amount),
                    (item.amount <= Decimal::ZERO) as i64,
                    item.priority,
                    now,
                ],
            )?;
            conn.last_insert_rowid()
        };

        Ok(BatchMaterialQueueItem {
            id,
            bom_item_code: item.bom_item_code,
            batch_code: item.batch_code,
            initial_amount: item.amount,
            remaining_amount: item.amount,
            priority: item.priority,
            revision: 0,
            created_at: now,
            updated_at: now,
        })
    }

    async fn save_changes(&self, changes: &[BatchChange]) -> RepositoryResult<usize> {
        if changes.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        // 立即取写锁，多连接并发提交时由 busy_timeout 排队
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        let now = Utc::now();
        let mut affected = 0;

        for change in changes {
            let updated = match change {
                BatchChange::RemainingAmount {
                    id,
                    expected_revision,
                    remaining_amount,
                } => {
                    if *remaining_amount < Decimal::ZERO {
                        return Err(RepositoryError::InternalError(format!(
                            "剩余量不能为负: queue_item_id={}, remaining={}",
                            id, remaining_amount
                        )));
                    }
                    tx.execute(
                        r#"
                        UPDATE batch_material_queue
                           SET remaining_amount = ?1, depleted_flag = ?2,
                               revision = revision + 1, updated_at = ?3
                         WHERE id = ?4 AND revision = ?5
                        "#,
                        params![
                            decimal_to_sql(*remaining_amount),
                            (*remaining_amount <= Decimal::ZERO) as i64,
                            now,
                            id,
                            expected_revision,
                        ],
                    )?
                }
                BatchChange::Priority {
                    id,
                    expected_revision,
                    priority,
                } => tx.execute(
                    r#"
                    UPDATE batch_material_queue
                       SET priority = ?1, revision = revision + 1, updated_at = ?2
                     WHERE id = ?3 AND revision = ?4
                    "#,
                    params![priority, now, id, expected_revision],
                )?,
            };

            if updated == 0 {
                // 判断是记录不存在还是 revision 冲突；返回即回滚
                let actual: Option<i64> = tx
                    .query_row(
                        "SELECT revision FROM batch_material_queue WHERE id = ?1",
                        params![change.id()],
                        |row| row.get(0),
                    )
                    .optional()?;

                return Err(match actual {
                    Some(actual) => RepositoryError::OptimisticLockFailure {
                        id: change.id(),
                        expected: change.expected_revision(),
                        actual,
                    },
                    None => RepositoryError::NotFound {
                        entity: "BatchMaterialQueueItem".to_string(),
                        id: change.id().to_string(),
                    },
                });
            }

            affected += updated;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(affected)
    }
}
