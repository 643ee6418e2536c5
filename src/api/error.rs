// ==========================================
// 物料批次队列 - API层错误类型
// ==========================================
// 职责: 将命令层/仓储层错误转换为带稳定错误码的对外错误
// 约束: 每个业务错误标签映射唯一且稳定的 code，调用方按 code 分支
// ==========================================

use crate::command::error::{BatchQueueError, DeductError, LoadError};
use crate::repository::error::RepositoryError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 上料错误
    // ==========================================
    #[error("上料数量非法: {amount}")]
    LoadInvalidAmount { amount: Decimal },

    #[error("BOM物料不存在: {bom_item_code}")]
    LoadBomItemNotFound { bom_item_code: String },

    #[error("批次重复: bom_item_code={bom_item_code}, batch_code={batch_code}")]
    LoadDuplicateBatch {
        bom_item_code: String,
        batch_code: String,
    },

    // ==========================================
    // 扣料错误
    // ==========================================
    #[error("扣除量非法: {amount}")]
    DeductInvalidAmount { amount: Decimal },

    #[error("扣料超额: bom_item_code={bom_item_code}, 需求={required}, 可用={available}")]
    DeductInsufficient {
        bom_item_code: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("指定批次错误: 请求批次={requested}, 队首批次={head}")]
    DeductDesignatedBatchMismatch {
        bom_item_code: String,
        requested: String,
        head: String,
    },

    // ==========================================
    // 物料批通用错误
    // ==========================================
    #[error("物料批操作失败: {0}")]
    BatchMisc(String),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("并发冲突，请稍后重试: bom_item_code={bom_item_code}, 已尝试{attempts}次")]
    ConcurrencyConflict { bom_item_code: String, attempts: u32 },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 稳定错误码
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::LoadInvalidAmount { .. } => "BATCH_LOAD_INVALID_AMOUNT",
            ApiError::LoadBomItemNotFound { .. } => "BATCH_LOAD_BOM_ITEM_NOT_FOUND",
            ApiError::LoadDuplicateBatch { .. } => "BATCH_LOAD_DUPLICATE",
            ApiError::DeductInvalidAmount { .. } => "BATCH_DEDUCT_INVALID_AMOUNT",
            ApiError::DeductInsufficient { .. } => "BATCH_DEDUCT_INSUFFICIENT",
            ApiError::DeductDesignatedBatchMismatch { .. } => "BATCH_DEDUCT_DESIGNATED_MISMATCH",
            ApiError::BatchMisc(_) => "BATCH_MISC",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::DatabaseConnectionError(_) => "DATABASE_CONNECTION_ERROR",
            ApiError::DatabaseTransactionError(_) => "DATABASE_TRANSACTION_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::Other(_) => "OTHER_ERROR",
        }
    }

    /// 是否值得调用方稍后重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::ConcurrencyConflict { .. } | ApiError::DatabaseConnectionError(_)
        )
    }

    /// 转换为对外错误响应
    pub fn to_response(&self) -> ErrorResponse {
        let details = match self {
            ApiError::LoadDuplicateBatch {
                bom_item_code,
                batch_code,
            } => Some(serde_json::json!({
                "bom_item_code": bom_item_code,
                "batch_code": batch_code,
            })),
            ApiError::DeductInsufficient {
                bom_item_code,
                required,
                available,
            } => Some(serde_json::json!({
                "bom_item_code": bom_item_code,
                "required": required.to_string(),
                "available": available.to_string(),
            })),
            ApiError::DeductDesignatedBatchMismatch {
                bom_item_code,
                requested,
                head,
            } => Some(serde_json::json!({
                "bom_item_code": bom_item_code,
                "requested": requested,
                "head": head,
            })),
            ApiError::ConcurrencyConflict {
                bom_item_code,
                attempts,
            } => Some(serde_json::json!({
                "bom_item_code": bom_item_code,
                "attempts": attempts,
            })),
            _ => None,
        };

        ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
            details,
        }
    }
}

// ==========================================
// 错误响应（返回给上层调用方）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: String,

    /// 错误消息
    pub message: String,

    /// 详细信息（可选）
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    /// 序列化为 JSON 字符串
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.message.clone())
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::OptimisticLockFailure { id, expected, actual } => {
                ApiError::DatabaseTransactionError(format!(
                    "物料批{}已被其他操作修改（期望revision={}，实际revision={}）",
                    id, expected, actual
                ))
            }
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::DatabaseError(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::DatabaseError(format!("外键约束违反: {}", msg))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 BatchQueueError 转换
// ==========================================
impl From<BatchQueueError> for ApiError {
    fn from(err: BatchQueueError) -> Self {
        match err {
            BatchQueueError::Load(LoadError::InvalidAmount { amount }) => {
                ApiError::LoadInvalidAmount { amount }
            }
            BatchQueueError::Load(LoadError::BomItemNotFound { bom_item_code }) => {
                ApiError::LoadBomItemNotFound { bom_item_code }
            }
            BatchQueueError::Load(LoadError::DuplicateBatch {
                bom_item_code,
                batch_code,
            }) => ApiError::LoadDuplicateBatch {
                bom_item_code,
                batch_code,
            },
            BatchQueueError::Deduct(DeductError::InvalidAmount { amount }) => {
                ApiError::DeductInvalidAmount { amount }
            }
            BatchQueueError::Deduct(DeductError::Insufficient {
                bom_item_code,
                required,
                available,
            }) => ApiError::DeductInsufficient {
                bom_item_code,
                required,
                available,
            },
            BatchQueueError::Deduct(DeductError::DesignatedBatchMismatch {
                bom_item_code,
                requested,
                head,
            }) => ApiError::DeductDesignatedBatchMismatch {
                bom_item_code,
                requested,
                head,
            },
            BatchQueueError::Misc(msg) => ApiError::BatchMisc(msg),
            BatchQueueError::ConcurrencyConflict {
                bom_item_code,
                attempts,
            } => ApiError::ConcurrencyConflict {
                bom_item_code,
                attempts,
            },
            BatchQueueError::Repository(err) => err.into(),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
