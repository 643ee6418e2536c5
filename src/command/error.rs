// ==========================================
// 物料批次队列 - 命令层错误类型
// ==========================================
// 分类: 上料 / 扣料 / Misc 三个封闭族，业务条件一律以 Err 返回
// ==========================================

use crate::repository::error::RepositoryError;
use rust_decimal::Decimal;
use thiserror::Error;

// ==========================================
// 上料错误（批次上料）
// ==========================================
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// Err_批次上料_数量非法
    #[error("批次上料_数量非法: amount={amount}")]
    InvalidAmount { amount: Decimal },

    /// Err_批次上料_BomItem不存在
    #[error("批次上料_BomItem不存在: bom_item_code={bom_item_code}")]
    BomItemNotFound { bom_item_code: String },

    /// Err_批次上料_批次重复
    #[error("批次上料_批次重复: bom_item_code={bom_item_code}, batch_code={batch_code}")]
    DuplicateBatch {
        bom_item_code: String,
        batch_code: String,
    },
}

// ==========================================
// 扣料错误（批次扣料）
// ==========================================
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeductError {
    /// Err_批次扣料_扣除量非法
    #[error("批次扣料_扣除量非法: amount={amount}")]
    InvalidAmount { amount: Decimal },

    /// Err_批次扣料_超额
    #[error("批次扣料_超额: bom_item_code={bom_item_code}, required={required}, available={available}")]
    Insufficient {
        bom_item_code: String,
        required: Decimal,
        available: Decimal,
    },

    /// Err_批次扣料_指定批次错误
    #[error("批次扣料_指定批次错误: bom_item_code={bom_item_code}, requested={requested}, head={head}")]
    DesignatedBatchMismatch {
        bom_item_code: String,
        requested: String,
        head: String,
    },
}

// ==========================================
// BatchQueueError - 物料批命令错误
// ==========================================
#[derive(Error, Debug)]
pub enum BatchQueueError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Deduct(#[from] DeductError),

    /// Err_物料批_Misc
    #[error("物料批_Misc: {0}")]
    Misc(String),

    /// 乐观锁冲突重试耗尽（可稍后重试）
    #[error("物料批并发冲突: bom_item_code={bom_item_code}, attempts={attempts}")]
    ConcurrencyConflict { bom_item_code: String, attempts: u32 },

    /// 持久化层故障（不可恢复，原样上抛）
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl BatchQueueError {
    /// 是否为业务条件（而非基础设施故障）
    pub fn is_business(&self) -> bool {
        matches!(
            self,
            BatchQueueError::Load(_) | BatchQueueError::Deduct(_) | BatchQueueError::Misc(_)
        )
    }
}

/// 命令层 Result 类型别名
pub type BatchQueueResult<T> = Result<T, BatchQueueError>;
