// ==========================================
// 物料批次队列 - 批次上料
// ==========================================
// 校验顺序:
//   1. 数量 > 0                       → 批次上料_数量非法
//   2. BOM 物料存在                   → 批次上料_BomItem不存在
//   3. (bom_item_code, batch_code) 未占用 → 批次上料_批次重复
// 写入: 单行插入；并发重复由唯一约束兜底，同样报批次重复
// ==========================================

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::command::context::CommandContext;
use crate::command::error::{BatchQueueResult, LoadError};
use crate::command::BatchCommand;
use crate::domain::batch::{BatchMaterialQueueItem, NewBatchMaterialQueueItem};
use crate::repository::error::RepositoryError;

/// 上料输入
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadInput {
    pub bom_item_code: String,
    pub batch_code: String,
    pub amount: Decimal,
    pub priority: i32,
}

/// 上料执行参数（已通过全部校验）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadArg {
    pub item: NewBatchMaterialQueueItem,
}

/// 批次上料命令
pub struct LoadCommand {
    ctx: CommandContext,
}

impl LoadCommand {
    pub fn new(ctx: CommandContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl BatchCommand for LoadCommand {
    type Input = LoadInput;
    type CmdArg = LoadArg;
    type Output = BatchMaterialQueueItem;

    async fn map_input_to_cmd_arg(&self, input: LoadInput) -> BatchQueueResult<LoadArg> {
        if input.amount <= Decimal::ZERO {
            warn!(bom_item_code = %input.bom_item_code, amount = %input.amount, "上料数量非法");
            return Err(LoadError::InvalidAmount {
                amount: input.amount,
            }
            .into());
        }

        if self
            .ctx
            .bom_lookup
            .find_bom_item_by_code(&input.bom_item_code)
            .await?
            .is_none()
        {
            warn!(bom_item_code = %input.bom_item_code, "上料 BOM 物料不存在");
            return Err(LoadError::BomItemNotFound {
                bom_item_code: input.bom_item_code,
            }
            .into());
        }

        if self
            .ctx
            .repo
            .check_batch_exists(&input.bom_item_code, &input.batch_code)
            .await?
            .is_some()
        {
            warn!(
                bom_item_code = %input.bom_item_code,
                batch_code = %input.batch_code,
                "上料批次重复"
            );
            return Err(LoadError::DuplicateBatch {
                bom_item_code: input.bom_item_code,
                batch_code: input.batch_code,
            }
            .into());
        }

        Ok(LoadArg {
            item: NewBatchMaterialQueueItem {
                bom_item_code: input.bom_item_code,
                batch_code: input.batch_code,
                amount: input.amount,
                priority: input.priority,
            },
        })
    }

    async fn execute(&self, arg: LoadArg) -> BatchQueueResult<BatchMaterialQueueItem> {
        let bom_item_code = arg.item.bom_item_code.clone();
        let batch_code = arg.item.batch_code.clone();

        match self.ctx.repo.add(arg.item).await {
            Ok(item) => {
                info!(
                    queue_item_id = item.id,
                    bom_item_code = %item.bom_item_code,
                    batch_code = %item.batch_code,
                    amount = %item.remaining_amount,
                    priority = item.priority,
                    "批次上料完成"
                );
                Ok(item)
            }
            Err(RepositoryError::UniqueConstraintViolation(msg)) => {
                warn!(
                    bom_item_code = %bom_item_code,
                    batch_code = %batch_code,
                    detail = %msg,
                    "上料批次重复（并发插入）"
                );
                Err(LoadError::DuplicateBatch {
                    bom_item_code,
                    batch_code,
                }
                .into())
            }
            Err(e) => Err(e.into()),
        }
    }
}
