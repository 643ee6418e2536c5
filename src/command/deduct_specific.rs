// ==========================================
// 物料批次队列 - 指定批次单一扣料
// ==========================================
// 用于逐件追溯: 每次扣 1 个单位（扣除量可配置）
// 规则: 指定批次必须正是优先级队首，调用方不能插队
//   - 无候选                → 批次扣料_超额
//   - 队首批次号 ≠ 指定批次 → 批次扣料_指定批次错误
//   - 队首剩余量 < 单位量   → 批次扣料_超额
// ==========================================

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::command::context::CommandContext;
use crate::command::error::{BatchQueueError, BatchQueueResult, DeductError};
use crate::command::BatchCommand;
use crate::domain::batch::DeductionDescriptor;
use crate::engine::allocator::AllocationPlan;

/// 指定批次扣料输入
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductSpecificInput {
    pub bom_item_code: String,
    pub batch_code: String,
}

/// 指定批次扣料执行参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeductSpecificArg {
    pub bom_item_code: String,
    pub batch_code: String,
    pub unit: Decimal,
}

/// 指定批次单一扣料命令
pub struct DeductSpecificCommand {
    ctx: CommandContext,
}

impl DeductSpecificCommand {
    pub fn new(ctx: CommandContext) -> Self {
        Self { ctx }
    }

    async fn execute_locked(
        &self,
        arg: DeductSpecificArg,
    ) -> BatchQueueResult<DeductionDescriptor> {
        let _guard = self.ctx.locks.acquire(&arg.bom_item_code).await;
        let selector = self.ctx.selector();
        let max_attempts = self.ctx.max_attempts();

        for attempt in 1..=max_attempts {
            let head = match selector.head(&arg.bom_item_code).await? {
                Some(head) => head,
                None => {
                    warn!(bom_item_code = %arg.bom_item_code, "指定批次扣料: 无可用批次");
                    return Err(DeductError::Insufficient {
                        bom_item_code: arg.bom_item_code,
                        required: arg.unit,
                        available: Decimal::ZERO,
                    }
                    .into());
                }
            };

            if head.batch_code != arg.batch_code {
                warn!(
                    bom_item_code = %arg.bom_item_code,
                    requested = %arg.batch_code,
                    head = %head.batch_code,
                    "指定批次不是队首批次"
                );
                return Err(DeductError::DesignatedBatchMismatch {
                    bom_item_code: arg.bom_item_code,
                    requested: arg.batch_code,
                    head: head.batch_code,
                }
                .into());
            }

            if head.remaining_amount < arg.unit {
                warn!(
                    bom_item_code = %arg.bom_item_code,
                    batch_code = %head.batch_code,
                    remaining = %head.remaining_amount,
                    unit = %arg.unit,
                    "队首批次剩余量不足一个单位"
                );
                return Err(DeductError::Insufficient {
                    bom_item_code: arg.bom_item_code,
                    required: arg.unit,
                    available: head.remaining_amount,
                }
                .into());
            }

            let mut plan = AllocationPlan::new(&arg.bom_item_code, arg.unit);
            plan.consume(&head);

            match self.ctx.repo.save_changes(plan.changes()).await {
                Ok(_) => {
                    info!(
                        queue_item_id = head.id,
                        bom_item_code = %arg.bom_item_code,
                        batch_code = %arg.batch_code,
                        unit = %arg.unit,
                        attempt,
                        "指定批次扣料完成"
                    );
                    let mut descriptors = plan.into_descriptors();
                    return descriptors.pop().ok_or_else(|| {
                        BatchQueueError::Misc("指定批次扣料未生成扣料描述".to_string())
                    });
                }
                Err(e) if e.is_conflict() => {
                    warn!(
                        bom_item_code = %arg.bom_item_code,
                        attempt,
                        max_attempts,
                        error = %e,
                        "指定批次扣料提交冲突，重新读取队首"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(BatchQueueError::ConcurrencyConflict {
            bom_item_code: arg.bom_item_code,
            attempts: max_attempts,
        })
    }
}

#[async_trait]
impl BatchCommand for DeductSpecificCommand {
    type Input = DeductSpecificInput;
    type CmdArg = DeductSpecificArg;
    type Output = DeductionDescriptor;

    async fn map_input_to_cmd_arg(
        &self,
        input: DeductSpecificInput,
    ) -> BatchQueueResult<DeductSpecificArg> {
        Ok(DeductSpecificArg {
            bom_item_code: input.bom_item_code,
            batch_code: input.batch_code,
            unit: self.ctx.config.specific_deduct_unit,
        })
    }

    async fn execute(&self, arg: DeductSpecificArg) -> BatchQueueResult<DeductionDescriptor> {
        let span = info_span!(
            "batch_deduct_specific",
            operation_id = %Uuid::new_v4(),
            bom_item_code = %arg.bom_item_code
        );
        self.execute_locked(arg).instrument(span).await
    }
}
