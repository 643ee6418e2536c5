// ==========================================
// 物料批次队列 - 批次扣料（通用）
// ==========================================
// 流程（持有 BOM 物料锁）:
//   分页拉取候选 → 贪心分配 → 单事务提交
// 红线:
// - 翻完所有未耗尽批次仍不够、且重读合计确认不够才判定超额，超额时不提交任何变更
// - 重读合计足够说明翻页期间排序被改动，按冲突处理重新分配
// - 提交遇到 revision 冲突时整体重读重算，超过重试上限报并发冲突
// ==========================================

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::command::context::CommandContext;
use crate::command::error::{BatchQueueError, BatchQueueResult, DeductError};
use crate::command::BatchCommand;
use crate::domain::batch::DeductionDescriptor;
use crate::engine::allocator::AllocationPlan;
use crate::engine::candidate::CandidateSelector;
use crate::repository::error::RepositoryResult;

/// 扣料输入
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductInput {
    pub bom_item_code: String,
    pub required_amount: Decimal,
}

/// 扣料执行参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeductArg {
    pub bom_item_code: String,
    pub required_amount: Decimal,
}

/// 批次扣料命令
pub struct DeductCommand {
    ctx: CommandContext,
}

impl DeductCommand {
    pub fn new(ctx: CommandContext) -> Self {
        Self { ctx }
    }

    /// 分页拉取候选并分配，直至满足需求或候选耗尽
    async fn allocate(
        &self,
        selector: &CandidateSelector,
        arg: &DeductArg,
    ) -> RepositoryResult<AllocationPlan> {
        let mut plan = AllocationPlan::new(&arg.bom_item_code, arg.required_amount);
        let mut cursor = None;
        let mut pages = 0usize;

        loop {
            let page = selector.fetch_page(&arg.bom_item_code, cursor).await?;
            pages += 1;
            plan.consume_all(&page);

            if plan.is_satisfied() {
                break;
            }
            match selector.next_cursor(&page) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!(
            bom_item_code = %arg.bom_item_code,
            page_size = selector.page_size(),
            pages,
            allocated = %plan.allocated(),
            "候选翻页结束"
        );
        Ok(plan)
    }

    async fn execute_locked(&self, arg: DeductArg) -> BatchQueueResult<Vec<DeductionDescriptor>> {
        let _guard = self.ctx.locks.acquire(&arg.bom_item_code).await;
        let selector = self.ctx.selector();
        let max_attempts = self.ctx.max_attempts();

        for attempt in 1..=max_attempts {
            let plan = self.allocate(&selector, &arg).await?;

            if !plan.is_satisfied() {
                // 其他实例可能在翻页期间改了排序，让批次跳到游标之前
                let available = selector.available_total(&arg.bom_item_code).await?;
                if available >= plan.required() {
                    warn!(
                        bom_item_code = %arg.bom_item_code,
                        allocated = %plan.allocated(),
                        available = %available,
                        attempt,
                        max_attempts,
                        "翻页期间候选顺序变化，重新分配"
                    );
                    continue;
                }

                warn!(
                    bom_item_code = %arg.bom_item_code,
                    required = %plan.required(),
                    available = %available,
                    "扣料超额，未提交任何变更"
                );
                return Err(DeductError::Insufficient {
                    bom_item_code: arg.bom_item_code,
                    required: plan.required(),
                    available,
                }
                .into());
            }

            match self.ctx.repo.save_changes(plan.changes()).await {
                Ok(affected) => {
                    info!(
                        bom_item_code = %arg.bom_item_code,
                        required = %arg.required_amount,
                        batches = plan.descriptors().len(),
                        affected,
                        attempt,
                        "批次扣料完成"
                    );
                    return Ok(plan.into_descriptors());
                }
                Err(e) if e.is_conflict() => {
                    warn!(
                        bom_item_code = %arg.bom_item_code,
                        attempt,
                        max_attempts,
                        error = %e,
                        "扣料提交冲突，重新分配"
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
impl BatchCommand for DeductCommand {
    type Input = DeductInput;
    type CmdArg = DeductArg;
    type Output = Vec<DeductionDescriptor>;

    async fn map_input_to_cmd_arg(&self, input: DeductInput) -> BatchQueueResult<DeductArg> {
        if input.required_amount <= Decimal::ZERO {
            warn!(
                bom_item_code = %input.bom_item_code,
                amount = %input.required_amount,
                "扣除量非法"
            );
            return Err(DeductError::InvalidAmount {
                amount: input.required_amount,
            }
            .into());
        }

        Ok(DeductArg {
            bom_item_code: input.bom_item_code,
            required_amount: input.required_amount,
        })
    }

    /// 候选读取必须与提交处于同一临界区，因此放在执行阶段
    async fn execute(&self, arg: DeductArg) -> BatchQueueResult<Vec<DeductionDescriptor>> {
        let span = info_span!(
            "batch_deduct",
            operation_id = %Uuid::new_v4(),
            bom_item_code = %arg.bom_item_code
        );
        self.execute_locked(arg).instrument(span).await
    }
}
