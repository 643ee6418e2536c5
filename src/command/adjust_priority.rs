// ==========================================
// 物料批次队列 - 调整优先级
// ==========================================
// 只改 priority，不动剩余量；只影响之后的候选排序
// 写入时持有 BOM 物料锁，与扣料的"翻页 → 分配 → 提交"串行
// ==========================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::command::context::CommandContext;
use crate::command::error::{BatchQueueError, BatchQueueResult};
use crate::command::BatchCommand;
use crate::domain::batch::{BatchChange, BatchMaterialQueueItem, QueueItemId};
use crate::repository::error::RepositoryError;

/// 调整优先级输入
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustPriorityInput {
    pub queue_item_id: QueueItemId,
    pub new_priority: i32,
}

/// 调整优先级执行参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustPriorityArg {
    pub item: BatchMaterialQueueItem,
    pub new_priority: i32,
}

/// 调整优先级命令
pub struct AdjustPriorityCommand {
    ctx: CommandContext,
}

impl AdjustPriorityCommand {
    pub fn new(ctx: CommandContext) -> Self {
        Self { ctx }
    }

    fn not_found(id: QueueItemId) -> BatchQueueError {
        BatchQueueError::Misc(format!("物料批不存在: queue_item_id={}", id))
    }
}

#[async_trait]
impl BatchCommand for AdjustPriorityCommand {
    type Input = AdjustPriorityInput;
    type CmdArg = AdjustPriorityArg;
    type Output = BatchMaterialQueueItem;

    async fn map_input_to_cmd_arg(
        &self,
        input: AdjustPriorityInput,
    ) -> BatchQueueResult<AdjustPriorityArg> {
        match self.ctx.repo.find_by_id(input.queue_item_id).await? {
            Some(item) => Ok(AdjustPriorityArg {
                item,
                new_priority: input.new_priority,
            }),
            None => {
                warn!(queue_item_id = input.queue_item_id, "调整优先级: 物料批不存在");
                Err(Self::not_found(input.queue_item_id))
            }
        }
    }

    /// 与同一 BOM 物料的扣料互斥，扣料翻页期间排序不会被本进程改动
    async fn execute(&self, arg: AdjustPriorityArg) -> BatchQueueResult<BatchMaterialQueueItem> {
        let _guard = self.ctx.locks.acquire(&arg.item.bom_item_code).await;
        let id = arg.item.id;
        let old_priority = arg.item.priority;
        let mut current = arg.item;
        let max_attempts = self.ctx.max_attempts();

        for attempt in 1..=max_attempts {
            let change = BatchChange::Priority {
                id,
                expected_revision: current.revision,
                priority: arg.new_priority,
            };

            match self.ctx.repo.save_changes(std::slice::from_ref(&change)).await {
                Ok(_) => {
                    let updated = self
                        .ctx
                        .repo
                        .find_by_id(id)
                        .await?
                        .ok_or_else(|| Self::not_found(id))?;
                    info!(
                        queue_item_id = id,
                        bom_item_code = %updated.bom_item_code,
                        batch_code = %updated.batch_code,
                        old_priority,
                        new_priority = arg.new_priority,
                        "物料批优先级已调整"
                    );
                    return Ok(updated);
                }
                Err(RepositoryError::NotFound { .. }) => return Err(Self::not_found(id)),
                Err(e) if e.is_conflict() => {
                    // 单行覆盖写：重读最新 revision 后再写一次即可
                    warn!(queue_item_id = id, attempt, error = %e, "调整优先级冲突，重读后重试");
                    current = self
                        .ctx
                        .repo
                        .find_by_id(id)
                        .await?
                        .ok_or_else(|| Self::not_found(id))?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(BatchQueueError::ConcurrencyConflict {
            bom_item_code: current.bom_item_code,
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::deduct::{DeductCommand, DeductInput};
    use crate::command::test_support::TestEnv;
    use crate::repository::BatchMaterialQueueRepository;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_adjust_changes_future_order_only() {
        let env = TestEnv::new();
        let a = env.seed("BOM001", "A", dec!(10), 1).await;
        let b = env.seed("BOM001", "B", dec!(10), 2).await;
        let cmd = AdjustPriorityCommand::new(env.ctx.clone());

        let updated = cmd
            .run(AdjustPriorityInput {
                queue_item_id: b.id,
                new_priority: 0,
            })
            .await
            .unwrap();
        assert_eq!(updated.priority, 0);
        assert_eq!(updated.remaining_amount, dec!(10));
        assert_eq!(env.remaining(&a).await, dec!(10));

        let head = env.repo.find_top_candidates("BOM001", 1).await.unwrap();
        assert_eq!(head[0].id, b.id);

        let deduct = DeductCommand::new(env.ctx.clone());
        let descriptors = deduct
            .run(DeductInput {
                bom_item_code: "BOM001".to_string(),
                required_amount: dec!(4),
            })
            .await
            .unwrap();
        assert_eq!(descriptors[0].batch_code, "B");
    }

    #[tokio::test]
    async fn test_missing_item_is_misc() {
        let env = TestEnv::new();
        let cmd = AdjustPriorityCommand::new(env.ctx.clone());

        let err = cmd
            .run(AdjustPriorityInput {
                queue_item_id: 42,
                new_priority: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BatchQueueError::Misc(_)));
    }

    #[tokio::test]
    async fn test_stale_revision_is_retried() {
        let env = TestEnv::new();
        let a = env.seed("BOM001", "A", dec!(10), 1).await;
        let cmd = AdjustPriorityCommand::new(env.ctx.clone());

        let arg = cmd
            .map_input_to_cmd_arg(AdjustPriorityInput {
                queue_item_id: a.id,
                new_priority: 9,
            })
            .await
            .unwrap();

        // 校验与执行之间有人扣了料
        env.repo
            .save_changes(&[BatchChange::RemainingAmount {
                id: a.id,
                expected_revision: 0,
                remaining_amount: dec!(7),
            }])
            .await
            .unwrap();

        let updated = cmd.execute(arg).await.unwrap();
        assert_eq!(updated.priority, 9);
        assert_eq!(updated.remaining_amount, dec!(7));
        assert_eq!(updated.revision, 2);
    }

    #[tokio::test]
    async fn test_waits_for_bom_item_lock() {
        let env = TestEnv::new();
        let id = env.seed("BOM001", "A", dec!(10), 1).await.id;

        // 扣料持锁期间，调整优先级不能落库
        let guard = env.ctx.locks.acquire("BOM001").await;
        let cmd = AdjustPriorityCommand::new(env.ctx.clone());
        let handle = tokio::spawn(async move {
            cmd.run(AdjustPriorityInput {
                queue_item_id: id,
                new_priority: 0,
            })
            .await
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        assert_eq!(env.repo.find_by_id(id).await.unwrap().unwrap().priority, 1);

        drop(guard);
        let updated = handle.await.unwrap().unwrap();
        assert_eq!(updated.priority, 0);
    }
}
