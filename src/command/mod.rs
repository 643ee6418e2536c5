// ==========================================
// 物料批次队列 - 命令层
// ==========================================
// 模式: 两阶段命令
//   1. map_input_to_cmd_arg: 校验输入、只读查询补全参数
//   2. execute: 执行状态变更
// 约束: 业务条件一律返回 Err(BatchQueueError)，不 panic
// ==========================================

pub mod adjust_priority;
pub mod context;
pub mod deduct;
pub mod deduct_specific;
pub mod error;
pub mod load;

pub use adjust_priority::{AdjustPriorityArg, AdjustPriorityCommand, AdjustPriorityInput};
pub use context::CommandContext;
pub use deduct::{DeductArg, DeductCommand, DeductInput};
pub use deduct_specific::{DeductSpecificArg, DeductSpecificCommand, DeductSpecificInput};
pub use error::{BatchQueueError, BatchQueueResult, DeductError, LoadError};
pub use load::{LoadArg, LoadCommand, LoadInput};

use async_trait::async_trait;

// ==========================================
// BatchCommand Trait
// ==========================================
#[async_trait]
pub trait BatchCommand: Send + Sync {
    /// 调用方输入
    type Input: Send + 'static;
    /// 校验补全后的执行参数
    type CmdArg: Send + 'static;
    /// 执行结果
    type Output: Send + 'static;

    /// 阶段一: 输入映射（只读）
    async fn map_input_to_cmd_arg(&self, input: Self::Input) -> BatchQueueResult<Self::CmdArg>;

    /// 阶段二: 执行
    async fn execute(&self, arg: Self::CmdArg) -> BatchQueueResult<Self::Output>;

    /// 依次执行两个阶段
    async fn run(&self, input: Self::Input) -> BatchQueueResult<Self::Output> {
        let arg = self.map_input_to_cmd_arg(input).await?;
        self.execute(arg).await
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::CommandContext;
    use crate::config::BatchQueueConfig;
    use crate::db::init_schema;
    use crate::domain::batch::{BatchMaterialQueueItem, NewBatchMaterialQueueItem};
    use crate::domain::bom::BomItem;
    use crate::engine::key_lock::BomItemLockRegistry;
    use crate::repository::{
        BatchMaterialQueueRepository, SqliteBatchQueueRepository, SqliteBomItemRepository,
    };
    use rusqlite::Connection;
    use rust_decimal::Decimal;
    use std::sync::{Arc, Mutex};

    /// 内存库测试环境
    pub struct TestEnv {
        pub ctx: CommandContext,
        pub repo: Arc<SqliteBatchQueueRepository>,
    }

    impl TestEnv {
        pub fn new() -> Self {
            Self::with_config(BatchQueueConfig::default())
        }

        pub fn with_config(config: BatchQueueConfig) -> Self {
            let conn = Connection::open_in_memory().unwrap();
            init_schema(&conn).unwrap();
            let conn = Arc::new(Mutex::new(conn));

            let repo = Arc::new(SqliteBatchQueueRepository::from_connection(conn.clone()));
            let bom = Arc::new(SqliteBomItemRepository::from_connection(conn));
            for code in ["BOM001", "BOM002"] {
                bom.upsert(&BomItem {
                    code: code.to_string(),
                    name: format!("物料{}", code),
                })
                .unwrap();
            }

            let ctx = CommandContext::new(
                repo.clone(),
                bom,
                Arc::new(BomItemLockRegistry::new()),
                config,
            );
            Self { ctx, repo }
        }

        pub async fn seed(
            &self,
            bom_item_code: &str,
            batch_code: &str,
            amount: Decimal,
            priority: i32,
        ) -> BatchMaterialQueueItem {
            self.repo
                .add(NewBatchMaterialQueueItem {
                    bom_item_code: bom_item_code.to_string(),
                    batch_code: batch_code.to_string(),
                    amount,
                    priority,
                })
                .await
                .unwrap()
        }

        pub async fn remaining(&self, item: &BatchMaterialQueueItem) -> Decimal {
            self.repo
                .find_by_id(item.id)
                .await
                .unwrap()
                .unwrap()
                .remaining_amount
        }
    }
}
