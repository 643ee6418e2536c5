// ==========================================
// 物料批次队列 - 物料批 API
// ==========================================
// 职责: 对外暴露上料、扣料、指定批次扣料、调整优先级及查询
// 约束: 命令层错误统一转换为 ApiError，对外只暴露稳定错误码
// ==========================================

use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::error::{ApiError, ApiResult};
use crate::command::{
    AdjustPriorityCommand, AdjustPriorityInput, BatchCommand, CommandContext, DeductCommand,
    DeductInput, DeductSpecificCommand, DeductSpecificInput, LoadCommand, LoadInput,
};
use crate::config::{BatchQueueConfig, ConfigManager};
use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::batch::{BatchMaterialQueueItem, DeductionDescriptor, QueueItemId};
use crate::engine::key_lock::BomItemLockRegistry;
use crate::repository::{
    BatchMaterialQueueRepository, SqliteBatchQueueRepository, SqliteBomItemRepository,
};

// ==========================================
// BomItemStock - BOM 物料库存汇总
// ==========================================
/// 某 BOM 物料当前可用库存
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomItemStock {
    pub bom_item_code: String,
    /// 未耗尽批次数
    pub active_batches: usize,
    /// 未耗尽批次剩余量合计
    pub available_amount: Decimal,
}

// ==========================================
// BatchQueueApi - 物料批 API
// ==========================================
pub struct BatchQueueApi {
    ctx: CommandContext,
    config_manager: Arc<ConfigManager>,
}

impl BatchQueueApi {
    /// 打开数据库并装配全部依赖
    ///
    /// # 说明
    /// 1. 打开连接并初始化表结构（幂等）
    /// 2. 仓储与配置管理器共享同一连接
    /// 3. 读取 config_kv 中的队列配置
    pub fn open(db_path: &str) -> ApiResult<Self> {
        info!(db_path = db_path, "初始化物料批API");

        let conn = open_sqlite_connection(db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(format!("无法打开数据库: {}", e)))?;
        init_schema(&conn)
            .map_err(|e| ApiError::DatabaseError(format!("表结构初始化失败: {}", e)))?;
        let conn = Arc::new(Mutex::new(conn));

        let repo = Arc::new(SqliteBatchQueueRepository::from_connection(conn.clone()));
        let bom_repo = Arc::new(SqliteBomItemRepository::from_connection(conn.clone()));
        let config_manager = Arc::new(ConfigManager::from_connection(conn));
        let config = config_manager.load_batch_queue_config()?;

        debug!(
            candidate_page_size = config.candidate_page_size,
            max_conflict_retries = config.max_conflict_retries,
            specific_deduct_unit = %config.specific_deduct_unit,
            "物料批队列配置已加载"
        );

        let ctx = CommandContext::new(
            repo,
            bom_repo,
            Arc::new(BomItemLockRegistry::new()),
            config,
        );

        Ok(Self {
            ctx,
            config_manager,
        })
    }

    /// 由已有上下文创建（测试或自定义仓储实现时使用）
    pub fn from_context(ctx: CommandContext, config_manager: Arc<ConfigManager>) -> Self {
        Self {
            ctx,
            config_manager,
        }
    }

    /// 当前生效的队列配置
    pub fn config(&self) -> &BatchQueueConfig {
        &self.ctx.config
    }

    /// 配置管理器
    pub fn config_manager(&self) -> Arc<ConfigManager> {
        self.config_manager.clone()
    }

    // ==========================================
    // 命令接口
    // ==========================================

    /// 批次上料
    pub async fn load_batch(&self, input: LoadInput) -> ApiResult<BatchMaterialQueueItem> {
        Ok(LoadCommand::new(self.ctx.clone()).run(input).await?)
    }

    /// 批次扣料（按优先级跨批次分配）
    ///
    /// # 返回
    /// - Ok(Vec<DeductionDescriptor>): 按消耗顺序排列的扣料描述
    /// - Err(ApiError::DeductInsufficient): 可用量不足，未做任何变更
    pub async fn deduct(
        &self,
        bom_item_code: &str,
        required_amount: Decimal,
    ) -> ApiResult<Vec<DeductionDescriptor>> {
        let input = DeductInput {
            bom_item_code: bom_item_code.to_string(),
            required_amount,
        };
        Ok(DeductCommand::new(self.ctx.clone()).run(input).await?)
    }

    /// 指定批次单一扣料
    pub async fn deduct_specific(
        &self,
        bom_item_code: &str,
        batch_code: &str,
    ) -> ApiResult<DeductionDescriptor> {
        let input = DeductSpecificInput {
            bom_item_code: bom_item_code.to_string(),
            batch_code: batch_code.to_string(),
        };
        Ok(DeductSpecificCommand::new(self.ctx.clone()).run(input).await?)
    }

    /// 调整物料批优先级
    pub async fn adjust_priority(
        &self,
        queue_item_id: QueueItemId,
        new_priority: i32,
    ) -> ApiResult<BatchMaterialQueueItem> {
        let input = AdjustPriorityInput {
            queue_item_id,
            new_priority,
        };
        Ok(AdjustPriorityCommand::new(self.ctx.clone()).run(input).await?)
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 按 id 查询物料批
    pub async fn get_batch(&self, queue_item_id: QueueItemId) -> ApiResult<BatchMaterialQueueItem> {
        self.ctx
            .repo
            .find_by_id(queue_item_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("物料批(id={})不存在", queue_item_id)))
    }

    /// 按队列顺序列出某 BOM 物料的物料批
    pub async fn list_batches(
        &self,
        bom_item_code: &str,
        include_depleted: bool,
    ) -> ApiResult<Vec<BatchMaterialQueueItem>> {
        if bom_item_code.trim().is_empty() {
            return Err(ApiError::InvalidInput("BOM物料编码不能为空".to_string()));
        }
        Ok(self
            .ctx
            .repo
            .list_by_bom_item_code(bom_item_code, include_depleted)
            .await?)
    }

    /// 某 BOM 物料的可用库存汇总
    pub async fn available_amount(&self, bom_item_code: &str) -> ApiResult<BomItemStock> {
        let items = self.list_batches(bom_item_code, false).await?;
        let available_amount = items
            .iter()
            .try_fold(Decimal::ZERO, |acc, i| acc.checked_add(i.remaining_amount))
            .ok_or_else(|| {
                ApiError::InternalError(format!(
                    "可用量合计超出数值范围: bom_item_code={}",
                    bom_item_code
                ))
            })?;

        Ok(BomItemStock {
            bom_item_code: bom_item_code.to_string(),
            active_batches: items.len(),
            available_amount,
        })
    }
}
