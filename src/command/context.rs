// ==========================================
// 物料批次队列 - 命令执行上下文
// ==========================================
// 职责: 聚合命令所需的仓储、锁登记表与配置，简化依赖注入
// ==========================================

use std::sync::Arc;

use crate::config::BatchQueueConfig;
use crate::engine::candidate::CandidateSelector;
use crate::engine::key_lock::BomItemLockRegistry;
use crate::repository::{BatchMaterialQueueRepository, BomItemLookup};

/// 物料批命令上下文
///
/// 所有命令共享同一个锁登记表，才能保证同一 BOM 物料的扣料串行
#[derive(Clone)]
pub struct CommandContext {
    /// 物料批仓储
    pub repo: Arc<dyn BatchMaterialQueueRepository>,
    /// BOM 物料查询
    pub bom_lookup: Arc<dyn BomItemLookup>,
    /// BOM 物料级互斥锁
    pub locks: Arc<BomItemLockRegistry>,
    /// 队列配置
    pub config: BatchQueueConfig,
}

impl CommandContext {
    /// 创建新的命令上下文
    pub fn new(
        repo: Arc<dyn BatchMaterialQueueRepository>,
        bom_lookup: Arc<dyn BomItemLookup>,
        locks: Arc<BomItemLockRegistry>,
        config: BatchQueueConfig,
    ) -> Self {
        Self {
            repo,
            bom_lookup,
            locks,
            config,
        }
    }

    /// 候选选择器（按配置的分页大小）
    pub fn selector(&self) -> CandidateSelector {
        CandidateSelector::new(self.repo.clone(), self.config.candidate_page_size)
    }

    /// 冲突时最多尝试的次数（首次 + 重试）
    pub fn max_attempts(&self) -> u32 {
        self.config.max_conflict_retries.saturating_add(1)
    }
}
