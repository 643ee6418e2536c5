// ==========================================
// 物料批次队列 - 物料批仓储 Trait
// ==========================================
// 职责: 定义物料批数据访问接口（不包含分配逻辑）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::batch::{
    BatchChange, BatchMaterialQueueItem, CandidateCursor, NewBatchMaterialQueueItem, QueueItemId,
};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// BatchMaterialQueueRepository Trait
// ==========================================
// 用途: 物料批上料/扣料/优先级调整的数据访问
// 实现者: SqliteBatchQueueRepository（使用 rusqlite）
#[async_trait]
pub trait BatchMaterialQueueRepository: Send + Sync {
    // ===== 候选查询 =====

    /// 查询前 N 个候选批次
    ///
    /// # 参数
    /// - bom_item_code: BOM 物料编码
    /// - count: 返回数量上限
    ///
    /// # 返回
    /// - 仅包含剩余量 > 0 的批次，按 priority 升序、id 升序
    async fn find_top_candidates(
        &self,
        bom_item_code: &str,
        count: usize,
    ) -> RepositoryResult<Vec<BatchMaterialQueueItem>>;

    /// 从游标之后继续查询候选批次（keyset 分页）
    ///
    /// # 参数
    /// - cursor: 上一页最后一个候选的 (priority, id)
    async fn find_candidates_after(
        &self,
        bom_item_code: &str,
        cursor: CandidateCursor,
        count: usize,
    ) -> RepositoryResult<Vec<BatchMaterialQueueItem>>;

    // ===== 点查询 =====

    /// 按 (bom_item_code, batch_code) 查询批次（含已耗尽批次）
    async fn check_batch_exists(
        &self,
        bom_item_code: &str,
        batch_code: &str,
    ) -> RepositoryResult<Option<BatchMaterialQueueItem>>;

    /// 按 ID 查询批次
    async fn find_by_id(&self, id: QueueItemId) -> RepositoryResult<Option<BatchMaterialQueueItem>>;

    /// 查询某 BOM 物料下的全部批次（按候选顺序）
    ///
    /// # 参数
    /// - include_depleted: 是否包含已耗尽批次
    async fn list_by_bom_item_code(
        &self,
        bom_item_code: &str,
        include_depleted: bool,
    ) -> RepositoryResult<Vec<BatchMaterialQueueItem>>;

    // ===== 写入 =====

    /// 插入新批次并分配 ID
    ///
    /// # 返回
    /// - Err(UniqueConstraintViolation): (bom_item_code, batch_code) 已存在
    async fn add(&self, item: NewBatchMaterialQueueItem) -> RepositoryResult<BatchMaterialQueueItem>;

    /// 在单个事务内持久化一组变更
    ///
    /// # 返回
    /// - Ok(usize): 受影响行数
    /// - Err(OptimisticLockFailure): 任一批次 revision 不匹配（整个事务回滚）
    /// - Err(NotFound): 任一批次不存在（整个事务回滚）
    async fn save_changes(&self, changes: &[BatchChange]) -> RepositoryResult<usize>;
}
