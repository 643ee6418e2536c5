// ==========================================
// 物料批次队列 - 领域模型层
// ==========================================
// 职责: 定义领域实体与值对象
// 红线: 不含数据访问逻辑,不含分配逻辑
// ==========================================

pub mod batch;
pub mod bom;

// 重导出核心类型
pub use batch::{
    BatchChange, BatchMaterialQueueItem, CandidateCursor, DeductionDescriptor,
    NewBatchMaterialQueueItem, QueueItemId,
};
pub use bom::BomItem;
