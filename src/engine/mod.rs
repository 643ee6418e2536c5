// ==========================================
// 物料批次队列 - 引擎层
// ==========================================
// 职责: 候选选择、扣料分配、BOM 物料级串行化
// 红线: 引擎不直接写库，变更统一交给仓储事务提交
// ==========================================

pub mod allocator;
pub mod candidate;
pub mod key_lock;

pub use allocator::AllocationPlan;
pub use candidate::CandidateSelector;
pub use key_lock::{BomItemGuard, BomItemLockRegistry};
