// ==========================================
// 物料批次队列 - 物料批领域模型
// ==========================================
// 职责: 物料批（批次）实体、扣料描述、候选游标
// 红线: 剩余量永不为负；(bom_item_code, batch_code) 唯一；耗尽批次不删除
// ==========================================

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 物料批 ID（由仓储在插入时分配）
pub type QueueItemId = i64;

// ==========================================
// BatchMaterialQueueItem - 物料批
// ==========================================
// 用途: 某 BOM 物料下的一个实物批次
// 排序: priority 升序，同优先级按 id 升序（先进先出）
// 对齐: batch_material_queue 表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMaterialQueueItem {
    // ===== 主键 =====
    pub id: QueueItemId,

    // ===== 业务键 =====
    pub bom_item_code: String, // BOM 物料编码
    pub batch_code: String,    // 批次号（同一 BOM 物料下唯一）

    // ===== 数量 =====
    pub initial_amount: Decimal,   // 上料数量
    pub remaining_amount: Decimal, // 剩余可扣数量（>= 0）

    // ===== 排序 =====
    pub priority: i32, // 优先级（越小越先扣）

    // ===== 并发控制 =====
    pub revision: i64, // 乐观锁版本号，每次持久化 +1

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BatchMaterialQueueItem {
    /// 是否已耗尽（耗尽批次不再参与候选，但保留记录用于追溯）
    pub fn is_depleted(&self) -> bool {
        self.remaining_amount <= Decimal::ZERO
    }

    /// 候选排序键
    pub fn ordering_key(&self) -> CandidateCursor {
        CandidateCursor {
            priority: self.priority,
            id: self.id,
        }
    }
}

// ==========================================
// NewBatchMaterialQueueItem - 待插入物料批
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBatchMaterialQueueItem {
    pub bom_item_code: String,
    pub batch_code: String,
    pub amount: Decimal,
    pub priority: i32,
}

// ==========================================
// DeductionDescriptor - 扣料描述
// ==========================================
// 一次扣料中单个批次的贡献记录，只作为成功扣料的输出，不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductionDescriptor {
    pub queue_item_id: QueueItemId,
    pub bom_item_code: String,
    /// 预留字段（本模块恒为 None）
    pub reserved: Option<String>,
    pub batch_code: String,
    pub deducted_amount: Decimal,
}

// ==========================================
// CandidateCursor - 候选分页游标
// ==========================================
// 按 (priority, id) 做 keyset 分页，保证翻页不漏不重
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CandidateCursor {
    pub priority: i32,
    pub id: QueueItemId,
}

// ==========================================
// BatchChange - 待持久化的物料批变更
// ==========================================
// 每条变更携带读取时的 revision，持久化时做乐观锁校验
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchChange {
    /// 剩余量变更（扣料）
    RemainingAmount {
        id: QueueItemId,
        expected_revision: i64,
        remaining_amount: Decimal,
    },
    /// 优先级变更
    Priority {
        id: QueueItemId,
        expected_revision: i64,
        priority: i32,
    },
}

impl BatchChange {
    pub fn id(&self) -> QueueItemId {
        match self {
            BatchChange::RemainingAmount { id, .. } => *id,
            BatchChange::Priority { id, .. } => *id,
        }
    }

    pub fn expected_revision(&self) -> i64 {
        match self {
            BatchChange::RemainingAmount {
                expected_revision, ..
            } => *expected_revision,
            BatchChange::Priority {
                expected_revision, ..
            } => *expected_revision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(id: QueueItemId, priority: i32, remaining: Decimal) -> BatchMaterialQueueItem {
        BatchMaterialQueueItem {
            id,
            bom_item_code: "BOM001".to_string(),
            batch_code: format!("BATCH{:03}", id),
            initial_amount: remaining,
            remaining_amount: remaining,
            priority,
            revision: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_depleted() {
        assert!(item(1, 1, dec!(0)).is_depleted());
        assert!(item(1, 1, dec!(0.000)).is_depleted());
        assert!(!item(1, 1, dec!(0.001)).is_depleted());
    }

    #[test]
    fn test_ordering_key_priority_then_id() {
        let a = item(5, 1, dec!(10)).ordering_key();
        let b = item(2, 2, dec!(10)).ordering_key();
        let c = item(7, 1, dec!(10)).ordering_key();

        let mut keys = vec![b, c, a];
        keys.sort();
        assert_eq!(keys, vec![a, c, b]);
    }
}
