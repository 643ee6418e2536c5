// ==========================================
// 物料批次队列 - 扣料分配器
// ==========================================
// 职责: 按候选顺序贪心消耗剩余量，生成扣料描述与待持久化变更
// 输入: 按 (priority, id) 排好序的候选批次（可分多页喂入）
// 输出: AllocationPlan（先分配、后提交，分配阶段不触碰存储）
// 红线: 扣除量之和 == 需求量；任何批次剩余量不得为负
// ==========================================

use crate::domain::batch::{BatchChange, BatchMaterialQueueItem, DeductionDescriptor};
use rust_decimal::Decimal;
use tracing::debug;

// ==========================================
// AllocationPlan - 分配方案
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationPlan {
    bom_item_code: String,
    required: Decimal,
    need: Decimal,
    descriptors: Vec<DeductionDescriptor>,
    changes: Vec<BatchChange>,
}

impl AllocationPlan {
    /// 创建空分配方案
    pub fn new(bom_item_code: impl Into<String>, required: Decimal) -> Self {
        Self {
            bom_item_code: bom_item_code.into(),
            required,
            need: required,
            descriptors: Vec::new(),
            changes: Vec::new(),
        }
    }

    /// 需求是否已满足
    pub fn is_satisfied(&self) -> bool {
        self.need <= Decimal::ZERO
    }

    /// 尚未满足的数量
    pub fn outstanding(&self) -> Decimal {
        self.need.max(Decimal::ZERO)
    }

    /// 已分配数量
    pub fn allocated(&self) -> Decimal {
        self.required - self.outstanding()
    }

    pub fn required(&self) -> Decimal {
        self.required
    }

    pub fn descriptors(&self) -> &[DeductionDescriptor] {
        &self.descriptors
    }

    pub fn changes(&self) -> &[BatchChange] {
        &self.changes
    }

    /// 消耗单个候选批次
    ///
    /// take = min(剩余量, 未满足量)；take 为 0 时不产生描述
    ///
    /// # 返回
    /// - 本次扣除量
    pub fn consume(&mut self, candidate: &BatchMaterialQueueItem) -> Decimal {
        if self.is_satisfied() || candidate.bom_item_code != self.bom_item_code {
            return Decimal::ZERO;
        }

        let take = candidate.remaining_amount.min(self.need);
        if take <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let remaining = candidate.remaining_amount - take;
        self.need -= take;

        debug!(
            bom_item_code = %self.bom_item_code,
            queue_item_id = candidate.id,
            batch_code = %candidate.batch_code,
            take = %take,
            remaining = %remaining,
            need = %self.need,
            "分配候选批次"
        );

        self.descriptors.push(DeductionDescriptor {
            queue_item_id: candidate.id,
            bom_item_code: self.bom_item_code.clone(),
            reserved: None,
            batch_code: candidate.batch_code.clone(),
            deducted_amount: take,
        });
        self.changes.push(BatchChange::RemainingAmount {
            id: candidate.id,
            expected_revision: candidate.revision,
            remaining_amount: remaining,
        });

        take
    }

    /// 按顺序消耗一页候选，需求满足即停
    pub fn consume_all<'a, I>(&mut self, candidates: I)
    where
        I: IntoIterator<Item = &'a BatchMaterialQueueItem>,
    {
        for candidate in candidates {
            if self.is_satisfied() {
                break;
            }
            self.consume(candidate);
        }
    }

    /// 拆出扣料描述（提交成功后返回给调用方）
    pub fn into_descriptors(self) -> Vec<DeductionDescriptor> {
        self.descriptors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn batch(id: i64, batch_code: &str, remaining: Decimal, priority: i32) -> BatchMaterialQueueItem {
        BatchMaterialQueueItem {
            id,
            bom_item_code: "BOM001".to_string(),
            batch_code: batch_code.to_string(),
            initial_amount: remaining,
            remaining_amount: remaining,
            priority,
            revision: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_single_candidate_partial() {
        let mut plan = AllocationPlan::new("BOM001", dec!(50));
        plan.consume_all(&[batch(1, "BATCH001", dec!(100), 1)]);

        assert!(plan.is_satisfied());
        assert_eq!(plan.descriptors().len(), 1);
        assert_eq!(plan.descriptors()[0].deducted_amount, dec!(50));
        assert_eq!(
            plan.changes()[0],
            BatchChange::RemainingAmount {
                id: 1,
                expected_revision: 3,
                remaining_amount: dec!(50),
            }
        );
    }

    #[test]
    fn test_spans_candidates_in_order() {
        let candidates = vec![
            batch(1, "P1", dec!(30), 1),
            batch(2, "P2", dec!(100), 2),
        ];
        let mut plan = AllocationPlan::new("BOM001", dec!(70));
        plan.consume_all(&candidates);

        let amounts: Vec<_> = plan.descriptors().iter().map(|d| d.deducted_amount).collect();
        let codes: Vec<_> = plan.descriptors().iter().map(|d| d.batch_code.as_str()).collect();
        assert_eq!(amounts, vec![dec!(30), dec!(40)]);
        assert_eq!(codes, vec!["P1", "P2"]);
        assert_eq!(plan.allocated(), dec!(70));
    }

    #[test]
    fn test_stops_once_satisfied() {
        let candidates = vec![
            batch(1, "A", dec!(10), 1),
            batch(2, "B", dec!(10), 1),
            batch(3, "C", dec!(10), 1),
        ];
        let mut plan = AllocationPlan::new("BOM001", dec!(10));
        plan.consume_all(&candidates);

        assert_eq!(plan.descriptors().len(), 1);
        assert_eq!(plan.changes().len(), 1);
    }

    #[test]
    fn test_insufficient_keeps_outstanding() {
        let mut plan = AllocationPlan::new("BOM001", dec!(50));
        plan.consume_all(&[batch(1, "A", dec!(20), 1)]);

        assert!(!plan.is_satisfied());
        assert_eq!(plan.outstanding(), dec!(30));
        assert_eq!(plan.allocated(), dec!(20));
    }

    #[test]
    fn test_zero_remaining_candidate_skipped() {
        let candidates = vec![batch(1, "EMPTY", dec!(0), 1), batch(2, "B", dec!(5), 2)];
        let mut plan = AllocationPlan::new("BOM001", dec!(5));
        plan.consume_all(&candidates);

        assert_eq!(plan.descriptors().len(), 1);
        assert_eq!(plan.descriptors()[0].batch_code, "B");
    }

    #[test]
    fn test_other_bom_item_ignored() {
        let mut other = batch(1, "X", dec!(10), 1);
        other.bom_item_code = "BOM999".to_string();

        let mut plan = AllocationPlan::new("BOM001", dec!(5));
        assert_eq!(plan.consume(&other), Decimal::ZERO);
        assert!(plan.descriptors().is_empty());
    }

    #[test]
    fn test_conservation_and_non_negativity_over_many_splits() {
        let candidates: Vec<_> = (1..=20)
            .map(|i| batch(i, &format!("B{}", i), Decimal::new(i * 7 + 3, 1), (i % 3) as i32))
            .collect();
        let total: Decimal = candidates.iter().map(|c| c.remaining_amount).sum();

        for required in [dec!(0.1), dec!(1), dec!(12.5), total - dec!(0.1), total] {
            let mut plan = AllocationPlan::new("BOM001", required);
            plan.consume_all(&candidates);

            assert!(plan.is_satisfied());
            let sum: Decimal = plan.descriptors().iter().map(|d| d.deducted_amount).sum();
            assert_eq!(sum, required);
            for change in plan.changes() {
                if let BatchChange::RemainingAmount { remaining_amount, .. } = change {
                    assert!(*remaining_amount >= Decimal::ZERO);
                }
            }
        }
    }
}
