// ==========================================
// 物料批次队列 - 候选批次选择器
// ==========================================
// 职责: 按 priority 升序、id 升序分页拉取未耗尽批次
// 说明: 单页大小有限，调用方可通过游标继续翻页直至候选耗尽，
//       因此不会因为页大小而误判"库存不足"
// ==========================================

use crate::domain::batch::{BatchMaterialQueueItem, CandidateCursor};
use crate::repository::batch_queue_repo::BatchMaterialQueueRepository;
use crate::repository::error::RepositoryResult;
use rust_decimal::Decimal;
use std::sync::Arc;

// ==========================================
// CandidateSelector - 候选批次选择器
// ==========================================
pub struct CandidateSelector {
    repo: Arc<dyn BatchMaterialQueueRepository>,
    page_size: usize,
}

impl CandidateSelector {
    /// 构造函数
    ///
    /// # 参数
    /// - repo: 物料批仓储
    /// - page_size: 单页候选数（0 视为 1）
    pub fn new(repo: Arc<dyn BatchMaterialQueueRepository>, page_size: usize) -> Self {
        Self {
            repo,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// 取队首候选（指定批次扣料使用）
    pub async fn head(&self, bom_item_code: &str) -> RepositoryResult<Option<BatchMaterialQueueItem>> {
        let mut top = self.repo.find_top_candidates(bom_item_code, 1).await?;
        Ok(if top.is_empty() { None } else { Some(top.remove(0)) })
    }

    /// 拉取一页候选
    ///
    /// # 参数
    /// - after: None 表示第一页；Some 表示从上一页末尾继续
    pub async fn fetch_page(
        &self,
        bom_item_code: &str,
        after: Option<CandidateCursor>,
    ) -> RepositoryResult<Vec<BatchMaterialQueueItem>> {
        match after {
            None => self.repo.find_top_candidates(bom_item_code, self.page_size).await,
            Some(cursor) => {
                self.repo
                    .find_candidates_after(bom_item_code, cursor, self.page_size)
                    .await
            }
        }
    }

    /// 重新读取全部未耗尽批次的剩余量合计
    ///
    /// 翻页期间排序可能被改动，判定超额前用它复核；合计溢出时取上限
    pub async fn available_total(&self, bom_item_code: &str) -> RepositoryResult<Decimal> {
        let items = self.repo.list_by_bom_item_code(bom_item_code, false).await?;
        Ok(items
            .iter()
            .fold(Decimal::ZERO, |acc, i| acc.saturating_add(i.remaining_amount)))
    }

    /// 游标是否还可能有下一页
    ///
    /// 返回页不足一页即视为已到末尾
    pub fn next_cursor(&self, page: &[BatchMaterialQueueItem]) -> Option<CandidateCursor> {
        if page.len() < self.page_size {
            return None;
        }
        page.last().map(BatchMaterialQueueItem::ordering_key)
    }
}
