// ==========================================
// 物料批次队列 - BOM 物料级互斥锁
// ==========================================
// 职责: 同一 BOM 物料的"取候选 → 分配 → 提交"串行执行，
//       不同 BOM 物料之间完全并行
// 实现: 每个编码一把 tokio::sync::Mutex，登记表只保留弱引用，
//       无人持有时自动回收
// ==========================================

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// 持有期间独占某 BOM 物料
pub type BomItemGuard = OwnedMutexGuard<()>;

// ==========================================
// BomItemLockRegistry - 锁登记表
// ==========================================
#[derive(Default)]
pub struct BomItemLockRegistry {
    locks: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl BomItemLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, bom_item_code: &str) -> Arc<AsyncMutex<()>> {
        // 登记表自身只在同步区间内持有，毒化时沿用内部数据
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = locks.get(bom_item_code).and_then(Weak::upgrade) {
            return existing;
        }

        locks.retain(|_, weak| weak.strong_count() > 0);

        let lock = Arc::new(AsyncMutex::new(()));
        locks.insert(bom_item_code.to_string(), Arc::downgrade(&lock));
        lock
    }

    /// 获取某 BOM 物料的独占权
    pub async fn acquire(&self, bom_item_code: &str) -> BomItemGuard {
        self.lock_for(bom_item_code).lock_owned().await
    }

    /// 当前登记的活跃锁数量
    pub fn active_keys(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.values().filter(|w| w.strong_count() > 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let registry = Arc::new(BomItemLockRegistry::new());
        let in_section = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            let in_section = in_section.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = registry.acquire("BOM001").await;
                let now = in_section.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_section.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in futures::future::join_all(handles).await {
            handle.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let registry = BomItemLockRegistry::new();
        let _a = registry.acquire("BOM001").await;

        let b = tokio::time::timeout(Duration::from_millis(200), registry.acquire("BOM002")).await;
        assert!(b.is_ok());
        assert_eq!(registry.active_keys(), 2);
    }

    #[tokio::test]
    async fn test_released_locks_are_reclaimed() {
        let registry = BomItemLockRegistry::new();
        {
            let _a = registry.acquire("BOM001").await;
            assert_eq!(registry.active_keys(), 1);
        }
        assert_eq!(registry.active_keys(), 0);

        let _b = registry.acquire("BOM002").await;
        assert_eq!(registry.active_keys(), 1);
    }
}
