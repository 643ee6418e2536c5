// ==========================================
// 并发扣料测试
// ==========================================
// 职责: 验证同一 BOM 物料并发扣料不超扣、扣料总量守恒，
//       以及跨进程实例（各自独立锁登记表）时乐观锁兜底；
//       多页扣料期间调整优先级不会误报超额
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod concurrent_deduct_test {
    use futures::future::join_all;
    use material_batch_queue::api::{ApiError, BatchQueueApi};
    use material_batch_queue::config::config_keys;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    use crate::test_helpers::{create_test_api, load};

    // ==========================================
    // 测试辅助函数
    // ==========================================

    /// 并发发起 n 次扣料，返回 (成功扣料总量, 超额次数, 其他错误)
    async fn deduct_concurrently(
        apis: Vec<Arc<BatchQueueApi>>,
        bom_item_code: &'static str,
        tasks: usize,
        amount: Decimal,
    ) -> (Decimal, usize, Vec<ApiError>) {
        let handles = (0..tasks).map(|i| {
            let api = apis[i % apis.len()].clone();
            tokio::spawn(async move { api.deduct(bom_item_code, amount).await })
        });

        let mut deducted = Decimal::ZERO;
        let mut insufficient = 0;
        let mut others = Vec::new();
        for result in join_all(handles).await {
            match result.unwrap() {
                Ok(descriptors) => {
                    let total: Decimal = descriptors.iter().map(|d| d.deducted_amount).sum();
                    assert_eq!(total, amount);
                    deducted += total;
                }
                Err(ApiError::DeductInsufficient { .. }) => insufficient += 1,
                Err(e) => others.push(e),
            }
        }
        (deducted, insufficient, others)
    }

    async fn total_remaining(api: &BatchQueueApi, bom_item_code: &str) -> Decimal {
        let items = api.list_batches(bom_item_code, true).await.unwrap();
        for item in &items {
            assert!(item.remaining_amount >= Decimal::ZERO);
        }
        items.iter().map(|i| i.remaining_amount).sum()
    }

    // ==========================================
    // 测试用例
    // ==========================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_deducts_never_overdraw() {
        let (_temp, _path, api) = create_test_api();
        for i in 0..5 {
            load(&api, "BOM001", &format!("B{}", i), dec!(20), i).await;
        }
        let api = Arc::new(api);

        // 总量 100，40 个请求每个 3：最多 33 个成功
        let (deducted, insufficient, others) =
            deduct_concurrently(vec![api.clone()], "BOM001", 40, dec!(3)).await;

        assert!(others.is_empty(), "unexpected errors: {:?}", others);
        assert_eq!(deducted, dec!(99));
        assert_eq!(insufficient, 7);
        assert_eq!(total_remaining(&api, "BOM001").await, dec!(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_different_bom_items_are_independent() {
        let (_temp, _path, api) = create_test_api();
        load(&api, "BOM001", "A", dec!(50), 1).await;
        load(&api, "BOM002", "X", dec!(50), 1).await;
        let api = Arc::new(api);

        let first = deduct_concurrently(vec![api.clone()], "BOM001", 10, dec!(5));
        let second = deduct_concurrently(vec![api.clone()], "BOM002", 10, dec!(5));
        let ((d1, i1, e1), (d2, i2, e2)) = tokio::join!(first, second);

        assert!(e1.is_empty() && e2.is_empty());
        assert_eq!((d1, i1), (dec!(50), 0));
        assert_eq!((d2, i2), (dec!(50), 0));
        assert_eq!(total_remaining(&api, "BOM001").await, dec!(0));
        assert_eq!(total_remaining(&api, "BOM002").await, dec!(0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_separate_instances_fall_back_to_revision_check() {
        let (_temp, path, api) = create_test_api();
        // 放宽重试上限，让冲突尽量由重试消化
        api.config_manager()
            .set_global_config_value(config_keys::MAX_CONFLICT_RETRIES, "50")
            .unwrap();
        for i in 0..3 {
            load(&api, "BOM001", &format!("B{}", i), dec!(10), 1).await;
        }

        // 两个实例各有独立连接与锁登记表，只能依靠 revision 检测冲突
        let first = Arc::new(BatchQueueApi::open(&path).unwrap());
        let second = Arc::new(BatchQueueApi::open(&path).unwrap());

        let (deducted, insufficient, others) =
            deduct_concurrently(vec![first.clone(), second], "BOM001", 20, dec!(2)).await;

        // 重试耗尽时允许报并发冲突，但绝不能超扣
        for e in &others {
            assert_eq!(e.code(), "CONCURRENCY_CONFLICT");
        }
        assert!(deducted <= dec!(30));
        assert_eq!(total_remaining(&first, "BOM001").await, dec!(30) - deducted);
        assert_eq!(
            deducted / dec!(2) + Decimal::from(insufficient + others.len()),
            dec!(20)
        );
    }

    /// 多页扣料与调整优先级并发：无论谁先执行，总量足够时扣料都必须成功
    async fn deduct_while_reordering(deduct_api: Arc<BatchQueueApi>, adjust_api: Arc<BatchQueueApi>) {
        let mut last = None;
        for i in 0..4 {
            last = Some(load(&deduct_api, "BOM003", &format!("R{}", i), dec!(10), i + 1).await);
        }
        let last = last.unwrap();

        let deduct = {
            let api = deduct_api.clone();
            tokio::spawn(async move { api.deduct("BOM003", dec!(40)).await })
        };
        let adjust = {
            let api = adjust_api.clone();
            tokio::spawn(async move { api.adjust_priority(last.id, 0).await })
        };

        let descriptors = deduct.await.unwrap().unwrap();
        let total: Decimal = descriptors.iter().map(|d| d.deducted_amount).sum();
        assert_eq!(total, dec!(40));
        assert_eq!(adjust.await.unwrap().unwrap().priority, 0);
        assert_eq!(total_remaining(&deduct_api, "BOM003").await, dec!(0));
    }

    fn open_with_page_size(path: &str, page_size: &str) -> Arc<BatchQueueApi> {
        let api = BatchQueueApi::open(path).unwrap();
        api.config_manager()
            .set_global_config_value(config_keys::CANDIDATE_PAGE_SIZE, page_size)
            .unwrap();
        Arc::new(BatchQueueApi::open(path).unwrap())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_priority_adjust_during_paged_deduct() {
        for _ in 0..10 {
            let (_temp, path, _api) = create_test_api();
            let api = open_with_page_size(&path, "2");
            assert_eq!(api.config().candidate_page_size, 2);

            deduct_while_reordering(api.clone(), api).await;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_priority_adjust_from_other_instance_during_paged_deduct() {
        for _ in 0..10 {
            let (_temp, path, _api) = create_test_api();
            let deduct_api = open_with_page_size(&path, "2");
            // 另一实例不共享锁登记表，只能靠扣料方复核合计
            let adjust_api = Arc::new(BatchQueueApi::open(&path).unwrap());

            deduct_while_reordering(deduct_api, adjust_api).await;
        }
    }
}
