// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试数据生成等功能
// ==========================================

#![allow(dead_code)]

use material_batch_queue::api::BatchQueueApi;
use material_batch_queue::command::LoadInput;
use material_batch_queue::domain::{BatchMaterialQueueItem, BomItem};
use material_batch_queue::repository::SqliteBomItemRepository;
use rust_decimal::Decimal;
use std::error::Error;
use tempfile::NamedTempFile;

/// 测试用 BOM 物料编码
pub const TEST_BOM_ITEMS: [&str; 3] = ["BOM001", "BOM002", "BOM003"];

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径非 UTF-8")?
        .to_string();

    let conn = material_batch_queue::db::open_sqlite_connection(&db_path)?;
    material_batch_queue::db::init_schema(&conn)?;
    drop(conn);

    seed_bom_items(&db_path)?;

    Ok((temp_file, db_path))
}

/// 写入测试用 BOM 物料
pub fn seed_bom_items(db_path: &str) -> Result<(), Box<dyn Error>> {
    let repo = SqliteBomItemRepository::new(db_path)?;
    for code in TEST_BOM_ITEMS {
        repo.upsert(&BomItem {
            code: code.to_string(),
            name: format!("测试物料{}", code),
        })?;
    }
    Ok(())
}

/// 创建测试 API（临时库 + 已写入 BOM 物料）
pub fn create_test_api() -> (NamedTempFile, String, BatchQueueApi) {
    material_batch_queue::logging::init_test();
    let (temp_file, db_path) = create_test_db().unwrap();
    let api = BatchQueueApi::open(&db_path).unwrap();
    (temp_file, db_path, api)
}

/// 上料输入
pub fn load_input(
    bom_item_code: &str,
    batch_code: &str,
    amount: Decimal,
    priority: i32,
) -> LoadInput {
    LoadInput {
        bom_item_code: bom_item_code.to_string(),
        batch_code: batch_code.to_string(),
        amount,
        priority,
    }
}

/// 上料并返回物料批
pub async fn load(
    api: &BatchQueueApi,
    bom_item_code: &str,
    batch_code: &str,
    amount: Decimal,
    priority: i32,
) -> BatchMaterialQueueItem {
    api.load_batch(load_input(bom_item_code, batch_code, amount, priority))
        .await
        .unwrap()
}

/// 读取物料批当前剩余量
pub async fn remaining(api: &BatchQueueApi, item: &BatchMaterialQueueItem) -> Decimal {
    api.get_batch(item.id).await.unwrap().remaining_amount
}
