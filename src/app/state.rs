// ==========================================
// 物料批次队列 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::path::PathBuf;
use std::sync::Arc;

use crate::api::{ApiResult, BatchQueueApi};

/// 显式指定数据库路径的环境变量
pub const DB_PATH_ENV: &str = "MATERIAL_BATCH_QUEUE_DB_PATH";

const DB_FILE_NAME: &str = "material_batch_queue.db";

/// 应用状态
///
/// 同一进程内只应存在一个物料批API实例，
/// 否则各实例的 BOM 物料锁互不可见
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 物料批API
    pub batch_queue_api: Arc<BatchQueueApi>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: String) -> ApiResult<Self> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let batch_queue_api = Arc::new(BatchQueueApi::open(&db_path)?);

        tracing::info!("AppState初始化完成");
        Ok(Self {
            db_path,
            batch_queue_api,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from(format!("./{}", DB_FILE_NAME));

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("material-batch-queue");
        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join(DB_FILE_NAME);
        }
    }

    path.to_string_lossy().to_string()
}
