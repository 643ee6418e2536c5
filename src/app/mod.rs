// ==========================================
// 物料批次队列 - 应用层
// ==========================================
// 职责: 管理应用级共享状态
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState, DB_PATH_ENV};
