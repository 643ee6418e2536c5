// ==========================================
// 物料批次队列 - API 层
// ==========================================
// 职责: 提供业务 API 接口，供上层应用或服务调用
// ==========================================

pub mod batch_queue_api;
pub mod error;

// 重导出核心类型
pub use batch_queue_api::{BatchQueueApi, BomItemStock};
pub use error::{ApiError, ApiResult, ErrorResponse};
