// ==========================================
// 物料批次队列 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: BOM 物料批次的上料、按优先级扣料与追溯
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 候选选择、分配与串行化
pub mod engine;

// 命令层 - 上料/扣料/调整优先级
pub mod command;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 共享状态
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域实体
pub use domain::{
    BatchMaterialQueueItem, BomItem, DeductionDescriptor, NewBatchMaterialQueueItem, QueueItemId,
};

// 命令
pub use command::{
    AdjustPriorityCommand, BatchCommand, BatchQueueError, DeductCommand, DeductError,
    DeductSpecificCommand, LoadCommand, LoadError,
};

// API
pub use api::{ApiError, BatchQueueApi, ErrorResponse};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "物料批次队列";
