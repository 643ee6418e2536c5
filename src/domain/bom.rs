// ==========================================
// 物料批次队列 - BOM 物料（外部协作方）
// ==========================================
// BOM 维护不在本模块范围，这里只保留上料校验需要的只读视图
// ==========================================

use serde::{Deserialize, Serialize};

/// BOM 物料
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomItem {
    pub code: String, // BOM 物料编码
    pub name: String, // 物料名称
}
