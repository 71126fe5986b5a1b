// ==========================================
// 考试排期系统 - 选课与学生通讯录模型
// ==========================================
// 选课数据由选课子系统维护，本系统只读
// ==========================================

use serde::{Deserialize, Serialize};

/// 学生联系信息（通知审计用的脱敏投影）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentContact {
    #[serde(rename = "id")]
    pub student_id: String,
    pub student_code: String,
    pub full_name: String,
    pub email: Option<String>,
}
