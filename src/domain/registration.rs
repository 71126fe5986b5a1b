// ==========================================
// 考试排期系统 - 考生报名领域模型
// ==========================================
// 对齐: schema student_exam 表
// 不变量: (exam_id, student_id) 至多一条报名记录
// ==========================================

use crate::domain::exam::ExamView;
use crate::domain::types::RegistrationStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// StudentExamRegistration - 考生报名记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentExamRegistration {
    pub registration_id: String,
    pub exam_id: String,
    pub student_id: String,
    pub registration_no: String, // 准考证号（展示用）
    pub seat_number: Option<String>,
    pub status: RegistrationStatus,
    pub registered_at: NaiveDateTime,
}

/// 报名请求载荷
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    #[serde(alias = "student")]
    pub student_id: String,
    #[serde(alias = "sbd")]
    pub registration_no: Option<String>,
    pub seat_number: Option<String>,
}

/// 学生个人考试安排条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentExamEntry {
    pub exam: ExamView,
    pub registration_no: String,
    pub seat_number: Option<String>,
    pub registration_status: RegistrationStatus,
}

/// 生成展示用准考证号：考试编号 + 4 位流水号
pub fn generate_registration_no(exam_code: &str, sequence: i64) -> String {
    format!("{}-{:04}", exam_code, sequence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_no_format() {
        assert_eq!(generate_registration_no("EX-001", 7), "EX-001-0007");
        assert_eq!(generate_registration_no("EX-001", 12345), "EX-001-12345");
    }

    #[test]
    fn test_request_accepts_legacy_alias() {
        let req: RegistrationRequest =
            serde_json::from_str(r#"{"student":"S1","sbd":"A-01"}"#).unwrap();
        assert_eq!(req.student_id, "S1");
        assert_eq!(req.registration_no.as_deref(), Some("A-01"));
    }
}
