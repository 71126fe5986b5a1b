// ==========================================
// 考试排期系统 - 参考数据模型
// ==========================================
// 科目 / 考场 / 时段 / 教学班 由其他子系统维护
// 本系统只读取标识与少量展示字段
// ==========================================

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub subject_id: String,
    pub subject_code: String,
    pub subject_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub room_id: String,
    pub room_code: String,
    pub room_name: String,
    pub capacity: i32, // 座位数
}

/// 考试时段（如 "Morning" 07:00-09:30）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeslot {
    pub slot_id: String,
    pub slot_name: String,
    pub start_time: String,
    pub end_time: String,
}

/// 教学班
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSection {
    pub class_section_id: String,
    pub class_code: String,
    pub class_name: String,
    pub subject_id: String,
}
