// ==========================================
// 考试排期系统 - 考试领域模型
// ==========================================
// 对齐: schema exam 表
// 不变量: start_time < end_time（零填充 HH:MM 字典序即时间序）
// 不变量: (room_id, exam_date, slot_id) 在非取消考试中唯一
// ==========================================

use crate::domain::types::ExamStatus;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

/// 默认考场规则
pub const DEFAULT_EXAM_RULES: &str = "标准考场规则";

// ==========================================
// Exam - 考试（存储记录）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    // ===== 主键 =====
    pub exam_id: String,
    pub exam_code: String, // 考试编号（唯一）

    // ===== 关联 =====
    pub subject_id: String,
    pub class_section_id: Option<String>, // None 表示面向该科目所有教学班
    pub room_id: String,
    pub slot_id: String,

    // ===== 时间 =====
    pub exam_date: NaiveDate,
    pub start_time: String, // HH:MM
    pub end_time: String,   // HH:MM

    // ===== 容量与说明 =====
    pub max_capacity: i32,
    pub exam_rules: Option<String>,
    pub notes: Option<String>,

    // ===== 状态与审计 =====
    pub status: ExamStatus,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Exam {
    /// 冲突判定键
    pub fn slot_key(&self) -> SlotKey {
        SlotKey::new(&self.room_id, self.exam_date, &self.slot_id)
    }
}

// ==========================================
// ExamView - 考试读模型（含关联展示字段）
// ==========================================
// registered_students 为读时派生值（非取消报名记录数），不落库
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamView {
    #[serde(flatten)]
    pub exam: Exam,

    pub subject_code: Option<String>,
    pub subject_name: Option<String>,
    pub class_code: Option<String>,
    pub class_name: Option<String>,
    pub room_code: Option<String>,
    pub room_name: Option<String>,
    pub room_capacity: Option<i32>,
    pub slot_name: Option<String>,
    pub slot_start_time: Option<String>,
    pub slot_end_time: Option<String>,

    pub registered_students: i64,
}

impl ExamView {
    /// 仅含存储字段的视图（关联数据缺失时使用）
    pub fn bare(exam: Exam) -> Self {
        Self {
            exam,
            subject_code: None,
            subject_name: None,
            class_code: None,
            class_name: None,
            room_code: None,
            room_name: None,
            room_capacity: None,
            slot_name: None,
            slot_start_time: None,
            slot_end_time: None,
            registered_students: 0,
        }
    }

    pub fn exam_id(&self) -> &str {
        &self.exam.exam_id
    }

    /// 考场展示名：名称 > 编码 > ID
    pub fn room_label(&self) -> &str {
        self.room_name
            .as_deref()
            .or(self.room_code.as_deref())
            .unwrap_or(&self.exam.room_id)
    }

    /// 时段展示名
    pub fn slot_label(&self) -> &str {
        self.slot_name.as_deref().unwrap_or(&self.exam.slot_id)
    }

    /// 科目展示名
    pub fn subject_label(&self) -> &str {
        self.subject_name
            .as_deref()
            .or(self.subject_code.as_deref())
            .unwrap_or(&self.exam.subject_id)
    }

    /// 推送用摘要
    pub fn summary(&self) -> ExamSummary {
        ExamSummary {
            id: self.exam.exam_id.clone(),
            exam_code: self.exam.exam_code.clone(),
            subject: self.subject_name.clone().unwrap_or_else(|| "N/A".to_string()),
            exam_date: self.exam.exam_date,
            start_time: self.exam.start_time.clone(),
            end_time: self.exam.end_time.clone(),
            room: self.room_name.clone().unwrap_or_else(|| "N/A".to_string()),
            status: self.exam.status,
        }
    }
}

/// 考试摘要（通知载荷 / 冲突详情）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamSummary {
    pub id: String,
    pub exam_code: String,
    pub subject: String,
    pub exam_date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub room: String,
    pub status: ExamStatus,
}

// ==========================================
// SlotKey - (考场, 日期, 时段) 三元组
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub room_id: String,
    pub exam_date: NaiveDate,
    pub slot_id: String,
}

impl SlotKey {
    pub fn new(room_id: &str, exam_date: NaiveDate, slot_id: &str) -> Self {
        Self {
            room_id: room_id.to_string(),
            exam_date,
            slot_id: slot_id.to_string(),
        }
    }
}

// ==========================================
// ExamDraft - 创建请求载荷（未校验）
// ==========================================
// 日期/时间保留原始字符串，由字段校验统一解析并逐项报错
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamDraft {
    pub exam_code: Option<String>,
    #[serde(alias = "subject")]
    pub subject_id: Option<String>,
    #[serde(alias = "classSection")]
    pub class_section_id: Option<String>,
    #[serde(alias = "room")]
    pub room_id: Option<String>,
    #[serde(alias = "slot")]
    pub slot_id: Option<String>,
    pub exam_date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub max_capacity: Option<i64>,
    pub exam_rules: Option<String>,
    pub notes: Option<String>,
}

// ==========================================
// ExamPatch - 更新请求载荷（部分字段）
// ==========================================
// 可清空字段: None = 未提供（保留原值），Some(None) = 显式 null（清空）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamPatch {
    pub exam_code: Option<String>,
    #[serde(alias = "subject")]
    pub subject_id: Option<String>,
    #[serde(
        alias = "classSection",
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub class_section_id: Option<Option<String>>,
    #[serde(alias = "room")]
    pub room_id: Option<String>,
    #[serde(alias = "slot")]
    pub slot_id: Option<String>,
    pub exam_date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub max_capacity: Option<i64>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub exam_rules: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
    pub status: Option<ExamStatus>,
}

/// 出现即为 Some: null 解析为 Some(None)
fn nullable<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl ExamPatch {
    /// 将补丁叠加到现有考试上，得到完整草稿
    pub fn merge_onto(&self, current: &Exam) -> ExamDraft {
        ExamDraft {
            exam_code: Some(self.exam_code.clone().unwrap_or_else(|| current.exam_code.clone())),
            subject_id: Some(self.subject_id.clone().unwrap_or_else(|| current.subject_id.clone())),
            class_section_id: self
                .class_section_id
                .clone()
                .unwrap_or_else(|| current.class_section_id.clone()),
            room_id: Some(self.room_id.clone().unwrap_or_else(|| current.room_id.clone())),
            slot_id: Some(self.slot_id.clone().unwrap_or_else(|| current.slot_id.clone())),
            exam_date: Some(
                self.exam_date
                    .clone()
                    .unwrap_or_else(|| current.exam_date.format("%Y-%m-%d").to_string()),
            ),
            start_time: Some(self.start_time.clone().unwrap_or_else(|| current.start_time.clone())),
            end_time: Some(self.end_time.clone().unwrap_or_else(|| current.end_time.clone())),
            max_capacity: Some(self.max_capacity.unwrap_or(i64::from(current.max_capacity))),
            exam_rules: self
                .exam_rules
                .clone()
                .unwrap_or_else(|| current.exam_rules.clone()),
            notes: self.notes.clone().unwrap_or_else(|| current.notes.clone()),
        }
    }
}

// ==========================================
// NewExam - 通过字段校验的考试数据
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExam {
    pub exam_code: String,
    pub subject_id: String,
    pub class_section_id: Option<String>,
    pub room_id: String,
    pub slot_id: String,
    pub exam_date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub max_capacity: i32,
    pub exam_rules: Option<String>,
    pub notes: Option<String>,
}

impl NewExam {
    pub fn slot_key(&self) -> SlotKey {
        SlotKey::new(&self.room_id, self.exam_date, &self.slot_id)
    }

    /// 与现有考试相比，冲突相关字段（考场/日期/时段/科目）是否变化
    pub fn placement_changed(&self, current: &Exam) -> bool {
        self.room_id != current.room_id
            || self.exam_date != current.exam_date
            || self.slot_id != current.slot_id
            || self.subject_id != current.subject_id
    }
}

// ==========================================
// ExamFilter / ExamPage - 列表查询
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExamFilter {
    pub status: Option<ExamStatus>,
    pub exam_date: Option<NaiveDate>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub class_section_id: Option<String>,
    pub subject_id: Option<String>,
    pub room_id: Option<String>,
    pub keyword: Option<String>, // 匹配考试编号（不区分大小写）
    pub page: u32,
    pub page_size: u32,
    pub sort_ascending: bool,
}

impl Default for ExamFilter {
    fn default() -> Self {
        Self {
            status: None,
            exam_date: None,
            date_from: None,
            date_to: None,
            class_section_id: None,
            subject_id: None,
            room_id: None,
            keyword: None,
            page: 1,
            page_size: 10,
            sort_ascending: false,
        }
    }
}

impl ExamFilter {
    /// 偏移量（page 从 1 开始）
    pub fn offset(&self) -> u32 {
        self.page.max(1).saturating_sub(1).saturating_mul(self.page_size)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamPage {
    pub data: Vec<ExamView>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl ExamPage {
    pub fn new(data: Vec<ExamView>, total: i64, page: u32, page_size: u32) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            ((total.max(0) as u64 + u64::from(page_size) - 1) / u64::from(page_size)) as u32
        };
        Self {
            data,
            total,
            page,
            page_size,
            total_pages,
        }
    }
}
