// ==========================================
// 测试数据构建器 - 用于集成测试
// ==========================================

#![allow(dead_code)]

use exam_scheduler::domain::exam::{ExamDraft, ExamPatch};
use exam_scheduler::domain::types::ExamStatus;

use crate::test_helpers::{ROOM_A102, SLOT_MORNING, SUBJECT_SE};

/// 默认考试日期
pub const EXAM_DAY: &str = "2025-06-10";

// ==========================================
// ExamDraft 构建器
// ==========================================

pub struct ExamDraftBuilder {
    draft: ExamDraft,
}

impl ExamDraftBuilder {
    /// 默认: 软件工程 / A102 / 上午时段 / 2025-06-10 07:00-09:30 / 容量 30
    pub fn new(exam_code: &str) -> Self {
        Self {
            draft: ExamDraft {
                exam_code: Some(exam_code.to_string()),
                subject_id: Some(SUBJECT_SE.to_string()),
                class_section_id: None,
                room_id: Some(ROOM_A102.to_string()),
                slot_id: Some(SLOT_MORNING.to_string()),
                exam_date: Some(EXAM_DAY.to_string()),
                start_time: Some("07:00".to_string()),
                end_time: Some("09:30".to_string()),
                max_capacity: Some(30),
                exam_rules: None,
                notes: None,
            },
        }
    }

    pub fn subject(mut self, subject_id: &str) -> Self {
        self.draft.subject_id = Some(subject_id.to_string());
        self
    }

    pub fn section(mut self, class_section_id: &str) -> Self {
        self.draft.class_section_id = Some(class_section_id.to_string());
        self
    }

    pub fn room(mut self, room_id: &str) -> Self {
        self.draft.room_id = Some(room_id.to_string());
        self
    }

    pub fn slot(mut self, slot_id: &str) -> Self {
        self.draft.slot_id = Some(slot_id.to_string());
        self
    }

    pub fn date(mut self, exam_date: &str) -> Self {
        self.draft.exam_date = Some(exam_date.to_string());
        self
    }

    pub fn times(mut self, start: &str, end: &str) -> Self {
        self.draft.start_time = Some(start.to_string());
        self.draft.end_time = Some(end.to_string());
        self
    }

    pub fn capacity(mut self, capacity: i64) -> Self {
        self.draft.max_capacity = Some(capacity);
        self
    }

    pub fn without_capacity(mut self) -> Self {
        self.draft.max_capacity = None;
        self
    }

    pub fn build(self) -> ExamDraft {
        self.draft
    }
}

// ==========================================
// ExamPatch 快捷构造
// ==========================================

pub fn move_to_room(room_id: &str) -> ExamPatch {
    ExamPatch {
        room_id: Some(room_id.to_string()),
        ..Default::default()
    }
}

pub fn set_status(status: ExamStatus) -> ExamPatch {
    ExamPatch {
        status: Some(status),
        ..Default::default()
    }
}
