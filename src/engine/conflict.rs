// ==========================================
// 考试排期系统 - 冲突检测引擎
// ==========================================
// 红线: Engine 不拼 SQL，所有冲突必须输出可直接展示的 message
// ==========================================
// 考场冲突: (考场, 日期, 时段) 已被非取消考试占用
// 科目冲突: 同科目同日期同时段已有其他考试（学生冲突的科目级代理）
// 学生冲突: 逐个学生经选课关系判定（PER_STUDENT 策略）
// ==========================================

use crate::domain::enrollment::StudentContact;
use crate::domain::exam::{ExamSummary, ExamView};
use crate::domain::types::StudentConflictStrategy;
use crate::engine::repositories::ScheduleFactReader;
use crate::repository::RepositoryResult;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ==========================================
// 冲突判定结果
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    Room,
    Subject,
    Student,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::Room => "ROOM_CONFLICT",
            ConflictKind::Subject => "SUBJECT_CONFLICT",
            ConflictKind::Student => "STUDENT_CONFLICT",
        }
    }
}

/// 单项冲突检查结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictCheck {
    pub kind: ConflictKind,
    pub has_conflict: bool,
    pub conflicting_exams: Vec<ExamSummary>,
    /// 受影响学生ID（仅学生冲突）
    pub affected_students: Vec<String>,
    pub message: Option<String>,
}

impl ConflictCheck {
    fn clear(kind: ConflictKind) -> Self {
        Self {
            kind,
            has_conflict: false,
            conflicting_exams: Vec::new(),
            affected_students: Vec::new(),
            message: None,
        }
    }
}

/// 冲突检查的目标位置（展示名已解析）
#[derive(Debug, Clone)]
pub struct SlotPlacement<'a> {
    pub exam_date: NaiveDate,
    pub room_label: &'a str,
    pub slot_label: &'a str,
    pub subject_label: &'a str,
}

fn exam_codes(exams: &[ExamView]) -> String {
    exams
        .iter()
        .map(|e| e.exam.exam_code.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

// ==========================================
// 纯判定函数
// ==========================================

/// 考场冲突判定
///
/// # 参数
/// - `occupants`: 已排除自身的同 (考场, 日期, 时段) 非取消考试
pub fn evaluate_room_conflict(placement: &SlotPlacement<'_>, occupants: &[ExamView]) -> ConflictCheck {
    if occupants.is_empty() {
        return ConflictCheck::clear(ConflictKind::Room);
    }

    ConflictCheck {
        kind: ConflictKind::Room,
        has_conflict: true,
        conflicting_exams: occupants.iter().map(ExamView::summary).collect(),
        affected_students: Vec::new(),
        message: Some(format!(
            "考场冲突: {} 在 {} 的 {} 时段已被考试 {} 占用",
            placement.room_label,
            placement.exam_date,
            placement.slot_label,
            exam_codes(occupants)
        )),
    }
}

/// 科目冲突判定
///
/// 更新时允许与自身"冲突": 仅匹配到被编辑考试本身不算冲突
pub fn evaluate_subject_conflict(
    placement: &SlotPlacement<'_>,
    matches: &[ExamView],
    editing_exam_id: Option<&str>,
) -> ConflictCheck {
    let others: Vec<ExamView> = matches
        .iter()
        .filter(|e| Some(e.exam_id()) != editing_exam_id)
        .cloned()
        .collect();

    if others.is_empty() {
        return ConflictCheck::clear(ConflictKind::Subject);
    }

    ConflictCheck {
        kind: ConflictKind::Subject,
        has_conflict: true,
        conflicting_exams: others.iter().map(ExamView::summary).collect(),
        affected_students: Vec::new(),
        message: Some(format!(
            "科目冲突: 科目 {} 在 {} 的 {} 时段已安排考试 {}",
            placement.subject_label,
            placement.exam_date,
            placement.slot_label,
            exam_codes(&others)
        )),
    }
}

/// 学生冲突判定
///
/// # 参数
/// - `clashes`: (学生, 该学生同一时段已有的考试)，已排除被编辑考试
pub fn evaluate_student_conflict(
    placement: &SlotPlacement<'_>,
    clashes: &[(StudentContact, Vec<ExamView>)],
) -> ConflictCheck {
    let clashing: Vec<&(StudentContact, Vec<ExamView>)> =
        clashes.iter().filter(|(_, exams)| !exams.is_empty()).collect();

    if clashing.is_empty() {
        return ConflictCheck::clear(ConflictKind::Student);
    }

    let mut conflicting: Vec<ExamView> = Vec::new();
    for (_, exams) in &clashing {
        for exam in exams {
            if !conflicting.iter().any(|c| c.exam_id() == exam.exam_id()) {
                conflicting.push(exam.clone());
            }
        }
    }

    ConflictCheck {
        kind: ConflictKind::Student,
        has_conflict: true,
        conflicting_exams: conflicting.iter().map(ExamView::summary).collect(),
        affected_students: clashing.iter().map(|(s, _)| s.student_id.clone()).collect(),
        message: Some(format!(
            "学生冲突: {} 名学生在 {} 的 {} 时段已有考试 {}",
            clashing.len(),
            placement.exam_date,
            placement.slot_label,
            exam_codes(&conflicting)
        )),
    }
}

// ==========================================
// ConflictDetector - 冲突检测器
// ==========================================

/// 冲突检测器
///
/// 通过 ScheduleFactReader 取数，判定逻辑委托给纯函数
pub struct ConflictDetector {
    facts: Arc<dyn ScheduleFactReader>,
}

impl ConflictDetector {
    pub fn new(facts: Arc<dyn ScheduleFactReader>) -> Self {
        Self { facts }
    }

    /// 考场冲突检查
    ///
    /// # 参数
    /// - `exclude_exam_id`: 创建时 None；更新时为被编辑考试ID
    pub fn check_room(
        &self,
        placement: &SlotPlacement<'_>,
        room_id: &str,
        slot_id: &str,
        exclude_exam_id: Option<&str>,
    ) -> RepositoryResult<ConflictCheck> {
        let occupants = self.facts.find_exams_by_room_date_slot(
            room_id,
            placement.exam_date,
            slot_id,
            exclude_exam_id,
        )?;
        Ok(evaluate_room_conflict(placement, &occupants))
    }

    /// 科目冲突检查
    pub fn check_subject(
        &self,
        placement: &SlotPlacement<'_>,
        subject_id: &str,
        slot_id: &str,
        editing_exam_id: Option<&str>,
    ) -> RepositoryResult<ConflictCheck> {
        let matches =
            self.facts
                .find_exams_by_subject_date_slot(subject_id, placement.exam_date, slot_id)?;
        Ok(evaluate_subject_conflict(placement, &matches, editing_exam_id))
    }

    /// 逐学生冲突检查
    ///
    /// 考试的学生集合: 绑定教学班 → 该班有效选课学生；未绑定 → 该科目全部教学班
    pub fn check_students(
        &self,
        placement: &SlotPlacement<'_>,
        class_section_id: Option<&str>,
        subject_id: &str,
        slot_id: &str,
        editing_exam_id: Option<&str>,
    ) -> RepositoryResult<ConflictCheck> {
        let students = self.facts.find_active_students(class_section_id, subject_id)?;

        let mut clashes = Vec::with_capacity(students.len());
        for student in students {
            let exams: Vec<ExamView> = self
                .facts
                .find_exams_for_student_at_slot(&student.student_id, placement.exam_date, slot_id)?
                .into_iter()
                .filter(|e| Some(e.exam_id()) != editing_exam_id)
                .collect();
            clashes.push((student, exams));
        }

        Ok(evaluate_student_conflict(placement, &clashes))
    }

    /// 按策略执行学生重叠检查
    pub fn check_student_overlap(
        &self,
        strategy: StudentConflictStrategy,
        placement: &SlotPlacement<'_>,
        class_section_id: Option<&str>,
        subject_id: &str,
        slot_id: &str,
        editing_exam_id: Option<&str>,
    ) -> RepositoryResult<ConflictCheck> {
        match strategy {
            StudentConflictStrategy::SubjectSlot => {
                self.check_subject(placement, subject_id, slot_id, editing_exam_id)
            }
            StudentConflictStrategy::PerStudent => self.check_students(
                placement,
                class_section_id,
                subject_id,
                slot_id,
                editing_exam_id,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{EnrollmentStatus, ExamStatus};
    use crate::engine::repositories::memory::MemoryFacts;

    fn june_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn placement<'a>(room: &'a str, subject: &'a str) -> SlotPlacement<'a> {
        SlotPlacement {
            exam_date: june_first(),
            room_label: room,
            slot_label: "Morning",
            subject_label: subject,
        }
    }

    #[test]
    fn test_room_conflict_mentions_room_and_slot() {
        let mut facts = MemoryFacts::campus();
        facts.add_exam("X", "SE001", Some("C1"), "A102", june_first(), "MORNING", ExamStatus::Scheduled);
        let detector = ConflictDetector::new(Arc::new(facts));

        let check = detector
            .check_room(&placement("A102", "高等数学"), "A102", "MORNING", None)
            .unwrap();
        assert!(check.has_conflict);
        assert_eq!(check.conflicting_exams.len(), 1);
        assert_eq!(check.conflicting_exams[0].id, "X");
        let message = check.message.unwrap();
        assert!(message.contains("A102"));
        assert!(message.contains("Morning"));

        let free = detector
            .check_room(&placement("A103", "高等数学"), "A103", "MORNING", None)
            .unwrap();
        assert!(!free.has_conflict);
        assert!(free.message.is_none());
    }

    #[test]
    fn test_room_conflict_excludes_self_and_cancelled() {
        let mut facts = MemoryFacts::campus();
        facts.add_exam("X", "SE001", None, "A102", june_first(), "MORNING", ExamStatus::Scheduled);
        facts.add_exam("Z", "MA101", None, "A103", june_first(), "MORNING", ExamStatus::Cancelled);
        let detector = ConflictDetector::new(Arc::new(facts));

        let own = detector
            .check_room(&placement("A102", "软件工程"), "A102", "MORNING", Some("X"))
            .unwrap();
        assert!(!own.has_conflict);

        let cancelled = detector
            .check_room(&placement("A103", "软件工程"), "A103", "MORNING", None)
            .unwrap();
        assert!(!cancelled.has_conflict);
    }

    #[test]
    fn test_subject_conflict_allows_self_match() {
        let mut facts = MemoryFacts::campus();
        let x = facts.add_exam("X", "SE001", Some("C1"), "A102", june_first(), "MORNING", ExamStatus::Scheduled);
        let p = placement("A103", "软件工程");

        let self_only = evaluate_subject_conflict(&p, &[x.clone()], Some("X"));
        assert!(!self_only.has_conflict);

        let other = evaluate_subject_conflict(&p, &[x], None);
        assert!(other.has_conflict);
        assert!(other.message.unwrap().contains("软件工程"));
    }

    #[test]
    fn test_per_student_conflict_through_enrollment() {
        let mut facts = MemoryFacts::campus();
        facts.add_student("S1", &[("C1", EnrollmentStatus::Active), ("M1", EnrollmentStatus::Enrolled)]);
        facts.add_student("S2", &[("C1", EnrollmentStatus::Active)]);
        facts.add_student("S3", &[("M1", EnrollmentStatus::Dropped)]);
        // S1 已有 C1 的考试
        facts.add_exam("X", "SE001", Some("C1"), "A102", june_first(), "MORNING", ExamStatus::Scheduled);
        let detector = ConflictDetector::new(Arc::new(facts));

        // 为 M1 安排同一时段的考试: 仅 S1 冲突（S3 已退课）
        let check = detector
            .check_student_overlap(
                StudentConflictStrategy::PerStudent,
                &placement("A103", "高等数学"),
                Some("M1"),
                "MA101",
                "MORNING",
                None,
            )
            .unwrap();
        assert!(check.has_conflict);
        assert_eq!(check.affected_students, vec!["S1".to_string()]);
        assert_eq!(check.conflicting_exams[0].id, "X");
        assert!(check.message.unwrap().starts_with("学生冲突: 1 名学生"));

        // 同一情形下科目级策略不冲突（不同科目）
        let subject_level = detector
            .check_student_overlap(
                StudentConflictStrategy::SubjectSlot,
                &placement("A103", "高等数学"),
                Some("M1"),
                "MA101",
                "MORNING",
                None,
            )
            .unwrap();
        assert!(!subject_level.has_conflict);
    }

    #[test]
    fn test_per_student_unbound_exam_matches_subject_sections() {
        let mut facts = MemoryFacts::campus();
        facts.add_student("S1", &[("C2", EnrollmentStatus::Completed)]);
        // 未绑定教学班的 SE001 考试覆盖 C2 学生
        facts.add_exam("U", "SE001", None, "A102", june_first(), "MORNING", ExamStatus::Scheduled);
        let facts = Arc::new(facts);

        let clashes = facts
            .find_exams_for_student_at_slot("S1", june_first(), "MORNING")
            .unwrap();
        assert_eq!(clashes.len(), 1);
        assert_eq!(clashes[0].exam_id(), "U");
    }
}
