// ==========================================
// 考试排期系统 - 考试校验器
// ==========================================
// 职责: 考试创建/更新的校验流程
// 流程: 字段校验 → 引用存在性 → 逐项规则 + 考场冲突 + 学生重叠 → 汇总
// 规则: 冲突检查不短路，调用方一次看到全部问题
// ==========================================

use chrono::NaiveDate;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult, ValidationViolation};
use crate::domain::exam::{ExamDraft, ExamPatch, ExamView, NewExam, DEFAULT_EXAM_RULES};
use crate::domain::reference::{ClassSection, Room, Subject, Timeslot};
use crate::domain::types::{ExamStatus, StudentConflictStrategy};
use crate::engine::conflict::{ConflictDetector, SlotPlacement};
use crate::engine::repositories::ScheduleFactReader;

// ==========================================
// 字段解析（纯函数）
// ==========================================

/// 解析 H:MM / HH:MM（24 小时制），归一化为零填充 HH:MM
pub fn normalize_time(raw: &str) -> Option<String> {
    let (h, m) = raw.trim().split_once(':')?;
    if h.is_empty() || h.len() > 2 || m.len() != 2 {
        return None;
    }
    if !h.bytes().all(|b| b.is_ascii_digit()) || !m.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some(format!("{:02}:{:02}", hour, minute))
}

/// 解析考试日期: YYYY-MM-DD，或 ISO 日期时间（T 之后部分忽略）
pub fn parse_exam_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let day = match trimmed.split_once('T') {
        Some((day, _)) => day,
        None => trimmed,
    };
    if day.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn required<'a>(
    value: &'a Option<String>,
    field: &str,
    label: &str,
    violations: &mut Vec<ValidationViolation>,
) -> Option<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Some(v),
        _ => {
            violations.push(ValidationViolation::field(field, format!("{}不能为空", label)));
            None
        }
    }
}

/// 字段校验（无状态）
///
/// # 返回
/// - Ok(NewExam): 全部字段合法
/// - Err(violations): 逐项字段错误
pub fn validate_fields(draft: &ExamDraft) -> Result<NewExam, Vec<ValidationViolation>> {
    let mut violations = Vec::new();

    let exam_code = required(&draft.exam_code, "examCode", "考试编号", &mut violations);
    let subject_id = required(&draft.subject_id, "subjectId", "科目", &mut violations);
    let room_id = required(&draft.room_id, "roomId", "考场", &mut violations);
    let slot_id = required(&draft.slot_id, "slotId", "考试时段", &mut violations);

    let exam_date = required(&draft.exam_date, "examDate", "考试日期", &mut violations).and_then(|raw| {
        let parsed = parse_exam_date(raw);
        if parsed.is_none() {
            violations.push(ValidationViolation::field(
                "examDate",
                format!("考试日期格式错误: {}（应为 YYYY-MM-DD）", raw),
            ));
        }
        parsed
    });

    let mut parse_time = |value: &Option<String>, field: &str, label: &str| {
        required(value, field, label, &mut violations).and_then(|raw| {
            let parsed = normalize_time(raw);
            if parsed.is_none() {
                violations.push(ValidationViolation::field(
                    field,
                    format!("{}格式错误: {}（应为 HH:MM）", label, raw),
                ));
            }
            parsed
        })
    };
    let start_time = parse_time(&draft.start_time, "startTime", "开始时间");
    let end_time = parse_time(&draft.end_time, "endTime", "结束时间");

    if let (Some(start), Some(end)) = (&start_time, &end_time) {
        // 零填充 HH:MM 的字典序即时间序
        if start >= end {
            violations.push(ValidationViolation::field(
                "endTime",
                format!("结束时间 {} 必须晚于开始时间 {}", end, start),
            ));
        }
    }

    let max_capacity = match draft.max_capacity {
        None => {
            violations.push(ValidationViolation::field("maxCapacity", "考试容量不能为空"));
            None
        }
        Some(cap) if cap <= 0 => {
            violations.push(ValidationViolation::field(
                "maxCapacity",
                format!("考试容量必须大于 0（当前 {}）", cap),
            ));
            None
        }
        Some(cap) => match i32::try_from(cap) {
            Ok(cap) => Some(cap),
            Err(_) => {
                violations.push(ValidationViolation::field(
                    "maxCapacity",
                    format!("考试容量超出范围: {}", cap),
                ));
                None
            }
        },
    };

    match (
        exam_code,
        subject_id,
        room_id,
        slot_id,
        exam_date,
        start_time,
        end_time,
        max_capacity,
    ) {
        (
            Some(exam_code),
            Some(subject_id),
            Some(room_id),
            Some(slot_id),
            Some(exam_date),
            Some(start_time),
            Some(end_time),
            Some(max_capacity),
        ) if violations.is_empty() => Ok(NewExam {
            exam_code: exam_code.to_string(),
            subject_id: subject_id.to_string(),
            class_section_id: draft
                .class_section_id
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            room_id: room_id.to_string(),
            slot_id: slot_id.to_string(),
            exam_date,
            start_time,
            end_time,
            max_capacity,
            exam_rules: draft
                .exam_rules
                .clone()
                .or_else(|| Some(DEFAULT_EXAM_RULES.to_string())),
            notes: draft.notes.clone(),
        }),
        _ => Err(violations),
    }
}

fn rejected(violations: Vec<ValidationViolation>) -> ApiError {
    let reason = violations
        .iter()
        .map(|v| v.reason.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    ApiError::ValidationFailed { reason, violations }
}

// ==========================================
// 校验结果
// ==========================================

/// 已解析的引用数据
#[derive(Debug, Clone)]
pub struct ResolvedReferences {
    pub subject: Subject,
    pub room: Room,
    pub slot: Timeslot,
    pub class_section: Option<ClassSection>,
}

/// 更新校验结果
#[derive(Debug, Clone)]
pub struct ValidatedUpdate {
    pub exam: NewExam,
    pub status: ExamStatus,
    /// 是否执行了冲突检查
    pub gates_ran: bool,
}

// ==========================================
// ExamValidator - 考试校验器
// ==========================================
pub struct ExamValidator {
    facts: Arc<dyn ScheduleFactReader>,
    detector: ConflictDetector,
}

impl ExamValidator {
    pub fn new(facts: Arc<dyn ScheduleFactReader>) -> Self {
        Self {
            detector: ConflictDetector::new(Arc::clone(&facts)),
            facts,
        }
    }

    /// 校验考试创建
    ///
    /// # 返回
    /// - Ok(NewExam): 可写入
    /// - Err(ValidationFailed): 字段错误或冲突（逐项）
    /// - Err(NotFound): 引用的科目/考场/时段/教学班不存在
    pub fn validate_creation(
        &self,
        draft: &ExamDraft,
        strategy: StudentConflictStrategy,
    ) -> ApiResult<NewExam> {
        let new_exam = validate_fields(draft).map_err(rejected)?;
        let refs = self.resolve_references(&new_exam)?;

        let mut violations = self.check_rules(&new_exam, &refs, None, true)?;
        violations.extend(self.run_gates(&new_exam, &refs, None, strategy)?);

        if !violations.is_empty() {
            tracing::info!(
                "考试创建校验未通过: exam_code={}, violations={}",
                new_exam.exam_code,
                violations.len()
            );
            return Err(rejected(violations));
        }
        Ok(new_exam)
    }

    /// 校验考试更新（补丁合并到当前考试后重新校验）
    ///
    /// 冲突检查仅在 考场/日期/时段/科目 变化或取消后重新启用时执行，
    /// 合并后状态为 CANCELLED 时不执行
    pub fn validate_update(
        &self,
        current: &ExamView,
        patch: &ExamPatch,
        strategy: StudentConflictStrategy,
    ) -> ApiResult<ValidatedUpdate> {
        let draft = patch.merge_onto(&current.exam);
        let new_exam = validate_fields(&draft).map_err(rejected)?;
        let refs = self.resolve_references(&new_exam)?;

        let status = patch.status.unwrap_or(current.exam.status);
        let reactivating = current.exam.status.is_cancelled() && !status.is_cancelled();
        let gates_ran =
            !status.is_cancelled() && (new_exam.placement_changed(&current.exam) || reactivating);

        let code_changed = new_exam.exam_code != current.exam.exam_code;
        let capacity_changed = new_exam.max_capacity != current.exam.max_capacity
            || new_exam.room_id != current.exam.room_id;

        let editing = Some(current.exam_id());
        let mut violations = self.check_rules(&new_exam, &refs, editing, code_changed)?;
        if !capacity_changed {
            violations.retain(|v| v.field.as_deref() != Some("maxCapacity"));
        }
        if gates_ran {
            violations.extend(self.run_gates(&new_exam, &refs, editing, strategy)?);
        }

        if !violations.is_empty() {
            tracing::info!(
                "考试更新校验未通过: exam_id={}, violations={}",
                current.exam_id(),
                violations.len()
            );
            return Err(rejected(violations));
        }

        Ok(ValidatedUpdate {
            exam: new_exam,
            status,
            gates_ran,
        })
    }

    /// 引用存在性检查（悬空引用 → NotFound）
    pub fn resolve_references(&self, exam: &NewExam) -> ApiResult<ResolvedReferences> {
        let subject = self
            .facts
            .find_subject(&exam.subject_id)?
            .ok_or_else(|| ApiError::NotFound(format!("科目(id={})不存在", exam.subject_id)))?;
        let room = self
            .facts
            .find_room(&exam.room_id)?
            .ok_or_else(|| ApiError::NotFound(format!("考场(id={})不存在", exam.room_id)))?;
        let slot = self
            .facts
            .find_timeslot(&exam.slot_id)?
            .ok_or_else(|| ApiError::NotFound(format!("考试时段(id={})不存在", exam.slot_id)))?;
        let class_section = match &exam.class_section_id {
            Some(id) => Some(
                self.facts
                    .find_class_section(id)?
                    .ok_or_else(|| ApiError::NotFound(format!("教学班(id={})不存在", id)))?,
            ),
            None => None,
        };

        Ok(ResolvedReferences {
            subject,
            room,
            slot,
            class_section,
        })
    }

    /// 逐项规则: 考试编号唯一、容量不超过考场座位数、教学班归属科目
    fn check_rules(
        &self,
        exam: &NewExam,
        refs: &ResolvedReferences,
        editing_exam_id: Option<&str>,
        check_code: bool,
    ) -> ApiResult<Vec<ValidationViolation>> {
        let mut violations = Vec::new();

        if check_code {
            if let Some(existing) = self.facts.find_exam_by_code(&exam.exam_code)? {
                if Some(existing.exam_id()) != editing_exam_id {
                    violations.push(ValidationViolation::field(
                        "examCode",
                        format!("考试编号 {} 已存在", exam.exam_code),
                    ));
                }
            }
        }

        if exam.max_capacity > refs.room.capacity {
            violations.push(ValidationViolation::field(
                "maxCapacity",
                format!(
                    "考试容量 {} 超过考场 {} 的座位数 {}",
                    exam.max_capacity, refs.room.room_name, refs.room.capacity
                ),
            ));
        }

        if let Some(section) = &refs.class_section {
            if section.subject_id != exam.subject_id {
                violations.push(ValidationViolation::field(
                    "classSectionId",
                    format!(
                        "教学班 {} 不属于科目 {}",
                        section.class_name, refs.subject.subject_name
                    ),
                ));
            }
        }

        Ok(violations)
    }

    /// 考场冲突 + 学生重叠（两项均执行）
    fn run_gates(
        &self,
        exam: &NewExam,
        refs: &ResolvedReferences,
        editing_exam_id: Option<&str>,
        strategy: StudentConflictStrategy,
    ) -> ApiResult<Vec<ValidationViolation>> {
        let placement = SlotPlacement {
            exam_date: exam.exam_date,
            room_label: &refs.room.room_name,
            slot_label: &refs.slot.slot_name,
            subject_label: &refs.subject.subject_name,
        };

        let room = self
            .detector
            .check_room(&placement, &exam.room_id, &exam.slot_id, editing_exam_id)?;
        let overlap = self.detector.check_student_overlap(
            strategy,
            &placement,
            exam.class_section_id.as_deref(),
            &exam.subject_id,
            &exam.slot_id,
            editing_exam_id,
        )?;

        Ok([room, overlap]
            .iter()
            .filter_map(ValidationViolation::from_conflict)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::EnrollmentStatus;
    use crate::engine::repositories::memory::MemoryFacts;

    fn draft(code: &str, subject: &str, room: &str) -> ExamDraft {
        ExamDraft {
            exam_code: Some(code.to_string()),
            subject_id: Some(subject.to_string()),
            class_section_id: None,
            room_id: Some(room.to_string()),
            slot_id: Some("MORNING".to_string()),
            exam_date: Some("2025-06-01".to_string()),
            start_time: Some("7:00".to_string()),
            end_time: Some("09:30".to_string()),
            max_capacity: Some(30),
            exam_rules: None,
            notes: None,
        }
    }

    fn june_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[test]
    fn test_normalize_time() {
        assert_eq!(normalize_time("7:05").as_deref(), Some("07:05"));
        assert_eq!(normalize_time("23:59").as_deref(), Some("23:59"));
        assert_eq!(normalize_time("24:00"), None);
        assert_eq!(normalize_time("7:5"), None);
        assert_eq!(normalize_time("ab:cd"), None);
        assert_eq!(normalize_time("0930"), None);
    }

    #[test]
    fn test_parse_exam_date_truncates_instant() {
        assert_eq!(parse_exam_date("2025-06-01"), Some(june_first()));
        assert_eq!(parse_exam_date("2025-06-01T00:00:00.000Z"), Some(june_first()));
        assert_eq!(parse_exam_date("06/01/2025"), None);
    }

    #[test]
    fn test_parse_exam_date_rejects_trailing_garbage() {
        assert_eq!(parse_exam_date("2025-06-01garbage"), None);
        assert_eq!(parse_exam_date("2025-06-01 08:00"), None);
        assert_eq!(parse_exam_date("2025-6-1"), None);
        assert_eq!(parse_exam_date("T08:00"), None);

        let mut d = draft("EX-1", "SE001", "A102");
        d.exam_date = Some("2025-06-01garbage".to_string());
        let violations = validate_fields(&d).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field.as_deref(), Some("examDate"));
    }

    #[test]
    fn test_validate_fields_itemizes_errors() {
        let bad = ExamDraft {
            start_time: Some("10:00".to_string()),
            end_time: Some("09:00".to_string()),
            max_capacity: Some(0),
            ..Default::default()
        };
        let violations = validate_fields(&bad).unwrap_err();
        let fields: Vec<&str> = violations.iter().filter_map(|v| v.field.as_deref()).collect();
        for expected in ["examCode", "subjectId", "roomId", "slotId", "examDate", "endTime", "maxCapacity"] {
            assert!(fields.contains(&expected), "缺少字段错误: {}", expected);
        }
    }

    #[test]
    fn test_validate_fields_normalizes() {
        let exam = validate_fields(&draft("EX-1", "SE001", "A102")).unwrap();
        assert_eq!(exam.start_time, "07:00");
        assert_eq!(exam.exam_rules.as_deref(), Some(DEFAULT_EXAM_RULES));
        assert_eq!(exam.class_section_id, None);
    }

    #[test]
    fn test_creation_reports_both_conflicts() {
        let mut facts = MemoryFacts::campus();
        facts.add_exam("X", "SE001", Some("C1"), "A102", june_first(), "MORNING", ExamStatus::Scheduled);
        let validator = ExamValidator::new(Arc::new(facts));

        let err = validator
            .validate_creation(&draft("EX-2", "SE001", "A102"), StudentConflictStrategy::SubjectSlot)
            .unwrap_err();
        let types: Vec<&str> = err
            .violations()
            .iter()
            .map(|v| v.violation_type.as_str())
            .collect();
        assert_eq!(types, vec!["ROOM_CONFLICT", "SUBJECT_CONFLICT"]);
        assert!(err.to_string().contains("A102"));
    }

    #[test]
    fn test_creation_dangling_reference_is_not_found() {
        let validator = ExamValidator::new(Arc::new(MemoryFacts::campus()));
        let err = validator
            .validate_creation(&draft("EX-1", "SE001", "Z999"), StudentConflictStrategy::SubjectSlot)
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_creation_capacity_and_duplicate_code() {
        let mut facts = MemoryFacts::campus();
        facts.add_exam("X", "MA101", None, "A103", june_first(), "MORNING", ExamStatus::Scheduled);
        let validator = ExamValidator::new(Arc::new(facts));

        let mut d = draft("CODE-X", "SE001", "A102");
        d.max_capacity = Some(41);
        let err = validator
            .validate_creation(&d, StudentConflictStrategy::SubjectSlot)
            .unwrap_err();
        let fields: Vec<&str> = err
            .violations()
            .iter()
            .filter_map(|v| v.field.as_deref())
            .collect();
        assert_eq!(fields, vec!["examCode", "maxCapacity"]);
    }

    #[test]
    fn test_update_without_placement_change_skips_gates() {
        let mut facts = MemoryFacts::campus();
        let x = facts.add_exam("X", "SE001", Some("C1"), "A102", june_first(), "MORNING", ExamStatus::Scheduled);
        let validator = ExamValidator::new(Arc::new(facts));

        let patch = ExamPatch {
            notes: Some(Some("允许携带计算器".to_string())),
            max_capacity: Some(35),
            ..Default::default()
        };
        let validated = validator
            .validate_update(&x, &patch, StudentConflictStrategy::SubjectSlot)
            .unwrap();
        assert!(!validated.gates_ran);
        assert_eq!(validated.exam.max_capacity, 35);
    }

    #[test]
    fn test_update_moving_into_taken_room_conflicts() {
        let mut facts = MemoryFacts::campus();
        facts.add_exam("X", "SE001", Some("C1"), "A102", june_first(), "MORNING", ExamStatus::Scheduled);
        let y = facts.add_exam("Y", "MA101", Some("M1"), "A103", june_first(), "MORNING", ExamStatus::Scheduled);
        let validator = ExamValidator::new(Arc::new(facts));

        let patch = ExamPatch {
            room_id: Some("A102".to_string()),
            ..Default::default()
        };
        let err = validator
            .validate_update(&y, &patch, StudentConflictStrategy::SubjectSlot)
            .unwrap_err();
        assert_eq!(err.violations().len(), 1);
        assert_eq!(err.violations()[0].violation_type, "ROOM_CONFLICT");
    }

    #[test]
    fn test_update_reactivation_runs_gates_and_cancel_skips() {
        let mut facts = MemoryFacts::campus();
        facts.add_exam("X", "SE001", Some("C1"), "A102", june_first(), "MORNING", ExamStatus::Scheduled);
        let old = facts.add_exam("O", "MA101", Some("M1"), "A102", june_first(), "MORNING", ExamStatus::Cancelled);
        let validator = ExamValidator::new(Arc::new(facts));

        let reactivate = ExamPatch {
            status: Some(ExamStatus::Scheduled),
            ..Default::default()
        };
        let err = validator
            .validate_update(&old, &reactivate, StudentConflictStrategy::SubjectSlot)
            .unwrap_err();
        assert_eq!(err.violations()[0].violation_type, "ROOM_CONFLICT");

        let keep_cancelled = ExamPatch {
            notes: Some(Some("改期待定".to_string())),
            ..Default::default()
        };
        let validated = validator
            .validate_update(&old, &keep_cancelled, StudentConflictStrategy::SubjectSlot)
            .unwrap();
        assert!(!validated.gates_ran);
        assert_eq!(validated.status, ExamStatus::Cancelled);
    }

    #[test]
    fn test_per_student_strategy_via_validator() {
        let mut facts = MemoryFacts::campus();
        facts.add_student("S1", &[("C1", EnrollmentStatus::Active), ("M1", EnrollmentStatus::Active)]);
        facts.add_exam("X", "SE001", Some("C1"), "A102", june_first(), "MORNING", ExamStatus::Scheduled);
        let validator = ExamValidator::new(Arc::new(facts));

        let mut d = draft("EX-M", "MA101", "A103");
        d.class_section_id = Some("M1".to_string());

        assert!(validator
            .validate_creation(&d, StudentConflictStrategy::SubjectSlot)
            .is_ok());
        let err = validator
            .validate_creation(&d, StudentConflictStrategy::PerStudent)
            .unwrap_err();
        assert_eq!(err.violations()[0].violation_type, "STUDENT_CONFLICT");
    }
}
