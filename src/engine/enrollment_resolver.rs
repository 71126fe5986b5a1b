// ==========================================
// 考试排期系统 - 选课解析器
// ==========================================
// 职责: 由考试推导需通知的学生集合
// 规则: 绑定教学班 → 该班有效选课学生
//       未绑定 → 讲授该科目的全部教学班的有效选课学生（并集）
// 说明: 按考试字段解析而非按ID回查，删除后的通知也能使用
// ==========================================

use crate::domain::enrollment::StudentContact;
use crate::domain::exam::Exam;
use crate::engine::repositories::ScheduleFactReader;
use crate::repository::RepositoryResult;
use std::collections::HashSet;
use std::sync::Arc;

pub struct EnrollmentResolver {
    facts: Arc<dyn ScheduleFactReader>,
}

impl EnrollmentResolver {
    pub fn new(facts: Arc<dyn ScheduleFactReader>) -> Self {
        Self { facts }
    }

    /// 解析考试的受影响学生（按 student_id 去重，保持首次出现顺序）
    pub fn resolve(&self, exam: &Exam) -> RepositoryResult<Vec<StudentContact>> {
        let students = self
            .facts
            .find_active_students(exam.class_section_id.as_deref(), &exam.subject_id)?;

        let mut seen = HashSet::new();
        let resolved: Vec<StudentContact> = students
            .into_iter()
            .filter(|s| seen.insert(s.student_id.clone()))
            .collect();

        tracing::debug!(
            "选课解析: exam_id={}, class_section={:?}, subject={}, students={}",
            exam.exam_id,
            exam.class_section_id,
            exam.subject_id,
            resolved.len()
        );
        Ok(resolved)
    }
}
