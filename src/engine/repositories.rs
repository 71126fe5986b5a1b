// ==========================================
// 考试排期系统 - 引擎层事实读取
// ==========================================
// 职责: 定义引擎所需的只读事实接口，并由仓储聚合实现
// 说明: 冲突检测 / 校验 / 选课解析只依赖 ScheduleFactReader，
//       单元测试可用内存实现替换数据库
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::enrollment::StudentContact;
use crate::domain::exam::ExamView;
use crate::domain::reference::{ClassSection, Room, Subject, Timeslot};
use crate::repository::{
    EnrollmentRepository, ExamRepository, ReferenceRepository, RepositoryError, RepositoryResult,
};

// ==========================================
// ScheduleFactReader - 排期事实读取接口
// ==========================================

/// 排期事实读取接口
///
/// 所有考试查询均排除 CANCELLED，日期按自然日匹配
pub trait ScheduleFactReader: Send + Sync {
    /// 占用 (考场, 日期, 时段) 的考试，可排除一场（更新时的自身）
    fn find_exams_by_room_date_slot(
        &self,
        room_id: &str,
        exam_date: NaiveDate,
        slot_id: &str,
        exclude_exam_id: Option<&str>,
    ) -> RepositoryResult<Vec<ExamView>>;

    /// 同科目同日期同时段的考试
    fn find_exams_by_subject_date_slot(
        &self,
        subject_id: &str,
        exam_date: NaiveDate,
        slot_id: &str,
    ) -> RepositoryResult<Vec<ExamView>>;

    /// 某学生在 (日期, 时段) 需参加的考试（选课 → 教学班 → 考试）
    fn find_exams_for_student_at_slot(
        &self,
        student_id: &str,
        exam_date: NaiveDate,
        slot_id: &str,
    ) -> RepositoryResult<Vec<ExamView>>;

    /// 有效选课学生
    ///
    /// # 参数
    /// - `class_section_id`: Some → 该教学班; None → 讲授 subject_id 的全部教学班
    fn find_active_students(
        &self,
        class_section_id: Option<&str>,
        subject_id: &str,
    ) -> RepositoryResult<Vec<StudentContact>>;

    fn find_exam(&self, exam_id: &str) -> RepositoryResult<Option<ExamView>>;
    fn find_exam_by_code(&self, exam_code: &str) -> RepositoryResult<Option<ExamView>>;
    fn find_subject(&self, subject_id: &str) -> RepositoryResult<Option<Subject>>;
    fn find_room(&self, room_id: &str) -> RepositoryResult<Option<Room>>;
    fn find_timeslot(&self, slot_id: &str) -> RepositoryResult<Option<Timeslot>>;
    fn find_class_section(&self, class_section_id: &str) -> RepositoryResult<Option<ClassSection>>;

    /// 按考试ID解析需通知的学生
    ///
    /// # 返回
    /// - Err(NotFound): 考试不存在
    fn resolve_enrolled_students(&self, exam_id: &str) -> RepositoryResult<Vec<StudentContact>> {
        let exam = self
            .find_exam(exam_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "Exam".to_string(),
                id: exam_id.to_string(),
            })?;
        self.find_active_students(exam.exam.class_section_id.as_deref(), &exam.exam.subject_id)
    }
}

// ==========================================
// ExamRepositories - 仓储聚合
// ==========================================

/// 排期仓储集合
///
/// 聚合引擎所需的全部 Repository，简化依赖注入
#[derive(Clone)]
pub struct ExamRepositories {
    pub exam_repo: Arc<ExamRepository>,
    pub enrollment_repo: Arc<EnrollmentRepository>,
    pub reference_repo: Arc<ReferenceRepository>,
}

impl ExamRepositories {
    pub fn new(
        exam_repo: Arc<ExamRepository>,
        enrollment_repo: Arc<EnrollmentRepository>,
        reference_repo: Arc<ReferenceRepository>,
    ) -> Self {
        Self {
            exam_repo,
            enrollment_repo,
            reference_repo,
        }
    }
}

impl ScheduleFactReader for ExamRepositories {
    fn find_exams_by_room_date_slot(
        &self,
        room_id: &str,
        exam_date: NaiveDate,
        slot_id: &str,
        exclude_exam_id: Option<&str>,
    ) -> RepositoryResult<Vec<ExamView>> {
        self.exam_repo
            .find_by_room_date_slot(room_id, exam_date, slot_id, exclude_exam_id)
    }

    fn find_exams_by_subject_date_slot(
        &self,
        subject_id: &str,
        exam_date: NaiveDate,
        slot_id: &str,
    ) -> RepositoryResult<Vec<ExamView>> {
        self.exam_repo
            .find_by_subject_date_slot(subject_id, exam_date, slot_id)
    }

    fn find_exams_for_student_at_slot(
        &self,
        student_id: &str,
        exam_date: NaiveDate,
        slot_id: &str,
    ) -> RepositoryResult<Vec<ExamView>> {
        self.exam_repo
            .find_for_student_at_slot(student_id, exam_date, slot_id)
    }

    fn find_active_students(
        &self,
        class_section_id: Option<&str>,
        subject_id: &str,
    ) -> RepositoryResult<Vec<StudentContact>> {
        match class_section_id {
            Some(section) => self.enrollment_repo.find_active_students_by_section(section),
            None => self.enrollment_repo.find_active_students_by_subject(subject_id),
        }
    }

    fn find_exam(&self, exam_id: &str) -> RepositoryResult<Option<ExamView>> {
        self.exam_repo.find_by_id(exam_id)
    }

    fn find_exam_by_code(&self, exam_code: &str) -> RepositoryResult<Option<ExamView>> {
        self.exam_repo.find_by_code(exam_code)
    }

    fn find_subject(&self, subject_id: &str) -> RepositoryResult<Option<Subject>> {
        self.reference_repo.find_subject(subject_id)
    }

    fn find_room(&self, room_id: &str) -> RepositoryResult<Option<Room>> {
        self.reference_repo.find_room(room_id)
    }

    fn find_timeslot(&self, slot_id: &str) -> RepositoryResult<Option<Timeslot>> {
        self.reference_repo.find_timeslot(slot_id)
    }

    fn find_class_section(&self, class_section_id: &str) -> RepositoryResult<Option<ClassSection>> {
        self.reference_repo.find_class_section(class_section_id)
    }
}
