// ==========================================
// 考试排期系统 - 考试管理 API
// ==========================================
// 职责: 考试增删改查、报名、学生考试安排
// 流程: 校验（持 SlotKey 锁）→ 写入 → 异步通知
// 规则: 通知失败只记日志，不影响已提交的变更
// ==========================================

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use chrono::Local;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult, ValidationViolation};
use crate::api::validator::{validate_fields, ExamValidator};
use crate::config::ConfigManager;
use crate::domain::exam::{Exam, ExamDraft, ExamFilter, ExamPage, ExamPatch, ExamView};
use crate::domain::registration::{RegistrationRequest, StudentExamEntry, StudentExamRegistration};
use crate::domain::types::{ExamAction, ExamStatus, StudentConflictStrategy};
use crate::engine::conflict::ConflictKind;
use crate::engine::notification::NotificationDispatcher;
use crate::engine::slot_lock::SlotLockMap;
use crate::repository::{
    ExamRepository, ReferenceRepository, RegistrationRepository, RepositoryError,
};

/// 列表单页上限
pub const MAX_PAGE_SIZE: u32 = 100;

/// 删除结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    /// 删除前快照
    pub exam: ExamView,
    pub removed_registrations: usize,
}

// ==========================================
// ExamApi - 考试管理 API
// ==========================================

/// 考试管理API
///
/// 职责：
/// 1. 考试创建/更新/删除（校验 + 冲突检查 + 通知）
/// 2. 考试查询（单条、分页列表、学生个人安排）
/// 3. 考生报名
pub struct ExamApi {
    exam_repo: Arc<ExamRepository>,
    registration_repo: Arc<RegistrationRepository>,
    reference_repo: Arc<ReferenceRepository>,
    validator: Arc<ExamValidator>,
    dispatcher: Arc<NotificationDispatcher>,
    config_manager: Arc<ConfigManager>,
    slot_locks: Arc<SlotLockMap>,
}

impl ExamApi {
    /// 创建新的ExamApi实例
    pub fn new(
        exam_repo: Arc<ExamRepository>,
        registration_repo: Arc<RegistrationRepository>,
        reference_repo: Arc<ReferenceRepository>,
        validator: Arc<ExamValidator>,
        dispatcher: Arc<NotificationDispatcher>,
        config_manager: Arc<ConfigManager>,
        slot_locks: Arc<SlotLockMap>,
    ) -> Self {
        Self {
            exam_repo,
            registration_repo,
            reference_repo,
            validator,
            dispatcher,
            config_manager,
            slot_locks,
        }
    }

    /// 当前配置的学生冲突判定策略（读取失败回退默认）
    pub fn conflict_strategy(&self) -> StudentConflictStrategy {
        self.config_manager
            .get_student_conflict_strategy()
            .unwrap_or_else(|e| {
                tracing::warn!("读取学生冲突策略失败: {}，使用默认策略", e);
                StudentConflictStrategy::default()
            })
    }

    // ==========================================
    // 变更入口
    // ==========================================

    /// 创建考试（使用配置的冲突策略）
    pub fn create_exam(&self, draft: &ExamDraft, operator: &str) -> ApiResult<ExamView> {
        self.create_exam_with(draft, operator, self.conflict_strategy())
    }

    /// 创建考试
    ///
    /// # 参数
    /// - draft: 考试数据
    /// - operator: 操作人（写入审计字段）
    /// - strategy: 学生冲突判定策略
    ///
    /// # 返回
    /// - Ok(ExamView): 新建的考试
    /// - Err(ValidationFailed): 字段错误或冲突，未写入
    /// - Err(NotFound): 引用数据不存在
    pub fn create_exam_with(
        &self,
        draft: &ExamDraft,
        operator: &str,
        strategy: StudentConflictStrategy,
    ) -> ApiResult<ExamView> {
        let keys: Vec<_> = validate_fields(draft)
            .map(|exam| vec![exam.slot_key()])
            .unwrap_or_default();

        let exam_id = {
            let _guard = self.slot_locks.acquire(&keys);
            let new_exam = self.validator.validate_creation(draft, strategy)?;

            let now = Local::now().naive_local();
            let exam = Exam {
                exam_id: Uuid::new_v4().to_string(),
                exam_code: new_exam.exam_code,
                subject_id: new_exam.subject_id,
                class_section_id: new_exam.class_section_id,
                room_id: new_exam.room_id,
                slot_id: new_exam.slot_id,
                exam_date: new_exam.exam_date,
                start_time: new_exam.start_time,
                end_time: new_exam.end_time,
                max_capacity: new_exam.max_capacity,
                exam_rules: new_exam.exam_rules,
                notes: new_exam.notes,
                status: ExamStatus::Scheduled,
                created_by: Some(operator.to_string()),
                updated_by: Some(operator.to_string()),
                created_at: now,
                updated_at: now,
            };

            self.exam_repo
                .insert(&exam)
                .map_err(|e| map_write_error(e, &exam))?;
            exam.exam_id
        };

        let view = self.load_exam(&exam_id)?;
        tracing::info!(
            "考试已创建: exam_id={}, exam_code={}, room={}, date={}, slot={}, operator={}",
            view.exam.exam_id,
            view.exam.exam_code,
            view.room_label(),
            view.exam.exam_date,
            view.slot_label(),
            operator
        );

        self.notify_async(view.clone(), ExamAction::Created);
        Ok(view)
    }

    /// 更新考试（使用配置的冲突策略）
    pub fn update_exam(&self, exam_id: &str, patch: &ExamPatch, operator: &str) -> ApiResult<ExamView> {
        self.update_exam_with(exam_id, patch, operator, self.conflict_strategy())
    }

    /// 更新考试（部分字段）
    ///
    /// # 返回
    /// - Ok(ExamView): 更新后的考试
    /// - Err(NotFound): 考试不存在
    /// - Err(ValidationFailed): 合并后字段错误或冲突，未写入
    pub fn update_exam_with(
        &self,
        exam_id: &str,
        patch: &ExamPatch,
        operator: &str,
        strategy: StudentConflictStrategy,
    ) -> ApiResult<ExamView> {
        let before = self.load_exam(exam_id)?;

        // 同时锁定旧位置与新位置
        let mut keys = vec![before.exam.slot_key()];
        if let Ok(merged) = validate_fields(&patch.merge_onto(&before.exam)) {
            keys.push(merged.slot_key());
        }

        {
            let _guard = self.slot_locks.acquire(&keys);
            // 锁内重读，基于最新状态校验
            let current = self.load_exam(exam_id)?;
            let validated = self.validator.validate_update(&current, patch, strategy)?;
            let new_exam = validated.exam;

            let exam = Exam {
                exam_id: current.exam.exam_id.clone(),
                exam_code: new_exam.exam_code,
                subject_id: new_exam.subject_id,
                class_section_id: new_exam.class_section_id,
                room_id: new_exam.room_id,
                slot_id: new_exam.slot_id,
                exam_date: new_exam.exam_date,
                start_time: new_exam.start_time,
                end_time: new_exam.end_time,
                max_capacity: new_exam.max_capacity,
                exam_rules: new_exam.exam_rules,
                notes: new_exam.notes,
                status: validated.status,
                created_by: current.exam.created_by.clone(),
                updated_by: Some(operator.to_string()),
                created_at: current.exam.created_at,
                updated_at: Local::now().naive_local(),
            };

            self.exam_repo
                .update(&exam)
                .map_err(|e| map_write_error(e, &exam))?;

            tracing::debug!(
                "考试更新写入: exam_id={}, gates_ran={}",
                exam.exam_id,
                validated.gates_ran
            );
        }

        let view = self.load_exam(exam_id)?;
        tracing::info!(
            "考试已更新: exam_id={}, exam_code={}, status={}, operator={}",
            view.exam.exam_id,
            view.exam.exam_code,
            view.exam.status,
            operator
        );

        self.notify_async(view.clone(), ExamAction::Updated);
        Ok(view)
    }

    /// 删除考试（硬删除，报名记录一并删除）
    ///
    /// # 返回
    /// - Ok(DeleteOutcome): 删除前快照与删除的报名数
    /// - Err(NotFound): 考试不存在
    pub fn delete_exam(&self, exam_id: &str, operator: &str) -> ApiResult<DeleteOutcome> {
        let snapshot = self.load_exam(exam_id)?;
        let removed_registrations = self.exam_repo.delete(exam_id)?;

        tracing::info!(
            "考试已删除: exam_id={}, exam_code={}, removed_registrations={}, operator={}",
            snapshot.exam.exam_id,
            snapshot.exam.exam_code,
            removed_registrations,
            operator
        );

        self.notify_async(snapshot.clone(), ExamAction::Deleted);
        Ok(DeleteOutcome {
            exam: snapshot,
            removed_registrations,
        })
    }

    // ==========================================
    // 查询入口
    // ==========================================

    /// 查询单个考试
    pub fn get_exam(&self, exam_id: &str) -> ApiResult<ExamView> {
        if exam_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("考试ID不能为空".to_string()));
        }
        self.load_exam(exam_id)
    }

    /// 分页查询考试
    pub fn list_exams(&self, filter: &ExamFilter) -> ApiResult<ExamPage> {
        if filter.page == 0 {
            return Err(ApiError::InvalidInput("页码从 1 开始".to_string()));
        }
        if filter.page_size == 0 || filter.page_size > MAX_PAGE_SIZE {
            return Err(ApiError::InvalidInput(format!(
                "每页条数必须在 1-{} 之间",
                MAX_PAGE_SIZE
            )));
        }
        if let (Some(from), Some(to)) = (filter.date_from, filter.date_to) {
            if from > to {
                return Err(ApiError::InvalidInput(format!(
                    "日期范围无效: {} > {}",
                    from, to
                )));
            }
        }

        let data = self.exam_repo.list(filter)?;
        let total = self.exam_repo.count(filter)?;
        Ok(ExamPage::new(data, total, filter.page, filter.page_size))
    }

    /// 查询学生的考试安排
    pub fn list_student_exams(&self, student_id: &str) -> ApiResult<Vec<StudentExamEntry>> {
        if self.reference_repo.find_student(student_id)?.is_none() {
            return Err(ApiError::NotFound(format!("学生(id={})不存在", student_id)));
        }
        Ok(self.registration_repo.find_for_student(student_id)?)
    }

    /// 学生报名考试
    ///
    /// # 返回
    /// - Err(Conflict): 重复报名或名额已满
    /// - Err(NotFound): 考试或学生不存在
    pub fn register_student(
        &self,
        exam_id: &str,
        request: &RegistrationRequest,
    ) -> ApiResult<StudentExamRegistration> {
        if request.student_id.trim().is_empty() {
            return Err(ApiError::invalid_field("studentId", "学生不能为空"));
        }

        let exam = self.load_exam(exam_id)?;
        if exam.exam.status.is_cancelled() {
            return Err(ApiError::invalid_field(
                "examId",
                format!("考试 {} 已取消，不能报名", exam.exam.exam_code),
            ));
        }

        let registration = self.registration_repo.register(exam_id, request)?;
        tracing::info!(
            "学生报名: exam_code={}, student_id={}, registration_no={}",
            exam.exam.exam_code,
            registration.student_id,
            registration.registration_no
        );
        Ok(registration)
    }

    /// 查询考试的报名记录
    pub fn list_registrations(&self, exam_id: &str) -> ApiResult<Vec<StudentExamRegistration>> {
        self.load_exam(exam_id)?;
        Ok(self.registration_repo.list_by_exam(exam_id)?)
    }

    // ==========================================
    // 内部方法
    // ==========================================

    fn load_exam(&self, exam_id: &str) -> ApiResult<ExamView> {
        self.exam_repo
            .find_by_id(exam_id)?
            .ok_or_else(|| ApiError::NotFound(format!("考试(id={})不存在", exam_id)))
    }

    /// 异步分发通知
    ///
    /// 有 tokio 运行时则投递到阻塞线程池，否则在当前线程执行
    fn notify_async(&self, exam: ExamView, action: ExamAction) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let job = move || match dispatcher.dispatch(&exam, action) {
            Ok(report) => tracing::debug!(
                "通知分发完成: exam_id={}, action={}, affected={}, pushed={}, failed={}",
                exam.exam.exam_id,
                action,
                report.affected,
                report.pushed,
                report.failed
            ),
            Err(e) => tracing::warn!(
                "通知分发失败: exam_id={}, action={}, error={}",
                exam.exam.exam_id,
                action,
                e
            ),
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(job);
            }
            Err(_) => job(),
        }
    }
}

/// 写入错误映射: 唯一索引冲突按校验错误返回
fn map_write_error(err: RepositoryError, exam: &Exam) -> ApiError {
    if err.is_slot_occupied() {
        let reason = format!(
            "考场冲突: 考场 {} 在 {} 的该时段已被其他考试占用",
            exam.room_id, exam.exam_date
        );
        return ApiError::ValidationFailed {
            reason: reason.clone(),
            violations: vec![ValidationViolation {
                violation_type: ConflictKind::Room.as_str().to_string(),
                field: None,
                reason,
                details: None,
            }],
        };
    }
    if err.is_exam_code_taken() {
        return ApiError::invalid_field("examCode", format!("考试编号 {} 已存在", exam.exam_code));
    }
    err.into()
}
