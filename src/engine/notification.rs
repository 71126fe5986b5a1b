// ==========================================
// 考试排期系统 - 通知分发器
// ==========================================
// 职责: 按变更动作组装通知，推送到受影响学生的在线连接
// 规则:
// - 逐个学生独立投递，单个失败不影响其他学生，也不回滚考试变更
// - 未配置实时通道时降级为仅记录日志，pushed = 0 与 affected = 0 区分
// - 投递为一次性内存推送，离线学生不补发
// ==========================================

use crate::domain::enrollment::StudentContact;
use crate::domain::exam::{ExamSummary, ExamView};
use crate::domain::types::ExamAction;
use crate::engine::enrollment_resolver::EnrollmentResolver;
use crate::engine::events::{OptionalPushChannel, EXAM_NOTIFICATION_EVENT};
use crate::repository::RepositoryResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 科目名缺失时的占位
const FALLBACK_SUBJECT: &str = "您的科目";

/// 按动作生成 (标题, 正文)
pub fn compose_message(action: ExamAction, subject_name: Option<&str>) -> (String, String) {
    let subject = subject_name.unwrap_or(FALLBACK_SUBJECT);
    match action {
        ExamAction::Created => (
            "新考试安排".to_string(),
            format!("{} 已安排新的考试", subject),
        ),
        ExamAction::Updated => (
            "考试安排已更新".to_string(),
            format!("{} 的考试安排已更新", subject),
        ),
        ExamAction::Deleted => (
            "考试已取消".to_string(),
            format!("{} 的考试已取消", subject),
        ),
    }
}

// ==========================================
// 通知载荷 / 分发报告
// ==========================================

/// exam-notification 事件载荷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamNotification {
    pub title: String,
    pub body: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub action: ExamAction,
    pub exam_summary: ExamSummary,
    pub timestamp: DateTime<Utc>,
}

impl ExamNotification {
    pub fn build(exam: &ExamView, action: ExamAction) -> Self {
        let (title, body) = compose_message(action, exam.subject_name.as_deref());
        Self {
            title,
            body,
            notification_type: EXAM_NOTIFICATION_EVENT.to_string(),
            action,
            exam_summary: exam.summary(),
            timestamp: Utc::now(),
        }
    }
}

/// 分发结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationReport {
    pub action: ExamAction,
    /// 受影响学生数（与在线人数无关）
    pub affected: usize,
    /// 至少一个在线连接收到推送的学生数
    pub pushed: usize,
    /// 送达的连接总数
    pub reached_connections: usize,
    /// 推送出错的学生数
    pub failed: usize,
    pub channel_available: bool,
    /// 脱敏学生列表（id / 学号 / 姓名 / 邮箱）
    pub students: Vec<StudentContact>,
}

// ==========================================
// NotificationDispatcher - 通知分发器
// ==========================================
pub struct NotificationDispatcher {
    resolver: EnrollmentResolver,
    channel: OptionalPushChannel,
}

impl NotificationDispatcher {
    /// # 参数
    /// - `channel`: 可选实时通道；OptionalPushChannel::none() 表示仅记录日志
    pub fn new(resolver: EnrollmentResolver, channel: OptionalPushChannel) -> Self {
        Self { resolver, channel }
    }

    pub fn channel_available(&self) -> bool {
        self.channel.is_configured()
    }

    /// 分发考试变更通知
    ///
    /// # 参数
    /// - `exam`: 变更后的考试（删除时为删除前快照）
    /// - `action`: 变更动作
    ///
    /// # 返回
    /// - Ok(NotificationReport): 投递失败只计入 failed，不返回错误
    /// - Err: 解析受影响学生失败
    pub fn dispatch(
        &self,
        exam: &ExamView,
        action: ExamAction,
    ) -> RepositoryResult<NotificationReport> {
        let students = self.resolver.resolve(&exam.exam)?;

        let mut report = NotificationReport {
            action,
            affected: students.len(),
            pushed: 0,
            reached_connections: 0,
            failed: 0,
            channel_available: self.channel.is_configured(),
            students: Vec::new(),
        };

        if students.is_empty() {
            tracing::info!("考试 {} 无需通知的学生", exam.exam.exam_code);
            return Ok(report);
        }

        let notification = ExamNotification::build(exam, action);
        tracing::info!(
            "考试通知: action={}, students={}, title={}, body={}, exam={} - {}, date={} {}-{}, room={}",
            action,
            students.len(),
            notification.title,
            notification.body,
            exam.exam.exam_code,
            notification.exam_summary.subject,
            exam.exam.exam_date,
            exam.exam.start_time,
            exam.exam.end_time,
            notification.exam_summary.room
        );

        match self.channel.channel() {
            None => {
                tracing::warn!(
                    "实时通道未配置，考试 {} 的通知仅记录日志",
                    exam.exam.exam_code
                );
            }
            Some(channel) => {
                let payload = match serde_json::to_value(&notification) {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!("通知载荷序列化失败: {}", e);
                        report.failed = students.len();
                        report.students = students;
                        return Ok(report);
                    }
                };

                for student in &students {
                    match channel.send_to_user(&student.student_id, EXAM_NOTIFICATION_EVENT, &payload)
                    {
                        Ok(0) => {
                            tracing::debug!("学生 {} 当前不在线", student.student_id);
                        }
                        Ok(reached) => {
                            report.pushed += 1;
                            report.reached_connections += reached;
                        }
                        Err(e) => {
                            report.failed += 1;
                            tracing::warn!("推送失败: student_id={}, error={}", student.student_id, e);
                        }
                    }
                }

                tracing::info!(
                    "考试 {} 通知已推送: 在线 {}/{} 名学生, 连接 {}",
                    exam.exam.exam_code,
                    report.pushed,
                    report.affected,
                    report.reached_connections
                );
            }
        }

        report.students = students;
        Ok(report)
    }
}
