// ==========================================
// 考试排期系统 - 引擎层
// ==========================================
// 职责: 冲突检测、选课解析、通知分发, 不拼 SQL
// 红线: 所有冲突判定必须输出可展示的 message
// ==========================================

pub mod conflict;
pub mod enrollment_resolver;
pub mod events;
pub mod notification;
pub mod repositories;
pub mod slot_lock;

// 重导出核心引擎
pub use conflict::{ConflictCheck, ConflictDetector, ConflictKind, SlotPlacement};
pub use enrollment_resolver::EnrollmentResolver;
pub use events::{OptionalPushChannel, UserPushChannel, EXAM_NOTIFICATION_EVENT};
pub use notification::{compose_message, ExamNotification, NotificationDispatcher, NotificationReport};
pub use repositories::{ExamRepositories, ScheduleFactReader};
pub use slot_lock::{SlotLockGuard, SlotLockMap};
