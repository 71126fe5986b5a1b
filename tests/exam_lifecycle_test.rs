// ==========================================
// ExamApi 生命周期 集成测试
// ==========================================
// 测试范围:
// 1. 创建/查询: 审计字段、关联展示字段、默认考场规则
// 2. 列表: 条件过滤、分页、排序、参数校验
// 3. 报名: 准考证号生成、重复报名、名额上限、取消考试
// 4. 学生考试安排
// 5. 删除: 报名记录一并删除
// ==========================================

mod helpers;

use chrono::NaiveDate;

use exam_scheduler::api::ApiError;
use exam_scheduler::domain::exam::ExamFilter;
use exam_scheduler::domain::registration::RegistrationRequest;
use exam_scheduler::domain::types::{ExamStatus, RegistrationStatus};
use exam_scheduler::domain::DEFAULT_EXAM_RULES;
use helpers::api_test_helper::ApiTestEnv;
use helpers::test_data_builder::{set_status, ExamDraftBuilder};
use test_helpers::*;

fn register(env: &ApiTestEnv, exam_id: &str, student_id: &str) -> Result<String, ApiError> {
    let request = RegistrationRequest {
        student_id: student_id.to_string(),
        ..Default::default()
    };
    env.exam_api
        .register_student(exam_id, &request)
        .map(|r| r.registration_no)
}

// ==========================================
// 创建与查询
// ==========================================

#[test]
fn test_create_exam_fills_audit_and_display_fields() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");

    let view = env
        .exam_api
        .create_exam(
            &ExamDraftBuilder::new("SE-FINAL").section(SECTION_SE_1).build(),
            "admin",
        )
        .expect("创建考试失败");

    assert!(!view.exam.exam_id.is_empty());
    assert_eq!(view.exam.status, ExamStatus::Scheduled);
    assert_eq!(view.exam.created_by.as_deref(), Some("admin"));
    assert_eq!(view.exam.exam_rules.as_deref(), Some(DEFAULT_EXAM_RULES));
    assert_eq!(view.subject_name.as_deref(), Some("软件工程"));
    assert_eq!(view.class_name.as_deref(), Some("软件工程 1 班"));
    assert_eq!(view.room_capacity, Some(40));
    assert_eq!(view.slot_name.as_deref(), Some("Morning"));
    assert_eq!(view.registered_students, 0);

    let fetched = env.exam_api.get_exam(view.exam_id()).unwrap();
    assert_eq!(fetched, view);
}

#[test]
fn test_get_exam_errors() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    assert!(matches!(env.exam_api.get_exam("nope"), Err(ApiError::NotFound(_))));
    assert!(matches!(env.exam_api.get_exam("  "), Err(ApiError::InvalidInput(_))));
}

// ==========================================
// 列表查询
// ==========================================

fn seed_exams(env: &ApiTestEnv) {
    let drafts = [
        ExamDraftBuilder::new("SE-MID").date("2025-06-01").build(),
        ExamDraftBuilder::new("SE-FINAL").date("2025-06-20").build(),
        ExamDraftBuilder::new("MA-MID")
            .subject(SUBJECT_MA)
            .room(ROOM_A103)
            .date("2025-06-05")
            .build(),
        ExamDraftBuilder::new("MA-FINAL")
            .subject(SUBJECT_MA)
            .room(ROOM_A103)
            .date("2025-06-25")
            .build(),
    ];
    for draft in &drafts {
        env.exam_api.create_exam(draft, "admin").expect("准备考试失败");
    }
}

#[test]
fn test_list_exams_filters_and_paging() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    seed_exams(&env);

    let all = env.exam_api.list_exams(&ExamFilter::default()).unwrap();
    assert_eq!(all.total, 4);
    assert_eq!(all.data[0].exam.exam_code, "MA-FINAL", "默认按日期倒序");

    let by_subject = env
        .exam_api
        .list_exams(&ExamFilter {
            subject_id: Some(SUBJECT_MA.to_string()),
            sort_ascending: true,
            ..Default::default()
        })
        .unwrap();
    let codes: Vec<_> = by_subject.data.iter().map(|v| v.exam.exam_code.as_str()).collect();
    assert_eq!(codes, vec!["MA-MID", "MA-FINAL"]);

    let by_range = env
        .exam_api
        .list_exams(&ExamFilter {
            date_from: NaiveDate::from_ymd_opt(2025, 6, 2),
            date_to: NaiveDate::from_ymd_opt(2025, 6, 21),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(by_range.total, 2);

    let by_keyword = env
        .exam_api
        .list_exams(&ExamFilter {
            keyword: Some("final".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(by_keyword.total, 2);

    let second_page = env
        .exam_api
        .list_exams(&ExamFilter {
            page: 2,
            page_size: 3,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(second_page.total, 4);
    assert_eq!(second_page.total_pages, 2);
    assert_eq!(second_page.data.len(), 1);
    assert_eq!(second_page.data[0].exam.exam_code, "SE-MID");
}

#[test]
fn test_list_exams_status_filter() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    seed_exams(&env);

    let page = env.exam_api.list_exams(&ExamFilter::default()).unwrap();
    let target = page.data[0].exam_id().to_string();
    env.exam_api
        .update_exam(&target, &set_status(ExamStatus::Cancelled), "admin")
        .unwrap();

    let cancelled = env
        .exam_api
        .list_exams(&ExamFilter {
            status: Some(ExamStatus::Cancelled),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(cancelled.total, 1);
    assert_eq!(cancelled.data[0].exam_id(), target);
}

#[test]
fn test_list_exams_rejects_bad_paging() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");

    for filter in [
        ExamFilter { page: 0, ..Default::default() },
        ExamFilter { page_size: 0, ..Default::default() },
        ExamFilter { page_size: 101, ..Default::default() },
        ExamFilter {
            date_from: NaiveDate::from_ymd_opt(2025, 7, 1),
            date_to: NaiveDate::from_ymd_opt(2025, 6, 1),
            ..Default::default()
        },
    ] {
        assert!(matches!(
            env.exam_api.list_exams(&filter),
            Err(ApiError::InvalidInput(_))
        ));
    }
}

// ==========================================
// 报名
// ==========================================

#[test]
fn test_register_generates_numbers_and_counts() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let exam = env
        .exam_api
        .create_exam(&ExamDraftBuilder::new("SE-FINAL").build(), "admin")
        .unwrap();

    assert_eq!(register(&env, exam.exam_id(), "S1").unwrap(), "SE-FINAL-0001");
    assert_eq!(register(&env, exam.exam_id(), "S2").unwrap(), "SE-FINAL-0002");

    let custom = env
        .exam_api
        .register_student(
            exam.exam_id(),
            &RegistrationRequest {
                student_id: "S3".to_string(),
                registration_no: Some("SBD-777".to_string()),
                seat_number: Some("12".to_string()),
            },
        )
        .unwrap();
    assert_eq!(custom.registration_no, "SBD-777");
    assert_eq!(custom.status, RegistrationStatus::Registered);

    let view = env.exam_api.get_exam(exam.exam_id()).unwrap();
    assert_eq!(view.registered_students, 3, "报名人数读取时计算");

    let registrations = env.exam_api.list_registrations(exam.exam_id()).unwrap();
    assert_eq!(registrations.len(), 3);
}

#[test]
fn test_register_rejections() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let exam = env
        .exam_api
        .create_exam(&ExamDraftBuilder::new("SE-TINY").capacity(2).build(), "admin")
        .unwrap();

    register(&env, exam.exam_id(), "S1").unwrap();
    assert!(matches!(
        register(&env, exam.exam_id(), "S1"),
        Err(ApiError::Conflict(_))
    ));

    register(&env, exam.exam_id(), "S2").unwrap();
    let full = register(&env, exam.exam_id(), "S3").unwrap_err();
    assert!(matches!(full, ApiError::Conflict(_)), "名额已满: {:?}", full);

    assert!(matches!(
        register(&env, exam.exam_id(), "GHOST"),
        Err(ApiError::NotFound(_))
    ));
    assert!(matches!(
        register(&env, "missing-exam", "S1"),
        Err(ApiError::NotFound(_))
    ));

    let blank = register(&env, exam.exam_id(), " ").unwrap_err();
    assert_eq!(blank.violations()[0].field.as_deref(), Some("studentId"));
}

#[test]
fn test_register_on_cancelled_exam_rejected() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let exam = env
        .exam_api
        .create_exam(&ExamDraftBuilder::new("SE-C").build(), "admin")
        .unwrap();
    env.exam_api
        .update_exam(exam.exam_id(), &set_status(ExamStatus::Cancelled), "admin")
        .unwrap();

    let err = register(&env, exam.exam_id(), "S1").unwrap_err();
    assert!(matches!(err, ApiError::ValidationFailed { .. }));
}

#[test]
fn test_student_schedule_lists_registered_exams() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    seed_exams(&env);
    let page = env
        .exam_api
        .list_exams(&ExamFilter {
            sort_ascending: true,
            ..Default::default()
        })
        .unwrap();

    for view in page.data.iter().take(2) {
        register(&env, view.exam_id(), "S1").unwrap();
    }

    let schedule = env.exam_api.list_student_exams("S1").unwrap();
    assert_eq!(schedule.len(), 2);
    assert_eq!(schedule[0].exam.exam.exam_code, "SE-MID");
    assert_eq!(schedule[0].registration_no, "SE-MID-0001");
    assert!(schedule[0].exam.exam.exam_date < schedule[1].exam.exam.exam_date);

    assert!(env.exam_api.list_student_exams("S2").unwrap().is_empty());
    assert!(matches!(
        env.exam_api.list_student_exams("GHOST"),
        Err(ApiError::NotFound(_))
    ));
}

// ==========================================
// 删除
// ==========================================

#[test]
fn test_delete_removes_exam_and_registrations() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let exam = env
        .exam_api
        .create_exam(&ExamDraftBuilder::new("SE-DEL").build(), "admin")
        .unwrap();
    register(&env, exam.exam_id(), "S1").unwrap();
    register(&env, exam.exam_id(), "S2").unwrap();

    let outcome = env.exam_api.delete_exam(exam.exam_id(), "admin").unwrap();
    assert_eq!(outcome.removed_registrations, 2);
    assert_eq!(outcome.exam.exam.exam_code, "SE-DEL");

    assert_eq!(env.count("exam"), 0);
    assert_eq!(env.count("student_exam"), 0);
    assert!(matches!(
        env.exam_api.delete_exam(exam.exam_id(), "admin"),
        Err(ApiError::NotFound(_))
    ));

    // 时段已释放
    env.exam_api
        .create_exam(&ExamDraftBuilder::new("SE-NEW").build(), "admin")
        .expect("删除后时段应可再用");
}
