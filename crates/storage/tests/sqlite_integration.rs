use assessment_core::model::{
    AnsweredQuestion, Assessment, AssessmentId, AssessmentSettings, AttemptDraft, OptionId,
    Question, QuestionId, QuestionOption, QuestionOrdering, RandomDraw, User, UserId,
};
use assessment_core::time::fixed_now;
use chrono::Duration;
use storage::repository::{
    AnswerRepository, AssessmentRepository, AttemptRepository, QuestionRepository, StorageError,
    UserRepository,
};
use storage::sqlite::SqliteRepository;
use uuid::Uuid;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn build_question(id: u64) -> Question {
    Question::new(
        QuestionId::new(id),
        format!("question {id}"),
        (1..=3)
            .map(|k| {
                QuestionOption::new(
                    OptionId::new(id * 3 + k),
                    format!("Answer #{k} for Question #{id}"),
                    k == 2,
                )
            })
            .collect(),
    )
    .unwrap()
}

async fn seed_assessment(repo: &SqliteRepository, ordering: QuestionOrdering) -> Assessment {
    let user = repo
        .insert_new_user(&User::new(UserId::new(0), Uuid::new_v4(), User::DEFAULT_TITLE).unwrap())
        .await
        .unwrap();
    for id in 0..3 {
        repo.upsert_question(&build_question(id)).await.unwrap();
    }
    let settings = AssessmentSettings::new(1, 3, ordering)
        .unwrap()
        .with_info(Some("warm-up".into()));
    let assessment = Assessment::new(
        AssessmentId::generate(),
        user.id(),
        settings,
        vec![QuestionId::new(2), QuestionId::new(0), QuestionId::new(2)],
    )
    .unwrap();
    repo.insert_assessment(&assessment).await.unwrap();
    assessment
}

#[tokio::test]
async fn sqlite_insert_if_absent_keeps_existing_options() {
    let repo = connect("memdb_insert_if_absent").await;
    assert!(repo.insert_question_if_absent(&build_question(4)).await.unwrap());

    let rekeyed = Question::new(
        QuestionId::new(4),
        "question 4 again",
        vec![
            QuestionOption::new(OptionId::new(500), "other", true),
            QuestionOption::new(OptionId::new(501), "another", false),
        ],
    )
    .unwrap();
    assert!(!repo.insert_question_if_absent(&rekeyed).await.unwrap());

    let stored = repo
        .get_question(QuestionId::new(4))
        .await
        .unwrap()
        .expect("question");
    assert_eq!(stored, build_question(4));
}

#[tokio::test]
async fn sqlite_persists_users_with_derived_slug() {
    let repo = connect("memdb_users").await;
    let user = repo
        .insert_new_user(&User::new(UserId::new(0), Uuid::new_v4(), User::DEFAULT_TITLE).unwrap())
        .await
        .unwrap();

    let fetched = repo.get_user(user.id()).await.unwrap().expect("user");
    assert_eq!(fetched.slug(), format!("data-scientist-{}", user.id()));
    assert_eq!(fetched.uuid(), user.uuid());
    assert!(repo.get_user(UserId::new(9_999)).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_round_trips_questions_in_option_order() {
    let repo = connect("memdb_questions").await;
    repo.upsert_question(&build_question(0)).await.unwrap();
    repo.upsert_question(&build_question(1)).await.unwrap();

    let fetched = repo
        .get_question(QuestionId::new(1))
        .await
        .unwrap()
        .expect("question");
    assert_eq!(fetched, build_question(1));
    assert_eq!(
        repo.list_question_ids().await.unwrap(),
        vec![QuestionId::new(0), QuestionId::new(1)]
    );
    assert!(repo.get_question(QuestionId::new(7)).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_keeps_duplicate_slots_in_position_order() {
    let repo = connect("memdb_slots").await;
    let assessment = seed_assessment(
        &repo,
        QuestionOrdering::Random {
            draw: RandomDraw::WithReplacement,
        },
    )
    .await;

    let fetched = repo
        .get_assessment(assessment.id())
        .await
        .unwrap()
        .expect("assessment");
    assert_eq!(fetched, assessment);
    assert_eq!(fetched.settings().info(), Some("warm-up"));
    assert_eq!(fetched.question_at(3).unwrap(), QuestionId::new(2));
}

#[tokio::test]
async fn sqlite_allows_only_one_active_attempt() {
    let repo = connect("memdb_single_active").await;
    let assessment = seed_assessment(&repo, QuestionOrdering::Sequential).await;
    let draft = AttemptDraft::for_assessment(&assessment, fixed_now());

    let first = repo.begin_attempt(draft.clone()).await.unwrap();
    assert_eq!(first.remaining_seconds(), 60);

    let err = repo.begin_attempt(draft.clone()).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let stored = repo.get_assessment(assessment.id()).await.unwrap().unwrap();
    assert_eq!(stored.attempts_started(), 1, "failed begin must not count");

    let mut ended = first.clone();
    ended.end(fixed_now() + Duration::seconds(30)).unwrap();
    assert!(repo.update_active_attempt(&ended, fixed_now()).await.unwrap());
    assert!(repo.current_attempt(assessment.id()).await.unwrap().is_none());

    let second = repo.begin_attempt(draft).await.unwrap();
    assert_ne!(second.id(), first.id());
    let stored = repo.get_assessment(assessment.id()).await.unwrap().unwrap();
    assert_eq!(stored.attempts_started(), 2);
    assert_eq!(repo.list_attempts(assessment.id()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn sqlite_ignores_updates_to_ended_attempts() {
    let repo = connect("memdb_late_update").await;
    let assessment = seed_assessment(&repo, QuestionOrdering::Sequential).await;
    let attempt = repo
        .begin_attempt(AttemptDraft::for_assessment(&assessment, fixed_now()))
        .await
        .unwrap();

    let mut ended = attempt.clone();
    ended.end(fixed_now()).unwrap();
    repo.update_active_attempt(&ended, fixed_now()).await.unwrap();

    let mut stale = attempt;
    stale.decay(fixed_now() + Duration::seconds(10)).unwrap();
    assert!(!repo.update_active_attempt(&stale, fixed_now()).await.unwrap());

    let attempts = repo.list_attempts(assessment.id()).await.unwrap();
    assert!(attempts[0].is_ended());
    assert_eq!(attempts[0].remaining_seconds(), 60);
}

#[tokio::test]
async fn sqlite_records_answers_and_advances_cursor() {
    let repo = connect("memdb_answers").await;
    let assessment = seed_assessment(&repo, QuestionOrdering::Sequential).await;
    let attempt = repo
        .begin_attempt(AttemptDraft::for_assessment(&assessment, fixed_now()))
        .await
        .unwrap();

    let answer = AnsweredQuestion::new(
        attempt.id(),
        QuestionId::new(2),
        1,
        OptionId::new(8),
        fixed_now(),
    );
    let (_, updated) = repo.record_answer(&answer).await.unwrap();
    assert_eq!(updated.next_question_index(), 1);

    let duplicate = repo.record_answer(&answer).await.unwrap_err();
    assert!(matches!(duplicate, StorageError::Conflict));
    let current = repo.current_attempt(assessment.id()).await.unwrap().unwrap();
    assert_eq!(current.next_question_index(), 1, "rolled back on conflict");

    assert_eq!(repo.list_answers(attempt.id()).await.unwrap(), vec![answer]);
}

#[tokio::test]
async fn sqlite_clock_updates_leave_cursor_alone() {
    let repo = connect("memdb_cursor").await;
    let assessment = seed_assessment(&repo, QuestionOrdering::Sequential).await;
    let mut stale = repo
        .begin_attempt(AttemptDraft::for_assessment(&assessment, fixed_now()))
        .await
        .unwrap();
    let answer = AnsweredQuestion::new(
        stale.id(),
        QuestionId::new(2),
        1,
        OptionId::new(7),
        fixed_now(),
    );
    repo.record_answer(&answer).await.unwrap();

    stale.decay(fixed_now() + Duration::seconds(10)).unwrap();
    assert!(repo.update_active_attempt(&stale, fixed_now()).await.unwrap());

    let current = repo.current_attempt(assessment.id()).await.unwrap().unwrap();
    assert_eq!(current.next_question_index(), 1);
    assert_eq!(current.remaining_seconds(), 50);
}

#[tokio::test]
async fn sqlite_update_compares_decay_baseline() {
    let repo = connect("memdb_baseline").await;
    let assessment = seed_assessment(&repo, QuestionOrdering::Sequential).await;
    let read = repo
        .begin_attempt(AttemptDraft::for_assessment(&assessment, fixed_now()))
        .await
        .unwrap();

    let mut decayed = read.clone();
    decayed.decay(fixed_now() + Duration::seconds(15)).unwrap();
    assert!(
        repo.update_active_attempt(&decayed, read.last_healthcheck_at())
            .await
            .unwrap()
    );

    let mut resumed = read.clone();
    resumed.resume(fixed_now() + Duration::seconds(16)).unwrap();
    assert!(
        !repo
            .update_active_attempt(&resumed, read.last_healthcheck_at())
            .await
            .unwrap()
    );

    let current = repo.current_attempt(assessment.id()).await.unwrap().unwrap();
    assert_eq!(current.remaining_seconds(), 45);
    assert_eq!(
        current.last_healthcheck_at(),
        fixed_now() + Duration::seconds(15)
    );
}
