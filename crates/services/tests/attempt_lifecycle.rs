use assessment_core::model::{AssessmentId, AssessmentSettings, OptionId, QuestionOrdering};
use assessment_core::time::fixed_now;
use chrono::Duration;
use services::{AppServices, Clock, HealthcheckOutcome, ServiceOptions, StartOutcome};
use storage::repository::Storage;

/// Services over shared storage whose clock reads `fixed_now() + seconds`.
fn at(storage: &Storage, seconds: i64) -> AppServices {
    AppServices::from_storage(
        storage,
        Clock::fixed(fixed_now() + Duration::seconds(seconds)),
        ServiceOptions::default(),
    )
}

async fn short_assessment(storage: &Storage) -> AssessmentId {
    let services = at(storage, 0);
    let user = services.users().create_user().await.unwrap();
    let settings = AssessmentSettings::new(1, 3, QuestionOrdering::Sequential).unwrap();
    services
        .assessments()
        .create_assessment(user.id(), settings)
        .await
        .unwrap()
        .id()
}

#[tokio::test]
async fn one_minute_three_question_walkthrough() {
    let storage = Storage::in_memory();
    let id = short_assessment(&storage).await;

    let started = at(&storage, 0).attempts().start(id, false).await.unwrap();
    let StartOutcome::Started(first) = started else {
        panic!("expected a fresh attempt");
    };
    assert_eq!(first.remaining_seconds(), 60);

    let ping = at(&storage, 10).attempts().healthcheck(id).await.unwrap();
    assert_eq!(
        ping,
        HealthcheckOutcome::Decayed {
            elapsed_seconds: 10,
            remaining_seconds: 50
        }
    );

    let answered = at(&storage, 12)
        .progression()
        .submit_answer(id, 1, OptionId::new(0))
        .await
        .unwrap();
    assert_eq!(answered.next_question_index, 1);

    let ended = at(&storage, 15).attempts().end(id).await.unwrap();
    assert!(ended.is_ended());
    assert_eq!(ended.ended_at(), Some(fixed_now() + Duration::seconds(15)));
    assert!(
        at(&storage, 15)
            .attempts()
            .current_attempt(id)
            .await
            .unwrap()
            .is_none()
    );

    let restarted = at(&storage, 20).attempts().start(id, false).await.unwrap();
    let StartOutcome::Started(second) = restarted else {
        panic!("expected a brand-new attempt");
    };
    assert_ne!(second.id(), first.id());
    assert_eq!(second.remaining_seconds(), 60);
    assert_eq!(second.next_question_index(), 0);

    let details = at(&storage, 20)
        .assessments()
        .get_assessment(id)
        .await
        .unwrap();
    assert_eq!(details.assessment.attempts_started(), 2);
    assert_eq!(details.attempts.len(), 2);
}

#[tokio::test]
async fn repeated_resume_keeps_remaining_time() {
    let storage = Storage::in_memory();
    let id = short_assessment(&storage).await;
    at(&storage, 0).attempts().start(id, false).await.unwrap();

    for seconds in [30, 45] {
        let outcome = at(&storage, seconds)
            .attempts()
            .start(id, false)
            .await
            .unwrap();
        assert!(matches!(outcome, StartOutcome::Resumed(_)));
        assert_eq!(outcome.attempt().remaining_seconds(), 60);
    }

    // Resume re-armed the baseline at +45s, so only 5 seconds are charged.
    let ping = at(&storage, 50).attempts().healthcheck(id).await.unwrap();
    assert_eq!(
        ping,
        HealthcheckOutcome::Decayed {
            elapsed_seconds: 5,
            remaining_seconds: 55
        }
    );
    let details = at(&storage, 50)
        .assessments()
        .get_assessment(id)
        .await
        .unwrap();
    assert_eq!(details.attempts.len(), 1);
}

#[tokio::test]
async fn never_more_than_one_active_attempt() {
    let storage = Storage::in_memory();
    let id = short_assessment(&storage).await;

    let steps = [false, false, true, false, true, true, false, false];
    for (second, end_existing) in steps.into_iter().enumerate() {
        let services = at(&storage, i64::try_from(second).unwrap());
        services.attempts().start(id, end_existing).await.unwrap();

        let attempts = services
            .assessments()
            .get_assessment(id)
            .await
            .unwrap()
            .attempts;
        let active = attempts.iter().filter(|a| !a.is_ended()).count();
        assert!(active <= 1, "step {second}: {active} active attempts");
    }
}

#[tokio::test]
async fn concurrent_starts_create_a_single_attempt() {
    let storage = Storage::in_memory();
    let id = short_assessment(&storage).await;
    let services = at(&storage, 0);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let attempts = services.attempts();
            tokio::spawn(async move { attempts.start(id, false).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let details = services.assessments().get_assessment(id).await.unwrap();
    assert_eq!(details.attempts.len(), 1);
    assert_eq!(details.assessment.attempts_started(), 1);
}

#[tokio::test]
async fn healthcheck_after_end_changes_nothing() {
    let storage = Storage::in_memory();
    let id = short_assessment(&storage).await;
    at(&storage, 0).attempts().start(id, false).await.unwrap();
    at(&storage, 5).attempts().end(id).await.unwrap();

    let ping = at(&storage, 40).attempts().healthcheck(id).await.unwrap();
    assert_eq!(ping, HealthcheckOutcome::Idle);

    let attempts = at(&storage, 40)
        .assessments()
        .get_assessment(id)
        .await
        .unwrap()
        .attempts;
    assert_eq!(attempts[0].remaining_seconds(), 60);
}

#[tokio::test]
async fn each_answer_moves_cursor_by_one() {
    let storage = Storage::in_memory();
    let id = short_assessment(&storage).await;
    let services = at(&storage, 0);
    services.attempts().start(id, false).await.unwrap();

    for (expected, index) in [(1, 3), (2, 1), (3, 2)] {
        let answered = services
            .progression()
            .submit_answer(id, index, OptionId::new(0))
            .await
            .unwrap();
        assert_eq!(answered.next_question_index, expected);
    }
    assert_eq!(services.progression().answers(id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn question_index_boundaries() {
    let storage = Storage::in_memory();
    let id = short_assessment(&storage).await;
    let progression = at(&storage, 0).progression();

    for index in 1..=3 {
        assert!(progression.get_question(id, index).await.is_ok());
    }
    assert!(progression.get_question(id, 0).await.is_err());
    assert!(progression.get_question(id, 4).await.is_err());
}
