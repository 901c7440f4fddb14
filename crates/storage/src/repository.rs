use async_trait::async_trait;
use chrono::{DateTime, Utc};
use assessment_core::model::{
    AnswerId, AnsweredQuestion, Assessment, AssessmentAttempt, AssessmentId, AttemptDraft,
    AttemptId, Question, QuestionId, User, UserId,
};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Persist a new user and return it with its storage-assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the user cannot be stored.
    async fn insert_new_user(&self, user: &User) -> Result<User, StorageError>;

    /// Fetch a user by ID. Returns `Ok(None)` if missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for backend failures.
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError>;
}

/// Read access to the question bank, plus the upsert used to seed it.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Persist or replace a question together with its options.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;

    /// Store a question and its options only if its id is unused.
    ///
    /// Returns `false` and leaves the stored question untouched when the id
    /// already exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn insert_question_if_absent(&self, question: &Question) -> Result<bool, StorageError>;

    /// Fetch a question by ID. Returns `Ok(None)` if missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for backend failures.
    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StorageError>;

    /// All question ids in the bank, ascending.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for backend failures.
    async fn list_question_ids(&self) -> Result<Vec<QuestionId>, StorageError>;
}

#[async_trait]
pub trait AssessmentRepository: Send + Sync {
    /// Persist a newly created assessment and its question slots.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id is taken, or
    /// `StorageError::NotFound` if the owner or a question is missing.
    async fn insert_assessment(&self, assessment: &Assessment) -> Result<(), StorageError>;

    /// Fetch an assessment by ID. Returns `Ok(None)` if missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for backend failures.
    async fn get_assessment(&self, id: AssessmentId) -> Result<Option<Assessment>, StorageError>;
}

/// Attempt persistence. Implementations guarantee that an assessment never
/// has more than one non-ended attempt.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Atomically insert a new attempt and bump the assessment's attempt
    /// counter, provided no non-ended attempt exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if an attempt is already in progress,
    /// or `StorageError::NotFound` if the assessment is missing.
    async fn begin_attempt(&self, draft: AttemptDraft) -> Result<AssessmentAttempt, StorageError>;

    /// The single non-ended attempt of an assessment, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for backend failures.
    async fn current_attempt(
        &self,
        assessment_id: AssessmentId,
    ) -> Result<Option<AssessmentAttempt>, StorageError>;

    /// Write the attempt's clock and end state if the stored row is still in
    /// progress and its `last_healthcheck_at` still equals `read_baseline`,
    /// the value the caller read before computing the new state.
    ///
    /// Returns `false` when the stored attempt has ended or another writer
    /// moved its baseline in the meantime; the caller re-reads and retries.
    /// The progression cursor is not written; only `record_answer` moves it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the attempt does not exist.
    async fn update_active_attempt(
        &self,
        attempt: &AssessmentAttempt,
        read_baseline: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    /// Every attempt of an assessment, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for backend failures.
    async fn list_attempts(
        &self,
        assessment_id: AssessmentId,
    ) -> Result<Vec<AssessmentAttempt>, StorageError>;
}

#[async_trait]
pub trait AnswerRepository: Send + Sync {
    /// Append an answer and advance the attempt's cursor in one step.
    ///
    /// Returns the answer id and the attempt as updated.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the slot was already answered or the
    /// attempt is no longer in progress, `StorageError::NotFound` if the
    /// attempt does not exist.
    async fn record_answer(
        &self,
        answer: &AnsweredQuestion,
    ) -> Result<(AnswerId, AssessmentAttempt), StorageError>;

    /// Answers recorded for an attempt, in submission order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for backend failures.
    async fn list_answers(&self, attempt_id: AttemptId)
    -> Result<Vec<AnsweredQuestion>, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    users: BTreeMap<UserId, User>,
    questions: BTreeMap<QuestionId, Question>,
    assessments: HashMap<AssessmentId, Assessment>,
    attempts: BTreeMap<AttemptId, AssessmentAttempt>,
    answers: Vec<(AnswerId, AnsweredQuestion)>,
    next_user_id: u64,
    next_attempt_id: u64,
    next_answer_id: u64,
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// All collections sit behind one lock so multi-record operations such as
/// `begin_attempt` are atomic.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

fn next_id(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn insert_new_user(&self, user: &User) -> Result<User, StorageError> {
        let mut guard = self.lock()?;
        let id = UserId::new(next_id(&mut guard.next_user_id));
        let stored = user.clone().with_id(id);
        guard.users.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        self.lock()?.questions.insert(question.id(), question.clone());
        Ok(())
    }

    async fn insert_question_if_absent(&self, question: &Question) -> Result<bool, StorageError> {
        match self.lock()?.questions.entry(question.id()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(question.clone());
                Ok(true)
            }
        }
    }

    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StorageError> {
        Ok(self.lock()?.questions.get(&id).cloned())
    }

    async fn list_question_ids(&self) -> Result<Vec<QuestionId>, StorageError> {
        Ok(self.lock()?.questions.keys().copied().collect())
    }
}

#[async_trait]
impl AssessmentRepository for InMemoryRepository {
    async fn insert_assessment(&self, assessment: &Assessment) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if guard.assessments.contains_key(&assessment.id()) {
            return Err(StorageError::Conflict);
        }
        if !guard.users.contains_key(&assessment.owner()) {
            return Err(StorageError::NotFound);
        }
        if assessment
            .question_ids()
            .iter()
            .any(|id| !guard.questions.contains_key(id))
        {
            return Err(StorageError::NotFound);
        }
        guard.assessments.insert(assessment.id(), assessment.clone());
        Ok(())
    }

    async fn get_assessment(&self, id: AssessmentId) -> Result<Option<Assessment>, StorageError> {
        Ok(self.lock()?.assessments.get(&id).cloned())
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn begin_attempt(&self, draft: AttemptDraft) -> Result<AssessmentAttempt, StorageError> {
        let mut guard = self.lock()?;
        let assessment_id = draft.assessment_id;
        if !guard.assessments.contains_key(&assessment_id) {
            return Err(StorageError::NotFound);
        }
        if guard
            .attempts
            .values()
            .any(|a| a.assessment_id() == assessment_id && !a.is_ended())
        {
            return Err(StorageError::Conflict);
        }

        let id = AttemptId::new(next_id(&mut guard.next_attempt_id));
        let attempt = draft.into_attempt(id);
        guard.attempts.insert(id, attempt.clone());
        if let Some(assessment) = guard.assessments.get_mut(&assessment_id) {
            assessment.count_attempt();
        }
        Ok(attempt)
    }

    async fn current_attempt(
        &self,
        assessment_id: AssessmentId,
    ) -> Result<Option<AssessmentAttempt>, StorageError> {
        Ok(self
            .lock()?
            .attempts
            .values()
            .find(|a| a.assessment_id() == assessment_id && !a.is_ended())
            .cloned())
    }

    async fn update_active_attempt(
        &self,
        attempt: &AssessmentAttempt,
        read_baseline: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let mut guard = self.lock()?;
        let stored = guard
            .attempts
            .get_mut(&attempt.id())
            .ok_or(StorageError::NotFound)?;
        if stored.is_ended() || stored.last_healthcheck_at() != read_baseline {
            return Ok(false);
        }
        *stored = AssessmentAttempt::from_persisted(
            attempt.id(),
            attempt.assessment_id(),
            attempt.is_ended(),
            attempt.started_at(),
            attempt.ended_at(),
            attempt.remaining_seconds(),
            stored.next_question_index(),
            attempt.last_healthcheck_at(),
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(true)
    }

    async fn list_attempts(
        &self,
        assessment_id: AssessmentId,
    ) -> Result<Vec<AssessmentAttempt>, StorageError> {
        Ok(self
            .lock()?
            .attempts
            .values()
            .filter(|a| a.assessment_id() == assessment_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AnswerRepository for InMemoryRepository {
    async fn record_answer(
        &self,
        answer: &AnsweredQuestion,
    ) -> Result<(AnswerId, AssessmentAttempt), StorageError> {
        let mut guard = self.lock()?;
        if guard.answers.iter().any(|(_, a)| {
            a.attempt_id == answer.attempt_id && a.question_index == answer.question_index
        }) {
            return Err(StorageError::Conflict);
        }

        let attempt = guard
            .attempts
            .get_mut(&answer.attempt_id)
            .ok_or(StorageError::NotFound)?;
        attempt
            .advance_cursor()
            .map_err(|_| StorageError::Conflict)?;
        let updated = attempt.clone();

        let id = AnswerId::new(next_id(&mut guard.next_answer_id));
        guard.answers.push((id, answer.clone()));
        Ok((id, updated))
    }

    async fn list_answers(
        &self,
        attempt_id: AttemptId,
    ) -> Result<Vec<AnsweredQuestion>, StorageError> {
        Ok(self
            .lock()?
            .answers
            .iter()
            .filter(|(_, a)| a.attempt_id == attempt_id)
            .map(|(_, a)| a.clone())
            .collect())
    }
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserRepository>,
    pub questions: Arc<dyn QuestionRepository>,
    pub assessments: Arc<dyn AssessmentRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub answers: Arc<dyn AnswerRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Share one backend across every repository slot.
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: UserRepository
            + QuestionRepository
            + AssessmentRepository
            + AttemptRepository
            + AnswerRepository
            + Clone
            + 'static,
    {
        Self {
            users: Arc::new(repo.clone()),
            questions: Arc::new(repo.clone()),
            assessments: Arc::new(repo.clone()),
            attempts: Arc::new(repo.clone()),
            answers: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assessment_core::model::{
        AssessmentSettings, OptionId, QuestionOption, QuestionOrdering,
    };
    use assessment_core::time::fixed_now;
    use chrono::Duration;
    use uuid::Uuid;

    async fn seeded() -> (InMemoryRepository, Assessment) {
        let repo = InMemoryRepository::new();
        let user = repo
            .insert_new_user(&User::new(UserId::new(0), Uuid::nil(), User::DEFAULT_TITLE).unwrap())
            .await
            .unwrap();
        for id in 0..2 {
            let question = Question::new(
                QuestionId::new(id),
                format!("question {id}"),
                vec![
                    QuestionOption::new(OptionId::new(id * 10 + 1), "a", true),
                    QuestionOption::new(OptionId::new(id * 10 + 2), "b", false),
                ],
            )
            .unwrap();
            repo.upsert_question(&question).await.unwrap();
        }
        let settings = AssessmentSettings::new(1, 2, QuestionOrdering::Sequential).unwrap();
        let assessment = Assessment::new(
            AssessmentId::generate(),
            user.id(),
            settings,
            vec![QuestionId::new(0), QuestionId::new(1)],
        )
        .unwrap();
        repo.insert_assessment(&assessment).await.unwrap();
        (repo, assessment)
    }

    #[tokio::test]
    async fn begin_attempt_refuses_second_active_attempt() {
        let (repo, assessment) = seeded().await;
        let draft = AttemptDraft::for_assessment(&assessment, fixed_now());

        let first = repo.begin_attempt(draft.clone()).await.unwrap();
        let err = repo.begin_attempt(draft).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));

        let stored = repo.get_assessment(assessment.id()).await.unwrap().unwrap();
        assert_eq!(stored.attempts_started(), 1);
        let current = repo.current_attempt(assessment.id()).await.unwrap().unwrap();
        assert_eq!(current.id(), first.id());
    }

    #[tokio::test]
    async fn update_is_skipped_once_attempt_ended() {
        let (repo, assessment) = seeded().await;
        let attempt = repo
            .begin_attempt(AttemptDraft::for_assessment(&assessment, fixed_now()))
            .await
            .unwrap();

        let mut ended = attempt.clone();
        ended.end(fixed_now()).unwrap();
        assert!(repo.update_active_attempt(&ended, fixed_now()).await.unwrap());

        let mut late_decay = attempt;
        late_decay.decay(fixed_now() + Duration::seconds(5)).unwrap();
        assert!(
            !repo
                .update_active_attempt(&late_decay, fixed_now())
                .await
                .unwrap()
        );

        let attempts = repo.list_attempts(assessment.id()).await.unwrap();
        assert_eq!(attempts.len(), 1);
        assert!(attempts[0].is_ended());
        assert_eq!(attempts[0].remaining_seconds(), 60);
    }

    #[tokio::test]
    async fn record_answer_advances_cursor_and_rejects_duplicate_slot() {
        let (repo, assessment) = seeded().await;
        let attempt = repo
            .begin_attempt(AttemptDraft::for_assessment(&assessment, fixed_now()))
            .await
            .unwrap();
        let answer = AnsweredQuestion::new(
            attempt.id(),
            QuestionId::new(0),
            1,
            OptionId::new(1),
            fixed_now(),
        );

        let (_, updated) = repo.record_answer(&answer).await.unwrap();
        assert_eq!(updated.next_question_index(), 1);

        let err = repo.record_answer(&answer).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
        assert_eq!(repo.list_answers(attempt.id()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stale_clock_update_keeps_cursor() {
        let (repo, assessment) = seeded().await;
        let mut stale = repo
            .begin_attempt(AttemptDraft::for_assessment(&assessment, fixed_now()))
            .await
            .unwrap();
        let answer = AnsweredQuestion::new(
            stale.id(),
            QuestionId::new(0),
            1,
            OptionId::new(1),
            fixed_now(),
        );
        repo.record_answer(&answer).await.unwrap();

        stale.decay(fixed_now() + Duration::seconds(3)).unwrap();
        assert!(repo.update_active_attempt(&stale, fixed_now()).await.unwrap());

        let current = repo.current_attempt(assessment.id()).await.unwrap().unwrap();
        assert_eq!(current.next_question_index(), 1);
        assert_eq!(current.remaining_seconds(), 57);
    }

    #[tokio::test]
    async fn update_requires_unchanged_baseline() {
        let (repo, assessment) = seeded().await;
        let read = repo
            .begin_attempt(AttemptDraft::for_assessment(&assessment, fixed_now()))
            .await
            .unwrap();

        let mut decayed = read.clone();
        decayed.decay(fixed_now() + Duration::seconds(20)).unwrap();
        assert!(
            repo.update_active_attempt(&decayed, read.last_healthcheck_at())
                .await
                .unwrap()
        );

        // A resume computed from the pre-decay read must not restore 60 seconds.
        let mut resumed = read.clone();
        resumed.resume(fixed_now() + Duration::seconds(21)).unwrap();
        assert!(
            !repo
                .update_active_attempt(&resumed, read.last_healthcheck_at())
                .await
                .unwrap()
        );

        let current = repo.current_attempt(assessment.id()).await.unwrap().unwrap();
        assert_eq!(current.remaining_seconds(), 40);
    }
}
