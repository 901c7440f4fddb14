use std::collections::BTreeSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng, rng};

use assessment_core::model::{OptionId, Question, QuestionId, QuestionOption};
use storage::repository::QuestionRepository;
use tracing::info;

use crate::error::QuestionBankError;

/// Size of the demo bank created on first use.
pub const DEFAULT_QUESTION_COUNT: u64 = 100;
pub const DEFAULT_OPTIONS_PER_QUESTION: u64 = 5;

/// Populates the question pool assessments draw from.
#[derive(Clone)]
pub struct QuestionBankService {
    questions: Arc<dyn QuestionRepository>,
}

impl QuestionBankService {
    #[must_use]
    pub fn new(questions: Arc<dyn QuestionRepository>) -> Self {
        Self { questions }
    }

    /// Fill in whichever demo questions `0..count` are missing.
    ///
    /// Question `n` is `"question {n}"` with options
    /// `"Answer #{k} for Question #{n}"` for `k` counted from 1; option ids are
    /// `n * options_per_question + k - 1` and one option per question is marked
    /// correct at random. Questions that already exist are left untouched, so
    /// a partial bank is completed and answer keys never change. Returns the
    /// number of questions written.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError` if a question fails validation or storage fails.
    pub async fn prepopulate(
        &self,
        count: u64,
        options_per_question: u64,
    ) -> Result<u64, QuestionBankError> {
        let mut seeded = StdRng::from_rng(&mut rng());
        self.prepopulate_with(count, options_per_question, &mut seeded)
            .await
    }

    /// Same as [`prepopulate`](Self::prepopulate) with a caller-supplied RNG.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError` if a question fails validation or storage fails.
    pub async fn prepopulate_with<R: Rng + Send + ?Sized>(
        &self,
        count: u64,
        options_per_question: u64,
        rng: &mut R,
    ) -> Result<u64, QuestionBankError> {
        let existing: BTreeSet<QuestionId> =
            self.questions.list_question_ids().await?.into_iter().collect();
        let missing: Vec<u64> = (0..count)
            .filter(|n| !existing.contains(&QuestionId::new(*n)))
            .collect();
        if missing.is_empty() {
            return Ok(0);
        }

        let questions = build_bank(&missing, options_per_question, rng)?;
        let mut written: u64 = 0;
        for question in &questions {
            if self.questions.insert_question_if_absent(question).await? {
                written += 1;
            }
        }
        info!(written, count, options_per_question, "question bank populated");
        Ok(written)
    }

    /// Ensures the default bank exists.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError` if population fails.
    pub async fn ensure_default(&self) -> Result<(), QuestionBankError> {
        self.prepopulate(DEFAULT_QUESTION_COUNT, DEFAULT_OPTIONS_PER_QUESTION)
            .await
            .map(|_| ())
    }
}

fn build_bank<R: Rng + ?Sized>(
    ids: &[u64],
    options_per_question: u64,
    rng: &mut R,
) -> Result<Vec<Question>, QuestionBankError> {
    ids.iter()
        .map(|&n| {
            let correct = rng.random_range(0..options_per_question.max(1));
            let options = (0..options_per_question)
                .map(|k| {
                    QuestionOption::new(
                        OptionId::new(n * options_per_question + k),
                        format!("Answer #{} for Question #{n}", k + 1),
                        k == correct,
                    )
                })
                .collect();
            Ok(Question::new(QuestionId::new(n), format!("question {n}"), options)?)
        })
        .collect()
}
