use serde::Serialize;
use thiserror::Error;

use crate::model::ids::{OptionId, QuestionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("question must have at least one option")]
    NoOptions,

    #[error("question must have exactly one correct option, found {found}")]
    CorrectOptionCount { found: usize },

    #[error("option label cannot be empty")]
    EmptyOptionLabel,
}

//
// ─── OPTIONS ───────────────────────────────────────────────────────────────────
//

/// A labeled answer choice belonging to a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionOption {
    pub id: OptionId,
    pub label: String,
    pub is_correct: bool,
}

impl QuestionOption {
    #[must_use]
    pub fn new(id: OptionId, label: impl Into<String>, is_correct: bool) -> Self {
        Self {
            id,
            label: label.into(),
            is_correct,
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Static question-bank entry with an ordered set of options.
///
/// Exactly one option is flagged correct. The flag never leaves the domain;
/// callers only ever see a [`QuestionView`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    text: String,
    options: Vec<QuestionOption>,
}

impl Question {
    /// Creates a validated question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the text or any label is empty, if there are
    /// no options, or if the number of correct options is not exactly one.
    pub fn new(
        id: QuestionId,
        text: impl Into<String>,
        options: Vec<QuestionOption>,
    ) -> Result<Self, QuestionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        if options.is_empty() {
            return Err(QuestionError::NoOptions);
        }
        if options.iter().any(|o| o.label.trim().is_empty()) {
            return Err(QuestionError::EmptyOptionLabel);
        }
        let found = options.iter().filter(|o| o.is_correct).count();
        if found != 1 {
            return Err(QuestionError::CorrectOptionCount { found });
        }

        Ok(Self { id, text, options })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[QuestionOption] {
        &self.options
    }

    #[must_use]
    pub fn has_option(&self, option_id: OptionId) -> bool {
        self.options.iter().any(|o| o.id == option_id)
    }

    /// Caller-facing projection without the correct flag.
    #[must_use]
    pub fn view(&self) -> QuestionView {
        QuestionView {
            id: self.id,
            question_text: self.text.clone(),
            options: self
                .options
                .iter()
                .map(|o| OptionView {
                    id: o.id,
                    answer_text: o.label.clone(),
                })
                .collect(),
        }
    }
}

/// Public shape of a question as served to the assessment taker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub id: QuestionId,
    pub question_text: String,
    #[serde(rename = "Options")]
    pub options: Vec<OptionView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionView {
    pub id: OptionId,
    pub answer_text: String,
}
