use rand::Rng;
use rand::rng;
use rand::seq::SliceRandom;

use assessment_core::model::{QuestionId, QuestionOrdering, RandomDraw};

use crate::error::AssignmentError;

/// Picks the questions that fill an assessment's slots.
///
/// - `Sequential` takes the lowest `count` ids of the pool, in order.
/// - `Random { WithReplacement }` draws every slot independently, so one
///   question may occupy several slots.
/// - `Random { WithoutReplacement }` fills slots with distinct questions.
#[derive(Debug, Clone, Copy)]
pub struct QuestionAssigner {
    ordering: QuestionOrdering,
}

impl QuestionAssigner {
    #[must_use]
    pub fn new(ordering: QuestionOrdering) -> Self {
        Self { ordering }
    }

    /// Assign `count` slots from `pool` using the thread-local RNG.
    ///
    /// # Errors
    ///
    /// Returns `AssignmentError::InsufficientQuestions` if the pool cannot fill
    /// every slot under the configured ordering.
    pub fn assign(
        &self,
        pool: &[QuestionId],
        count: u32,
    ) -> Result<Vec<QuestionId>, AssignmentError> {
        self.assign_with(pool, count, &mut rng())
    }

    /// Same as [`assign`](Self::assign) with a caller-supplied RNG.
    ///
    /// # Errors
    ///
    /// Returns `AssignmentError::InsufficientQuestions` if the pool cannot fill
    /// every slot under the configured ordering.
    pub fn assign_with<R: Rng + ?Sized>(
        &self,
        pool: &[QuestionId],
        count: u32,
        rng: &mut R,
    ) -> Result<Vec<QuestionId>, AssignmentError> {
        let wanted = usize::try_from(count).unwrap_or(usize::MAX);
        let insufficient = AssignmentError::InsufficientQuestions {
            requested: count,
            available: pool.len(),
        };

        match self.ordering {
            QuestionOrdering::Sequential => {
                if pool.len() < wanted {
                    return Err(insufficient);
                }
                let mut sorted = pool.to_vec();
                sorted.sort_unstable();
                sorted.truncate(wanted);
                Ok(sorted)
            }
            QuestionOrdering::Random {
                draw: RandomDraw::WithReplacement,
            } => {
                if pool.is_empty() {
                    return Err(insufficient);
                }
                Ok((0..wanted)
                    .map(|_| pool[rng.random_range(0..pool.len())])
                    .collect())
            }
            QuestionOrdering::Random {
                draw: RandomDraw::WithoutReplacement,
            } => {
                if pool.len() < wanted {
                    return Err(insufficient);
                }
                let mut shuffled = pool.to_vec();
                shuffled.shuffle(rng);
                shuffled.truncate(wanted);
                Ok(shuffled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn pool(n: u64) -> Vec<QuestionId> {
        (0..n).rev().map(QuestionId::new).collect()
    }

    #[test]
    fn sequential_takes_lowest_ids_in_order() {
        let assigner = QuestionAssigner::new(QuestionOrdering::Sequential);
        let picked = assigner.assign(&pool(100), 3).unwrap();
        assert_eq!(
            picked,
            vec![QuestionId::new(0), QuestionId::new(1), QuestionId::new(2)]
        );
    }

    #[test]
    fn with_replacement_can_exceed_pool_size() {
        let assigner = QuestionAssigner::new(QuestionOrdering::Random {
            draw: RandomDraw::WithReplacement,
        });
        let mut rng = StdRng::seed_from_u64(7);
        let picked = assigner.assign_with(&pool(2), 10, &mut rng).unwrap();

        assert_eq!(picked.len(), 10);
        let distinct: HashSet<_> = picked.iter().collect();
        assert!(distinct.len() <= 2);
    }

    #[test]
    fn without_replacement_yields_distinct_slots() {
        let assigner = QuestionAssigner::new(QuestionOrdering::Random {
            draw: RandomDraw::WithoutReplacement,
        });
        let mut rng = StdRng::seed_from_u64(42);
        let picked = assigner.assign_with(&pool(20), 15, &mut rng).unwrap();

        let distinct: HashSet<_> = picked.iter().collect();
        assert_eq!(distinct.len(), 15);
    }

    #[test]
    fn short_pool_is_reported() {
        let err = QuestionAssigner::new(QuestionOrdering::Sequential)
            .assign(&pool(2), 3)
            .unwrap_err();
        assert_eq!(
            err,
            AssignmentError::InsufficientQuestions {
                requested: 3,
                available: 2
            }
        );

        let empty = QuestionAssigner::new(QuestionOrdering::default()).assign(&[], 1);
        assert!(empty.is_err());
    }
}
