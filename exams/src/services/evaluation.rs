use std::collections::{HashMap, HashSet};

use entity::{exams_submission_slots, sea_orm_active_enums::ExamsExerciseKind};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use super::exercises::{ExerciseArena, MAX_EXERCISE_DEPTH};
use crate::schemas::execution::ExecutionResults;

/// How answers that cannot be graded automatically are treated.
///
/// Graded events require a human to fill in the missing scores, so the
/// best-effort policy reports them as pending (`None`). Ungraded
/// self-practice has no use for pending scores and falls back to 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradingPolicy {
    FullyAutomatic,
    BestEffort,
}

impl GradingPolicy {
    fn manual_fallback(self) -> Option<Decimal> {
        match self {
            Self::FullyAutomatic => Some(Decimal::ZERO),
            Self::BestEffort => None,
        }
    }
}

/// A submission slot together with its sub-slots, mirroring the exercise
/// tree of the slot's exercise.
#[derive(Debug, Clone)]
pub struct SlotNode {
    pub slot: exams_submission_slots::Model,
    pub children: Vec<SlotNode>,
}

impl SlotNode {
    /// Assemble the base-slot forest of a participation from its flat slot
    /// list. Children are ordered by slot number.
    pub fn build_forest(
        slots: Vec<exams_submission_slots::Model>,
    ) -> Result<Vec<SlotNode>, EvaluationError> {
        let mut by_parent: HashMap<Option<Uuid>, Vec<exams_submission_slots::Model>> =
            HashMap::new();
        for slot in slots {
            by_parent.entry(slot.parent_id).or_default().push(slot);
        }
        for group in by_parent.values_mut() {
            group.sort_by_key(|s| s.slot_number);
        }
        let roots = by_parent.remove(&None).unwrap_or_default();
        roots
            .into_iter()
            .map(|slot| Self::attach(slot, &mut by_parent, 0))
            .collect()
    }

    fn attach(
        slot: exams_submission_slots::Model,
        by_parent: &mut HashMap<Option<Uuid>, Vec<exams_submission_slots::Model>>,
        depth: usize,
    ) -> Result<SlotNode, EvaluationError> {
        if depth > MAX_EXERCISE_DEPTH {
            return Err(EvaluationError::TooDeep);
        }
        let children = by_parent
            .remove(&Some(slot.id))
            .unwrap_or_default()
            .into_iter()
            .map(|child| Self::attach(child, by_parent, depth + 1))
            .collect::<Result<_, _>>()?;
        Ok(SlotNode { slot, children })
    }

    pub fn has_answer(&self) -> bool {
        !self.slot.answer_text.is_empty()
            || !self.slot.selected_choice_ids.is_empty()
            || self.slot.attachment.is_some()
    }

    fn execution_results(&self) -> Option<ExecutionResults> {
        let value = self.slot.execution_results.clone()?;
        serde_json::from_value(value).ok()
    }
}

/// Raw, type-specific measure of answer quality before any weighting.
///
/// `Ok(None)` means the answer needs manual grading and must not be folded
/// into a numeric score by the caller.
pub fn correctness(
    arena: &ExerciseArena,
    exercise_id: Uuid,
    node: &SlotNode,
    policy: GradingPolicy,
) -> Result<Option<Decimal>, EvaluationError> {
    correctness_at(arena, exercise_id, node, policy, 0)
}

fn correctness_at(
    arena: &ExerciseArena,
    exercise_id: Uuid,
    node: &SlotNode,
    policy: GradingPolicy,
    depth: usize,
) -> Result<Option<Decimal>, EvaluationError> {
    if depth > MAX_EXERCISE_DEPTH {
        return Err(EvaluationError::TooDeep);
    }
    let exercise = arena
        .get(exercise_id)
        .ok_or(EvaluationError::UnknownExercise(exercise_id))?;

    Ok(match exercise.exercise_kind {
        ExamsExerciseKind::SingleChoice | ExamsExerciseKind::MultiChoice => {
            let choices = arena.choices(exercise_id);
            let known: HashSet<Uuid> = choices.iter().map(|c| c.id).collect();
            if let Some(&foreign) = node
                .slot
                .selected_choice_ids
                .iter()
                .find(|id| !known.contains(id))
            {
                return Err(EvaluationError::UnknownChoice {
                    exercise_id,
                    choice_id: foreign,
                });
            }
            let selected: HashSet<Uuid> = node.slot.selected_choice_ids.iter().copied().collect();
            Some(
                choices
                    .iter()
                    .filter(|c| selected.contains(&c.id))
                    .map(|c| c.correctness)
                    .sum(),
            )
        }
        ExamsExerciseKind::OpenAnswer | ExamsExerciseKind::Attachment => {
            policy.manual_fallback()
        }
        ExamsExerciseKind::Completion | ExamsExerciseKind::Aggregated => {
            let mut total = Decimal::ZERO;
            for (number, &child_id) in arena.children(exercise_id).iter().enumerate() {
                let child_exercise = arena
                    .get(child_id)
                    .ok_or(EvaluationError::UnknownExercise(child_id))?;
                let child_node = node
                    .children
                    .iter()
                    .find(|c| c.slot.slot_number == number as i32)
                    .ok_or(EvaluationError::MissingSubSlot {
                        exercise_id,
                        slot_number: number as i32,
                    })?;
                match correctness_at(arena, child_id, child_node, policy, depth + 1)? {
                    Some(sub) => total += sub * child_exercise.child_weight,
                    None => return Ok(None),
                }
            }
            Some(total)
        }
        ExamsExerciseKind::C | ExamsExerciseKind::Javascript | ExamsExerciseKind::Python => {
            if !node.has_answer() {
                policy.manual_fallback()
            } else {
                // results absent or without a test list (e.g. after a
                // compilation failure) count as zero passed test cases
                let passed = node
                    .execution_results()
                    .map(|r| r.passed_testcases())
                    .unwrap_or(0);
                Some(Decimal::from(passed))
            }
        }
    })
}

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("exercise {0} is not part of the loaded tree")]
    UnknownExercise(Uuid),
    #[error("choice {choice_id} does not belong to exercise {exercise_id}")]
    UnknownChoice { exercise_id: Uuid, choice_id: Uuid },
    #[error("no sub-slot numbered {slot_number} under exercise {exercise_id}")]
    MissingSubSlot { exercise_id: Uuid, slot_number: i32 },
    #[error("slot tree exceeds {MAX_EXERCISE_DEPTH} levels")]
    TooDeep,
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::schemas::execution::{ExecutionResults, TestCaseResult};

    use super::super::exercises::tests::{choice, exercise};
    use super::*;

    pub(crate) fn slot(
        id: u128,
        parent: Option<u128>,
        slot_number: i32,
    ) -> exams_submission_slots::Model {
        exams_submission_slots::Model {
            id: Uuid::from_u128(id),
            participation_id: Uuid::from_u128(900),
            parent_id: parent.map(Uuid::from_u128),
            slot_number,
            seen_at: None,
            answered_at: None,
            answer_text: String::new(),
            selected_choice_ids: vec![],
            attachment: None,
            execution_results: None,
        }
    }

    pub(crate) fn node(slot: exams_submission_slots::Model) -> SlotNode {
        SlotNode {
            slot,
            children: vec![],
        }
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn choice_correctness_is_signed_and_uncapped() {
        let arena = ExerciseArena::new(
            vec![exercise(
                1,
                None,
                ExamsExerciseKind::MultiChoice,
                Decimal::ONE,
            )],
            vec![
                choice(10, 1, dec("1")),
                choice(11, 1, dec("0.5")),
                choice(12, 1, dec("-2")),
            ],
        );
        let mut answer = slot(100, None, 0);
        answer.selected_choice_ids = vec![
            Uuid::from_u128(10),
            Uuid::from_u128(11),
            Uuid::from_u128(12),
        ];
        let result = correctness(
            &arena,
            Uuid::from_u128(1),
            &node(answer),
            GradingPolicy::BestEffort,
        )
        .unwrap();
        assert_eq!(result, Some(dec("-0.5")));
    }

    #[test]
    fn foreign_choice_is_a_validation_error() {
        let arena = ExerciseArena::new(
            vec![exercise(
                1,
                None,
                ExamsExerciseKind::SingleChoice,
                Decimal::ONE,
            )],
            vec![choice(10, 1, dec("1"))],
        );
        let mut answer = slot(100, None, 0);
        answer.selected_choice_ids = vec![Uuid::from_u128(77)];
        assert!(matches!(
            correctness(
                &arena,
                Uuid::from_u128(1),
                &node(answer),
                GradingPolicy::BestEffort
            ),
            Err(EvaluationError::UnknownChoice { .. })
        ));
    }

    #[test]
    fn manual_kinds_depend_on_policy() {
        let arena = ExerciseArena::new(
            vec![exercise(
                1,
                None,
                ExamsExerciseKind::OpenAnswer,
                Decimal::ONE,
            )],
            vec![],
        );
        let answer = node(slot(100, None, 0));
        assert_eq!(
            correctness(&arena, Uuid::from_u128(1), &answer, GradingPolicy::BestEffort).unwrap(),
            None
        );
        assert_eq!(
            correctness(
                &arena,
                Uuid::from_u128(1),
                &answer,
                GradingPolicy::FullyAutomatic
            )
            .unwrap(),
            Some(Decimal::ZERO)
        );
    }

    #[test]
    fn composite_propagates_pending_grading() {
        // an unanswered open question next to a fully correct choice
        let arena = ExerciseArena::new(
            vec![
                exercise(1, None, ExamsExerciseKind::Aggregated, Decimal::ONE),
                exercise(2, Some(1), ExamsExerciseKind::OpenAnswer, Decimal::ONE),
                exercise(3, Some(1), ExamsExerciseKind::SingleChoice, Decimal::ONE),
            ],
            vec![choice(30, 3, dec("1"))],
        );
        let mut choice_answer = slot(102, Some(100), 1);
        choice_answer.selected_choice_ids = vec![Uuid::from_u128(30)];
        let tree = SlotNode {
            slot: slot(100, None, 0),
            children: vec![node(slot(101, Some(100), 0)), node(choice_answer)],
        };

        assert_eq!(
            correctness(&arena, Uuid::from_u128(1), &tree, GradingPolicy::BestEffort).unwrap(),
            None
        );
        // the fully automatic variant counts the open answer as 0 and keeps
        // the rest of the composite
        assert_eq!(
            correctness(
                &arena,
                Uuid::from_u128(1),
                &tree,
                GradingPolicy::FullyAutomatic
            )
            .unwrap(),
            Some(dec("1"))
        );
    }

    #[test]
    fn composite_weights_sub_correctness() {
        let arena = ExerciseArena::new(
            vec![
                exercise(1, None, ExamsExerciseKind::Completion, Decimal::ONE),
                exercise(2, Some(1), ExamsExerciseKind::SingleChoice, dec("2")),
                exercise(3, Some(1), ExamsExerciseKind::SingleChoice, dec("1")),
            ],
            vec![
                choice(20, 2, dec("1")),
                choice(30, 3, dec("1")),
                choice(31, 3, dec("-0.1")),
            ],
        );
        let mut first = slot(101, Some(100), 0);
        first.selected_choice_ids = vec![Uuid::from_u128(20)];
        let mut second = slot(102, Some(100), 1);
        second.selected_choice_ids = vec![Uuid::from_u128(31)];
        let tree = SlotNode {
            slot: slot(100, None, 0),
            children: vec![node(first), node(second)],
        };
        let result = correctness(&arena, Uuid::from_u128(1), &tree, GradingPolicy::BestEffort)
            .unwrap();
        assert_eq!(result, Some(dec("1.9")));
    }

    #[test]
    fn programming_without_answer_is_pending() {
        let arena = ExerciseArena::new(
            vec![exercise(1, None, ExamsExerciseKind::Javascript, Decimal::ONE)],
            vec![],
        );
        let answer = node(slot(100, None, 0));
        assert_eq!(
            correctness(&arena, Uuid::from_u128(1), &answer, GradingPolicy::BestEffort).unwrap(),
            None
        );
    }

    #[test]
    fn programming_counts_passed_testcases() {
        let arena = ExerciseArena::new(
            vec![exercise(1, None, ExamsExerciseKind::Python, Decimal::ONE)],
            vec![],
        );
        let mut answer = slot(100, None, 0);
        answer.answer_text = "print(42)".into();
        answer.execution_results = Some(
            serde_json::to_value(ExecutionResults::completed(vec![
                TestCaseResult {
                    id: Uuid::from_u128(51),
                    passed: true,
                    error: None,
                    stdout: None,
                    stderr: None,
                },
                TestCaseResult {
                    id: Uuid::from_u128(52),
                    passed: false,
                    error: Some("runtime_error".into()),
                    stdout: None,
                    stderr: None,
                },
                TestCaseResult {
                    id: Uuid::from_u128(53),
                    passed: true,
                    error: None,
                    stdout: None,
                    stderr: None,
                },
            ]))
            .unwrap(),
        );
        assert_eq!(
            correctness(
                &arena,
                Uuid::from_u128(1),
                &node(answer),
                GradingPolicy::BestEffort
            )
            .unwrap(),
            Some(dec("2"))
        );
    }

    #[test]
    fn compilation_failure_counts_zero_passed() {
        let arena = ExerciseArena::new(
            vec![exercise(1, None, ExamsExerciseKind::C, Decimal::ONE)],
            vec![],
        );
        let mut answer = slot(100, None, 0);
        answer.answer_text = "int main() {".into();
        answer.execution_results = Some(
            serde_json::to_value(ExecutionResults::compilation_failed(
                "main.c:1: error".into(),
            ))
            .unwrap(),
        );
        assert_eq!(
            correctness(
                &arena,
                Uuid::from_u128(1),
                &node(answer),
                GradingPolicy::BestEffort
            )
            .unwrap(),
            Some(Decimal::ZERO)
        );
    }
}
