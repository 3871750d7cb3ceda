use std::collections::HashMap;

use entity::{
    exams_assessment_slots, exams_events, exams_instance_slots, exams_participations,
    exams_submission_slots, exams_template_rules,
    sea_orm_active_enums::ExamsEventKind,
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, Unchanged,
};
use thiserror::Error;
use uuid::Uuid;

use super::{
    evaluation::{correctness, EvaluationError, GradingPolicy, SlotNode},
    exercises::{load_exercise_trees, ExerciseArena, ExerciseTreeError},
};

/// Scores are stored with two decimal places.
const SCORE_SCALE: u32 = 2;

/// Which assessor variant an event uses. Self-service practice is never
/// graded by a human, so pending scores are folded to 0 there.
pub fn policy_for(event: &exams_events::Model) -> GradingPolicy {
    match event.event_kind {
        ExamsEventKind::SelfServicePractice => GradingPolicy::FullyAutomatic,
        ExamsEventKind::Exam => GradingPolicy::BestEffort,
    }
}

/// Score a single slot: correctness, normalized by the exercise max score
/// and scaled by the weight of the rule that picked the exercise.
///
/// `None` means the slot needs manual grading and must stay distinguishable
/// from a zero score.
pub fn assess_slot(
    arena: &ExerciseArena,
    exercise_id: Uuid,
    node: &SlotNode,
    rule_weight: Decimal,
    policy: GradingPolicy,
) -> Result<Option<Decimal>, AssessmentError> {
    let Some(correctness) = correctness(arena, exercise_id, node, policy)? else {
        return Ok(None);
    };
    let max_score = arena.max_score(exercise_id)?;
    if max_score <= Decimal::ZERO {
        return Ok(Some(Decimal::ZERO));
    }
    let exercise = arena
        .get(exercise_id)
        .ok_or(EvaluationError::UnknownExercise(exercise_id))?;
    if exercise.all_or_nothing && correctness < max_score {
        return Ok(Some(Decimal::ZERO));
    }
    Ok(Some(correctness / max_score * rule_weight))
}

/// One base slot of a participation with everything needed to score it.
pub struct BaseSlot {
    pub slot_number: i32,
    pub exercise_id: Uuid,
    pub rule_weight: Decimal,
    pub submission: SlotNode,
    pub assessment: exams_assessment_slots::Model,
}

impl BaseSlot {
    /// A manually entered score always wins over the computed one.
    pub fn effective_score(
        &self,
        arena: &ExerciseArena,
        policy: GradingPolicy,
    ) -> Result<Option<Decimal>, AssessmentError> {
        if let Some(score) = self.assessment.score {
            return Ok(Some(score));
        }
        assess_slot(arena, self.exercise_id, &self.submission, self.rule_weight, policy)
    }
}

/// Load the base slots of a participation, pairing instance, submission and
/// assessment slots by slot number.
pub async fn load_base_slots(
    db: &DatabaseTransaction,
    participation: &exams_participations::Model,
) -> Result<(ExerciseArena, Vec<BaseSlot>), AssessmentError> {
    let instance_slots = exams_instance_slots::Entity::find()
        .filter(exams_instance_slots::Column::InstanceId.eq(participation.instance_id))
        .filter(exams_instance_slots::Column::ParentId.is_null())
        .order_by_asc(exams_instance_slots::Column::SlotNumber)
        .all(db)
        .await?;

    let rule_ids: Vec<Uuid> = instance_slots.iter().filter_map(|s| s.rule_id).collect();
    let rule_weights: HashMap<Uuid, Decimal> = exams_template_rules::Entity::find()
        .filter(exams_template_rules::Column::Id.is_in(rule_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|r| (r.id, r.weight))
        .collect();

    let exercise_ids: Vec<Uuid> = instance_slots.iter().map(|s| s.exercise_id).collect();
    let arena = load_exercise_trees(db, &exercise_ids).await?;

    let submission_slots = exams_submission_slots::Entity::find()
        .filter(exams_submission_slots::Column::ParticipationId.eq(participation.id))
        .all(db)
        .await?;
    let submissions: HashMap<i32, SlotNode> = SlotNode::build_forest(submission_slots)?
        .into_iter()
        .map(|node| (node.slot.slot_number, node))
        .collect();

    let assessments: HashMap<i32, exams_assessment_slots::Model> =
        exams_assessment_slots::Entity::find()
            .filter(exams_assessment_slots::Column::ParticipationId.eq(participation.id))
            .filter(exams_assessment_slots::Column::ParentId.is_null())
            .all(db)
            .await?
            .into_iter()
            .map(|slot| (slot.slot_number, slot))
            .collect();

    let mut base = Vec::with_capacity(instance_slots.len());
    for instance_slot in instance_slots {
        let number = instance_slot.slot_number;
        let submission = submissions
            .get(&number)
            .cloned()
            .ok_or(AssessmentError::MissingSlot(number))?;
        let assessment = assessments
            .get(&number)
            .cloned()
            .ok_or(AssessmentError::MissingSlot(number))?;
        base.push(BaseSlot {
            slot_number: number,
            exercise_id: instance_slot.exercise_id,
            rule_weight: instance_slot
                .rule_id
                .and_then(|id| rule_weights.get(&id).copied())
                .unwrap_or(Decimal::ONE),
            submission,
            assessment,
        });
    }
    Ok((arena, base))
}

/// Compute the score of one slot of a participation.
pub async fn slot_score(
    db: &DatabaseTransaction,
    event: &exams_events::Model,
    participation: &exams_participations::Model,
    slot_number: i32,
) -> Result<Option<Decimal>, AssessmentError> {
    let (arena, base) = load_base_slots(db, participation).await?;
    let slot = base
        .iter()
        .find(|s| s.slot_number == slot_number)
        .ok_or(AssessmentError::MissingSlot(slot_number))?;
    slot.effective_score(&arena, policy_for(event))
}

/// Persist computed scores for every base slot that has not been graded
/// manually. Slots the assessor cannot grade stay pending under the
/// best-effort policy and are left untouched.
///
/// Safe to run any number of times, including for a teacher-triggered
/// re-assessment after test cases or choices changed.
pub async fn autograde_participation(
    db: &DatabaseTransaction,
    event: &exams_events::Model,
    participation: &exams_participations::Model,
) -> Result<(), AssessmentError> {
    let policy = policy_for(event);
    let (arena, base) = load_base_slots(db, participation).await?;
    for slot in base {
        if slot.assessment.score.is_some() {
            continue;
        }
        let computed = assess_slot(
            &arena,
            slot.exercise_id,
            &slot.submission,
            slot.rule_weight,
            policy,
        )?;
        if let Some(score) = computed {
            exams_assessment_slots::ActiveModel {
                id: Unchanged(slot.assessment.id),
                score: Set(Some(score.round_dp(SCORE_SCALE))),
                ..Default::default()
            }
            .update(db)
            .await?;
        }
    }
    Ok(())
}

/// Record a manual grade (and optionally a comment) on a slot.
pub async fn grade_slot(
    db: &DatabaseTransaction,
    participation: &exams_participations::Model,
    slot_number: i32,
    score: Option<Decimal>,
    comment: Option<String>,
) -> Result<exams_assessment_slots::Model, AssessmentError> {
    let slot = exams_assessment_slots::Entity::find()
        .filter(exams_assessment_slots::Column::ParticipationId.eq(participation.id))
        .filter(exams_assessment_slots::Column::ParentId.is_null())
        .filter(exams_assessment_slots::Column::SlotNumber.eq(slot_number))
        .one(db)
        .await?
        .ok_or(AssessmentError::MissingSlot(slot_number))?;
    Ok(exams_assessment_slots::ActiveModel {
        id: Unchanged(slot.id),
        score: Set(score.map(|s| s.round_dp(SCORE_SCALE))),
        comment: match comment {
            Some(comment) => Set(comment),
            None => Unchanged(slot.comment),
        },
        ..Default::default()
    }
    .update(db)
    .await?)
}

/// Total score of a participation: the manual override if a teacher set
/// one, otherwise the sum over base slots with pending slots counting as 0.
pub async fn participation_score(
    db: &DatabaseTransaction,
    event: &exams_events::Model,
    participation: &exams_participations::Model,
) -> Result<Decimal, AssessmentError> {
    if let Some(score) = participation.score_override {
        return Ok(score);
    }
    let policy = policy_for(event);
    let (arena, base) = load_base_slots(db, participation).await?;
    let mut total = Decimal::ZERO;
    for slot in &base {
        total += slot.effective_score(&arena, policy)?.unwrap_or(Decimal::ZERO);
    }
    Ok(total.round_dp(SCORE_SCALE))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssessmentProgress {
    NotAssessed,
    PartiallyAssessed,
    FullyAssessed,
}

/// How far grading of a participation has come. Derived from slot score
/// nullness, never stored.
pub async fn assessment_progress(
    db: &DatabaseTransaction,
    event: &exams_events::Model,
    participation: &exams_participations::Model,
) -> Result<AssessmentProgress, AssessmentError> {
    let policy = policy_for(event);
    let (arena, base) = load_base_slots(db, participation).await?;
    let mut graded = 0;
    for slot in &base {
        graded += slot.effective_score(&arena, policy)?.is_some() as usize;
    }
    Ok(if base.is_empty() || graded == 0 {
        AssessmentProgress::NotAssessed
    } else if graded == base.len() {
        AssessmentProgress::FullyAssessed
    } else {
        AssessmentProgress::PartiallyAssessed
    })
}

#[derive(Debug, Error)]
pub enum AssessmentError {
    #[error("database error: {0}")]
    Db(#[from] DbErr),
    #[error("evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),
    #[error("exercise tree error: {0}")]
    Tree(#[from] ExerciseTreeError),
    #[error("participation has no slot numbered {0}")]
    MissingSlot(i32),
}

#[cfg(test)]
mod tests {
    use entity::sea_orm_active_enums::ExamsExerciseKind;

    use super::super::evaluation::tests::{node, slot};
    use super::super::exercises::tests::{choice, exercise};
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn weighted_composite() -> ExerciseArena {
        // sub-exercise weights [2, 1, 1], each sub worth at most 1
        ExerciseArena::new(
            vec![
                exercise(1, None, ExamsExerciseKind::Completion, Decimal::ONE),
                exercise(2, Some(1), ExamsExerciseKind::SingleChoice, dec("2")),
                exercise(3, Some(1), ExamsExerciseKind::SingleChoice, dec("1")),
                exercise(4, Some(1), ExamsExerciseKind::SingleChoice, dec("1")),
            ],
            vec![
                choice(20, 2, dec("1")),
                choice(30, 3, dec("1")),
                choice(31, 3, dec("-0.1")),
                choice(40, 4, dec("1")),
            ],
        )
    }

    fn composite_answer(selected: [u128; 3]) -> SlotNode {
        let mut children = vec![];
        for (number, choice_id) in selected.into_iter().enumerate() {
            let mut child = slot(101 + number as u128, Some(100), number as i32);
            child.selected_choice_ids = vec![Uuid::from_u128(choice_id)];
            children.push(node(child));
        }
        SlotNode {
            slot: slot(100, None, 0),
            children,
        }
    }

    #[test]
    fn weighted_aggregation_is_exact() {
        let arena = weighted_composite();
        // max score is 2*1 + 1*1 + 1*1 = 4, rule weight 2

        let full = composite_answer([20, 30, 40]);
        let score = assess_slot(
            &arena,
            Uuid::from_u128(1),
            &full,
            dec("2"),
            GradingPolicy::BestEffort,
        )
        .unwrap();
        assert_eq!(score, Some(dec("2.00")));

        // one sub-answer worth -0.1: (2 + (-0.1) + 1) / 4 * 2 = 1.45 exactly
        let partial = composite_answer([20, 31, 40]);
        let score = assess_slot(
            &arena,
            Uuid::from_u128(1),
            &partial,
            dec("2"),
            GradingPolicy::BestEffort,
        )
        .unwrap();
        assert_eq!(score, Some(dec("1.45")));
    }

    #[test]
    fn all_or_nothing_denies_partial_credit() {
        let mut parent = exercise(1, None, ExamsExerciseKind::MultiChoice, Decimal::ONE);
        parent.all_or_nothing = true;
        let arena = ExerciseArena::new(
            vec![parent],
            vec![choice(10, 1, dec("9.999")), choice(11, 1, dec("0.001"))],
        );
        // max score 10; a correctness of 9.999 still scores 0
        let mut answer = slot(100, None, 0);
        answer.selected_choice_ids = vec![Uuid::from_u128(10)];
        let score = assess_slot(
            &arena,
            Uuid::from_u128(1),
            &node(answer),
            dec("10"),
            GradingPolicy::BestEffort,
        )
        .unwrap();
        assert_eq!(score, Some(Decimal::ZERO));

        // full marks pass through untouched
        let mut answer = slot(100, None, 0);
        answer.selected_choice_ids = vec![Uuid::from_u128(10), Uuid::from_u128(11)];
        let score = assess_slot(
            &arena,
            Uuid::from_u128(1),
            &node(answer),
            dec("10"),
            GradingPolicy::BestEffort,
        )
        .unwrap();
        assert_eq!(score, Some(dec("10")));
    }

    #[test]
    fn zero_max_score_short_circuits() {
        let arena = ExerciseArena::new(
            vec![exercise(1, None, ExamsExerciseKind::C, Decimal::ONE)],
            vec![],
        );
        // no configured max score: whatever the test cases say, score is 0
        let mut answer = slot(100, None, 0);
        answer.answer_text = "int main() { return 0; }".into();
        let score = assess_slot(
            &arena,
            Uuid::from_u128(1),
            &node(answer),
            dec("3"),
            GradingPolicy::BestEffort,
        )
        .unwrap();
        assert_eq!(score, Some(Decimal::ZERO));
    }

    #[test]
    fn pending_grading_is_not_zero() {
        let arena = ExerciseArena::new(
            vec![exercise(1, None, ExamsExerciseKind::OpenAnswer, Decimal::ONE)],
            vec![],
        );
        let answer = node(slot(100, None, 0));
        let score = assess_slot(
            &arena,
            Uuid::from_u128(1),
            &answer,
            dec("2"),
            GradingPolicy::BestEffort,
        )
        .unwrap();
        assert_eq!(score, None);
    }
}
