use std::collections::HashMap;

use entity::{
    exams_exercise_choices, exams_exercise_testcases, exams_exercises,
    sea_orm_active_enums::ExamsExerciseKind,
};
use itertools::Itertools;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseTransaction, DbErr, EntityTrait, QueryFilter, QueryOrder};
use thiserror::Error;
use uuid::Uuid;

/// Upper bound on the depth of an exercise tree. The parent relation is not
/// guarded against cycles at the storage layer, so every traversal carries
/// this limit.
pub const MAX_EXERCISE_DEPTH: usize = 16;

/// In-memory view of one or more exercise trees, keyed by exercise id.
///
/// Children are ordered by their `position` column, matching the order in
/// which sub-slots are numbered when an instance is materialized.
pub struct ExerciseArena {
    exercises: HashMap<Uuid, exams_exercises::Model>,
    children: HashMap<Uuid, Vec<Uuid>>,
    choices: HashMap<Uuid, Vec<exams_exercise_choices::Model>>,
}

impl ExerciseArena {
    pub fn new(
        exercises: Vec<exams_exercises::Model>,
        choices: Vec<exams_exercise_choices::Model>,
    ) -> Self {
        let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for exercise in exercises
            .iter()
            .sorted_by_key(|e| (e.parent_id, e.position, e.id))
        {
            if let Some(parent_id) = exercise.parent_id {
                children.entry(parent_id).or_default().push(exercise.id);
            }
        }
        let mut choices_by_exercise: HashMap<Uuid, Vec<_>> = HashMap::new();
        for choice in choices
            .into_iter()
            .sorted_by_key(|c| (c.exercise_id, c.position, c.id))
        {
            choices_by_exercise
                .entry(choice.exercise_id)
                .or_default()
                .push(choice);
        }
        Self {
            exercises: exercises.into_iter().map(|e| (e.id, e)).collect(),
            children,
            choices: choices_by_exercise,
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&exams_exercises::Model> {
        self.exercises.get(&id)
    }

    pub fn children(&self, id: Uuid) -> &[Uuid] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn choices(&self, id: Uuid) -> &[exams_exercise_choices::Model] {
        self.choices.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    /// The highest score attainable on an exercise. How it is derived depends
    /// on the exercise kind; kinds without a derivable maximum fall back to
    /// the configured `max_score` column (0 when unset).
    pub fn max_score(&self, id: Uuid) -> Result<Decimal, ExerciseTreeError> {
        self.max_score_at(id, 0)
    }

    fn max_score_at(&self, id: Uuid, depth: usize) -> Result<Decimal, ExerciseTreeError> {
        if depth > MAX_EXERCISE_DEPTH {
            return Err(ExerciseTreeError::TooDeep);
        }
        let exercise = self
            .exercises
            .get(&id)
            .ok_or(ExerciseTreeError::UnknownExercise(id))?;
        Ok(match exercise.exercise_kind {
            ExamsExerciseKind::MultiChoice => self
                .choices(id)
                .iter()
                .filter(|c| c.correctness > Decimal::ZERO)
                .map(|c| c.correctness)
                .sum(),
            ExamsExerciseKind::SingleChoice => self
                .choices(id)
                .iter()
                .map(|c| c.correctness)
                .max()
                .unwrap_or(Decimal::ZERO),
            ExamsExerciseKind::Completion | ExamsExerciseKind::Aggregated => {
                let mut total = Decimal::ZERO;
                for &child_id in self.children(id) {
                    let child = self
                        .exercises
                        .get(&child_id)
                        .ok_or(ExerciseTreeError::UnknownExercise(child_id))?;
                    total += child.child_weight * self.max_score_at(child_id, depth + 1)?;
                }
                total
            }
            _ => exercise.max_score.unwrap_or(Decimal::ZERO),
        })
    }
}

/// Load the full trees rooted at `root_ids`, including choices, into an
/// arena. Traversal is breadth-first per level so a malformed parent chain
/// cannot loop past [`MAX_EXERCISE_DEPTH`].
pub async fn load_exercise_trees(
    db: &DatabaseTransaction,
    root_ids: &[Uuid],
) -> Result<ExerciseArena, ExerciseTreeError> {
    let mut all = exams_exercises::Entity::find()
        .filter(exams_exercises::Column::Id.is_in(root_ids.to_vec()))
        .all(db)
        .await?;
    let mut frontier: Vec<Uuid> = all.iter().map(|e| e.id).collect();
    let mut depth = 0;
    while !frontier.is_empty() {
        if depth > MAX_EXERCISE_DEPTH {
            return Err(ExerciseTreeError::TooDeep);
        }
        let level = exams_exercises::Entity::find()
            .filter(exams_exercises::Column::ParentId.is_in(frontier))
            .order_by_asc(exams_exercises::Column::Position)
            .all(db)
            .await?;
        frontier = level.iter().map(|e| e.id).collect();
        all.extend(level);
        depth += 1;
    }

    let ids: Vec<Uuid> = all.iter().map(|e| e.id).collect();
    let choices = exams_exercise_choices::Entity::find()
        .filter(exams_exercise_choices::Column::ExerciseId.is_in(ids))
        .order_by_asc(exams_exercise_choices::Column::Position)
        .all(db)
        .await?;

    Ok(ExerciseArena::new(all, choices))
}

/// Load the test cases of a programming exercise in position order.
pub async fn load_testcases(
    db: &DatabaseTransaction,
    exercise_id: Uuid,
) -> Result<Vec<exams_exercise_testcases::Model>, DbErr> {
    exams_exercise_testcases::Entity::find()
        .filter(exams_exercise_testcases::Column::ExerciseId.eq(exercise_id))
        .order_by_asc(exams_exercise_testcases::Column::Position)
        .all(db)
        .await
}

#[derive(Debug, Error)]
pub enum ExerciseTreeError {
    #[error("database error: {0}")]
    Db(#[from] DbErr),
    #[error("exercise tree exceeds {MAX_EXERCISE_DEPTH} levels")]
    TooDeep,
    #[error("exercise {0} is not part of the loaded tree")]
    UnknownExercise(Uuid),
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::NaiveDateTime;
    use entity::sea_orm_active_enums::ExamsExerciseState;

    use super::*;

    pub(crate) fn exercise(
        id: u128,
        parent: Option<u128>,
        kind: ExamsExerciseKind,
        child_weight: Decimal,
    ) -> exams_exercises::Model {
        exams_exercises::Model {
            id: Uuid::from_u128(id),
            parent_id: parent.map(Uuid::from_u128),
            exercise_kind: kind,
            state: ExamsExerciseState::Public,
            label: String::new(),
            text: String::new(),
            solution: String::new(),
            initial_code: String::new(),
            child_weight,
            max_score: None,
            all_or_nothing: false,
            public_tag_ids: vec![],
            private_tag_ids: vec![],
            position: id as i32,
            creation_timestamp: NaiveDateTime::default(),
        }
    }

    pub(crate) fn choice(
        id: u128,
        exercise: u128,
        correctness: Decimal,
    ) -> exams_exercise_choices::Model {
        exams_exercise_choices::Model {
            id: Uuid::from_u128(id),
            exercise_id: Uuid::from_u128(exercise),
            text: String::new(),
            correctness,
            position: id as i32,
        }
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn multi_choice_max_score_sums_positive_choices() {
        let arena = ExerciseArena::new(
            vec![exercise(1, None, ExamsExerciseKind::MultiChoice, Decimal::ONE)],
            vec![
                choice(10, 1, dec("1")),
                choice(11, 1, dec("0.5")),
                choice(12, 1, dec("-2")),
            ],
        );
        assert_eq!(arena.max_score(Uuid::from_u128(1)).unwrap(), dec("1.5"));
    }

    #[test]
    fn single_choice_max_score_is_best_choice() {
        let arena = ExerciseArena::new(
            vec![exercise(1, None, ExamsExerciseKind::SingleChoice, Decimal::ONE)],
            vec![
                choice(10, 1, dec("0.25")),
                choice(11, 1, dec("1")),
                choice(12, 1, dec("-1")),
            ],
        );
        assert_eq!(arena.max_score(Uuid::from_u128(1)).unwrap(), dec("1"));
    }

    #[test]
    fn composite_max_score_weights_children() {
        // weights [2, 1, 1] over single-choice children each worth 1
        let arena = ExerciseArena::new(
            vec![
                exercise(1, None, ExamsExerciseKind::Aggregated, Decimal::ONE),
                exercise(2, Some(1), ExamsExerciseKind::SingleChoice, dec("2")),
                exercise(3, Some(1), ExamsExerciseKind::SingleChoice, dec("1")),
                exercise(4, Some(1), ExamsExerciseKind::SingleChoice, dec("1")),
            ],
            vec![
                choice(20, 2, dec("1")),
                choice(30, 3, dec("1")),
                choice(40, 4, dec("1")),
            ],
        );
        assert_eq!(arena.max_score(Uuid::from_u128(1)).unwrap(), dec("4"));
    }

    #[test]
    fn configured_max_score_for_programming() {
        let mut model = exercise(1, None, ExamsExerciseKind::C, Decimal::ONE);
        model.max_score = Some(dec("3"));
        let arena = ExerciseArena::new(vec![model], vec![]);
        assert_eq!(arena.max_score(Uuid::from_u128(1)).unwrap(), dec("3"));

        let arena = ExerciseArena::new(
            vec![exercise(2, None, ExamsExerciseKind::OpenAnswer, Decimal::ONE)],
            vec![],
        );
        assert_eq!(arena.max_score(Uuid::from_u128(2)).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn cyclic_parent_chain_is_rejected() {
        // two exercises claiming each other as parent
        let a = exercise(1, Some(2), ExamsExerciseKind::Aggregated, Decimal::ONE);
        let b = exercise(2, Some(1), ExamsExerciseKind::Aggregated, Decimal::ONE);
        let arena = ExerciseArena::new(vec![a, b], vec![]);
        assert!(matches!(
            arena.max_score(Uuid::from_u128(1)),
            Err(ExerciseTreeError::TooDeep)
        ));
    }
}
