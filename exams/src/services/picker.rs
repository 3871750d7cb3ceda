use std::collections::HashSet;

use entity::{
    exams_event_templates, exams_exercises, exams_instance_slots, exams_participations,
    exams_template_rule_clauses, exams_template_rules,
    sea_orm_active_enums::{ExamsExerciseState, ExamsRuleKind},
};
use rand::{rngs::StdRng, seq::index, seq::SliceRandom, Rng, SeedableRng};
use sea_orm::{ColumnTrait, DatabaseTransaction, DbErr, EntityTrait, QueryFilter, QueryOrder};
use thiserror::Error;
use uuid::Uuid;

/// A template rule together with its tag clauses.
pub type RuleWithClauses = (
    exams_template_rules::Model,
    Vec<exams_template_rule_clauses::Model>,
);

/// Apply the rules of a template to a pool of candidate exercises.
///
/// Rules are processed in order and never pick an exercise twice. The
/// returned pairs keep the rule that picked each exercise; when the template
/// randomizes the order, the pairs are shuffled as units.
///
/// Selection is uniformly random, so callers (and tests) can only rely on
/// set membership, not on the exact sequence.
pub fn pick_exercises(
    template: &exams_event_templates::Model,
    rules: &[RuleWithClauses],
    pool: &[exams_exercises::Model],
    rng: &mut impl Rng,
) -> Vec<(exams_exercises::Model, exams_template_rules::Model)> {
    let mut picked: Vec<(exams_exercises::Model, exams_template_rules::Model)> = vec![];
    let mut picked_ids: HashSet<Uuid> = HashSet::new();

    for (rule, clauses) in rules {
        let eligible: Vec<&exams_exercises::Model> = pool
            .iter()
            .filter(|exercise| !picked_ids.contains(&exercise.id))
            .filter(|exercise| match rule.rule_kind {
                ExamsRuleKind::IdBased => rule.exercise_ids.contains(&exercise.id),
                ExamsRuleKind::TagBased => {
                    exercise.state != ExamsExerciseState::Draft
                        && clauses.iter().all(|clause| {
                            clause.tag_ids.iter().any(|tag| {
                                exercise.public_tag_ids.contains(tag)
                                    || (!rule.public_tags_only
                                        && exercise.private_tag_ids.contains(tag))
                            })
                        })
                }
            })
            .collect();

        // an amount larger than the pool clamps instead of erroring
        let amount = (rule.amount.max(0) as usize).min(eligible.len());
        for i in index::sample(rng, eligible.len(), amount) {
            let exercise = eligible[i].clone();
            picked_ids.insert(exercise.id);
            picked.push((exercise, rule.clone()));
        }
    }

    if template.randomize_rule_order {
        picked.shuffle(rng);
    }
    picked
}

/// Pick the exercises for a new instance of `template` from the database.
///
/// `exclude_seen_by` drops exercises that already appeared in any of that
/// user's participations; `public_only` narrows the pool to published
/// exercises.
pub async fn pick_for_template(
    db: &DatabaseTransaction,
    template: &exams_event_templates::Model,
    exclude_seen_by: Option<Uuid>,
    public_only: bool,
) -> Result<Vec<(exams_exercises::Model, exams_template_rules::Model)>, PickError> {
    let rules = exams_template_rules::Entity::find()
        .filter(exams_template_rules::Column::TemplateId.eq(template.id))
        .order_by_asc(exams_template_rules::Column::Position)
        .all(db)
        .await?;
    let clauses = exams_template_rule_clauses::Entity::find()
        .filter(
            exams_template_rule_clauses::Column::RuleId
                .is_in(rules.iter().map(|r| r.id).collect::<Vec<_>>()),
        )
        .all(db)
        .await?;
    let rules: Vec<RuleWithClauses> = rules
        .into_iter()
        .map(|rule| {
            let rule_clauses = clauses.iter().filter(|c| c.rule_id == rule.id).cloned().collect();
            (rule, rule_clauses)
        })
        .collect();

    let mut query = exams_exercises::Entity::find()
        .filter(exams_exercises::Column::ParentId.is_null());
    if public_only {
        query = query.filter(exams_exercises::Column::State.eq(ExamsExerciseState::Public));
    }
    if let Some(user_id) = exclude_seen_by {
        let instance_ids: Vec<Uuid> = exams_participations::Entity::find()
            .filter(exams_participations::Column::UserId.eq(user_id))
            .all(db)
            .await?
            .into_iter()
            .map(|p| p.instance_id)
            .collect();
        let seen: Vec<Uuid> = exams_instance_slots::Entity::find()
            .filter(exams_instance_slots::Column::InstanceId.is_in(instance_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|s| s.exercise_id)
            .collect();
        if !seen.is_empty() {
            query = query.filter(exams_exercises::Column::Id.is_not_in(seen));
        }
    }
    let pool = query.all(db).await?;

    let mut rng = StdRng::from_entropy();
    Ok(pick_exercises(template, &rules, &pool, &mut rng))
}

#[derive(Debug, Error)]
pub enum PickError {
    #[error("database error: {0}")]
    Db(#[from] DbErr),
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;
    use entity::sea_orm_active_enums::ExamsExerciseKind;
    use rust_decimal::Decimal;

    use super::super::exercises::tests::exercise;
    use super::*;

    fn template(randomize: bool) -> exams_event_templates::Model {
        exams_event_templates::Model {
            id: Uuid::from_u128(500),
            name: "midterm".into(),
            randomize_rule_order: randomize,
            creation_timestamp: NaiveDateTime::default(),
        }
    }

    fn id_rule(id: u128, position: i32, amount: i32, exercises: &[u128]) -> RuleWithClauses {
        (
            exams_template_rules::Model {
                id: Uuid::from_u128(id),
                template_id: Uuid::from_u128(500),
                rule_kind: ExamsRuleKind::IdBased,
                weight: Decimal::ONE,
                amount,
                exercise_ids: exercises.iter().copied().map(Uuid::from_u128).collect(),
                public_tags_only: false,
                position,
            },
            vec![],
        )
    }

    fn tag_rule(id: u128, position: i32, amount: i32, clauses: &[&[u128]]) -> RuleWithClauses {
        (
            exams_template_rules::Model {
                id: Uuid::from_u128(id),
                template_id: Uuid::from_u128(500),
                rule_kind: ExamsRuleKind::TagBased,
                weight: Decimal::ONE,
                amount,
                exercise_ids: vec![],
                public_tags_only: false,
                position,
            },
            clauses
                .iter()
                .enumerate()
                .map(|(i, tags)| exams_template_rule_clauses::Model {
                    id: Uuid::from_u128(id * 100 + i as u128),
                    rule_id: Uuid::from_u128(id),
                    tag_ids: tags.iter().copied().map(Uuid::from_u128).collect(),
                })
                .collect(),
        )
    }

    fn tagged(id: u128, public_tags: &[u128]) -> exams_exercises::Model {
        let mut model = exercise(id, None, ExamsExerciseKind::SingleChoice, Decimal::ONE);
        model.public_tag_ids = public_tags.iter().copied().map(Uuid::from_u128).collect();
        model
    }

    #[test]
    fn id_rule_clamps_to_available_pool() {
        let pool = vec![tagged(1, &[]), tagged(2, &[]), tagged(3, &[])];
        let rules = vec![id_rule(600, 0, 5, &[1, 2])];
        let mut rng = StdRng::seed_from_u64(7);
        let picked = pick_exercises(&template(false), &rules, &pool, &mut rng);

        let ids: HashSet<Uuid> = picked.iter().map(|(e, _)| e.id).collect();
        assert_eq!(picked.len(), 2);
        assert_eq!(ids, [Uuid::from_u128(1), Uuid::from_u128(2)].into());
    }

    #[test]
    fn rules_never_pick_the_same_exercise_twice() {
        let pool = vec![tagged(1, &[]), tagged(2, &[]), tagged(3, &[])];
        let rules = vec![
            id_rule(600, 0, 2, &[1, 2, 3]),
            id_rule(601, 1, 3, &[1, 2, 3]),
        ];
        for seed in 0..32 {
            let mut rng = StdRng::seed_from_u64(seed);
            let picked = pick_exercises(&template(false), &rules, &pool, &mut rng);
            let ids: HashSet<Uuid> = picked.iter().map(|(e, _)| e.id).collect();
            assert_eq!(picked.len(), 3);
            assert_eq!(ids.len(), 3);
        }
    }

    #[test]
    fn clauses_and_together_tags_or_within() {
        // clause {a, b} AND clause {c}
        let (a, b, c) = (1, 2, 3);
        let pool = vec![
            tagged(10, &[a, c]),
            tagged(11, &[b]),
            tagged(12, &[c]),
            tagged(13, &[b, c]),
        ];
        let rules = vec![tag_rule(600, 0, 10, &[&[a, b], &[c]])];
        let mut rng = StdRng::seed_from_u64(3);
        let picked = pick_exercises(&template(false), &rules, &pool, &mut rng);

        let ids: HashSet<Uuid> = picked.iter().map(|(e, _)| e.id).collect();
        assert_eq!(ids, [Uuid::from_u128(10), Uuid::from_u128(13)].into());
    }

    #[test]
    fn tag_rules_skip_drafts_and_private_tags_when_restricted() {
        let tag = 1;
        let mut draft = tagged(10, &[tag]);
        draft.state = ExamsExerciseState::Draft;
        let mut private = tagged(11, &[]);
        private.private_tag_ids = vec![Uuid::from_u128(tag)];
        let public = tagged(12, &[tag]);
        let pool = vec![draft, private, public];

        let mut restricted = tag_rule(600, 0, 10, &[&[tag]]);
        restricted.0.public_tags_only = true;
        let mut rng = StdRng::seed_from_u64(11);
        let picked = pick_exercises(&template(false), &[restricted], &pool, &mut rng);
        let ids: HashSet<Uuid> = picked.iter().map(|(e, _)| e.id).collect();
        assert_eq!(ids, [Uuid::from_u128(12)].into());

        // with private tags allowed, the privately tagged exercise matches too
        let unrestricted = tag_rule(601, 0, 10, &[&[tag]]);
        let mut rng = StdRng::seed_from_u64(11);
        let picked = pick_exercises(&template(false), &[unrestricted], &pool, &mut rng);
        let ids: HashSet<Uuid> = picked.iter().map(|(e, _)| e.id).collect();
        assert_eq!(ids, [Uuid::from_u128(11), Uuid::from_u128(12)].into());
    }

    #[test]
    fn shuffling_preserves_rule_pairing() {
        let pool: Vec<_> = (1..=8).map(|id| tagged(id, &[])).collect();
        let rules = vec![
            id_rule(600, 0, 2, &[1, 2, 3, 4]),
            id_rule(601, 1, 2, &[5, 6, 7, 8]),
        ];
        for seed in 0..32 {
            let mut rng = StdRng::seed_from_u64(seed);
            let picked = pick_exercises(&template(true), &rules, &pool, &mut rng);
            assert_eq!(picked.len(), 4);
            for (exercise, rule) in &picked {
                assert!(rule.exercise_ids.contains(&exercise.id));
            }
        }
    }
}
