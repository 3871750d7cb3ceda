use std::collections::{HashMap, VecDeque};

use chrono::{Duration, NaiveDateTime, Utc};
use entity::{
    exams_assessment_slots, exams_event_instances, exams_events, exams_instance_slots,
    exams_participations, exams_submission_slots,
    sea_orm_active_enums::ExamsParticipationState,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait, Unchanged,
};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::{
    assessment::{autograde_participation, AssessmentError},
    exercises::{load_exercise_trees, ExerciseTreeError, MAX_EXERCISE_DEPTH},
    picker::{pick_for_template, PickError},
};

/// Extra seconds granted past the time limit before mutations are rejected.
pub const TIME_LIMIT_GRACE_SECONDS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorDirection {
    Forward,
    Back,
}

/// Find the participation of a user in an event, if any.
pub async fn get_participation(
    db: &DatabaseConnection,
    event_id: Uuid,
    user_id: Uuid,
) -> Result<Option<exams_participations::Model>, DbErr> {
    exams_participations::Entity::find()
        .filter(exams_participations::Column::EventId.eq(event_id))
        .filter(exams_participations::Column::UserId.eq(user_id))
        .one(db)
        .await
}

/// Create the participation of `user_id` in `event`, materializing a fresh
/// event instance from the event's template.
///
/// There is exactly one participation per (event, user) pair: when a
/// concurrent request wins the creation race, the unique violation is
/// detected and the existing row is returned instead of an error.
pub async fn create_participation(
    db: &DatabaseConnection,
    event: &exams_events::Model,
    user_id: Uuid,
) -> Result<exams_participations::Model, ParticipationError> {
    create_participation_inner(db, event, user_id, None).await
}

/// Like [`create_participation`], but with a fixed exercise list instead of
/// the template rules. Used for previews and deterministic test events.
pub async fn create_participation_with_exercises(
    db: &DatabaseConnection,
    event: &exams_events::Model,
    user_id: Uuid,
    exercise_ids: Vec<Uuid>,
) -> Result<exams_participations::Model, ParticipationError> {
    create_participation_inner(db, event, user_id, Some(exercise_ids)).await
}

/// Attach a new participation to an already materialized instance, so that
/// several students work through the exact same exercise sequence.
pub async fn create_participation_in_instance(
    db: &DatabaseConnection,
    event: &exams_events::Model,
    user_id: Uuid,
    instance: &exams_event_instances::Model,
) -> Result<exams_participations::Model, ParticipationError> {
    if let Some(existing) = get_participation(db, event.id, user_id).await? {
        return Ok(existing);
    }

    let txn = db.begin().await?;
    let result = async {
        let now = Utc::now().naive_utc();
        let instance_slots = exams_instance_slots::Entity::find()
            .filter(exams_instance_slots::Column::InstanceId.eq(instance.id))
            .order_by_asc(exams_instance_slots::Column::SlotNumber)
            .all(&txn)
            .await?;
        let participation = insert_participation(&txn, event, user_id, instance.id, now).await?;
        // parents must be created before their sub-slots
        let ordered = order_parents_first(instance_slots);
        create_side_slots(&txn, &participation, &ordered, now).await?;
        Ok(participation)
    }
    .await;
    finish_creation(db, txn, event, user_id, result).await
}

async fn create_participation_inner(
    db: &DatabaseConnection,
    event: &exams_events::Model,
    user_id: Uuid,
    fixed_exercises: Option<Vec<Uuid>>,
) -> Result<exams_participations::Model, ParticipationError> {
    if let Some(existing) = get_participation(db, event.id, user_id).await? {
        return Ok(existing);
    }

    let txn = db.begin().await?;
    let result = try_create(&txn, event, user_id, fixed_exercises).await;
    finish_creation(db, txn, event, user_id, result).await
}

/// Commit a successful creation, or recover from losing the creation race
/// by re-fetching the row the concurrent winner inserted.
async fn finish_creation(
    db: &DatabaseConnection,
    txn: DatabaseTransaction,
    event: &exams_events::Model,
    user_id: Uuid,
    result: Result<exams_participations::Model, ParticipationError>,
) -> Result<exams_participations::Model, ParticipationError> {
    match result {
        Ok(participation) => {
            txn.commit().await?;
            Ok(participation)
        }
        Err(ParticipationError::Db(err))
            if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
        {
            // a concurrent request created the row first; use theirs
            txn.rollback().await.ok();
            debug!("participation of {user_id} in {} already exists", event.id);
            get_participation(db, event.id, user_id)
                .await?
                .ok_or(ParticipationError::Db(err))
        }
        Err(err) => {
            txn.rollback().await.ok();
            Err(err)
        }
    }
}

/// Reorder a flat slot list so every parent precedes its sub-slots.
fn order_parents_first(
    slots: Vec<exams_instance_slots::Model>,
) -> Vec<exams_instance_slots::Model> {
    let mut by_parent: HashMap<Option<Uuid>, Vec<exams_instance_slots::Model>> = HashMap::new();
    for slot in slots {
        by_parent.entry(slot.parent_id).or_default().push(slot);
    }
    let mut ordered = vec![];
    let mut queue: VecDeque<Option<Uuid>> = VecDeque::from([None]);
    while let Some(parent_id) = queue.pop_front() {
        for slot in by_parent.remove(&parent_id).unwrap_or_default() {
            queue.push_back(Some(slot.id));
            ordered.push(slot);
        }
    }
    ordered
}

async fn try_create(
    db: &DatabaseTransaction,
    event: &exams_events::Model,
    user_id: Uuid,
    fixed_exercises: Option<Vec<Uuid>>,
) -> Result<exams_participations::Model, ParticipationError> {
    let now = Utc::now().naive_utc();

    let picks: Vec<(Uuid, Option<Uuid>)> = match fixed_exercises {
        Some(ids) => ids.into_iter().map(|id| (id, None)).collect(),
        None => {
            let template_id = event
                .template_id
                .ok_or(ParticipationError::EventHasNoTemplate)?;
            let template = entity::exams_event_templates::Entity::find_by_id(template_id)
                .one(db)
                .await?
                .ok_or(ParticipationError::EventHasNoTemplate)?;
            pick_for_template(db, &template, None, false)
                .await?
                .into_iter()
                .map(|(exercise, rule)| (exercise.id, Some(rule.id)))
                .collect()
        }
    };

    let instance = exams_event_instances::ActiveModel {
        id: Set(Uuid::new_v4()),
        event_id: Set(event.id),
        creation_timestamp: Set(now),
    }
    .insert(db)
    .await?;
    let instance_slots = create_instance_slots(db, instance.id, &picks).await?;

    let participation = insert_participation(db, event, user_id, instance.id, now).await?;
    create_side_slots(db, &participation, &instance_slots, now).await?;
    Ok(participation)
}

async fn insert_participation(
    db: &DatabaseTransaction,
    event: &exams_events::Model,
    user_id: Uuid,
    instance_id: Uuid,
    now: NaiveDateTime,
) -> Result<exams_participations::Model, ParticipationError> {
    Ok(exams_participations::ActiveModel {
        id: Set(Uuid::new_v4()),
        event_id: Set(event.id),
        user_id: Set(user_id),
        instance_id: Set(instance_id),
        state: Set(ExamsParticipationState::InProgress),
        current_slot_number: Set(0),
        begin_timestamp: Set(now),
        end_timestamp: Set(None),
        score_override: Set(None),
    }
    .insert(db)
    .await?)
}

/// Write the slot tree of a new instance: one base slot per picked exercise
/// plus sub-slots mirroring each exercise's sub-exercise tree.
async fn create_instance_slots(
    db: &DatabaseTransaction,
    instance_id: Uuid,
    picks: &[(Uuid, Option<Uuid>)],
) -> Result<Vec<exams_instance_slots::Model>, ParticipationError> {
    let exercise_ids: Vec<Uuid> = picks.iter().map(|(id, _)| *id).collect();
    let arena = load_exercise_trees(db, &exercise_ids).await?;

    let mut created = vec![];
    // (exercise, rule, slot number, parent slot, depth), breadth-first
    let mut queue: VecDeque<(Uuid, Option<Uuid>, i32, Option<Uuid>, usize)> = picks
        .iter()
        .enumerate()
        .map(|(i, &(exercise_id, rule_id))| (exercise_id, rule_id, i as i32, None, 0))
        .collect();
    while let Some((exercise_id, rule_id, slot_number, parent_id, depth)) = queue.pop_front() {
        if depth > MAX_EXERCISE_DEPTH {
            return Err(ParticipationError::Tree(ExerciseTreeError::TooDeep));
        }
        let slot = exams_instance_slots::ActiveModel {
            id: Set(Uuid::new_v4()),
            instance_id: Set(instance_id),
            parent_id: Set(parent_id),
            slot_number: Set(slot_number),
            exercise_id: Set(exercise_id),
            rule_id: Set(rule_id),
        }
        .insert(db)
        .await?;
        for (number, &child_id) in arena.children(exercise_id).iter().enumerate() {
            queue.push_back((child_id, None, number as i32, Some(slot.id), depth + 1));
        }
        created.push(slot);
    }
    Ok(created)
}

/// Create the submission and assessment slots of a participation, mirroring
/// the instance slot tree 1:1 by slot number.
async fn create_side_slots(
    db: &DatabaseTransaction,
    participation: &exams_participations::Model,
    instance_slots: &[exams_instance_slots::Model],
    now: NaiveDateTime,
) -> Result<(), ParticipationError> {
    let mut submission_ids: HashMap<Uuid, Uuid> = HashMap::new();
    let mut assessment_ids: HashMap<Uuid, Uuid> = HashMap::new();
    // instance slots are in creation order, so parents precede children
    for slot in instance_slots {
        let submission = exams_submission_slots::ActiveModel {
            id: Set(Uuid::new_v4()),
            participation_id: Set(participation.id),
            parent_id: Set(slot.parent_id.map(|id| submission_ids[&id])),
            slot_number: Set(slot.slot_number),
            seen_at: Set((slot.parent_id.is_none() && slot.slot_number == 0).then_some(now)),
            answered_at: Set(None),
            answer_text: Set(String::new()),
            selected_choice_ids: Set(vec![]),
            attachment: Set(None),
            execution_results: Set(None),
        }
        .insert(db)
        .await?;
        submission_ids.insert(slot.id, submission.id);

        let assessment = exams_assessment_slots::ActiveModel {
            id: Set(Uuid::new_v4()),
            participation_id: Set(participation.id),
            parent_id: Set(slot.parent_id.map(|id| assessment_ids[&id])),
            slot_number: Set(slot.slot_number),
            comment: Set(String::new()),
            score: Set(None),
        }
        .insert(db)
        .await?;
        assessment_ids.insert(slot.id, assessment.id);
    }
    Ok(())
}

/// Where the cursor may move, given the current participation state. Moving
/// the cursor never touches scores.
fn cursor_target(
    state: &ExamsParticipationState,
    current: i32,
    last: i32,
    allow_going_back: bool,
    direction: CursorDirection,
) -> Result<i32, ParticipationError> {
    if *state != ExamsParticipationState::InProgress {
        return Err(ParticipationError::NotInProgress);
    }
    match direction {
        CursorDirection::Forward if current >= last => Err(ParticipationError::CursorAtLastSlot),
        CursorDirection::Forward => Ok(current + 1),
        CursorDirection::Back if current == 0 => Err(ParticipationError::CursorAtFirstSlot),
        CursorDirection::Back if !allow_going_back => {
            Err(ParticipationError::BackwardNavigationDisabled)
        }
        CursorDirection::Back => Ok(current - 1),
    }
}

/// Move the cursor of a participation one base slot forward or back and
/// stamp the newly shown slot as seen.
pub async fn advance_cursor(
    db: &DatabaseTransaction,
    event: &exams_events::Model,
    participation: &exams_participations::Model,
    direction: CursorDirection,
) -> Result<exams_participations::Model, ParticipationError> {
    let last = exams_instance_slots::Entity::find()
        .filter(exams_instance_slots::Column::InstanceId.eq(participation.instance_id))
        .filter(exams_instance_slots::Column::ParentId.is_null())
        .order_by_desc(exams_instance_slots::Column::SlotNumber)
        .one(db)
        .await?
        .map(|slot| slot.slot_number)
        .unwrap_or(0);
    let target = cursor_target(
        &participation.state,
        participation.current_slot_number,
        last,
        event.allow_going_back,
        direction,
    )?;

    let participation = exams_participations::ActiveModel {
        id: Unchanged(participation.id),
        current_slot_number: Set(target),
        ..Default::default()
    }
    .update(db)
    .await?;

    let shown = exams_submission_slots::Entity::find()
        .filter(exams_submission_slots::Column::ParticipationId.eq(participation.id))
        .filter(exams_submission_slots::Column::ParentId.is_null())
        .filter(exams_submission_slots::Column::SlotNumber.eq(target))
        .one(db)
        .await?
        .ok_or(ParticipationError::SlotNotFound(target))?;
    if shown.seen_at.is_none() {
        exams_submission_slots::ActiveModel {
            id: Unchanged(shown.id),
            seen_at: Set(Some(Utc::now().naive_utc())),
            ..Default::default()
        }
        .update(db)
        .await?;
    }

    Ok(participation)
}

/// Turn a participation in. Terminal: there is no way back to
/// `IN_PROGRESS`, and every later slot mutation is rejected.
///
/// Turning in also runs the assessor, so auto-gradable slots carry their
/// score immediately and only manual-only ones stay pending.
pub async fn turn_in(
    db: &DatabaseTransaction,
    event: &exams_events::Model,
    participation: &exams_participations::Model,
) -> Result<exams_participations::Model, ParticipationError> {
    if participation.state != ExamsParticipationState::InProgress {
        return Err(ParticipationError::AlreadyTurnedIn);
    }
    let participation = exams_participations::ActiveModel {
        id: Unchanged(participation.id),
        state: Set(ExamsParticipationState::TurnedIn),
        end_timestamp: Set(Some(Utc::now().naive_utc())),
        ..Default::default()
    }
    .update(db)
    .await?;
    autograde_participation(db, event, &participation).await?;
    Ok(participation)
}

/// A student-visible change to a submission slot. `None` fields are left
/// untouched.
#[derive(Debug, Default, Clone)]
pub struct SlotAnswer {
    pub answer_text: Option<String>,
    pub selected_choice_ids: Option<Vec<Uuid>>,
    pub attachment: Option<String>,
}

impl SlotAnswer {
    fn is_empty(&self) -> bool {
        self.answer_text.as_deref().unwrap_or_default().is_empty()
            && self.selected_choice_ids.as_deref().unwrap_or_default().is_empty()
            && self.attachment.is_none()
    }
}

/// Write a student answer into a submission slot.
///
/// Rejected for turned-in participations regardless of who asks; that
/// invariant lives here rather than in the permission layer.
pub async fn save_answer(
    db: &DatabaseTransaction,
    participation: &exams_participations::Model,
    slot_id: Uuid,
    answer: SlotAnswer,
) -> Result<exams_submission_slots::Model, ParticipationError> {
    ensure_mutable(participation)?;
    let slot = exams_submission_slots::Entity::find_by_id(slot_id)
        .filter(exams_submission_slots::Column::ParticipationId.eq(participation.id))
        .one(db)
        .await?
        .ok_or(ParticipationError::SubmissionSlotNotFound(slot_id))?;

    let answered_at = if slot.answered_at.is_none() && !answer.is_empty() {
        Set(Some(Utc::now().naive_utc()))
    } else {
        Unchanged(slot.answered_at)
    };
    Ok(exams_submission_slots::ActiveModel {
        id: Unchanged(slot.id),
        answer_text: match answer.answer_text {
            Some(text) => Set(text),
            None => Unchanged(slot.answer_text),
        },
        selected_choice_ids: match answer.selected_choice_ids {
            Some(ids) => Set(ids),
            None => Unchanged(slot.selected_choice_ids),
        },
        attachment: match answer.attachment {
            Some(path) => Set(Some(path)),
            None => Unchanged(slot.attachment),
        },
        answered_at,
        ..Default::default()
    }
    .update(db)
    .await?)
}

/// The invariant every slot mutation path checks first.
pub fn ensure_mutable(
    participation: &exams_participations::Model,
) -> Result<(), ParticipationError> {
    match participation.state {
        ExamsParticipationState::InProgress => Ok(()),
        ExamsParticipationState::TurnedIn => Err(ParticipationError::AlreadyTurnedIn),
    }
}

/// The time limit applying to a user in an event, in seconds. Per-user
/// exceptions override the event-wide limit.
pub fn effective_time_limit(event: &exams_events::Model, user_id: Uuid) -> Option<i64> {
    let exceptions: Vec<(Uuid, i64)> =
        serde_json::from_value(event.time_limit_exceptions.clone()).unwrap_or_default();
    exceptions
        .into_iter()
        .find(|(user, _)| *user == user_id)
        .map(|(_, seconds)| seconds)
        .or(event.time_limit_seconds)
}

/// Whether time has run out for a participation. Evaluated lazily on every
/// access; exceeding the limit never auto-submits, it only makes the
/// permission layer reject further mutations.
pub fn is_time_up(
    event: &exams_events::Model,
    participation: &exams_participations::Model,
    now: NaiveDateTime,
    grace_seconds: i64,
) -> bool {
    match effective_time_limit(event, participation.user_id) {
        Some(limit) => {
            now > participation.begin_timestamp + Duration::seconds(limit + grace_seconds)
        }
        None => false,
    }
}

#[derive(Debug, Error)]
pub enum ParticipationError {
    #[error("database error: {0}")]
    Db(#[from] DbErr),
    #[error("exercise pick error: {0}")]
    Pick(#[from] PickError),
    #[error("exercise tree error: {0}")]
    Tree(#[from] ExerciseTreeError),
    #[error("assessment error: {0}")]
    Assessment(#[from] AssessmentError),
    #[error("event has no template to build an instance from")]
    EventHasNoTemplate,
    #[error("participation has been turned in")]
    AlreadyTurnedIn,
    #[error("participation is not in progress")]
    NotInProgress,
    #[error("cursor is already on the last slot")]
    CursorAtLastSlot,
    #[error("cursor is already on the first slot")]
    CursorAtFirstSlot,
    #[error("going back is disabled for this event")]
    BackwardNavigationDisabled,
    #[error("no base slot numbered {0}")]
    SlotNotFound(i32),
    #[error("submission slot {0} does not belong to this participation")]
    SubmissionSlotNotFound(Uuid),
}

#[cfg(test)]
mod tests {
    use entity::sea_orm_active_enums::ExamsEventKind;
    use serde_json::json;

    use super::*;

    fn event(time_limit: Option<i64>, exceptions: serde_json::Value) -> exams_events::Model {
        exams_events::Model {
            id: Uuid::from_u128(800),
            name: "final".into(),
            event_kind: ExamsEventKind::Exam,
            template_id: None,
            time_limit_seconds: time_limit,
            time_limit_exceptions: exceptions,
            allow_going_back: true,
            creator: Uuid::from_u128(1),
            creation_timestamp: NaiveDateTime::default(),
        }
    }

    fn participation(
        state: ExamsParticipationState,
        begin: NaiveDateTime,
    ) -> exams_participations::Model {
        exams_participations::Model {
            id: Uuid::from_u128(900),
            event_id: Uuid::from_u128(800),
            user_id: Uuid::from_u128(7),
            instance_id: Uuid::from_u128(850),
            state,
            current_slot_number: 0,
            begin_timestamp: begin,
            end_timestamp: None,
            score_override: None,
        }
    }

    fn ts(seconds: i64) -> NaiveDateTime {
        NaiveDateTime::default() + Duration::seconds(seconds)
    }

    fn instance_slot(id: u128, parent: Option<u128>, slot_number: i32) -> exams_instance_slots::Model {
        exams_instance_slots::Model {
            id: Uuid::from_u128(id),
            instance_id: Uuid::from_u128(850),
            parent_id: parent.map(Uuid::from_u128),
            slot_number,
            exercise_id: Uuid::from_u128(id + 1000),
            rule_id: None,
        }
    }

    #[test]
    fn parents_come_before_sub_slots() {
        // children listed before their parents in the input
        let slots = vec![
            instance_slot(20, Some(2), 0),
            instance_slot(21, Some(2), 1),
            instance_slot(1, None, 0),
            instance_slot(2, None, 1),
            instance_slot(200, Some(20), 0),
        ];
        let ordered = order_parents_first(slots);
        let ids: Vec<u128> = ordered.iter().map(|s| s.id.as_u128()).collect();
        assert_eq!(ids, vec![1, 2, 20, 21, 200]);
    }

    #[test]
    fn cursor_guards() {
        let in_progress = ExamsParticipationState::InProgress;
        assert_eq!(
            cursor_target(&in_progress, 0, 2, true, CursorDirection::Forward).unwrap(),
            1
        );
        assert_eq!(
            cursor_target(&in_progress, 2, 2, true, CursorDirection::Back).unwrap(),
            1
        );
        assert!(matches!(
            cursor_target(&in_progress, 2, 2, true, CursorDirection::Forward),
            Err(ParticipationError::CursorAtLastSlot)
        ));
        assert!(matches!(
            cursor_target(&in_progress, 0, 2, true, CursorDirection::Back),
            Err(ParticipationError::CursorAtFirstSlot)
        ));
        assert!(matches!(
            cursor_target(&in_progress, 1, 2, false, CursorDirection::Back),
            Err(ParticipationError::BackwardNavigationDisabled)
        ));
        assert!(matches!(
            cursor_target(
                &ExamsParticipationState::TurnedIn,
                0,
                2,
                true,
                CursorDirection::Forward
            ),
            Err(ParticipationError::NotInProgress)
        ));
    }

    #[test]
    fn turned_in_participations_reject_mutation() {
        let turned_in = participation(ExamsParticipationState::TurnedIn, ts(0));
        assert!(matches!(
            ensure_mutable(&turned_in),
            Err(ParticipationError::AlreadyTurnedIn)
        ));
        let open = participation(ExamsParticipationState::InProgress, ts(0));
        assert!(ensure_mutable(&open).is_ok());
    }

    #[test]
    fn time_limit_exceptions_override_event_default() {
        let user = Uuid::from_u128(7);
        let other = Uuid::from_u128(8);
        let event = event(
            Some(600),
            json!([[user.to_string(), 900]]),
        );
        assert_eq!(effective_time_limit(&event, user), Some(900));
        assert_eq!(effective_time_limit(&event, other), Some(600));
        assert_eq!(
            effective_time_limit(&self::event(None, json!([])), other),
            None
        );
    }

    #[test]
    fn time_is_up_only_past_limit_plus_grace() {
        let event = event(Some(600), serde_json::json!([]));
        let participation = participation(ExamsParticipationState::InProgress, ts(0));
        assert!(!is_time_up(
            &event,
            &participation,
            ts(600 + TIME_LIMIT_GRACE_SECONDS),
            TIME_LIMIT_GRACE_SECONDS
        ));
        assert!(is_time_up(
            &event,
            &participation,
            ts(600 + TIME_LIMIT_GRACE_SECONDS + 1),
            TIME_LIMIT_GRACE_SECONDS
        ));
        // no limit, no timeout
        let unlimited = self::event(None, serde_json::json!([]));
        assert!(!is_time_up(
            &unlimited,
            &participation,
            ts(1_000_000),
            TIME_LIMIT_GRACE_SECONDS
        ));
    }
}
