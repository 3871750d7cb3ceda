use chrono::{Duration, NaiveDateTime, Utc};
use entity::{exams_entity_locks, sea_orm_active_enums::ExamsLockTarget};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, DbErr, EntityTrait, QueryFilter,
    QuerySelect, Set, Unchanged,
};
use uuid::Uuid;

/// Seconds without a heartbeat after which a held lock expires.
pub const LOCK_HEARTBEAT_TIMEOUT_SECONDS: i64 = 40;

/// Advisory, cooperative locks over editable entities.
///
/// A lock is held by at most one user; contenders queue up FIFO. Expiry is
/// not detected by a background sweep: every operation first applies the
/// heartbeat-timeout rule to the row it is about to act on, inside a
/// `SELECT ... FOR UPDATE` transaction so that no two sessions ever observe
/// themselves as owner at the same time.
fn heartbeat_expired(
    lock: &exams_entity_locks::Model,
    now: NaiveDateTime,
    timeout: Duration,
) -> bool {
    lock.locked_by.is_some()
        && lock.last_heartbeat.unwrap_or(lock.last_lock_update) + timeout < now
}

/// Apply the expiry rule: a stale lock passes to the queue head with a
/// synthetic heartbeat stamped now, or is released when nobody waits.
/// Returns whether the row changed.
fn refresh_if_expired(
    lock: &mut exams_entity_locks::Model,
    now: NaiveDateTime,
    timeout: Duration,
) -> bool {
    if !heartbeat_expired(lock, now, timeout) {
        return false;
    }
    if lock.awaiting_user_ids.is_empty() {
        lock.locked_by = None;
        lock.last_heartbeat = None;
    } else {
        lock.locked_by = Some(lock.awaiting_user_ids.remove(0));
        lock.last_heartbeat = Some(now);
    }
    lock.last_lock_update = now;
    true
}

fn apply_try_lock(
    lock: &mut exams_entity_locks::Model,
    user_id: Uuid,
    now: NaiveDateTime,
    timeout: Duration,
) -> bool {
    refresh_if_expired(lock, now, timeout);
    match lock.locked_by {
        None => {
            lock.locked_by = Some(user_id);
            lock.last_heartbeat = Some(now);
            lock.last_lock_update = now;
            lock.awaiting_user_ids.retain(|u| *u != user_id);
            true
        }
        // re-acquisition by the owner is just a heartbeat
        Some(owner) if owner == user_id => {
            lock.last_heartbeat = Some(now);
            true
        }
        Some(_) => {
            if !lock.awaiting_user_ids.contains(&user_id) {
                lock.awaiting_user_ids.push(user_id);
            }
            false
        }
    }
}

fn apply_heartbeat(
    lock: &mut exams_entity_locks::Model,
    user_id: Uuid,
    now: NaiveDateTime,
    timeout: Duration,
) -> bool {
    refresh_if_expired(lock, now, timeout);
    if lock.locked_by == Some(user_id) {
        lock.last_heartbeat = Some(now);
        true
    } else {
        false
    }
}

/// Returns `true` for the owner after handing the lock over; for everybody
/// else it removes them from the queue and reports whether the lock is now
/// unheld.
fn apply_unlock_or_give_up(
    lock: &mut exams_entity_locks::Model,
    user_id: Uuid,
    now: NaiveDateTime,
    timeout: Duration,
) -> bool {
    refresh_if_expired(lock, now, timeout);
    if lock.locked_by == Some(user_id) {
        if lock.awaiting_user_ids.is_empty() {
            lock.locked_by = None;
            lock.last_heartbeat = None;
        } else {
            lock.locked_by = Some(lock.awaiting_user_ids.remove(0));
            lock.last_heartbeat = Some(now);
        }
        lock.last_lock_update = now;
        true
    } else {
        lock.awaiting_user_ids.retain(|u| *u != user_id);
        lock.locked_by.is_none()
    }
}

async fn fetch_for_update(
    db: &DatabaseTransaction,
    target: &ExamsLockTarget,
    target_id: Uuid,
) -> Result<Option<exams_entity_locks::Model>, DbErr> {
    exams_entity_locks::Entity::find()
        .filter(exams_entity_locks::Column::Target.eq(target.clone()))
        .filter(exams_entity_locks::Column::TargetId.eq(target_id))
        .lock_exclusive()
        .one(db)
        .await
}

async fn persist(
    db: &DatabaseTransaction,
    lock: exams_entity_locks::Model,
) -> Result<exams_entity_locks::Model, DbErr> {
    exams_entity_locks::ActiveModel {
        id: Unchanged(lock.id),
        target: Unchanged(lock.target),
        target_id: Unchanged(lock.target_id),
        locked_by: Set(lock.locked_by),
        last_lock_update: Set(lock.last_lock_update),
        last_heartbeat: Set(lock.last_heartbeat),
        awaiting_user_ids: Set(lock.awaiting_user_ids),
    }
    .update(db)
    .await
}

/// Try to acquire the lock on an entity. A denied caller is appended to the
/// FIFO queue; the lock is never preempted.
pub async fn try_lock(
    db: &DatabaseTransaction,
    target: ExamsLockTarget,
    target_id: Uuid,
    user_id: Uuid,
    timeout: Duration,
) -> Result<bool, DbErr> {
    let now = Utc::now().naive_utc();
    match fetch_for_update(db, &target, target_id).await? {
        Some(mut lock) => {
            let acquired = apply_try_lock(&mut lock, user_id, now, timeout);
            persist(db, lock).await?;
            Ok(acquired)
        }
        None => {
            // first contact with this entity creates the lock row
            exams_entity_locks::ActiveModel {
                id: Set(Uuid::new_v4()),
                target: Set(target),
                target_id: Set(target_id),
                locked_by: Set(Some(user_id)),
                last_lock_update: Set(now),
                last_heartbeat: Set(Some(now)),
                awaiting_user_ids: Set(vec![]),
            }
            .insert(db)
            .await?;
            Ok(true)
        }
    }
}

/// Confirm continued ownership. Returns `false` when the caller no longer
/// holds the lock (e.g. it expired and moved on).
pub async fn heartbeat(
    db: &DatabaseTransaction,
    target: ExamsLockTarget,
    target_id: Uuid,
    user_id: Uuid,
    timeout: Duration,
) -> Result<bool, DbErr> {
    let now = Utc::now().naive_utc();
    match fetch_for_update(db, &target, target_id).await? {
        Some(mut lock) => {
            let alive = apply_heartbeat(&mut lock, user_id, now, timeout);
            persist(db, lock).await?;
            Ok(alive)
        }
        None => Ok(false),
    }
}

/// Release the lock (owner) or leave the waiting queue (everyone else).
pub async fn unlock_or_give_up(
    db: &DatabaseTransaction,
    target: ExamsLockTarget,
    target_id: Uuid,
    user_id: Uuid,
    timeout: Duration,
) -> Result<bool, DbErr> {
    let now = Utc::now().naive_utc();
    match fetch_for_update(db, &target, target_id).await? {
        Some(mut lock) => {
            let released = apply_unlock_or_give_up(&mut lock, user_id, now, timeout);
            persist(db, lock).await?;
            Ok(released)
        }
        None => Ok(true),
    }
}

/// Read the current owner. Not a pure getter: reading first applies the
/// expiry rule and may reassign or release the lock.
pub async fn current_owner(
    db: &DatabaseTransaction,
    target: ExamsLockTarget,
    target_id: Uuid,
    timeout: Duration,
) -> Result<Option<Uuid>, DbErr> {
    let now = Utc::now().naive_utc();
    match fetch_for_update(db, &target, target_id).await? {
        Some(mut lock) => {
            if refresh_if_expired(&mut lock, now, timeout) {
                let lock = persist(db, lock).await?;
                Ok(lock.locked_by)
            } else {
                Ok(lock.locked_by)
            }
        }
        None => Ok(None),
    }
}
