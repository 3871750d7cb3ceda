use std::{sync::Arc, time::Duration};

use entity::{
    exams_exercises, exams_instance_slots, exams_participations, exams_submission_slots,
};
use lib::{config::Config, redis::RedisConnection, SharedState};
use redis::AsyncCommands;
use sandbox_client::SandboxClient;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QuerySelect, Set, TransactionTrait, Unchanged,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{
    execution::{language_of, ExecutionClient},
    exercises::load_testcases,
};
use crate::schemas::execution::{ExecutionResults, ExecutionState};

pub const EXECUTION_QUEUE_KEY: &str = "exams:executions";
pub const EXECUTION_COMPLETE_CHANNEL: &str = "exams:execution_complete";

/// A queued code execution. `run_id` ties the job to the slot state written
/// at enqueue time; a newer enqueue for the same slot supersedes older jobs.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExecutionJob {
    pub slot_id: Uuid,
    pub run_id: Uuid,
}

/// What subscribers of a slot receive exactly once per surviving run.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExecutionCompleteEvent {
    pub slot_id: Uuid,
    pub run_id: Uuid,
    pub state: ExecutionState,
}

/// Mark a slot as running and enqueue its execution. Fire-and-forget: the
/// job is picked up by the worker loop. Re-enqueueing a running slot issues
/// a fresh run id, which makes the previous job lose its final write.
pub async fn enqueue_execution(
    db: &DatabaseTransaction,
    redis: &mut RedisConnection,
    slot: &exams_submission_slots::Model,
) -> Result<Uuid, WorkerError> {
    let run_id = Uuid::new_v4();
    exams_submission_slots::ActiveModel {
        id: Unchanged(slot.id),
        execution_results: Set(Some(serde_json::to_value(ExecutionResults::running(
            run_id,
        ))?)),
        ..Default::default()
    }
    .update(db)
    .await?;
    let job = serde_json::to_string(&ExecutionJob {
        slot_id: slot.id,
        run_id,
    })?;
    redis.lpush::<_, _, ()>(EXECUTION_QUEUE_KEY, job).await?;
    debug!("enqueued execution {run_id} for slot {}", slot.id);
    Ok(run_id)
}

/// Re-enqueue every slot stuck in the running state, e.g. after a worker
/// restart. Jobs keep their run id so an unrelated newer run still wins.
pub async fn resume_pending(
    db: &DatabaseConnection,
    redis: &mut RedisConnection,
) -> Result<usize, WorkerError> {
    let slots = exams_submission_slots::Entity::find()
        .filter(exams_submission_slots::Column::ExecutionResults.is_not_null())
        .all(db)
        .await?;
    let mut resumed = 0;
    for slot in slots {
        let Some(results) = parse_results(&slot) else {
            continue;
        };
        if results.state != ExecutionState::Running {
            continue;
        }
        let run_id = match results.run_id {
            Some(run_id) => run_id,
            None => {
                // legacy rows without a run id get a fresh one
                let run_id = Uuid::new_v4();
                exams_submission_slots::ActiveModel {
                    id: Unchanged(slot.id),
                    execution_results: Set(Some(serde_json::to_value(
                        ExecutionResults::running(run_id),
                    )?)),
                    ..Default::default()
                }
                .update(db)
                .await?;
                run_id
            }
        };
        let job = serde_json::to_string(&ExecutionJob {
            slot_id: slot.id,
            run_id,
        })?;
        redis.lpush::<_, _, ()>(EXECUTION_QUEUE_KEY, job).await?;
        resumed += 1;
    }
    if resumed > 0 {
        info!("re-enqueued {resumed} pending execution(s)");
    }
    Ok(resumed)
}

/// The worker loop: pop jobs off the queue and run them, at most
/// `worker.concurrency` at a time. Individual job failures never take the
/// loop down.
pub async fn run_worker(
    state: Arc<SharedState>,
    config: Arc<Config>,
    sandbox: SandboxClient,
) -> anyhow::Result<()> {
    let semaphore = Arc::new(Semaphore::new(config.exams.worker.concurrency));
    let mut queue = state.redis.clone();
    info!("waiting for execution jobs");
    loop {
        let popped: Option<(String, String)> = match queue.blpop(EXECUTION_QUEUE_KEY, 0.0).await {
            Ok(popped) => popped,
            Err(err) => {
                warn!("queue pop failed: {err}");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };
        let Some((_, payload)) = popped else {
            continue;
        };
        let job: ExecutionJob = match serde_json::from_str(&payload) {
            Ok(job) => job,
            Err(err) => {
                error!("discarding malformed execution job: {err}");
                continue;
            }
        };

        let permit = Arc::clone(&semaphore).acquire_owned().await?;
        let state = Arc::clone(&state);
        let config = Arc::clone(&config);
        let sandbox = sandbox.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let slot_id = job.slot_id;
            if let Err(err) = process_job(&state, &config, &sandbox, job).await {
                error!("execution job for slot {slot_id} failed: {err}");
            }
        });
    }
}

async fn process_job(
    state: &SharedState,
    config: &Config,
    sandbox: &SandboxClient,
    job: ExecutionJob,
) -> Result<(), WorkerError> {
    let txn = state.db.begin().await?;
    let Some(slot) = exams_submission_slots::Entity::find_by_id(job.slot_id)
        .one(&txn)
        .await?
    else {
        warn!("dropping execution job for unknown slot {}", job.slot_id);
        return Ok(());
    };
    if !is_current_run(&slot, job.run_id) {
        debug!("run {} for slot {} was superseded", job.run_id, slot.id);
        return Ok(());
    }
    let exercise = resolve_exercise(&txn, &slot).await?;
    let testcases = match &exercise {
        Some(exercise) => load_testcases(&txn, exercise.id).await?,
        None => vec![],
    };
    txn.commit().await?;

    let results = match exercise {
        Some(exercise) => match language_of(&exercise.exercise_kind) {
            Some(language) => {
                let client = ExecutionClient {
                    sandbox,
                    sandbox_config: &config.exams.sandbox,
                    runners: &config.exams.runners,
                };
                run_with_retries(&client, &slot, &testcases, language, &config.exams.worker).await
            }
            None => {
                error!(
                    "slot {} holds a non-programming exercise {}",
                    slot.id, exercise.id
                );
                ExecutionResults::internal_error()
            }
        },
        None => {
            error!("could not resolve the exercise of slot {}", slot.id);
            ExecutionResults::internal_error()
        }
    };

    finalize_job(state, job, results).await
}

async fn run_with_retries(
    client: &ExecutionClient<'_>,
    slot: &exams_submission_slots::Model,
    testcases: &[entity::exams_exercise_testcases::Model],
    language: super::execution::ProgrammingLanguage,
    worker: &lib::config::WorkerConfig,
) -> ExecutionResults {
    let mut results = ExecutionResults::internal_error();
    for attempt in 1..=worker.max_attempts.max(1) {
        results = client.execute(&slot.answer_text, testcases, language).await;
        if results.state != ExecutionState::InternalError {
            break;
        }
        if attempt < worker.max_attempts {
            let delay = retry_delay(worker.retry_base_delay, attempt);
            warn!(
                "execution attempt {attempt} for slot {} failed, retrying in {delay:?}",
                slot.id
            );
            tokio::time::sleep(delay).await;
        }
    }
    results
}

/// Persist the final results and notify subscribers, unless a newer run
/// took over the slot in the meantime. The compare-and-set runs under a row
/// lock so exactly one completion is published per surviving run.
async fn finalize_job(
    state: &SharedState,
    job: ExecutionJob,
    results: ExecutionResults,
) -> Result<(), WorkerError> {
    let txn = state.db.begin().await?;
    let Some(current) = exams_submission_slots::Entity::find_by_id(job.slot_id)
        .lock_exclusive()
        .one(&txn)
        .await?
    else {
        return Ok(());
    };
    if !is_current_run(&current, job.run_id) {
        debug!(
            "discarding results of superseded run {} for slot {}",
            job.run_id, job.slot_id
        );
        return Ok(());
    }
    let results = results.with_run_id(job.run_id);
    exams_submission_slots::ActiveModel {
        id: Unchanged(current.id),
        execution_results: Set(Some(serde_json::to_value(&results)?)),
        ..Default::default()
    }
    .update(&txn)
    .await?;
    txn.commit().await?;

    let event = serde_json::to_string(&ExecutionCompleteEvent {
        slot_id: job.slot_id,
        run_id: job.run_id,
        state: results.state,
    })?;
    let mut redis = state.redis.clone();
    redis
        .publish::<_, _, ()>(EXECUTION_COMPLETE_CHANNEL, event)
        .await?;
    Ok(())
}

/// Find the exercise a base submission slot points at, through the
/// instance slot with the same number.
async fn resolve_exercise(
    db: &DatabaseTransaction,
    slot: &exams_submission_slots::Model,
) -> Result<Option<exams_exercises::Model>, WorkerError> {
    if slot.parent_id.is_some() {
        return Ok(None);
    }
    let Some(participation) = exams_participations::Entity::find_by_id(slot.participation_id)
        .one(db)
        .await?
    else {
        return Ok(None);
    };
    let Some(instance_slot) = exams_instance_slots::Entity::find()
        .filter(exams_instance_slots::Column::InstanceId.eq(participation.instance_id))
        .filter(exams_instance_slots::Column::ParentId.is_null())
        .filter(exams_instance_slots::Column::SlotNumber.eq(slot.slot_number))
        .one(db)
        .await?
    else {
        return Ok(None);
    };
    Ok(exams_exercises::Entity::find_by_id(instance_slot.exercise_id)
        .one(db)
        .await?)
}

fn parse_results(slot: &exams_submission_slots::Model) -> Option<ExecutionResults> {
    serde_json::from_value(slot.execution_results.clone()?).ok()
}

/// Whether the slot still belongs to this run. Anything else (newer run,
/// cleared results, malformed state) means the job must not write.
fn is_current_run(slot: &exams_submission_slots::Model, run_id: Uuid) -> bool {
    parse_results(slot).and_then(|r| r.run_id) == Some(run_id)
}

fn retry_delay(base_seconds: u64, attempt: u32) -> Duration {
    Duration::from_secs(base_seconds.saturating_mul(1 << (attempt - 1).min(16)))
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("database error: {0}")]
    Db(#[from] DbErr),
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot_with_results(results: Option<&ExecutionResults>) -> exams_submission_slots::Model {
        exams_submission_slots::Model {
            id: Uuid::from_u128(1),
            participation_id: Uuid::from_u128(2),
            parent_id: None,
            slot_number: 0,
            seen_at: None,
            answered_at: None,
            answer_text: String::new(),
            selected_choice_ids: vec![],
            attachment: None,
            execution_results: results.map(|r| serde_json::to_value(r).unwrap()),
        }
    }

    #[test]
    fn newer_run_supersedes_older_job() {
        let old_run = Uuid::from_u128(10);
        let new_run = Uuid::from_u128(11);
        let slot = slot_with_results(Some(&ExecutionResults::running(new_run)));
        assert!(!is_current_run(&slot, old_run));
        assert!(is_current_run(&slot, new_run));
        assert!(!is_current_run(&slot_with_results(None), old_run));
    }

    #[test]
    fn backoff_is_exponential() {
        assert_eq!(retry_delay(1, 1), Duration::from_secs(1));
        assert_eq!(retry_delay(1, 2), Duration::from_secs(2));
        assert_eq!(retry_delay(1, 5), Duration::from_secs(16));
        assert_eq!(retry_delay(3, 3), Duration::from_secs(12));
    }
}
