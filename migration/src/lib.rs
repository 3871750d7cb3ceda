#![forbid(unsafe_code)]
#![warn(clippy::dbg_macro, clippy::use_debug)]

pub use sea_orm_migration::prelude::*;

pub struct Migrator;

mod m20230911_141502_exams_init;
mod m20230918_102349_participations;
mod m20231102_134520_entity_locks;
mod m20240117_091210_exercise_scoring_policy;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20230911_141502_exams_init::Migration),
            Box::new(m20230918_102349_participations::Migration),
            Box::new(m20231102_134520_entity_locks::Migration),
            Box::new(m20240117_091210_exercise_scoring_policy::Migration),
        ]
    }
}
