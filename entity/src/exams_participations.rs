use sea_orm::entity::prelude::*;

use crate::sea_orm_active_enums::ExamsParticipationState;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "exams_participations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub instance_id: Uuid,
    pub state: ExamsParticipationState,
    pub current_slot_number: i32,
    pub begin_timestamp: DateTime,
    pub end_timestamp: Option<DateTime>,
    #[sea_orm(column_type = "Decimal(Some((5, 2)))", nullable)]
    pub score_override: Option<Decimal>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::exams_events::Entity",
        from = "Column::EventId",
        to = "super::exams_events::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    ExamsEvents,
    #[sea_orm(
        belongs_to = "super::exams_event_instances::Entity",
        from = "Column::InstanceId",
        to = "super::exams_event_instances::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    ExamsEventInstances,
    #[sea_orm(has_many = "super::exams_submission_slots::Entity")]
    ExamsSubmissionSlots,
    #[sea_orm(has_many = "super::exams_assessment_slots::Entity")]
    ExamsAssessmentSlots,
}

impl Related<super::exams_events::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExamsEvents.def()
    }
}

impl Related<super::exams_event_instances::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExamsEventInstances.def()
    }
}

impl Related<super::exams_submission_slots::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExamsSubmissionSlots.def()
    }
}

impl Related<super::exams_assessment_slots::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExamsAssessmentSlots.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
