use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "exams_event_instances")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub event_id: Uuid,
    pub creation_timestamp: DateTime,
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
    #[sea_orm(has_many = "super::exams_instance_slots::Entity")]
    ExamsInstanceSlots,
    #[sea_orm(has_many = "super::exams_participations::Entity")]
    ExamsParticipations,
}

impl Related<super::exams_events::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExamsEvents.def()
    }
}

impl Related<super::exams_instance_slots::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExamsInstanceSlots.def()
    }
}

impl Related<super::exams_participations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExamsParticipations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
