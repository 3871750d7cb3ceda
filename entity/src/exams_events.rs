use sea_orm::entity::prelude::*;

use crate::sea_orm_active_enums::ExamsEventKind;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "exams_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(column_type = "Text")]
    pub name: String,
    pub event_kind: ExamsEventKind,
    #[sea_orm(unique)]
    pub template_id: Option<Uuid>,
    pub time_limit_seconds: Option<i64>,
    #[sea_orm(column_type = "JsonBinary")]
    pub time_limit_exceptions: Json,
    pub allow_going_back: bool,
    pub creator: Uuid,
    pub creation_timestamp: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::exams_event_templates::Entity",
        from = "Column::TemplateId",
        to = "super::exams_event_templates::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    ExamsEventTemplates,
    #[sea_orm(has_many = "super::exams_event_instances::Entity")]
    ExamsEventInstances,
    #[sea_orm(has_many = "super::exams_participations::Entity")]
    ExamsParticipations,
}

impl Related<super::exams_event_templates::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExamsEventTemplates.def()
    }
}

impl Related<super::exams_event_instances::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExamsEventInstances.def()
    }
}

impl Related<super::exams_participations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExamsParticipations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
