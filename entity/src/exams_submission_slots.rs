use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "exams_submission_slots")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub participation_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub slot_number: i32,
    pub seen_at: Option<DateTime>,
    pub answered_at: Option<DateTime>,
    #[sea_orm(column_type = "Text")]
    pub answer_text: String,
    pub selected_choice_ids: Vec<Uuid>,
    #[sea_orm(column_type = "Text", nullable)]
    pub attachment: Option<String>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub execution_results: Option<Json>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::exams_participations::Entity",
        from = "Column::ParticipationId",
        to = "super::exams_participations::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    ExamsParticipations,
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ParentId",
        to = "Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    SelfRef,
}

impl Related<super::exams_participations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExamsParticipations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
