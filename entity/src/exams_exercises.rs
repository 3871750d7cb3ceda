use sea_orm::entity::prelude::*;

use crate::sea_orm_active_enums::{ExamsExerciseKind, ExamsExerciseState};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "exams_exercises")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub exercise_kind: ExamsExerciseKind,
    pub state: ExamsExerciseState,
    #[sea_orm(column_type = "Text")]
    pub label: String,
    #[sea_orm(column_type = "Text")]
    pub text: String,
    #[sea_orm(column_type = "Text")]
    pub solution: String,
    #[sea_orm(column_type = "Text")]
    pub initial_code: String,
    #[sea_orm(column_type = "Decimal(Some((5, 2)))")]
    pub child_weight: Decimal,
    #[sea_orm(column_type = "Decimal(Some((5, 2)))", nullable)]
    pub max_score: Option<Decimal>,
    pub all_or_nothing: bool,
    pub public_tag_ids: Vec<Uuid>,
    pub private_tag_ids: Vec<Uuid>,
    pub position: i32,
    pub creation_timestamp: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::exams_exercise_choices::Entity")]
    ExamsExerciseChoices,
    #[sea_orm(has_many = "super::exams_exercise_testcases::Entity")]
    ExamsExerciseTestcases,
    #[sea_orm(has_many = "super::exams_instance_slots::Entity")]
    ExamsInstanceSlots,
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ParentId",
        to = "Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    SelfRef,
}

impl Related<super::exams_exercise_choices::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExamsExerciseChoices.def()
    }
}

impl Related<super::exams_exercise_testcases::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExamsExerciseTestcases.def()
    }
}

impl Related<super::exams_instance_slots::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExamsInstanceSlots.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
