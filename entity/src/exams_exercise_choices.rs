use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "exams_exercise_choices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub exercise_id: Uuid,
    #[sea_orm(column_type = "Text")]
    pub text: String,
    #[sea_orm(column_type = "Decimal(Some((5, 2)))")]
    pub correctness: Decimal,
    pub position: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::exams_exercises::Entity",
        from = "Column::ExerciseId",
        to = "super::exams_exercises::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    ExamsExercises,
}

impl Related<super::exams_exercises::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExamsExercises.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
