use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "exams_instance_slots")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub instance_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub slot_number: i32,
    pub exercise_id: Uuid,
    pub rule_id: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::exams_event_instances::Entity",
        from = "Column::InstanceId",
        to = "super::exams_event_instances::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    ExamsEventInstances,
    #[sea_orm(
        belongs_to = "super::exams_exercises::Entity",
        from = "Column::ExerciseId",
        to = "super::exams_exercises::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    ExamsExercises,
    #[sea_orm(
        belongs_to = "super::exams_template_rules::Entity",
        from = "Column::RuleId",
        to = "super::exams_template_rules::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    ExamsTemplateRules,
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ParentId",
        to = "Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    SelfRef,
}

impl Related<super::exams_event_instances::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExamsEventInstances.def()
    }
}

impl Related<super::exams_exercises::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExamsExercises.def()
    }
}

impl Related<super::exams_template_rules::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExamsTemplateRules.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
