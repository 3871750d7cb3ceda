use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "exams_event_templates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(column_type = "Text")]
    pub name: String,
    pub randomize_rule_order: bool,
    pub creation_timestamp: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::exams_template_rules::Entity")]
    ExamsTemplateRules,
}

impl Related<super::exams_template_rules::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExamsTemplateRules.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
