use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "exams_template_rule_clauses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub rule_id: Uuid,
    pub tag_ids: Vec<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::exams_template_rules::Entity",
        from = "Column::RuleId",
        to = "super::exams_template_rules::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    ExamsTemplateRules,
}

impl Related<super::exams_template_rules::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExamsTemplateRules.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
