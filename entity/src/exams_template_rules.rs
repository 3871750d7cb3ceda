use sea_orm::entity::prelude::*;

use crate::sea_orm_active_enums::ExamsRuleKind;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "exams_template_rules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub template_id: Uuid,
    pub rule_kind: ExamsRuleKind,
    #[sea_orm(column_type = "Decimal(Some((5, 2)))")]
    pub weight: Decimal,
    pub amount: i32,
    pub exercise_ids: Vec<Uuid>,
    pub public_tags_only: bool,
    pub position: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::exams_event_templates::Entity",
        from = "Column::TemplateId",
        to = "super::exams_event_templates::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    ExamsEventTemplates,
    #[sea_orm(has_many = "super::exams_template_rule_clauses::Entity")]
    ExamsTemplateRuleClauses,
}

impl Related<super::exams_event_templates::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExamsEventTemplates.def()
    }
}

impl Related<super::exams_template_rule_clauses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExamsTemplateRuleClauses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
