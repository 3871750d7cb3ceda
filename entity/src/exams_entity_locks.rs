use sea_orm::entity::prelude::*;

use crate::sea_orm_active_enums::ExamsLockTarget;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "exams_entity_locks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub target: ExamsLockTarget,
    pub target_id: Uuid,
    pub locked_by: Option<Uuid>,
    pub last_lock_update: DateTime,
    pub last_heartbeat: Option<DateTime>,
    pub awaiting_user_ids: Vec<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
