use sea_orm_migration::{prelude::*, sea_query::extension::postgres::Type};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(LockTarget::Type)
                    .values([LockTarget::Event, LockTarget::Exercise])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EntityLock::Table)
                    .col(ColumnDef::new(EntityLock::Id).uuid().primary_key())
                    .col(
                        ColumnDef::new(EntityLock::Target)
                            .custom(LockTarget::Type)
                            .not_null(),
                    )
                    .col(ColumnDef::new(EntityLock::TargetId).uuid().not_null())
                    .col(ColumnDef::new(EntityLock::LockedBy).uuid())
                    .col(
                        ColumnDef::new(EntityLock::LastLockUpdate)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(EntityLock::LastHeartbeat).timestamp())
                    .col(
                        ColumnDef::new(EntityLock::AwaitingUserIds)
                            .array(ColumnType::Uuid)
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("exams_entity_locks_unique_target")
                    .table(EntityLock::Table)
                    .col(EntityLock::Target)
                    .col(EntityLock::TargetId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EntityLock::Table).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(Alias::new("exams_lock_target")).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(Iden)]
enum EntityLock {
    #[iden = "exams_entity_locks"]
    Table,
    Id,
    Target,
    TargetId,
    LockedBy,
    LastLockUpdate,
    LastHeartbeat,
    AwaitingUserIds,
}

#[derive(Iden)]
enum LockTarget {
    #[iden = "exams_lock_target"]
    Type,
    #[iden = "event"]
    Event,
    #[iden = "exercise"]
    Exercise,
}
