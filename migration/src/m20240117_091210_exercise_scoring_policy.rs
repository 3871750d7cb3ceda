use sea_orm_migration::prelude::*;

use crate::m20230911_141502_exams_init::Exercise;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(Exercise::Table)
                    .add_column(
                        ColumnDef::new(Alias::new("all_or_nothing"))
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(Exercise::Table)
                    .add_column(ColumnDef::new(Alias::new("max_score")).decimal_len(5, 2))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(Exercise::Table)
                    .drop_column(Alias::new("max_score"))
                    .to_owned(),
            )
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(Exercise::Table)
                    .drop_column(Alias::new("all_or_nothing"))
                    .to_owned(),
            )
            .await
    }
}
