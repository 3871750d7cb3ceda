use sea_orm_migration::{prelude::*, sea_query::extension::postgres::Type};

use crate::m20230911_141502_exams_init::{Event, EventInstance};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(ParticipationState::Type)
                    .values([ParticipationState::InProgress, ParticipationState::TurnedIn])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Participation::Table)
                    .col(ColumnDef::new(Participation::Id).uuid().primary_key())
                    .col(ColumnDef::new(Participation::EventId).uuid().not_null())
                    .col(ColumnDef::new(Participation::UserId).uuid().not_null())
                    .col(ColumnDef::new(Participation::InstanceId).uuid().not_null())
                    .col(
                        ColumnDef::new(Participation::State)
                            .custom(ParticipationState::Type)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Participation::CurrentSlotNumber)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Participation::BeginTimestamp)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Participation::EndTimestamp).timestamp())
                    .col(ColumnDef::new(Participation::ScoreOverride).decimal_len(5, 2))
                    .foreign_key(
                        ForeignKey::create()
                            .from(Participation::Table, Participation::EventId)
                            .to(Event::Table, Event::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Participation::Table, Participation::InstanceId)
                            .to(EventInstance::Table, EventInstance::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("exams_participations_unique_event_user")
                    .table(Participation::Table)
                    .col(Participation::EventId)
                    .col(Participation::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SubmissionSlot::Table)
                    .col(ColumnDef::new(SubmissionSlot::Id).uuid().primary_key())
                    .col(
                        ColumnDef::new(SubmissionSlot::ParticipationId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SubmissionSlot::ParentId).uuid())
                    .col(
                        ColumnDef::new(SubmissionSlot::SlotNumber)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SubmissionSlot::SeenAt).timestamp())
                    .col(ColumnDef::new(SubmissionSlot::AnsweredAt).timestamp())
                    .col(ColumnDef::new(SubmissionSlot::AnswerText).text().not_null())
                    .col(
                        ColumnDef::new(SubmissionSlot::SelectedChoiceIds)
                            .array(ColumnType::Uuid)
                            .not_null(),
                    )
                    .col(ColumnDef::new(SubmissionSlot::Attachment).text())
                    .col(ColumnDef::new(SubmissionSlot::ExecutionResults).json_binary())
                    .foreign_key(
                        ForeignKey::create()
                            .from(SubmissionSlot::Table, SubmissionSlot::ParticipationId)
                            .to(Participation::Table, Participation::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(SubmissionSlot::Table, SubmissionSlot::ParentId)
                            .to(SubmissionSlot::Table, SubmissionSlot::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("exams_submission_slots_unique_slot_number")
                    .table(SubmissionSlot::Table)
                    .col(SubmissionSlot::ParticipationId)
                    .col(SubmissionSlot::ParentId)
                    .col(SubmissionSlot::SlotNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AssessmentSlot::Table)
                    .col(ColumnDef::new(AssessmentSlot::Id).uuid().primary_key())
                    .col(
                        ColumnDef::new(AssessmentSlot::ParticipationId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AssessmentSlot::ParentId).uuid())
                    .col(
                        ColumnDef::new(AssessmentSlot::SlotNumber)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AssessmentSlot::Comment).text().not_null())
                    .col(ColumnDef::new(AssessmentSlot::Score).decimal_len(5, 2))
                    .foreign_key(
                        ForeignKey::create()
                            .from(AssessmentSlot::Table, AssessmentSlot::ParticipationId)
                            .to(Participation::Table, Participation::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(AssessmentSlot::Table, AssessmentSlot::ParentId)
                            .to(AssessmentSlot::Table, AssessmentSlot::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("exams_assessment_slots_unique_slot_number")
                    .table(AssessmentSlot::Table)
                    .col(AssessmentSlot::ParticipationId)
                    .col(AssessmentSlot::ParentId)
                    .col(AssessmentSlot::SlotNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AssessmentSlot::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SubmissionSlot::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Participation::Table).to_owned())
            .await?;
        manager
            .drop_type(
                Type::drop()
                    .name(Alias::new("exams_participation_state"))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(Iden)]
pub enum Participation {
    #[iden = "exams_participations"]
    Table,
    Id,
    EventId,
    UserId,
    InstanceId,
    State,
    CurrentSlotNumber,
    BeginTimestamp,
    EndTimestamp,
    ScoreOverride,
}

#[derive(Iden)]
pub enum SubmissionSlot {
    #[iden = "exams_submission_slots"]
    Table,
    Id,
    ParticipationId,
    ParentId,
    SlotNumber,
    SeenAt,
    AnsweredAt,
    AnswerText,
    SelectedChoiceIds,
    Attachment,
    ExecutionResults,
}

#[derive(Iden)]
pub enum AssessmentSlot {
    #[iden = "exams_assessment_slots"]
    Table,
    Id,
    ParticipationId,
    ParentId,
    SlotNumber,
    Comment,
    Score,
}

#[derive(Iden)]
enum ParticipationState {
    #[iden = "exams_participation_state"]
    Type,
    #[iden = "in_progress"]
    InProgress,
    #[iden = "turned_in"]
    TurnedIn,
}
