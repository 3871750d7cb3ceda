use sea_orm_migration::{prelude::*, sea_query::extension::postgres::Type};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(ExerciseKind::Type)
                    .values([
                        ExerciseKind::Aggregated,
                        ExerciseKind::Attachment,
                        ExerciseKind::C,
                        ExerciseKind::Completion,
                        ExerciseKind::Javascript,
                        ExerciseKind::MultiChoice,
                        ExerciseKind::OpenAnswer,
                        ExerciseKind::Python,
                        ExerciseKind::SingleChoice,
                    ])
                    .to_owned(),
            )
            .await?;
        manager
            .create_type(
                Type::create()
                    .as_enum(ExerciseState::Type)
                    .values([
                        ExerciseState::Draft,
                        ExerciseState::Private,
                        ExerciseState::Public,
                    ])
                    .to_owned(),
            )
            .await?;
        manager
            .create_type(
                Type::create()
                    .as_enum(TestcaseVisibility::Type)
                    .values([
                        TestcaseVisibility::Full,
                        TestcaseVisibility::Hidden,
                        TestcaseVisibility::TextOnly,
                    ])
                    .to_owned(),
            )
            .await?;
        manager
            .create_type(
                Type::create()
                    .as_enum(RuleKind::Type)
                    .values([RuleKind::IdBased, RuleKind::TagBased])
                    .to_owned(),
            )
            .await?;
        manager
            .create_type(
                Type::create()
                    .as_enum(EventKind::Type)
                    .values([EventKind::Exam, EventKind::SelfServicePractice])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tag::Table)
                    .col(ColumnDef::new(Tag::Id).uuid().primary_key())
                    .col(ColumnDef::new(Tag::Name).text().not_null().unique_key())
                    .col(
                        ColumnDef::new(Tag::CreationTimestamp)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Exercise::Table)
                    .col(ColumnDef::new(Exercise::Id).uuid().primary_key())
                    .col(ColumnDef::new(Exercise::ParentId).uuid())
                    .col(
                        ColumnDef::new(Exercise::ExerciseKind)
                            .custom(ExerciseKind::Type)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Exercise::State)
                            .custom(ExerciseState::Type)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Exercise::Label).text().not_null())
                    .col(ColumnDef::new(Exercise::Text).text().not_null())
                    .col(ColumnDef::new(Exercise::Solution).text().not_null())
                    .col(ColumnDef::new(Exercise::InitialCode).text().not_null())
                    .col(
                        ColumnDef::new(Exercise::ChildWeight)
                            .decimal_len(5, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Exercise::PublicTagIds)
                            .array(ColumnType::Uuid)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Exercise::PrivateTagIds)
                            .array(ColumnType::Uuid)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Exercise::Position).integer().not_null())
                    .col(
                        ColumnDef::new(Exercise::CreationTimestamp)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Exercise::Table, Exercise::ParentId)
                            .to(Exercise::Table, Exercise::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ExerciseChoice::Table)
                    .col(ColumnDef::new(ExerciseChoice::Id).uuid().primary_key())
                    .col(ColumnDef::new(ExerciseChoice::ExerciseId).uuid().not_null())
                    .col(ColumnDef::new(ExerciseChoice::Text).text().not_null())
                    .col(
                        ColumnDef::new(ExerciseChoice::Correctness)
                            .decimal_len(5, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExerciseChoice::Position)
                            .integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(ExerciseChoice::Table, ExerciseChoice::ExerciseId)
                            .to(Exercise::Table, Exercise::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ExerciseTestcase::Table)
                    .col(ColumnDef::new(ExerciseTestcase::Id).uuid().primary_key())
                    .col(
                        ColumnDef::new(ExerciseTestcase::ExerciseId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ExerciseTestcase::Code).text().not_null())
                    .col(ColumnDef::new(ExerciseTestcase::Stdin).text().not_null())
                    .col(
                        ColumnDef::new(ExerciseTestcase::ExpectedStdout)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ExerciseTestcase::Text).text().not_null())
                    .col(
                        ColumnDef::new(ExerciseTestcase::Visibility)
                            .custom(TestcaseVisibility::Type)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExerciseTestcase::Position)
                            .integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(ExerciseTestcase::Table, ExerciseTestcase::ExerciseId)
                            .to(Exercise::Table, Exercise::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EventTemplate::Table)
                    .col(ColumnDef::new(EventTemplate::Id).uuid().primary_key())
                    .col(ColumnDef::new(EventTemplate::Name).text().not_null())
                    .col(
                        ColumnDef::new(EventTemplate::RandomizeRuleOrder)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EventTemplate::CreationTimestamp)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TemplateRule::Table)
                    .col(ColumnDef::new(TemplateRule::Id).uuid().primary_key())
                    .col(ColumnDef::new(TemplateRule::TemplateId).uuid().not_null())
                    .col(
                        ColumnDef::new(TemplateRule::RuleKind)
                            .custom(RuleKind::Type)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TemplateRule::Weight)
                            .decimal_len(5, 2)
                            .not_null(),
                    )
                    .col(ColumnDef::new(TemplateRule::Amount).integer().not_null())
                    .col(
                        ColumnDef::new(TemplateRule::ExerciseIds)
                            .array(ColumnType::Uuid)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TemplateRule::PublicTagsOnly)
                            .boolean()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TemplateRule::Position).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(TemplateRule::Table, TemplateRule::TemplateId)
                            .to(EventTemplate::Table, EventTemplate::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TemplateRuleClause::Table)
                    .col(ColumnDef::new(TemplateRuleClause::Id).uuid().primary_key())
                    .col(ColumnDef::new(TemplateRuleClause::RuleId).uuid().not_null())
                    .col(
                        ColumnDef::new(TemplateRuleClause::TagIds)
                            .array(ColumnType::Uuid)
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(TemplateRuleClause::Table, TemplateRuleClause::RuleId)
                            .to(TemplateRule::Table, TemplateRule::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Event::Table)
                    .col(ColumnDef::new(Event::Id).uuid().primary_key())
                    .col(ColumnDef::new(Event::Name).text().not_null())
                    .col(
                        ColumnDef::new(Event::EventKind)
                            .custom(EventKind::Type)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Event::TemplateId).uuid().unique_key())
                    .col(ColumnDef::new(Event::TimeLimitSeconds).big_integer())
                    .col(
                        ColumnDef::new(Event::TimeLimitExceptions)
                            .json_binary()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Event::AllowGoingBack).boolean().not_null())
                    .col(ColumnDef::new(Event::Creator).uuid().not_null())
                    .col(
                        ColumnDef::new(Event::CreationTimestamp)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Event::Table, Event::TemplateId)
                            .to(EventTemplate::Table, EventTemplate::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EventInstance::Table)
                    .col(ColumnDef::new(EventInstance::Id).uuid().primary_key())
                    .col(ColumnDef::new(EventInstance::EventId).uuid().not_null())
                    .col(
                        ColumnDef::new(EventInstance::CreationTimestamp)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(EventInstance::Table, EventInstance::EventId)
                            .to(Event::Table, Event::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InstanceSlot::Table)
                    .col(ColumnDef::new(InstanceSlot::Id).uuid().primary_key())
                    .col(ColumnDef::new(InstanceSlot::InstanceId).uuid().not_null())
                    .col(ColumnDef::new(InstanceSlot::ParentId).uuid())
                    .col(ColumnDef::new(InstanceSlot::SlotNumber).integer().not_null())
                    .col(ColumnDef::new(InstanceSlot::ExerciseId).uuid().not_null())
                    .col(ColumnDef::new(InstanceSlot::RuleId).uuid())
                    .foreign_key(
                        ForeignKey::create()
                            .from(InstanceSlot::Table, InstanceSlot::InstanceId)
                            .to(EventInstance::Table, EventInstance::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(InstanceSlot::Table, InstanceSlot::ParentId)
                            .to(InstanceSlot::Table, InstanceSlot::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(InstanceSlot::Table, InstanceSlot::ExerciseId)
                            .to(Exercise::Table, Exercise::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(InstanceSlot::Table, InstanceSlot::RuleId)
                            .to(TemplateRule::Table, TemplateRule::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("exams_instance_slots_unique_slot_number")
                    .table(InstanceSlot::Table)
                    .col(InstanceSlot::InstanceId)
                    .col(InstanceSlot::ParentId)
                    .col(InstanceSlot::SlotNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InstanceSlot::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EventInstance::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Event::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TemplateRuleClause::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TemplateRule::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EventTemplate::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ExerciseTestcase::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ExerciseChoice::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Exercise::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tag::Table).to_owned())
            .await?;

        for name in [
            "exams_event_kind",
            "exams_rule_kind",
            "exams_testcase_visibility",
            "exams_exercise_state",
            "exams_exercise_kind",
        ] {
            manager
                .drop_type(Type::drop().name(Alias::new(name)).to_owned())
                .await?;
        }

        Ok(())
    }
}

#[derive(Iden)]
pub enum Tag {
    #[iden = "exams_tags"]
    Table,
    Id,
    Name,
    CreationTimestamp,
}

#[derive(Iden)]
pub enum Exercise {
    #[iden = "exams_exercises"]
    Table,
    Id,
    ParentId,
    ExerciseKind,
    State,
    Label,
    Text,
    Solution,
    InitialCode,
    ChildWeight,
    PublicTagIds,
    PrivateTagIds,
    Position,
    CreationTimestamp,
}

#[derive(Iden)]
pub enum ExerciseChoice {
    #[iden = "exams_exercise_choices"]
    Table,
    Id,
    ExerciseId,
    Text,
    Correctness,
    Position,
}

#[derive(Iden)]
pub enum ExerciseTestcase {
    #[iden = "exams_exercise_testcases"]
    Table,
    Id,
    ExerciseId,
    Code,
    Stdin,
    ExpectedStdout,
    Text,
    Visibility,
    Position,
}

#[derive(Iden)]
pub enum EventTemplate {
    #[iden = "exams_event_templates"]
    Table,
    Id,
    Name,
    RandomizeRuleOrder,
    CreationTimestamp,
}

#[derive(Iden)]
pub enum TemplateRule {
    #[iden = "exams_template_rules"]
    Table,
    Id,
    TemplateId,
    RuleKind,
    Weight,
    Amount,
    ExerciseIds,
    PublicTagsOnly,
    Position,
}

#[derive(Iden)]
pub enum TemplateRuleClause {
    #[iden = "exams_template_rule_clauses"]
    Table,
    Id,
    RuleId,
    TagIds,
}

#[derive(Iden)]
pub enum Event {
    #[iden = "exams_events"]
    Table,
    Id,
    Name,
    EventKind,
    TemplateId,
    TimeLimitSeconds,
    TimeLimitExceptions,
    AllowGoingBack,
    Creator,
    CreationTimestamp,
}

#[derive(Iden)]
pub enum EventInstance {
    #[iden = "exams_event_instances"]
    Table,
    Id,
    EventId,
    CreationTimestamp,
}

#[derive(Iden)]
pub enum InstanceSlot {
    #[iden = "exams_instance_slots"]
    Table,
    Id,
    InstanceId,
    ParentId,
    SlotNumber,
    ExerciseId,
    RuleId,
}

#[derive(Iden)]
pub enum ExerciseKind {
    #[iden = "exams_exercise_kind"]
    Type,
    #[iden = "aggregated"]
    Aggregated,
    #[iden = "attachment"]
    Attachment,
    #[iden = "c"]
    C,
    #[iden = "completion"]
    Completion,
    #[iden = "javascript"]
    Javascript,
    #[iden = "multi_choice"]
    MultiChoice,
    #[iden = "open_answer"]
    OpenAnswer,
    #[iden = "python"]
    Python,
    #[iden = "single_choice"]
    SingleChoice,
}

#[derive(Iden)]
pub enum ExerciseState {
    #[iden = "exams_exercise_state"]
    Type,
    #[iden = "draft"]
    Draft,
    #[iden = "private"]
    Private,
    #[iden = "public"]
    Public,
}

#[derive(Iden)]
pub enum TestcaseVisibility {
    #[iden = "exams_testcase_visibility"]
    Type,
    #[iden = "full"]
    Full,
    #[iden = "hidden"]
    Hidden,
    #[iden = "text_only"]
    TextOnly,
}

#[derive(Iden)]
pub enum RuleKind {
    #[iden = "exams_rule_kind"]
    Type,
    #[iden = "id_based"]
    IdBased,
    #[iden = "tag_based"]
    TagBased,
}

#[derive(Iden)]
pub enum EventKind {
    #[iden = "exams_event_kind"]
    Type,
    #[iden = "exam"]
    Exam,
    #[iden = "self_service_practice"]
    SelfServicePractice,
}
