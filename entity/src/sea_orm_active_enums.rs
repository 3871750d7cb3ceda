use sea_orm::entity::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(
    rs_type = "String",
    db_type = "Enum",
    enum_name = "exams_exercise_kind"
)]
pub enum ExamsExerciseKind {
    #[sea_orm(string_value = "aggregated")]
    Aggregated,
    #[sea_orm(string_value = "attachment")]
    Attachment,
    #[sea_orm(string_value = "c")]
    C,
    #[sea_orm(string_value = "completion")]
    Completion,
    #[sea_orm(string_value = "javascript")]
    Javascript,
    #[sea_orm(string_value = "multi_choice")]
    MultiChoice,
    #[sea_orm(string_value = "open_answer")]
    OpenAnswer,
    #[sea_orm(string_value = "python")]
    Python,
    #[sea_orm(string_value = "single_choice")]
    SingleChoice,
}

#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(
    rs_type = "String",
    db_type = "Enum",
    enum_name = "exams_exercise_state"
)]
pub enum ExamsExerciseState {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "private")]
    Private,
    #[sea_orm(string_value = "public")]
    Public,
}

#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(
    rs_type = "String",
    db_type = "Enum",
    enum_name = "exams_testcase_visibility"
)]
pub enum ExamsTestcaseVisibility {
    #[sea_orm(string_value = "full")]
    Full,
    #[sea_orm(string_value = "hidden")]
    Hidden,
    #[sea_orm(string_value = "text_only")]
    TextOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "exams_rule_kind")]
pub enum ExamsRuleKind {
    #[sea_orm(string_value = "id_based")]
    IdBased,
    #[sea_orm(string_value = "tag_based")]
    TagBased,
}

#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "exams_event_kind")]
pub enum ExamsEventKind {
    #[sea_orm(string_value = "exam")]
    Exam,
    #[sea_orm(string_value = "self_service_practice")]
    SelfServicePractice,
}

#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(
    rs_type = "String",
    db_type = "Enum",
    enum_name = "exams_participation_state"
)]
pub enum ExamsParticipationState {
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "turned_in")]
    TurnedIn,
}

#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "exams_lock_target")]
pub enum ExamsLockTarget {
    #[sea_orm(string_value = "event")]
    Event,
    #[sea_orm(string_value = "exercise")]
    Exercise,
}
