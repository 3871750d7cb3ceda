#![forbid(unsafe_code)]
#![warn(clippy::dbg_macro, clippy::use_debug)]

pub mod exams_assessment_slots;
pub mod exams_entity_locks;
pub mod exams_event_instances;
pub mod exams_event_templates;
pub mod exams_events;
pub mod exams_exercise_choices;
pub mod exams_exercise_testcases;
pub mod exams_exercises;
pub mod exams_instance_slots;
pub mod exams_participations;
pub mod exams_submission_slots;
pub mod exams_tags;
pub mod exams_template_rule_clauses;
pub mod exams_template_rules;
pub mod sea_orm_active_enums;
