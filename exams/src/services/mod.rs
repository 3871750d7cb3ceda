pub mod assessment;
pub mod evaluation;
pub mod execution;
pub mod exercises;
pub mod locks;
pub mod participations;
pub mod picker;
pub mod worker;
