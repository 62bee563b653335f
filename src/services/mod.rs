pub mod accounts;
pub mod curriculum_matching;
pub mod llm_provider;
pub mod problem_solving;
pub mod progress_tracking;
pub mod solution_generator;
