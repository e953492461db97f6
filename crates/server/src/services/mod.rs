pub mod phases;
pub mod statistics;
pub mod task_metadata;
