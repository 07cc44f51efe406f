pub mod class_generation;
pub mod class_service;
pub mod schedule_service;

pub use class_service::ClassService;
pub use schedule_service::{MaterializeStats, ReconcileStats, ScheduleService};
