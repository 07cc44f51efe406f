use std::sync::Arc;

use crate::clock::Clock;
use crate::services::{ClassService, ScheduleService};
use crate::store::RecordStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub clock: Arc<dyn Clock>,
    pub horizon_days: i64,
}

impl AppState {
    pub fn schedule_service(&self) -> ScheduleService {
        ScheduleService::new(self.store.clone(), self.clock.clone(), self.horizon_days)
    }

    pub fn class_service(&self) -> ClassService {
        ClassService::new(self.store.clone())
    }
}
