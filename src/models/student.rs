use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::TimeSlot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub course_id: i64,
    /// No class is materialized before this date.
    pub start_date: NaiveDate,
    /// Authoritative weekly template.
    pub fixed_schedule: Option<Vec<TimeSlot>>,
    pub has_shared_pricing: bool,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub tax_id: Option<String>,
}

impl Student {
    pub fn schedule(&self) -> &[TimeSlot] {
        self.fixed_schedule.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStudentRequest {
    pub first_name: String,
    pub last_name: String,
    pub course_id: i64,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub fixed_schedule: Option<Vec<TimeSlot>>,
    #[serde(default)]
    pub has_shared_pricing: bool,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub tax_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_schedule: Option<Vec<TimeSlot>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_shared_pricing: Option<bool>,
}

impl StudentPatch {
    pub fn apply(&self, student: &mut Student) {
        if let Some(schedule) = &self.fixed_schedule {
            student.fixed_schedule = Some(schedule.clone());
        }
        if let Some(course_id) = self.course_id {
            student.course_id = course_id;
        }
        if let Some(shared) = self.has_shared_pricing {
            student.has_shared_pricing = shared;
        }
    }
}
