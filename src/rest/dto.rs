use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::models::course::{default_color, default_duration};
use crate::models::time_slot::{decode_schedule, encode_schedule};
use crate::models::{Course, NewStudentRequest, Student, StudentPatch, TimeSlot};

#[derive(Debug, Deserialize)]
pub struct InsertedRow {
    pub id: i64,
}

/// A `courses` row as returned by the table API; `numeric` prices arrive as
/// JSON numbers and the display columns may be null.
#[derive(Debug, Deserialize)]
pub struct CourseRecord {
    pub id: i64,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub shared_class_price: Option<Decimal>,
    #[serde(default)]
    pub duration_default: Option<i64>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl From<CourseRecord> for Course {
    fn from(record: CourseRecord) -> Self {
        Course {
            id: record.id,
            name: record.name,
            price: record.price,
            shared_class_price: record.shared_class_price,
            duration_default: record.duration_default.unwrap_or_else(default_duration),
            color: record.color.unwrap_or_else(default_color),
            is_active: record.is_active.unwrap_or(true),
        }
    }
}

/// A `students` row as returned by the table API. `fixed_schedule` may be a
/// JSON column (array) or a text column holding the encoded array.
#[derive(Debug, Deserialize)]
pub struct StudentRecord {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub course_id: i64,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub fixed_schedule: Option<Value>,
    #[serde(default)]
    pub has_shared_pricing: Option<bool>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub tax_id: Option<String>,
}

impl TryFrom<StudentRecord> for Student {
    type Error = AppError;

    fn try_from(record: StudentRecord) -> Result<Self, Self::Error> {
        let malformed = |e: serde_json::Error| {
            AppError::DataIntegrity(format!(
                "students.{} has a malformed fixed_schedule: {}",
                record.id, e
            ))
        };
        let fixed_schedule = match &record.fixed_schedule {
            None | Some(Value::Null) => None,
            Some(Value::String(raw)) if raw.trim().is_empty() => None,
            Some(Value::String(raw)) => Some(decode_schedule(raw).map_err(malformed)?),
            Some(other) => Some(
                serde_json::from_value::<Vec<TimeSlot>>(other.clone()).map_err(malformed)?,
            ),
        };

        Ok(Student {
            id: record.id,
            first_name: record.first_name,
            last_name: record.last_name,
            course_id: record.course_id,
            start_date: record.start_date,
            fixed_schedule,
            has_shared_pricing: record.has_shared_pricing.unwrap_or(false),
            email: record.email,
            phone: record.phone,
            tax_id: record.tax_id,
        })
    }
}

/// Body for inserting a student; the schedule is written as the encoded
/// JSON array.
#[derive(Debug, Serialize)]
pub struct StudentInsert<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub course_id: i64,
    pub start_date: NaiveDate,
    pub fixed_schedule: Option<String>,
    pub has_shared_pricing: bool,
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub tax_id: Option<&'a str>,
}

impl<'a> StudentInsert<'a> {
    pub fn from_request(req: &'a NewStudentRequest) -> Result<Self, AppError> {
        Ok(Self {
            first_name: &req.first_name,
            last_name: &req.last_name,
            course_id: req.course_id,
            start_date: req.start_date,
            fixed_schedule: req.fixed_schedule.as_deref().map(encode_schedule).transpose()?,
            has_shared_pricing: req.has_shared_pricing,
            email: req.email.as_deref(),
            phone: req.phone.as_deref(),
            tax_id: req.tax_id.as_deref(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StudentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_schedule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_shared_pricing: Option<bool>,
}

impl TryFrom<&StudentPatch> for StudentUpdate {
    type Error = AppError;

    fn try_from(patch: &StudentPatch) -> Result<Self, Self::Error> {
        Ok(Self {
            fixed_schedule: patch.fixed_schedule.as_deref().map(encode_schedule).transpose()?,
            course_id: patch.course_id,
            has_shared_pricing: patch.has_shared_pricing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Class, ClassStatus, PaymentStatus};
    use chrono::NaiveTime;

    #[test]
    fn test_course_record_with_numeric_price_and_null_columns() {
        let record: CourseRecord = serde_json::from_value(serde_json::json!({
            "id": 4,
            "name": "Química",
            "price": 27.5,
            "shared_class_price": null,
            "duration_default": null,
            "color": null,
            "is_active": true
        }))
        .unwrap();
        let course = Course::from(record);
        assert_eq!(course.price, Decimal::new(275, 1));
        assert_eq!(course.shared_class_price, None);
        assert_eq!(course.duration_default, 60);
        assert_eq!(course.color, "#3b82f6");
        assert_eq!(course.hourly_rate(true), Decimal::new(275, 1));
    }

    #[test]
    fn test_class_row_from_table_api() {
        let class: Class = serde_json::from_value(serde_json::json!({
            "id": 31,
            "student_id": 2,
            "course_id": 4,
            "date": "2024-01-22",
            "start_time": "16:00:00",
            "end_time": "17:30:00",
            "duration_minutes": 90,
            "day_of_week": 1,
            "price": 41.25,
            "status": "completed",
            "payment_status": "unpaid",
            "is_recurring": true,
            "subject": null,
            "notes": null
        }))
        .unwrap();
        assert_eq!(class.start_time, NaiveTime::from_hms_opt(16, 0, 0).unwrap());
        assert_eq!(class.end_time, NaiveTime::from_hms_opt(17, 30, 0).unwrap());
        assert_eq!(class.price, Decimal::new(4125, 2));
        assert_eq!(class.status, ClassStatus::Completed);
        assert_eq!(class.payment_status, PaymentStatus::Unpaid);
        assert_eq!(class.subject, None);
    }

    #[test]
    fn test_student_record_accepts_json_and_text_schedules() {
        let as_json: StudentRecord = serde_json::from_value(serde_json::json!({
            "id": 1,
            "first_name": "Ana",
            "last_name": "Pérez",
            "course_id": 2,
            "start_date": "2024-01-15",
            "fixed_schedule": [{"dayOfWeek": 1, "startTime": "16:00", "endTime": "17:00"}]
        }))
        .unwrap();
        let student = Student::try_from(as_json).unwrap();
        assert_eq!(student.schedule().len(), 1);
        assert!(!student.has_shared_pricing);

        let as_text: StudentRecord = serde_json::from_value(serde_json::json!({
            "id": 1,
            "first_name": "Ana",
            "last_name": "Pérez",
            "course_id": 2,
            "start_date": "2024-01-15",
            "fixed_schedule": "[{\"dayOfWeek\": 3, \"startTime\": \"18:00\", \"endTime\": \"19:00\"}]",
            "has_shared_pricing": true
        }))
        .unwrap();
        let student = Student::try_from(as_text).unwrap();
        assert_eq!(student.schedule()[0].day_of_week, Some(3));
        assert!(student.has_shared_pricing);
    }

    #[test]
    fn test_student_record_without_schedule() {
        let record: StudentRecord = serde_json::from_value(serde_json::json!({
            "id": 1,
            "first_name": "Ana",
            "last_name": "Pérez",
            "course_id": 2,
            "start_date": "2024-01-15",
            "fixed_schedule": null
        }))
        .unwrap();
        assert_eq!(Student::try_from(record).unwrap().fixed_schedule, None);
    }

    #[test]
    fn test_malformed_text_schedule_is_rejected() {
        let record: StudentRecord = serde_json::from_value(serde_json::json!({
            "id": 9,
            "first_name": "Ana",
            "last_name": "Pérez",
            "course_id": 2,
            "start_date": "2024-01-15",
            "fixed_schedule": "{oops"
        }))
        .unwrap();
        assert!(matches!(Student::try_from(record), Err(AppError::DataIntegrity(_))));
    }
}
