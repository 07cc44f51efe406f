use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl ClassStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassStatus::Scheduled => "scheduled",
            ClassStatus::Completed => "completed",
            ClassStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ClassStatus::Scheduled)
    }

    /// `scheduled -> completed | cancelled`; staying put is always allowed.
    pub fn can_transition_to(&self, next: ClassStatus) -> bool {
        *self == next || (*self == ClassStatus::Scheduled && next.is_terminal())
    }
}

impl fmt::Display for ClassStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(ClassStatus::Scheduled),
            "completed" => Ok(ClassStatus::Completed),
            "cancelled" => Ok(ClassStatus::Cancelled),
            other => Err(format!("unknown class status {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Unpaid => "unpaid",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paid" => Ok(PaymentStatus::Paid),
            "unpaid" => Ok(PaymentStatus::Unpaid),
            other => Err(format!("unknown payment status {other:?}")),
        }
    }
}

/// A persisted, dated class occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Class {
    pub id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub duration_minutes: i64,
    pub day_of_week: i64,
    /// Snapshot taken at creation time.
    pub price: Decimal,
    pub status: ClassStatus,
    pub payment_status: PaymentStatus,
    pub is_recurring: bool,
    pub subject: Option<String>,
    pub notes: Option<String>,
}

impl Class {
    pub fn key(&self) -> ClassKey {
        ClassKey {
            student_id: self.student_id,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

/// Payload for a class that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewClass {
    pub student_id: i64,
    pub course_id: i64,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub duration_minutes: i64,
    pub day_of_week: i64,
    pub price: Decimal,
    pub status: ClassStatus,
    pub payment_status: PaymentStatus,
    pub is_recurring: bool,
    pub subject: Option<String>,
    pub notes: Option<String>,
}

impl NewClass {
    pub fn key(&self) -> ClassKey {
        ClassKey {
            student_id: self.student_id,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }

    pub fn into_class(self, id: i64) -> Class {
        Class {
            id,
            student_id: self.student_id,
            course_id: self.course_id,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            duration_minutes: self.duration_minutes,
            day_of_week: self.day_of_week,
            price: self.price,
            status: self.status,
            payment_status: self.payment_status,
            is_recurring: self.is_recurring,
            subject: self.subject,
            notes: self.notes,
        }
    }
}

/// Identity used to detect an already materialized occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassKey {
    pub student_id: i64,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassFilter {
    #[serde(default)]
    pub student_id: Option<i64>,
    #[serde(default)]
    pub is_recurring: Option<bool>,
    #[serde(default, rename = "from")]
    pub date_from: Option<NaiveDate>,
    #[serde(default, rename = "to")]
    pub date_to: Option<NaiveDate>,
}

impl ClassFilter {
    pub fn for_student(student_id: i64) -> Self {
        Self {
            student_id: Some(student_id),
            ..Self::default()
        }
    }

    pub fn recurring(mut self) -> Self {
        self.is_recurring = Some(true);
        self
    }

    pub fn from_date(mut self, date: NaiveDate) -> Self {
        self.date_from = Some(date);
        self
    }

    pub fn to_date(mut self, date: NaiveDate) -> Self {
        self.date_to = Some(date);
        self
    }

    pub fn matches(&self, class: &Class) -> bool {
        self.student_id.is_none_or(|id| class.student_id == id)
            && self.is_recurring.is_none_or(|r| class.is_recurring == r)
            && self.date_from.is_none_or(|from| class.date >= from)
            && self.date_to.is_none_or(|to| class.date <= to)
    }
}

/// Fields an operator may edit on an existing class.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ClassStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ClassPatch {
    pub fn apply(&self, class: &mut Class) {
        if let Some(status) = self.status {
            class.status = status;
        }
        if let Some(payment_status) = self.payment_status {
            class.payment_status = payment_status;
        }
        if let Some(notes) = &self.notes {
            class.notes = Some(notes.clone());
        }
    }
}

pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::models::time_slot::parse_clock_time;

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_clock_time(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        use ClassStatus::*;
        assert!(Scheduled.can_transition_to(Completed));
        assert!(Scheduled.can_transition_to(Cancelled));
        assert!(Completed.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Scheduled));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Completed));
    }

    #[test]
    fn test_class_times_serialize_as_hhmm() {
        let class = NewClass {
            student_id: 1,
            course_id: 2,
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            start_time: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            duration_minutes: 60,
            day_of_week: 1,
            price: Decimal::new(2500, 2),
            status: ClassStatus::Scheduled,
            payment_status: PaymentStatus::Unpaid,
            is_recurring: true,
            subject: None,
            notes: None,
        };
        let value = serde_json::to_value(&class).unwrap();
        assert_eq!(value["start_time"], "16:00");
        assert_eq!(value["date"], "2024-01-15");
        assert_eq!(value["status"], "scheduled");
        assert_eq!(value["payment_status"], "unpaid");

        let back: NewClass = serde_json::from_value(value).unwrap();
        assert_eq!(back, class);
    }
}
