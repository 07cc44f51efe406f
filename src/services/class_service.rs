use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::AppError;
use crate::models::time_slot::parse_clock_time;
use crate::models::{Class, ClassPatch, ClassStatus, NewClass, PaymentStatus};
use crate::services::class_generation::class_price;
use crate::store::RecordStore;

/// A one-off class entered by hand. Never touched by the materializer.
#[derive(Debug, Clone, Deserialize)]
pub struct NewManualClassRequest {
    pub student_id: i64,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    /// Defaults to the course rate for the class duration.
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: ClassStatus,
    /// Must be set to cancel a class that is already paid.
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentUpdateRequest {
    pub payment_status: PaymentStatus,
}

pub struct ClassService {
    store: Arc<dyn RecordStore>,
}

impl ClassService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn create_manual_class(&self, req: NewManualClassRequest) -> Result<Class, AppError> {
        let start_time = parse_clock_time(&req.start_time)
            .map_err(|e| AppError::BadRequest(format!("start_time: {}", e)))?;
        let end_time = parse_clock_time(&req.end_time)
            .map_err(|e| AppError::BadRequest(format!("end_time: {}", e)))?;
        let duration_minutes = (end_time - start_time).num_minutes();
        if duration_minutes <= 0 {
            return Err(AppError::Validation(format!(
                "end time {} is not after start time {}",
                req.end_time, req.start_time
            )));
        }

        let student = self
            .store
            .get_student_by_id(req.student_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let price = match req.price {
            Some(price) if price < Decimal::ZERO => {
                return Err(AppError::Validation("price must not be negative".to_string()));
            }
            Some(price) => price,
            None => {
                let course = self
                    .store
                    .get_course_by_id(student.course_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::DataIntegrity(format!(
                            "course {} of student {} not found",
                            student.course_id, student.id
                        ))
                    })?;
                let rate = course.hourly_rate(student.has_shared_pricing);
                class_price(duration_minutes, rate).ok_or_else(|| {
                    AppError::DataIntegrity(format!(
                        "course {} has an unusable hourly price ({})",
                        course.id, rate
                    ))
                })?
            }
        };

        let payload = NewClass {
            student_id: student.id,
            course_id: student.course_id,
            date: req.date,
            start_time,
            end_time,
            duration_minutes,
            day_of_week: i64::from(req.date.weekday().num_days_from_sunday()),
            price,
            status: ClassStatus::Scheduled,
            payment_status: PaymentStatus::Unpaid,
            is_recurring: false,
            subject: req.subject,
            notes: req.notes,
        };
        let id = self.store.create_class(&payload).await?;
        info!(student_id = student.id, class_id = id, "created manual class on {}", payload.date);
        Ok(payload.into_class(id))
    }

    pub async fn update_status(
        &self,
        id: i64,
        req: StatusUpdateRequest,
    ) -> Result<Class, AppError> {
        let class = self.load(id).await?;

        if !class.status.can_transition_to(req.status) {
            return Err(AppError::Conflict(format!(
                "class {} is {} and cannot become {}",
                id, class.status, req.status
            )));
        }
        if req.status == ClassStatus::Cancelled
            && class.status != ClassStatus::Cancelled
            && class.payment_status == PaymentStatus::Paid
        {
            if !req.confirm {
                return Err(AppError::Conflict(format!(
                    "class {} is already paid; resend with confirm to cancel it",
                    id
                )));
            }
            warn!(class_id = id, "cancelling a paid class");
        }

        let patch = ClassPatch {
            status: Some(req.status),
            ..ClassPatch::default()
        };
        self.store.update_class(id, patch).await?.ok_or(AppError::NotFound)
    }

    pub async fn update_payment(
        &self,
        id: i64,
        req: PaymentUpdateRequest,
    ) -> Result<Class, AppError> {
        let patch = ClassPatch {
            payment_status: Some(req.payment_status),
            ..ClassPatch::default()
        };
        self.store.update_class(id, patch).await?.ok_or(AppError::NotFound)
    }

    pub async fn delete_class(&self, id: i64) -> Result<(), AppError> {
        if self.store.delete_class(id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }

    async fn load(&self, id: i64) -> Result<Class, AppError> {
        self.store.get_class_by_id(id).await?.ok_or(AppError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewCourseRequest, NewStudentRequest};
    use crate::store::MemoryStore;

    async fn setup() -> (ClassService, i64) {
        setup_with_price(Decimal::new(30, 0)).await
    }

    async fn setup_with_price(price: Decimal) -> (ClassService, i64) {
        let store = Arc::new(MemoryStore::new());
        let course = store
            .create_course(NewCourseRequest {
                name: "Inglés".to_string(),
                price,
                shared_class_price: None,
                duration_default: 60,
                color: "#123456".to_string(),
                is_active: true,
            })
            .await
            .unwrap();
        let student = store
            .create_student(NewStudentRequest {
                first_name: "Pablo".to_string(),
                last_name: "Ruiz".to_string(),
                course_id: course.id,
                start_date: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
                fixed_schedule: None,
                has_shared_pricing: false,
                email: None,
                phone: None,
                tax_id: None,
            })
            .await
            .unwrap();
        (ClassService::new(store), student.id)
    }

    fn status(status: ClassStatus, confirm: bool) -> StatusUpdateRequest {
        StatusUpdateRequest { status, confirm }
    }

    fn manual(student_id: i64, start: &str, end: &str) -> NewManualClassRequest {
        NewManualClassRequest {
            student_id,
            date: NaiveDate::from_ymd_opt(2024, 1, 20).unwrap(),
            start_time: start.to_string(),
            end_time: end.to_string(),
            price: None,
            subject: Some("Repaso".to_string()),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_manual_class_is_priced_from_course() {
        let (service, student_id) = setup().await;
        let class = service
            .create_manual_class(manual(student_id, "10:00", "11:30"))
            .await
            .unwrap();

        assert!(!class.is_recurring);
        assert_eq!(class.duration_minutes, 90);
        assert_eq!(class.price, Decimal::new(4500, 2));
        // 2024-01-20 is a Saturday
        assert_eq!(class.day_of_week, 6);
    }

    #[tokio::test]
    async fn test_manual_class_with_oversized_course_price() {
        let huge = Decimal::from_i128_with_scale(10_i128.pow(28), 0);
        let (service, student_id) = setup_with_price(huge).await;
        let result = service.create_manual_class(manual(student_id, "10:00", "11:00")).await;
        assert!(matches!(result, Err(AppError::DataIntegrity(_))));
    }

    #[tokio::test]
    async fn test_manual_class_rejects_inverted_times() {
        let (service, student_id) = setup().await;
        let result = service.create_manual_class(manual(student_id, "12:00", "11:00")).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_completed_class_cannot_be_cancelled() {
        let (service, student_id) = setup().await;
        let class = service
            .create_manual_class(manual(student_id, "10:00", "11:00"))
            .await
            .unwrap();

        let done = service
            .update_status(class.id, status(ClassStatus::Completed, false))
            .await
            .unwrap();
        assert_eq!(done.status, ClassStatus::Completed);

        let result = service
            .update_status(class.id, status(ClassStatus::Cancelled, true))
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_cancelling_paid_class_needs_confirmation() {
        let (service, student_id) = setup().await;
        let class = service
            .create_manual_class(manual(student_id, "10:00", "11:00"))
            .await
            .unwrap();
        service
            .update_payment(class.id, PaymentUpdateRequest { payment_status: PaymentStatus::Paid })
            .await
            .unwrap();

        let refused = service
            .update_status(class.id, status(ClassStatus::Cancelled, false))
            .await;
        assert!(matches!(refused, Err(AppError::Conflict(_))));

        let cancelled = service
            .update_status(class.id, status(ClassStatus::Cancelled, true))
            .await
            .unwrap();
        assert_eq!(cancelled.status, ClassStatus::Cancelled);
        assert_eq!(cancelled.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_missing_class_is_not_found() {
        let (service, _) = setup().await;
        assert!(matches!(service.delete_class(404).await, Err(AppError::NotFound)));
        let result = service
            .update_payment(404, PaymentUpdateRequest { payment_status: PaymentStatus::Paid })
            .await;
        assert!(matches!(result, Err(AppError::NotFound)));
    }
}
