use std::sync::Arc;

use chrono::{Days, NaiveDate};
use serde::Serialize;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::AppError;
use crate::models::time_slot::validate_schedule;
use crate::models::{ClassFilter, Course, NewClass, Student, StudentPatch, TimeSlot};
use crate::services::class_generation::{
    GenerationInput, generate_classes_from_start_date, without_existing,
};
use crate::store::RecordStore;

/// Turns weekly templates into dated classes and keeps them in step with
/// template edits. Rows dated before today are never modified here.
pub struct ScheduleService {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    horizon_days: i64,
}

#[derive(Debug, Default, Serialize, PartialEq)]
pub struct MaterializeStats {
    pub generated: usize,
    pub skipped_existing: usize,
    pub created: usize,
}

#[derive(Debug, Default, Serialize, PartialEq)]
pub struct ReconcileStats {
    /// Recurring rows before today, left as they were.
    pub preserved_history: usize,
    pub deleted: usize,
    pub generated: usize,
    pub skipped_existing: usize,
    pub created: usize,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>, horizon_days: i64) -> Self {
        Self {
            store,
            clock,
            horizon_days,
        }
    }

    /// Generates the student's classes from their start date through
    /// `end_date` (today by default), inserting only occurrences not already
    /// stored.
    pub async fn materialize_student(
        &self,
        student_id: i64,
        end_date: Option<NaiveDate>,
    ) -> Result<MaterializeStats, AppError> {
        let student = self.load_student(student_id).await?;
        let end_date = end_date.unwrap_or_else(|| self.clock.today());

        if student.schedule().is_empty() {
            info!(student_id, "student has no fixed schedule, nothing to materialize");
            return Ok(MaterializeStats::default());
        }

        let course = self.load_course(&student).await?;
        let candidates = generate_classes_from_start_date(&GenerationInput {
            student_id,
            course: &course,
            fixed_schedule: student.schedule(),
            start_date: student.start_date,
            end_date,
            shared_pricing: student.has_shared_pricing,
        })?;
        let generated = candidates.len();

        let existing = self
            .store
            .list_classes(
                &ClassFilter::for_student(student_id)
                    .from_date(student.start_date)
                    .to_date(end_date),
            )
            .await?;
        let (fresh, skipped_existing) = without_existing(candidates, &existing);
        let created = self.persist(&fresh).await?;

        info!(
            student_id,
            generated, skipped_existing, created, "materialized classes through {}", end_date
        );
        Ok(MaterializeStats {
            generated,
            skipped_existing,
            created,
        })
    }

    /// Replaces the student's weekly template and regenerates their future
    /// recurring classes.
    ///
    /// Recurring rows dated today or later are deleted and rebuilt from the
    /// new template, starting at today (or the student's start date if that
    /// is later) and running through `horizon_end`, or the configured
    /// horizon past today. Earlier rows and manual classes are left alone,
    /// and no occurrence is added where any class with the same key remains.
    ///
    /// The store offers no transaction, so a failure after the deletions can
    /// leave the student without future classes; running this again with
    /// the same template repairs that.
    pub async fn reconcile_schedule(
        &self,
        student_id: i64,
        fixed_schedule: Vec<TimeSlot>,
        horizon_end: Option<NaiveDate>,
    ) -> Result<ReconcileStats, AppError> {
        validate_schedule(&fixed_schedule)?;

        let today = self.clock.today();
        let horizon_end = match horizon_end {
            Some(end) if end < today => {
                return Err(AppError::Validation(format!(
                    "horizon end {} is before today ({})",
                    end, today
                )));
            }
            Some(end) => end,
            None => today
                .checked_add_days(Days::new(self.horizon_days.unsigned_abs()))
                .unwrap_or(today),
        };

        let student = self.load_student(student_id).await?;
        let course = self.load_course(&student).await?;

        // Candidates are computed before any deletion; a generation failure
        // leaves stored rows untouched.
        let start_date = today.max(student.start_date);
        let candidates = if start_date <= horizon_end {
            generate_classes_from_start_date(&GenerationInput {
                student_id,
                course: &course,
                fixed_schedule: &fixed_schedule,
                start_date,
                end_date: horizon_end,
                shared_pricing: student.has_shared_pricing,
            })?
        } else {
            info!(
                student_id,
                %start_date,
                %horizon_end,
                "student starts after the horizon, nothing to generate"
            );
            Vec::new()
        };
        let generated = candidates.len();

        let patch = StudentPatch {
            fixed_schedule: Some(fixed_schedule),
            ..StudentPatch::default()
        };
        if !self.store.update_student(student_id, patch).await? {
            return Err(AppError::NotFound);
        }

        let recurring = self
            .store
            .list_classes(&ClassFilter::for_student(student_id).recurring())
            .await?;
        let (future, history): (Vec<_>, Vec<_>) = recurring
            .into_iter()
            .filter(|class| class.is_recurring)
            .partition(|class| class.date >= today);

        let mut deleted = 0;
        for class in &future {
            if self.store.delete_class(class.id).await? {
                deleted += 1;
            } else {
                warn!(
                    student_id,
                    class_id = class.id,
                    "class vanished before it could be deleted"
                );
            }
        }
        info!(
            student_id,
            deleted,
            preserved = history.len(),
            "removed future recurring classes"
        );

        // Manual classes count as existing too, as in `materialize_student`.
        let remaining = self
            .store
            .list_classes(&ClassFilter::for_student(student_id).from_date(today))
            .await?;
        let (fresh, skipped_existing) = without_existing(candidates, &remaining);
        let created = self.persist(&fresh).await?;

        let stats = ReconcileStats {
            preserved_history: history.len(),
            deleted,
            generated,
            skipped_existing,
            created,
        };
        info!(student_id, ?stats, "schedule reconciled through {}", horizon_end);
        Ok(stats)
    }

    async fn load_student(&self, student_id: i64) -> Result<Student, AppError> {
        self.store
            .get_student_by_id(student_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn load_course(&self, student: &Student) -> Result<Course, AppError> {
        self.store
            .get_course_by_id(student.course_id)
            .await?
            .ok_or_else(|| {
                tracing::error!(
                    student_id = student.id,
                    course_id = student.course_id,
                    "student references a missing course"
                );
                AppError::DataIntegrity(format!(
                    "course {} of student {} not found",
                    student.course_id, student.id
                ))
            })
    }

    async fn persist(&self, classes: &[NewClass]) -> Result<usize, AppError> {
        for class in classes {
            self.store.create_class(class).await?;
        }
        Ok(classes.len())
    }
}
