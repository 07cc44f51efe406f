use std::collections::HashSet;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::models::{Class, ClassKey, ClassStatus, Course, NewClass, PaymentStatus, TimeSlot};

/// Ranges longer than this are generated but logged as a performance caution.
pub const LARGE_RANGE_DAYS: i64 = 730;

#[derive(Debug, Error, PartialEq)]
pub enum GenerationError {
    #[error("start date {start} is after end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("identifier {0} is not positive")]
    InvalidIdentifier(i64),

    #[error("course {course_id} has no usable hourly price ({price})")]
    InvalidCoursePrice { course_id: i64, price: Decimal },
}

/// Everything the materializer needs; nothing here touches the record store.
#[derive(Debug, Clone)]
pub struct GenerationInput<'a> {
    pub student_id: i64,
    pub course: &'a Course,
    pub fixed_schedule: &'a [TimeSlot],
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub shared_pricing: bool,
}

/// Expands each weekly slot into one candidate per week in
/// `[start_date, end_date]`.
///
/// Slots that fail validation are skipped with a warning. Bad bounds or a
/// bad course price abort the whole call. The result is sorted by date and
/// start time and is not yet de-duplicated against stored rows; see
/// [`without_existing`].
pub fn generate_classes_from_start_date(
    input: &GenerationInput<'_>,
) -> Result<Vec<NewClass>, GenerationError> {
    let GenerationInput {
        student_id,
        course,
        fixed_schedule,
        start_date,
        end_date,
        shared_pricing,
    } = *input;

    for id in [student_id, course.id] {
        if id <= 0 {
            error!(
                student_id,
                course_id = course.id,
                "refusing to generate classes: identifier {} is not positive",
                id
            );
            return Err(GenerationError::InvalidIdentifier(id));
        }
    }

    if start_date > end_date {
        error!(
            student_id,
            %start_date,
            %end_date,
            "refusing to generate classes: inverted date range"
        );
        return Err(GenerationError::InvalidDateRange {
            start: start_date,
            end: end_date,
        });
    }

    let rate = course.hourly_rate(shared_pricing);
    let invalid_price = || {
        error!(
            student_id,
            course_id = course.id,
            %rate,
            "refusing to generate classes: invalid course price"
        );
        GenerationError::InvalidCoursePrice {
            course_id: course.id,
            price: rate,
        }
    };
    if rate <= Decimal::ZERO {
        return Err(invalid_price());
    }

    let span_days = (end_date - start_date).num_days();
    if span_days > LARGE_RANGE_DAYS {
        warn!(student_id, span_days, "generating classes over an unusually large range");
    }

    let mut candidates = Vec::new();
    for (index, slot) in fixed_schedule.iter().enumerate() {
        let window = match slot.window() {
            Ok(window) => window,
            Err(e) => {
                warn!(student_id, slot_index = index, ?slot, "skipping time slot: {}", e);
                continue;
            }
        };

        let duration_minutes = window.duration_minutes();
        let price = class_price(duration_minutes, rate).ok_or_else(invalid_price)?;

        let mut next = next_occurrence(start_date, window.weekday);
        while let Some(date) = next.filter(|date| *date <= end_date) {
            candidates.push(NewClass {
                student_id,
                course_id: course.id,
                date,
                start_time: window.start,
                end_time: window.end,
                duration_minutes,
                day_of_week: i64::from(window.weekday.num_days_from_sunday()),
                price,
                status: ClassStatus::Scheduled,
                payment_status: PaymentStatus::Unpaid,
                is_recurring: true,
                subject: slot.subject.clone(),
                notes: None,
            });
            next = date.checked_add_days(Days::new(7));
        }
    }

    candidates.sort_by_key(|c| (c.date, c.start_time));
    debug!(
        student_id,
        count = candidates.len(),
        %start_date,
        %end_date,
        "generated class candidates"
    );
    Ok(candidates)
}

/// First date on or after `from` that falls on `weekday`, or `None` past the
/// end of the calendar.
pub fn next_occurrence(from: NaiveDate, weekday: Weekday) -> Option<NaiveDate> {
    let target = weekday.num_days_from_sunday();
    let current = from.weekday().num_days_from_sunday();
    let ahead = (target + 7 - current) % 7;
    from.checked_add_days(Days::new(u64::from(ahead)))
}

/// `round((minutes / 60) * rate, 2)`, half-up. `None` when the amount does not
/// fit in a `Decimal`.
pub fn class_price(duration_minutes: i64, rate: Decimal) -> Option<Decimal> {
    Decimal::from(duration_minutes)
        .checked_mul(rate)?
        .checked_div(Decimal::from(60))
        .map(|price| price.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

/// Drops candidates whose `(student, date, start, end)` already exists, and
/// duplicates within the candidate list itself. Returns the survivors and the
/// number dropped.
pub fn without_existing(
    candidates: Vec<NewClass>,
    existing: &[Class],
) -> (Vec<NewClass>, usize) {
    let mut seen: HashSet<ClassKey> = existing.iter().map(Class::key).collect();
    let total = candidates.len();
    let fresh: Vec<NewClass> = candidates
        .into_iter()
        .filter(|candidate| seen.insert(candidate.key()))
        .collect();
    let dropped = total - fresh.len();
    (fresh, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn course(price: Decimal) -> Course {
        Course {
            id: 3,
            name: "Matemáticas".to_string(),
            price,
            shared_class_price: Some(Decimal::new(1800, 2)),
            duration_default: 60,
            color: "#ff0000".to_string(),
            is_active: true,
        }
    }

    fn slot(day: i64, start: &str, end: &str) -> TimeSlot {
        TimeSlot {
            subject: Some("Álgebra".to_string()),
            course_id: Some(3),
            ..TimeSlot::new(day, start, end)
        }
    }

    fn input<'a>(
        course: &'a Course,
        schedule: &'a [TimeSlot],
        start: NaiveDate,
        end: NaiveDate,
    ) -> GenerationInput<'a> {
        GenerationInput {
            student_id: 7,
            course,
            fixed_schedule: schedule,
            start_date: start,
            end_date: end,
            shared_pricing: false,
        }
    }

    fn generate(
        course: &Course,
        schedule: &[TimeSlot],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NewClass>, GenerationError> {
        generate_classes_from_start_date(&input(course, schedule, start, end))
    }

    #[test]
    fn test_weekly_monday_slot_through_february() {
        let course = course(Decimal::new(25, 0));
        let schedule = vec![slot(1, "16:00", "17:00")];
        let classes = generate(&course, &schedule, date(2024, 1, 15), date(2024, 2, 5)).unwrap();

        let dates: Vec<NaiveDate> = classes.iter().map(|c| c.date).collect();
        assert_eq!(
            dates,
            vec![date(2024, 1, 15), date(2024, 1, 22), date(2024, 1, 29), date(2024, 2, 5)]
        );
        for class in &classes {
            assert_eq!(class.price, Decimal::new(2500, 2));
            assert_eq!(class.duration_minutes, 60);
            assert_eq!(class.day_of_week, 1);
            assert_eq!(class.course_id, 3);
            assert!(class.is_recurring);
            assert_eq!(class.status, ClassStatus::Scheduled);
            assert_eq!(class.payment_status, PaymentStatus::Unpaid);
            assert_eq!(class.subject.as_deref(), Some("Álgebra"));
        }
    }

    #[test]
    fn test_first_occurrence_is_next_matching_weekday() {
        // 2024-01-24 is a Wednesday
        assert_eq!(next_occurrence(date(2024, 1, 24), Weekday::Wed), Some(date(2024, 1, 24)));
        assert_eq!(next_occurrence(date(2024, 1, 24), Weekday::Mon), Some(date(2024, 1, 29)));
        assert_eq!(next_occurrence(date(2024, 1, 24), Weekday::Sun), Some(date(2024, 1, 28)));
        assert_eq!(next_occurrence(date(2024, 1, 27), Weekday::Sun), Some(date(2024, 1, 28)));
    }

    #[test]
    fn test_generation_stops_at_end_of_calendar() {
        let last = NaiveDate::MAX;
        assert_eq!(next_occurrence(last, last.weekday().succ()), None);

        let course = course(Decimal::new(25, 0));
        let day = i64::from(last.weekday().num_days_from_sunday());
        let schedule = vec![slot(day, "16:00", "17:00"), slot((day + 1) % 7, "16:00", "17:00")];
        let start = last - Days::new(3);
        let classes = generate(&course, &schedule, start, last).unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].date, last);
    }

    #[test]
    fn test_generated_dates_stay_within_bounds() {
        let course = course(Decimal::new(20, 0));
        let schedule = vec![
            slot(0, "10:00", "11:00"),
            slot(3, "18:00", "19:30"),
            slot(6, "09:00", "10:00"),
        ];
        let start = date(2024, 3, 6);
        let end = date(2024, 4, 2);
        let classes = generate(&course, &schedule, start, end).unwrap();

        assert!(!classes.is_empty());
        assert!(classes.iter().all(|c| c.date >= start && c.date <= end));
        assert!(
            classes
                .windows(2)
                .all(|w| (w[0].date, w[0].start_time) <= (w[1].date, w[1].start_time))
        );
    }

    #[test]
    fn test_single_day_range() {
        let course = course(Decimal::new(20, 0));
        let schedule = vec![slot(1, "16:00", "17:00"), slot(2, "16:00", "17:00")];
        let monday = date(2024, 1, 15);
        let classes = generate(&course, &schedule, monday, monday).unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].date, monday);
    }

    #[test]
    fn test_price_is_rounded_half_up() {
        assert_eq!(class_price(60, Decimal::new(25, 0)), Some(Decimal::new(2500, 2)));
        assert_eq!(class_price(45, Decimal::new(25, 0)), Some(Decimal::new(1875, 2)));
        assert_eq!(class_price(50, Decimal::new(25, 0)), Some(Decimal::new(2083, 2)));
        assert_eq!(class_price(90, Decimal::new(1999, 2)), Some(Decimal::new(2999, 2)));
        // 0.3 / 60 = 0.005 exactly
        assert_eq!(class_price(1, Decimal::new(3, 1)), Some(Decimal::new(1, 2)));
    }

    #[test]
    fn test_price_overflow_is_rejected() {
        let huge = Decimal::from_i128_with_scale(10_i128.pow(28), 0);
        assert_eq!(class_price(60, huge), None);

        let course = course(huge);
        let schedule = vec![slot(1, "16:00", "17:00")];
        let result = generate(&course, &schedule, date(2024, 1, 15), date(2024, 2, 5));
        assert_eq!(
            result,
            Err(GenerationError::InvalidCoursePrice {
                course_id: 3,
                price: huge
            })
        );
    }

    #[test]
    fn test_shared_pricing_uses_shared_rate() {
        let course = course(Decimal::new(25, 0));
        let schedule = vec![slot(1, "16:00", "17:00")];
        let mut shared = input(&course, &schedule, date(2024, 1, 15), date(2024, 1, 15));
        shared.shared_pricing = true;
        let classes = generate_classes_from_start_date(&shared).unwrap();
        assert_eq!(classes[0].price, Decimal::new(1800, 2));
    }

    #[test]
    fn test_invalid_slot_is_skipped_but_others_generate() {
        let course = course(Decimal::new(25, 0));
        let schedule = vec![
            slot(1, "17:00", "16:00"),
            slot(8, "10:00", "11:00"),
            slot(3, "18:00", "19:00"),
        ];
        let classes = generate(&course, &schedule, date(2024, 1, 15), date(2024, 1, 31)).unwrap();

        let dates: Vec<NaiveDate> = classes.iter().map(|c| c.date).collect();
        assert_eq!(dates, vec![date(2024, 1, 17), date(2024, 1, 24), date(2024, 1, 31)]);
    }

    #[test]
    fn test_slot_with_null_time_is_skipped() {
        let course = course(Decimal::new(25, 0));
        let schedule = crate::models::time_slot::decode_schedule(
            r#"[
                {"dayOfWeek": 3, "startTime": null, "endTime": "19:00"},
                {"dayOfWeek": 1, "startTime": "16:00", "endTime": "17:00"}
            ]"#,
        )
        .unwrap();
        let classes = generate(&course, &schedule, date(2024, 1, 15), date(2024, 1, 31)).unwrap();

        let dates: Vec<NaiveDate> = classes.iter().map(|c| c.date).collect();
        assert_eq!(dates, vec![date(2024, 1, 15), date(2024, 1, 22), date(2024, 1, 29)]);
    }

    #[test]
    fn test_inverted_range_aborts() {
        let course = course(Decimal::new(25, 0));
        let schedule = vec![slot(1, "16:00", "17:00")];
        let result = generate(&course, &schedule, date(2024, 2, 1), date(2024, 1, 1));
        assert!(matches!(result, Err(GenerationError::InvalidDateRange { .. })));
    }

    #[test]
    fn test_bad_course_price_aborts() {
        let schedule = vec![slot(1, "16:00", "17:00")];
        for price in [Decimal::ZERO, Decimal::new(-5, 0)] {
            let course = course(price);
            let result = generate(&course, &schedule, date(2024, 1, 1), date(2024, 2, 1));
            assert_eq!(result, Err(GenerationError::InvalidCoursePrice { course_id: 3, price }));
        }
    }

    #[test]
    fn test_non_positive_student_id_aborts() {
        let course = course(Decimal::new(25, 0));
        let schedule = vec![slot(1, "16:00", "17:00")];
        let mut bad = input(&course, &schedule, date(2024, 1, 1), date(2024, 2, 1));
        bad.student_id = 0;
        assert_eq!(
            generate_classes_from_start_date(&bad),
            Err(GenerationError::InvalidIdentifier(0))
        );
    }

    #[test]
    fn test_large_range_still_generates() {
        let course = course(Decimal::new(25, 0));
        let schedule = vec![slot(1, "16:00", "17:00")];
        let classes = generate(&course, &schedule, date(2022, 1, 3), date(2024, 12, 30)).unwrap();
        assert_eq!(classes.len(), 157);
    }

    #[test]
    fn test_without_existing_drops_known_and_repeated_candidates() {
        let course = course(Decimal::new(25, 0));
        let schedule = vec![slot(1, "16:00", "17:00"), slot(1, "16:00", "17:00")];
        let candidates =
            generate(&course, &schedule, date(2024, 1, 15), date(2024, 1, 22)).unwrap();
        assert_eq!(candidates.len(), 4);

        let stored = vec![candidates[0].clone().into_class(1)];
        let (fresh, dropped) = without_existing(candidates, &stored);
        assert_eq!(dropped, 3);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].date, date(2024, 1, 22));
    }
}
