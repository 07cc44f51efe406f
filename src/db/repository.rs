use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use crate::error::AppError;
use crate::models::time_slot::{decode_schedule, encode_schedule, parse_clock_time};
use crate::models::{
    Class, ClassFilter, ClassPatch, Course, NewClass, NewCourseRequest, NewStudentRequest, Student,
    StudentPatch,
};

const COURSE_COLUMNS: &str =
    "id, name, price, shared_class_price, duration_default, color, is_active";

const STUDENT_COLUMNS: &str = "id, first_name, last_name, course_id, start_date, fixed_schedule, \
     has_shared_pricing, email, phone, tax_id";

const CLASS_COLUMNS: &str = "id, student_id, course_id, date, start_time, end_time, \
     duration_minutes, day_of_week, price, status, payment_status, is_recurring, subject, notes";

#[derive(Debug, FromRow)]
struct CourseRow {
    id: i64,
    name: String,
    price: String,
    shared_class_price: Option<String>,
    duration_default: i64,
    color: String,
    is_active: bool,
}

impl TryFrom<CourseRow> for Course {
    type Error = AppError;

    fn try_from(row: CourseRow) -> Result<Self, Self::Error> {
        let shared_class_price = row
            .shared_class_price
            .as_deref()
            .map(|raw| parse_decimal("courses", row.id, raw))
            .transpose()?;
        Ok(Course {
            id: row.id,
            price: parse_decimal("courses", row.id, &row.price)?,
            shared_class_price,
            name: row.name,
            duration_default: row.duration_default,
            color: row.color,
            is_active: row.is_active,
        })
    }
}

#[derive(Debug, FromRow)]
struct StudentRow {
    id: i64,
    first_name: String,
    last_name: String,
    course_id: i64,
    start_date: NaiveDate,
    fixed_schedule: Option<String>,
    has_shared_pricing: bool,
    email: Option<String>,
    phone: Option<String>,
    tax_id: Option<String>,
}

impl TryFrom<StudentRow> for Student {
    type Error = AppError;

    fn try_from(row: StudentRow) -> Result<Self, Self::Error> {
        let fixed_schedule = match row.fixed_schedule.as_deref().map(str::trim) {
            None | Some("") | Some("null") => None,
            Some(raw) => Some(decode_schedule(raw).map_err(|e| {
                AppError::DataIntegrity(format!(
                    "students.{} has a malformed fixed_schedule: {}",
                    row.id, e
                ))
            })?),
        };
        Ok(Student {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            course_id: row.course_id,
            start_date: row.start_date,
            fixed_schedule,
            has_shared_pricing: row.has_shared_pricing,
            email: row.email,
            phone: row.phone,
            tax_id: row.tax_id,
        })
    }
}

#[derive(Debug, FromRow)]
struct ClassRow {
    id: i64,
    student_id: i64,
    course_id: i64,
    date: NaiveDate,
    start_time: String,
    end_time: String,
    duration_minutes: i64,
    day_of_week: i64,
    price: String,
    status: String,
    payment_status: String,
    is_recurring: bool,
    subject: Option<String>,
    notes: Option<String>,
}

impl TryFrom<ClassRow> for Class {
    type Error = AppError;

    fn try_from(row: ClassRow) -> Result<Self, Self::Error> {
        let corrupt = |field: &str, detail: String| {
            AppError::DataIntegrity(format!(
                "classes.{} has an invalid {}: {}",
                row.id, field, detail
            ))
        };
        Ok(Class {
            id: row.id,
            student_id: row.student_id,
            course_id: row.course_id,
            date: row.date,
            start_time: parse_clock_time(&row.start_time)
                .map_err(|e| corrupt("start_time", e.to_string()))?,
            end_time: parse_clock_time(&row.end_time)
                .map_err(|e| corrupt("end_time", e.to_string()))?,
            duration_minutes: row.duration_minutes,
            day_of_week: row.day_of_week,
            price: parse_decimal("classes", row.id, &row.price)?,
            status: row.status.parse().map_err(|e| corrupt("status", e))?,
            payment_status: row
                .payment_status
                .parse()
                .map_err(|e| corrupt("payment_status", e))?,
            is_recurring: row.is_recurring,
            subject: row.subject,
            notes: row.notes,
        })
    }
}

fn parse_decimal(table: &str, id: i64, raw: &str) -> Result<Decimal, AppError> {
    Decimal::from_str(raw.trim()).map_err(|e| {
        AppError::DataIntegrity(format!(
            "{}.{} has an unparsable price {:?}: {}",
            table, id, raw, e
        ))
    })
}

fn format_time(time: &chrono::NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

pub async fn ping(db: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("select 1").execute(db).await?;
    Ok(())
}

pub async fn fetch_courses(db: &SqlitePool) -> Result<Vec<Course>, AppError> {
    sqlx::query_as::<_, CourseRow>(&format!(
        "SELECT {COURSE_COLUMNS} FROM courses ORDER BY name"
    ))
    .fetch_all(db)
    .await?
    .into_iter()
    .map(Course::try_from)
    .collect()
}

pub async fn find_course_by_id(db: &SqlitePool, id: i64) -> Result<Option<Course>, AppError> {
    sqlx::query_as::<_, CourseRow>(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?"))
        .bind(id)
        .fetch_optional(db)
        .await?
        .map(Course::try_from)
        .transpose()
}

pub async fn insert_course(db: &SqlitePool, req: NewCourseRequest) -> Result<Course, AppError> {
    let id = sqlx::query(
        r#"
        INSERT INTO courses
            (name, price, shared_class_price, duration_default, color, is_active)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&req.name)
    .bind(req.price.to_string())
    .bind(req.shared_class_price.map(|p| p.to_string()))
    .bind(req.duration_default)
    .bind(&req.color)
    .bind(req.is_active)
    .execute(db)
    .await?
    .last_insert_rowid();

    Ok(Course {
        id,
        name: req.name,
        price: req.price,
        shared_class_price: req.shared_class_price,
        duration_default: req.duration_default,
        color: req.color,
        is_active: req.is_active,
    })
}

pub async fn find_student_by_id(db: &SqlitePool, id: i64) -> Result<Option<Student>, AppError> {
    sqlx::query_as::<_, StudentRow>(&format!(
        "SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?
    .map(Student::try_from)
    .transpose()
}

pub async fn insert_student(db: &SqlitePool, req: NewStudentRequest) -> Result<Student, AppError> {
    let fixed_schedule = req
        .fixed_schedule
        .as_deref()
        .map(encode_schedule)
        .transpose()?;

    let id = sqlx::query(
        r#"
        INSERT INTO students
            (first_name, last_name, course_id, start_date, fixed_schedule,
            has_shared_pricing, email, phone, tax_id)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&req.first_name)
    .bind(&req.last_name)
    .bind(req.course_id)
    .bind(req.start_date)
    .bind(fixed_schedule)
    .bind(req.has_shared_pricing)
    .bind(&req.email)
    .bind(&req.phone)
    .bind(&req.tax_id)
    .execute(db)
    .await?
    .last_insert_rowid();

    Ok(Student {
        id,
        first_name: req.first_name,
        last_name: req.last_name,
        course_id: req.course_id,
        start_date: req.start_date,
        fixed_schedule: req.fixed_schedule,
        has_shared_pricing: req.has_shared_pricing,
        email: req.email,
        phone: req.phone,
        tax_id: req.tax_id,
    })
}

pub async fn update_student(
    db: &SqlitePool,
    id: i64,
    patch: StudentPatch,
) -> Result<bool, AppError> {
    let mut current = match find_student_by_id(db, id).await? {
        Some(s) => s,
        None => return Ok(false),
    };
    patch.apply(&mut current);

    let fixed_schedule = current
        .fixed_schedule
        .as_deref()
        .map(encode_schedule)
        .transpose()?;

    let result = sqlx::query(
        r#"
        UPDATE students
        SET fixed_schedule = ?1,
            course_id = ?2,
            has_shared_pricing = ?3
        WHERE id = ?4
        "#,
    )
    .bind(fixed_schedule)
    .bind(current.course_id)
    .bind(current.has_shared_pricing)
    .bind(id)
    .execute(db)
    .await?
    .rows_affected();

    Ok(result > 0)
}

pub async fn insert_class(db: &SqlitePool, payload: &NewClass) -> Result<i64, AppError> {
    let id = sqlx::query(
        r#"
        INSERT INTO classes
            (student_id, course_id, date, start_time, end_time, duration_minutes,
            day_of_week, price, status, payment_status, is_recurring, subject, notes)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )
    .bind(payload.student_id)
    .bind(payload.course_id)
    .bind(payload.date)
    .bind(format_time(&payload.start_time))
    .bind(format_time(&payload.end_time))
    .bind(payload.duration_minutes)
    .bind(payload.day_of_week)
    .bind(payload.price.to_string())
    .bind(payload.status.as_str())
    .bind(payload.payment_status.as_str())
    .bind(payload.is_recurring)
    .bind(&payload.subject)
    .bind(&payload.notes)
    .execute(db)
    .await?
    .last_insert_rowid();

    Ok(id)
}

pub async fn find_class_by_id(db: &SqlitePool, id: i64) -> Result<Option<Class>, AppError> {
    sqlx::query_as::<_, ClassRow>(&format!("SELECT {CLASS_COLUMNS} FROM classes WHERE id = ?"))
        .bind(id)
        .fetch_optional(db)
        .await?
        .map(Class::try_from)
        .transpose()
}

pub async fn fetch_classes(db: &SqlitePool, filter: &ClassFilter) -> Result<Vec<Class>, AppError> {
    let mut query =
        QueryBuilder::<Sqlite>::new(format!("SELECT {CLASS_COLUMNS} FROM classes WHERE 1 = 1"));
    if let Some(student_id) = filter.student_id {
        query.push(" AND student_id = ").push_bind(student_id);
    }
    if let Some(is_recurring) = filter.is_recurring {
        query.push(" AND is_recurring = ").push_bind(is_recurring);
    }
    if let Some(from) = filter.date_from {
        query.push(" AND date >= ").push_bind(from);
    }
    if let Some(to) = filter.date_to {
        query.push(" AND date <= ").push_bind(to);
    }
    query.push(" ORDER BY date, start_time, id");

    query
        .build_query_as::<ClassRow>()
        .fetch_all(db)
        .await?
        .into_iter()
        .map(Class::try_from)
        .collect()
}

pub async fn update_class(
    db: &SqlitePool,
    id: i64,
    patch: ClassPatch,
) -> Result<Option<Class>, AppError> {
    let mut current = match find_class_by_id(db, id).await? {
        Some(c) => c,
        None => return Ok(None),
    };
    patch.apply(&mut current);

    sqlx::query(
        r#"
        UPDATE classes
        SET status = ?1,
            payment_status = ?2,
            notes = ?3
        WHERE id = ?4
        "#,
    )
    .bind(current.status.as_str())
    .bind(current.payment_status.as_str())
    .bind(&current.notes)
    .bind(id)
    .execute(db)
    .await?;

    Ok(Some(current))
}

pub async fn delete_class(db: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM classes WHERE id = ?1")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}
