pub mod repository;

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::AppError;
use crate::models::{
    Class, ClassFilter, ClassPatch, Course, NewClass, NewCourseRequest, NewStudentRequest, Student,
    StudentPatch,
};
use crate::store::RecordStore;

/// Opens (creating if needed) the SQLite database and applies migrations.
pub async fn connect(database_url: &str) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

#[derive(Clone)]
pub struct SqliteStore {
    db: SqlitePool,
}

impl SqliteStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn ping(&self) -> Result<(), AppError> {
        repository::ping(&self.db).await?;
        Ok(())
    }

    async fn get_course_by_id(&self, id: i64) -> Result<Option<Course>, AppError> {
        repository::find_course_by_id(&self.db, id).await
    }

    async fn list_courses(&self) -> Result<Vec<Course>, AppError> {
        repository::fetch_courses(&self.db).await
    }

    async fn create_course(&self, req: NewCourseRequest) -> Result<Course, AppError> {
        repository::insert_course(&self.db, req).await
    }

    async fn get_student_by_id(&self, id: i64) -> Result<Option<Student>, AppError> {
        repository::find_student_by_id(&self.db, id).await
    }

    async fn create_student(&self, req: NewStudentRequest) -> Result<Student, AppError> {
        repository::insert_student(&self.db, req).await
    }

    async fn update_student(&self, id: i64, patch: StudentPatch) -> Result<bool, AppError> {
        repository::update_student(&self.db, id, patch).await
    }

    async fn create_class(&self, payload: &NewClass) -> Result<i64, AppError> {
        repository::insert_class(&self.db, payload).await
    }

    async fn get_class_by_id(&self, id: i64) -> Result<Option<Class>, AppError> {
        repository::find_class_by_id(&self.db, id).await
    }

    async fn list_classes(&self, filter: &ClassFilter) -> Result<Vec<Class>, AppError> {
        repository::fetch_classes(&self.db, filter).await
    }

    async fn update_class(&self, id: i64, patch: ClassPatch) -> Result<Option<Class>, AppError> {
        repository::update_class(&self.db, id, patch).await
    }

    async fn delete_class(&self, id: i64) -> Result<bool, AppError> {
        Ok(repository::delete_class(&self.db, id).await?)
    }
}
