pub mod dto;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::models::{
    Class, ClassFilter, ClassPatch, Course, NewClass, NewCourseRequest, NewStudentRequest, Student,
    StudentPatch,
};
use crate::store::RecordStore;

#[derive(Clone, Debug)]
pub struct RestConfig {
    /// Project URL, e.g. `https://xyz.example.co`; tables live under `/rest/v1/`.
    pub base_url: String,
    pub api_key: String,
}

/// Record store backed by the hosted table API (PostgREST dialect).
pub struct RestStore {
    client: Client,
    config: RestConfig,
}

impl RestStore {
    pub fn new(config: RestConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn table_url(&self, table: &str, params: &[(&str, String)]) -> Result<Url, AppError> {
        let raw = format!("{}/rest/v1/{}", self.config.base_url.trim_end_matches('/'), table);
        let mut url = Url::parse(&raw)
            .map_err(|e| AppError::Config(format!("REST_URL is invalid: {}", e)))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.config.api_key)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
    }

    async fn check(response: Response, action: &str) -> Result<Response, AppError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!("table API rejected {}: {} {}", action, status, body);
        Err(AppError::BadRequest(format!(
            "Record store rejected {}: {} {}",
            action, status, body
        )))
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, AppError> {
        let url = self.table_url(table, params)?;
        debug!("GET {}", url);
        let response = self.request(Method::GET, url).send().await?;
        let response = Self::check(response, &format!("select from {}", table)).await?;
        Ok(response.json::<Vec<T>>().await?)
    }

    async fn insert<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> Result<T, AppError> {
        let url = self.table_url(table, &[])?;
        let response = self
            .request(Method::POST, url)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        let response = Self::check(response, &format!("insert into {}", table)).await?;
        response
            .json::<Vec<T>>()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                AppError::DataIntegrity(format!("insert into {} returned no row", table))
            })
    }

    async fn update<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        id: i64,
        body: &B,
    ) -> Result<Option<T>, AppError> {
        let url = self.table_url(table, &[("id", format!("eq.{}", id))])?;
        let response = self
            .request(Method::PATCH, url)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        let response = Self::check(response, &format!("update of {}.{}", table, id)).await?;
        Ok(response.json::<Vec<T>>().await?.into_iter().next())
    }
}

pub fn class_filter_params(filter: &ClassFilter) -> Vec<(&'static str, String)> {
    let mut params = vec![("select", "*".to_string())];
    if let Some(student_id) = filter.student_id {
        params.push(("student_id", format!("eq.{}", student_id)));
    }
    if let Some(is_recurring) = filter.is_recurring {
        params.push(("is_recurring", format!("eq.{}", is_recurring)));
    }
    if let Some(from) = filter.date_from {
        params.push(("date", format!("gte.{}", from)));
    }
    if let Some(to) = filter.date_to {
        params.push(("date", format!("lte.{}", to)));
    }
    params.push(("order", "date.asc,start_time.asc,id.asc".to_string()));
    params
}

fn by_id(id: i64) -> Vec<(&'static str, String)> {
    vec![("select", "*".to_string()), ("id", format!("eq.{}", id))]
}

#[async_trait]
impl RecordStore for RestStore {
    async fn ping(&self) -> Result<(), AppError> {
        let params = [("select", "id".to_string()), ("limit", "1".to_string())];
        self.select::<dto::InsertedRow>("courses", &params).await?;
        Ok(())
    }

    async fn get_course_by_id(&self, id: i64) -> Result<Option<Course>, AppError> {
        let rows = self.select::<dto::CourseRecord>("courses", &by_id(id)).await?;
        Ok(rows.into_iter().next().map(Course::from))
    }

    async fn list_courses(&self) -> Result<Vec<Course>, AppError> {
        let params = [("select", "*".to_string()), ("order", "name.asc".to_string())];
        let rows = self.select::<dto::CourseRecord>("courses", &params).await?;
        Ok(rows.into_iter().map(Course::from).collect())
    }

    async fn create_course(&self, req: NewCourseRequest) -> Result<Course, AppError> {
        let record: dto::CourseRecord = self.insert("courses", &req).await?;
        Ok(Course::from(record))
    }

    async fn get_student_by_id(&self, id: i64) -> Result<Option<Student>, AppError> {
        self.select::<dto::StudentRecord>("students", &by_id(id))
            .await?
            .into_iter()
            .next()
            .map(Student::try_from)
            .transpose()
    }

    async fn create_student(&self, req: NewStudentRequest) -> Result<Student, AppError> {
        let body = dto::StudentInsert::from_request(&req)?;
        let record: dto::StudentRecord = self.insert("students", &body).await?;
        Student::try_from(record)
    }

    async fn update_student(&self, id: i64, patch: StudentPatch) -> Result<bool, AppError> {
        let body = dto::StudentUpdate::try_from(&patch)?;
        let updated: Option<dto::InsertedRow> = self.update("students", id, &body).await?;
        Ok(updated.is_some())
    }

    async fn create_class(&self, payload: &NewClass) -> Result<i64, AppError> {
        let row: dto::InsertedRow = self.insert("classes", payload).await?;
        Ok(row.id)
    }

    async fn get_class_by_id(&self, id: i64) -> Result<Option<Class>, AppError> {
        Ok(self.select::<Class>("classes", &by_id(id)).await?.into_iter().next())
    }

    async fn list_classes(&self, filter: &ClassFilter) -> Result<Vec<Class>, AppError> {
        self.select("classes", &class_filter_params(filter)).await
    }

    async fn update_class(&self, id: i64, patch: ClassPatch) -> Result<Option<Class>, AppError> {
        self.update("classes", id, &patch).await
    }

    async fn delete_class(&self, id: i64) -> Result<bool, AppError> {
        let url = self.table_url("classes", &[("id", format!("eq.{}", id))])?;
        let response = self
            .request(Method::DELETE, url)
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let response = Self::check(response, &format!("delete of classes.{}", id)).await?;
        let deleted = response.json::<Vec<dto::InsertedRow>>().await?;
        Ok(!deleted.is_empty())
    }
}
