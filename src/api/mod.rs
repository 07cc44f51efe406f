use axum::Json;
use axum::extract::{Path, Query};
use axum::routing::{patch, post, put};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::*;
use crate::services::class_service::{
    NewManualClassRequest, PaymentUpdateRequest, StatusUpdateRequest,
};
use crate::services::{MaterializeStats, ReconcileStats};
use crate::state::AppState;

const MAX_HOURLY_PRICE: i64 = 1_000_000;

fn is_valid_hourly_price(price: Decimal) -> bool {
    price > Decimal::ZERO && price <= Decimal::from(MAX_HOURLY_PRICE)
}

#[derive(Deserialize)]
struct UpdateScheduleRequest {
    fixed_schedule: Vec<TimeSlot>,
    #[serde(default)]
    horizon_end: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct GenerateParams {
    #[serde(default)]
    end_date: Option<NaiveDate>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/courses", get(list_courses).post(create_course))
        .route("/students", post(create_student))
        .route("/students/{id}", get(get_student))
        .route("/students/{id}/schedule", put(update_schedule))
        .route("/students/{id}/classes/generate", post(generate_classes))
        .route("/classes", get(list_classes).post(create_class))
        .route("/classes/{id}", get(get_class).delete(delete_class))
        .route("/classes/{id}/status", patch(update_class_status))
        .route("/classes/{id}/payment", patch(update_class_payment))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.store.ping().await?;
    Ok(StatusCode::OK)
}

async fn list_courses(State(state): State<AppState>) -> Result<Json<Vec<Course>>, AppError> {
    let courses = state.store.list_courses().await?;
    Ok(Json(courses))
}

async fn create_course(
    State(state): State<AppState>,
    Json(req): Json<NewCourseRequest>
) -> Result<Json<Course>, AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::BadRequest("name must not be empty".to_string()));
    }
    let mut prices = std::iter::once(req.price).chain(req.shared_class_price);
    if !prices.all(is_valid_hourly_price) {
        return Err(AppError::Validation(format!(
            "course prices must be positive and at most {}",
            MAX_HOURLY_PRICE
        )));
    }
    let course = state.store.create_course(req).await?;
    Ok(Json(course))
}

async fn create_student(
    State(state): State<AppState>,
    Json(req): Json<NewStudentRequest>
) -> Result<Json<Student>, AppError> {
    if let Some(schedule) = &req.fixed_schedule {
        time_slot::validate_schedule(schedule)?;
    }
    if state.store.get_course_by_id(req.course_id).await?.is_none() {
        return Err(AppError::BadRequest(format!("course {} does not exist", req.course_id)));
    }
    let student = state.store.create_student(req).await?;
    Ok(Json(student))
}

async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<i64>
) -> Result<Json<Student>, AppError> {
    let student = state
        .store
        .get_student_by_id(id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(student))
}

async fn update_schedule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateScheduleRequest>
) -> Result<Json<ReconcileStats>, AppError> {
    let stats = state
        .schedule_service()
        .reconcile_schedule(id, req.fixed_schedule, req.horizon_end)
        .await?;
    Ok(Json(stats))
}

async fn generate_classes(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<GenerateParams>
) -> Result<Json<MaterializeStats>, AppError> {
    let stats = state
        .schedule_service()
        .materialize_student(id, params.end_date)
        .await?;
    Ok(Json(stats))
}

async fn list_classes(
    State(state): State<AppState>,
    Query(filter): Query<ClassFilter>
) -> Result<Json<Vec<Class>>, AppError> {
    let classes = state.store.list_classes(&filter).await?;
    Ok(Json(classes))
}

async fn create_class(
    State(state): State<AppState>,
    Json(req): Json<NewManualClassRequest>
) -> Result<Json<Class>, AppError> {
    let class = state.class_service().create_manual_class(req).await?;
    Ok(Json(class))
}

async fn get_class(
    State(state): State<AppState>,
    Path(id): Path<i64>
) -> Result<Json<Class>, AppError> {
    let class = state
        .store
        .get_class_by_id(id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(class))
}

async fn update_class_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<StatusUpdateRequest>
) -> Result<Json<Class>, AppError> {
    let class = state.class_service().update_status(id, req).await?;
    Ok(Json(class))
}

async fn update_class_payment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<PaymentUpdateRequest>
) -> Result<Json<Class>, AppError> {
    let class = state.class_service().update_payment(id, req).await?;
    Ok(Json(class))
}

async fn delete_class(
    State(state): State<AppState>,
    Path(id): Path<i64>
) -> Result<StatusCode, AppError> {
    state.class_service().delete_class(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
