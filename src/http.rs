//! JSON routes under `/schedules`, named after the actions they perform.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{FromRequest, FromRequestParts, Query, Request, State};
use axum::http::request::Parts;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tracing::instrument;
use ulid::Ulid;

use crate::config::Environment;
use crate::engine::{Engine, EngineError};
use crate::error::ApiError;
use crate::model::{Schedule, ScheduleView};
use crate::observability;
use crate::validate::{parse_date, RoomInput, ScheduleParams};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub environment: Environment,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, environment: Environment) -> Self {
        Self { engine, environment }
    }

    /// Record the outcome and attach the environment to any error.
    fn finish<T>(
        &self,
        operation: &'static str,
        started: Instant,
        result: Result<T, EngineError>,
    ) -> Result<Json<T>, ApiError> {
        observability::record_request(operation, result.is_ok(), started);
        result
            .map(Json)
            .map_err(|e| ApiError::new(e, self.environment))
    }
}

/// [`Json`] whose rejection renders as a `bad_request` error body.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<T> FromRequest<AppState> for JsonBody<T>
where
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(ApiError::malformed(rejection.body_text(), state.environment)),
        }
    }
}

/// [`Query`] whose rejection renders as a `bad_request` error body.
#[derive(Debug)]
pub struct QueryParams<T>(pub T);

impl<T> FromRequestParts<AppState> for QueryParams<T>
where
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(QueryParams(value)),
            Err(rejection) => Err(ApiError::malformed(rejection.body_text(), state.environment)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct RoomQuery {
    pub number_room: u32,
}

#[derive(Debug, Deserialize)]
pub struct DateRoomQuery {
    pub date: String,
    pub number_room: u32,
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Ulid,
}

/// Update body: the schedule id plus the same fields as a create.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpdateScheduleRequest {
    pub id: Ulid,
    pub number_room: Option<RoomInput>,
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

impl UpdateScheduleRequest {
    fn into_parts(self) -> (Ulid, ScheduleParams) {
        let params = ScheduleParams {
            number_room: self.number_room,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
        };
        (self.id, params)
    }
}

fn views(schedules: Vec<Schedule>) -> Vec<ScheduleView> {
    schedules.iter().map(ScheduleView::from).collect()
}

pub fn router(state: AppState) -> Router {
    let schedules = Router::new()
        .route("/list", get(list))
        .route("/list_by_date", get(list_by_date))
        .route("/list_by_number_room", get(list_by_number_room))
        .route("/list_by_date_and_number_room", get(list_by_date_and_number_room))
        .route("/find_schedule", get(find_schedule))
        .route("/create_schedule", post(create_schedule))
        .route("/update_schedule", put(update_schedule))
        .route("/destroy_schedule", delete(destroy_schedule));

    Router::new()
        .nest("/schedules", schedules)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[instrument(skip(state))]
async fn list(State(state): State<AppState>) -> Result<Json<Vec<ScheduleView>>, ApiError> {
    let started = Instant::now();
    let result = Ok(views(state.engine.list().await));
    state.finish("list", started, result)
}

#[instrument(skip(state))]
async fn list_by_date(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<DateQuery>,
) -> Result<Json<Vec<ScheduleView>>, ApiError> {
    let started = Instant::now();
    let result = match parse_date(&query.date) {
        Ok(date) => Ok(views(state.engine.list_by_date(date).await)),
        Err(e) => Err(EngineError::from(e)),
    };
    state.finish("list_by_date", started, result)
}

#[instrument(skip(state))]
async fn list_by_number_room(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<RoomQuery>,
) -> Result<Json<Vec<ScheduleView>>, ApiError> {
    let started = Instant::now();
    let result = Ok(views(state.engine.list_by_room(query.number_room).await));
    state.finish("list_by_number_room", started, result)
}

#[instrument(skip(state))]
async fn list_by_date_and_number_room(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<DateRoomQuery>,
) -> Result<Json<Vec<ScheduleView>>, ApiError> {
    let started = Instant::now();
    let result = match parse_date(&query.date) {
        Ok(date) => Ok(views(state.engine.list_by_date_and_room(date, query.number_room).await)),
        Err(e) => Err(EngineError::from(e)),
    };
    state.finish("list_by_date_and_number_room", started, result)
}

#[instrument(skip(state))]
async fn find_schedule(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<IdQuery>,
) -> Result<Json<ScheduleView>, ApiError> {
    let started = Instant::now();
    let result = state.engine.find_by_id(query.id).await.map(|s| ScheduleView::from(&s));
    state.finish("find_schedule", started, result)
}

#[instrument(skip(state))]
async fn create_schedule(
    State(state): State<AppState>,
    JsonBody(params): JsonBody<ScheduleParams>,
) -> Result<Json<ScheduleView>, ApiError> {
    let started = Instant::now();
    let result = state.engine.create(&params).await.map(|s| ScheduleView::from(&s));
    state.finish("create_schedule", started, result)
}

#[instrument(skip(state))]
async fn update_schedule(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<UpdateScheduleRequest>,
) -> Result<Json<ScheduleView>, ApiError> {
    let started = Instant::now();
    let (id, params) = request.into_parts();
    let result = state.engine.update(id, &params).await.map(|s| ScheduleView::from(&s));
    state.finish("update_schedule", started, result)
}

#[instrument(skip(state))]
async fn destroy_schedule(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<IdQuery>,
) -> Result<Json<Value>, ApiError> {
    let started = Instant::now();
    let result = state.engine.delete(query.id).await.map(|_| json!({ "status": "ok" }));
    state.finish("destroy_schedule", started, result)
}
