use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cadence_domain::{Orientation, PriceBand};
use cadence_service::{
	ContextFitRequest, ContextFitResponse, Error as ServiceError, Indicator, LeaderboardPage,
	LeaderboardParams, RecomputeReport, TrendResponse,
};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/orgs/{org_id}/recompute", post(recompute))
		.route("/v1/orgs/{org_id}/agents/{agent_id}/indicator", get(indicator))
		.route("/v1/orgs/{org_id}/agents/{agent_id}/trend", get(trend))
		.route("/v1/orgs/{org_id}/agents/{agent_id}/context_fit", post(context_fit))
		.route("/v1/orgs/{org_id}/leaderboard", get(leaderboard))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn recompute(
	State(state): State<AppState>,
	Path(org_id): Path<Uuid>,
) -> Result<Json<RecomputeReport>, ApiError> {
	let report = state.service.recompute_organization(org_id).await?;

	Ok(Json(report))
}

#[derive(Debug, Deserialize)]
struct IndicatorQuery {
	#[serde(default)]
	include_features: bool,
}

async fn indicator(
	State(state): State<AppState>,
	Path((org_id, agent_id)): Path<(Uuid, Uuid)>,
	Query(query): Query<IndicatorQuery>,
) -> Result<Json<Option<Indicator>>, ApiError> {
	let indicator =
		state.service.latest_indicator(org_id, agent_id, query.include_features).await?;

	Ok(Json(indicator))
}

#[derive(Debug, Deserialize)]
struct TrendQuery {
	#[serde(default = "default_trend_days")]
	days: i64,
	#[serde(default)]
	include_features: bool,
}

fn default_trend_days() -> i64 {
	90
}

async fn trend(
	State(state): State<AppState>,
	Path((org_id, agent_id)): Path<(Uuid, Uuid)>,
	Query(query): Query<TrendQuery>,
) -> Result<Json<TrendResponse>, ApiError> {
	let trend =
		state.service.trend(org_id, agent_id, query.days, query.include_features).await?;

	Ok(Json(trend))
}

#[derive(Debug, Deserialize)]
struct LeaderboardQuery {
	#[serde(default = "default_page")]
	page: u32,
	#[serde(default = "default_limit")]
	limit: u32,
	office_id: Option<Uuid>,
	team_id: Option<Uuid>,
	orientation: Option<String>,
	price_band: Option<String>,
}

fn default_page() -> u32 {
	1
}

fn default_limit() -> u32 {
	cadence_service::leaderboard::DEFAULT_PAGE_LIMIT
}

async fn leaderboard(
	State(state): State<AppState>,
	Path(org_id): Path<Uuid>,
	Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardPage>, ApiError> {
	let orientation = query
		.orientation
		.as_deref()
		.map(|value| {
			Orientation::parse(value).ok_or_else(|| {
				json_error(
					StatusCode::BAD_REQUEST,
					"INVALID_REQUEST",
					format!("Unknown orientation: {value}."),
				)
			})
		})
		.transpose()?;
	let price_band = query
		.price_band
		.as_deref()
		.map(|value| {
			PriceBand::parse(value).ok_or_else(|| {
				json_error(
					StatusCode::BAD_REQUEST,
					"INVALID_REQUEST",
					format!("Unknown price band: {value}."),
				)
			})
		})
		.transpose()?;
	let params = LeaderboardParams {
		page: query.page,
		limit: query.limit,
		office_id: query.office_id,
		team_id: query.team_id,
		orientation,
		price_band,
	};
	let page = state.service.leaderboard(org_id, params).await?;

	Ok(Json(page))
}

async fn context_fit(
	State(state): State<AppState>,
	Path((org_id, agent_id)): Path<(Uuid, Uuid)>,
	Json(payload): Json<ContextFitRequest>,
) -> Result<Json<ContextFitResponse>, ApiError> {
	let response = state.service.context_fit(org_id, agent_id, payload).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
	ApiError { status, error_code: code.to_string(), message: message.into() }
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match &err {
			ServiceError::AccessDenied { .. } => {
				json_error(StatusCode::FORBIDDEN, "ACCESS_DENIED", err.to_string())
			},
			ServiceError::NotFound { .. } => {
				json_error(StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
			},
			ServiceError::InvalidRequest { .. } => {
				json_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", err.to_string())
			},
			ServiceError::Exhausted { .. } => {
				json_error(StatusCode::SERVICE_UNAVAILABLE, "RESOURCE_EXHAUSTED", err.to_string())
			},
			ServiceError::Storage { .. } => {
				json_error(StatusCode::INTERNAL_SERVER_ERROR, "STORAGE", err.to_string())
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}
