//! Dashboard statistics handlers.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::SharedState;
use crate::error::Result;
use crate::models::radius::RadPostAuth;
use crate::services::dashboard_service::{
    AuthTrendPoint, DashboardOverview, DashboardService, NasBreakdown, TopUser, TopUsersBy,
    TrafficTrendPoint,
};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/overview", get(overview))
        .route("/auth-trend", get(auth_trend))
        .route("/traffic-trend", get(traffic_trend))
        .route("/top-users", get(top_users))
        .route("/nas-breakdown", get(nas_breakdown))
        .route("/recent-rejects", get(recent_rejects))
}

/// GET /api/v1/dashboard/overview
pub async fn overview(State(state): State<SharedState>) -> Result<Json<DashboardOverview>> {
    let overview = DashboardService::new(state.db.clone()).overview().await?;
    Ok(Json(overview))
}

#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    pub days: Option<i64>,
}

/// GET /api/v1/dashboard/auth-trend
pub async fn auth_trend(
    State(state): State<SharedState>,
    Query(query): Query<TrendQuery>,
) -> Result<Json<Vec<AuthTrendPoint>>> {
    let trend = DashboardService::new(state.db.clone())
        .auth_trend(query.days.unwrap_or(7))
        .await?;
    Ok(Json(trend))
}

/// GET /api/v1/dashboard/traffic-trend
pub async fn traffic_trend(
    State(state): State<SharedState>,
    Query(query): Query<TrendQuery>,
) -> Result<Json<Vec<TrafficTrendPoint>>> {
    let trend = DashboardService::new(state.db.clone())
        .traffic_trend(query.days.unwrap_or(7))
        .await?;
    Ok(Json(trend))
}

#[derive(Debug, Deserialize)]
pub struct TopUsersQuery {
    #[serde(default)]
    pub by: Option<TopUsersBy>,
    pub limit: Option<i64>,
    pub days: Option<i64>,
}

/// GET /api/v1/dashboard/top-users
pub async fn top_users(
    State(state): State<SharedState>,
    Query(query): Query<TopUsersQuery>,
) -> Result<Json<Vec<TopUser>>> {
    let users = DashboardService::new(state.db.clone())
        .top_users(
            query.by.unwrap_or_default(),
            query.limit.unwrap_or(10),
            query.days.unwrap_or(30),
        )
        .await?;
    Ok(Json(users))
}

/// GET /api/v1/dashboard/nas-breakdown
pub async fn nas_breakdown(
    State(state): State<SharedState>,
    Query(query): Query<TrendQuery>,
) -> Result<Json<Vec<NasBreakdown>>> {
    let breakdown = DashboardService::new(state.db.clone())
        .nas_breakdown(query.days.unwrap_or(30))
        .await?;
    Ok(Json(breakdown))
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

/// GET /api/v1/dashboard/recent-rejects
pub async fn recent_rejects(
    State(state): State<SharedState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<RadPostAuth>>> {
    let rejects = DashboardService::new(state.db.clone())
        .recent_rejects(query.limit.unwrap_or(20))
        .await?;
    Ok(Json(rejects))
}
