use axum::{
    Json,
    extract::{Query, State},
};
use foodshare_services::stats::PlatformStatistics;
use serde::Deserialize;

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    /// Skip the cache and recompute.
    #[serde(default)]
    pub fresh: bool,
}

pub async fn get(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<PlatformStatistics>, ApiError> {
    let stats = state.donations.get_statistics(!query.fresh).await?;
    Ok(Json(stats))
}
