use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tickercache_market_data::ClearReport;

use crate::{error::ApiResult, main_lib::AppState};

#[derive(Deserialize)]
struct ClearQuery {
    #[serde(default)]
    symbol: String,
    provider: Option<String>,
}

#[derive(Serialize)]
struct ClearResponse {
    success: bool,
    #[serde(flatten)]
    report: ClearReport,
    message: String,
}

/// Drop every cached entry for a symbol. GET is accepted alongside DELETE so
/// the route can be hit from a browser address bar.
async fn clear_symbol(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ClearQuery>,
) -> ApiResult<Json<ClearResponse>> {
    let report = state
        .market_data
        .clear_symbol(&q.symbol, q.provider.as_deref())
        .await?;
    let message = format!(
        "Cleared {} cache entries for {}",
        report.cleared, report.symbol
    );
    Ok(Json(ClearResponse {
        success: true,
        report,
        message,
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/cache", get(clear_symbol).delete(clear_symbol))
}
