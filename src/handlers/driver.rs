use axum::extract::State;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{Authorized, Crew};
use crate::error::{ApiQuery, ApiResult};
use crate::presence;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ManifestQuery {
    #[serde(default)]
    driver_id: Option<String>,
    #[serde(default)]
    date: Option<NaiveDate>,
}

pub(super) async fn manifest(
    State(state): State<AppState>,
    caller: Authorized<Crew>,
    ApiQuery(query): ApiQuery<ManifestQuery>,
) -> ApiResult<Json<Value>> {
    let driver_id = presence::manifest_driver(&caller.user, query.driver_id.as_deref())?;
    let date = query.date.unwrap_or_else(presence::today);

    let manifest = presence::manifest(&state.storage, &driver_id, date).await?;
    tracing::debug!(%driver_id, %date, passengers = manifest.len(), "manifest built");
    Ok(Json(json!({ "date": date, "manifest": manifest })))
}
