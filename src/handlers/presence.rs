use axum::extract::State;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{AuthUser, Authorized, PresenceWriters};
use crate::error::{ApiJson, ApiQuery, ApiResult};
use crate::presence::{self, MarkPresence};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SubmitPresence {
    #[serde(default)]
    student_id: Option<String>,
    /// `YYYY-MM-DD`; the server-local today when absent.
    #[serde(default)]
    date: Option<NaiveDate>,
    status_ida: bool,
    status_volta: bool,
    #[serde(default)]
    observation: Option<String>,
}

pub(super) async fn submit(
    State(state): State<AppState>,
    caller: Authorized<PresenceWriters>,
    ApiJson(body): ApiJson<SubmitPresence>,
) -> ApiResult<Json<Value>> {
    let presence = presence::mark(
        &state.storage,
        &caller.user,
        MarkPresence {
            student_id: body.student_id,
            date: body.date,
            status_ida: body.status_ida,
            status_volta: body.status_volta,
            observation: body.observation,
        },
    )
    .await?;
    Ok(Json(json!({ "presence": presence })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TodayQuery {
    #[serde(default)]
    student_id: Option<String>,
}

/// `{"presence": null}` means nothing was submitted today, which is not the
/// same as a submission with both legs declined.
pub(super) async fn today(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ApiQuery(query): ApiQuery<TodayQuery>,
) -> ApiResult<Json<Value>> {
    let student_id = presence::read_target(&caller, query.student_id.as_deref())?;
    let presence = presence::find_for_date(&state.storage, &student_id, presence::today()).await?;
    Ok(Json(json!({ "presence": presence })))
}
