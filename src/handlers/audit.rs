use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{AdminOnly, Authorized};
use crate::error::{ApiQuery, ApiResult};
use crate::state::AppState;

const DEFAULT_LIMIT: u64 = 100;
const MAX_LIMIT: u64 = 1000;

#[derive(Debug, Default, Deserialize)]
pub(super) struct AuditQuery {
    limit: Option<u64>,
}

impl AuditQuery {
    fn limit(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

pub(super) async fn list(
    State(state): State<AppState>,
    _admin: Authorized<AdminOnly>,
    ApiQuery(query): ApiQuery<AuditQuery>,
) -> ApiResult<Json<Value>> {
    let logs = state.storage.list_audit_logs(query.limit()).await?;
    Ok(Json(json!({ "logs": logs })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_caps() {
        assert_eq!(AuditQuery::default().limit(), DEFAULT_LIMIT);
        assert_eq!(AuditQuery { limit: Some(5) }.limit(), 5);
        assert_eq!(AuditQuery { limit: Some(0) }.limit(), 1);
        assert_eq!(AuditQuery { limit: Some(50_000) }.limit(), MAX_LIMIT);
    }
}
