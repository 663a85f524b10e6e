use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;

use ensrainbow_core::CountResult;

use super::error::{heal_result, AppError};
use super::SharedState;

#[derive(Serialize)]
pub(super) struct HealResponse {
    status: &'static str,
    label: String,
}

#[derive(Serialize)]
pub(super) struct CountResponse {
    status: &'static str,
    count: u64,
    /// RFC 3339.
    timestamp: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct VersionInfoBody {
    version: &'static str,
    schema_version: u32,
    namespace: Option<String>,
    highest_label_set_version: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct VersionResponse {
    status: &'static str,
    version_info: VersionInfoBody,
}

pub(super) async fn heal(
    State(state): State<SharedState>,
    Path(labelhash): Path<String>,
) -> Result<Json<HealResponse>, AppError> {
    let lookup = state.lookup.clone();
    let result = tokio::task::spawn_blocking(move || lookup.heal(&labelhash)).await?;

    Ok(Json(HealResponse {
        status: "success",
        label: heal_result(result)?,
    }))
}

pub(super) async fn count(
    State(state): State<SharedState>,
) -> Result<Json<CountResponse>, AppError> {
    let lookup = state.lookup.clone();
    match tokio::task::spawn_blocking(move || lookup.count()).await? {
        CountResult::Success { count, timestamp } => {
            let timestamp = timestamp.format(&Rfc3339).map_err(|err| {
                tracing::error!(error = %err, "failed to format count timestamp");
                AppError::Internal("Internal server error".to_string())
            })?;
            Ok(Json(CountResponse {
                status: "success",
                count,
                timestamp,
            }))
        }
        CountResult::ServerError(msg) => Err(AppError::Internal(msg)),
    }
}

pub(super) async fn version(
    State(state): State<SharedState>,
) -> Result<Json<VersionResponse>, AppError> {
    let lookup = state.lookup.clone();
    let info = tokio::task::spawn_blocking(move || lookup.version_info())
        .await?
        .map_err(|err| {
            tracing::error!(error = %err, "version info lookup failed");
            AppError::Internal("Internal server error".to_string())
        })?;

    let (namespace, highest_label_set_version) = match info.label_set {
        Some(set) => (Some(set.namespace), Some(set.label_set_version)),
        None => (None, None),
    };
    Ok(Json(VersionResponse {
        status: "success",
        version_info: VersionInfoBody {
            version: state.version,
            schema_version: info.schema_version,
            namespace,
            highest_label_set_version,
        },
    }))
}
