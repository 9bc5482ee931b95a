//! Resource API endpoints.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use filesystem::{Action, ActionOutcome, FilesystemError, ReadPayload, RootStatus};

use crate::error::CoreError;
use crate::resource::Resource;
use crate::server::ServerState;

type ApiError = (StatusCode, String);

/// GET /resources
pub(crate) async fn list_resources(
    State(state): State<Arc<ServerState>>,
) -> Json<Vec<Resource>> {
    Json(state.registry.all().await)
}

/// POST /resources
pub(crate) async fn add_resource(
    State(state): State<Arc<ServerState>>,
    Json(resource): Json<Resource>,
) -> Result<StatusCode, ApiError> {
    state
        .registry
        .add(resource)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Request payload for resource removal.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RemoveRequest {
    pub uri: String,
}

/// POST /resources/remove
pub(crate) async fn remove_resource(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<RemoveRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .registry
        .remove(&payload.uri)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Response payload for action invocation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "kind")]
pub(crate) enum InvokeResponse {
    Entries {
        entries: Vec<filesystem::EntrySummary>,
    },
    Text {
        content: String,
    },
    Binary {
        /// Base64-encoded payload bytes.
        data: String,
        filename: String,
        mime_type: String,
        category: String,
    },
    Path {
        path: String,
    },
}

impl From<ActionOutcome> for InvokeResponse {
    fn from(outcome: ActionOutcome) -> Self {
        match outcome {
            ActionOutcome::Entries(entries) => Self::Entries { entries },
            ActionOutcome::Content(ReadPayload::Text(content)) => Self::Text { content },
            ActionOutcome::Content(ReadPayload::Image {
                data,
                filename,
                mime_type,
            }) => Self::Binary {
                data: BASE64.encode(data),
                filename,
                mime_type,
                category: "image".to_string(),
            },
            ActionOutcome::Content(ReadPayload::Document {
                data,
                filename,
                mime_type,
            }) => Self::Binary {
                data: BASE64.encode(data),
                filename,
                mime_type,
                category: "document".to_string(),
            },
            ActionOutcome::Content(ReadPayload::Binary {
                data,
                filename,
                mime_type,
            }) => Self::Binary {
                data: BASE64.encode(data),
                filename,
                mime_type,
                category: "binary".to_string(),
            },
            ActionOutcome::Path(path) => Self::Path {
                path: path.to_string_lossy().into_owned(),
            },
        }
    }
}

/// POST /resources/invoke
pub(crate) async fn invoke_action(
    State(state): State<Arc<ServerState>>,
    Json(action): Json<Action>,
) -> Result<Json<InvokeResponse>, ApiError> {
    let outcome = state
        .registry
        .invoke(&action)
        .await
        .map_err(error_response)?;
    Ok(Json(outcome.into()))
}

/// GET /resources/status
pub(crate) async fn index_status(
    State(state): State<Arc<ServerState>>,
) -> Json<Vec<RootStatus>> {
    Json(state.registry.index_status().await)
}

/// GET /resources/events
///
/// Streams one event per coalesced registry change; clients re-read
/// `GET /resources` on each.
pub(crate) async fn resource_events(
    State(state): State<Arc<ServerState>>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let stream = BroadcastStream::new(state.registry.subscribe())
        .map(|_| Ok::<_, Infallible>(SseEvent::default().data("changed")));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn error_response(error: CoreError) -> ApiError {
    let status = match &error {
        CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Filesystem(fs_error) => match fs_error {
            FilesystemError::InvalidUri(_)
            | FilesystemError::InvalidInput(_)
            | FilesystemError::Unsupported(_) => StatusCode::BAD_REQUEST,
            FilesystemError::NestedRegistration(_) => StatusCode::CONFLICT,
            FilesystemError::NoIndexForPath(_) | FilesystemError::FileNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn read_payloads_map_to_tagged_responses() {
        let text: InvokeResponse = ActionOutcome::Content(ReadPayload::Text("hi".into())).into();
        let value = serde_json::to_value(&text).expect("serialize");
        assert_eq!(value["kind"], "text");
        assert_eq!(value["content"], "hi");

        let image: InvokeResponse = ActionOutcome::Content(ReadPayload::Image {
            data: vec![1, 2, 3],
            filename: "a.png".into(),
            mime_type: "image/png".into(),
        })
        .into();
        let value = serde_json::to_value(&image).expect("serialize");
        assert_eq!(value["kind"], "binary");
        assert_eq!(value["category"], "image");
        assert_eq!(value["data"], BASE64.encode([1, 2, 3]));

        let path: InvokeResponse = ActionOutcome::Path(PathBuf::from("/data")).into();
        let value = serde_json::to_value(&path).expect("serialize");
        assert_eq!(value["kind"], "path");
    }

    #[test]
    fn nested_registration_maps_to_conflict() {
        let error = CoreError::Filesystem(FilesystemError::NestedRegistration(PathBuf::from(
            "/data/inner",
        )));
        let (status, _) = error_response(error);
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
