use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use tracing::info;
use uuid::Uuid;

use crate::assessment::conversation::{Progress, TurnOutcome};
use crate::assessment::evaluation::EvaluationRecord;
use crate::assessment::upload::UploadedFile;
use crate::web::error::{ApiError, ApiResult};
use crate::web::state::AppState;

const INDEX_HTML: &str = include_str!("index.html");
const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub filename: String,
    pub content_base64: String,
}

#[derive(Debug, Serialize)]
pub struct SessionCreated {
    pub session_id: Uuid,
    pub progress: Progress,
}

#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub reply: Option<String>,
    pub evaluations: Vec<EvaluationRecord>,
    pub tool_calls: Vec<String>,
    pub progress: Progress,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub filename: String,
    pub size_bytes: usize,
    /// False when the same file was already submitted and only replaced.
    pub evaluated: bool,
    pub turn: Option<TurnResponse>,
}

fn turn_response(outcome: TurnOutcome, progress: Progress) -> TurnResponse {
    TurnResponse {
        reply: outcome.reply,
        tool_calls: outcome
            .executions
            .iter()
            .map(|e| e.function_name.clone())
            .collect(),
        evaluations: outcome.evaluations,
        progress,
    }
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "api": "v0"
    }))
}

pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionCreated>) {
    let (session_id, conversation) = state.open().await;
    let progress = conversation.lock().await.progress();
    let active = state.active_sessions().await;
    info!(%session_id, active, "Created session");
    (
        StatusCode::CREATED,
        Json(SessionCreated {
            session_id,
            progress,
        }),
    )
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Progress>> {
    let conversation = state.get(id).await?;
    let progress = conversation.lock().await.progress();
    Ok(Json(progress))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<MessageRequest>,
) -> ApiResult<Json<TurnResponse>> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("Message content is required".to_string()));
    }

    let conversation = state.get(id).await?;
    let mut conversation = conversation.lock().await;
    let outcome = state.driver.respond(&mut conversation, content, None).await?;
    Ok(Json(turn_response(outcome, conversation.progress())))
}

/// Stores the workbook and runs the evaluation turn. Re-sending a file with
/// the current name only swaps the stored bytes.
pub async fn upload_workbook(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UploadRequest>,
) -> ApiResult<Json<UploadResponse>> {
    let file = UploadedFile::from_base64(&req.filename, &req.content_base64)?;
    let filename = file.filename.clone();
    let size_bytes = file.size_bytes;

    let conversation = state.get(id).await?;
    let mut conversation = conversation.lock().await;

    let already_submitted = conversation
        .uploaded_file()
        .is_some_and(|current| current.filename == filename);
    if already_submitted {
        info!(session = %id, %filename, "Replaced previously submitted workbook");
        conversation.attach_upload(file);
        return Ok(Json(UploadResponse {
            filename,
            size_bytes,
            evaluated: false,
            turn: None,
        }));
    }

    let text = format!(
        "I have uploaded my Excel file: {}. Please evaluate my work.",
        filename
    );
    let outcome = state
        .driver
        .respond(&mut conversation, &text, Some(file))
        .await?;

    Ok(Json(UploadResponse {
        filename,
        size_bytes,
        evaluated: true,
        turn: Some(turn_response(outcome, conversation.progress())),
    }))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.close(id).await?;
    info!(session = %id, "Reset session");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn sample_file(State(state): State<AppState>) -> ApiResult<Response> {
    let path = &state.config.sample_file;
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => ApiError::NotFound(format!(
            "Sample file not found: {}",
            path.display()
        )),
        _ => ApiError::Internal(anyhow::Error::new(e).context("reading sample file")),
    })?;

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "sample.xlsx".to_string());

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::conversation::ConversationDriver;
    use crate::shared::config::Config;
    use crate::shared::inference::testing::ScriptedModel;
    use crate::shared::inference::{ModelError, ToolCallRequest};
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use std::sync::Arc;

    fn app_state(model: Arc<ScriptedModel>) -> AppState {
        let config = Arc::new(Config::for_tests("http://127.0.0.1:9"));
        let driver = ConversationDriver::from_config(&config, model);
        AppState::new(config, driver)
    }

    async fn new_session(state: &AppState) -> Uuid {
        let (status, Json(created)) = create_session(State(state.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        created.session_id
    }

    #[tokio::test]
    async fn message_turn_returns_reply_and_progress() {
        let model = Arc::new(ScriptedModel::new());
        model.push_tool_calls(vec![ToolCallRequest::new(
            "call_1",
            "generate_excel_task",
            r#"{"session_id":"s","question_number":2}"#,
        )]);
        model.push_text("Build a pivot table of revenue by region.");
        let state = app_state(model);
        let id = new_session(&state).await;

        let Json(turn) = send_message(
            State(state.clone()),
            Path(id),
            Json(MessageRequest {
                content: "ready".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(turn.reply.as_deref(), Some("Build a pivot table of revenue by region."));
        assert_eq!(turn.tool_calls, vec!["generate_excel_task".to_string()]);
        assert_eq!(turn.progress.current_question, 2);
        assert!(turn.progress.assessment_started);
    }

    #[tokio::test]
    async fn blank_messages_and_unknown_sessions_are_rejected() {
        let state = app_state(Arc::new(ScriptedModel::new()));
        let id = new_session(&state).await;

        let err = send_message(
            State(state.clone()),
            Path(id),
            Json(MessageRequest {
                content: "   ".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err = get_session(State(state), Path(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn model_failure_surfaces_as_bad_gateway() {
        let model = Arc::new(ScriptedModel::new());
        model.push_error(ModelError::EmptyResponse);
        let state = app_state(model);
        let id = new_session(&state).await;

        let err = send_message(
            State(state),
            Path(id),
            Json(MessageRequest {
                content: "hello".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn upload_runs_evaluation_once_per_filename() {
        let model = Arc::new(ScriptedModel::new());
        model.push_tool_calls(vec![ToolCallRequest::new(
            "call_eval",
            "evaluate_workbook",
            r#"{"session_id":"s","task_id":"t"}"#,
        )]);
        model.push_text(r#"{"score": 64}"#);
        model.push_text("Your workbook scored 64.");
        let state = app_state(model.clone());
        let id = new_session(&state).await;
        let request = || UploadRequest {
            filename: "final.xlsx".to_string(),
            content_base64: BASE64.encode(b"PK\x03\x04data"),
        };

        let Json(first) = upload_workbook(State(state.clone()), Path(id), Json(request()))
            .await
            .unwrap();
        assert!(first.evaluated);
        let turn = first.turn.unwrap();
        assert_eq!(turn.evaluations[0].score, Some(64));
        assert_eq!(turn.progress.uploaded_filename.as_deref(), Some("final.xlsx"));

        let Json(second) = upload_workbook(State(state), Path(id), Json(request()))
            .await
            .unwrap();
        assert!(!second.evaluated);
        assert!(second.turn.is_none());
        assert_eq!(model.requests().len(), 3);

        let user = model.requests()[0].messages[1].content.clone().unwrap();
        assert_eq!(
            user,
            "I have uploaded my Excel file: final.xlsx. Please evaluate my work. [FILE UPLOADED: final.xlsx]"
        );
    }

    #[tokio::test]
    async fn upload_is_evaluated_again_after_a_failed_turn() {
        let model = Arc::new(ScriptedModel::new());
        model.push_error(ModelError::EmptyResponse);
        model.push_text("Thanks, evaluating now.");
        let state = app_state(model.clone());
        let id = new_session(&state).await;
        let request = || UploadRequest {
            filename: "final.xlsx".to_string(),
            content_base64: BASE64.encode(b"PK\x03\x04data"),
        };

        let err = upload_workbook(State(state.clone()), Path(id), Json(request()))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);

        let Json(retry) = upload_workbook(State(state), Path(id), Json(request()))
            .await
            .unwrap();
        assert!(retry.evaluated);
        assert_eq!(
            retry.turn.unwrap().reply.as_deref(),
            Some("Thanks, evaluating now.")
        );
        assert_eq!(model.requests().len(), 2);
    }

    #[tokio::test]
    async fn upload_rejects_non_excel_files() {
        let state = app_state(Arc::new(ScriptedModel::new()));
        let id = new_session(&state).await;

        let err = upload_workbook(
            State(state),
            Path(id),
            Json(UploadRequest {
                filename: "data.csv".to_string(),
                content_base64: BASE64.encode(b"a,b"),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_drops_the_session() {
        let state = app_state(Arc::new(ScriptedModel::new()));
        let id = new_session(&state).await;

        assert_eq!(
            delete_session(State(state.clone()), Path(id)).await.unwrap(),
            StatusCode::NO_CONTENT
        );
        assert!(get_session(State(state.clone()), Path(id)).await.is_err());
        assert!(delete_session(State(state), Path(id)).await.is_err());
    }

    #[tokio::test]
    async fn missing_sample_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::for_tests("http://127.0.0.1:9");
        config.sample_file = dir.path().join("missing.xlsx");
        let model = Arc::new(ScriptedModel::new());
        let driver = ConversationDriver::from_config(&config, model);
        let state = AppState::new(Arc::new(config), driver);

        let err = sample_file(State(state)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn sample_file_is_served_as_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dummy_excel_assessment_data.xlsx");
        std::fs::write(&path, b"PK\x03\x04").unwrap();
        let mut config = Config::for_tests("http://127.0.0.1:9");
        config.sample_file = path;
        let driver = ConversationDriver::from_config(&config, Arc::new(ScriptedModel::new()));
        let state = AppState::new(Arc::new(config), driver);

        let response = sample_file(State(state)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.contains("dummy_excel_assessment_data.xlsx"));
    }
}
