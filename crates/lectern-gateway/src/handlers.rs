use std::convert::Infallible;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use futures::{Stream, StreamExt};
use lectern_core::{
    AnswerEvent, AskRequest, InvalidInputError, NotFoundError, SessionId, answer_question,
};
use lectern_epub::{Chapter, extract_chapters};

use crate::error::ApiError;
use crate::server::AppState;
use crate::upload::{is_epub_name, secure_filename, stage_upload};

const UPLOAD_FIELD: &str = "file";

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
}

#[derive(Debug, serde::Serialize)]
pub(crate) struct ChapterEntry {
    index: usize,
    title: String,
}

/// The loaded document as shown in a table of contents.
#[derive(Debug, serde::Serialize)]
pub(crate) struct DocumentSummary {
    filename: String,
    chapters: Vec<ChapterEntry>,
}

impl DocumentSummary {
    fn new(filename: String, chapters: &[Chapter]) -> Self {
        Self {
            filename,
            chapters: chapters
                .iter()
                .enumerate()
                .map(|(index, ch)| ChapterEntry {
                    index,
                    title: ch.title.clone(),
                })
                .collect(),
        }
    }
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

pub(crate) async fn upload_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    mut multipart: Multipart,
) -> Result<Json<DocumentSummary>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(UPLOAD_FIELD) {
            let name = field.file_name().unwrap_or_default().to_owned();
            let bytes = field.bytes().await?;
            upload = Some((name, bytes));
            break;
        }
    }

    let (original_name, bytes) = upload.ok_or(InvalidInputError::MissingFile)?;
    tracing::info!(%session, filename = %original_name, bytes = bytes.len(), "file received");

    if original_name.is_empty() {
        return Err(InvalidInputError::EmptyFilename.into());
    }
    if !is_epub_name(&original_name) {
        return Err(InvalidInputError::NotAnEpub(original_name).into());
    }
    let filename = secure_filename(&original_name)
        .ok_or_else(|| InvalidInputError::UnsafeFilename(original_name.clone()))?;

    let staged = stage_upload(&state.upload_dir, session, &filename, &bytes)
        .await
        .map_err(ApiError::Storage)?;

    let extracted = tokio::task::spawn_blocking({
        let path = staged.path().to_path_buf();
        move || extract_chapters(&path)
    })
    .await;

    let chapters = match extracted {
        Ok(Ok(chapters)) => chapters,
        Ok(Err(e)) => {
            staged.discard().await;
            return Err(e.into());
        }
        Err(e) => {
            staged.discard().await;
            return Err(ApiError::Internal(format!("extraction task failed: {e}")));
        }
    };
    staged.commit().await.map_err(ApiError::Storage)?;

    let summary = DocumentSummary::new(filename.clone(), &chapters);
    tracing::info!(
        %session,
        filename = %filename,
        chapters = chapters.len(),
        "stored chapters in session"
    );
    state.sessions.put(session, chapters, filename);

    Ok(Json(summary))
}

pub(crate) async fn chapters_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
) -> Result<Json<DocumentSummary>, ApiError> {
    let chapters = state
        .sessions
        .get_chapters(session)
        .ok_or(NotFoundError::NoChapters)?;
    let filename = state.sessions.document_id(session).unwrap_or_default();
    Ok(Json(DocumentSummary::new(filename, &chapters)))
}

pub(crate) async fn chapter_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Path(index): Path<usize>,
) -> Result<Response, ApiError> {
    let Some(chapters) = state.sessions.get_chapters(session) else {
        tracing::warn!(%session, index, "no chapters in session");
        return Err(NotFoundError::NoChapters.into());
    };
    tracing::info!(%session, index, total = chapters.len(), "fetching chapter");

    let chapter = chapters.get(index).ok_or(NotFoundError::ChapterOutOfRange {
        index,
        len: chapters.len(),
    })?;
    tracing::debug!(index, content_len = chapter.content.len(), "returning chapter");

    Ok((
        [(CONTENT_TYPE, "text/html; charset=utf-8")],
        chapter.content.clone(),
    )
        .into_response())
}

pub(crate) async fn ask_handler(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let Json(request) = payload.map_err(|e| InvalidInputError::Malformed(e.body_text()))?;

    let answer = answer_question(state.provider.as_ref(), &state.conversation, &request).await?;

    let events = answer.map(|event| Ok(to_sse_event(&event)));
    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

fn to_sse_event(event: &AnswerEvent) -> Event {
    let sse = Event::default().data(event.data());
    match event.event_name() {
        Some(name) => sse.event(name),
        None => sse,
    }
}
