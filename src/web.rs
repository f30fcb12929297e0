use crate::{
    app::{errors::AppError, App, DefaultTagger},
    bookmarks::BookmarkRecord,
    files::PickedFile,
    library::ImportReport,
    selection::Snapshot,
    session::{Outcome, Session},
};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{signal, sync::RwLock, time::Instant};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct TrackedSession {
    session: Arc<Session>,
    touched: Instant,
}

#[derive(Clone)]
pub struct SharedState {
    app: App,
    sessions: Arc<RwLock<HashMap<String, TrackedSession>>>,
    tagger: Option<Arc<DefaultTagger>>,
}

impl SharedState {
    pub fn new(app: App, tagger: Option<Arc<DefaultTagger>>) -> Self {
        Self {
            app,
            sessions: Default::default(),
            tagger,
        }
    }

    /// Looks up a live session and marks it as used.
    async fn session(&self, id: &str) -> Result<Arc<Session>, HttpError> {
        let mut sessions = self.sessions.write().await;
        let tracked = sessions.get_mut(id).ok_or(HttpError(AppError::NotFound))?;
        tracked.touched = Instant::now();
        Ok(tracked.session.clone())
    }

    async fn insert(&self, session: Arc<Session>) -> String {
        let id = session.id().to_string();
        let tracked = TrackedSession {
            session,
            touched: Instant::now(),
        };
        self.sessions.write().await.insert(id.clone(), tracked);
        id
    }

    /// Cancels and drops sessions untouched for `max_idle`, for front ends
    /// that never close theirs. Returns how many were dropped.
    pub async fn expire_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|id, tracked| {
            let live = tracked.touched.elapsed() < max_idle;
            if !live {
                tracked.session.cancel();
                log::debug!("session {id} expired");
            }
            live
        });

        before - sessions.len()
    }

    async fn close(&self, id: &str) {
        if self.sessions.write().await.remove(id).is_some() {
            log::debug!("session {id} closed");
        }
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/sessions", post(open_session))
        .route("/api/sessions/:id", axum::routing::delete(close_session))
        .route("/api/sessions/:id/input", post(input))
        .route("/api/sessions/:id/move", post(move_selection))
        .route("/api/sessions/:id/hover", post(hover))
        .route("/api/sessions/:id/open", post(open_selected))
        .route("/api/sessions/:id/cancel", post(cancel))
        .route("/api/sessions/:id/selection", get(selection))
        .route("/api/sessions/:id/tags/add", post(add_tag))
        .route("/api/sessions/:id/tags/delete", post(delete_tag))
        .route("/api/sessions/:id/tags/rename", post(rename_tag))
        .route("/api/import", post(import))
        .route("/api/bookmarks", post(create_bookmark))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(state)
}

async fn start_app(state: SharedState, listen: String) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&listen).await?;
    log::info!("listening on {listen}");

    let max_idle = state.app.config().daemon.session_idle();
    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(max_idle.min(SWEEP_INTERVAL));
        loop {
            ticker.tick().await;
            let expired = sweeper.expire_idle(max_idle).await;
            if expired > 0 {
                log::info!("expired {expired} idle sessions");
            }
        }
    });

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                log::error!("failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::warn!("received Ctrl+C, shutting down"),
        _ = terminate => log::warn!("received SIGTERM, shutting down"),
    }
}

pub fn start_daemon(app: App, listen: String) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async {
            let tagger = match app.tagger() {
                Ok(tagger) => Some(Arc::new(tagger)),
                Err(err) => {
                    log::error!("auto-tagging disabled: {err:#}");
                    None
                }
            };

            start_app(SharedState::new(app, tagger), listen).await
        })
}

#[derive(Debug)]
pub struct HttpError(AppError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.0 {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::InvalidTag(_) | AppError::Format(_) => StatusCode::BAD_REQUEST,
            AppError::UnsupportedContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::IO(_) | AppError::Other(_) => {
                log::error!("{self:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[derive(Debug, Serialize)]
pub struct SessionOpened {
    pub id: String,
}

async fn open_session(State(state): State<SharedState>) -> (StatusCode, Json<SessionOpened>) {
    // uploads go through /api/import, so no picker
    let id = state.insert(Arc::new(state.app.new_session(None))).await;
    log::debug!("session {id} opened");

    (StatusCode::CREATED, Json(SessionOpened { id }))
}

async fn close_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, HttpError> {
    let session = state.session(&id).await?;
    session.cancel();
    state.close(&id).await;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct InputRequest {
    #[serde(default)]
    pub text: String,
}

async fn input(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<InputRequest>,
) -> Result<Json<Outcome>, HttpError> {
    let session = state.session(&id).await?;
    Ok(Json(session.input(&payload.text).await?))
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub delta: isize,
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub index: Option<usize>,
}

async fn move_selection(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<MoveRequest>,
) -> Result<Json<IndexResponse>, HttpError> {
    let session = state.session(&id).await?;
    Ok(Json(IndexResponse {
        index: session.move_selection(payload.delta),
    }))
}

#[derive(Debug, Deserialize)]
pub struct HoverRequest {
    pub index: usize,
}

async fn hover(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<HoverRequest>,
) -> Result<Json<IndexResponse>, HttpError> {
    let session = state.session(&id).await?;
    Ok(Json(IndexResponse {
        index: session.hover(payload.index),
    }))
}

#[derive(Debug, Serialize)]
pub struct OpenResponse {
    pub url: Option<String>,
}

async fn open_selected(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<OpenResponse>, HttpError> {
    let session = state.session(&id).await?;
    let url = session.open_selected();
    if session.is_closed() {
        state.close(&id).await;
    }
    Ok(Json(OpenResponse { url }))
}

async fn cancel(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, HttpError> {
    let session = state.session(&id).await?;
    session.cancel();
    state.close(&id).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn selection(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Snapshot>, HttpError> {
    let session = state.session(&id).await?;
    Ok(Json(session.snapshot()))
}

#[derive(Debug, Deserialize)]
pub struct TagRequest {
    pub url: String,
    pub tag: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameTagRequest {
    pub url: String,
    pub old: String,
    pub new: String,
}

#[derive(Debug, Serialize)]
pub struct TagsResponse {
    pub tags: Vec<String>,
}

async fn add_tag(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<TagRequest>,
) -> Result<Json<TagsResponse>, HttpError> {
    let session = state.session(&id).await?;
    let tags = session.add_tag(&payload.url, &payload.tag)?;
    Ok(Json(TagsResponse { tags }))
}

async fn delete_tag(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<TagRequest>,
) -> Result<Json<TagsResponse>, HttpError> {
    let session = state.session(&id).await?;
    let tags = session.delete_tag(&payload.url, &payload.tag)?;
    Ok(Json(TagsResponse { tags }))
}

async fn rename_tag(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<RenameTagRequest>,
) -> Result<Json<TagsResponse>, HttpError> {
    let session = state.session(&id).await?;
    let tags = session.rename_tag(&payload.url, &payload.old, &payload.new)?;
    Ok(Json(TagsResponse { tags }))
}

/// Raw file body; the format comes from `Content-Type`.
async fn import(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ImportReport>, HttpError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let file = PickedFile {
        name: "upload".to_string(),
        content_type,
        bytes: body.to_vec(),
    };

    let library = state.app.library().clone();
    tokio::task::block_in_place(move || library.import(&file))
        .map(Json)
        .map_err(Into::into)
}

#[derive(Debug, Deserialize)]
pub struct BookmarkCreateRequest {
    #[serde(default)]
    pub title: String,
    pub url: String,

    /// Skip tag generation
    #[serde(default)]
    pub no_tag: bool,
}

/// Adds the bookmark right away; tags are generated in the background.
async fn create_bookmark(
    State(state): State<SharedState>,
    Json(payload): Json<BookmarkCreateRequest>,
) -> Result<(StatusCode, Json<BookmarkRecord>), HttpError> {
    log::debug!("payload: {payload:?}");

    let app = state.app.clone();
    let (title, url) = (payload.title.clone(), payload.url.clone());
    let record = tokio::task::block_in_place(move || app.add_bookmark(&title, &url))?;

    if let (false, Some(tagger)) = (payload.no_tag, state.tagger.clone()) {
        let (url, title) = (record.url.clone(), record.title.clone());
        tokio::spawn(async move {
            if let Err(err) = tagger.tag_page(&url, &title).await {
                log::error!("failed to store tags for {url}: {err:#}");
            }
        });
    }

    Ok((StatusCode::CREATED, Json(record)))
}
