//! HTTP surface of the video API.
//!
//! Handlers validate request shapes, then hand the actual work to the
//! library or the reaction updater on the blocking pool. Every error leaves
//! as a JSON `{"error": ...}` body.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        DefaultBodyLimit, Multipart, Path as AxumPath, State,
        multipart::{Field, MultipartError, MultipartRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tokio::task;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::{VideoError, VideoResult};
use crate::library::{UploadForm, VideoLibrary};
use crate::reaction::{ReactionRequest, ReactionUpdater};
use crate::upload::MediaFile;
use crate::video::{ReactionCounts, SuggestedVideo, VideoRecord};

#[derive(Clone)]
pub struct AppState {
    library: VideoLibrary,
    reactions: ReactionUpdater,
}

impl AppState {
    pub fn new(library: VideoLibrary) -> Self {
        let reactions = ReactionUpdater::new(library.store());
        Self { library, reactions }
    }
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<VideoError> for ApiError {
    fn from(err: VideoError) -> Self {
        match err {
            VideoError::InvalidInput(message) => Self::bad_request(message),
            VideoError::NotFound => Self::not_found(VideoError::NotFound.to_string()),
            VideoError::Upstream(source) => {
                tracing::error!(error = %format!("{source:#}"), "upstream call failed");
                Self::internal("internal server error")
            }
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        let status = match err.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            message: err.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Builds the router. Listing all videos and uploading are only mounted
/// when the library has a media uploader.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let mut app = Router::new()
        .route("/api/videos/suggested", get(suggested_videos))
        .route("/api/videos/{id}", get(get_video))
        .route("/api/videos/{id}/reaction", post(update_reaction));

    if state.library.accepts_uploads() {
        app = app.route("/api/videos", get(list_videos)).route(
            "/api/upload",
            post(upload_video).layer(DefaultBodyLimit::max(max_upload_bytes)),
        );
    }

    app.fallback(endpoint_not_found)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Runs a blocking store or upload call off the async workers.
async fn run_blocking<F, T>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> VideoResult<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|err| ApiError::internal(format!("task join error: {err}")))?
        .map_err(ApiError::from)
}

async fn endpoint_not_found() -> ApiError {
    ApiError::not_found("endpoint not found")
}

async fn get_video(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Json<VideoRecord>> {
    let library = state.library.clone();
    let record = run_blocking(move || library.get_by_id(&id)).await?;
    Ok(Json(record))
}

async fn suggested_videos(State(state): State<AppState>) -> ApiResult<Json<Vec<SuggestedVideo>>> {
    let library = state.library.clone();
    let suggested = run_blocking(move || library.list_suggested()).await?;
    Ok(Json(suggested))
}

async fn list_videos(State(state): State<AppState>) -> ApiResult<Json<Vec<VideoRecord>>> {
    let library = state.library.clone();
    let videos = run_blocking(move || library.list_all()).await?;
    Ok(Json(videos))
}

/// The body is parsed by hand so that a missing body, bad JSON, and missing
/// fields all come back as a 400.
async fn update_reaction(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    body: Bytes,
) -> ApiResult<Json<ReactionCounts>> {
    let request: ReactionRequest =
        serde_json::from_slice(&body).map_err(|_| ApiError::bad_request("Invalid request"))?;

    let reactions = state.reactions.clone();
    let counts =
        run_blocking(move || reactions.apply(&id, &request.kind, request.remove)).await?;
    Ok(Json(counts))
}

async fn upload_video(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<VideoRecord>> {
    let mut multipart = multipart.map_err(|err| ApiError::bad_request(err.body_text()))?;
    let form = read_upload_form(&mut multipart).await?;

    let library = state.library.clone();
    let record = run_blocking(move || library.create(form)).await?;
    Ok(Json(record))
}

/// Collects the `title`, `description`, and `video` parts. Other parts are
/// drained and ignored, and so is a `video` part that is not a file.
async fn read_upload_form(multipart: &mut Multipart) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "title" => form.title = Some(field.text().await?),
            "description" => form.description = Some(field.text().await?),
            "video" => {
                if let Some(media) = read_media_field(field).await? {
                    form.video = Some(media);
                }
            }
            _ => {}
        }
    }
    Ok(form)
}

/// `None` for a part sent without a filename.
async fn read_media_field(field: Field<'_>) -> ApiResult<Option<MediaFile>> {
    let Some(file_name) = field.file_name().map(str::to_owned) else {
        return Ok(None);
    };
    let content_type = field.content_type().map(str::to_owned);
    let bytes = field.bytes().await?;
    Ok(Some(MediaFile {
        file_name: Some(file_name),
        content_type,
        bytes,
    }))
}
