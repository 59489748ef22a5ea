use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use utoipa::{OpenApi, ToSchema};

use crate::exporters::csv_exporter::CSV_CONTENT_TYPE;
use crate::exporters::{ArtifactKind, CsvArtifact};
use crate::importers::SpreadsheetImportError;
use crate::models::PlaceGaps;
use crate::services::{ProcessingError, ProcessingReport, RainfallGapFiller};

#[derive(Clone)]
pub struct AppState {
    pub gap_filler: RainfallGapFiller,
    /// Worksheet used when the upload does not name one
    pub default_worksheet: Option<String>,
    pub max_upload_bytes: usize,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize, ToSchema)]
pub struct ArtifactResponse {
    pub kind: ArtifactKind,
    pub file_name: String,
    pub content_type: String,
    /// CSV text, ready to be offered as a download
    pub content: String,
}

impl From<CsvArtifact> for ArtifactResponse {
    fn from(artifact: CsvArtifact) -> Self {
        Self {
            kind: artifact.kind,
            file_name: artifact.file_name,
            content_type: CSV_CONTENT_TYPE.to_string(),
            content: artifact.content,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ProcessResponse {
    pub file_name: String,
    pub year: i32,
    pub missing_percentage: f64,
    /// Two decimals, e.g. "99.45"
    pub missing_percentage_display: String,
    pub total_missing_days: usize,
    pub combined_rows: usize,
    pub missing_rows: usize,
    pub places: Vec<PlaceGaps>,
    pub skipped_places: Vec<String>,
    /// Input rows dropped because their Place cell was blank
    pub skipped_rows: usize,
    pub artifacts: Vec<ArtifactResponse>,
}

impl ProcessResponse {
    fn new(file_name: String, report: &ProcessingReport, artifacts: Vec<CsvArtifact>) -> Self {
        Self {
            file_name,
            year: report.year,
            missing_percentage: report.missing_percentage,
            missing_percentage_display: report.missing_percentage_display(),
            total_missing_days: report.total_missing_days,
            combined_rows: report.combined.len(),
            missing_rows: report.missing.len(),
            places: report.places.clone(),
            skipped_places: report.skipped_places.clone(),
            skipped_rows: report.skipped_rows,
            artifacts: artifacts.into_iter().map(ArtifactResponse::from).collect(),
        }
    }
}

/// Multipart upload accepted by the processing endpoints
///
/// Only describes the form in the OpenAPI document; handlers read the fields
/// from `Multipart` directly, so nothing constructs it.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// Spreadsheet whose name contains the 4-digit year, e.g. rain_2020.xlsx
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
    /// Worksheet to read instead of the first one
    worksheet: Option<String>,
}

/// Error surfaced to the caller as `{"error": "..."}`
#[derive(Debug)]
pub struct ApiError {
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

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        Self {
            status: e.status(),
            message: format!("Invalid upload: {}", e.body_text()),
        }
    }
}

impl From<ProcessingError> for ApiError {
    fn from(e: ProcessingError) -> Self {
        let status = match &e {
            ProcessingError::GapFill(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ProcessingError::Import(SpreadsheetImportError::Io(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProcessingError::Import(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ProcessingError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health, process_upload, process_artifact),
    components(schemas(
        HealthResponse,
        ErrorResponse,
        ProcessResponse,
        ArtifactResponse,
        ArtifactKind,
        PlaceGaps,
        UploadForm
    )),
    tags((name = "rainfall", description = "Rainfall gap filling"))
)]
pub struct ApiDoc;

pub fn generate_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;
    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/process", post(process_upload))
        .route("/process/{artifact}", post(process_artifact))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}

#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "rainfall",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
#[instrument(skip(_state))]
async fn health(State(_state): State<AppState>) -> impl IntoResponse {
    debug!("Health check requested");
    let response = HealthResponse {
        status: "healthy".to_string(),
    };
    (StatusCode::OK, Json(response))
}

#[utoipa::path(
    post,
    path = "/api/v1/process",
    tag = "rainfall",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Gap-filled tables and missing percentage", body = ProcessResponse),
        (status = 400, description = "Malformed upload", body = ErrorResponse),
        (status = 413, description = "Upload exceeds MAX_UPLOAD_BYTES", body = ErrorResponse),
        (status = 422, description = "Sheet cannot be processed", body = ErrorResponse)
    )
)]
#[instrument(skip(state, multipart))]
async fn process_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ProcessResponse>, ApiError> {
    let upload = read_upload(multipart).await?;
    let file_name = upload.file_name.clone();

    let report = run_pipeline(&state, upload).await?;
    let artifacts = report.artifacts().map_err(ProcessingError::from)?;

    info!(
        "Processed {}: year {}, {} places, {}% missing",
        file_name,
        report.year,
        report.places.len(),
        report.missing_percentage_display()
    );

    Ok(Json(ProcessResponse::new(file_name, &report, artifacts)))
}

#[utoipa::path(
    post,
    path = "/api/v1/process/{artifact}",
    tag = "rainfall",
    params(("artifact" = String, Path, description = "One of combined, missing, output")),
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "CSV download", content_type = "text/csv", body = String),
        (status = 404, description = "Unknown artifact", body = ErrorResponse),
        (status = 422, description = "Sheet cannot be processed", body = ErrorResponse)
    )
)]
#[instrument(skip(state, multipart))]
async fn process_artifact(
    State(state): State<AppState>,
    Path(artifact): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let kind: ArtifactKind = artifact.parse().map_err(|e: String| {
        warn!("Rejected artifact request: {}", e);
        ApiError::not_found(e)
    })?;

    let upload = read_upload(multipart).await?;
    let report = run_pipeline(&state, upload).await?;
    let artifact = report.artifact(kind).map_err(ProcessingError::from)?;

    info!(
        "Serving {} ({} bytes)",
        artifact.file_name,
        artifact.content.len()
    );

    Ok((
        [
            (header::CONTENT_TYPE, CSV_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", artifact.file_name),
            ),
        ],
        artifact.content,
    ))
}

struct Upload {
    file_name: String,
    bytes: Vec<u8>,
    worksheet: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut worksheet = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                debug!("Received {} ({} bytes)", file_name, bytes.len());
                file = Some((file_name, bytes.to_vec()));
            }
            "worksheet" => {
                let text = field.text().await?;
                let text = text.trim();
                if !text.is_empty() {
                    worksheet = Some(text.to_string());
                }
            }
            other => debug!("Ignoring multipart field '{}'", other),
        }
    }

    let (file_name, bytes) = file.ok_or_else(|| ApiError::bad_request("Missing 'file' field"))?;
    Ok(Upload {
        file_name,
        bytes,
        worksheet,
    })
}

/// Run the synchronous pipeline off the async runtime
async fn run_pipeline(state: &AppState, upload: Upload) -> Result<ProcessingReport, ApiError> {
    let Upload {
        file_name,
        bytes,
        worksheet,
    } = upload;
    let worksheet = worksheet.or_else(|| state.default_worksheet.clone());
    let gap_filler = state.gap_filler.clone();
    let name = file_name.clone();

    tokio::task::spawn_blocking(move || gap_filler.process_upload(&name, bytes, worksheet))
        .await
        .map_err(|e| {
            error!("Processing task for {} failed: {}", file_name, e);
            ApiError::internal("Processing task failed")
        })?
        .map_err(|e| {
            warn!("Failed to process {}: {}", file_name, e);
            ApiError::from(e)
        })
}
