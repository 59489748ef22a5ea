// API integration tests that verify HTTP endpoints
// Tests the Axum router with in-memory multipart uploads

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use http_body_util::BodyExt; // For `.collect()`
use rainfall_gap_filler::api::{create_router, generate_openapi_spec, AppState};
use rainfall_gap_filler::gap_fill::{EmptyPlacePolicy, GapFillOptions};
use rainfall_gap_filler::services::RainfallGapFiller;
use serde_json::Value;
use tower::ServiceExt; // For `oneshot`

/// Test fixture module for API tests
mod api_test_fixtures {
    use super::*;

    pub const BOUNDARY: &str = "rainfall-test-boundary";

    pub const SAMPLE_CSV: &str = "Place,Year,Mth,Day,RF,Lng,Lat,temp\n\
        A,2020,1,1,5.0,120.1,14.2,31\n\
        A,2020,1,3,7.0,120.1,14.2,30\n";

    pub fn state(options: GapFillOptions) -> AppState {
        AppState {
            gap_filler: RainfallGapFiller::new(options),
            default_worksheet: None,
            max_upload_bytes: 1024 * 1024,
        }
    }

    /// Build a multipart/form-data body from (name, optional file name, content) parts
    pub fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file_name, content) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file_name {
                Some(file_name) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    pub fn upload_request(uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    pub async fn body_json(response: Response<Body>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    pub async fn body_text(response: Response<Body>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }
}

use api_test_fixtures::*;

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_router(state(GapFillOptions::default()));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_process_csv_upload() {
    let app = create_router(state(GapFillOptions::default()));
    let body = multipart_body(&[("file", Some("rain_2020.csv"), SAMPLE_CSV.as_bytes())]);

    let response = app
        .oneshot(upload_request("/api/v1/process", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    assert_eq!(json["file_name"], "rain_2020.csv");
    assert_eq!(json["year"], 2020);
    assert_eq!(json["missing_percentage_display"], "99.45");
    assert_eq!(json["total_missing_days"], 364);
    assert_eq!(json["combined_rows"], 366);
    assert_eq!(json["missing_rows"], 364);
    assert_eq!(json["skipped_rows"], 0);
    assert_eq!(json["places"][0]["place"], "A");
    assert_eq!(json["places"][0]["observed_days"], 2);
    assert_eq!(json["places"][0]["missing_days"], 364);

    let artifacts = json["artifacts"].as_array().unwrap();
    assert_eq!(artifacts.len(), 3);
    assert_eq!(artifacts[0]["kind"], "combined");
    assert_eq!(artifacts[0]["file_name"], "combined_data_2020.csv");
    assert_eq!(artifacts[1]["file_name"], "missing_data_2020.csv");
    assert_eq!(artifacts[2]["file_name"], "output_data_2020.csv");

    let output = artifacts[2]["content"].as_str().unwrap();
    assert!(output.starts_with("Date,A"));
    assert_eq!(output.lines().count(), 367);
}

#[tokio::test]
async fn test_process_xlsx_upload_with_worksheet() {
    let app = create_router(state(GapFillOptions::default()));
    let workbook = std::fs::read("tests/fixtures/rain_2020_stations.xlsx").unwrap();
    let body = multipart_body(&[
        ("file", Some("rain_2020_stations.xlsx"), workbook.as_slice()),
        ("worksheet", None, "Alt".as_bytes()),
    ]);

    let response = app
        .oneshot(upload_request("/api/v1/process", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["places"].as_array().unwrap().len(), 1);
    assert_eq!(json["places"][0]["place"], "Station C");
    assert_eq!(json["missing_percentage_display"], "99.73");
}

#[tokio::test]
async fn test_download_output_artifact() {
    let app = create_router(state(GapFillOptions::default()));
    let body = multipart_body(&[("file", Some("rain_2020.csv"), SAMPLE_CSV.as_bytes())]);

    let response = app
        .oneshot(upload_request("/api/v1/process/output", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"output_data_2020.csv\""
    );

    let csv = body_text(response).await;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "Date,A");
    assert_eq!(lines[1], "2020-01-01,5");
    assert_eq!(lines[2], "2020-01-02,-99.9");
    assert_eq!(lines[3], "2020-01-03,7");
}

#[tokio::test]
async fn test_download_missing_artifact() {
    let app = create_router(state(GapFillOptions::default()));
    let body = multipart_body(&[("file", Some("rain_2020.csv"), SAMPLE_CSV.as_bytes())]);

    let response = app
        .oneshot(upload_request("/api/v1/process/missing", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let csv = body_text(response).await;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "Place,Date,RF,Lng,Lat");
    assert_eq!(lines[1], "A,2020-01-02,-99.9,120.1,14.2");
    assert_eq!(lines.len(), 365);
}

#[tokio::test]
async fn test_unknown_artifact_returns_404() {
    let app = create_router(state(GapFillOptions::default()));
    let body = multipart_body(&[("file", Some("rain_2020.csv"), SAMPLE_CSV.as_bytes())]);

    let response = app
        .oneshot(upload_request("/api/v1/process/pivot", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("pivot"));
}

#[tokio::test]
async fn test_file_name_without_year_returns_422() {
    let app = create_router(state(GapFillOptions::default()));
    let body = multipart_body(&[("file", Some("rain.csv"), SAMPLE_CSV.as_bytes())]);

    let response = app
        .oneshot(upload_request("/api/v1/process", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("rain.csv"));
}

#[tokio::test]
async fn test_missing_required_column_returns_422() {
    let app = create_router(state(GapFillOptions::default()));
    let body = multipart_body(&[("file", Some("rain_2020.csv"), "Place,RF,Lat\nA,1,2\n".as_bytes())]);

    let response = app
        .oneshot(upload_request("/api/v1/process", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("Lng"));
}

#[tokio::test]
async fn test_empty_expected_place_rejected_with_422() {
    let app = create_router(state(GapFillOptions {
        expected_places: vec!["B".to_string()],
        empty_place_policy: EmptyPlacePolicy::Reject,
    }));
    let body = multipart_body(&[("file", Some("rain_2020.csv"), SAMPLE_CSV.as_bytes())]);

    let response = app
        .oneshot(upload_request("/api/v1/process", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_empty_expected_place_skipped() {
    let app = create_router(state(GapFillOptions {
        expected_places: vec!["B".to_string()],
        empty_place_policy: EmptyPlacePolicy::Skip,
    }));
    let body = multipart_body(&[("file", Some("rain_2020.csv"), SAMPLE_CSV.as_bytes())]);

    let response = app
        .oneshot(upload_request("/api/v1/process", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["skipped_places"], serde_json::json!(["B"]));
    assert_eq!(json["missing_percentage_display"], "99.45");
}

#[tokio::test]
async fn test_rows_without_place_counted_in_response() {
    let app = create_router(state(GapFillOptions::default()));
    let csv = format!("{SAMPLE_CSV},2020,1,5,2.0,120.1,14.2,29\n");
    let body = multipart_body(&[("file", Some("rain_2020.csv"), csv.as_bytes())]);

    let response = app
        .oneshot(upload_request("/api/v1/process", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["skipped_rows"], 1);
    assert_eq!(json["total_missing_days"], 364);
}

#[tokio::test]
async fn test_missing_file_field_returns_400() {
    let app = create_router(state(GapFillOptions::default()));
    let body = multipart_body(&[("worksheet", None, "Sheet1".as_bytes())]);

    let response = app
        .oneshot(upload_request("/api/v1/process", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_over_limit_returns_413() {
    let mut app_state = state(GapFillOptions::default());
    app_state.max_upload_bytes = 64;
    let app = create_router(app_state);

    let large = SAMPLE_CSV.repeat(20);
    let body = multipart_body(&[("file", Some("rain_2020.csv"), large.as_bytes())]);

    let response = app
        .oneshot(upload_request("/api/v1/process", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[test]
fn test_openapi_spec_lists_endpoints() {
    let spec = generate_openapi_spec();
    let json = serde_json::to_value(&spec).unwrap();

    let paths = json["paths"].as_object().unwrap();
    assert!(paths.contains_key("/api/v1/health"));
    assert!(paths.contains_key("/api/v1/process"));
    assert!(paths.contains_key("/api/v1/process/{artifact}"));
}
