//! HTTP API tests driving the router with mock backends

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use spam_rs::api::{ApiServer, AppState};
use spam_rs::classifier::{
    ClassificationResult, MockClassifier, TextClassifier, UnavailableClassifier,
};
use spam_rs::config::ServerConfig;
use spam_rs::fusion::ScoreFusion;
use spam_rs::ocr::{ImageTextExtractor, MockOcr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "spamrsboundary";

/// Four keyword hits, confidence 0.99
const SPAM_TEXT: &str = "恭喜中獎，免費領取，限時優惠";
/// Two keyword hits, confidence 0.65
const MID_TEXT: &str = "免費優惠";
/// No keyword hits, confidence 0.05
const HAM_TEXT: &str = "明天下午三點開會";

/// Mock classifier that counts calls
struct CountingClassifier {
    inner: MockClassifier,
    calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl TextClassifier for CountingClassifier {
    async fn classify(&self, text: &str) -> spam_rs::Result<ClassificationResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.classify(text).await
    }

    fn backend_name(&self) -> &str {
        "counting-mock"
    }
}

/// Mock OCR that counts vendor calls
struct CountingOcr {
    inner: MockOcr,
    calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl ImageTextExtractor for CountingOcr {
    async fn extract(&self, image: &[u8]) -> spam_rs::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.extract(image).await
    }

    fn name(&self) -> &str {
        "counting-ocr"
    }
}

fn router_with_config(
    classifier: Arc<dyn TextClassifier>,
    extractor: Arc<dyn ImageTextExtractor>,
    config: &ServerConfig,
) -> Router {
    let state = AppState {
        classifier,
        extractor,
        fusion: ScoreFusion::default(),
    };
    ApiServer::new(state, config).router()
}

fn router_with(
    classifier: Arc<dyn TextClassifier>,
    extractor: Arc<dyn ImageTextExtractor>,
) -> Router {
    router_with_config(classifier, extractor, &ServerConfig::default())
}

fn unavailable_router() -> (Router, Arc<AtomicUsize>) {
    let ocr_calls = Arc::new(AtomicUsize::new(0));
    let extractor = CountingOcr {
        inner: MockOcr::new(),
        calls: ocr_calls.clone(),
    };
    let router = router_with(
        Arc::new(UnavailableClassifier::new("onnx", "missing model")),
        Arc::new(extractor),
    );
    (router, ocr_calls)
}

fn mock_router() -> Router {
    router_with(Arc::new(MockClassifier::new()), Arc::new(MockOcr::new()))
}

fn counting_router(extractor: Arc<dyn ImageTextExtractor>) -> (Router, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let classifier = CountingClassifier {
        inner: MockClassifier::new(),
        calls: calls.clone(),
    };
    (router_with(Arc::new(classifier), extractor), calls)
}

/// Build a multipart body from (name, is_file, data) fields
fn multipart_body(fields: &[(&str, bool, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, is_file, data) in fields {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        if *is_file {
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"upload.png\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    name
                )
                .as_bytes(),
            );
        } else {
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            );
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn multipart_request(uri: &str, fields: &[(&str, bool, &[u8])]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(fields)))
        .unwrap()
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_health() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(mock_router(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["classifier"], "mock");
    assert_eq!(body["model_ready"], true);
}

#[tokio::test]
async fn test_health_degraded() {
    let router = router_with(
        Arc::new(UnavailableClassifier::new("vectorizer", "missing model")),
        Arc::new(MockOcr::new()),
    );
    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, body) = send(router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["model_ready"], false);
}

#[tokio::test]
async fn test_predict_spam_and_ham() {
    let (status, body) = send(mock_router(), json_request("/predict", json!({"text": SPAM_TEXT}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "spam");

    let (status, body) = send(mock_router(), json_request("/predict", json!({"text": HAM_TEXT}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "ham");
}

#[tokio::test]
async fn test_predict_missing_or_blank_text() {
    let (status, body) = send(mock_router(), json_request("/predict", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = send(mock_router(), json_request("/predict", json!({"text": "  \n "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_predict_malformed_json() {
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{\"text\": "))
        .unwrap();
    let (status, body) = send(mock_router(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Invalid JSON"));
}

#[tokio::test]
async fn test_predict_model_unavailable() {
    let router = router_with(
        Arc::new(UnavailableClassifier::new("vectorizer", "missing model")),
        Arc::new(MockOcr::new()),
    );
    let (status, body) = send(router, json_request("/predict", json!({"text": SPAM_TEXT}))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("Model unavailable"));
}

#[tokio::test]
async fn test_predict_image() {
    let request = multipart_request("/predict-image", &[("image", true, SPAM_TEXT.as_bytes())]);
    let (status, body) = send(mock_router(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "spam");
    assert_eq!(body["text"], SPAM_TEXT);
}

#[tokio::test]
async fn test_predict_image_without_image() {
    let request = multipart_request("/predict-image", &[("text", false, b"hello")]);
    let (status, _) = send(mock_router(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method("POST")
        .uri("/predict-image")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, body) = send(mock_router(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_predict_image_no_text_found() {
    let request = multipart_request("/predict-image", &[("image", true, b"   ")]);
    let (status, body) = send(mock_router(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No text found in image");
}

#[tokio::test]
async fn test_predict_image_vendor_error_skips_classifier() {
    let (router, calls) = counting_router(Arc::new(MockOcr::failing("E101: timed out")));
    let request = multipart_request("/predict-image", &[("image", true, b"GIF89a")]);
    let (status, body) = send(router, request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("E101"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_analyze_both_channels_spam() {
    let request = multipart_request(
        "/analyze-all",
        &[("text", false, SPAM_TEXT.as_bytes()), ("image", true, SPAM_TEXT.as_bytes())],
    );
    let (status, body) = send(mock_router(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["final_label"], "spam");
    assert_eq!(body["total_score"], 2.5);
    assert_eq!(body["text_score"], 1.0);
    assert_eq!(body["image_score"], 1.5);
    assert_eq!(body["text_label"], "spam");
    assert_eq!(body["image_label"], "spam");
    assert_eq!(body["image_text"], SPAM_TEXT);
}

#[tokio::test]
async fn test_analyze_mid_text_ham_image() {
    let request = multipart_request(
        "/analyze-all",
        &[("text", false, MID_TEXT.as_bytes()), ("image", true, HAM_TEXT.as_bytes())],
    );
    let (status, body) = send(mock_router(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_score"], 0.5);
    assert_eq!(body["final_label"], "ham");
    assert_eq!(body["text_label"], "spam");
    assert_eq!(body["image_label"], "ham");
    assert_eq!(body["image_score"], 0.0);
}

#[tokio::test]
async fn test_analyze_text_only_passes_label_through() {
    let request = multipart_request("/analyze-all", &[("text", false, MID_TEXT.as_bytes())]);
    let (status, body) = send(mock_router(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["final_label"], "spam");
    assert_eq!(body["total_score"], 0.5);
    assert!(body["image_label"].is_null());
    assert!(body["image_text"].is_null());
    assert_eq!(body["image_score"], 0.0);
}

#[tokio::test]
async fn test_analyze_image_only() {
    let request = multipart_request("/analyze-all", &[("image", true, SPAM_TEXT.as_bytes())]);
    let (status, body) = send(mock_router(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["final_label"], "spam");
    assert_eq!(body["total_score"], 1.5);
    assert!(body["text"].is_null());
    assert!(body["text_label"].is_null());
}

#[tokio::test]
async fn test_analyze_blank_image_folds_into_text_only() {
    let request = multipart_request(
        "/analyze-all",
        &[("text", false, HAM_TEXT.as_bytes()), ("image", true, b" \r\n ")],
    );
    let (status, body) = send(mock_router(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["final_label"], "ham");
    assert!(body["image_label"].is_null());
}

#[tokio::test]
async fn test_analyze_nothing_usable() {
    let request = multipart_request("/analyze-all", &[("text", false, b"   ")]);
    let (status, _) = send(mock_router(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = multipart_request("/analyze-all", &[("image", true, b"   ")]);
    let (status, body) = send(mock_router(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_analyze_vendor_error() {
    let (router, _) = counting_router(Arc::new(MockOcr::failing("quota exceeded")));
    let request = multipart_request(
        "/analyze-all",
        &[("text", false, SPAM_TEXT.as_bytes()), ("image", true, b"GIF89a")],
    );
    let (status, body) = send(router, request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("quota exceeded"));
}

#[tokio::test]
async fn test_unloaded_model_skips_ocr() {
    let (router, ocr_calls) = unavailable_router();
    let request = multipart_request("/predict-image", &[("image", true, SPAM_TEXT.as_bytes())]);
    let (status, body) = send(router, request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("Model unavailable"));
    assert_eq!(ocr_calls.load(Ordering::SeqCst), 0);

    let (router, ocr_calls) = unavailable_router();
    let request = multipart_request(
        "/analyze-all",
        &[("text", false, SPAM_TEXT.as_bytes()), ("image", true, SPAM_TEXT.as_bytes())],
    );
    let (status, _) = send(router, request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(ocr_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_oversized_upload_is_payload_too_large() {
    let config = ServerConfig {
        max_body_bytes: 1024,
        ..ServerConfig::default()
    };
    let ocr_calls = Arc::new(AtomicUsize::new(0));
    let extractor = CountingOcr {
        inner: MockOcr::new(),
        calls: ocr_calls.clone(),
    };
    let router = router_with_config(Arc::new(MockClassifier::new()), Arc::new(extractor), &config);

    let image = vec![b'x'; 4096];
    let request = multipart_request("/predict-image", &[("image", true, image.as_slice())]);
    let (status, body) = send(router, request).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["error"].as_str().unwrap().contains("Payload too large"));
    assert_eq!(ocr_calls.load(Ordering::SeqCst), 0);
}
