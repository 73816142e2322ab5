//! HTTP client for the PDF backend: upload, document fetch, and extraction.

use reqwest::multipart::{Form, Part};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::config::Config;
use crate::error::{ExtractError, LoadError, UploadError};
use crate::orchestrator::Extractor;
use crate::selection::PageNumber;
use crate::viewport::DocumentId;

/// Every PDF starts with this.
pub const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// Body of `POST /extract`. Pages are ascending and unique by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionRequest {
    #[serde(rename = "fileId")]
    document: DocumentId,
    pages: Vec<PageNumber>,
}

impl ExtractionRequest {
    pub fn new(
        document: Option<DocumentId>,
        pages: impl IntoIterator<Item = PageNumber>,
    ) -> Result<Self, ExtractError> {
        let document = document.ok_or(ExtractError::InvalidRequest)?;
        let pages: BTreeSet<PageNumber> = pages.into_iter().collect();
        Ok(ExtractionRequest {
            document,
            pages: pages.into_iter().collect(),
        })
    }

    pub fn document(&self) -> &DocumentId {
        &self.document
    }

    pub fn pages(&self) -> &[PageNumber] {
        &self.pages
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(rename = "fileId")]
    file_id: String,
}

#[derive(Debug, Clone)]
pub struct ExtractionClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ExtractionClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(ExtractionClient {
            http,
            base_url: config.backend_url.clone(),
        })
    }

    /// Request a document made of `pages` of `document`.
    ///
    /// Fails with `InvalidRequest` when there is no document; emptiness of
    /// `pages` is the caller's concern.
    pub async fn extract(
        &self,
        document: Option<&DocumentId>,
        pages: &[PageNumber],
    ) -> Result<Vec<u8>, ExtractError> {
        let request = ExtractionRequest::new(document.cloned(), pages.iter().copied())?;
        self.send(&request).await
    }

    async fn send(&self, request: &ExtractionRequest) -> Result<Vec<u8>, ExtractError> {
        let url = self.endpoint(&["extract"]);
        tracing::debug!(
            document = %request.document,
            pages = ?request.pages,
            "Sending extraction request"
        );

        let resp = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| ExtractError::TransportFailure(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ExtractError::TransportFailure(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| ExtractError::TransportFailure(e.to_string()))?;

        if body.is_empty() {
            return Err(ExtractError::MalformedResponse("empty body".to_string()));
        }
        if !body.starts_with(PDF_SIGNATURE) {
            return Err(ExtractError::MalformedResponse(
                "body is not a PDF document".to_string(),
            ));
        }

        tracing::debug!(bytes = body.len(), "Extraction response received");
        Ok(body.to_vec())
    }

    /// Upload a PDF and return the identifier the backend assigned to it.
    ///
    /// Anything that is not a PDF is rejected before touching the network.
    pub async fn upload(&self, path: &Path) -> Result<DocumentId, UploadError> {
        let has_pdf_extension = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if !has_pdf_extension {
            return Err(UploadError::NotPdf(path.to_path_buf()));
        }

        let bytes = tokio::fs::read(path).await.map_err(|source| UploadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if !bytes.starts_with(PDF_SIGNATURE) {
            return Err(UploadError::NotPdf(path.to_path_buf()));
        }

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document.pdf")
            .to_string();
        let size = bytes.len();
        let part = Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str("application/pdf")
            .map_err(|e| UploadError::Transport(e.to_string()))?;
        let form = Form::new().part("file", part);

        tracing::info!(file = %file_name, bytes = size, "Uploading document");
        let resp = self
            .http
            .post(self.endpoint(&["upload"]))
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UploadError::Transport(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let uploaded: UploadResponse = resp
            .json()
            .await
            .map_err(|e| UploadError::MalformedResponse(e.to_string()))?;
        if uploaded.file_id.is_empty() {
            return Err(UploadError::MalformedResponse("empty fileId".to_string()));
        }

        tracing::info!(document = %uploaded.file_id, "Upload complete");
        Ok(DocumentId::from(uploaded.file_id))
    }

    /// Fetch the raw bytes of an uploaded document.
    pub async fn fetch_document(&self, document: &DocumentId) -> Result<Vec<u8>, LoadError> {
        let url = self.endpoint(&["pdf", document.as_str()]);
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| LoadError::Fetch(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LoadError::Fetch(format!("HTTP {}", status.as_u16())));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| LoadError::Fetch(e.to_string()))?;
        Ok(body.to_vec())
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // http(s) URLs always have a path to extend
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

impl Extractor for ExtractionClient {
    async fn extract(&self, request: &ExtractionRequest) -> Result<Vec<u8>, ExtractError> {
        ExtractionClient::extract(self, Some(request.document()), request.pages()).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pdf::testing::sample_pdf;
    use axum::extract::{Multipart, State};
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Serve `router` on an ephemeral port and return a config pointing at it.
    pub(crate) async fn spawn_backend(router: Router) -> Config {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Config::with_backend_url(&format!("http://{}", addr)).unwrap()
    }

    type Seen = Arc<Mutex<Vec<Value>>>;

    async fn echo_pdf(State(seen): State<Seen>, Json(body): Json<Value>) -> Vec<u8> {
        seen.lock().unwrap().push(body);
        sample_pdf(2)
    }

    async fn client_for(router: Router) -> ExtractionClient {
        let config = spawn_backend(router).await;
        ExtractionClient::new(&config).unwrap()
    }

    #[test]
    fn test_request_pages_are_ascending_and_unique() {
        let req = ExtractionRequest::new(Some("doc-1".into()), [4, 2, 4]).unwrap();
        assert_eq!(req.pages(), &[2, 4]);
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"fileId": "doc-1", "pages": [2, 4]})
        );
    }

    #[test]
    fn test_request_without_document_is_invalid() {
        assert_eq!(
            ExtractionRequest::new(None, [1]).unwrap_err(),
            ExtractError::InvalidRequest
        );
    }

    #[tokio::test]
    async fn test_extract_posts_selection() {
        let seen: Seen = Arc::default();
        let router = Router::new()
            .route("/extract", post(echo_pdf))
            .with_state(seen.clone());
        let client = client_for(router).await;

        let doc = DocumentId::from("doc-1");
        let bytes = client.extract(Some(&doc), &[4, 2]).await.unwrap();

        assert!(bytes.starts_with(PDF_SIGNATURE));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[json!({"fileId": "doc-1", "pages": [2, 4]})]);
    }

    #[tokio::test]
    async fn test_extract_without_document_sends_nothing() {
        let seen: Seen = Arc::default();
        let router = Router::new()
            .route("/extract", post(echo_pdf))
            .with_state(seen.clone());
        let client = client_for(router).await;

        let err = client.extract(None, &[1]).await.unwrap_err();
        assert_eq!(err, ExtractError::InvalidRequest);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_success_status_is_transport_failure() {
        let router = Router::new().route(
            "/extract",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let client = client_for(router).await;

        let err = client.extract(Some(&"doc-1".into()), &[1]).await.unwrap_err();
        match err {
            ExtractError::TransportFailure(msg) => assert!(msg.contains("500")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_body_is_malformed() {
        let router = Router::new().route("/extract", post(|| async { Vec::<u8>::new() }));
        let client = client_for(router).await;

        let err = client.extract(Some(&"doc-1".into()), &[1]).await.unwrap_err();
        assert_eq!(err.kind(), "malformed_response");
    }

    #[tokio::test]
    async fn test_non_pdf_body_is_malformed() {
        let router = Router::new().route("/extract", post(|| async { "<html>oops</html>" }));
        let client = client_for(router).await;

        let err = client.extract(Some(&"doc-1".into()), &[1]).await.unwrap_err();
        assert_eq!(err.kind(), "malformed_response");
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = Config::with_backend_url(&format!("http://{}", addr)).unwrap();
        let client = ExtractionClient::new(&config).unwrap();

        let err = client.extract(Some(&"doc-1".into()), &[1]).await.unwrap_err();
        assert_eq!(err.kind(), "transport_failure");
    }

    #[tokio::test]
    async fn test_timeout_is_transport_failure() {
        let router = Router::new().route(
            "/extract",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                sample_pdf(1)
            }),
        );
        let mut config = spawn_backend(router).await;
        config.request_timeout = Duration::from_millis(200);
        let client = ExtractionClient::new(&config).unwrap();

        let doc = DocumentId::from("doc-1");
        match client.extract(Some(&doc), &[1]).await {
            Err(ExtractError::TransportFailure(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_endpoint_keeps_base_path() {
        let config = Config::with_backend_url("http://localhost:8000/api/").unwrap();
        let client = ExtractionClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint(&["pdf", "a b"]).as_str(),
            "http://localhost:8000/api/pdf/a%20b"
        );
        let config = Config::with_backend_url("http://localhost:8000").unwrap();
        let client = ExtractionClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint(&["extract"]).as_str(),
            "http://localhost:8000/extract"
        );
    }

    #[tokio::test]
    async fn test_upload_rejects_non_pdf_before_sending() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_backend_url("http://127.0.0.1:9").unwrap();
        let client = ExtractionClient::new(&config).unwrap();

        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, b"hello").unwrap();
        assert!(matches!(
            client.upload(&txt).await,
            Err(UploadError::NotPdf(_))
        ));

        let disguised = dir.path().join("fake.pdf");
        std::fs::write(&disguised, b"PK\x03\x04 zip").unwrap();
        assert!(matches!(
            client.upload(&disguised).await,
            Err(UploadError::NotPdf(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_returns_file_id() {
        async fn accept(mut multipart: Multipart) -> Json<Value> {
            let mut size = 0;
            while let Some(field) = multipart.next_field().await.unwrap() {
                assert_eq!(field.name(), Some("file"));
                assert_eq!(field.file_name(), Some("report.pdf"));
                size += field.bytes().await.unwrap().len();
            }
            assert!(size > 0);
            Json(json!({"fileId": "doc-9"}))
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, sample_pdf(1)).unwrap();

        let client = client_for(Router::new().route("/upload", post(accept))).await;
        let id = client.upload(&path).await.unwrap();
        assert_eq!(id.as_str(), "doc-9");
    }

    #[tokio::test]
    async fn test_upload_without_file_id_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, sample_pdf(1)).unwrap();

        let router = Router::new().route("/upload", post(|| async { Json(json!({"ok": true})) }));
        let client = client_for(router).await;
        assert!(matches!(
            client.upload(&path).await,
            Err(UploadError::MalformedResponse(_))
        ));
    }
}
