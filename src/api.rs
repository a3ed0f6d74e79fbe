use std::path::Path;
use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::normalize_base_url;
use crate::error::ApiError;
use crate::models::{
    ApplicationPayload, Interview, JobApplication, LoginRequest, LoginResponse, SignupRequest,
};
use crate::session::Session;

/// Resume uploads the server accepts, by extension.
pub const RESUME_TYPES: [(&str, &str); 3] = [
    ("pdf", "application/pdf"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
];

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Shared transport for the tracker API. Cheap to clone.
///
/// Every request carries `Authorization: Bearer <token>` when the session has
/// a persisted token. A 401 from any endpoint expires the session and comes
/// back as `ApiError::Unauthorized`; what to show next is up to the caller.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<Session>,
}

impl ApiClient {
    pub fn new(base_url: &str, session: Arc<Session>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("applymate/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url),
            session,
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // --- Auth ---

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let request = self
            .request(Method::POST, "auth/login")
            .json(&LoginRequest { username, password });
        let response = self.send(request).await?;
        Self::decode(response).await
    }

    pub async fn signup(&self, username: &str, email: &str, password: &str) -> Result<(), ApiError> {
        let request = self.request(Method::POST, "auth/signup").json(&SignupRequest {
            username,
            email,
            password,
        });
        self.send(request).await?;
        Ok(())
    }

    // --- Applications ---

    pub async fn list_applications(&self) -> Result<Vec<JobApplication>, ApiError> {
        let response = self.send(self.request(Method::GET, "applications")).await?;
        Self::decode(response).await
    }

    pub async fn create_application(&self, payload: &ApplicationPayload) -> Result<JobApplication, ApiError> {
        let request = self.request(Method::POST, "applications").json(payload);
        let response = self.send(request).await?;
        Self::decode(response).await
    }

    pub async fn update_application(
        &self,
        id: i64,
        payload: &ApplicationPayload,
    ) -> Result<JobApplication, ApiError> {
        let request = self
            .request(Method::PUT, &format!("applications/{}", id))
            .json(payload);
        let response = self.send(request).await?;
        Self::decode(response).await
    }

    pub async fn delete_application(&self, id: i64) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, &format!("applications/{}", id)))
            .await?;
        Ok(())
    }

    pub async fn list_interviews(&self, application_id: i64) -> Result<Vec<Interview>, ApiError> {
        let request = self.request(
            Method::GET,
            &format!("interviews/application/{}", application_id),
        );
        let response = self.send(request).await?;
        Self::decode(response).await
    }

    // --- Files ---

    /// Upload a resume as multipart field `file`. Returns the storage
    /// reference the server hands back.
    pub async fn upload_resume(&self, path: &Path) -> Result<String, ApiError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ApiError::File {
            path: path.display().to_string(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "resume".to_string());
        let mime = resume_mime(path).unwrap_or("application/octet-stream");

        let part = Part::bytes(bytes).file_name(file_name).mime_str(mime)?;
        let form = Form::new().part("file", part);
        let request = self.request(Method::POST, "files/upload-resume").multipart(form);

        let response = self.send(request).await?;
        let body = response.text().await?;
        Ok(parse_storage_reference(&body))
    }

    // --- Plumbing ---

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path.trim_start_matches('/'));
        let builder = self.http.request(method, url);
        match self.session.token() {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => builder,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        debug!(url = %response.url(), %status, "API response");

        if status == StatusCode::UNAUTHORIZED {
            warn!(url = %response.url(), "API rejected credentials");
            self.session.expire();
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let is_json = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.contains("json"));
            let body = response.text().await.unwrap_or_default();
            let message = if is_json {
                serde_json::from_str::<ErrorBody>(&body)
                    .ok()
                    .and_then(|b| b.message)
            } else {
                Some(body.trim().to_string()).filter(|s| !s.is_empty())
            };
            warn!(%status, message = message.as_deref().unwrap_or(""), "API request failed");
            return Err(ApiError::Status { status, message });
        }
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

pub fn resume_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    RESUME_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
}

/// The upload endpoint answers with either a bare string or a JSON string.
fn parse_storage_reference(body: &str) -> String {
    serde_json::from_str::<String>(body).unwrap_or_else(|_| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApplicationStatus;
    use crate::session::{AuthState, MemoryTokenStore};
    use crate::testing::{self, application_json};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, token: Option<&str>) -> ApiClient {
        testing::client(&server.uri(), token)
    }

    #[test]
    fn test_base_url_is_normalized() {
        let session = Arc::new(Session::new(MemoryTokenStore::default()));
        let api = ApiClient::new("http://localhost:5000/api", session).unwrap();
        assert_eq!(api.base_url(), "http://localhost:5000/api/");
    }

    #[tokio::test]
    async fn test_bearer_header_sent_when_token_persisted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/applications"))
            .and(header("authorization", "Bearer secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                application_json(1, "Acme", "Engineer")
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server, Some("secret-token"));
        let apps = api.list_applications().await.unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].company_name, "Acme");
        assert_eq!(apps[0].status, ApplicationStatus::Applied);
    }

    #[tokio::test]
    async fn test_no_bearer_header_without_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/applications"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let api = client(&server, None);
        api.list_applications().await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_unauthorized_expires_session_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let api = client(&server, Some("stale"));
        let mut rx = api.session().subscribe();

        let err = api.list_applications().await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(api.session().token(), None);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), AuthState::Expired);

        // A second 401 finds nothing left to clear.
        let err = api.list_interviews(1).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_error_status_carries_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/applications/9"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"message": "Application not found"})),
            )
            .mount(&server)
            .await;

        let api = client(&server, Some("t"));
        match api.delete_application(9).await {
            Err(ApiError::Status { status, message }) => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(message.as_deref(), Some("Application not found"));
            }
            other => panic!("expected status error, got {:?}", other),
        }
        assert_eq!(api.session().token().as_deref(), Some("t"));
    }

    #[tokio::test]
    async fn test_login_posts_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(body_json(json!({"username": "ada", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "fresh",
                "user": {"id": 1, "username": "ada", "email": "ada@example.com"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server, None);
        let response = api.login("ada", "pw").await.unwrap();
        assert_eq!(response.token, "fresh");
        assert_eq!(response.user.unwrap().username, "ada");
    }

    #[tokio::test]
    async fn test_interviews_endpoint_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/interviews/application/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": 1,
                "jobApplicationId": 7,
                "roundNumber": 1,
                "interviewDate": "2024-03-05T10:00:00Z",
                "interviewType": "TECHNICAL",
                "notes": null,
                "status": "SCHEDULED"
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server, Some("t"));
        let interviews = api.list_interviews(7).await.unwrap();
        assert_eq!(interviews.len(), 1);
        assert_eq!(interviews[0].job_application_id, Some(7));
    }

    #[tokio::test]
    async fn test_upload_resume_sends_multipart_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/files/upload-resume"))
            .respond_with(ResponseTemplate::new(200).set_body_string("\"https://files.example/cv.pdf\""))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("cv.pdf");
        std::fs::write(&file, b"%PDF-1.4").unwrap();

        let api = client(&server, Some("t"));
        let reference = api.upload_resume(&file).await.unwrap();
        assert_eq!(reference, "https://files.example/cv.pdf");

        let requests = server.received_requests().await.unwrap();
        let content_type = requests[0].headers.get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data"));
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("name=\"file\""));
        assert!(body.contains("filename=\"cv.pdf\""));
        assert!(body.contains("application/pdf"));
    }

    #[test]
    fn test_storage_reference_accepts_plain_text() {
        assert_eq!(parse_storage_reference("resumes/42.pdf\n"), "resumes/42.pdf");
        assert_eq!(parse_storage_reference("\"resumes/42.pdf\""), "resumes/42.pdf");
    }

    #[test]
    fn test_resume_mime_by_extension() {
        assert_eq!(resume_mime(Path::new("cv.PDF")), Some("application/pdf"));
        assert_eq!(resume_mime(Path::new("cv.doc")), Some("application/msword"));
        assert_eq!(resume_mime(Path::new("cv.txt")), None);
        assert_eq!(resume_mime(Path::new("cv")), None);
    }
}
