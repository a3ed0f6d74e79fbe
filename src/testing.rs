//! Fixtures shared by the unit tests.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::api::ApiClient;
use crate::session::{MemoryTokenStore, Session};

/// Client against a mock server mounted under `/api`.
pub fn client(server_uri: &str, token: Option<&str>) -> ApiClient {
    let store = match token {
        Some(t) => MemoryTokenStore::with_token(t),
        None => MemoryTokenStore::default(),
    };
    ApiClient::new(&format!("{}/api", server_uri), Arc::new(Session::new(store)))
        .expect("client builds")
}

pub fn application_json(id: i64, company: &str, title: &str) -> Value {
    json!({
        "id": id,
        "companyName": company,
        "jobTitle": title,
        "status": "APPLIED",
        "jobDescription": "",
        "jobUrl": "",
        "applicationDate": "2024-03-01T00:00:00.000Z",
        "resumeUrl": null
    })
}

pub fn interview_json(id: i64, application_id: i64, round: u32, date: &str, kind: &str) -> Value {
    json!({
        "id": id,
        "jobApplicationId": application_id,
        "roundNumber": round,
        "interviewDate": date,
        "interviewType": kind,
        "notes": "",
        "status": "SCHEDULED"
    })
}
