use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::dates;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    #[default]
    Applied,
    InterviewScheduled,
    TechnicalInterview,
    FinalInterview,
    OfferReceived,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 7] = [
        ApplicationStatus::Applied,
        ApplicationStatus::InterviewScheduled,
        ApplicationStatus::TechnicalInterview,
        ApplicationStatus::FinalInterview,
        ApplicationStatus::OfferReceived,
        ApplicationStatus::Rejected,
        ApplicationStatus::Withdrawn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "APPLIED",
            ApplicationStatus::InterviewScheduled => "INTERVIEW_SCHEDULED",
            ApplicationStatus::TechnicalInterview => "TECHNICAL_INTERVIEW",
            ApplicationStatus::FinalInterview => "FINAL_INTERVIEW",
            ApplicationStatus::OfferReceived => "OFFER_RECEIVED",
            ApplicationStatus::Rejected => "REJECTED",
            ApplicationStatus::Withdrawn => "WITHDRAWN",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "Applied",
            ApplicationStatus::InterviewScheduled => "Interview Scheduled",
            ApplicationStatus::TechnicalInterview => "Technical Interview",
            ApplicationStatus::FinalInterview => "Final Interview",
            ApplicationStatus::OfferReceived => "Offer Received",
            ApplicationStatus::Rejected => "Rejected",
            ApplicationStatus::Withdrawn => "Withdrawn",
        }
    }

    /// Next status in `ALL`, wrapping around. Used by the form's status picker.
    pub fn cycle(&self) -> Self {
        let idx = Self::ALL.iter().position(|s| s == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_enum_name(s);
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|s| s.as_str()).collect();
                format!("Unknown status '{}'. Available: {}", s, names.join(", "))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterviewStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
}

impl InterviewStatus {
    pub const ALL: [InterviewStatus; 3] = [
        InterviewStatus::Scheduled,
        InterviewStatus::Completed,
        InterviewStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewStatus::Scheduled => "SCHEDULED",
            InterviewStatus::Completed => "COMPLETED",
            InterviewStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn cycle(&self) -> Self {
        let idx = Self::ALL.iter().position(|s| s == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for InterviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_enum_name(s);
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| format!("Unknown interview status '{}'. Available: SCHEDULED, COMPLETED, CANCELLED", s))
    }
}

/// Interview kind. Older records carry free text here, so anything that is
/// not one of the known names is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InterviewType {
    Technical,
    Behavioral,
    SystemDesign,
    Hr,
    Other(String),
}

impl Default for InterviewType {
    fn default() -> Self {
        InterviewType::Other(String::new())
    }
}

impl InterviewType {
    pub const KNOWN: [InterviewType; 4] = [
        InterviewType::Technical,
        InterviewType::Behavioral,
        InterviewType::SystemDesign,
        InterviewType::Hr,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            InterviewType::Technical => "TECHNICAL",
            InterviewType::Behavioral => "BEHAVIORAL",
            InterviewType::SystemDesign => "SYSTEM_DESIGN",
            InterviewType::Hr => "HR",
            InterviewType::Other(text) => text,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, InterviewType::Other(text) if text.trim().is_empty())
    }
}

impl From<String> for InterviewType {
    fn from(raw: String) -> Self {
        match normalize_enum_name(&raw).as_str() {
            "TECHNICAL" => InterviewType::Technical,
            "BEHAVIORAL" | "BEHAVIOURAL" => InterviewType::Behavioral,
            "SYSTEM_DESIGN" | "SYSTEMDESIGN" => InterviewType::SystemDesign,
            "HR" => InterviewType::Hr,
            _ => InterviewType::Other(raw),
        }
    }
}

impl From<&str> for InterviewType {
    fn from(raw: &str) -> Self {
        InterviewType::from(raw.to_string())
    }
}

impl From<InterviewType> for String {
    fn from(kind: InterviewType) -> Self {
        match kind {
            InterviewType::Other(text) => text,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for InterviewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobApplication {
    pub id: i64,
    pub company_name: String,
    pub job_title: String,
    #[serde(default)]
    pub status: ApplicationStatus,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub job_description: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub job_url: Option<String>,
    #[serde(deserialize_with = "dates::deserialize_calendar_date")]
    pub application_date: NaiveDate,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub resume_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub interviews: Vec<Interview>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interview {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub job_application_id: Option<i64>,
    pub round_number: u32,
    #[serde(deserialize_with = "dates::deserialize_timestamp")]
    pub interview_date: DateTime<Utc>,
    #[serde(default)]
    pub interview_type: InterviewType,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: InterviewStatus,
}

/// Body of `POST /applications` and `PUT /applications/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationPayload {
    pub company_name: String,
    pub job_title: String,
    pub status: ApplicationStatus,
    pub job_description: String,
    pub job_url: String,
    pub application_date: String,
    pub resume_url: Option<String>,
    pub interviews: Vec<InterviewPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_application_id: Option<i64>,
    pub round_number: u32,
    pub interview_date: String,
    pub interview_type: InterviewType,
    pub notes: String,
    pub status: InterviewStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Serialize)]
pub struct SignupRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

fn normalize_enum_name(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c.to_ascii_uppercase() })
        .collect()
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Interview>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Vec<Interview>> = Option::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}
