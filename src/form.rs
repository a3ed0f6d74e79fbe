use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, warn};

use crate::api::{resume_mime, ApiClient};
use crate::dates;
use crate::error::ApiError;
use crate::models::{
    ApplicationPayload, ApplicationStatus, InterviewPayload, InterviewStatus, InterviewType,
    JobApplication,
};

#[derive(Debug, Error, PartialEq)]
pub enum FormError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("application date '{0}' is not a YYYY-MM-DD date")]
    InvalidDate(String),
    #[error("interview {round} needs a date and time (YYYY-MM-DDTHH:MM), got '{value}'")]
    InvalidInterviewDate { round: usize, value: String },
    #[error("resume must be a .pdf, .doc or .docx file: {0}")]
    UnsupportedResume(String),
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] FormError),
    #[error("failed to upload resume: {0}")]
    Upload(#[source] ApiError),
    #[error("failed to save application: {0}")]
    Save(#[source] ApiError),
}

impl SubmitError {
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            SubmitError::Invalid(_) => None,
            SubmitError::Upload(e) | SubmitError::Save(e) => Some(e),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.api_error().is_some_and(ApiError::is_unauthorized)
    }

    pub fn user_message(&self) -> String {
        match self {
            SubmitError::Invalid(e) => e.to_string(),
            SubmitError::Upload(_) => "Failed to upload resume. Please try again.".to_string(),
            SubmitError::Save(e) => e.user_message(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit { id: i64 },
}

/// One interview row as edited. `date` holds the minute-precision text
/// value; `round_number` is only what the row was created with, the
/// submitted number always comes from position.
#[derive(Debug, Clone, PartialEq)]
pub struct InterviewDraft {
    pub round_number: u32,
    pub interview_type: InterviewType,
    pub date: String,
    pub notes: String,
    pub status: InterviewStatus,
}

impl InterviewDraft {
    fn blank(round_number: u32) -> Self {
        Self {
            round_number,
            interview_type: InterviewType::default(),
            date: String::new(),
            notes: String::new(),
            status: InterviewStatus::Scheduled,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InterviewUpdate {
    Type(InterviewType),
    Date(String),
    Notes(String),
    Status(InterviewStatus),
}

#[derive(Debug, Clone)]
pub struct ApplicationForm {
    pub mode: FormMode,
    pub company_name: String,
    pub job_title: String,
    pub status: ApplicationStatus,
    pub job_description: String,
    pub job_url: String,
    /// `YYYY-MM-DD`
    pub application_date: String,
    /// Reference kept from an earlier upload, sent unchanged unless a new
    /// file is attached.
    pub resume_url: Option<String>,
    pub resume_file: Option<PathBuf>,
    interviews: Arc<Vec<InterviewDraft>>,
}

impl ApplicationForm {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            mode: FormMode::Create,
            company_name: String::new(),
            job_title: String::new(),
            status: ApplicationStatus::Applied,
            job_description: String::new(),
            job_url: String::new(),
            application_date: dates::date_input(today),
            resume_url: None,
            resume_file: None,
            interviews: Arc::new(Vec::new()),
        }
    }

    /// Pre-populated edit form. Interviews are taken in round order.
    pub fn for_application(app: &JobApplication) -> Self {
        let mut interviews = app.interviews.clone();
        interviews.sort_by_key(|i| i.round_number);
        let drafts = interviews
            .into_iter()
            .map(|i| InterviewDraft {
                round_number: i.round_number,
                interview_type: i.interview_type,
                date: dates::datetime_input(&i.interview_date),
                notes: i.notes.unwrap_or_default(),
                status: i.status,
            })
            .collect();

        Self {
            mode: FormMode::Edit { id: app.id },
            company_name: app.company_name.clone(),
            job_title: app.job_title.clone(),
            status: app.status,
            job_description: app.job_description.clone().unwrap_or_default(),
            job_url: app.job_url.clone().unwrap_or_default(),
            application_date: dates::date_input(app.application_date),
            resume_url: app.resume_url.clone(),
            resume_file: None,
            interviews: Arc::new(drafts),
        }
    }

    /// The current interview sequence. Every change produces a new sequence,
    /// so a caller holding an old `Arc` keeps seeing the old rows.
    pub fn interviews(&self) -> &Arc<Vec<InterviewDraft>> {
        &self.interviews
    }

    pub fn add_interview(&mut self) {
        let mut next = Vec::with_capacity(self.interviews.len() + 1);
        next.extend(self.interviews.iter().cloned());
        next.push(InterviewDraft::blank(self.interviews.len() as u32 + 1));
        self.interviews = Arc::new(next);
    }

    /// Returns false when `index` is out of range.
    pub fn remove_interview(&mut self, index: usize) -> bool {
        if index >= self.interviews.len() {
            return false;
        }
        let next = self
            .interviews
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, draft)| draft.clone())
            .collect();
        self.interviews = Arc::new(next);
        true
    }

    /// Returns false when `index` is out of range.
    pub fn update_interview(&mut self, index: usize, update: InterviewUpdate) -> bool {
        if index >= self.interviews.len() {
            return false;
        }
        let next = self
            .interviews
            .iter()
            .enumerate()
            .map(|(i, draft)| {
                if i != index {
                    return draft.clone();
                }
                let mut draft = draft.clone();
                match &update {
                    InterviewUpdate::Type(kind) => draft.interview_type = kind.clone(),
                    InterviewUpdate::Date(date) => draft.date = date.clone(),
                    InterviewUpdate::Notes(notes) => draft.notes = notes.clone(),
                    InterviewUpdate::Status(status) => draft.status = *status,
                }
                draft
            })
            .collect();
        self.interviews = Arc::new(next);
        true
    }

    pub fn validate(&self) -> Result<(), FormError> {
        self.to_payload(self.resume_url.clone()).map(|_| ())?;
        if let Some(path) = &self.resume_file {
            if resume_mime(path).is_none() {
                return Err(FormError::UnsupportedResume(path.display().to_string()));
            }
        }
        Ok(())
    }

    /// Build the wire payload. Round numbers are assigned from position here
    /// and nowhere else.
    pub fn to_payload(&self, resume_url: Option<String>) -> Result<ApplicationPayload, FormError> {
        if self.company_name.trim().is_empty() {
            return Err(FormError::MissingField("company name"));
        }
        if self.job_title.trim().is_empty() {
            return Err(FormError::MissingField("job title"));
        }
        if self.application_date.trim().is_empty() {
            return Err(FormError::MissingField("application date"));
        }
        let application_date = NaiveDate::parse_from_str(
            self.application_date.trim(),
            dates::DATE_INPUT_FORMAT,
        )
        .map_err(|_| FormError::InvalidDate(self.application_date.clone()))?;

        let job_application_id = match self.mode {
            FormMode::Create => None,
            FormMode::Edit { id } => Some(id),
        };

        let interviews = self
            .interviews
            .iter()
            .enumerate()
            .map(|(index, draft)| {
                let when = dates::parse_datetime_input(&draft.date).ok_or_else(|| {
                    FormError::InvalidInterviewDate {
                        round: index + 1,
                        value: draft.date.clone(),
                    }
                })?;
                Ok(InterviewPayload {
                    job_application_id,
                    round_number: index as u32 + 1,
                    interview_date: dates::timestamp_to_wire(&when),
                    interview_type: draft.interview_type.clone(),
                    notes: draft.notes.clone(),
                    status: draft.status,
                })
            })
            .collect::<Result<Vec<_>, FormError>>()?;

        Ok(ApplicationPayload {
            company_name: self.company_name.trim().to_string(),
            job_title: self.job_title.trim().to_string(),
            status: self.status,
            job_description: self.job_description.clone(),
            job_url: self.job_url.trim().to_string(),
            application_date: dates::date_to_wire(application_date),
            resume_url,
            interviews,
        })
    }

    /// Validate, upload the attached resume if any, then create or update.
    /// The form itself is never modified, so a failure can simply be retried.
    pub async fn submit(&self, api: &ApiClient) -> Result<JobApplication, SubmitError> {
        self.validate()?;

        let resume_url = match &self.resume_file {
            Some(path) => {
                let reference = api.upload_resume(path).await.map_err(|e| {
                    warn!(error = %e, path = %path.display(), "resume upload failed");
                    SubmitError::Upload(e)
                })?;
                info!(reference = %reference, "resume uploaded");
                Some(reference)
            }
            None => self.resume_url.clone(),
        };

        let payload = self.to_payload(resume_url)?;
        let saved = match self.mode {
            FormMode::Create => api.create_application(&payload).await,
            FormMode::Edit { id } => api.update_application(id, &payload).await,
        }
        .map_err(SubmitError::Save)?;

        info!(id = saved.id, interviews = payload.interviews.len(), "application saved");
        Ok(saved)
    }
}

// --- Lifecycle ---

/// Where the form dialog is. There is no partial-save state: a failed submit
/// returns to `Open` with every field kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormPhase {
    #[default]
    Closed,
    /// Edit requested; interviews for `id` are being fetched.
    Prefetching { id: i64 },
    Open(FormMode),
    Submitting(FormMode),
}

impl FormPhase {
    pub fn is_closed(&self) -> bool {
        matches!(self, FormPhase::Closed)
    }

    pub fn open_create(&mut self) -> bool {
        self.transition(|phase| matches!(phase, FormPhase::Closed).then_some(FormPhase::Open(FormMode::Create)))
    }

    pub fn begin_prefetch(&mut self, id: i64) -> bool {
        self.transition(|phase| matches!(phase, FormPhase::Closed).then_some(FormPhase::Prefetching { id }))
    }

    /// Prefetch finished, successfully or not; the form opens either way.
    pub fn prefetched(&mut self, id: i64) -> bool {
        self.transition(|phase| match phase {
            FormPhase::Prefetching { id: pending } if pending == id => {
                Some(FormPhase::Open(FormMode::Edit { id }))
            }
            _ => None,
        })
    }

    pub fn begin_submit(&mut self) -> bool {
        self.transition(|phase| match phase {
            FormPhase::Open(mode) => Some(FormPhase::Submitting(mode)),
            _ => None,
        })
    }

    pub fn submit_failed(&mut self) -> bool {
        self.transition(|phase| match phase {
            FormPhase::Submitting(mode) => Some(FormPhase::Open(mode)),
            _ => None,
        })
    }

    pub fn submit_succeeded(&mut self) -> bool {
        self.transition(|phase| matches!(phase, FormPhase::Submitting(_)).then_some(FormPhase::Closed))
    }

    /// Cancel from anywhere except mid-submit.
    pub fn close(&mut self) -> bool {
        self.transition(|phase| match phase {
            FormPhase::Submitting(_) => None,
            _ => Some(FormPhase::Closed),
        })
    }

    fn transition(&mut self, next: impl FnOnce(FormPhase) -> Option<FormPhase>) -> bool {
        match next(*self) {
            Some(phase) => {
                *self = phase;
                true
            }
            None => false,
        }
    }
}
