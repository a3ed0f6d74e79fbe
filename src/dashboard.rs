use tracing::{info, warn};

use crate::api::ApiClient;
use crate::error::ApiError;
use crate::form::{ApplicationForm, SubmitError};
use crate::models::JobApplication;

/// Blocking yes/no prompt shown before destructive actions.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Skip the prompt (`--yes`).
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

pub const DELETE_PROMPT: &str = "Are you sure you want to delete this application?";

/// A result plus the outcome of a secondary fetch that went with it.
#[derive(Debug)]
pub struct Loaded<T> {
    pub value: T,
    /// Set when the secondary fetch failed: `value` is partial, or the list
    /// was not refetched after a mutation.
    pub warning: Option<ApiError>,
}

/// Case-insensitive substring match on company name or job title. An empty
/// needle matches everything.
pub fn matches(app: &JobApplication, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    needle.is_empty()
        || app.company_name.to_lowercase().contains(&needle)
        || app.job_title.to_lowercase().contains(&needle)
}

/// The fetched collection plus the local filter and cursor.
#[derive(Debug, Default)]
pub struct ApplicationList {
    applications: Vec<JobApplication>,
    filter: String,
    selected: usize,
}

impl ApplicationList {
    pub fn new(applications: Vec<JobApplication>) -> Self {
        Self {
            applications,
            ..Self::default()
        }
    }

    pub fn all(&self) -> &[JobApplication] {
        &self.applications
    }

    /// Swap in a fresh fetch. The last fetch wins.
    pub fn replace(&mut self, applications: Vec<JobApplication>) {
        self.applications = applications;
        self.clamp_selection();
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: impl Into<String>) {
        self.filter = filter.into();
        self.clamp_selection();
    }

    pub fn filtered(&self) -> Vec<&JobApplication> {
        self.applications
            .iter()
            .filter(|app| matches(app, &self.filter))
            .collect()
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected(&self) -> Option<&JobApplication> {
        self.filtered().get(self.selected).copied()
    }

    pub fn next(&mut self) {
        let len = self.filtered().len();
        if len > 0 && self.selected < len - 1 {
            self.selected += 1;
        }
    }

    pub fn prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    fn clamp_selection(&mut self) {
        let len = self.filtered().len();
        self.selected = self.selected.min(len.saturating_sub(1));
    }
}

/// Attach the application's interviews. Failure to load them (other than an
/// expired session) still yields the application, with the error attached.
pub async fn with_interviews(api: &ApiClient, app: &JobApplication) -> Result<Loaded<JobApplication>, ApiError> {
    let mut value = app.clone();
    match api.list_interviews(app.id).await {
        Ok(interviews) => {
            value.interviews = interviews;
            Ok(Loaded { value, warning: None })
        }
        Err(ApiError::Unauthorized) => Err(ApiError::Unauthorized),
        Err(e) => {
            warn!(id = app.id, error = %e, "failed to fetch interview details");
            Ok(Loaded {
                value,
                warning: Some(e),
            })
        }
    }
}

/// The list view's data and actions, independent of how it is drawn.
pub struct Dashboard {
    api: ApiClient,
    pub list: ApplicationList,
}

impl Dashboard {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            list: ApplicationList::new(Vec::new()),
        }
    }

    /// Fetch the whole collection. On failure the previous list stays.
    pub async fn refresh(&mut self) -> Result<usize, ApiError> {
        let applications = self.api.list_applications().await?;
        let count = applications.len();
        self.list.replace(applications);
        info!(count, "applications fetched");
        Ok(count)
    }

    pub async fn view(&self, app: &JobApplication) -> Result<Loaded<JobApplication>, ApiError> {
        with_interviews(&self.api, app).await
    }

    pub async fn edit(&self, app: &JobApplication) -> Result<Loaded<ApplicationForm>, ApiError> {
        let loaded = with_interviews(&self.api, app).await?;
        Ok(Loaded {
            value: ApplicationForm::for_application(&loaded.value),
            warning: loaded.warning,
        })
    }

    /// Ask first; declining makes no call. `value` says whether the
    /// application was deleted. A successful delete is followed by a refetch.
    pub async fn delete(&mut self, id: i64, confirm: &dyn Confirm) -> Result<Loaded<bool>, ApiError> {
        if !confirm.confirm(DELETE_PROMPT) {
            return Ok(Loaded {
                value: false,
                warning: None,
            });
        }
        self.api.delete_application(id).await?;
        info!(id, "application deleted");
        let warning = match self.refresh().await {
            Ok(_) => None,
            Err(e) if e.is_unauthorized() => return Err(e),
            Err(e) => {
                warn!(error = %e, "refresh after delete failed");
                Some(e)
            }
        };
        Ok(Loaded { value: true, warning })
    }

    /// Submit the form, then refetch the list.
    pub async fn submit(&mut self, form: &ApplicationForm) -> Result<Loaded<JobApplication>, SubmitError> {
        let saved = form.submit(&self.api).await?;
        let warning = self.refresh().await.err();
        if let Some(e) = &warning {
            warn!(error = %e, "refresh after save failed");
        }
        Ok(Loaded { value: saved, warning })
    }
}
