mod api;
mod config;
mod dashboard;
mod dates;
mod detail;
mod error;
mod form;
mod guard;
mod models;
mod scope;
mod session;
#[cfg(test)]
mod testing;
mod tui;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::ApiClient;
use config::Config;
use dashboard::{AssumeYes, Confirm, Dashboard};
use error::ApiError;
use form::{ApplicationForm, InterviewUpdate, SubmitError};
use guard::{Access, Route};
use models::{ApplicationStatus, InterviewStatus, InterviewType};
use session::{FileTokenStore, Session};

#[derive(Parser)]
#[command(name = "applymate")]
#[command(about = "Track job applications and interviews")]
struct Cli {
    /// API base URL
    #[arg(long, global = true, env = "APPLYMATE_API_URL")]
    api_url: Option<String>,

    /// Config file (defaults to config.toml in the config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive dashboard
    Browse,

    /// Log in and store the session token
    Login {
        username: String,

        /// Read from stdin if omitted
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Create an account
    Signup {
        username: String,
        email: String,

        #[arg(short, long)]
        password: Option<String>,
    },

    /// Forget the stored session token
    Logout,

    /// List applications
    List {
        /// Case-insensitive match on company or position
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show an application with its interviews
    Show {
        /// Application ID
        id: i64,
    },

    /// Add an application
    Add {
        #[arg(long)]
        company: String,

        #[arg(long)]
        title: String,

        #[command(flatten)]
        fields: FieldArgs,

        /// TYPE@YYYY-MM-DDTHH:MM[@STATUS], repeatable
        #[arg(long = "interview", value_name = "SPEC")]
        interviews: Vec<String>,
    },

    /// Edit an application
    Edit {
        id: i64,

        #[arg(long)]
        company: Option<String>,

        #[arg(long)]
        title: Option<String>,

        #[command(flatten)]
        fields: FieldArgs,

        /// TYPE@YYYY-MM-DDTHH:MM[@STATUS], repeatable
        #[arg(long = "add-interview", value_name = "SPEC")]
        add_interviews: Vec<String>,

        /// Round number to drop, repeatable
        #[arg(long = "remove-interview", value_name = "N")]
        remove_interviews: Vec<usize>,
    },

    /// Delete an application
    Delete {
        id: i64,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Optional fields shared by `add` and `edit`.
#[derive(clap::Args)]
struct FieldArgs {
    /// APPLIED, INTERVIEW_SCHEDULED, TECHNICAL_INTERVIEW, FINAL_INTERVIEW,
    /// OFFER_RECEIVED, REJECTED or WITHDRAWN
    #[arg(long)]
    status: Option<ApplicationStatus>,

    #[arg(long)]
    url: Option<String>,

    #[arg(long)]
    description: Option<String>,

    /// YYYY-MM-DD
    #[arg(long)]
    date: Option<String>,

    /// .pdf, .doc or .docx
    #[arg(long)]
    resume: Option<PathBuf>,
}

impl FieldArgs {
    fn apply(self, form: &mut ApplicationForm) {
        if let Some(status) = self.status {
            form.status = status;
        }
        if let Some(url) = self.url {
            form.job_url = url;
        }
        if let Some(description) = self.description {
            form.job_description = description;
        }
        if let Some(date) = self.date {
            form.application_date = date;
        }
        if self.resume.is_some() {
            form.resume_file = self.resume;
        }
    }
}

/// Parsed `TYPE@YYYY-MM-DDTHH:MM[@STATUS]`.
#[derive(Debug, PartialEq)]
struct InterviewSpec {
    interview_type: InterviewType,
    date: String,
    status: InterviewStatus,
}

fn parse_interview_spec(raw: &str) -> Result<InterviewSpec> {
    let mut parts = raw.split('@');
    let (Some(kind), Some(date)) = (parts.next(), parts.next()) else {
        bail!("Invalid interview '{}': expected TYPE@YYYY-MM-DDTHH:MM[@STATUS]", raw);
    };
    let status = match parts.next() {
        Some(s) => s.parse::<InterviewStatus>().map_err(|e| anyhow!(e))?,
        None => InterviewStatus::Scheduled,
    };
    if parts.next().is_some() {
        bail!("Invalid interview '{}': too many '@' separators", raw);
    }
    if kind.trim().is_empty() {
        bail!("Invalid interview '{}': missing type", raw);
    }
    dates::parse_datetime_input(date.trim())
        .with_context(|| format!("Invalid interview date '{}': expected YYYY-MM-DDTHH:MM", date))?;

    Ok(InterviewSpec {
        interview_type: InterviewType::from(kind.trim()),
        date: date.trim().to_string(),
        status,
    })
}

fn push_interview(form: &mut ApplicationForm, spec: InterviewSpec) {
    form.add_interview();
    let index = form.interviews().len() - 1;
    form.update_interview(index, InterviewUpdate::Type(spec.interview_type));
    form.update_interview(index, InterviewUpdate::Date(spec.date));
    form.update_interview(index, InterviewUpdate::Status(spec.status));
}

struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{} [y/N] ", prompt);
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}

fn read_password(given: Option<String>) -> Result<String> {
    if let Some(password) = given {
        return Ok(password);
    }
    print!("Password: ");
    io::stdout().flush()?;
    let mut password = String::new();
    io::stdin()
        .lock()
        .read_line(&mut password)
        .context("Failed to read password from stdin")?;
    let password = password.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("Password is required");
    }
    Ok(password)
}

/// Apply the same access rule the dashboard uses before running a command.
fn require(route: Route, session: &Session) -> Result<()> {
    match route.guard().admit(session) {
        Access::Granted => Ok(()),
        Access::Redirect(Route::Login) => bail!("Not logged in. Run `applymate login <username>` first."),
        Access::Redirect(_) => bail!("Already logged in. Run `applymate logout` first."),
    }
}

fn api_failure(err: ApiError) -> anyhow::Error {
    if err.is_unauthorized() {
        anyhow!("Session expired. Run `applymate login <username>` again.")
    } else {
        anyhow!(err.user_message())
    }
}

fn submit_failure(err: SubmitError) -> anyhow::Error {
    if err.is_unauthorized() {
        anyhow!("Session expired. Run `applymate login <username>` again.")
    } else {
        anyhow!(err.user_message())
    }
}

/// Log to `applymate.log`; the terminal belongs to the dashboard.
fn init_logging(log_dir: &Path) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    let file_appender = tracing_appender::rolling::never(log_dir, "applymate.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("applymate=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref(), cli.api_url.as_deref())?;
    let _log_guard = init_logging(&config.log_dir)?;

    let store = FileTokenStore::new(&config.token_file);
    debug!(token_file = %store.path().display(), "token store");
    let session = Arc::new(Session::new(store));
    let api = ApiClient::new(&config.api_url, Arc::clone(&session)).context("Failed to build HTTP client")?;
    info!(api_url = api.base_url(), "starting");

    match cli.command.unwrap_or(Commands::Browse) {
        Commands::Browse => {
            tui::run_browse(api)?;
        }

        Commands::Login { username, password } => {
            require(Route::Login, &session)?;
            let password = read_password(password)?;
            match session.login(&api, &username, &password).await {
                Ok(user) => {
                    let name = user.map(|u| u.username).filter(|n| !n.is_empty()).unwrap_or(username);
                    println!("Logged in as {}", name);
                }
                Err(ApiError::Unauthorized | ApiError::Status { .. }) => bail!("Invalid username or password"),
                Err(e) => return Err(api_failure(e)),
            }
        }

        Commands::Signup { username, email, password } => {
            require(Route::Signup, &session)?;
            let password = read_password(password)?;
            session
                .signup(&api, &username, &email, &password)
                .await
                .map_err(|e| anyhow!("Signup failed: {}", e.user_message()))?;
            println!("Account created. Run `applymate login {}` to continue.", username);
        }

        Commands::Logout => {
            if session.is_authenticated() {
                session.logout().context("Failed to remove session token")?;
                println!("Logged out.");
            } else {
                println!("Not logged in.");
            }
        }

        Commands::List { search } => {
            require(Route::Dashboard, &session)?;
            let mut dashboard = Dashboard::new(api);
            dashboard.refresh().await.map_err(api_failure)?;
            if let Some(search) = search {
                dashboard.list.set_filter(search);
            }
            let applications = dashboard.list.filtered();
            if applications.is_empty() {
                println!("No applications found.");
            } else {
                println!("{:<6} {:<22} {:<30} {:<20} {:>12}", "ID", "COMPANY", "POSITION", "STATUS", "APPLIED");
                println!("{}", "-".repeat(94));
                for app in applications {
                    println!(
                        "{:<6} {:<22} {:<30} {:<20} {:>12}",
                        app.id,
                        truncate(&app.company_name, 20),
                        truncate(&app.job_title, 28),
                        app.status.label(),
                        dates::display_date(app.application_date)
                    );
                }
            }
        }

        Commands::Show { id } => {
            require(Route::Dashboard, &session)?;
            let mut dashboard = Dashboard::new(api);
            dashboard.refresh().await.map_err(api_failure)?;
            let app = find(&dashboard, id)?;
            let loaded = dashboard.view(&app).await.map_err(api_failure)?;
            if let Some(warning) = &loaded.warning {
                eprintln!("Warning: failed to fetch interview details: {}", warning.user_message());
            }
            println!("Application #{}", loaded.value.id);
            print!("{}", detail::to_plain(&detail::build(&loaded.value)));
        }

        Commands::Add { company, title, fields, interviews } => {
            require(Route::Dashboard, &session)?;
            let mut form = ApplicationForm::new(chrono::Utc::now().date_naive());
            form.company_name = company;
            form.job_title = title;
            fields.apply(&mut form);
            for raw in &interviews {
                push_interview(&mut form, parse_interview_spec(raw)?);
            }

            let mut dashboard = Dashboard::new(api);
            let saved = dashboard.submit(&form).await.map_err(submit_failure)?;
            println!("Added application #{}", saved.value.id);
            warn_stale(saved.warning.as_ref());
        }

        Commands::Edit {
            id,
            company,
            title,
            fields,
            add_interviews,
            mut remove_interviews,
        } => {
            require(Route::Dashboard, &session)?;
            let specs = add_interviews
                .iter()
                .map(|raw| parse_interview_spec(raw))
                .collect::<Result<Vec<_>>>()?;

            let mut dashboard = Dashboard::new(api);
            dashboard.refresh().await.map_err(api_failure)?;
            let app = find(&dashboard, id)?;
            let loaded = dashboard.edit(&app).await.map_err(api_failure)?;
            if let Some(warning) = &loaded.warning {
                bail!(
                    "Could not load existing interviews ({}); not saving to avoid dropping them",
                    warning.user_message()
                );
            }
            let mut form = loaded.value;

            if let Some(company) = company {
                form.company_name = company;
            }
            if let Some(title) = title {
                form.job_title = title;
            }
            fields.apply(&mut form);

            // Remove from the highest round down so positions stay valid.
            remove_interviews.sort_unstable();
            remove_interviews.dedup();
            for round in remove_interviews.into_iter().rev() {
                if round == 0 || !form.remove_interview(round - 1) {
                    bail!("Application #{} has no interview round {}", id, round);
                }
            }
            for spec in specs {
                push_interview(&mut form, spec);
            }

            let saved = dashboard.submit(&form).await.map_err(submit_failure)?;
            println!("Updated application #{}", id);
            warn_stale(saved.warning.as_ref());
        }

        Commands::Delete { id, yes } => {
            require(Route::Dashboard, &session)?;
            let mut dashboard = Dashboard::new(api);
            let confirm: &dyn Confirm = if yes { &AssumeYes } else { &StdinConfirm };
            let deleted = dashboard.delete(id, confirm).await.map_err(api_failure)?;
            if deleted.value {
                println!("Deleted application #{}", id);
                warn_stale(deleted.warning.as_ref());
            } else {
                println!("Cancelled.");
            }
        }
    }

    Ok(())
}

/// The mutation went through but the list could not be refetched.
fn warn_stale(warning: Option<&ApiError>) {
    if let Some(e) = warning {
        eprintln!("Warning: failed to fetch applications: {}", e.user_message());
    }
}

fn find(dashboard: &Dashboard, id: i64) -> Result<models::JobApplication> {
    dashboard
        .list
        .all()
        .iter()
        .find(|a| a.id == id)
        .cloned()
        .ok_or_else(|| anyhow!("Application #{} not found", id))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
