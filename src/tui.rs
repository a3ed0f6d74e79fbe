mod draw;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::prelude::*;
use std::io::stdout;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::dashboard::{with_interviews, ApplicationList, Loaded};
use crate::error::ApiError;
use crate::form::{ApplicationForm, FormMode, FormPhase, InterviewUpdate, SubmitError};
use crate::guard::{self, Route};
use crate::models::{InterviewType, JobApplication, User};
use crate::scope::{ScopeId, Scoped, ViewScope};
use crate::session::{AuthState, Session};

const TOAST_TTL: Duration = Duration::from_secs(4);

// --- Messages from background tasks ---

enum Msg {
    Applications(Result<Vec<JobApplication>, ApiError>),
    Detail(Result<Loaded<JobApplication>, ApiError>),
    EditLoaded(i64, Result<Loaded<ApplicationForm>, ApiError>),
    Submitted(FormMode, Result<JobApplication, SubmitError>),
    Deleted(i64, Result<(), ApiError>),
    LoggedIn(Result<Option<User>, ApiError>),
    SignedUp(Result<(), ApiError>),
}

// --- Toasts ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToastLevel {
    Success,
    Error,
    Info,
}

struct Toast {
    level: ToastLevel,
    message: String,
    shown_at: Instant,
}

// --- Public screens ---

#[derive(Default)]
struct AuthForm {
    username: String,
    email: String,
    password: String,
    focus: usize,
    error: Option<String>,
    busy: bool,
}

impl AuthForm {
    fn field_count(signup: bool) -> usize {
        if signup { 3 } else { 2 }
    }

    fn focused_mut(&mut self, signup: bool) -> &mut String {
        match (signup, self.focus) {
            (_, 0) => &mut self.username,
            (true, 1) => &mut self.email,
            _ => &mut self.password,
        }
    }
}

// --- Form editor ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterviewField {
    Type,
    Date,
    Status,
    Notes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormField {
    Company,
    Title,
    Status,
    Url,
    Date,
    Description,
    Resume,
    Interview(usize, InterviewField),
}

impl FormField {
    fn label(&self) -> &'static str {
        match self {
            FormField::Company => "Company",
            FormField::Title => "Position",
            FormField::Status => "Status",
            FormField::Url => "Job URL",
            FormField::Date => "Application Date",
            FormField::Description => "Job Description",
            FormField::Resume => "Resume file",
            FormField::Interview(_, InterviewField::Type) => "Type",
            FormField::Interview(_, InterviewField::Date) => "Date",
            FormField::Interview(_, InterviewField::Status) => "Status",
            FormField::Interview(_, InterviewField::Notes) => "Notes",
        }
    }
}

struct FormEditor {
    form: ApplicationForm,
    phase: FormPhase,
    resume_input: String,
    /// Interview type text as typed, one per row. Parsed on every edit but
    /// never rewritten from the parsed value.
    type_inputs: Vec<String>,
    focus: usize,
    error: Option<String>,
    scope: ViewScope,
}

enum EditorAction {
    None,
    Submit,
    Cancel,
}

impl FormEditor {
    fn new(form: ApplicationForm, phase: FormPhase) -> Self {
        Self {
            type_inputs: type_inputs(&form),
            form,
            phase,
            resume_input: String::new(),
            focus: 0,
            error: None,
            scope: ViewScope::new(),
        }
    }

    fn load(&mut self, form: ApplicationForm) {
        self.type_inputs = type_inputs(&form);
        self.form = form;
    }

    fn fields(&self) -> Vec<FormField> {
        let mut fields = vec![
            FormField::Company,
            FormField::Title,
            FormField::Status,
            FormField::Url,
            FormField::Date,
            FormField::Description,
            FormField::Resume,
        ];
        for i in 0..self.form.interviews().len() {
            fields.extend([
                FormField::Interview(i, InterviewField::Type),
                FormField::Interview(i, InterviewField::Date),
                FormField::Interview(i, InterviewField::Status),
                FormField::Interview(i, InterviewField::Notes),
            ]);
        }
        fields
    }

    fn focused(&self) -> FormField {
        let fields = self.fields();
        fields[self.focus.min(fields.len() - 1)]
    }

    fn value(&self, field: FormField) -> String {
        match field {
            FormField::Company => self.form.company_name.clone(),
            FormField::Title => self.form.job_title.clone(),
            FormField::Status => self.form.status.label().to_string(),
            FormField::Url => self.form.job_url.clone(),
            FormField::Date => self.form.application_date.clone(),
            FormField::Description => self.form.job_description.clone(),
            FormField::Resume => self.resume_input.clone(),
            FormField::Interview(i, kind) => {
                let Some(row) = self.form.interviews().get(i) else {
                    return String::new();
                };
                match kind {
                    InterviewField::Type => self.type_inputs.get(i).cloned().unwrap_or_default(),
                    InterviewField::Date => row.date.clone(),
                    InterviewField::Status => row.status.as_str().to_string(),
                    InterviewField::Notes => row.notes.clone(),
                }
            }
        }
    }

    fn set_text(&mut self, field: FormField, text: String) {
        match field {
            FormField::Company => self.form.company_name = text,
            FormField::Title => self.form.job_title = text,
            FormField::Url => self.form.job_url = text,
            FormField::Date => self.form.application_date = text,
            FormField::Description => self.form.job_description = text,
            FormField::Resume => {
                self.form.resume_file = (!text.trim().is_empty()).then(|| PathBuf::from(text.trim()));
                self.resume_input = text;
            }
            FormField::Interview(i, InterviewField::Type) => {
                if self.form.update_interview(i, InterviewUpdate::Type(InterviewType::from(text.as_str()))) {
                    self.type_inputs[i] = text;
                }
            }
            FormField::Interview(i, InterviewField::Date) => {
                self.form.update_interview(i, InterviewUpdate::Date(text));
            }
            FormField::Interview(i, InterviewField::Notes) => {
                self.form.update_interview(i, InterviewUpdate::Notes(text));
            }
            FormField::Status | FormField::Interview(_, InterviewField::Status) => {}
        }
    }

    fn cycle(&mut self, field: FormField) {
        match field {
            FormField::Status => self.form.status = self.form.status.cycle(),
            FormField::Interview(i, InterviewField::Status) => {
                if let Some(row) = self.form.interviews().get(i) {
                    let next = row.status.cycle();
                    self.form.update_interview(i, InterviewUpdate::Status(next));
                }
            }
            FormField::Interview(i, InterviewField::Type) => {
                if let Some(row) = self.form.interviews().get(i) {
                    let known = &InterviewType::KNOWN;
                    let next = match known.iter().position(|k| *k == row.interview_type) {
                        Some(pos) => known[(pos + 1) % known.len()].clone(),
                        None => known[0].clone(),
                    };
                    self.type_inputs[i] = next.as_str().to_string();
                    self.form.update_interview(i, InterviewUpdate::Type(next));
                }
            }
            _ => {}
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> EditorAction {
        if !matches!(self.phase, FormPhase::Open(_)) {
            return match key.code {
                KeyCode::Esc if !matches!(self.phase, FormPhase::Submitting(_)) => EditorAction::Cancel,
                _ => EditorAction::None,
            };
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let field = self.focused();
        match key.code {
            KeyCode::Esc => return EditorAction::Cancel,
            KeyCode::Char('s') if ctrl => return EditorAction::Submit,
            KeyCode::Char('a') if ctrl => {
                self.form.add_interview();
                self.type_inputs.push(String::new());
                let last = self.form.interviews().len() - 1;
                self.focus_on(FormField::Interview(last, InterviewField::Type));
            }
            KeyCode::Char('d') if ctrl => {
                if let FormField::Interview(i, _) = field {
                    if self.form.remove_interview(i) {
                        self.type_inputs.remove(i);
                    }
                    self.focus = self.focus.min(self.fields().len() - 1);
                }
            }
            KeyCode::Tab | KeyCode::Down => self.focus = (self.focus + 1) % self.fields().len(),
            KeyCode::BackTab | KeyCode::Up => {
                let len = self.fields().len();
                self.focus = (self.focus + len - 1) % len;
            }
            KeyCode::Char(' ') | KeyCode::Enter
                if matches!(
                    field,
                    FormField::Status | FormField::Interview(_, InterviewField::Status)
                ) =>
            {
                self.cycle(field)
            }
            KeyCode::Enter if matches!(field, FormField::Interview(_, InterviewField::Type)) => self.cycle(field),
            KeyCode::Char(c) if !ctrl => {
                let mut text = self.value(field);
                text.push(c);
                self.set_text(field, text);
            }
            KeyCode::Backspace => {
                let mut text = self.value(field);
                text.pop();
                self.set_text(field, text);
            }
            _ => {}
        }
        EditorAction::None
    }

    fn focus_on(&mut self, target: FormField) {
        if let Some(pos) = self.fields().iter().position(|f| *f == target) {
            self.focus = pos;
        }
    }
}

fn type_inputs(form: &ApplicationForm) -> Vec<String> {
    form.interviews()
        .iter()
        .map(|row| row.interview_type.as_str().to_string())
        .collect()
}

// --- Overlays on the dashboard ---

struct DetailView {
    application: JobApplication,
    loading: bool,
    scroll: u16,
    scope: ViewScope,
}

enum Overlay {
    None,
    Detail(DetailView),
    Form(FormEditor),
    ConfirmDelete { id: i64, company: String },
}

// --- App ---

struct App {
    api: ApiClient,
    session: Arc<Session>,
    auth_rx: watch::Receiver<AuthState>,
    route: Route,
    auth_form: AuthForm,
    auth_scope: ViewScope,
    list: ApplicationList,
    loading: bool,
    searching: bool,
    dashboard_scope: ViewScope,
    overlay: Overlay,
    toasts: Vec<Toast>,
    tx: mpsc::UnboundedSender<Scoped<Msg>>,
    rx: mpsc::UnboundedReceiver<Scoped<Msg>>,
    quit: bool,
}

impl App {
    fn new(api: ApiClient) -> Self {
        let session = Arc::clone(api.session());
        let auth_rx = session.subscribe();
        debug!(state = ?session.state(), "dashboard starting");
        let (tx, rx) = mpsc::unbounded_channel();
        let mut app = Self {
            api,
            session,
            auth_rx,
            route: Route::Login,
            auth_form: AuthForm::default(),
            auth_scope: ViewScope::new(),
            list: ApplicationList::default(),
            loading: false,
            searching: false,
            dashboard_scope: ViewScope::new(),
            overlay: Overlay::None,
            toasts: Vec::new(),
            tx,
            rx,
            quit: false,
        };
        app.navigate(Route::Dashboard.path());
        app
    }

    fn navigate(&mut self, path: &str) {
        let route = guard::navigate(path, &self.session);
        debug!(requested = path, route = %route, "navigate");

        // Leaving a view abandons whatever it had in flight.
        self.auth_scope = ViewScope::new();
        self.dashboard_scope = ViewScope::new();
        self.overlay = Overlay::None;
        self.searching = false;
        self.auth_form = AuthForm::default();
        self.route = route;

        if route == Route::Dashboard {
            self.list = ApplicationList::default();
            self.refresh();
        }
    }

    fn toast(&mut self, level: ToastLevel, message: impl Into<String>) {
        self.toasts.push(Toast {
            level,
            message: message.into(),
            shown_at: Instant::now(),
        });
    }

    /// React to session changes made anywhere, including a 401 seen by a
    /// background task.
    fn sync_auth(&mut self) {
        if !self.auth_rx.has_changed().unwrap_or(false) {
            return;
        }
        let state = *self.auth_rx.borrow_and_update();
        match state {
            AuthState::Expired => {
                info!("session expired, returning to login");
                self.navigate(Route::Login.path());
                self.toast(ToastLevel::Error, "Session expired. Please log in again.");
            }
            AuthState::SignedOut => {
                self.navigate(Route::Login.path());
                self.toast(ToastLevel::Info, "Logged out");
            }
            AuthState::SignedIn => self.navigate(Route::Dashboard.path()),
        }
    }

    /// Shared handling for failed calls. An expired session is dealt with by
    /// `sync_auth`; this only has to make sure we do not stay on a protected
    /// view.
    fn api_failed(&mut self, err: &ApiError, what: &str) {
        if err.is_unauthorized() {
            self.navigate(self.route.path());
            return;
        }
        self.toast(ToastLevel::Error, format!("{}: {}", what, err.user_message()));
    }

    fn refresh(&mut self) {
        self.loading = true;
        let api = self.api.clone();
        self.dashboard_scope
            .spawn(&self.tx, async move { Msg::Applications(api.list_applications().await) });
    }

    fn open_detail(&mut self, application: JobApplication) {
        let view = DetailView {
            application: application.clone(),
            loading: true,
            scroll: 0,
            scope: ViewScope::new(),
        };
        let api = self.api.clone();
        view.scope.spawn(&self.tx, async move {
            Msg::Detail(with_interviews(&api, &application).await)
        });
        self.overlay = Overlay::Detail(view);
    }

    fn open_create(&mut self) {
        let mut phase = FormPhase::Closed;
        phase.open_create();
        let today = chrono::Utc::now().date_naive();
        self.overlay = Overlay::Form(FormEditor::new(ApplicationForm::new(today), phase));
    }

    fn open_edit(&mut self, application: JobApplication) {
        let id = application.id;
        let mut phase = FormPhase::Closed;
        phase.begin_prefetch(id);
        let editor = FormEditor::new(ApplicationForm::for_application(&application), phase);
        let api = self.api.clone();
        editor.scope.spawn(&self.tx, async move {
            let result = with_interviews(&api, &application).await.map(|loaded| Loaded {
                value: ApplicationForm::for_application(&loaded.value),
                warning: loaded.warning,
            });
            Msg::EditLoaded(id, result)
        });
        self.overlay = Overlay::Form(editor);
    }

    fn submit_form(&mut self) {
        let Overlay::Form(editor) = &mut self.overlay else { return };
        let FormPhase::Open(mode) = editor.phase else { return };
        if let Err(e) = editor.form.validate() {
            editor.error = Some(e.to_string());
            return;
        }
        editor.phase.begin_submit();
        editor.error = None;
        let form = editor.form.clone();
        let api = self.api.clone();
        editor.scope.spawn(&self.tx, async move {
            Msg::Submitted(mode, form.submit(&api).await)
        });
    }

    fn delete(&mut self, id: i64) {
        let api = self.api.clone();
        self.dashboard_scope
            .spawn(&self.tx, async move { Msg::Deleted(id, api.delete_application(id).await) });
    }

    fn owns(&self, scope: ScopeId) -> bool {
        scope == self.dashboard_scope.id()
            || scope == self.auth_scope.id()
            || match &self.overlay {
                Overlay::Detail(view) => scope == view.scope.id(),
                Overlay::Form(editor) => scope == editor.scope.id(),
                _ => false,
            }
    }

    fn handle_message(&mut self, scoped: Scoped<Msg>) {
        if !self.owns(scoped.scope) {
            debug!("dropping result for a closed view");
            return;
        }
        match scoped.message {
            Msg::Applications(result) => {
                self.loading = false;
                match result {
                    Ok(applications) => self.list.replace(applications),
                    Err(e) => self.api_failed(&e, "Failed to fetch applications"),
                }
            }
            Msg::Detail(result) => match result {
                Ok(loaded) => {
                    if let Overlay::Detail(view) = &mut self.overlay {
                        view.application = loaded.value;
                        view.loading = false;
                    }
                    if let Some(e) = loaded.warning {
                        self.toast(ToastLevel::Error, format!("Failed to fetch interview details: {}", e.user_message()));
                    }
                }
                Err(e) => self.api_failed(&e, "Failed to fetch interview details"),
            },
            Msg::EditLoaded(id, result) => match result {
                Ok(loaded) => {
                    if let Overlay::Form(editor) = &mut self.overlay {
                        editor.load(loaded.value);
                        editor.phase.prefetched(id);
                    }
                    if let Some(e) = loaded.warning {
                        self.toast(ToastLevel::Error, format!("Failed to fetch interview details: {}", e.user_message()));
                    }
                }
                Err(e) => self.api_failed(&e, "Failed to fetch interview details"),
            },
            Msg::Submitted(mode, result) => match result {
                Ok(saved) => {
                    if let Overlay::Form(editor) = &mut self.overlay {
                        editor.phase.submit_succeeded();
                        if editor.phase.is_closed() {
                            self.overlay = Overlay::None;
                        }
                    }
                    let message = match mode {
                        FormMode::Create => "Application added successfully",
                        FormMode::Edit { .. } => "Application updated successfully",
                    };
                    info!(id = saved.id, "application saved");
                    self.toast(ToastLevel::Success, message);
                    self.refresh();
                }
                Err(e) if e.is_unauthorized() => self.navigate(self.route.path()),
                Err(e) => {
                    let message = e.user_message();
                    if let Overlay::Form(editor) = &mut self.overlay {
                        editor.phase.submit_failed();
                        editor.error = Some(message.clone());
                    }
                    self.toast(ToastLevel::Error, message);
                }
            },
            Msg::Deleted(id, result) => match result {
                Ok(()) => {
                    info!(id, "application deleted");
                    self.toast(ToastLevel::Success, "Application deleted successfully");
                    self.refresh();
                }
                Err(e) => self.api_failed(&e, "Failed to delete application"),
            },
            Msg::LoggedIn(result) => {
                self.auth_form.busy = false;
                if let Err(e) = result {
                    self.auth_form.error = Some(match e {
                        ApiError::Unauthorized | ApiError::Status { .. } => "Invalid username or password".to_string(),
                        other => other.to_string(),
                    });
                }
                // Success is picked up by `sync_auth`.
            }
            Msg::SignedUp(result) => {
                self.auth_form.busy = false;
                match result {
                    Ok(()) => {
                        self.navigate(Route::Login.path());
                        self.toast(ToastLevel::Success, "Account created. Please log in.");
                    }
                    Err(e) => self.auth_form.error = Some(format!("Signup failed: {}", e.user_message())),
                }
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        match self.route {
            Route::Login | Route::Signup => self.handle_auth_key(key),
            Route::Dashboard => self.handle_dashboard_key(key),
        }
    }

    fn handle_auth_key(&mut self, key: KeyEvent) {
        let signup = self.route == Route::Signup;
        let count = AuthForm::field_count(signup);
        if self.auth_form.busy {
            if key.code == KeyCode::Esc {
                self.quit = true;
            }
            return;
        }
        match key.code {
            KeyCode::Esc => self.quit = true,
            KeyCode::Char('n') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                let target = if signup { Route::Login } else { Route::Signup };
                self.navigate(target.path());
            }
            KeyCode::Tab | KeyCode::Down => self.auth_form.focus = (self.auth_form.focus + 1) % count,
            KeyCode::BackTab | KeyCode::Up => self.auth_form.focus = (self.auth_form.focus + count - 1) % count,
            KeyCode::Backspace => {
                self.auth_form.focused_mut(signup).pop();
            }
            KeyCode::Char(c) => self.auth_form.focused_mut(signup).push(c),
            KeyCode::Enter => self.submit_auth(signup),
            _ => {}
        }
    }

    fn submit_auth(&mut self, signup: bool) {
        let form = &mut self.auth_form;
        if form.username.trim().is_empty() || form.password.is_empty() || (signup && form.email.trim().is_empty()) {
            form.error = Some("All fields are required".to_string());
            return;
        }
        form.busy = true;
        form.error = None;

        let api = self.api.clone();
        let session = Arc::clone(&self.session);
        let username = form.username.trim().to_string();
        let password = form.password.clone();
        if signup {
            let email = form.email.trim().to_string();
            self.auth_scope.spawn(&self.tx, async move {
                Msg::SignedUp(session.signup(&api, &username, &email, &password).await)
            });
        } else {
            self.auth_scope.spawn(&self.tx, async move {
                Msg::LoggedIn(session.login(&api, &username, &password).await)
            });
        }
    }

    fn handle_dashboard_key(&mut self, key: KeyEvent) {
        match &mut self.overlay {
            Overlay::Form(editor) => {
                match editor.handle_key(key) {
                    EditorAction::Submit => self.submit_form(),
                    EditorAction::Cancel => {
                        editor.phase.close();
                        self.overlay = Overlay::None;
                    }
                    EditorAction::None => {}
                }
                return;
            }
            Overlay::Detail(view) => {
                match key.code {
                    KeyCode::Esc | KeyCode::Char('q') | KeyCode::Enter => self.overlay = Overlay::None,
                    KeyCode::Down | KeyCode::Char('j') => view.scroll = view.scroll.saturating_add(1),
                    KeyCode::Up | KeyCode::Char('k') => view.scroll = view.scroll.saturating_sub(1),
                    KeyCode::PageDown | KeyCode::Char('J') => view.scroll = view.scroll.saturating_add(10),
                    KeyCode::PageUp | KeyCode::Char('K') => view.scroll = view.scroll.saturating_sub(10),
                    _ => {}
                }
                return;
            }
            Overlay::ConfirmDelete { id, .. } => {
                let id = *id;
                match key.code {
                    KeyCode::Char('y') | KeyCode::Char('Y') => {
                        self.overlay = Overlay::None;
                        self.delete(id);
                    }
                    KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => self.overlay = Overlay::None,
                    _ => {}
                }
                return;
            }
            Overlay::None => {}
        }

        if self.searching {
            match key.code {
                KeyCode::Esc => {
                    self.searching = false;
                    self.list.set_filter("");
                }
                KeyCode::Enter => self.searching = false,
                KeyCode::Backspace => {
                    let mut filter = self.list.filter().to_string();
                    filter.pop();
                    self.list.set_filter(filter);
                }
                KeyCode::Char(c) => {
                    let mut filter = self.list.filter().to_string();
                    filter.push(c);
                    self.list.set_filter(filter);
                }
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.quit = true,
            KeyCode::Down | KeyCode::Char('j') => self.list.next(),
            KeyCode::Up | KeyCode::Char('k') => self.list.prev(),
            KeyCode::Char('/') => self.searching = true,
            KeyCode::Char('r') => self.refresh(),
            KeyCode::Char('a') => self.open_create(),
            KeyCode::Char('v') | KeyCode::Enter => {
                if let Some(app) = self.list.selected().cloned() {
                    self.open_detail(app);
                }
            }
            KeyCode::Char('e') => {
                if let Some(app) = self.list.selected().cloned() {
                    self.open_edit(app);
                }
            }
            KeyCode::Char('d') => {
                if let Some(app) = self.list.selected() {
                    self.overlay = Overlay::ConfirmDelete {
                        id: app.id,
                        company: app.company_name.clone(),
                    };
                }
            }
            KeyCode::Char('L') => {
                if let Err(e) = self.session.logout() {
                    self.toast(ToastLevel::Error, format!("Logout failed: {}", e));
                }
            }
            _ => {}
        }
    }

    fn expire_toasts(&mut self) {
        self.toasts.retain(|t| t.shown_at.elapsed() < TOAST_TTL);
    }
}

pub fn run_browse(api: ApiClient) -> Result<()> {
    let mut app = App::new(api);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, app: &mut App) -> Result<()> {
    while !app.quit {
        terminal.draw(|frame| draw::draw(frame, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }

        while let Ok(scoped) = app.rx.try_recv() {
            app.handle_message(scoped);
        }
        app.sync_auth();
        app.expire_toasts();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, application_json};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    async fn pump(app: &mut App) {
        for _ in 0..50 {
            while let Ok(scoped) = app.rx.try_recv() {
                app.handle_message(scoped);
            }
            app.sync_auth();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_starts_on_login_without_token() {
        let server = MockServer::start().await;
        let app = App::new(testing::client(&server.uri(), None));
        assert_eq!(app.route, Route::Login);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dashboard_loads_and_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/applications"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                application_json(1, "Acme", "Engineer"),
                application_json(2, "Globex", "Designer"),
            ])))
            .mount(&server)
            .await;

        let mut app = App::new(testing::client(&server.uri(), Some("t")));
        assert_eq!(app.route, Route::Dashboard);
        pump(&mut app).await;
        assert_eq!(app.list.all().len(), 2);

        app.handle_key(key(KeyCode::Char('/')));
        for c in "ACME".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        assert_eq!(app.list.filtered().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unauthorized_fetch_redirects_to_login_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let mut app = App::new(testing::client(&server.uri(), Some("stale")));
        pump(&mut app).await;
        assert_eq!(app.route, Route::Login);
        assert_eq!(app.session.token(), None);
        let expired_toasts = app
            .toasts
            .iter()
            .filter(|t| t.message.starts_with("Session expired"))
            .count();
        assert_eq!(expired_toasts, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_declining_delete_prompt_makes_no_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/applications"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([application_json(1, "Acme", "Engineer")])))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let mut app = App::new(testing::client(&server.uri(), Some("t")));
        pump(&mut app).await;
        app.handle_key(key(KeyCode::Char('d')));
        assert!(matches!(app.overlay, Overlay::ConfirmDelete { id: 1, .. }));
        app.handle_key(key(KeyCode::Char('n')));
        pump(&mut app).await;
        assert!(matches!(app.overlay, Overlay::None));
        assert_eq!(app.list.all().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_form_keys_add_and_remove_interviews() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/applications"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let mut app = App::new(testing::client(&server.uri(), Some("t")));
        app.handle_key(key(KeyCode::Char('a')));
        app.handle_key(ctrl('a'));
        app.handle_key(ctrl('a'));
        let Overlay::Form(editor) = &mut app.overlay else {
            panic!("form should be open");
        };
        assert_eq!(editor.form.interviews().len(), 2);
        assert_eq!(editor.focused(), FormField::Interview(1, InterviewField::Type));

        editor.handle_key(ctrl('d'));
        assert_eq!(editor.form.interviews().len(), 1);

        // Saving with missing fields stays in the form with an error.
        app.handle_key(ctrl('s'));
        let Overlay::Form(editor) = &app.overlay else {
            panic!("form should stay open");
        };
        assert!(matches!(editor.phase, FormPhase::Open(FormMode::Create)));
        assert!(editor.error.is_some());
    }

    fn type_text(editor: &mut FormEditor, text: &str) {
        for c in text.chars() {
            editor.handle_key(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn test_typed_interview_type_is_kept_verbatim() {
        let mut phase = FormPhase::Closed;
        phase.open_create();
        let today = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let mut editor = FormEditor::new(ApplicationForm::new(today), phase);

        editor.handle_key(ctrl('a'));
        type_text(&mut editor, "Technical round");
        editor.handle_key(ctrl('a'));
        type_text(&mut editor, "HR screen");
        editor.handle_key(ctrl('a'));
        type_text(&mut editor, "technical");

        let types: Vec<InterviewType> = editor
            .form
            .interviews()
            .iter()
            .map(|row| row.interview_type.clone())
            .collect();
        assert_eq!(
            types,
            vec![
                InterviewType::Other("Technical round".to_string()),
                InterviewType::Other("HR screen".to_string()),
                InterviewType::Technical,
            ]
        );
        assert_eq!(editor.value(FormField::Interview(0, InterviewField::Type)), "Technical round");
        assert_eq!(editor.value(FormField::Interview(2, InterviewField::Type)), "technical");

        // Text buffers follow their rows when one is removed.
        editor.focus_on(FormField::Interview(0, InterviewField::Notes));
        editor.handle_key(ctrl('d'));
        assert_eq!(editor.value(FormField::Interview(0, InterviewField::Type)), "HR screen");
        assert_eq!(editor.form.interviews().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_closing_detail_drops_late_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/applications"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([application_json(1, "Acme", "Engineer")])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/interviews/application/1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&server)
            .await;

        let mut app = App::new(testing::client(&server.uri(), Some("t")));
        pump(&mut app).await;
        app.handle_key(key(KeyCode::Char('v')));
        assert!(matches!(app.overlay, Overlay::Detail(_)));
        app.handle_key(key(KeyCode::Esc));
        pump(&mut app).await;
        assert!(matches!(app.overlay, Overlay::None));
        assert!(app.toasts.is_empty());
    }
}
