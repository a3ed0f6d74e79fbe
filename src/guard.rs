use std::fmt;

use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Signup,
    Dashboard,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Signup => "/signup",
            Route::Dashboard => "/dashboard",
        }
    }

    /// `/` and anything unknown land on the dashboard.
    pub fn resolve(path: &str) -> Route {
        match path.trim_end_matches('/') {
            "/login" => Route::Login,
            "/signup" => Route::Signup,
            _ => Route::Dashboard,
        }
    }

    pub fn guard(&self) -> Guard {
        match self {
            Route::Login | Route::Signup => Guard::Public,
            Route::Dashboard => Guard::Protected,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Whether a region may be entered, decided purely by token presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// Only without a token; otherwise go to the dashboard.
    Public,
    /// Only with a token; otherwise go to login.
    Protected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    Redirect(Route),
}

impl Guard {
    pub fn check(&self, authenticated: bool) -> Access {
        match (self, authenticated) {
            (Guard::Public, false) | (Guard::Protected, true) => Access::Granted,
            (Guard::Public, true) => Access::Redirect(Route::Dashboard),
            (Guard::Protected, false) => Access::Redirect(Route::Login),
        }
    }

    pub fn admit(&self, session: &Session) -> Access {
        self.check(session.is_authenticated())
    }
}

/// Resolve `path` and apply its guard. Fallback routes always admit the
/// state that sent us there, so one redirect is enough.
pub fn navigate(path: &str, session: &Session) -> Route {
    let route = Route::resolve(path);
    match route.guard().admit(session) {
        Access::Granted => route,
        Access::Redirect(fallback) => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemoryTokenStore;

    #[test]
    fn test_token_admits_protected_and_denies_public() {
        let session = Session::new(MemoryTokenStore::with_token("t"));
        assert_eq!(Guard::Protected.admit(&session), Access::Granted);
        assert_eq!(Guard::Public.admit(&session), Access::Redirect(Route::Dashboard));
    }

    #[test]
    fn test_no_token_admits_public_and_denies_protected() {
        let session = Session::new(MemoryTokenStore::default());
        assert_eq!(Guard::Public.admit(&session), Access::Granted);
        assert_eq!(Guard::Protected.admit(&session), Access::Redirect(Route::Login));
    }

    #[test]
    fn test_resolve_paths() {
        assert_eq!(Route::resolve("/login"), Route::Login);
        assert_eq!(Route::resolve("/signup/"), Route::Signup);
        assert_eq!(Route::resolve("/"), Route::Dashboard);
        assert_eq!(Route::resolve("/nowhere"), Route::Dashboard);
    }

    #[test]
    fn test_navigate_follows_redirects() {
        let anonymous = Session::new(MemoryTokenStore::default());
        assert_eq!(navigate("/", &anonymous), Route::Login);
        assert_eq!(navigate("/signup", &anonymous), Route::Signup);

        let signed_in = Session::new(MemoryTokenStore::with_token("t"));
        assert_eq!(navigate("/login", &signed_in), Route::Dashboard);
        assert_eq!(navigate("/dashboard", &signed_in), Route::Dashboard);
    }

    #[test]
    fn test_guard_tracks_session_changes() {
        let session = Session::new(MemoryTokenStore::with_token("t"));
        assert_eq!(navigate("/dashboard", &session), Route::Dashboard);
        session.expire();
        assert_eq!(navigate("/dashboard", &session), Route::Login);
    }
}
