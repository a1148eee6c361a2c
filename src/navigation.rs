//! Routes and the login redirect contract.

use std::fmt;
use url::form_urlencoded;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
  Home,
  Journal,
  Dream(String),
  Result,
  Catalog,
  Symbol(String),
  Profile,
  Login(Option<LoginRedirect>),
}

impl Route {
  /// Parse a path such as `/dream/abc` or `/login?reason=..&redirect=..`.
  pub fn parse(path: &str) -> Option<Route> {
    let (path, query) = match path.split_once('?') {
      Some((p, q)) => (p, Some(q)),
      None => (path, None),
    };
    let segments: Vec<&str> = path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect();

    match segments.as_slice() {
      [] => Some(Route::Home),
      ["journal"] => Some(Route::Journal),
      ["dream", id] => Some(Route::Dream(id.to_string())),
      ["result"] => Some(Route::Result),
      ["catalog"] => Some(Route::Catalog),
      ["catalog", slug] => Some(Route::Symbol(slug.to_string())),
      ["profile"] => Some(Route::Profile),
      ["login"] => Some(Route::Login(query.and_then(LoginRedirect::from_query))),
      _ => None,
    }
  }

  /// Routes that can't be shown without a session.
  pub fn requires_auth(&self) -> bool {
    matches!(self, Route::Journal | Route::Dream(_) | Route::Profile)
  }
}

impl fmt::Display for Route {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Route::Home => write!(f, "/"),
      Route::Journal => write!(f, "/journal"),
      Route::Dream(id) => write!(f, "/dream/{}", id),
      Route::Result => write!(f, "/result"),
      Route::Catalog => write!(f, "/catalog"),
      Route::Symbol(slug) => write!(f, "/catalog/{}", slug),
      Route::Profile => write!(f, "/profile"),
      Route::Login(None) => write!(f, "/login"),
      Route::Login(Some(redirect)) => write!(f, "{}", redirect.to_path()),
    }
  }
}

/// Why the user was sent to the login screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginReason {
  DreamAnalysis,
  GetStarted,
  SessionExpired,
}

impl LoginReason {
  pub fn as_str(&self) -> &'static str {
    match self {
      LoginReason::DreamAnalysis => "dream_analysis",
      LoginReason::GetStarted => "get_started",
      LoginReason::SessionExpired => "session_expired",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "dream_analysis" => Some(LoginReason::DreamAnalysis),
      "get_started" => Some(LoginReason::GetStarted),
      "session_expired" => Some(LoginReason::SessionExpired),
      _ => None,
    }
  }

  /// Banner shown above the login form.
  pub fn message(&self) -> &'static str {
    match self {
      LoginReason::DreamAnalysis => "Sign in to get your dream interpreted. Your text is saved.",
      LoginReason::GetStarted => "Sign in to start your dream journal.",
      LoginReason::SessionExpired => "Your session has expired. Please sign in again.",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
  pub reason: LoginReason,
  pub return_to: String,
}

impl LoginRedirect {
  pub fn new(reason: LoginReason, return_to: impl Into<String>) -> Self {
    Self {
      reason,
      return_to: return_to.into(),
    }
  }

  /// `/login?reason=<reason>&redirect=<url-encoded path>`
  pub fn to_path(&self) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
      .append_pair("reason", self.reason.as_str())
      .append_pair("redirect", &self.return_to)
      .finish();
    format!("/login?{}", query)
  }

  pub fn parse(path: &str) -> Option<Self> {
    match Route::parse(path)? {
      Route::Login(redirect) => redirect,
      _ => None,
    }
  }

  fn from_query(query: &str) -> Option<Self> {
    let mut reason = None;
    let mut return_to = None;
    for (name, value) in form_urlencoded::parse(query.as_bytes()) {
      match name.as_ref() {
        "reason" => reason = LoginReason::parse(&value),
        "redirect" => return_to = Some(value.into_owned()),
        _ => {}
      }
    }
    Some(Self {
      reason: reason?,
      return_to: return_to.unwrap_or_else(|| "/".to_string()),
    })
  }

  /// Where to go after signing in; unknown paths fall back to home.
  pub fn destination(&self) -> Route {
    Route::parse(&self.return_to)
      .filter(|route| !matches!(route, Route::Login(_)))
      .unwrap_or(Route::Home)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_dream_analysis_redirect_path() {
    let redirect = LoginRedirect::new(LoginReason::DreamAnalysis, "/");
    assert_eq!(redirect.to_path(), "/login?reason=dream_analysis&redirect=%2F");
  }

  #[test]
  fn test_session_expired_redirect_round_trips() {
    let redirect = LoginRedirect::new(LoginReason::SessionExpired, "/dream/abc-123");
    let path = redirect.to_path();
    assert_eq!(path, "/login?reason=session_expired&redirect=%2Fdream%2Fabc-123");
    assert_eq!(LoginRedirect::parse(&path), Some(redirect.clone()));
    assert_eq!(redirect.destination(), Route::Dream("abc-123".into()));
  }

  #[test]
  fn test_route_parse_and_display() {
    for path in ["/", "/journal", "/dream/x1", "/result", "/catalog", "/catalog/snake", "/profile", "/login"] {
      let route = Route::parse(path).unwrap();
      assert_eq!(route.to_string(), path);
    }
    assert_eq!(Route::parse("/nowhere"), None);
    assert_eq!(Route::parse("journal/"), Some(Route::Journal));
  }

  #[test]
  fn test_unknown_reason_drops_redirect() {
    assert_eq!(Route::parse("/login?reason=bogus&redirect=%2F"), Some(Route::Login(None)));
  }

  #[test]
  fn test_destination_falls_back_to_home() {
    assert_eq!(LoginRedirect::new(LoginReason::GetStarted, "/nowhere").destination(), Route::Home);
    assert_eq!(
      LoginRedirect::new(LoginReason::GetStarted, "/login?reason=get_started").destination(),
      Route::Home
    );
    assert_eq!(LoginRedirect::new(LoginReason::GetStarted, "/journal").destination(), Route::Journal);
  }

  #[test]
  fn test_protected_routes() {
    assert!(Route::Journal.requires_auth());
    assert!(!Route::Catalog.requires_auth());
    assert!(!Route::Home.requires_auth());
  }
}
