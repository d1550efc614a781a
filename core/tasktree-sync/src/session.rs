//! Login state handed to the engine by the credential layer.

use std::fmt;

/// An externally managed login/token pair.
///
/// The engine never obtains or refreshes tokens; it only reads them and
/// clears them when the remote rejects one.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
    is_logged_in: bool,
}

impl Session {
    /// Creates a session from its raw parts.
    pub fn new(token: Option<String>, is_logged_in: bool) -> Self {
        Self { token, is_logged_in }
    }

    /// A logged-in session carrying `token`.
    pub fn logged_in(token: impl Into<String>) -> Self {
        Self::new(Some(token.into()), true)
    }

    /// A logged-out session with no token.
    pub fn logged_out() -> Self {
        Self::default()
    }

    /// Returns the bearer token, if any.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Returns the login flag as reported by the credential layer.
    pub fn is_logged_in(&self) -> bool {
        self.is_logged_in
    }

    /// Returns true if synchronization may run: logged in with a non-empty token.
    pub fn is_active(&self) -> bool {
        self.is_logged_in && self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Drops the token and the login flag.
    pub fn clear(&mut self) {
        self.token = None;
        self.is_logged_in = false;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("is_logged_in", &self.is_logged_in)
            .finish()
    }
}
