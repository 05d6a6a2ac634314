//! Call context: whether an outbound request originates from a user request
//!
//! The context is passed explicitly. Code handling an inbound user request
//! attaches [`CallContext::Interactive`] to the outbound request's extensions;
//! anything without one (startup, background jobs) is [`CallContext::Background`].

use http::Extensions;

/// The logged-in user on whose behalf an interactive call is made
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSession {
    pub principal: String,
    pub session_id: String,
}

impl UserSession {
    pub fn new(principal: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            session_id: session_id.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CallContext {
    /// Inside the extent of an inbound user request
    Interactive(UserSession),
    /// Startup, scheduled work, or any call the system makes on its own
    #[default]
    Background,
}

impl CallContext {
    pub fn interactive(session: UserSession) -> Self {
        CallContext::Interactive(session)
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self, CallContext::Interactive(_))
    }

    /// Read the context attached to a request. Evaluated per request.
    pub fn from_extensions(extensions: &Extensions) -> CallContext {
        extensions.get::<CallContext>().cloned().unwrap_or_default()
    }
}
