//! Authentication and TLS-warning relay.
//!
//! # Responsibilities
//! - Answer server challenges with the single configured user/password pair
//! - Answer proxy challenges with the credentials of the proxy in use
//! - Surface accepted TLS validation failures as warning events
//!
//! # Design Decisions
//! - Credentials are meant to be set once before the first request; swapping them
//!   while requests are in flight is allowed but gives no guarantee which pair a
//!   given challenge sees
//! - Passwords never reach a log line

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::auth::challenge::{AuthChallenge, AuthScheme};
use crate::auth::Credentials;
use crate::dispatch::{CorrelationId, EventSink, Severity};
use crate::observability::metrics;
use crate::transport::ProxyDescriptor;

pub struct AuthBridge {
    credentials: ArcSwapOption<Credentials>,
    events: EventSink,
}

impl AuthBridge {
    pub fn new(events: EventSink) -> Self {
        Self {
            credentials: ArcSwapOption::empty(),
            events,
        }
    }

    /// Set the pair answered to server challenges.
    pub fn set_credentials(&self, credentials: Credentials) {
        tracing::debug!(user = %credentials.username, "Server credentials configured");
        self.credentials.store(Some(Arc::new(credentials)));
    }

    pub fn clear_credentials(&self) {
        self.credentials.store(None);
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.load().is_some()
    }

    /// Credentials to resend after a server challenge, if the challenge can be answered.
    pub fn answer_server_challenge(
        &self,
        id: CorrelationId,
        challenge: &AuthChallenge,
    ) -> Option<Arc<Credentials>> {
        if challenge.scheme != AuthScheme::Basic {
            tracing::debug!(id = %id, scheme = ?challenge.scheme, "Unsupported authentication scheme, not answering");
            return None;
        }

        let credentials = self.credentials.load_full();
        match &credentials {
            Some(c) => tracing::debug!(
                id = %id,
                realm = ?challenge.realm,
                user = %c.username,
                "Answering authentication challenge"
            ),
            None => tracing::debug!(id = %id, realm = ?challenge.realm, "Authentication required but no credentials set"),
        }
        credentials
    }

    /// Credentials for a proxy challenge: whatever the proxy descriptor carries.
    pub fn answer_proxy_challenge<'a>(&self, proxy: &'a ProxyDescriptor) -> Option<&'a Credentials> {
        if let Some(c) = &proxy.credentials {
            tracing::debug!(proxy = %proxy.endpoint(), user = %c.username, "Using proxy credentials");
        }
        proxy.credentials.as_ref()
    }

    /// Report certificate problems that were accepted under a lenient TLS policy.
    pub fn relay_tls_errors(&self, id: Option<CorrelationId>, errors: &[String]) {
        let message = format!("SSL Error: {}", errors.join("; "));
        tracing::warn!(id = ?id.map(|i| i.as_u64()), "{}", message);
        metrics::record_tls_warning();
        self.events.log(id, Severity::Warning, message);
    }
}

impl fmt::Debug for AuthBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthBridge")
            .field("has_credentials", &self.has_credentials())
            .finish()
    }
}
