//! Session/Channel Glue (§4.H): the session state machine, CreateSession /
//! ActivateSession / CloseSession handling, and the pluggable identity
//! authenticator.
//!
//! Grounded on `membership.rs`'s `MembershipManager` (`RwLock<HashMap<id,
//! Member>>`, an admit/ban/status state machine, a `stats()` snapshot).
//! Sessions here play the role membership's `Member` plays there: admitted
//! on create, gated on every subsequent call, removed on close.
//!
//! The formal transition diagram's `Creating`/`Activating`/`Closing`
//! sub-states exist only while a response is in flight on the original
//! async dispatcher; since every handler in this crate computes its
//! response synchronously, those sub-states collapse into their
//! post-response successor (`Created`, `Activated`, gone) — an Open
//! Question resolution recorded in DESIGN.md.

use parking_lot::RwLock;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;
use ua_core::{Identifier, NodeId, StatusCode};
use ua_proto::{
    ActivateSessionRequest, ActivateSessionResponse, CloseSessionRequest, CloseSessionResponse,
    CreateSessionRequest, CreateSessionResponse, GetEndpointsRequest, ResponseHeader, UserIdentityToken,
};

use crate::handlers::get_endpoints::{handle_get_endpoints, EndpointConfig, EndpointsContext};

pub const MIN_SESSION_TIMEOUT_MS: f64 = 10_000.0;
pub const MAX_SESSION_TIMEOUT_MS: f64 = 3_600_000.0;
pub const DEFAULT_MAX_SESSIONS: usize = 64;

/// The fixed offset added to a session's `AuthenticationToken` numeric id to
/// derive its `SessionId` — a naming convention only, carrying no security
/// weight (§4.H).
const SESSION_ID_OFFSET: u32 = 0x1000_0000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("unknown session id")]
    SessionIdInvalid,
    #[error("session is not activated")]
    SessionNotActivated,
    #[error("identity token rejected")]
    IdentityTokenRejected,
    #[error("too many concurrent sessions")]
    TooManySessions,
}

impl From<&SessionError> for StatusCode {
    fn from(err: &SessionError) -> StatusCode {
        match err {
            SessionError::SessionIdInvalid => StatusCode::BadSessionIdInvalid,
            SessionError::SessionNotActivated => StatusCode::BadSessionNotActivated,
            SessionError::IdentityTokenRejected => StatusCode::BadIdentityTokenRejected,
            SessionError::TooManySessions => StatusCode::BadTooManySessions,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Activated,
    Orphaned,
}

pub struct Session {
    pub session_id: NodeId,
    pub authentication_token: NodeId,
    pub state: SessionState,
    pub revised_timeout: f64,
    pub subscription_ids: Vec<u32>,
}

/// `(user_identity_token) -> Ok(())` or a rejection (§4.H "CreateSession /
/// ActivateSession additionally validate a user-identity token against a
/// pluggable Authenticator trait"). The actual credential check (PBKDF2 /
/// X.509 verification) is an external collaborator; this trait is only the
/// contract boundary.
pub trait Authenticator {
    fn authenticate(&self, token: &UserIdentityToken) -> Result<(), SessionError>;
}

/// Accepts only the anonymous token, useful for tests and discovery-only
/// deployments.
pub struct AllowAnonymous;

impl Authenticator for AllowAnonymous {
    fn authenticate(&self, token: &UserIdentityToken) -> Result<(), SessionError> {
        match token {
            UserIdentityToken::Anonymous => Ok(()),
            _ => Err(SessionError::IdentityTokenRejected),
        }
    }
}

pub struct SessionManager {
    sessions: RwLock<HashMap<NodeId, Session>>,
    next_token_id: AtomicU32,
    max_sessions: usize,
}

impl SessionManager {
    pub fn new(max_sessions: usize) -> Self {
        SessionManager { sessions: RwLock::new(HashMap::new()), next_token_id: AtomicU32::new(1), max_sessions }
    }

    /// `config` answers the embedded `GetEndpoints` discovery (§4.F,
    /// `EndpointsContext::CreateSession`: `ApplicationUri` only, no
    /// `DiscoveryUrls`) that `CreateSessionResponse.server_endpoints` carries
    /// back to the client.
    pub fn create_session(&self, config: &EndpointConfig, request: &CreateSessionRequest) -> CreateSessionResponse {
        let now = chrono::Utc::now();
        if self.sessions.read().len() >= self.max_sessions {
            return CreateSessionResponse {
                header: ResponseHeader::fault(&request.header, now, StatusCode::BadTooManySessions),
                session_id: NodeId::null(),
                authentication_token: NodeId::null(),
                revised_session_timeout: 0.0,
                server_nonce: Vec::new(),
                server_endpoints: Vec::new(),
            };
        }

        let token_numeric = self.next_token_id.fetch_add(1, Ordering::Relaxed);
        let authentication_token = NodeId { namespace_index: 0, identifier: Identifier::Numeric(token_numeric) };
        let session_id = NodeId { namespace_index: 0, identifier: Identifier::Numeric(token_numeric.wrapping_add(SESSION_ID_OFFSET)) };
        let revised_timeout = request.requested_session_timeout.clamp(MIN_SESSION_TIMEOUT_MS, MAX_SESSION_TIMEOUT_MS);

        let mut server_nonce = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut server_nonce);

        self.sessions.write().insert(
            authentication_token.clone(),
            Session {
                session_id: session_id.clone(),
                authentication_token: authentication_token.clone(),
                state: SessionState::Created,
                revised_timeout,
                subscription_ids: Vec::new(),
            },
        );

        let endpoints_request =
            GetEndpointsRequest { header: request.header.clone(), endpoint_url: request.endpoint_url.clone(), profile_uris: Vec::new() };
        let server_endpoints = handle_get_endpoints(config, EndpointsContext::CreateSession, &endpoints_request).endpoints;

        CreateSessionResponse {
            header: ResponseHeader::ok(&request.header, now),
            session_id,
            authentication_token,
            revised_session_timeout: revised_timeout,
            server_nonce,
            server_endpoints,
        }
    }

    pub fn activate_session(&self, authenticator: &dyn Authenticator, request: &ActivateSessionRequest) -> ActivateSessionResponse {
        let now = chrono::Utc::now();
        let mut sessions = self.sessions.write();
        let Some(session) = sessions.get_mut(&request.header.authentication_token) else {
            return ActivateSessionResponse {
                header: ResponseHeader::fault(&request.header, now, StatusCode::BadSessionIdInvalid),
                server_nonce: Vec::new(),
            };
        };

        if let Err(err) = authenticator.authenticate(&request.user_identity_token) {
            return ActivateSessionResponse { header: ResponseHeader::fault(&request.header, now, (&err).into()), server_nonce: Vec::new() };
        }

        session.state = SessionState::Activated;
        let mut server_nonce = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut server_nonce);
        ActivateSessionResponse { header: ResponseHeader::ok(&request.header, now), server_nonce }
    }

    /// Mark a session orphaned on channel loss; it remains activatable from
    /// a different channel (§4.H's `Orphaned` state).
    pub fn orphan(&self, authentication_token: &NodeId) {
        if let Some(session) = self.sessions.write().get_mut(authentication_token) {
            if session.state == SessionState::Activated {
                session.state = SessionState::Orphaned;
            }
        }
    }

    pub fn close_session(&self, request: &CloseSessionRequest) -> (CloseSessionResponse, Vec<u32>) {
        let now = chrono::Utc::now();
        let mut sessions = self.sessions.write();
        let Some(session) = sessions.remove(&request.header.authentication_token) else {
            return (CloseSessionResponse { header: ResponseHeader::fault(&request.header, now, StatusCode::BadSessionIdInvalid) }, Vec::new());
        };
        let to_delete = if request.delete_subscriptions { session.subscription_ids } else { Vec::new() };
        (CloseSessionResponse { header: ResponseHeader::ok(&request.header, now) }, to_delete)
    }

    pub fn attach_subscription(&self, authentication_token: &NodeId, subscription_id: u32) {
        if let Some(session) = self.sessions.write().get_mut(authentication_token) {
            session.subscription_ids.push(subscription_id);
        }
    }

    /// The gate every non-Create/Activate/Close service applies first
    /// (§4.H): unknown token -> `BadSessionIdInvalid`, known but not
    /// `Activated` -> `BadSessionNotActivated`.
    pub fn require_activated(&self, authentication_token: &NodeId) -> Result<(), SessionError> {
        let sessions = self.sessions.read();
        let session = sessions.get(authentication_token).ok_or(SessionError::SessionIdInvalid)?;
        if session.state == SessionState::Activated {
            Ok(())
        } else {
            Err(SessionError::SessionNotActivated)
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ua_proto::{ApplicationDescription, RequestHeader};
    use ua_core::LocalizedText;

    fn create_request(timeout: f64) -> CreateSessionRequest {
        CreateSessionRequest {
            header: RequestHeader::dummy(chrono::Utc::now()),
            client_description: ApplicationDescription {
                application_uri: "urn:test:client".into(),
                product_uri: String::new(),
                application_name: LocalizedText::default(),
                discovery_urls: Vec::new(),
            },
            server_uri: String::new(),
            endpoint_url: "opc.tcp://localhost:4840".into(),
            session_name: "test-session".into(),
            requested_session_timeout: timeout,
            max_response_message_size: 0,
        }
    }

    fn sample_config() -> EndpointConfig {
        EndpointConfig {
            endpoint_url: "opc.tcp://localhost:4840".into(),
            application_uri: "urn:test:server".into(),
            product_uri: "urn:test:product".into(),
            application_name: LocalizedText::new("en", "Test Server"),
            discovery_urls: Vec::new(),
            security_policies: vec![(crate::handlers::get_endpoints::SecurityPolicy::None, crate::handlers::get_endpoints::ModeMask::ALL)],
        }
    }

    #[test]
    fn create_session_derives_session_id_from_token_with_fixed_offset() {
        let manager = SessionManager::new(DEFAULT_MAX_SESSIONS);
        let response = manager.create_session(&sample_config(), &create_request(60_000.0));
        let Identifier::Numeric(token) = response.authentication_token.identifier else { panic!("expected numeric token") };
        let Identifier::Numeric(session) = response.session_id.identifier else { panic!("expected numeric session id") };
        assert_eq!(session, token.wrapping_add(SESSION_ID_OFFSET));
    }

    #[test]
    fn session_timeout_is_clamped_to_bounds() {
        let manager = SessionManager::new(DEFAULT_MAX_SESSIONS);
        let response = manager.create_session(&sample_config(), &create_request(0.0));
        assert_eq!(response.revised_session_timeout, MIN_SESSION_TIMEOUT_MS);
    }

    #[test]
    fn unactivated_session_fails_require_activated() {
        let manager = SessionManager::new(DEFAULT_MAX_SESSIONS);
        let response = manager.create_session(&sample_config(), &create_request(60_000.0));
        assert_eq!(manager.require_activated(&response.authentication_token), Err(SessionError::SessionNotActivated));
    }

    #[test]
    fn unknown_session_token_is_invalid() {
        let manager = SessionManager::new(DEFAULT_MAX_SESSIONS);
        assert_eq!(manager.require_activated(&NodeId::numeric(0, 999)), Err(SessionError::SessionIdInvalid));
    }

    #[test]
    fn activate_with_anonymous_token_succeeds_and_unlocks_services() {
        let manager = SessionManager::new(DEFAULT_MAX_SESSIONS);
        let created = manager.create_session(&sample_config(), &create_request(60_000.0));
        let activate_request = ActivateSessionRequest {
            header: RequestHeader { authentication_token: created.authentication_token.clone(), ..RequestHeader::dummy(chrono::Utc::now()) },
            user_identity_token: UserIdentityToken::Anonymous,
        };
        let response = manager.activate_session(&AllowAnonymous, &activate_request);
        assert_eq!(response.header.service_result, StatusCode::Ok);
        assert!(manager.require_activated(&created.authentication_token).is_ok());
    }

    #[test]
    fn activate_rejects_non_anonymous_token_under_allow_anonymous_policy() {
        let manager = SessionManager::new(DEFAULT_MAX_SESSIONS);
        let created = manager.create_session(&sample_config(), &create_request(60_000.0));
        let activate_request = ActivateSessionRequest {
            header: RequestHeader { authentication_token: created.authentication_token.clone(), ..RequestHeader::dummy(chrono::Utc::now()) },
            user_identity_token: UserIdentityToken::UserName { user_name: "x".into(), password: Vec::new() },
        };
        let response = manager.activate_session(&AllowAnonymous, &activate_request);
        assert_eq!(response.header.service_result, StatusCode::BadIdentityTokenRejected);
    }

    #[test]
    fn close_session_with_delete_subscriptions_returns_owned_ids() {
        let manager = SessionManager::new(DEFAULT_MAX_SESSIONS);
        let created = manager.create_session(&sample_config(), &create_request(60_000.0));
        manager.attach_subscription(&created.authentication_token, 7);
        let close_request = CloseSessionRequest {
            header: RequestHeader { authentication_token: created.authentication_token.clone(), ..RequestHeader::dummy(chrono::Utc::now()) },
            delete_subscriptions: true,
        };
        let (response, owned) = manager.close_session(&close_request);
        assert_eq!(response.header.service_result, StatusCode::Ok);
        assert_eq!(owned, vec![7]);
        assert_eq!(manager.session_count(), 0);
    }

    #[test]
    fn create_session_embeds_endpoints_without_discovery_urls() {
        let manager = SessionManager::new(DEFAULT_MAX_SESSIONS);
        let response = manager.create_session(&sample_config(), &create_request(60_000.0));
        assert!(!response.server_endpoints.is_empty());
        assert!(response.server_endpoints[0].server.discovery_urls.is_empty());
    }

    #[test]
    fn too_many_sessions_is_rejected() {
        let manager = SessionManager::new(1);
        manager.create_session(&sample_config(), &create_request(60_000.0));
        let second = manager.create_session(&sample_config(), &create_request(60_000.0));
        assert_eq!(second.header.service_result, StatusCode::BadTooManySessions);
    }
}
