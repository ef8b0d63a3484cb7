//! Session handling for the vim25 SOAP API.
//!
//! A [`Session`] is an explicit value owned by one logical operation and
//! passed `&mut` into every request. The external [`SessionCache`] holds the
//! only copy that outlives the operation.
//!
//! Every request goes through [`SoapClient::call`]:
//!
//! ```text
//! attempt ──ok──────────────────────────────▶ reply
//!    │
//!    └─401 / NotAuthenticated─▶ Login ─▶ replay once ──ok──▶ reply
//!                                 │            └─rejected─▶ Authentication error
//!                                 └─fails─▶ Authentication error
//! ```

use crate::cache::{SessionCache, SESSION_CACHE_KEY, SESSION_TTL};
use crate::envelope;
use crate::error::{VsphereError, VsphereResult};
use crate::transport::{SoapReply, SoapRequest, SoapTransport};
use crate::types::VsphereConfig;
use crate::xml::XmlElement;

use log::{debug, info, warn};

/// Where a session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    HasCookie,
    Authenticating,
}

/// Cookie held by one logical operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    cookie: Option<String>,
    state: SessionState,
    /// Cookie came from the cache and has not been confirmed by the server
    seeded: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            cookie: None,
            state: SessionState::NoSession,
            seeded: false,
        }
    }

    /// Adopt a cookie from the cache without contacting the server.
    pub async fn from_cache(cache: &dyn SessionCache) -> Self {
        match cache.get(SESSION_CACHE_KEY).await.filter(|c| !c.is_empty()) {
            Some(cookie) => {
                debug!("Seeded vSphere session from cache");
                Self {
                    cookie: Some(cookie),
                    state: SessionState::HasCookie,
                    seeded: true,
                }
            }
            None => Self::new(),
        }
    }

    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the cookie was adopted from the cache and not yet confirmed.
    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// Replace the cookie wholesale and persist it.
    async fn adopt(&mut self, cookie: String, cache: &dyn SessionCache) {
        cache.set(SESSION_CACHE_KEY, &cookie, SESSION_TTL).await;
        self.cookie = Some(cookie);
        self.state = SessionState::HasCookie;
        self.seeded = false;
    }
}

// ── Fault classification ────────────────────────────────────────────

/// How a reply should be treated by the retry logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyClass {
    Ok,
    NotAuthenticated,
    /// `ManagedObjectNotFound` fault, with its `faultstring`
    NotFound(String),
    /// Other fault or non-2xx status, with the best message available
    Fault(String),
}

/// Classify a reply: 401 and "not authenticated" faults ask for a login.
pub fn classify(reply: &SoapReply) -> ReplyClass {
    if reply.status == 401 {
        return ReplyClass::NotAuthenticated;
    }

    let doc = XmlElement::parse(&reply.body).ok();
    if let Some(doc) = &doc {
        if is_not_authenticated(doc) {
            return ReplyClass::NotAuthenticated;
        }
        if let Some(fault) = doc.elements_by_local_name("Fault").first() {
            let message = fault
                .child_text("faultstring")
                .unwrap_or_else(|| fault.text().trim().to_string());
            if has_fault_type(fault, "ManagedObjectNotFound") {
                return ReplyClass::NotFound(message);
            }
            return ReplyClass::Fault(message);
        }
    }

    if reply.status >= 400 {
        let snippet: String = reply.body.chars().take(500).collect();
        ReplyClass::Fault(snippet)
    } else {
        ReplyClass::Ok
    }
}

fn is_not_authenticated(doc: &XmlElement) -> bool {
    if !doc.elements_by_local_name("NotAuthenticatedFault").is_empty() {
        return true;
    }
    doc.elements_by_local_name("Fault").iter().any(|fault| {
        fault.text().to_ascii_lowercase().contains("session is not authenticated")
            || has_fault_type(fault, "NotAuthenticated")
    })
}

/// Whether the fault detail carries `{ty}Fault` or `xsi:type="{ty}"`.
fn has_fault_type(el: &XmlElement, ty: &str) -> bool {
    el.xsi_type() == Some(ty)
        || el.local_name().strip_suffix("Fault") == Some(ty)
        || el.elements().any(|c| has_fault_type(c, ty))
}

/// Whether a `currentSession` reply actually carries a session.
pub fn has_current_session(body: &str) -> bool {
    XmlElement::parse(body)
        .map(|doc| {
            doc.elements_by_local_name("propSet").iter().any(|p| {
                p.child_text("name").as_deref() == Some("currentSession")
                    && p.first_child_by_local_name("val", 1)
                        .map(|v| !v.text().trim().is_empty())
                        .unwrap_or(false)
            })
        })
        .unwrap_or(false)
}

// ── Client ──────────────────────────────────────────────────────────

/// Stateless request executor: transport plus configuration.
pub struct SoapClient<T: SoapTransport> {
    transport: T,
    config: VsphereConfig,
}

impl<T: SoapTransport> SoapClient<T> {
    pub fn new(transport: T, config: VsphereConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &VsphereConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send one envelope, capturing any fresh cookie.
    async fn send(
        &self,
        session: &mut Session,
        cache: &dyn SessionCache,
        body: &str,
    ) -> VsphereResult<SoapReply> {
        let reply = self
            .transport
            .post(SoapRequest {
                body,
                cookie: session.cookie(),
            })
            .await?;
        if let Some(cookie) = reply.session_cookie() {
            if session.cookie() != Some(cookie.as_str()) {
                debug!("vCenter issued a new session cookie");
            }
            session.adopt(cookie, cache).await;
        }
        Ok(reply)
    }

    /// Perform the `Login` exchange. Exactly one request; no retry.
    pub async fn login(
        &self,
        session: &mut Session,
        cache: &dyn SessionCache,
    ) -> VsphereResult<()> {
        let (username, password) = self.config.credentials().ok_or_else(|| {
            VsphereError::precondition(
                "vCenter requires authentication but no credentials are configured",
            )
        })?;

        session.state = SessionState::Authenticating;
        // A rejected cookie must not be sent along with the login.
        session.cookie = None;
        session.seeded = false;

        let target = self.config.safe();
        info!(
            "Logging in to vCenter {}:{} as {} (insecure TLS: {})",
            target.host, target.port, username, target.insecure
        );
        // `send` adopts any Set-Cookie before the fault check below: a
        // rejected Login that issues a cookie still replaces the cached one.
        let reply = self
            .send(session, cache, &envelope::login(username, password))
            .await?;

        let has_fault = XmlElement::parse(&reply.body)
            .map(|doc| !doc.elements_by_local_name("Fault").is_empty())
            .unwrap_or(false);
        if reply.status >= 400 || has_fault {
            session.state = SessionState::NoSession;
            let detail = match classify(&reply) {
                ReplyClass::Fault(msg) | ReplyClass::NotFound(msg) => msg,
                _ => format!("HTTP {}", reply.status),
            };
            return Err(VsphereError::auth(format!("Login rejected: {detail}")));
        }

        if session.cookie().is_none() {
            session.state = SessionState::NoSession;
            return Err(VsphereError::auth("Login succeeded but no session cookie was issued"));
        }
        session.state = SessionState::HasCookie;
        Ok(())
    }

    /// Send `body`; on an authentication failure log in and replay it once.
    ///
    /// Returns the successful reply body.
    pub async fn call(
        &self,
        session: &mut Session,
        cache: &dyn SessionCache,
        body: &str,
    ) -> VsphereResult<String> {
        let first = self.send(session, cache, body).await?;
        match classify(&first) {
            ReplyClass::Ok => {
                session.seeded = false;
                return Ok(first.body);
            }
            ReplyClass::Fault(msg) => return Err(VsphereError::fault(first.status, msg)),
            ReplyClass::NotFound(msg) => return Err(VsphereError::not_found(msg)),
            ReplyClass::NotAuthenticated => {
                warn!("vCenter rejected the session (HTTP {}), re-authenticating", first.status);
            }
        }

        self.login(session, cache).await?;

        let replay = self.send(session, cache, body).await?;
        match classify(&replay) {
            ReplyClass::Ok => Ok(replay.body),
            ReplyClass::Fault(msg) => Err(VsphereError::fault(replay.status, msg)),
            ReplyClass::NotFound(msg) => Err(VsphereError::not_found(msg)),
            ReplyClass::NotAuthenticated => Err(VsphereError::auth(
                "vCenter rejected the session again after a fresh login",
            )),
        }
    }

    /// Confirm a cache-seeded cookie with a `currentSession` query.
    ///
    /// Some expired sessions come back as HTTP 200 with neither fault nor
    /// session; that case triggers a login here.
    pub async fn preheat(
        &self,
        session: &mut Session,
        cache: &dyn SessionCache,
    ) -> VsphereResult<()> {
        if !session.is_seeded() {
            return Ok(());
        }
        let body = self.call(session, cache, &envelope::current_session()).await?;
        if !has_current_session(&body) {
            warn!("Cached vCenter session has no currentSession, logging in again");
            self.login(session, cache).await?;
        }
        Ok(())
    }
}
