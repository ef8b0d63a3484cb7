//! HTTP transport for vim25 SOAP envelopes.
//!
//! One POST per call against `https://{host}:{port}/sdk`. Status codes are
//! handed back untouched so the session layer can tell an expired cookie
//! from a real failure; only network-level errors become `Err`.

use crate::error::{VsphereError, VsphereResult};
use crate::types::VsphereConfig;

use log::debug;
use rand::Rng;
use reqwest::{header, Client};
use std::time::Duration;

/// Cookie name vCenter uses for SOAP sessions.
pub const SESSION_COOKIE: &str = "vmware_soap_session";

/// One outbound request.
#[derive(Debug, Clone, Copy)]
pub struct SoapRequest<'a> {
    pub body: &'a str,
    /// Raw cookie value (without the `vmware_soap_session=` prefix)
    pub cookie: Option<&'a str>,
}

/// Raw reply from the server.
#[derive(Debug, Clone, Default)]
pub struct SoapReply {
    pub status: u16,
    pub body: String,
    /// Every `Set-Cookie` header value, in order
    pub set_cookie: Vec<String>,
}

impl SoapReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            set_cookie: Vec::new(),
        }
    }

    pub fn with_cookie(mut self, header: impl Into<String>) -> Self {
        self.set_cookie.push(header.into());
        self
    }

    /// Session cookie value from the first matching `Set-Cookie`, if any.
    pub fn session_cookie(&self) -> Option<String> {
        self.set_cookie.iter().find_map(|h| parse_session_cookie(h))
    }
}

/// Extract `vmware_soap_session` from one `Set-Cookie` header value.
pub fn parse_session_cookie(header: &str) -> Option<String> {
    let pair = header.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    if name.trim() != SESSION_COOKIE {
        return None;
    }
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Something that can deliver a SOAP envelope.
#[async_trait::async_trait]
pub trait SoapTransport: Send + Sync {
    async fn post(&self, request: SoapRequest<'_>) -> VsphereResult<SoapReply>;
}

/// reqwest-backed transport with a randomized pre-request delay.
pub struct HttpTransport {
    client: Client,
    url: String,
    jitter_ms: (u64, u64),
}

impl HttpTransport {
    pub fn new(config: &VsphereConfig) -> VsphereResult<Self> {
        Self::with_endpoint(config, &config.sdk_url())
    }

    /// Transport posting to an explicit endpoint URL instead of
    /// `https://{host}:{port}/sdk` (reverse proxies, plain-HTTP labs).
    pub fn with_endpoint(config: &VsphereConfig, endpoint: &str) -> VsphereResult<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VsphereError::transport(format!("Failed to build HTTP client: {e}")))?;

        let url = url::Url::parse(endpoint).map_err(|e| {
            VsphereError::transport(format!("Invalid vCenter endpoint {endpoint:?}: {e}"))
        })?;

        let (lo, hi) = (config.jitter_min_ms, config.jitter_max_ms);
        Ok(Self {
            client,
            url: url.to_string(),
            jitter_ms: (lo.min(hi), lo.max(hi)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Delay before the next request; spreads bursts against vCenter.
    fn jitter(&self) -> Duration {
        let (lo, hi) = self.jitter_ms;
        if hi == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }
}

#[async_trait::async_trait]
impl SoapTransport for HttpTransport {
    async fn post(&self, request: SoapRequest<'_>) -> VsphereResult<SoapReply> {
        let delay = self.jitter();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut req = self
            .client
            .post(&self.url)
            .header(header::CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", "urn:vim25")
            .body(request.body.to_string());
        if let Some(cookie) = request.cookie {
            req = req.header(header::COOKIE, format!("{SESSION_COOKIE}={cookie}"));
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let set_cookie = resp
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();
        let body = resp
            .text()
            .await
            .map_err(|e| VsphereError::transport(format!("Failed to read response body: {e}")))?;

        debug!("POST {} -> {} ({} bytes)", self.url, status, body.len());
        Ok(SoapReply {
            status,
            body,
            set_cookie,
        })
    }
}
