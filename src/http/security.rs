//! Transport security middleware.
//!
//! Applied around the whole application, in this order:
//! - reject requests whose `Host` is not in the allowed list (plain 400)
//! - redirect plaintext requests to HTTPS when enabled
//! - add `Strict-Transport-Security` to responses served over HTTPS
//! - mark session and CSRF cookies `Secure` when enabled
//!
//! # Example
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/api", get(handler))
//!     .layer(SecurityLayer::new(&settings));
//! ```

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use tower::{Layer, Service};

use crate::infrastructure::settings::{Settings, CSRF_COOKIE_NAME, SESSION_COOKIE_NAME};

/// The subset of settings the middleware needs, precomputed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityPolicy {
    pub allowed_hosts: Vec<String>,
    pub ssl_redirect: bool,
    pub hsts: Option<HeaderValue>,
    /// Cookie names that must carry the `Secure` attribute.
    pub secure_cookies: Vec<&'static str>,
}

impl SecurityPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        let mut secure_cookies = Vec::new();
        if settings.session_cookie_secure { secure_cookies.push(SESSION_COOKIE_NAME); }
        if settings.csrf_cookie_secure { secure_cookies.push(CSRF_COOKIE_NAME); }
        Self {
            allowed_hosts: settings.allowed_hosts.iter().map(|h| h.to_ascii_lowercase()).collect(),
            ssl_redirect: settings.secure_ssl_redirect,
            hsts: settings.hsts_header().and_then(|v| HeaderValue::from_str(&v).ok()),
            secure_cookies,
        }
    }

    /// Checks a raw `Host` value (port allowed) against the allowed patterns:
    /// `*`, `.example.com` (the domain and any subdomain), or an exact name.
    pub fn host_allowed(&self, host: &str) -> bool {
        let domain = host_without_port(host);
        if domain.is_empty() {
            return false;
        }
        self.allowed_hosts.iter().any(|pattern| {
            pattern == "*"
                || pattern == &domain
                || pattern
                    .strip_prefix('.')
                    .is_some_and(|base| domain == base || domain.ends_with(pattern.as_str()))
        })
    }

    fn harden_cookies(&self, headers: &mut HeaderMap) {
        if self.secure_cookies.is_empty() || !headers.contains_key(header::SET_COOKIE) {
            return;
        }
        let cookies: Vec<HeaderValue> = headers.get_all(header::SET_COOKIE).iter().cloned().collect();
        headers.remove(header::SET_COOKIE);
        for cookie in cookies {
            headers.append(header::SET_COOKIE, self.secure_cookie(cookie));
        }
    }

    fn secure_cookie(&self, cookie: HeaderValue) -> HeaderValue {
        let Ok(text) = cookie.to_str() else { return cookie };
        let name = text.split('=').next().unwrap_or_default().trim();
        let already = text.split(';').skip(1).any(|attr| attr.trim().eq_ignore_ascii_case("secure"));
        if already || !self.secure_cookies.contains(&name) {
            return cookie;
        }
        HeaderValue::from_str(&format!("{text}; Secure")).unwrap_or(cookie)
    }
}

/// Lowercased host with any port and trailing dot removed. IPv6 literals keep
/// their brackets.
pub fn host_without_port(host: &str) -> String {
    let host = host.trim().to_ascii_lowercase();
    let domain = if host.starts_with('[') {
        match host.find(']') {
            Some(end) => host[..=end].to_string(),
            None => return String::new(),
        }
    } else {
        match host.rsplit_once(':') {
            Some((domain, _port)) => domain.to_string(),
            None => host,
        }
    };
    domain.trim_end_matches('.').to_string()
}

/// A request counts as secure when it arrived over HTTPS directly or via a
/// proxy that says so in `X-Forwarded-Proto`.
pub fn is_secure(uri: &Uri, headers: &HeaderMap) -> bool {
    if let Some(proto) = headers.get("x-forwarded-proto").and_then(|v| v.to_str().ok()) {
        return proto.split(',').next().is_some_and(|p| p.trim().eq_ignore_ascii_case("https"));
    }
    uri.scheme_str() == Some("https")
}

fn request_host(req: &Request) -> Option<String> {
    req.headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .or_else(|| req.uri().authority().map(|a| a.to_string()))
}

fn bad_host() -> Response {
    (StatusCode::BAD_REQUEST, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], "Bad Request (400)").into_response()
}

fn https_redirect(host: &str, uri: &Uri) -> Response {
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let location = format!("https://{host}{path}");
    match HeaderValue::from_str(&location) {
        Ok(location) => Response::builder()
            .status(StatusCode::MOVED_PERMANENTLY)
            .header(header::LOCATION, location)
            .body(Body::empty())
            .unwrap_or_else(|_| bad_host()),
        Err(_) => bad_host(),
    }
}

#[derive(Clone, Debug)]
pub struct SecurityLayer {
    policy: Arc<SecurityPolicy>,
}

impl SecurityLayer {
    pub fn new(settings: &Settings) -> Self {
        Self { policy: Arc::new(SecurityPolicy::from_settings(settings)) }
    }
}

impl<S> Layer<S> for SecurityLayer {
    type Service = Security<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Security { inner, policy: Arc::clone(&self.policy) }
    }
}

#[derive(Clone, Debug)]
pub struct Security<S> {
    inner: S,
    policy: Arc<SecurityPolicy>,
}

impl<S> Service<Request> for Security<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let mut inner = self.inner.clone();
        let policy = Arc::clone(&self.policy);

        Box::pin(async move {
            let host = request_host(&req).unwrap_or_default();
            if !policy.host_allowed(&host) {
                tracing::warn!(host = %host, path = %req.uri().path(), "rejected request for disallowed host");
                return Ok(bad_host());
            }

            let secure = is_secure(req.uri(), req.headers());
            if policy.ssl_redirect && !secure {
                return Ok(https_redirect(&host, req.uri()));
            }

            let mut response = inner.call(req).await?;
            let headers = response.headers_mut();

            if secure {
                if let Some(hsts) = &policy.hsts {
                    if !headers.contains_key(header::STRICT_TRANSPORT_SECURITY) {
                        headers.insert(header::STRICT_TRANSPORT_SECURITY, hsts.clone());
                    }
                }
            }
            policy.harden_cookies(headers);

            Ok(response)
        })
    }
}
