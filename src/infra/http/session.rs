//! Session resolution and the auth gate.
//!
//! `resolve_viewer` runs on every request and attaches the [`Viewer`] when a
//! valid session token arrives by cookie or bearer header. The gates only read
//! that extension, so a rejected request never reaches a repository.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{HeaderMap, Request, StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::debug;
use url::form_urlencoded;

use crate::application::session::{SessionService, Viewer};
use crate::config::SessionSettings;

use super::api::error::ApiError;

const LOGIN_PATH: &str = "/login";

/// Raw token carried by the current request, kept for logout.
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

#[derive(Debug, Clone)]
pub struct SessionCookie {
    name: String,
    secure: bool,
    max_age: time::Duration,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, secure: bool, max_age: time::Duration) -> Self {
        Self {
            name: name.into(),
            secure,
            max_age,
        }
    }

    pub fn from_settings(settings: &SessionSettings) -> Self {
        let max_age = time::Duration::try_from(settings.ttl).unwrap_or(time::Duration::DAY);
        Self::new(settings.cookie_name.clone(), settings.secure_cookie, max_age)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn issue(&self, token: String) -> Cookie<'static> {
        Cookie::build((self.name.clone(), token))
            .http_only(true)
            .same_site(SameSite::Lax)
            .path("/")
            .secure(self.secure)
            .max_age(self.max_age)
            .build()
    }

    pub fn removal(&self) -> Cookie<'static> {
        Cookie::build((self.name.clone(), ""))
            .http_only(true)
            .same_site(SameSite::Lax)
            .path("/")
            .secure(self.secure)
            .max_age(time::Duration::ZERO)
            .build()
    }
}

#[derive(Clone)]
pub struct AuthState {
    pub sessions: Arc<SessionService>,
    pub cookie: SessionCookie,
}

pub async fn resolve_viewer(
    State(state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(token) = extract_token(request.headers(), state.cookie.name()) {
        match state.sessions.authenticate(&token).await {
            Ok(viewer) => {
                request.extensions_mut().insert(viewer);
            }
            Err(err) => {
                debug!(
                    target = "postboard::http::session",
                    reason = %err,
                    "ignoring session token"
                );
            }
        }
        request.extensions_mut().insert(SessionToken(token));
    }

    next.run(request).await
}

/// Page gate: anonymous visitors are sent to the login form.
pub async fn require_page_session(request: Request<Body>, next: Next) -> Response {
    if request.extensions().get::<Viewer>().is_some() {
        return next.run(request).await;
    }

    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    Redirect::to(&login_redirect(&target)).into_response()
}

/// API gate: anonymous callers get a 403 before any handler runs.
pub async fn require_api_session(request: Request<Body>, next: Next) -> Response {
    if request.extensions().get::<Viewer>().is_some() {
        return next.run(request).await;
    }
    ApiError::forbidden().into_response()
}

pub fn login_redirect(next: &str) -> String {
    let query: String = form_urlencoded::Serializer::new(String::new())
        .append_pair("next", next)
        .finish();
    format!("{LOGIN_PATH}?{query}")
}

/// Only same-site absolute paths are accepted as post-login targets.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path,
        _ => "/",
    }
}

fn extract_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let from_cookie = CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty());

    from_cookie.or_else(|| {
        let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        let bearer = raw.strip_prefix("Bearer ")?.trim();
        (!bearer.is_empty()).then(|| bearer.to_string())
    })
}

/// The viewer attached by [`resolve_viewer`], if any.
#[derive(Debug, Clone)]
pub struct MaybeViewer(pub Option<Viewer>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeViewer {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Viewer>().cloned()))
    }
}

/// The raw token attached by [`resolve_viewer`], if any.
#[derive(Debug, Clone)]
pub struct MaybeSessionToken(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeSessionToken {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .extensions
                .get::<SessionToken>()
                .map(|token| token.0.clone()),
        ))
    }
}

/// The viewer attached by [`resolve_viewer`]; only used behind a gate.
#[derive(Debug, Clone)]
pub struct CurrentViewer(pub Viewer);

impl<S: Send + Sync> FromRequestParts<S> for CurrentViewer {
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Viewer>()
            .cloned()
            .map(Self)
            .ok_or(StatusCode::FORBIDDEN)
    }
}
