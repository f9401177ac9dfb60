//! Authenticated session with the site
//!
//! A [`Session`] owns the cookie jar obtained by logging in and attaches it to
//! every request made on behalf of higher layers. Cookies only change at
//! login and logout, so a session can be shared by reference.

use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{InterpalsError, InterpalsResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cookie::{CookieJar, SESSION_COOKIE};
use crate::decoder;
use crate::transport::{HttpRequest, HttpResponse, Method, Params, Transport, params};

/// Login form endpoint
pub const LOGIN_PATH: &str = "/app/auth/login";

/// Serializable state of a logged-in session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub username: String,
    pub cookies: CookieJar,
    pub created_at: DateTime<Utc>,
}

/// Logged-in session
pub struct Session {
    username: String,
    cookies: CookieJar,
    authenticated: bool,
    logged_in_at: DateTime<Utc>,
    transport: Arc<dyn Transport>,
}

impl Session {
    /// Log in with `username` and `password`
    ///
    /// The password is only sent in the login form and is not kept.
    pub async fn login(
        transport: Arc<dyn Transport>,
        username: &str,
        password: &str,
    ) -> InterpalsResult<Self> {
        info!("Logging in as {}", username);
        let mut cookies = CookieJar::new();

        // Initial page: first cookies and the form token
        let response = transport.send(HttpRequest::get("/")).await?;
        cookies.update_from(&response);
        let csrf_token = decoder::csrf_token(&response.body).ok_or_else(|| {
            InterpalsError::Authentication("no CSRF token on the login page".to_string())
        })?;

        let request = HttpRequest::post(LOGIN_PATH)
            .with_form(params([
                ("username", username),
                ("password", password),
                ("csrf_token", csrf_token.as_str()),
            ]))
            .with_header("Cookie", cookies.header_value())
            .with_header("Referer", format!("{}/", transport.base_url()));
        let response = transport.send(request).await?;
        cookies.update_from(&response);

        let location = match response.status {
            200 => {
                warn!("Login refused for {}: wrong username or password", username);
                return Err(InterpalsError::Authentication(
                    "wrong username or password".to_string(),
                ));
            }
            302 => response.header("Location").map(site_path).ok_or_else(|| {
                InterpalsError::Authentication("login redirect without a location".to_string())
            })?,
            status => {
                warn!("Unexpected login response status {} for {}", status, username);
                return Err(InterpalsError::Authentication(format!(
                    "unexpected login response status {status}"
                )));
            }
        };

        let response = transport
            .send(HttpRequest::get(&location).with_header("Cookie", cookies.header_value()))
            .await?;
        cookies.update_from(&response);

        if decoder::is_login_throttled(&response.body) {
            warn!("Login throttled for {}", username);
            return Err(InterpalsError::Authentication(
                "too many unsuccessful login attempts".to_string(),
            ));
        }

        if !cookies.contains(SESSION_COOKIE) {
            return Err(InterpalsError::Authentication(format!(
                "no {SESSION_COOKIE} cookie issued"
            )));
        }

        info!("Logged in as {}", username);
        Ok(Self {
            username: username.to_string(),
            cookies,
            authenticated: true,
            logged_in_at: Utc::now(),
            transport,
        })
    }

    /// Session from cookies obtained elsewhere
    pub fn new(
        transport: Arc<dyn Transport>,
        username: impl Into<String>,
        cookies: CookieJar,
    ) -> InterpalsResult<Self> {
        if !cookies.contains(SESSION_COOKIE) {
            return Err(InterpalsError::Authentication(format!(
                "no {SESSION_COOKIE} cookie provided"
            )));
        }

        Ok(Self {
            username: username.into(),
            cookies,
            authenticated: true,
            logged_in_at: Utc::now(),
            transport,
        })
    }

    /// Session from a snapshot taken by [`Session::snapshot`]
    pub fn restore(snapshot: SessionSnapshot, transport: Arc<dyn Transport>) -> InterpalsResult<Self> {
        let mut session = Self::new(transport, snapshot.username, snapshot.cookies)?;
        session.logged_in_at = snapshot.created_at;
        debug!("Restored session of {}", session.username);
        Ok(session)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            username: self.username.clone(),
            cookies: self.cookies.clone(),
            created_at: self.logged_in_at,
        }
    }

    /// Write the session as JSON
    pub fn dump<W: Write>(&self, writer: W) -> InterpalsResult<()> {
        if !self.authenticated {
            return Err(InterpalsError::SessionExpired);
        }
        serde_json::to_writer(writer, &self.snapshot())?;
        Ok(())
    }

    /// Read a session written by [`Session::dump`]
    pub fn load<R: Read>(reader: R, transport: Arc<dyn Transport>) -> InterpalsResult<Self> {
        let snapshot: SessionSnapshot = serde_json::from_reader(reader)?;
        Self::restore(snapshot, transport)
    }

    /// Forget the cookies; later requests fail without reaching the network
    pub fn logout(&mut self) {
        if self.authenticated {
            info!("Logging out {}", self.username);
        }
        self.cookies.clear();
        self.authenticated = false;
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn logged_in_at(&self) -> DateTime<Utc> {
        self.logged_in_at
    }

    /// Send a request carrying the session cookies
    ///
    /// Fails with [`InterpalsError::SessionExpired`] when the session was
    /// logged out, when the site answers 401/403, or when it redirects to
    /// the login page.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: Params,
        form: Option<Params>,
    ) -> InterpalsResult<HttpResponse> {
        if !self.authenticated {
            return Err(InterpalsError::SessionExpired);
        }

        let mut request = HttpRequest::new(method, path)
            .with_query(query)
            .with_header("Cookie", self.cookies.header_value());
        if let Some(form) = form {
            request = request.with_form(form);
        }

        let response = self.transport.send(request).await?;

        if matches!(response.status, 401 | 403) || response.location().is_some_and(is_login_location)
        {
            warn!(
                "Session of {} rejected on {} {} (status {})",
                self.username,
                method.as_str(),
                path,
                response.status
            );
            return Err(InterpalsError::SessionExpired);
        }

        Ok(response)
    }

    pub async fn get(&self, path: &str, query: Params) -> InterpalsResult<HttpResponse> {
        self.request(Method::Get, path, query, None).await
    }

    pub async fn post(&self, path: &str, form: Params) -> InterpalsResult<HttpResponse> {
        self.request(Method::Post, path, Vec::new(), Some(form)).await
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("username", &self.username)
            .field("authenticated", &self.authenticated)
            .field("cookies", &self.cookies.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .field("logged_in_at", &self.logged_in_at)
            .finish()
    }
}

/// Path and query of a possibly absolute location
fn site_path(location: &str) -> String {
    match location.split_once("://") {
        Some((_, rest)) => rest
            .find('/')
            .map_or_else(|| "/".to_string(), |pos| rest[pos..].to_string()),
        None => location.to_string(),
    }
}

/// Whether a redirect sends the client back to the login form
fn is_login_location(location: &str) -> bool {
    let path = site_path(location);
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path.starts_with(LOGIN_PATH) || path.trim_end_matches('/').ends_with("/login")
}
