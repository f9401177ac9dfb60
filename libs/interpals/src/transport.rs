//! HTTP transport seam
//!
//! The client only ever talks to the site through [`Transport`], which takes
//! a plain [`HttpRequest`] and returns a plain [`HttpResponse`]. Redirects are
//! never followed: several site endpoints answer with a redirect that carries
//! the actual result.

use async_trait::async_trait;
use common::config::ClientConfig;
use common::{InterpalsError, InterpalsResult};
use reqwest::redirect::Policy;
use tracing::debug;

/// Ordered name/value pairs; repeated names are kept (`sex[]=male&sex[]=female`)
pub type Params = Vec<(String, String)>;

/// Build [`Params`] from borrowed pairs
pub fn params<K, V, I>(pairs: I) -> Params
where
    K: Into<String>,
    V: Into<String>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// HTTP method used by the site endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// A request to one site endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    /// Path relative to the site root, always starting with `/`
    pub path: String,
    pub query: Params,
    /// Url-encoded form body
    pub form: Option<Params>,
    pub headers: Params,
}

impl HttpRequest {
    pub fn new(method: Method, path: &str) -> Self {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        Self {
            method,
            path,
            query: Vec::new(),
            form: None,
            headers: Vec::new(),
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn with_query(mut self, query: Params) -> Self {
        self.query = query;
        self
    }

    pub fn with_form(mut self, form: Params) -> Self {
        self.form = Some(form);
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// First query or form value for `name`
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .chain(self.form.iter().flatten())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First header value for `name`, compared case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Raw answer of the site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Params,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn redirect(status: u16, location: &str) -> Self {
        Self::new(status, "").with_header("Location", location)
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// First header value for `name`, compared case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Every value of a repeated header such as `Set-Cookie`
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    /// Redirect target, when this is a redirect
    pub fn location(&self) -> Option<&str> {
        if self.is_redirect() {
            self.header("Location")
        } else {
            None
        }
    }
}

fn find_header<'a>(headers: &'a Params, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// One round trip to the site
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the raw answer without following redirects
    async fn send(&self, request: HttpRequest) -> InterpalsResult<HttpResponse>;

    /// Origin every request path is resolved against, without a trailing slash
    fn base_url(&self) -> &str;
}

/// Default transport backed by `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Build a transport from the client configuration
    pub fn new(config: &ClientConfig) -> InterpalsResult<Self> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(InterpalsError::transport)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, request: HttpRequest) -> InterpalsResult<HttpResponse> {
        let url = format!("{}{}", self.base_url, request.path);

        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        if let Some(form) = &request.form {
            builder = builder.form(form);
        }

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(InterpalsError::transport)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(InterpalsError::transport)?;

        debug!("{} {} -> {}", request.method.as_str(), request.path, status);

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
