//! Cookie jar kept by a session

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::transport::HttpResponse;

/// Name of the cookie carrying the site session id
pub const SESSION_COOKIE: &str = "interpals_sessid";

/// Name of the cookie carrying the CSRF secret
pub const CSRF_COOKIE: &str = "csrf_cookieV2";

/// Cookies by name, rendered in name order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieJar {
    cookies: BTreeMap<String, String>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cookies.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Apply every `Set-Cookie` header of `response`
    pub fn update_from(&mut self, response: &HttpResponse) {
        for header in response.header_values("Set-Cookie") {
            let Some(cookie) = SetCookie::parse(header) else {
                continue;
            };
            if cookie.expired {
                self.cookies.remove(&cookie.name);
            } else {
                self.cookies.insert(cookie.name, cookie.value);
            }
        }
    }

    /// Value for the `Cookie` request header
    pub fn header_value(&self) -> String {
        self.cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl From<BTreeMap<String, String>> for CookieJar {
    fn from(cookies: BTreeMap<String, String>) -> Self {
        Self { cookies }
    }
}

/// The name/value part of one `Set-Cookie` header
#[derive(Debug, PartialEq, Eq)]
struct SetCookie {
    name: String,
    value: String,
    expired: bool,
}

impl SetCookie {
    fn parse(header: &str) -> Option<Self> {
        let mut parts = header.split(';');
        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let value = value.trim().trim_matches('"');

        let expired = value == "deleted"
            || parts.any(|attr| {
                attr.trim()
                    .split_once('=')
                    .is_some_and(|(k, v)| k.trim().eq_ignore_ascii_case("max-age") && v.trim() == "0")
            });

        Some(Self {
            name: name.to_string(),
            value: value.to_string(),
            expired,
        })
    }
}
