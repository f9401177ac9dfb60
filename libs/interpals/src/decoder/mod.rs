//! Response decoding
//!
//! Every piece of knowledge about the site markup lives below this module.
//! The functions are pure: payload text in, records out. Optional fields
//! that cannot be found decode to `None` or an empty value; a missing
//! identity field is reported as [`InterpalsError::Parse`].

pub mod chat;
pub mod markup;
pub mod pictures;
pub mod profile;
pub mod users;

use std::sync::LazyLock;

use common::{InterpalsError, InterpalsResult};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

static CSRF_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<meta name="csrf_token" content="(.*?)""#).expect("CSRF_TOKEN_RE should compile")
});

/// Link present on every page served to a logged-in member
pub const LOGOUT_MARKER: &str = "/app/auth/logout";

/// Body of the page served after too many failed logins
pub const LOGIN_THROTTLED: &str = "Too many unsuccessful login attempts.";

const USER_NOT_FOUND: &str = "User not found.";
const USER_BLOCKED: &str =
    "Sorry, this user's privacy settings do not allow you to contact them.";

/// Longest fragment kept inside a parse error
const FRAGMENT_LIMIT: usize = 512;

/// CSRF token of the `<meta name="csrf_token">` tag
pub fn csrf_token(html: &str) -> Option<String> {
    CSRF_TOKEN_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Whether the page was rendered for a logged-in member
pub fn is_authenticated(html: &str) -> bool {
    html.contains(LOGOUT_MARKER)
}

pub fn is_login_throttled(html: &str) -> bool {
    html.contains(LOGIN_THROTTLED)
}

/// Whether a profile page reports the user as missing or hidden from the caller
pub fn is_user_unavailable(html: &str) -> bool {
    html.contains(USER_NOT_FOUND) || html.contains(USER_BLOCKED)
}

#[derive(Debug, Deserialize)]
struct Envelope {
    body: Option<String>,
    error: Option<Value>,
}

/// HTML carried by an AJAX answer shaped `{"body": "<html>"}`
pub fn ajax_body(json: &str) -> InterpalsResult<String> {
    let envelope: Envelope =
        serde_json::from_str(json).map_err(|_| InterpalsError::parse("body", fragment(json)))?;

    if let Some(error) = envelope.error {
        return Err(InterpalsError::Site(error_text(&error)));
    }

    envelope
        .body
        .ok_or_else(|| InterpalsError::parse("body", fragment(json)))
}

/// The `error` member of an AJAX answer, if any
pub fn ajax_error(json: &str) -> Option<String> {
    match serde_json::from_str::<Value>(json) {
        Ok(value) => value.get("error").map(error_text),
        // Some actions answer with a bare string; look for the marker anyway
        Err(_) => json.contains("\"error\"").then(|| fragment(json)),
    }
}

fn error_text(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// City code of the first city-autocomplete suggestion
pub fn city_code(json: &str) -> InterpalsResult<Option<String>> {
    let value: Value =
        serde_json::from_str(json).map_err(|_| InterpalsError::parse("items", fragment(json)))?;

    let code = value
        .get("items")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(|item| item.get("id"))
        .and_then(|id| match id {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

    Ok(code)
}

/// `thread_id` query parameter of a redirect location
pub fn thread_id_from_location(location: &str) -> Option<String> {
    query_param(location, "thread_id").filter(|id| !id.is_empty())
}

/// First value of `name` in the query string of `url`
pub(crate) fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    let query = query.split('#').next().unwrap_or_default();

    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        (key == name).then(|| value.to_string())
    })
}

/// Protocol-relative URLs from the static host made absolute
pub(crate) fn absolute_url(src: &str) -> String {
    if src.starts_with("//") {
        format!("https:{src}")
    } else {
        src.to_string()
    }
}

/// Truncated copy of a payload, kept for parse errors
pub(crate) fn fragment(payload: &str) -> String {
    if payload.len() <= FRAGMENT_LIMIT {
        return payload.to_string();
    }
    let mut end = FRAGMENT_LIMIT;
    while !payload.is_char_boundary(end) {
        end -= 1;
    }
    payload[..end].to_string()
}
