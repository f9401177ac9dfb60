//! Member lists: visitors, search results and friends

use common::{InterpalsError, InterpalsResult};

use super::markup::{self, Element};
use super::{absolute_url, fragment};
use crate::models::{UserRef, UserSummary};

/// Visitors of the session owner's profile, most recent first
pub fn visitors(html: &str) -> InterpalsResult<Vec<UserRef>> {
    markup::find_all(html, "div.vBottomTxt")
        .iter()
        .map(|item| -> InterpalsResult<UserRef> {
            let username = item
                .find("a")
                .and_then(|link| link.attr("href"))
                .map(|href| username_from_href(&href))
                .filter(|name| !name.is_empty())
                .ok_or_else(|| InterpalsError::parse("username", item.outer_html()))?;
            Ok(UserRef::new(username))
        })
        .collect()
}

/// `/alice?_=1` -> `alice`
fn username_from_href(href: &str) -> String {
    let path = href.split(['?', '#']).next().unwrap_or_default();
    path.trim_start_matches('/').to_string()
}

/// One page of search results
pub fn search_results(html: &str) -> InterpalsResult<Vec<UserSummary>> {
    markup::find_all(html, "div.sResMain")
        .iter()
        .map(|item| -> InterpalsResult<UserSummary> {
            let username = item
                .find("a")
                .map(|link| link.clean_text())
                .filter(|name| !name.is_empty())
                .ok_or_else(|| InterpalsError::parse("username", item.outer_html()))?;
            Ok(UserSummary::new(username))
        })
        .collect()
}

/// Friends listed on a member's friends page
pub fn friends(html: &str) -> InterpalsResult<Vec<UserSummary>> {
    markup::find_all(html, "div.friendBox")
        .iter()
        .map(friend)
        .collect()
}

/// Text of a friend box reads `username age city`
fn friend(item: &Element<'_>) -> InterpalsResult<UserSummary> {
    let text = item.clean_text();
    let mut words = text.split_whitespace();

    let username = words
        .next()
        .ok_or_else(|| InterpalsError::parse("username", fragment(item.outer_html())))?;

    let online = item
        .find("img.status")
        .and_then(|img| img.attr("src"))
        .is_some_and(|src| src.contains("online"));

    Ok(UserSummary {
        username: username.to_string(),
        age: words.next().and_then(|age| age.parse().ok()),
        city: words.next().map(str::to_string),
        avatar: item
            .find("img")
            .and_then(|img| img.attr("src"))
            .map(|src| absolute_url(&src)),
        online,
    })
}
