//! Conversation list and message history decoding

use common::{InterpalsError, InterpalsResult};

use super::markup::{self, Element};
use super::{absolute_url, fragment};
use crate::models::{Direction, Message, Sex, ThreadSummary};

/// Highest message id of the conversation page, sent back when paging threads
pub fn max_msg_id(html: &str) -> InterpalsResult<String> {
    markup::find(html, "div#threads_left")
        .and_then(|e| e.attr("data-max-msg-id"))
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| InterpalsError::parse("max_msg_id", fragment(html)))
}

/// Site-wide unread counter, `0` when absent
pub fn unread_count(html: &str) -> u32 {
    markup::find(html, "span#pmNewCnt")
        .map(|e| {
            e.text()
                .chars()
                .filter(char::is_ascii_digit)
                .collect::<String>()
        })
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0)
}

/// Thread summaries of one page of the conversation list
pub fn threads(html: &str) -> InterpalsResult<Vec<ThreadSummary>> {
    markup::find_all(html, "div.pm_thread")
        .iter()
        .map(thread)
        .collect()
}

fn thread(element: &Element<'_>) -> InterpalsResult<ThreadSummary> {
    let thread_id = element
        .attr("id")
        .and_then(|id| id.strip_prefix("thread_").map(str::to_string))
        .filter(|id| !id.is_empty())
        .ok_or_else(|| InterpalsError::parse("thread_id", fragment(element.outer_html())))?;

    let info = element.find_all("div.tui_el");
    let (username, age) = match info.first().map(|e| e.clean_text()) {
        Some(text) => match text.split_once(", ") {
            Some((user, age)) => (Some(user.to_string()), age.trim().parse().ok()),
            None => ((!text.is_empty()).then_some(text), None),
        },
        None => (None, None),
    };
    let sex = info
        .first()
        .and_then(|e| e.classes().get(1).cloned())
        .and_then(|class| Sex::from_str(&class));
    let city = info.get(1).map(|e| e.clean_text()).filter(|c| !c.is_empty());

    let snippet = element.find(".th_snippet");

    Ok(ThreadSummary {
        thread_id,
        username,
        age,
        sex,
        city,
        avatar: element
            .find(".thumb")
            .and_then(|e| e.attr("src"))
            .map(|src| absolute_url(&src)),
        flag: element
            .find("div.tui_flag")
            .and_then(|e| e.find("img"))
            .and_then(|img| img.attr("src"))
            .map(|src| absolute_url(&src)),
        online: element.find(".online-now").is_some(),
        is_new: element.has_class("new"),
        snippet: snippet
            .as_ref()
            .map(|e| e.clean_text())
            .filter(|s| !s.is_empty()),
        sent_last: element.find(".snippet_thumb").is_some(),
        unread: snippet.as_ref().is_some_and(|e| e.has_class("pm_new")),
    })
}

/// Messages of a thread, oldest first
///
/// Day headings and author thumbnails are only printed when they change, so
/// both carry forward to the following messages. `own_username` decides the
/// direction of each message.
pub fn messages(html: &str, own_username: &str) -> Vec<Message> {
    let mut date: Option<String> = None;
    let mut sender: Option<String> = None;
    let mut messages = Vec::new();

    for element in markup::select(html, |tag| tag.has_class("pm_date") || tag.has_class("pm_msg")) {
        if element.has_class("pm_date") {
            date = Some(element.clean_text()).filter(|d| !d.is_empty());
            continue;
        }

        if let Some(author) = element
            .find("div.msg_user_thumb")
            .and_then(|thumb| thumb.find("a"))
            .and_then(|link| link.attr("href"))
        {
            let author = author
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string();
            sender = Some(author).filter(|a| !a.is_empty());
        }

        let direction = match &sender {
            Some(author) if author.eq_ignore_ascii_case(own_username) => Direction::Sent,
            _ => Direction::Received,
        };

        messages.push(Message {
            msg_id: element
                .attr("id")
                .and_then(|id| id.strip_prefix("msg_").map(str::to_string)),
            sender: sender.clone(),
            body: element
                .find("div.msg_body")
                .map(|e| e.text().trim().to_string())
                .unwrap_or_default(),
            date: date.clone(),
            time: element
                .find("div.pm_time")
                .map(|e| e.clean_text())
                .filter(|t| !t.is_empty()),
            direction,
            unread: element.has_class("pm_unread"),
        });
    }

    messages
}
