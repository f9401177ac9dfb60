//! Public operations of the client
//!
//! [`Api`] borrows a logged-in [`Session`] and turns each operation into one
//! or more site requests plus decoding. Nothing is retried.

use std::collections::HashMap;
use std::time::Duration;

use common::{InterpalsError, InterpalsResult};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::decoder::{self, chat, pictures, profile, users};
use crate::models::{Album, ChatPage, Message, Picture, Profile, UserRef, UserSummary};
use crate::search::{SearchCriteria, SearchIter};
use crate::session::Session;
use crate::transport::{HttpResponse, Params, params};
use crate::validation::{validate_message, validate_username};

/// Private messages endpoint, both the page and its AJAX actions
pub const PM_PATH: &str = "/pm.php";

/// Client operations over a session
pub struct Api<'s> {
    session: &'s Session,
    uid_cache: Mutex<HashMap<String, u64>>,
}

impl<'s> Api<'s> {
    pub fn new(session: &'s Session) -> Self {
        Self {
            session,
            uid_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn session(&self) -> &'s Session {
        self.session
    }

    /// Whether the site still treats the session as logged in
    pub async fn check_auth(&self) -> InterpalsResult<bool> {
        if !self.session.is_authenticated() {
            return Ok(false);
        }

        let path = format!("/{}", self.session.username());
        match self.session.get(&path, Vec::new()).await {
            Ok(response) => Ok(decoder::is_authenticated(&response.body)),
            Err(InterpalsError::SessionExpired) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Profile of `username`
    pub async fn profile(&self, username: &str) -> InterpalsResult<Profile> {
        let html = self.profile_page(username).await?;
        let profile = profile::profile(&html, username)?;

        self.uid_cache
            .lock()
            .await
            .insert(username.to_string(), profile.uid);

        Ok(profile)
    }

    /// Open the profile of `username` so the visit shows up on their side
    pub async fn view(&self, username: &str) -> InterpalsResult<()> {
        self.profile_page(username).await?;
        debug!("Viewed profile of {}", username);
        Ok(())
    }

    /// Members who recently viewed the session owner's profile, most recent first
    pub async fn visitors(&self) -> InterpalsResult<Vec<UserRef>> {
        let html = html_page(self.session, "/app/views", Vec::new()).await?;
        users::visitors(&html)
    }

    /// Numeric id of `username`, looked up once per [`Api`]
    pub async fn get_uid(&self, username: &str) -> InterpalsResult<u64> {
        if let Some(uid) = self.uid_cache.lock().await.get(username) {
            return Ok(*uid);
        }

        let uid = self.profile(username).await?.uid;
        debug!("Resolved uid of {} to {}", username, uid);
        Ok(uid)
    }

    /// Search members matching `criteria`
    ///
    /// The criteria are checked here; no request is made until the returned
    /// iterator is advanced.
    pub fn search(
        &self,
        criteria: SearchCriteria,
        limit: Option<usize>,
        timeout: Option<Duration>,
    ) -> InterpalsResult<SearchIter<'s>> {
        criteria.validate()?;
        Ok(SearchIter::new(self.session, criteria, limit, timeout))
    }

    /// Friends of the member `uid`
    pub async fn friends(&self, uid: u64) -> InterpalsResult<Vec<UserSummary>> {
        let html = html_page(self.session, "/app/friends", uid_query(uid)).await?;
        users::friends(&html)
    }

    /// Send a friend request; succeeds when the member already is a friend
    pub async fn friend_add(&self, uid: u64) -> InterpalsResult<()> {
        let response = self.session.get("/app/friends/add", uid_query(uid)).await?;
        expect_action(&response, "add friend")?;
        info!("Friend request sent to {}", uid);
        Ok(())
    }

    /// Remove a friend; succeeds when the member is not a friend
    pub async fn friend_remove(&self, uid: u64) -> InterpalsResult<()> {
        let response = self.session.get("/app/friends/delete", uid_query(uid)).await?;
        expect_action(&response, "remove friend")?;
        info!("Friend {} removed", uid);
        Ok(())
    }

    /// Album headers of the member `uid`
    pub async fn albums(&self, uid: u64) -> InterpalsResult<Vec<Album>> {
        let html = html_page(self.session, "/app/albums", uid_query(uid)).await?;
        pictures::albums(&html, uid)
    }

    /// Pictures of album `aid` of the member `uid`
    pub async fn pictures(&self, uid: u64, aid: &str) -> InterpalsResult<Vec<Picture>> {
        let query = params([("uid", uid.to_string().as_str()), ("aid", aid)]);
        let html = html_page(self.session, "/app/album", query).await?;

        if pictures::is_album_missing(&html) {
            return Err(InterpalsError::NotFound(format!("album {aid} of user {uid}")));
        }

        pictures::pictures(&html)
    }

    /// Up to `count` conversations starting at `offset`, plus the unread counter
    pub async fn chat(&self, count: usize, offset: usize) -> InterpalsResult<ChatPage> {
        let html = html_page(self.session, PM_PATH, Vec::new()).await?;
        let max_msg_id = chat::max_msg_id(&html)?;
        let unread = chat::unread_count(&html);

        let mut chats = Vec::new();
        let mut offset = offset;

        while chats.len() < count {
            let form = params([
                ("action", "more_threads"),
                ("from", offset.to_string().as_str()),
                ("filter", "all"),
                ("max_msg_id", max_msg_id.as_str()),
            ]);
            let body = self.ajax(form).await?;
            let threads = chat::threads(&body)?;
            if threads.is_empty() {
                break;
            }

            offset += threads.len();
            let wanted = count - chats.len();
            chats.extend(threads.into_iter().take(wanted));
        }

        debug!("Loaded {} conversations", chats.len());
        Ok(ChatPage { chats, unread })
    }

    /// Conversation id with the member `uid`
    ///
    /// The site answers with a redirect to the conversation.
    pub async fn get_thread_id(&self, uid: u64) -> InterpalsResult<String> {
        let query = params([("action", "send"), ("uid", uid.to_string().as_str())]);
        let response = self.session.get(PM_PATH, query).await?;

        match response.location() {
            Some(location) => decoder::thread_id_from_location(location)
                .ok_or_else(|| InterpalsError::parse("thread_id", location)),
            None if response.is_success() || response.status == 404 => Err(
                InterpalsError::NotFound(format!("conversation with user {uid}")),
            ),
            None => Err(unexpected_status(&response, "open conversation")),
        }
    }

    /// Latest messages of a conversation, oldest first
    pub async fn chat_messages(&self, thread_id: &str) -> InterpalsResult<Vec<Message>> {
        self.load_messages(thread_id, None).await
    }

    /// Messages older than `last_msg_id`, oldest first
    pub async fn chat_messages_before(
        &self,
        thread_id: &str,
        last_msg_id: &str,
    ) -> InterpalsResult<Vec<Message>> {
        self.load_messages(thread_id, Some(last_msg_id)).await
    }

    /// Send `text` to a conversation
    pub async fn chat_send(&self, thread_id: &str, text: &str) -> InterpalsResult<()> {
        validate_thread_id(thread_id)?;
        validate_message(text)?;

        let form = params([
            ("action", "send_message"),
            ("thread", thread_id),
            ("message", text),
        ]);
        let response = self.session.post(PM_PATH, form).await?;

        if !response.is_success() {
            return Err(unexpected_status(&response, "send message"));
        }
        if let Some(error) = decoder::ajax_error(&response.body) {
            return Err(InterpalsError::Site(error));
        }

        info!("Message sent to thread {}", thread_id);
        Ok(())
    }

    /// Delete a conversation; deleting a missing one succeeds
    pub async fn chat_delete(&self, thread_id: &str) -> InterpalsResult<()> {
        validate_thread_id(thread_id)?;

        let form = params([
            ("action", "delete_thread"),
            ("thread", thread_id),
            ("block_user", "0"),
        ]);
        let response = self.session.post(PM_PATH, form).await?;

        if response.status >= 500 {
            return Err(unexpected_status(&response, "delete conversation"));
        }

        info!("Thread {} deleted", thread_id);
        Ok(())
    }

    async fn profile_page(&self, username: &str) -> InterpalsResult<String> {
        validate_username(username)?;

        let html = html_page(self.session, &format!("/{username}"), Vec::new()).await?;
        if decoder::is_user_unavailable(&html) {
            return Err(InterpalsError::NotFound(format!("user {username}")));
        }

        Ok(html)
    }

    async fn load_messages(
        &self,
        thread_id: &str,
        last_msg_id: Option<&str>,
    ) -> InterpalsResult<Vec<Message>> {
        validate_thread_id(thread_id)?;

        let mut form = params([("action", "load_messages"), ("thread", thread_id)]);
        if let Some(last_msg_id) = last_msg_id {
            form.push(("last_msg_id".to_string(), last_msg_id.to_string()));
        }

        let body = self.ajax(form).await?;
        Ok(chat::messages(&body, self.session.username()))
    }

    /// HTML carried by a `/pm.php` AJAX answer
    async fn ajax(&self, form: Params) -> InterpalsResult<String> {
        let response = self.session.post(PM_PATH, form).await?;
        if !response.is_success() {
            return Err(unexpected_status(&response, "load conversation data"));
        }
        decoder::ajax_body(&response.body)
    }
}

/// GET an HTML page that must be served to a logged-in member
///
/// A redirect or a 404 means the target does not exist; a page without the
/// logout link means the site no longer recognises the session.
pub(crate) async fn html_page(
    session: &Session,
    path: &str,
    query: Params,
) -> InterpalsResult<String> {
    let response = session.get(path, query).await?;

    if response.is_redirect() || response.status == 404 {
        return Err(InterpalsError::NotFound(path.to_string()));
    }
    if !response.is_success() {
        return Err(unexpected_status(&response, path));
    }
    if !decoder::is_authenticated(&response.body) {
        return Err(InterpalsError::SessionExpired);
    }

    Ok(response.body)
}

/// Friend actions redirect back to the profile, or render a logged-in page
fn expect_action(response: &HttpResponse, action: &str) -> InterpalsResult<()> {
    if response.is_redirect() {
        return Ok(());
    }
    if response.is_success() {
        return if decoder::is_authenticated(&response.body) {
            Ok(())
        } else {
            Err(InterpalsError::SessionExpired)
        };
    }
    Err(unexpected_status(response, action))
}

fn unexpected_status(response: &HttpResponse, action: &str) -> InterpalsError {
    InterpalsError::Site(format!(
        "{action}: unexpected status {}",
        response.status
    ))
}

fn uid_query(uid: u64) -> Params {
    params([("uid", uid.to_string())])
}

fn validate_thread_id(thread_id: &str) -> InterpalsResult<()> {
    if thread_id.is_empty() || !thread_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(InterpalsError::Validation(format!(
            "Thread id {thread_id:?} must be numeric"
        )));
    }
    Ok(())
}
