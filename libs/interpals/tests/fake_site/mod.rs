//! In-process stand-in for the site, served by axum on a random local port
//!
//! Serves just enough markup for the client decoders. State (friends,
//! conversations, request log) lives behind a mutex so tests can inspect it.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    Form, Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{Request, StatusCode, header},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use common::config::ClientConfig;
use interpals::{ReqwestTransport, Transport};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const USERNAME: &str = "alice";
pub const PASSWORD: &str = "wonderland";

const LOGIN_TOKEN: &str = "login-tok";
const SEARCH_TOKEN: &str = "search-tok";
const SESSION_ID: &str = "sess-1";

/// Members with a profile: username, uid
pub const MEMBERS: [(&str, u64); 3] = [("alice", 1001), ("bob", 1002), ("carol", 1003)];

/// Members returned by search
pub const SEARCH_TOTAL: usize = 12;
pub const SEARCH_PAGE: usize = 5;

const THREAD_PAGE: usize = 5;

pub const ALBUM_ID: &str = "77";

#[derive(Debug, Clone)]
pub struct Thread {
    pub id: String,
    pub peer: String,
    /// Sender and body
    pub messages: Vec<(String, String)>,
}

#[derive(Debug)]
pub struct SiteState {
    /// `METHOD /path?query` of every request
    pub requests: Vec<String>,
    pub friends: BTreeSet<u64>,
    pub threads: Vec<Thread>,
    next_thread: u64,
}

impl SiteState {
    fn seeded() -> Self {
        Self {
            requests: Vec::new(),
            friends: BTreeSet::new(),
            threads: vec![
                Thread {
                    id: "7001".to_string(),
                    peer: "bob".to_string(),
                    messages: vec![
                        ("bob".to_string(), "Hi alice".to_string()),
                        ("alice".to_string(), "Hi bob".to_string()),
                    ],
                },
                Thread {
                    id: "7002".to_string(),
                    peer: "carol".to_string(),
                    messages: vec![("carol".to_string(), "Hello from Lyon".to_string())],
                },
            ],
            next_thread: 7100,
        }
    }
}

type Shared = Arc<Mutex<SiteState>>;

pub struct FakeSite {
    addr: SocketAddr,
    state: Shared,
    handle: JoinHandle<()>,
}

impl FakeSite {
    pub async fn start() -> Self {
        init_tracing();

        let state = Arc::new(Mutex::new(SiteState::seeded()));
        let app = router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake site");
        let addr = listener.local_addr().expect("Failed to read local address");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Fake site stopped");
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        let config = ClientConfig::with_base_url(self.url());
        Arc::new(ReqwestTransport::new(&config).expect("Failed to build transport"))
    }

    /// Number of requests whose path is `path`
    pub fn hits(&self, path: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|line| {
                let target = line.split_once(' ').map_or("", |(_, t)| t);
                target.split('?').next() == Some(path)
            })
            .count()
    }

    /// `METHOD /path?query` of every request so far
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    pub fn friends(&self) -> BTreeSet<u64> {
        self.state.lock().unwrap().friends.clone()
    }

    pub fn thread_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .threads
            .iter()
            .map(|t| t.id.clone())
            .collect()
    }

    pub fn shutdown(self) {
        self.handle.abort();
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn uid_of(username: &str) -> Option<u64> {
    MEMBERS
        .iter()
        .find(|(name, _)| *name == username)
        .map(|(_, uid)| *uid)
}

fn username_of(uid: u64) -> Option<&'static str> {
    MEMBERS
        .iter()
        .find(|(_, id)| *id == uid)
        .map(|(name, _)| *name)
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/app/auth/login", axum::routing::post(login))
        .route("/app/account", get(account))
        .route("/app/views", get(views))
        .route("/app/search", get(search))
        .route("/app/async/geoAc", get(city_lookup))
        .route("/app/friends", get(friends))
        .route("/app/friends/add", get(friend_add))
        .route("/app/friends/delete", get(friend_delete))
        .route("/app/albums", get(albums))
        .route("/app/album", get(album))
        .route("/pm.php", get(pm_page).post(pm_action))
        .route("/:username", get(profile))
        .layer(middleware::from_fn_with_state(state.clone(), gatekeeper))
        .with_state(state)
}

/// Log every request and send visitors without a session to the login form
async fn gatekeeper(State(state): State<Shared>, request: Request<Body>, next: Next) -> Response {
    state
        .lock()
        .unwrap()
        .requests
        .push(format!("{} {}", request.method(), request.uri()));

    let public = matches!(request.uri().path(), "/" | "/app/auth/login");
    let has_session = request
        .headers()
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|cookies| cookies.contains(&format!("interpals_sessid={SESSION_ID}")));

    if !public && !has_session {
        return redirect(StatusCode::FOUND, "/app/auth/login");
    }

    next.run(request).await
}

fn page(body: &str) -> Response {
    Html(format!(
        "<html><body><a href=\"/app/auth/logout\">Log out</a>\n{body}\n</body></html>"
    ))
    .into_response()
}

fn redirect(status: StatusCode, location: &str) -> Response {
    (status, [(header::LOCATION, location.to_string())]).into_response()
}

fn param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

async fn home() -> Response {
    (
        [(header::SET_COOKIE, "csrf_cookieV2=csrf-1; path=/")],
        Html(format!(
            r#"<html><head><meta name="csrf_token" content="{LOGIN_TOKEN}"></head><body>Welcome</body></html>"#
        )),
    )
        .into_response()
}

async fn login(Form(form): Form<HashMap<String, String>>) -> Response {
    let field = |name: &str| form.get(name).map(String::as_str);
    let accepted = field("username") == Some(USERNAME)
        && field("password") == Some(PASSWORD)
        && field("csrf_token") == Some(LOGIN_TOKEN);

    if !accepted {
        return Html("<form>Wrong username or password</form>").into_response();
    }

    (
        StatusCode::FOUND,
        [
            (header::LOCATION, "/app/account".to_string()),
            (
                header::SET_COOKIE,
                format!("interpals_sessid={SESSION_ID}; path=/; HttpOnly"),
            ),
        ],
    )
        .into_response()
}

async fn account() -> Response {
    page("<h1>My account</h1>")
}

async fn profile(Path(username): Path<String>) -> Response {
    let Some(uid) = uid_of(&username) else {
        return page("<p>User not found.</p>");
    };

    page(&format!(
        r##"
<div class="profileBox">
    <img src="//ipstatic.net/images/male_sm.png">
    <h1>{username}</h1>
    {username} Example, 30 y.o.
    <p>
        Joined:
        Jan 2020,
        Updated:
        Oct 2026.
    </p>
</div>
<div class="profLocation">
    <a href="/app/search?continent=EU">Europe</a>
    <a href="/app/search?city=2996944">Lyon</a>
    <a href="/country/FR">France</a>
</div>
<div class="profOnlineStatus">Online now</div>
<span id="prStatMsgTxt">Hello</span>
<a class="mainPhoto" href="/photo"><img src="//ipstatic.net/thumbs/{username}.jpg"></a>
<a class="profReportLink" user-id="{uid}" href="#">Report</a>
<div class="profDataBox"><h2>About me</h2><div class="profDataBoxText">Testing</div></div>
"##
    ))
}

async fn views() -> Response {
    page(
        r#"
<div class="vBottomTxt"><a href="/bob?from=views">bob</a></div>
<div class="vBottomTxt"><a href="/carol?from=views">carol</a></div>
"#,
    )
}

async fn search(Query(params): Query<Vec<(String, String)>>) -> Response {
    let Some(offset) = param(&params, "offset") else {
        return page(&format!(
            r#"<meta name="csrf_token" content="{SEARCH_TOKEN}"><form id="search"></form>"#
        ));
    };

    if param(&params, "csrf_token") != Some(SEARCH_TOKEN) {
        return page("<p>Invalid form token</p>");
    }

    let offset: usize = offset.parse().unwrap_or(0);
    let results: String = (offset..SEARCH_TOTAL.min(offset + SEARCH_PAGE))
        .map(|i| format!(r#"<div class="sResMain"><a href="/member{i}">member{i}</a></div>"#))
        .collect();
    page(&results)
}

async fn city_lookup(Query(params): Query<Vec<(String, String)>>) -> Response {
    match param(&params, "query") {
        Some("Lyon") => Json(json!({"items": [{"id": "2996944", "name": "Lyon"}]})).into_response(),
        _ => Json(json!({"items": []})).into_response(),
    }
}

fn uid_param(params: &[(String, String)]) -> Option<u64> {
    param(params, "uid").and_then(|uid| uid.parse().ok())
}

async fn friends(
    State(state): State<Shared>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    if uid_param(&params) != uid_of(USERNAME) {
        return page("");
    }

    let boxes: String = state
        .lock()
        .unwrap()
        .friends
        .iter()
        .filter_map(|uid| username_of(*uid))
        .map(|name| {
            format!(
                r#"<div class="friendBox"><img src="//ipstatic.net/thumbs/{name}.jpg"><img class="status" src="/images/online.png"><a href="/{name}">{name}</a> 30 Lyon</div>"#
            )
        })
        .collect();
    page(&boxes)
}

async fn friend_add(
    State(state): State<Shared>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let Some(uid) = uid_param(&params).filter(|uid| username_of(*uid).is_some()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    state.lock().unwrap().friends.insert(uid);
    redirect(StatusCode::FOUND, &format!("/app/friends?uid={uid}"))
}

async fn friend_delete(
    State(state): State<Shared>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let Some(uid) = uid_param(&params) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    state.lock().unwrap().friends.remove(&uid);
    redirect(StatusCode::FOUND, &format!("/app/friends?uid={uid}"))
}

async fn albums(Query(params): Query<Vec<(String, String)>>) -> Response {
    let uid = uid_param(&params).unwrap_or_default();
    page(&format!(
        r#"
<div class="editAlbumBox">
    <a class="albEditThumb" href="/app/album?aid={ALBUM_ID}&amp;uid={uid}"><img src="//ipstatic.net/a.jpg"></a>
    <h3>Holidays</h3>
    <div class="albumStats">2 photos | Created Jan 2024 | Updated Feb 2024</div>
    <a class="thumb" href="/p1"><img src="//ipstatic.net/thumbs/180x180/h/1.jpg"></a>
</div>
"#
    ))
}

async fn album(Query(params): Query<Vec<(String, String)>>) -> Response {
    if param(&params, "aid") != Some(ALBUM_ID) {
        return page("<h1>Album not found</h1>");
    }
    page(
        r#"
<div class="albThumb"><a href="/p1"><img src="//ipstatic.net/thumbs/180x180/h/1.jpg"></a></div>
<div class="albThumb"><a href="/p2"><img src="//ipstatic.net/thumbs/180x180/h/2.jpg"></a></div>
"#,
    )
}

async fn pm_page(
    State(state): State<Shared>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    if param(&params, "action") == Some("send") {
        let Some(peer) = uid_param(&params).and_then(username_of) else {
            return page("<p>User not found.</p>");
        };

        let mut state = state.lock().unwrap();
        let existing = state.threads.iter().find(|t| t.peer == peer).map(|t| t.id.clone());
        let id = match existing {
            Some(id) => id,
            None => {
                state.next_thread += 1;
                let id = state.next_thread.to_string();
                state.threads.push(Thread {
                    id: id.clone(),
                    peer: peer.to_string(),
                    messages: Vec::new(),
                });
                id
            }
        };
        return redirect(StatusCode::MOVED_PERMANENTLY, &format!("/pm.php?thread_id={id}"));
    }

    page(r#"<div id="threads_left" data-max-msg-id="99000"></div><span id="pmNewCnt">(1)</span>"#)
}

fn thread_html(thread: &Thread) -> String {
    let last = thread
        .messages
        .last()
        .map(|(_, body)| body.as_str())
        .unwrap_or_default();
    format!(
        r#"<div class="pm_thread" id="thread_{id}"><img class="thumb" src="//ipstatic.net/thumbs/{peer}.jpg"><div class="tui_el male">{peer}, 30</div><div class="tui_el">Lyon</div><div class="tui_flag"><img src="//ipstatic.net/flags/fr.png"></div><div class="th_snippet">{last}</div></div>"#,
        id = thread.id,
        peer = thread.peer,
    )
}

fn messages_html(thread: &Thread) -> String {
    let mut html = String::from(r#"<div class="pm_date">Today</div>"#);
    for (n, (sender, body)) in thread.messages.iter().enumerate() {
        html.push_str(&format!(
            r#"<div class="pm_msg" id="msg_{n}"><div class="msg_user_thumb"><a href="/{sender}"><img></a></div><div class="pm_time">12:{n:02}</div><div class="msg_body">{body}</div></div>"#
        ));
    }
    html
}

async fn pm_action(
    State(state): State<Shared>,
    Form(form): Form<Vec<(String, String)>>,
) -> Response {
    let mut state = state.lock().unwrap();
    let thread_id = param(&form, "thread").unwrap_or_default().to_string();

    match param(&form, "action") {
        Some("more_threads") => {
            let from: usize = param(&form, "from").and_then(|f| f.parse().ok()).unwrap_or(0);
            let body: String = state
                .threads
                .iter()
                .skip(from)
                .take(THREAD_PAGE)
                .map(thread_html)
                .collect();
            Json(json!({ "body": body })).into_response()
        }
        Some("load_messages") => {
            let body = state
                .threads
                .iter()
                .find(|t| t.id == thread_id)
                .map(messages_html)
                .unwrap_or_default();
            Json(json!({ "body": body })).into_response()
        }
        Some("send_message") => {
            let message = param(&form, "message").unwrap_or_default().to_string();
            match state.threads.iter_mut().find(|t| t.id == thread_id) {
                Some(thread) => {
                    thread.messages.push((USERNAME.to_string(), message));
                    Json(json!({ "ok": true })).into_response()
                }
                None => Json(json!({ "error": "Thread not found" })).into_response(),
            }
        }
        Some("delete_thread") => {
            state.threads.retain(|t| t.id != thread_id);
            Json(json!({ "ok": true })).into_response()
        }
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}
