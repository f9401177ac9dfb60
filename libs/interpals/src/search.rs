//! Member search
//!
//! [`SearchCriteria`] describes the search form; [`SearchIter`] walks the
//! result pages lazily, one page per round trip, and stops at the first of:
//! an empty page, the record limit, the time budget, or an error.

use std::collections::VecDeque;
use std::time::Duration;

use common::{InterpalsError, InterpalsResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::api::html_page;
use crate::decoder::{self, users};
use crate::models::{Sex, UserSummary};
use crate::session::Session;
use crate::transport::{Params, params};
use crate::validation::{
    self, CONTINENTS, MAX_AGE, MIN_AGE, validate_age_range, validate_city_code,
    validate_continent, validate_country,
};

/// Search form endpoint
pub const SEARCH_PATH: &str = "/app/search";

/// City autocomplete endpoint
pub const CITY_LOOKUP_PATH: &str = "/app/async/geoAc";

const LOOKING_FOR: [&str; 6] = [
    "lfor_email",
    "lfor_snail",
    "lfor_langex",
    "lfor_friend",
    "lfor_flirt",
    "lfor_relation",
];

/// Placeholder the form sends for "any"
const ANY: &str = "---";

/// City filter: a name the site resolves to a code, or a known code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum City {
    Name(String),
    Code { code: String, name: Option<String> },
}

/// Search filters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub age1: u32,
    pub age2: u32,
    pub sex: Vec<Sex>,
    /// Continent codes, see [`CONTINENTS`]
    pub continents: Vec<String>,
    /// Two-letter country codes, empty for any country
    pub countries: Vec<String>,
    pub keywords: String,
    pub online: bool,
    pub city: Option<City>,
    /// Extra form fields sent verbatim after the known ones
    pub extra: Params,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            age1: MIN_AGE,
            age2: MAX_AGE,
            sex: vec![Sex::Male, Sex::Female],
            continents: CONTINENTS.iter().map(|c| c.to_string()).collect(),
            countries: Vec::new(),
            keywords: String::new(),
            online: false,
            city: None,
            extra: Vec::new(),
        }
    }
}

impl SearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn age(mut self, age1: u32, age2: u32) -> Self {
        self.age1 = age1;
        self.age2 = age2;
        self
    }

    pub fn sex(mut self, sex: impl IntoIterator<Item = Sex>) -> Self {
        self.sex = sex.into_iter().collect();
        self
    }

    pub fn continents<S: Into<String>>(mut self, codes: impl IntoIterator<Item = S>) -> Self {
        self.continents = codes.into_iter().map(Into::into).collect();
        self
    }

    pub fn countries<S: Into<String>>(mut self, codes: impl IntoIterator<Item = S>) -> Self {
        self.countries = codes.into_iter().map(Into::into).collect();
        self
    }

    pub fn keywords(mut self, keywords: impl Into<String>) -> Self {
        self.keywords = keywords.into();
        self
    }

    pub fn online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    /// City by name; the code is looked up when the search starts
    pub fn city_name(mut self, name: impl Into<String>) -> Self {
        self.city = Some(City::Name(name.into()));
        self
    }

    /// City by code, skipping the lookup
    pub fn city_code(mut self, code: impl Into<String>) -> Self {
        self.city = Some(City::Code {
            code: code.into(),
            name: None,
        });
        self
    }

    /// Extra form field passed through verbatim
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((name.into(), value.into()));
        self
    }

    /// Criteria from a loose options map
    ///
    /// Known keys: `age1`, `age2`, `sex`, `continents`, `countries`,
    /// `keywords`, `online`, `city`, `cityName`. Any other key is passed
    /// through; array values become repeated fields.
    pub fn from_options(options: &Map<String, Value>) -> InterpalsResult<Self> {
        let mut criteria = Self::default();
        let mut city_code = None;
        let mut city_name = None;

        for (key, value) in options {
            match key.as_str() {
                "age1" => criteria.age1 = age(key, value)?,
                "age2" => criteria.age2 = age(key, value)?,
                "sex" => {
                    criteria.sex = list(value)
                        .iter()
                        .map(|s| {
                            Sex::from_str(s).ok_or_else(|| {
                                InterpalsError::Validation(format!("Unknown sex {s:?}"))
                            })
                        })
                        .collect::<InterpalsResult<_>>()?;
                }
                "continents" => criteria.continents = list(value),
                "countries" => criteria.countries = list(value),
                "keywords" => criteria.keywords = text(value).unwrap_or_default(),
                "online" => criteria.online = truthy(value),
                "city" => city_code = text(value).filter(|c| !c.is_empty()),
                "cityName" => city_name = text(value).filter(|c| !c.is_empty()),
                _ => criteria
                    .extra
                    .extend(list(value).into_iter().map(|v| (key.clone(), v))),
            }
        }

        criteria.city = match (city_code, city_name) {
            (Some(code), name) => Some(City::Code { code, name }),
            (None, Some(name)) => Some(City::Name(name)),
            (None, None) => None,
        };

        Ok(criteria)
    }

    /// Check every filter before any request is made
    pub fn validate(&self) -> InterpalsResult<()> {
        validate_age_range(self.age1, self.age2)?;

        if self.sex.is_empty() {
            return Err(InterpalsError::Validation(
                "At least one sex must be selected".to_string(),
            ));
        }

        if self.continents.is_empty() {
            return Err(InterpalsError::Validation(
                "At least one continent must be selected".to_string(),
            ));
        }
        self.continents
            .iter()
            .try_for_each(|code| validate_continent(code))?;
        self.countries
            .iter()
            .try_for_each(|code| validate_country(code))?;

        match &self.city {
            Some(City::Name(name)) if name.trim().is_empty() => Err(InterpalsError::Validation(
                "City name must not be empty".to_string(),
            )),
            Some(City::Code { code, .. }) => validate_city_code(code),
            _ => Ok(()),
        }
    }

    /// Form fields for every page, `offset` excluded
    fn form(&self, csrf_token: &str, city_code: Option<&str>) -> Params {
        let mut form = params([
            ("sort", "last_login"),
            ("age1", self.age1.to_string().as_str()),
            ("age2", self.age2.to_string().as_str()),
        ]);

        form.extend(self.sex.iter().map(|s| ("sex[]".to_string(), s.as_str().to_string())));
        form.extend(self.continents.iter().map(|c| ("continents[]".to_string(), c.clone())));
        if self.countries.is_empty() {
            form.push(("countries[]".to_string(), ANY.to_string()));
        } else {
            form.extend(self.countries.iter().map(|c| ("countries[]".to_string(), c.clone())));
        }
        form.push(("languages[]".to_string(), ANY.to_string()));
        form.extend(LOOKING_FOR.iter().map(|l| ("lfor[]".to_string(), l.to_string())));

        form.extend(params([
            ("keywords", self.keywords.as_str()),
            ("username", ""),
            ("csrf_token", csrf_token),
        ]));

        if self.online {
            form.push(("online".to_string(), "1".to_string()));
        }

        if let Some(code) = city_code {
            let name = match &self.city {
                Some(City::Name(name)) => name.as_str(),
                Some(City::Code { name, .. }) => name.as_deref().unwrap_or_default(),
                None => "",
            };
            form.extend(params([("city", code), ("cityName", name)]));
        }

        form.extend(self.extra.iter().cloned());
        form
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        _ => None,
    }
}

fn list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(text).collect(),
        other => text(other).into_iter().collect(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !matches!(s.trim(), "" | "0" | "false"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn age(key: &str, value: &Value) -> InterpalsResult<u32> {
    text(value)
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| InterpalsError::Validation(format!("{key} must be a whole number")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ready,
    Fetching,
    Exhausted,
}

/// Lazy sequence of search results
///
/// Nothing is requested until the first call to [`SearchIter::next`]. The
/// time budget starts at that call as well. Once exhausted the iterator
/// keeps returning `Ok(None)`.
pub struct SearchIter<'s> {
    session: &'s Session,
    criteria: SearchCriteria,
    limit: Option<usize>,
    timeout: Option<Duration>,
    state: State,
    started: Option<Instant>,
    form: Option<Params>,
    offset: usize,
    yielded: usize,
    buffer: VecDeque<UserSummary>,
}

impl<'s> SearchIter<'s> {
    pub(crate) fn new(
        session: &'s Session,
        criteria: SearchCriteria,
        limit: Option<usize>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            session,
            criteria,
            limit,
            timeout,
            state: State::Ready,
            started: None,
            form: None,
            offset: 0,
            yielded: 0,
            buffer: VecDeque::new(),
        }
    }

    /// Next result, fetching a page when the buffered one is used up
    pub async fn next(&mut self) -> InterpalsResult<Option<UserSummary>> {
        let started = *self.started.get_or_insert_with(Instant::now);

        loop {
            if self.state == State::Exhausted {
                return Ok(None);
            }

            if self.limit.is_some_and(|limit| self.yielded >= limit) {
                self.finish("limit reached");
                continue;
            }

            if self.timeout.is_some_and(|budget| started.elapsed() > budget) {
                self.finish("time budget exceeded");
                continue;
            }

            if let Some(user) = self.buffer.pop_front() {
                self.yielded += 1;
                return Ok(Some(user));
            }

            self.state = State::Fetching;
            match self.fetch_page().await {
                Ok(0) => self.finish("no more results"),
                Ok(_) => self.state = State::Ready,
                Err(err) => {
                    self.finish("error");
                    return Err(err);
                }
            }
        }
    }

    /// Drain the remaining results
    pub async fn collect(mut self) -> InterpalsResult<Vec<UserSummary>> {
        let mut users = Vec::new();
        while let Some(user) = self.next().await? {
            users.push(user);
        }
        Ok(users)
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == State::Exhausted
    }

    /// Results returned so far
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    fn finish(&mut self, reason: &str) {
        info!(
            "Search finished after {} results: {}",
            self.yielded, reason
        );
        self.state = State::Exhausted;
        self.buffer.clear();
    }

    async fn fetch_page(&mut self) -> InterpalsResult<usize> {
        if self.form.is_none() {
            self.form = Some(self.prepare().await?);
        }
        let form = self.form.as_ref().map(|f| f.as_slice()).unwrap_or_default();

        let mut query = params([("offset", self.offset.to_string())]);
        query.extend(form.iter().cloned());

        debug!("Fetching search page at offset {}", self.offset);
        let html = html_page(self.session, SEARCH_PATH, query).await?;
        let users = users::search_results(&html)?;

        let count = users.len();
        self.offset += count;
        self.buffer.extend(users);
        Ok(count)
    }

    /// Form token and city code, fetched once before the first page
    async fn prepare(&self) -> InterpalsResult<Params> {
        let html = html_page(self.session, SEARCH_PATH, Vec::new()).await?;
        let csrf_token = decoder::csrf_token(&html)
            .ok_or_else(|| InterpalsError::parse("csrf_token", decoder::fragment(&html)))?;

        let city_code = match &self.criteria.city {
            Some(City::Name(name)) => Some(self.lookup_city(name).await?),
            Some(City::Code { code, .. }) => Some(code.clone()),
            None => None,
        };

        Ok(self.criteria.form(&csrf_token, city_code.as_deref()))
    }

    async fn lookup_city(&self, name: &str) -> InterpalsResult<String> {
        let response = self
            .session
            .get(CITY_LOOKUP_PATH, params([("query", name)]))
            .await?;

        if !response.is_success() {
            return Err(InterpalsError::Site(format!(
                "city lookup answered with status {}",
                response.status
            )));
        }

        let code = decoder::city_code(&response.body)?
            .ok_or_else(|| InterpalsError::NotFound(format!("city {name:?}")))?;
        validation::validate_city_code(&code)
            .map_err(|_| InterpalsError::parse("city", decoder::fragment(&response.body)))?;

        debug!("Resolved city {:?} to {}", name, code);
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::cookie::{CookieJar, SESSION_COOKIE};
    use crate::fake_transport::FakeTransport;
    use crate::transport::HttpResponse;

    const FORM_PAGE: &str = r#"<meta name="csrf_token" content="form-token"><a href="/app/auth/logout">x</a>"#;

    /// Search site with `total` members served `per_page` at a time
    fn search_site(total: usize, per_page: usize) -> Arc<FakeTransport> {
        Arc::new(FakeTransport::new(move |request| {
            if request.path == CITY_LOOKUP_PATH {
                return Ok(HttpResponse::ok(r#"{"items":[{"id":"2950159"}]}"#));
            }
            let Some(offset) = request.param("offset") else {
                return Ok(HttpResponse::ok(FORM_PAGE));
            };
            let offset: usize = offset.parse().unwrap();
            let body: String = (offset..total.min(offset + per_page))
                .map(|i| format!(r#"<div class="sResMain"><a href="/user{i}">user{i}</a></div>"#))
                .collect();
            Ok(HttpResponse::ok(format!("{body}<a href=\"/app/auth/logout\">x</a>")))
        }))
    }

    fn session(transport: Arc<FakeTransport>) -> Session {
        let mut jar = CookieJar::new();
        jar.insert(SESSION_COOKIE, "s1");
        Session::new(transport, "me", jar).unwrap()
    }

    #[test]
    fn test_default_form_fields() {
        let form = SearchCriteria::new().form("tok", None);
        let values = |name: &str| -> Vec<&str> {
            form.iter()
                .filter(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
                .collect()
        };

        assert_eq!(values("sort"), vec!["last_login"]);
        assert_eq!(values("age1"), vec!["16"]);
        assert_eq!(values("age2"), vec!["110"]);
        assert_eq!(values("sex[]"), vec!["male", "female"]);
        assert_eq!(values("continents[]"), CONTINENTS.to_vec());
        assert_eq!(values("countries[]"), vec!["---"]);
        assert_eq!(values("languages[]"), vec!["---"]);
        assert_eq!(values("lfor[]").len(), 6);
        assert_eq!(values("csrf_token"), vec!["tok"]);
        assert!(values("online").is_empty());
        assert!(values("city").is_empty());
    }

    #[test]
    fn test_from_options() {
        let options = json!({
            "age1": 18,
            "age2": "30",
            "sex": ["female"],
            "countries": ["US", "RU"],
            "online": true,
            "cityName": "Berlin",
            "photo": "1",
        });
        let criteria = SearchCriteria::from_options(options.as_object().unwrap()).unwrap();

        assert_eq!((criteria.age1, criteria.age2), (18, 30));
        assert_eq!(criteria.sex, vec![Sex::Female]);
        assert_eq!(criteria.countries, vec!["US", "RU"]);
        assert!(criteria.online);
        assert_eq!(criteria.city, Some(City::Name("Berlin".to_string())));
        assert_eq!(criteria.extra, params([("photo", "1")]));
        assert!(criteria.validate().is_ok());

        let form = criteria.form("tok", Some("2950159"));
        assert!(form.contains(&("online".to_string(), "1".to_string())));
        assert!(form.contains(&("cityName".to_string(), "Berlin".to_string())));
        assert_eq!(form.last(), Some(&("photo".to_string(), "1".to_string())));
    }

    #[test]
    fn test_from_options_with_city_code() {
        let options = json!({"city": 524901, "cityName": "Moscow"});
        let criteria = SearchCriteria::from_options(options.as_object().unwrap()).unwrap();
        assert_eq!(
            criteria.city,
            Some(City::Code {
                code: "524901".to_string(),
                name: Some("Moscow".to_string())
            })
        );
    }

    #[test]
    fn test_validate_rejects_bad_criteria() {
        assert!(SearchCriteria::new().age(40, 20).validate().is_err());
        assert!(SearchCriteria::new().sex([]).validate().is_err());
        assert!(SearchCriteria::new().continents(["XX"]).validate().is_err());
        assert!(SearchCriteria::new().countries(["usa"]).validate().is_err());
        assert!(SearchCriteria::new().city_code("abc").validate().is_err());

        let options = json!({"sex": ["robot"]});
        assert!(SearchCriteria::from_options(options.as_object().unwrap()).is_err());
    }

    #[tokio::test]
    async fn test_pages_are_fetched_lazily() {
        let transport = search_site(12, 5);
        let session = session(transport.clone());
        let mut iter = SearchIter::new(&session, SearchCriteria::new(), None, None);
        assert_eq!(transport.count(), 0);

        let first = iter.next().await.unwrap().unwrap();
        assert_eq!(first.username, "user0");
        // form page + first result page
        assert_eq!(transport.count(), 2);

        for _ in 1..5 {
            iter.next().await.unwrap().unwrap();
        }
        assert_eq!(transport.count(), 2);

        assert_eq!(iter.next().await.unwrap().unwrap().username, "user5");
        assert_eq!(transport.count(), 3);
        assert_eq!(transport.sent()[2].param("offset"), Some("5"));
    }

    #[tokio::test]
    async fn test_all_results_then_empty_page() {
        let transport = search_site(12, 5);
        let session = session(transport.clone());
        let mut iter = SearchIter::new(&session, SearchCriteria::new(), None, None);

        let mut names = Vec::new();
        while let Some(user) = iter.next().await.unwrap() {
            names.push(user.username);
        }

        assert_eq!(names.len(), 12);
        assert_eq!(names[11], "user11");
        assert!(iter.is_exhausted());
        // form + 3 pages + empty page
        assert_eq!(transport.count(), 5);

        assert!(iter.next().await.unwrap().is_none());
        assert_eq!(transport.count(), 5);
    }

    #[tokio::test]
    async fn test_limit_stops_without_fetching() {
        let transport = search_site(12, 5);
        let session = session(transport.clone());
        let iter = SearchIter::new(&session, SearchCriteria::new(), Some(5), None);

        let users = iter.collect().await.unwrap();
        assert_eq!(users.len(), 5);
        assert_eq!(transport.count(), 2);

        let mut none = SearchIter::new(&session, SearchCriteria::new(), Some(0), None);
        assert!(none.next().await.unwrap().is_none());
        assert_eq!(transport.count(), 2);
    }

    #[tokio::test]
    async fn test_city_name_is_resolved_once() {
        let transport = search_site(3, 5);
        let session = session(transport.clone());
        let criteria = SearchCriteria::new().city_name("Berlin");
        let users = SearchIter::new(&session, criteria, None, None)
            .collect()
            .await
            .unwrap();

        assert_eq!(users.len(), 3);
        let sent = transport.sent();
        let lookups = sent.iter().filter(|r| r.path == CITY_LOOKUP_PATH).count();
        assert_eq!(lookups, 1);
        assert_eq!(sent[1].param("query"), Some("Berlin"));
        assert_eq!(sent[2].param("city"), Some("2950159"));
        assert_eq!(sent[2].param("cityName"), Some("Berlin"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_budget_ends_the_search() {
        let transport = Arc::new(
            Arc::into_inner(search_site(12, 5))
                .unwrap()
                .with_latency(Duration::from_millis(400)),
        );
        let session = session(transport.clone());
        let iter = SearchIter::new(
            &session,
            SearchCriteria::new(),
            None,
            Some(Duration::from_secs(1)),
        );

        // form page at 0.4s, first page at 0.8s, second page lands at 1.2s
        let users = iter.collect().await.unwrap();
        assert_eq!(users.len(), 5);
        assert_eq!(transport.count(), 3);
    }

    #[tokio::test]
    async fn test_error_is_returned_once() {
        let transport = Arc::new(FakeTransport::new(|request| {
            if request.param("offset").is_some() {
                Ok(HttpResponse::new(500, "boom"))
            } else {
                Ok(HttpResponse::ok(FORM_PAGE))
            }
        }));
        let session = session(transport.clone());
        let mut iter = SearchIter::new(&session, SearchCriteria::new(), None, None);

        assert!(matches!(iter.next().await, Err(InterpalsError::Site(_))));
        assert!(iter.is_exhausted());
        assert!(iter.next().await.unwrap().is_none());
        assert_eq!(transport.count(), 2);
    }
}
