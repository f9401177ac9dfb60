//! Client for the interpals.net website
//!
//! Log in once to get a [`Session`], then borrow it into an [`Api`]:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use common::config::ClientConfig;
//! use interpals::{Api, ReqwestTransport, SearchCriteria, Session};
//!
//! # async fn run() -> common::InterpalsResult<()> {
//! let transport = Arc::new(ReqwestTransport::new(&ClientConfig::from_env()?)?);
//! let session = Session::login(transport, "username", "password").await?;
//! let api = Api::new(&session);
//!
//! let profile = api.profile("someone").await?;
//! let mut results = api.search(SearchCriteria::new().age(20, 30), Some(10), None)?;
//! while let Some(user) = results.next().await? {
//!     println!("{} -> {}", profile.username, user.username);
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cookie;
pub mod decoder;
pub mod models;
pub mod search;
pub mod session;
pub mod store;
pub mod transport;
pub mod validation;

#[cfg(test)]
mod fake_transport;

pub use api::Api;
pub use common::{InterpalsError, InterpalsResult};
pub use cookie::CookieJar;
pub use models::{
    Album, ChatPage, Direction, Message, Picture, Profile, ProfileSection, Sex, ThreadSummary,
    UserRef, UserSummary,
};
pub use search::{City, SearchCriteria, SearchIter};
pub use session::{Session, SessionSnapshot};
pub use store::SessionStore;
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};
