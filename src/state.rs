use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use crate::config::Config;
use crate::identity::DynIdentityService;
use crate::store::like::DynLikeStore;
use crate::store::post::DynPostStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub identity: DynIdentityService,
    pub posts: DynPostStore,
    pub likes: DynLikeStore,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(
        config: Config,
        identity: DynIdentityService,
        posts: DynPostStore,
        likes: DynLikeStore,
    ) -> Result<Self> {
        Ok(Self {
            config,
            identity,
            posts,
            likes,
            http: outbound_client()?,
        })
    }
}

/// Shared outbound HTTP client: 5s to connect, 10s per request overall.
fn outbound_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(10))
        .user_agent(concat!("plaza/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building outbound http client")
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.config.session_key.clone()
    }
}
