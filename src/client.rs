//! HTTP client for the feed server's request contracts.

use crate::api::{
    CreateTweetRequest, FeedPage, FeedQuery, ToggleLikeRequest, ToggleLikeResponse, Tweet,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Method, Request};
use hyper_tls::HttpsConnector;
use serde::de::DeserializeOwned;
use url::Url;

/// What the client-side store needs from a feed backend. [`FeedClient`] is
/// the HTTP implementation; tests drive the store with in-process ones.
#[async_trait]
pub trait FeedBackend: Send + Sync {
    async fn fetch_feed(&self, query: &FeedQuery) -> Result<FeedPage>;
    async fn toggle_like(&self, tweet_id: &str) -> Result<ToggleLikeResponse>;
    async fn create_tweet(&self, content: &str) -> Result<Tweet>;
}

#[derive(Debug, Clone)]
pub struct FeedClient {
    https_client: Client<HttpsConnector<HttpConnector>>,
    base_url: Url,
    session_token: Option<String>,
}

impl FeedClient {
    pub fn new(base_url: &str, session_token: Option<String>) -> Result<Self> {
        let https = HttpsConnector::new();
        let https_client = Client::builder().build::<_, Body>(https);
        let base_url = Url::parse(base_url)
            .with_context(|| format!("invalid server url: {base_url}"))?;
        Ok(Self {
            https_client,
            base_url,
            session_token,
        })
    }

    fn request(&self, method: Method, url: &Url, body: Body) -> Result<Request<Body>> {
        let mut builder = Request::builder()
            .method(method)
            .uri(url.to_string())
            .header("Content-Type", "application/json");
        if let Some(token) = &self.session_token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        Ok(builder.body(body)?)
    }

    async fn send<T: DeserializeOwned>(&self, req: Request<Body>) -> Result<T> {
        let resp = self.https_client.request(req).await?;
        let status = resp.status();
        let bytes = hyper::body::to_bytes(resp.into_body()).await?;
        if !status.is_success() {
            let message = String::from_utf8_lossy(&bytes);
            return Err(anyhow!("request failed ({status}): {message}"));
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl FeedBackend for FeedClient {
    async fn fetch_feed(&self, query: &FeedQuery) -> Result<FeedPage> {
        let mut url = self.base_url.join("/feed")?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(user_id) = &query.user_id {
                pairs.append_pair("user_id", user_id);
            }
            if query.only_following {
                pairs.append_pair("only_following", "true");
            }
            if let Some(limit) = query.limit {
                pairs.append_pair("limit", &limit.to_string());
            }
            if let Some(cursor) = query.cursor() {
                pairs.append_pair("cursor_id", &cursor.id);
                pairs.append_pair("cursor_created_at", &cursor.created_at.to_rfc3339());
            }
        }
        let req = self.request(Method::GET, &url, Body::empty())?;
        self.send(req).await
    }

    async fn toggle_like(&self, tweet_id: &str) -> Result<ToggleLikeResponse> {
        let url = self.base_url.join("/likes/toggle")?;
        let body = serde_json::to_vec(&ToggleLikeRequest {
            id: tweet_id.to_string(),
        })?;
        let req = self.request(Method::POST, &url, Body::from(body))?;
        self.send(req).await
    }

    async fn create_tweet(&self, content: &str) -> Result<Tweet> {
        let url = self.base_url.join("/tweets")?;
        let body = serde_json::to_vec(&CreateTweetRequest {
            content: content.to_string(),
        })?;
        let req = self.request(Method::POST, &url, Body::from(body))?;
        self.send(req).await
    }
}
