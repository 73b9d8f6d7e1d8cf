//! JSON seed file: the provisioning boundary for everything the feed
//! service treats as an external collaborator's concern (users, follow
//! edges, session tokens, and optionally some initial tweets).

use crate::api::User;
use crate::server::session::SessionMap;
use crate::storage::MemoryStorage;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub follows: Vec<SeedFollow>,
    #[serde(default)]
    pub sessions: Vec<SeedSession>,
    #[serde(default)]
    pub tweets: Vec<SeedTweet>,
}

#[derive(Debug, Deserialize)]
pub struct SeedFollow {
    pub follower_id: String,
    pub followee_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SeedSession {
    pub token: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SeedTweet {
    pub author_id: String,
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
}

pub fn load(path: &Path, storage: &MemoryStorage) -> Result<SessionMap> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading seed file {}", path.display()))?;
    let seed: SeedFile = serde_json::from_str(&raw)
        .with_context(|| format!("parsing seed file {}", path.display()))?;
    apply(seed, storage)
}

pub fn apply(seed: SeedFile, storage: &MemoryStorage) -> Result<SessionMap> {
    info!(
        users = seed.users.len(),
        follows = seed.follows.len(),
        sessions = seed.sessions.len(),
        tweets = seed.tweets.len(),
        "applying seed data"
    );

    for user in seed.users {
        storage.insert_user(user);
    }
    for follow in &seed.follows {
        storage.insert_follow(&follow.follower_id, &follow.followee_id);
    }
    for tweet in &seed.tweets {
        let created_at = tweet.created_at.unwrap_or_else(Utc::now);
        storage
            .insert_tweet_at(&tweet.author_id, &tweet.content, created_at)
            .with_context(|| format!("seeding tweet by {}", tweet.author_id))?;
    }

    let tokens: HashMap<String, String> = seed
        .sessions
        .into_iter()
        .map(|session| (session.token, session.user_id))
        .collect();
    Ok(SessionMap::new(tokens))
}
