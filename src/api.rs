//! Wire contract shared by the feed server and its clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

/// Read projection of a tweet. `like_count` and `liked_by_me` are derived
/// from the Like set at query time; `liked_by_me` is always false for
/// anonymous viewers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tweet {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub like_count: u64,
    pub liked_by_me: bool,
    pub author: User,
}

/// Pagination cursor: the sort key of the row that leads the next page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

/// Query parameters for `GET /feed`. The cursor travels as two flat fields
/// (query strings don't nest); both must be present to take effect.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FeedQuery {
    pub user_id: Option<String>,
    #[serde(default)]
    pub only_following: bool,
    pub limit: Option<usize>,
    pub cursor_id: Option<String>,
    pub cursor_created_at: Option<DateTime<Utc>>,
}

impl FeedQuery {
    pub fn cursor(&self) -> Option<Cursor> {
        match (&self.cursor_id, &self.cursor_created_at) {
            (Some(id), Some(created_at)) => Some(Cursor {
                id: id.clone(),
                created_at: *created_at,
            }),
            _ => None,
        }
    }

    pub fn with_cursor(mut self, cursor: Option<&Cursor>) -> Self {
        self.cursor_id = cursor.map(|c| c.id.clone());
        self.cursor_created_at = cursor.map(|c| c.created_at);
        self
    }
}

/// One page of a feed. `next_cursor` is omitted entirely (not null) when no
/// further results exist.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedPage {
    pub tweets: Vec<Tweet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToggleLikeRequest {
    pub id: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ToggleLikeResponse {
    pub added_like: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateTweetRequest {
    pub content: String,
}
