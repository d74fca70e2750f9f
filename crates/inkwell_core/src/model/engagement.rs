use serde::{Deserialize, Serialize};

/// Append-only analytics row. Independent from `Article::views`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleView {
    pub id: String,
    pub article_id: String,
    pub ip: String,
    pub user_agent: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewArticleView {
    pub ip: String,
    pub user_agent: String,
}

/// Unique per `(user_id, article_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: String,
    pub user_id: String,
    pub article_id: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArticleStats {
    pub views: i64,
    /// Approved comments only.
    pub comments: i64,
}
