use serde::{Deserialize, Serialize};

/// Moderation state. Only `Approved` comments are visible publicly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentStatus {
    Pending,
    Approved,
    Rejected,
}

impl CommentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub article_id: String,
    pub author: String,
    pub email: String,
    pub content: String,
    pub status: CommentStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Reader-submitted comment. Always stored as `pending`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewComment {
    pub author: String,
    #[serde(default)]
    pub email: String,
    pub content: String,
}
