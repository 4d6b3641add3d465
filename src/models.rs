use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

// Prefixed string ids, e.g. "thread-3f0c…"
pub type Id = String;

pub const DELETED_COMMENT_CONTENT: &str = "**komentar telah dihapus**";
pub const DELETED_REPLY_CONTENT: &str = "**balasan telah dihapus**";

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());

/// Generate a fresh identifier of the form `<prefix>-<uuid>`.
pub fn new_id(prefix: &str) -> Id {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}

// ---------------- users ----------------

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Id,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub fullname: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct RegisterUser {
    #[validate(length(min = 1, max = 50), regex(path = *USERNAME_RE))]
    pub username: String,
    #[validate(length(min = 6))]
    pub password: String,
    #[validate(length(min = 1))]
    pub fullname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisteredUser {
    pub id: Id,
    pub username: String,
    pub fullname: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct LoginUser {
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

// ---------------- threads ----------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Thread {
    pub id: Id,
    pub title: String,
    pub body: String,
    pub owner: Id,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct NewThread {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(min = 1))]
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AddedThread {
    pub id: Id,
    pub title: String,
    pub owner: Id,
}

impl From<Thread> for AddedThread {
    fn from(t: Thread) -> Self {
        Self { id: t.id, title: t.title, owner: t.owner }
    }
}

/// Thread row joined with its owner's username.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ThreadRow {
    pub id: Id,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub username: String,
}

// ---------------- comments ----------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Comment {
    pub id: Id,
    pub thread_id: Id,
    pub content: String,
    pub owner: Id,
    pub created_at: DateTime<Utc>,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct NewComment {
    #[validate(length(min = 1, max = 200))]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AddedComment {
    pub id: Id,
    pub content: String,
    pub owner: Id,
}

impl From<Comment> for AddedComment {
    fn from(c: Comment) -> Self {
        Self { id: c.id, content: c.content, owner: c.owner }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentRow {
    pub id: Id,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub username: String,
}

// ---------------- replies ----------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Reply {
    pub id: Id,
    pub comment_id: Id,
    pub content: String,
    pub owner: Id,
    pub created_at: DateTime<Utc>,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct NewReply {
    #[validate(length(min = 1, max = 200))]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AddedReply {
    pub id: Id,
    pub content: String,
    pub owner: Id,
}

impl From<Reply> for AddedReply {
    fn from(r: Reply) -> Self {
        Self { id: r.id, content: r.content, owner: r.owner }
    }
}

/// Reply row joined with its owner's username; `comment_id` is the nesting key.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReplyRow {
    pub id: Id,
    pub comment_id: Id,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub username: String,
}

// ---------------- thread detail view ----------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ThreadDetail {
    pub id: Id,
    pub title: String,
    pub body: String,
    pub date: DateTime<Utc>,
    pub username: String,
    pub comments: Vec<CommentDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CommentDetail {
    pub id: Id,
    pub username: String,
    pub date: DateTime<Utc>,
    pub content: String,
    pub replies: Vec<ReplyDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReplyDetail {
    pub id: Id,
    pub content: String,
    pub date: DateTime<Utc>,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccessToken {
    pub access_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_prefix() {
        let id = new_id("thread");
        assert!(id.starts_with("thread-"));
        assert_ne!(id, new_id("thread"));
    }

    #[test]
    fn thread_title_limit() {
        let ok = NewThread { title: "a".repeat(100), body: "b".into() };
        assert!(ok.validate().is_ok());
        let long = NewThread { title: "a".repeat(101), body: "b".into() };
        assert!(long.validate().is_err());
        let empty_body = NewThread { title: "t".into(), body: String::new() };
        assert!(empty_body.validate().is_err());
    }

    #[test]
    fn comment_and_reply_content_limit() {
        assert!(NewComment { content: "x".repeat(200) }.validate().is_ok());
        assert!(NewComment { content: "x".repeat(201) }.validate().is_err());
        assert!(NewReply { content: String::new() }.validate().is_err());
        assert!(NewReply { content: "x".repeat(201) }.validate().is_err());
    }

    #[test]
    fn username_charset() {
        let base = RegisterUser { username: "dicoding_1".into(), password: "secret".into(), fullname: "Dicoding".into() };
        assert!(base.validate().is_ok());
        let spaced = RegisterUser { username: "dico ding".into(), ..base.clone() };
        assert!(spaced.validate().is_err());
        let short_pw = RegisterUser { password: "abc".into(), ..base };
        assert!(short_pw.validate().is_err());
    }
}
