use chrono::Utc;

use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("{0}")] NotFound(String),
    #[error("{0}")] Conflict(String),
    #[error("internal: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

use async_trait::async_trait;

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn add_user(&self, username: &str, password_hash: &str, fullname: &str) -> RepoResult<User>;
    async fn find_user_by_username(&self, username: &str) -> RepoResult<User>;
}

#[async_trait]
pub trait ThreadRepo: Send + Sync {
    async fn add_thread(&self, owner: &str, new: NewThread) -> RepoResult<Thread>;
    async fn verify_thread_exists(&self, id: &str) -> RepoResult<()>;
    /// Thread joined with its owner's username.
    async fn get_thread_by_id(&self, id: &str) -> RepoResult<ThreadRow>;
}

#[async_trait]
pub trait CommentRepo: Send + Sync {
    async fn add_comment(&self, thread_id: &str, owner: &str, new: NewComment) -> RepoResult<Comment>;
    async fn get_comment(&self, id: &str) -> RepoResult<Comment>;
    async fn soft_delete_comment(&self, id: &str) -> RepoResult<()>;
    /// Comments of a thread, oldest first.
    async fn list_comments_by_thread(&self, thread_id: &str) -> RepoResult<Vec<CommentRow>>;
}

#[async_trait]
pub trait ReplyRepo: Send + Sync {
    async fn add_reply(&self, comment_id: &str, owner: &str, new: NewReply) -> RepoResult<Reply>;
    async fn get_reply(&self, id: &str) -> RepoResult<Reply>;
    async fn soft_delete_reply(&self, id: &str) -> RepoResult<()>;
    /// Replies across every comment of a thread, oldest first.
    async fn list_replies_by_thread(&self, thread_id: &str) -> RepoResult<Vec<ReplyRow>>;
}

pub trait Repo: UserRepo + ThreadRepo + CommentRepo + ReplyRepo {}

impl<T> Repo for T where T: UserRepo + ThreadRepo + CommentRepo + ReplyRepo {}

fn thread_not_found() -> RepoError { RepoError::NotFound("thread not found".into()) }
fn comment_not_found() -> RepoError { RepoError::NotFound("comment not found".into()) }
fn reply_not_found() -> RepoError { RepoError::NotFound("reply not found".into()) }

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

    #[derive(Default)]
    struct State {
        users: HashMap<Id, User>,
        threads: HashMap<Id, Thread>,
        // insertion order doubles as a tie-breaker for equal timestamps
        comments: Vec<Comment>,
        replies: Vec<Reply>,
    }

    impl State {
        fn username_of(&self, user_id: &str) -> String {
            self.users.get(user_id).map(|u| u.username.clone()).unwrap_or_default()
        }
    }

    #[derive(Clone, Default)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
    }

    impl InMemRepo {
        pub fn new() -> Self {
            Self::default()
        }

        fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
            self.state.read().map_err(|e| RepoError::Internal(e.to_string()))
        }

        fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
            self.state.write().map_err(|e| RepoError::Internal(e.to_string()))
        }
    }

    #[async_trait]
    impl UserRepo for InMemRepo {
        async fn add_user(&self, username: &str, password_hash: &str, fullname: &str) -> RepoResult<User> {
            let mut s = self.write()?;
            if s.users.values().any(|u| u.username == username) {
                return Err(RepoError::Conflict("username already taken".into()));
            }
            let user = User {
                id: new_id("user"),
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                fullname: fullname.to_string(),
            };
            s.users.insert(user.id.clone(), user.clone());
            Ok(user)
        }

        async fn find_user_by_username(&self, username: &str) -> RepoResult<User> {
            let s = self.read()?;
            s.users
                .values()
                .find(|u| u.username == username)
                .cloned()
                .ok_or_else(|| RepoError::NotFound("user not found".into()))
        }
    }

    #[async_trait]
    impl ThreadRepo for InMemRepo {
        async fn add_thread(&self, owner: &str, new: NewThread) -> RepoResult<Thread> {
            let mut s = self.write()?;
            let thread = Thread {
                id: new_id("thread"),
                title: new.title,
                body: new.body,
                owner: owner.to_string(),
                created_at: Utc::now(),
            };
            s.threads.insert(thread.id.clone(), thread.clone());
            Ok(thread)
        }

        async fn verify_thread_exists(&self, id: &str) -> RepoResult<()> {
            let s = self.read()?;
            if s.threads.contains_key(id) { Ok(()) } else { Err(thread_not_found()) }
        }

        async fn get_thread_by_id(&self, id: &str) -> RepoResult<ThreadRow> {
            let s = self.read()?;
            let t = s.threads.get(id).ok_or_else(thread_not_found)?;
            Ok(ThreadRow {
                id: t.id.clone(),
                title: t.title.clone(),
                body: t.body.clone(),
                created_at: t.created_at,
                username: s.username_of(&t.owner),
            })
        }
    }

    #[async_trait]
    impl CommentRepo for InMemRepo {
        async fn add_comment(&self, thread_id: &str, owner: &str, new: NewComment) -> RepoResult<Comment> {
            let mut s = self.write()?;
            if !s.threads.contains_key(thread_id) { return Err(thread_not_found()); }
            let comment = Comment {
                id: new_id("comment"),
                thread_id: thread_id.to_string(),
                content: new.content,
                owner: owner.to_string(),
                created_at: Utc::now(),
                is_deleted: false,
            };
            s.comments.push(comment.clone());
            Ok(comment)
        }

        async fn get_comment(&self, id: &str) -> RepoResult<Comment> {
            let s = self.read()?;
            s.comments.iter().find(|c| c.id == id).cloned().ok_or_else(comment_not_found)
        }

        async fn soft_delete_comment(&self, id: &str) -> RepoResult<()> {
            let mut s = self.write()?;
            let c = s.comments.iter_mut().find(|c| c.id == id).ok_or_else(comment_not_found)?;
            c.is_deleted = true;
            Ok(())
        }

        async fn list_comments_by_thread(&self, thread_id: &str) -> RepoResult<Vec<CommentRow>> {
            let s = self.read()?;
            let mut v: Vec<_> = s.comments
                .iter()
                .filter(|c| c.thread_id == thread_id)
                .map(|c| CommentRow {
                    id: c.id.clone(),
                    content: c.content.clone(),
                    created_at: c.created_at,
                    is_deleted: c.is_deleted,
                    username: s.username_of(&c.owner),
                })
                .collect();
            v.sort_by(|a, b| a.created_at.cmp(&b.created_at));    // ascending, stable
            Ok(v)
        }
    }

    #[async_trait]
    impl ReplyRepo for InMemRepo {
        async fn add_reply(&self, comment_id: &str, owner: &str, new: NewReply) -> RepoResult<Reply> {
            let mut s = self.write()?;
            if !s.comments.iter().any(|c| c.id == comment_id) { return Err(comment_not_found()); }
            let reply = Reply {
                id: new_id("reply"),
                comment_id: comment_id.to_string(),
                content: new.content,
                owner: owner.to_string(),
                created_at: Utc::now(),
                is_deleted: false,
            };
            s.replies.push(reply.clone());
            Ok(reply)
        }

        async fn get_reply(&self, id: &str) -> RepoResult<Reply> {
            let s = self.read()?;
            s.replies.iter().find(|r| r.id == id).cloned().ok_or_else(reply_not_found)
        }

        async fn soft_delete_reply(&self, id: &str) -> RepoResult<()> {
            let mut s = self.write()?;
            let r = s.replies.iter_mut().find(|r| r.id == id).ok_or_else(reply_not_found)?;
            r.is_deleted = true;
            Ok(())
        }

        async fn list_replies_by_thread(&self, thread_id: &str) -> RepoResult<Vec<ReplyRow>> {
            let s = self.read()?;
            let mut v: Vec<_> = s.replies
                .iter()
                .filter(|r| s.comments.iter().any(|c| c.id == r.comment_id && c.thread_id == thread_id))
                .map(|r| ReplyRow {
                    id: r.id.clone(),
                    comment_id: r.comment_id.clone(),
                    content: r.content.clone(),
                    created_at: r.created_at,
                    is_deleted: r.is_deleted,
                    username: s.username_of(&r.owner),
                })
                .collect();
            v.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            Ok(v)
        }
    }
}

// Postgres implementation (feature = "postgres-store")
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use sqlx::{Pool, Postgres};

    #[derive(Clone)]
    pub struct PgRepo { pool: Pool<Postgres> }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }
    }

    fn internal(e: sqlx::Error) -> RepoError {
        RepoError::Internal(e.to_string())
    }

    /// Map `RowNotFound` to the given not-found error, everything else to internal.
    fn or_not_found(not_found: fn() -> RepoError) -> impl Fn(sqlx::Error) -> RepoError {
        move |e| match e {
            sqlx::Error::RowNotFound => not_found(),
            other => internal(other),
        }
    }

    #[async_trait]
    impl UserRepo for PgRepo {
        async fn add_user(&self, username: &str, password_hash: &str, fullname: &str) -> RepoResult<User> {
            let rec = sqlx::query_as::<_, User>(
                "INSERT INTO users (id, username, password_hash, fullname) VALUES ($1,$2,$3,$4) \
                 RETURNING id, username, password_hash, fullname"
            )
                .bind(new_id("user")).bind(username).bind(password_hash).bind(fullname)
                .fetch_one(&self.pool).await
                .map_err(|e| match e {
                    sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::Conflict("username already taken".into()),
                    other => internal(other),
                })?;
            Ok(rec)
        }

        async fn find_user_by_username(&self, username: &str) -> RepoResult<User> {
            sqlx::query_as::<_, User>("SELECT id, username, password_hash, fullname FROM users WHERE username = $1")
                .bind(username)
                .fetch_one(&self.pool).await
                .map_err(or_not_found(|| RepoError::NotFound("user not found".into())))
        }
    }

    #[async_trait]
    impl ThreadRepo for PgRepo {
        async fn add_thread(&self, owner: &str, new: NewThread) -> RepoResult<Thread> {
            sqlx::query_as::<_, Thread>(
                "INSERT INTO threads (id, title, body, owner, created_at) VALUES ($1,$2,$3,$4,$5) \
                 RETURNING id, title, body, owner, created_at"
            )
                .bind(new_id("thread")).bind(&new.title).bind(&new.body).bind(owner).bind(Utc::now())
                .fetch_one(&self.pool).await
                .map_err(internal)
        }

        async fn verify_thread_exists(&self, id: &str) -> RepoResult<()> {
            let found: Option<(String,)> = sqlx::query_as("SELECT id FROM threads WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool).await
                .map_err(internal)?;
            found.map(|_| ()).ok_or_else(thread_not_found)
        }

        async fn get_thread_by_id(&self, id: &str) -> RepoResult<ThreadRow> {
            sqlx::query_as::<_, ThreadRow>(r#"
                SELECT t.id, t.title, t.body, t.created_at, u.username
                FROM threads t
                JOIN users u ON u.id = t.owner
                WHERE t.id = $1
            "#)
                .bind(id)
                .fetch_one(&self.pool).await
                .map_err(or_not_found(thread_not_found))
        }
    }

    #[async_trait]
    impl CommentRepo for PgRepo {
        async fn add_comment(&self, thread_id: &str, owner: &str, new: NewComment) -> RepoResult<Comment> {
            sqlx::query_as::<_, Comment>(
                "INSERT INTO comments (id, thread_id, content, owner, created_at) VALUES ($1,$2,$3,$4,$5) \
                 RETURNING id, thread_id, content, owner, created_at, is_deleted"
            )
                .bind(new_id("comment")).bind(thread_id).bind(&new.content).bind(owner).bind(Utc::now())
                .fetch_one(&self.pool).await
                .map_err(|e| match e {
                    sqlx::Error::Database(db) if db.is_foreign_key_violation() => thread_not_found(),
                    other => internal(other),
                })
        }

        async fn get_comment(&self, id: &str) -> RepoResult<Comment> {
            sqlx::query_as::<_, Comment>(
                "SELECT id, thread_id, content, owner, created_at, is_deleted FROM comments WHERE id = $1"
            )
                .bind(id)
                .fetch_one(&self.pool).await
                .map_err(or_not_found(comment_not_found))
        }

        async fn soft_delete_comment(&self, id: &str) -> RepoResult<()> {
            let res = sqlx::query("UPDATE comments SET is_deleted = TRUE WHERE id = $1")
                .bind(id)
                .execute(&self.pool).await
                .map_err(internal)?;
            if res.rows_affected() == 0 { return Err(comment_not_found()); }
            Ok(())
        }

        async fn list_comments_by_thread(&self, thread_id: &str) -> RepoResult<Vec<CommentRow>> {
            sqlx::query_as::<_, CommentRow>(r#"
                SELECT c.id, c.content, c.created_at, c.is_deleted, u.username
                FROM comments c
                JOIN users u ON u.id = c.owner
                WHERE c.thread_id = $1
                ORDER BY c.created_at ASC, c.seq ASC
            "#)
                .bind(thread_id)
                .fetch_all(&self.pool).await
                .map_err(internal)
        }
    }

    #[async_trait]
    impl ReplyRepo for PgRepo {
        async fn add_reply(&self, comment_id: &str, owner: &str, new: NewReply) -> RepoResult<Reply> {
            sqlx::query_as::<_, Reply>(
                "INSERT INTO replies (id, comment_id, content, owner, created_at) VALUES ($1,$2,$3,$4,$5) \
                 RETURNING id, comment_id, content, owner, created_at, is_deleted"
            )
                .bind(new_id("reply")).bind(comment_id).bind(&new.content).bind(owner).bind(Utc::now())
                .fetch_one(&self.pool).await
                .map_err(|e| match e {
                    sqlx::Error::Database(db) if db.is_foreign_key_violation() => comment_not_found(),
                    other => internal(other),
                })
        }

        async fn get_reply(&self, id: &str) -> RepoResult<Reply> {
            sqlx::query_as::<_, Reply>(
                "SELECT id, comment_id, content, owner, created_at, is_deleted FROM replies WHERE id = $1"
            )
                .bind(id)
                .fetch_one(&self.pool).await
                .map_err(or_not_found(reply_not_found))
        }

        async fn soft_delete_reply(&self, id: &str) -> RepoResult<()> {
            let res = sqlx::query("UPDATE replies SET is_deleted = TRUE WHERE id = $1")
                .bind(id)
                .execute(&self.pool).await
                .map_err(internal)?;
            if res.rows_affected() == 0 { return Err(reply_not_found()); }
            Ok(())
        }

        async fn list_replies_by_thread(&self, thread_id: &str) -> RepoResult<Vec<ReplyRow>> {
            sqlx::query_as::<_, ReplyRow>(r#"
                SELECT r.id, r.comment_id, r.content, r.created_at, r.is_deleted, u.username
                FROM replies r
                JOIN comments c ON c.id = r.comment_id
                JOIN users u ON u.id = r.owner
                WHERE c.thread_id = $1
                ORDER BY r.created_at ASC, r.seq ASC
            "#)
                .bind(thread_id)
                .fetch_all(&self.pool).await
                .map_err(internal)
        }
    }
}
