//! Request-level orchestration on top of the repository traits.
//!
//! Each use case validates its input, runs a short fixed sequence of
//! repository calls and returns the record the handler renders.

use std::collections::HashMap;

use validator::Validate;

use crate::auth::{hash_password, verify_password, TokenManager};
use crate::error::ApiError;
use crate::models::*;
use crate::repo::{Repo, RepoError};

pub async fn register_user(repo: &dyn Repo, payload: RegisterUser) -> Result<RegisteredUser, ApiError> {
    payload.validate()?;
    match repo.find_user_by_username(&payload.username).await {
        Ok(_) => return Err(ApiError::Conflict("username already taken".into())),
        Err(RepoError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }
    let hash = hash_password(&payload.password)?;
    let user = repo.add_user(&payload.username, &hash, &payload.fullname).await?;
    tracing::info!(user_id = %user.id, "user registered");
    Ok(RegisteredUser { id: user.id, username: user.username, fullname: user.fullname })
}

pub async fn login(repo: &dyn Repo, tokens: &TokenManager, payload: LoginUser) -> Result<AccessToken, ApiError> {
    payload.validate()?;
    let invalid = || ApiError::Unauthorized("invalid username or password".into());
    let user = match repo.find_user_by_username(&payload.username).await {
        Ok(u) => u,
        Err(RepoError::NotFound(_)) => return Err(invalid()),
        Err(e) => return Err(e.into()),
    };
    if !verify_password(&payload.password, &user.password_hash)? {
        return Err(invalid());
    }
    issue_token(tokens, &user.id, &user.username)
}

pub fn issue_token(tokens: &TokenManager, user_id: &str, username: &str) -> Result<AccessToken, ApiError> {
    let access_token = tokens.create_access_token(user_id, username).map_err(|e| {
        tracing::error!(error = %e, "token signing failed");
        ApiError::Internal
    })?;
    Ok(AccessToken { access_token })
}

pub async fn add_thread(repo: &dyn Repo, owner: &str, payload: NewThread) -> Result<AddedThread, ApiError> {
    payload.validate()?;
    let thread = repo.add_thread(owner, payload).await?;
    Ok(thread.into())
}

pub async fn add_comment(repo: &dyn Repo, owner: &str, thread_id: &str, payload: NewComment) -> Result<AddedComment, ApiError> {
    payload.validate()?;
    repo.verify_thread_exists(thread_id).await?;
    let comment = repo.add_comment(thread_id, owner, payload).await?;
    Ok(comment.into())
}

/// Fetch a comment and make sure it belongs to `thread_id`.
async fn comment_in_thread(repo: &dyn Repo, thread_id: &str, comment_id: &str) -> Result<Comment, ApiError> {
    repo.verify_thread_exists(thread_id).await?;
    let comment = repo.get_comment(comment_id).await?;
    if comment.thread_id != thread_id {
        return Err(ApiError::NotFound("comment not found".into()));
    }
    Ok(comment)
}

pub async fn delete_comment(repo: &dyn Repo, owner: &str, thread_id: &str, comment_id: &str) -> Result<(), ApiError> {
    let comment = comment_in_thread(repo, thread_id, comment_id).await?;
    if comment.owner != owner {
        return Err(ApiError::Forbidden("you are not the owner of this comment".into()));
    }
    repo.soft_delete_comment(comment_id).await?;
    tracing::info!(%comment_id, "comment soft-deleted");
    Ok(())
}

pub async fn add_reply(
    repo: &dyn Repo,
    owner: &str,
    thread_id: &str,
    comment_id: &str,
    payload: NewReply,
) -> Result<AddedReply, ApiError> {
    payload.validate()?;
    comment_in_thread(repo, thread_id, comment_id).await?;
    let reply = repo.add_reply(comment_id, owner, payload).await?;
    Ok(reply.into())
}

pub async fn delete_reply(
    repo: &dyn Repo,
    owner: &str,
    thread_id: &str,
    comment_id: &str,
    reply_id: &str,
) -> Result<(), ApiError> {
    comment_in_thread(repo, thread_id, comment_id).await?;
    let reply = repo.get_reply(reply_id).await?;
    if reply.comment_id != comment_id {
        return Err(ApiError::NotFound("reply not found".into()));
    }
    if reply.owner != owner {
        return Err(ApiError::Forbidden("you are not the owner of this reply".into()));
    }
    repo.soft_delete_reply(reply_id).await?;
    tracing::info!(%reply_id, "reply soft-deleted");
    Ok(())
}

/// Thread with its comments and their replies, deleted content masked.
pub async fn detail_thread(repo: &dyn Repo, thread_id: &str) -> Result<ThreadDetail, ApiError> {
    let (thread, comments, replies) = futures_util::try_join!(
        repo.get_thread_by_id(thread_id),
        repo.list_comments_by_thread(thread_id),
        repo.list_replies_by_thread(thread_id),
    )?;
    Ok(assemble_thread_detail(thread, comments, replies))
}

/// Nest replies under their comment and mask soft-deleted content.
///
/// Comments and replies come out oldest first. Replies pointing at a
/// comment not in `comments` are dropped.
pub fn assemble_thread_detail(thread: ThreadRow, mut comments: Vec<CommentRow>, mut replies: Vec<ReplyRow>) -> ThreadDetail {
    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    replies.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let mut by_comment: HashMap<Id, Vec<ReplyDetail>> = HashMap::new();
    for r in replies {
        let content = if r.is_deleted { DELETED_REPLY_CONTENT.to_string() } else { r.content };
        by_comment.entry(r.comment_id).or_default().push(ReplyDetail {
            id: r.id,
            content,
            date: r.created_at,
            username: r.username,
        });
    }

    let comments = comments
        .into_iter()
        .map(|c| CommentDetail {
            replies: by_comment.remove(&c.id).unwrap_or_default(),
            content: if c.is_deleted { DELETED_COMMENT_CONTENT.to_string() } else { c.content },
            id: c.id,
            username: c.username,
            date: c.created_at,
        })
        .collect();

    ThreadDetail {
        id: thread.id,
        title: thread.title,
        body: thread.body,
        date: thread.created_at,
        username: thread.username,
        comments,
    }
}
