use crate::models::{
    AccessToken, AddedComment, AddedReply, AddedThread, CommentDetail, LoginUser, NewComment, NewReply,
    NewThread, RegisterUser, RegisteredUser, ReplyDetail, ThreadDetail,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::register_user,
        crate::routes::login,
        crate::routes::refresh_token,
        crate::routes::create_thread,
        crate::routes::get_thread,
        crate::routes::create_comment,
        crate::routes::delete_comment,
        crate::routes::create_reply,
        crate::routes::delete_reply,
    ),
    components(schemas(
        RegisterUser, RegisteredUser, LoginUser, AccessToken,
        NewThread, AddedThread, ThreadDetail, CommentDetail, ReplyDetail,
        NewComment, AddedComment, NewReply, AddedReply,
    )),
    tags(
        (name = "users", description = "User registration"),
        (name = "authentications", description = "Access token issuing"),
        (name = "threads", description = "Thread operations"),
        (name = "comments", description = "Comment operations"),
        (name = "replies", description = "Reply operations"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/users",
            "/authentications",
            "/threads",
            "/threads/{thread_id}",
            "/threads/{thread_id}/comments/{comment_id}/replies/{reply_id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn every_operation_is_tagged_with_a_declared_tag() {
        let doc = ApiDoc::openapi();
        let declared: Vec<String> = doc.tags.iter().flatten().map(|t| t.name.clone()).collect();
        for (path, item) in &doc.paths.paths {
            for op in item.operations.values() {
                let tags = op.tags.as_deref().unwrap_or_default();
                assert!(!tags.is_empty(), "untagged operation on {path}");
                for tag in tags {
                    assert!(declared.contains(tag), "undeclared tag {tag} on {path}");
                }
            }
        }
    }
}
