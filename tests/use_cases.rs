#![cfg(feature = "inmem-store")]

use forum_api::{
    auth::TokenManager,
    error::ApiError,
    models::{LoginUser, NewComment, NewReply, NewThread, RegisterUser, DELETED_COMMENT_CONTENT, DELETED_REPLY_CONTENT},
    repo::inmem::InMemRepo,
    use_cases,
};

async fn user(repo: &InMemRepo, username: &str) -> String {
    use_cases::register_user(
        repo,
        RegisterUser { username: username.into(), password: "secret".into(), fullname: username.to_uppercase() },
    )
    .await
    .unwrap()
    .id
}

async fn thread(repo: &InMemRepo, owner: &str) -> String {
    use_cases::add_thread(repo, owner, NewThread { title: "sebuah thread".into(), body: "sebuah body thread".into() })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn detail_thread_masks_and_nests() {
    let repo = InMemRepo::new();
    let dicoding = user(&repo, "dicoding").await;
    let johndoe = user(&repo, "johndoe").await;
    let t = thread(&repo, &dicoding).await;

    let c1 = use_cases::add_comment(&repo, &dicoding, &t, NewComment { content: "deleted later".into() }).await.unwrap();
    let c2 = use_cases::add_comment(&repo, &johndoe, &t, NewComment { content: "stays".into() }).await.unwrap();
    let c3 = use_cases::add_comment(&repo, &johndoe, &t, NewComment { content: "lonely".into() }).await.unwrap();
    let r1 = use_cases::add_reply(&repo, &johndoe, &t, &c1.id, NewReply { content: "gone".into() }).await.unwrap();
    let r2 = use_cases::add_reply(&repo, &dicoding, &t, &c2.id, NewReply { content: "kept".into() }).await.unwrap();

    use_cases::delete_comment(&repo, &dicoding, &t, &c1.id).await.unwrap();
    use_cases::delete_reply(&repo, &johndoe, &t, &c1.id, &r1.id).await.unwrap();

    let detail = use_cases::detail_thread(&repo, &t).await.unwrap();
    assert_eq!(detail.id, t);
    assert_eq!(detail.username, "dicoding");
    assert_eq!(detail.comments.len(), 3);

    let first = &detail.comments[0];
    assert_eq!(first.id, c1.id);
    assert_eq!(first.content, DELETED_COMMENT_CONTENT);
    assert_eq!(first.username, "dicoding");
    assert_eq!(first.replies.len(), 1);
    assert_eq!(first.replies[0].content, DELETED_REPLY_CONTENT);
    assert_eq!(first.replies[0].username, "johndoe");

    let second = &detail.comments[1];
    assert_eq!(second.id, c2.id);
    assert_eq!(second.content, "stays");
    assert_eq!(second.replies[0].id, r2.id);
    assert_eq!(second.replies[0].content, "kept");

    assert_eq!(detail.comments[2].id, c3.id);
    assert!(detail.comments[2].replies.is_empty());
}

#[tokio::test]
async fn detail_of_unknown_thread_is_not_found() {
    let repo = InMemRepo::new();
    let err = use_cases::detail_thread(&repo, "thread-nope").await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn only_owner_may_delete() {
    let repo = InMemRepo::new();
    let owner = user(&repo, "owner").await;
    let intruder = user(&repo, "intruder").await;
    let t = thread(&repo, &owner).await;
    let c = use_cases::add_comment(&repo, &owner, &t, NewComment { content: "mine".into() }).await.unwrap();
    let r = use_cases::add_reply(&repo, &owner, &t, &c.id, NewReply { content: "mine too".into() }).await.unwrap();

    let err = use_cases::delete_comment(&repo, &intruder, &t, &c.id).await.unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
    let err = use_cases::delete_reply(&repo, &intruder, &t, &c.id, &r.id).await.unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let detail = use_cases::detail_thread(&repo, &t).await.unwrap();
    assert_eq!(detail.comments[0].content, "mine");
    assert_eq!(detail.comments[0].replies[0].content, "mine too");

    // idempotent for the owner
    use_cases::delete_comment(&repo, &owner, &t, &c.id).await.unwrap();
    use_cases::delete_comment(&repo, &owner, &t, &c.id).await.unwrap();
}

#[tokio::test]
async fn mismatched_parents_are_not_found() {
    let repo = InMemRepo::new();
    let owner = user(&repo, "owner").await;
    let t1 = thread(&repo, &owner).await;
    let t2 = thread(&repo, &owner).await;
    let c1 = use_cases::add_comment(&repo, &owner, &t1, NewComment { content: "on t1".into() }).await.unwrap();
    let c2 = use_cases::add_comment(&repo, &owner, &t1, NewComment { content: "also t1".into() }).await.unwrap();
    let r1 = use_cases::add_reply(&repo, &owner, &t1, &c1.id, NewReply { content: "x".into() }).await.unwrap();

    // comment exists but under another thread
    let err = use_cases::delete_comment(&repo, &owner, &t2, &c1.id).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
    let err = use_cases::add_reply(&repo, &owner, &t2, &c1.id, NewReply { content: "x".into() }).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
    // reply exists but under another comment
    let err = use_cases::delete_reply(&repo, &owner, &t1, &c2.id, &r1.id).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
    let err = use_cases::add_comment(&repo, &owner, "thread-missing", NewComment { content: "x".into() }).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn invalid_payloads_are_rejected() {
    let repo = InMemRepo::new();
    let owner = user(&repo, "owner").await;
    let err = use_cases::add_thread(&repo, &owner, NewThread { title: "x".repeat(101), body: "b".into() }).await.unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));
    let t = thread(&repo, &owner).await;
    let err = use_cases::add_comment(&repo, &owner, &t, NewComment { content: "x".repeat(201) }).await.unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));
}

#[tokio::test]
async fn register_and_login() {
    let repo = InMemRepo::new();
    let tokens = TokenManager::new("test-secret-must-be-32-bytes-long!!", 3600);
    let id = user(&repo, "dicoding").await;

    let err = use_cases::register_user(
        &repo,
        RegisterUser { username: "dicoding".into(), password: "secret".into(), fullname: "Dup".into() },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    let token = use_cases::login(&repo, &tokens, LoginUser { username: "dicoding".into(), password: "secret".into() })
        .await
        .unwrap();
    let claims = tokens.decode(&token.access_token).unwrap();
    assert_eq!(claims.sub, id);

    let err = use_cases::login(&repo, &tokens, LoginUser { username: "dicoding".into(), password: "wrong".into() })
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(_)));
    let err = use_cases::login(&repo, &tokens, LoginUser { username: "ghost".into(), password: "secret".into() })
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(_)));
}
