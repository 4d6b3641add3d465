use std::sync::Arc;
use actix_web::{web, HttpResponse};

use crate::auth::{Auth, TokenManager};
use crate::error::ApiError;
use crate::models::*;
use crate::rate_limit::RateLimiterFacade;
use crate::repo::Repo;
use crate::use_cases;

pub fn config(cfg: &mut web::ServiceConfig) {
    // malformed / mistyped bodies surface as our JSON 400 instead of actix's plain text
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        ApiError::BadRequest(err.to_string()).into()
    }));
    cfg.service(
        web::resource("/users")
            .route(web::post().to(register_user)),
    )
    .service(
        web::resource("/authentications")
            .route(web::post().to(login))
            .route(web::put().to(refresh_token)),
    )
    .service(
        web::resource("/threads")
            .route(web::post().to(create_thread)),
    )
    .service(web::resource("/threads/{thread_id}").route(web::get().to(get_thread)))
    .service(
        web::resource("/threads/{thread_id}/comments")
            .route(web::post().to(create_comment)),
    )
    .service(
        web::resource("/threads/{thread_id}/comments/{comment_id}")
            .route(web::delete().to(delete_comment)),
    )
    .service(
        web::resource("/threads/{thread_id}/comments/{comment_id}/replies")
            .route(web::post().to(create_reply)),
    )
    .service(
        web::resource("/threads/{thread_id}/comments/{comment_id}/replies/{reply_id}")
            .route(web::delete().to(delete_reply)),
    );
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub tokens: TokenManager,
    pub rate_limiter: Option<RateLimiterFacade>,
}

impl AppState {
    fn allow(&self, check: impl FnOnce(&RateLimiterFacade) -> bool) -> Result<(), ApiError> {
        match &self.rate_limiter {
            Some(rl) if !check(rl) => Err(ApiError::TooManyRequests),
            _ => Ok(()),
        }
    }
}

fn deleted() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status":"success"}))
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    request_body = RegisterUser,
    responses(
        (status = 201, description = "User registered", body = RegisteredUser),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Username taken")
    )
)]
pub async fn register_user(data: web::Data<AppState>, payload: web::Json<RegisterUser>) -> Result<HttpResponse, ApiError> {
    let user = use_cases::register_user(data.repo.as_ref(), payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(user))
}

#[utoipa::path(
    post,
    path = "/authentications",
    tag = "authentications",
    request_body = LoginUser,
    responses(
        (status = 201, description = "Logged in", body = AccessToken),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(data: web::Data<AppState>, payload: web::Json<LoginUser>) -> Result<HttpResponse, ApiError> {
    let token = use_cases::login(data.repo.as_ref(), &data.tokens, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(token))
}

#[utoipa::path(
    put,
    path = "/authentications",
    tag = "authentications",
    responses(
        (status = 200, description = "Token re-issued", body = AccessToken),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn refresh_token(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let token = use_cases::issue_token(&data.tokens, &auth.0.sub, &auth.0.username)?;
    Ok(HttpResponse::Ok().json(token))
}

#[utoipa::path(
    post,
    path = "/threads",
    tag = "threads",
    request_body = NewThread,
    responses(
        (status = 201, description = "Thread created", body = AddedThread),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_thread(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewThread>,
) -> Result<HttpResponse, ApiError> {
    data.allow(|rl| rl.allow_thread(auth.user_id()))?;
    let added = use_cases::add_thread(data.repo.as_ref(), auth.user_id(), payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(added))
}

#[utoipa::path(
    get,
    path = "/threads/{thread_id}",
    tag = "threads",
    params(("thread_id" = String, Path, description = "Thread id")),
    responses(
        (status = 200, description = "Thread with comments and replies", body = ThreadDetail),
        (status = 404, description = "Thread not found")
    )
)]
pub async fn get_thread(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let detail = use_cases::detail_thread(data.repo.as_ref(), &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(detail))
}

#[utoipa::path(
    post,
    path = "/threads/{thread_id}/comments",
    tag = "comments",
    request_body = NewComment,
    params(("thread_id" = String, Path, description = "Thread id")),
    responses(
        (status = 201, description = "Comment created", body = AddedComment),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Thread not found")
    )
)]
pub async fn create_comment(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<NewComment>,
) -> Result<HttpResponse, ApiError> {
    data.allow(|rl| rl.allow_comment(auth.user_id()))?;
    let added = use_cases::add_comment(data.repo.as_ref(), auth.user_id(), &path.into_inner(), payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(added))
}

#[utoipa::path(
    delete,
    path = "/threads/{thread_id}/comments/{comment_id}",
    tag = "comments",
    params(
        ("thread_id" = String, Path, description = "Thread id"),
        ("comment_id" = String, Path, description = "Comment id")
    ),
    responses(
        (status = 200, description = "Comment soft-deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Thread or comment not found")
    )
)]
pub async fn delete_comment(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ApiError> {
    let (thread_id, comment_id) = path.into_inner();
    use_cases::delete_comment(data.repo.as_ref(), auth.user_id(), &thread_id, &comment_id).await?;
    Ok(deleted())
}

#[utoipa::path(
    post,
    path = "/threads/{thread_id}/comments/{comment_id}/replies",
    tag = "replies",
    request_body = NewReply,
    params(
        ("thread_id" = String, Path, description = "Thread id"),
        ("comment_id" = String, Path, description = "Comment id")
    ),
    responses(
        (status = 201, description = "Reply created", body = AddedReply),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Thread or comment not found")
    )
)]
pub async fn create_reply(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
    payload: web::Json<NewReply>,
) -> Result<HttpResponse, ApiError> {
    data.allow(|rl| rl.allow_reply(auth.user_id()))?;
    let (thread_id, comment_id) = path.into_inner();
    let added = use_cases::add_reply(data.repo.as_ref(), auth.user_id(), &thread_id, &comment_id, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(added))
}

#[utoipa::path(
    delete,
    path = "/threads/{thread_id}/comments/{comment_id}/replies/{reply_id}",
    tag = "replies",
    params(
        ("thread_id" = String, Path, description = "Thread id"),
        ("comment_id" = String, Path, description = "Comment id"),
        ("reply_id" = String, Path, description = "Reply id")
    ),
    responses(
        (status = 200, description = "Reply soft-deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Thread, comment or reply not found")
    )
)]
pub async fn delete_reply(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<(String, String, String)>,
) -> Result<HttpResponse, ApiError> {
    let (thread_id, comment_id, reply_id) = path.into_inner();
    use_cases::delete_reply(data.repo.as_ref(), auth.user_id(), &thread_id, &comment_id, &reply_id).await?;
    Ok(deleted())
}
