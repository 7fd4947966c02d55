use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use spin_sdk::http::{Request, Response};
use spin_sdk::key_value::Store;
use uuid::Uuid;

use crate::comments::{comment_view, insert_comment, load_comment, post_comment_ids};
use crate::config::{
    self, post_key, API_TOKEN_TTL_SECS, COMMENTS_LIST_KEY, COMMENTS_PER_PAGE, FEED_KEY,
    MAX_COMMENT_LENGTH, MAX_POST_LENGTH, POSTS_PER_PAGE, USERS_LIST_KEY,
};
use crate::core::errors::ApiError;
use crate::core::helpers::{
    find_user_by_email, get_user, json_response, now_iso, store, validate_uuid, verify_password,
};
use crate::core::pagination::{page_slice, page_urls};
use crate::core::query_params::{get_int, parse_query_params};
use crate::core::tokens::{self, PURPOSE_API_AUTH};
use crate::follow::{get_followers, get_followings};
use crate::models::models::{Comment, Permission, Post, User};
use crate::posts::{followed_posts, insert_post, load_post};

struct ApiAuth {
    user: User,
    token_used: bool,
}

/// Bearer = signed api-auth token; Basic = email:password. Anything else is
/// anonymous and rejected by `route`.
fn authenticate(store: &Store, req: &Request) -> anyhow::Result<Option<ApiAuth>> {
    let header = match req.header("Authorization").and_then(|h| h.as_str()) {
        Some(h) => h,
        None => return Ok(None),
    };

    if let Some(token) = header.strip_prefix("Bearer ") {
        let user_id = match tokens::verify(&config::secret_key(), token, PURPOSE_API_AUTH) {
            Some(sub) => sub,
            None => return Ok(None),
        };
        return Ok(get_user(store, &user_id)?.map(|user| ApiAuth {
            user,
            token_used: true,
        }));
    }

    if let Some(encoded) = header.strip_prefix("Basic ") {
        let decoded = match BASE64.decode(encoded) {
            Ok(bytes) => bytes,
            Err(_) => return Ok(None),
        };
        let text = String::from_utf8(decoded).unwrap_or_default();
        let (email, password) = match text.split_once(':') {
            Some(pair) => pair,
            None => return Ok(None),
        };
        if email.is_empty() {
            return Ok(None);
        }
        if let Some(user) = find_user_by_email(store, email)? {
            if verify_password(password, &user.password) {
                return Ok(Some(ApiAuth {
                    user,
                    token_used: false,
                }));
            }
        }
    }

    Ok(None)
}

fn envelope(
    key: &str,
    items: Vec<serde_json::Value>,
    base: &str,
    page: usize,
    total: usize,
    per_page: usize,
) -> serde_json::Value {
    let (prev, next) = page_urls(base, page, total, per_page);
    let mut value = serde_json::json!({"prev": prev, "next": next, "count": total});
    value[key] = serde_json::Value::Array(items);
    value
}

/// Single entry point for everything under `/api/v1`. Every route requires
/// an authenticated, confirmed account.
pub fn route(req: Request) -> anyhow::Result<Response> {
    let store = store();

    let auth = match authenticate(&store, &req)? {
        Some(a) => a,
        None => return Ok(ApiError::Unauthorized("Invalid credentials".to_string()).into()),
    };
    if !auth.user.confirmed {
        return Ok(ApiError::Forbidden("Unconfirmed account".to_string()).into());
    }

    let method = req.method().to_string();
    let path = req.path().to_string();
    let params = parse_query_params(req.uri());
    let page = get_int(&params, "page", 1);

    let segments: Vec<&str> = path
        .trim_start_matches("/api/v1")
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    match (method.as_str(), segments.as_slice()) {
        ("POST", ["tokens"]) => issue_token(&auth),
        ("GET", ["users"]) => list_users(&store),
        ("GET", ["users", id]) => show_user(&store, id),
        ("GET", ["users", id, "posts"]) => user_posts(&store, id, page),
        ("GET", ["users", id, "timeline"]) => user_timeline(&store, id, page),
        ("GET", ["users", id, "followed"]) => user_followed(&store, id),
        ("GET", ["users", id, "follower"]) => user_followers(&store, id),
        ("GET", ["posts"]) => list_posts(&store, page),
        ("POST", ["posts"]) => create_post(&store, &auth, &req),
        ("GET", ["posts", id]) => show_post(&store, id),
        ("PUT", ["posts", id]) => update_post(&store, &auth, &req, id),
        ("GET", ["posts", id, "comments"]) => list_post_comments(&store, &auth, id, page),
        ("POST", ["posts", id, "comments"]) => create_comment(&store, &auth, &req, id),
        ("GET", ["comments"]) => list_comments(&store, page),
        ("GET", ["comments", id]) => show_comment(&store, &auth, id),
        _ => Ok(ApiError::NotFound("No such API route".to_string()).into()),
    }
}

// === Tokens ===

fn issue_token(auth: &ApiAuth) -> anyhow::Result<Response> {
    // A token must not mint its own successor; password auth only.
    if auth.token_used {
        return Ok(ApiError::Unauthorized("Invalid credentials".to_string()).into());
    }

    let token = tokens::generate(
        &config::secret_key(),
        &auth.user.id,
        PURPOSE_API_AUTH,
        API_TOKEN_TTL_SECS,
    );
    json_response(
        200,
        &serde_json::json!({"token": token, "expiration": API_TOKEN_TTL_SECS}),
    )
}

// === Users ===

fn list_users(store: &Store) -> anyhow::Result<Response> {
    let ids: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
    let mut users = Vec::new();
    for id in ids {
        if let Some(u) = get_user(store, &id)? {
            users.push(u.to_json());
        }
    }
    json_response(200, &serde_json::json!({"users": users}))
}

fn show_user(store: &Store, id: &str) -> anyhow::Result<Response> {
    if !validate_uuid(id) {
        return Ok(ApiError::BadRequest("User ID required".to_string()).into());
    }
    match get_user(store, id)? {
        Some(user) => json_response(200, &user.to_json()),
        None => Ok(ApiError::NotFound("User not found".to_string()).into()),
    }
}

fn user_posts(store: &Store, id: &str, page: usize) -> anyhow::Result<Response> {
    if get_user(store, id)?.is_none() {
        return Ok(ApiError::NotFound("User not found".to_string()).into());
    }

    let feed: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();
    let mut posts = Vec::new();
    for post_id in feed.iter() {
        if let Some(p) = load_post(store, post_id)? {
            if p.author_id == id {
                posts.push(p);
            }
        }
    }

    let total = posts.len();
    let items = page_slice(&posts, page, POSTS_PER_PAGE)
        .iter()
        .map(|p| p.to_json())
        .collect();
    json_response(
        200,
        &envelope(
            "posts",
            items,
            &format!("/api/v1/users/{}/posts/", id),
            page,
            total,
            POSTS_PER_PAGE,
        ),
    )
}

fn user_timeline(store: &Store, id: &str, page: usize) -> anyhow::Result<Response> {
    if get_user(store, id)?.is_none() {
        return Ok(ApiError::NotFound("User not found".to_string()).into());
    }

    let posts = followed_posts(store, id)?;
    let total = posts.len();
    let items = page_slice(&posts, page, POSTS_PER_PAGE)
        .iter()
        .map(|p| p.to_json())
        .collect();
    json_response(
        200,
        &envelope(
            "posts",
            items,
            &format!("/api/v1/users/{}/timeline/", id),
            page,
            total,
            POSTS_PER_PAGE,
        ),
    )
}

fn user_followed(store: &Store, id: &str) -> anyhow::Result<Response> {
    if get_user(store, id)?.is_none() {
        return Ok(ApiError::NotFound("User not found".to_string()).into());
    }

    let followed: Vec<serde_json::Value> = get_followings(store, id)?
        .iter()
        .map(|f| {
            serde_json::json!({
                "fans_id": id,
                "blogger_id": f.blogger_id,
                "followed_at": f.followed_at,
            })
        })
        .collect();
    json_response(200, &serde_json::json!({"followed": followed}))
}

fn user_followers(store: &Store, id: &str) -> anyhow::Result<Response> {
    if get_user(store, id)?.is_none() {
        return Ok(ApiError::NotFound("User not found".to_string()).into());
    }
    let followers = get_followers(store, id)?;
    json_response(200, &serde_json::json!({"followers": followers}))
}

// === Posts ===

fn list_posts(store: &Store, page: usize) -> anyhow::Result<Response> {
    let feed: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();
    let total = feed.len();

    let mut items = Vec::new();
    for id in page_slice(&feed, page, POSTS_PER_PAGE) {
        if let Some(p) = load_post(store, &id)? {
            items.push(p.to_json());
        }
    }

    json_response(
        200,
        &envelope("posts", items, "/api/v1/posts/", page, total, POSTS_PER_PAGE),
    )
}

fn show_post(store: &Store, id: &str) -> anyhow::Result<Response> {
    if !validate_uuid(id) {
        return Ok(ApiError::BadRequest("Post ID required".to_string()).into());
    }
    match load_post(store, id)? {
        Some(post) => json_response(200, &post.to_json()),
        None => Ok(ApiError::NotFound("Post not found".to_string()).into()),
    }
}

fn create_post(store: &Store, auth: &ApiAuth, req: &Request) -> anyhow::Result<Response> {
    if !auth.user.can(store, Permission::WRITE) {
        return Ok(ApiError::forbidden().into());
    }

    let value: serde_json::Value = serde_json::from_slice(req.body())?;
    let body = value["body"].as_str().unwrap_or_default();
    if body.is_empty() || body.len() > MAX_POST_LENGTH {
        return Ok(ApiError::BadRequest("Invalid post body".to_string()).into());
    }

    let id = Uuid::new_v4().to_string();
    let post = Post::new(&id, &auth.user.id, body);
    insert_post(store, &post)?;

    Ok(Response::builder()
        .status(201)
        .header("Content-Type", "application/json")
        .header("Location", format!("/api/v1/posts/{}/", id))
        .body(serde_json::to_vec(&post.to_json())?)
        .build())
}

fn update_post(store: &Store, auth: &ApiAuth, req: &Request, id: &str) -> anyhow::Result<Response> {
    if !validate_uuid(id) {
        return Ok(ApiError::BadRequest("Post ID required".to_string()).into());
    }
    let mut post = match load_post(store, id)? {
        Some(p) => p,
        None => return Ok(ApiError::NotFound("Post not found".to_string()).into()),
    };
    if post.author_id != auth.user.id && !auth.user.can(store, Permission::ADMIN) {
        return Ok(ApiError::forbidden().into());
    }

    let value: serde_json::Value = serde_json::from_slice(req.body())?;
    let body = value["body"].as_str().unwrap_or(&post.body).to_string();
    if body.is_empty() || body.len() > MAX_POST_LENGTH {
        return Ok(ApiError::BadRequest("Invalid post body".to_string()).into());
    }

    if post.body != body {
        post.set_body(&body);
        post.updated_at = Some(now_iso());
        store.set_json(&post_key(id), &post)?;
    }

    json_response(200, &post.to_json())
}

// === Comments ===

fn list_post_comments(store: &Store, auth: &ApiAuth, id: &str, page: usize) -> anyhow::Result<Response> {
    if load_post(store, id)?.is_none() {
        return Ok(ApiError::NotFound("Post not found".to_string()).into());
    }

    let moderator = auth.user.can(store, Permission::MODERATE);
    let ids = post_comment_ids(store, id)?;
    let total = ids.len();

    let mut items = Vec::new();
    for cid in page_slice(&ids, page, COMMENTS_PER_PAGE) {
        if let Some(c) = load_comment(store, &cid)? {
            items.push(comment_view(&c, moderator));
        }
    }

    json_response(
        200,
        &envelope(
            "comments",
            items,
            &format!("/api/v1/posts/{}/comments/", id),
            page,
            total,
            COMMENTS_PER_PAGE,
        ),
    )
}

fn create_comment(store: &Store, auth: &ApiAuth, req: &Request, id: &str) -> anyhow::Result<Response> {
    if !auth.user.can(store, Permission::COMMENT) {
        return Ok(ApiError::forbidden().into());
    }
    if load_post(store, id)?.is_none() {
        return Ok(ApiError::NotFound("Post not found".to_string()).into());
    }

    let value: serde_json::Value = serde_json::from_slice(req.body())?;
    let body = value["body"].as_str().unwrap_or_default();
    if body.is_empty() || body.len() > MAX_COMMENT_LENGTH {
        return Ok(ApiError::BadRequest("Invalid comment body".to_string()).into());
    }

    let comment_id = Uuid::new_v4().to_string();
    let comment = Comment::new(&comment_id, &auth.user.id, id, body);
    insert_comment(store, &comment)?;

    Ok(Response::builder()
        .status(201)
        .header("Content-Type", "application/json")
        .header("Location", format!("/api/v1/comments/{}/", comment_id))
        .body(serde_json::to_vec(&comment.to_json())?)
        .build())
}

fn list_comments(store: &Store, page: usize) -> anyhow::Result<Response> {
    let ids: Vec<String> = store.get_json(COMMENTS_LIST_KEY)?.unwrap_or_default();
    let total = ids.len();

    let mut items = Vec::new();
    for cid in page_slice(&ids, page, COMMENTS_PER_PAGE) {
        if let Some(c) = load_comment(store, &cid)? {
            items.push(c.to_json());
        }
    }

    json_response(
        200,
        &envelope("comments", items, "/api/v1/comments/", page, total, COMMENTS_PER_PAGE),
    )
}

fn show_comment(store: &Store, auth: &ApiAuth, id: &str) -> anyhow::Result<Response> {
    if !validate_uuid(id) {
        return Ok(ApiError::BadRequest("Comment ID required".to_string()).into());
    }
    let moderator = auth.user.can(store, Permission::MODERATE);
    match load_comment(store, id)? {
        Some(c) => json_response(200, &comment_view(&c, moderator)),
        None => Ok(ApiError::NotFound("Comment not found".to_string()).into()),
    }
}
