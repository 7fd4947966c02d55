use spin_sdk::http::{Request, Response};
use spin_sdk::key_value::Store;
use uuid::Uuid;

use crate::auth::current_user;
use crate::config::{
    comment_key, post_comments_key, post_key, COMMENTS_LIST_KEY, COMMENTS_PER_PAGE,
    MAX_COMMENT_LENGTH,
};
use crate::core::errors::ApiError;
use crate::core::helpers::{json_response, store, validate_uuid};
use crate::core::pagination::page_slice;
use crate::core::query_params::{get_int, parse_query_params};
use crate::models::models::{Comment, Permission, Post};

const DISABLED_PLACEHOLDER: &str = "[comment disabled by a moderator]";

pub fn load_comment(store: &Store, comment_id: &str) -> anyhow::Result<Option<Comment>> {
    Ok(store.get_json::<Comment>(&comment_key(comment_id))?)
}

/// Comment ids for a post, oldest first (insertion order).
pub fn post_comment_ids(store: &Store, post_id: &str) -> anyhow::Result<Vec<String>> {
    Ok(store.get_json(&post_comments_key(post_id))?.unwrap_or_default())
}

/// Persist a new comment and index it per-post (oldest first) and globally
/// (newest first, for the moderation queue).
pub fn insert_comment(store: &Store, comment: &Comment) -> anyhow::Result<()> {
    store.set_json(&comment_key(&comment.id), comment)?;

    let mut post_comments: Vec<String> = store
        .get_json(&post_comments_key(&comment.post_id))?
        .unwrap_or_default();
    post_comments.push(comment.id.clone());
    store.set_json(&post_comments_key(&comment.post_id), &post_comments)?;

    let mut all: Vec<String> = store.get_json(COMMENTS_LIST_KEY)?.unwrap_or_default();
    all.insert(0, comment.id.clone());
    store.set_json(COMMENTS_LIST_KEY, &all)?;

    Ok(())
}

/// Reader view of a comment. Moderators see disabled comments flagged;
/// everyone else gets the placeholder body.
pub fn comment_view(comment: &Comment, moderator: bool) -> serde_json::Value {
    let mut view = comment.to_json();
    if comment.is_ban && !moderator {
        view["body"] = serde_json::Value::String(DISABLED_PLACEHOLDER.to_string());
        view["body_html"] = serde_json::Value::String(DISABLED_PLACEHOLDER.to_string());
    }
    view
}

fn comments_path_post_id(path: &str) -> String {
    // /posts/{id}/comments
    path.split('/').nth(2).unwrap_or("").to_string()
}

fn moderation_path_comment_id(path: &str) -> String {
    // /comments/{id}/disable | /comments/{id}/enable
    path.split('/').nth(2).unwrap_or("").to_string()
}

pub fn create_comment(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let user = match current_user(&store, &req)? {
        Some(u) => u,
        None => return Ok(ApiError::unauthorized().into()),
    };
    if !user.can(&store, Permission::COMMENT) {
        return Ok(ApiError::forbidden().into());
    }

    let post_id = comments_path_post_id(req.path());
    if post_id.is_empty() || !validate_uuid(&post_id) {
        return Ok(ApiError::BadRequest("Post ID required".to_string()).into());
    }
    if store.get_json::<Post>(&post_key(&post_id))?.is_none() {
        return Ok(ApiError::NotFound("Post not found".to_string()).into());
    }

    let value: serde_json::Value = serde_json::from_slice(req.body())?;
    let body = value["body"].as_str().unwrap_or_default();
    if body.is_empty() || body.len() > MAX_COMMENT_LENGTH {
        return Ok(ApiError::BadRequest("Invalid comment body".to_string()).into());
    }

    let id = Uuid::new_v4().to_string();
    let comment = Comment::new(&id, &user.id, &post_id, body);
    insert_comment(&store, &comment)?;

    json_response(201, &comment.to_json())
}

pub fn list_post_comments(req: Request) -> anyhow::Result<Response> {
    let store = store();

    let post_id = comments_path_post_id(req.path());
    if post_id.is_empty() || !validate_uuid(&post_id) {
        return Ok(ApiError::BadRequest("Post ID required".to_string()).into());
    }
    if store.get_json::<Post>(&post_key(&post_id))?.is_none() {
        return Ok(ApiError::NotFound("Post not found".to_string()).into());
    }

    // Anonymous readers are fine; moderators get the unredacted view.
    let moderator = match current_user(&store, &req)? {
        Some(u) => u.can(&store, Permission::MODERATE),
        None => false,
    };

    let params = parse_query_params(req.uri());
    let page = get_int(&params, "page", 1);

    let ids = post_comment_ids(&store, &post_id)?;
    let mut comments = Vec::new();
    for id in page_slice(&ids, page, COMMENTS_PER_PAGE) {
        if let Some(c) = load_comment(&store, &id)? {
            comments.push(comment_view(&c, moderator));
        }
    }

    json_response(200, &serde_json::json!(comments))
}

/// Moderation queue: every comment, newest first, `is_ban` visible.
pub fn list_all_comments(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let user = match current_user(&store, &req)? {
        Some(u) => u,
        None => return Ok(ApiError::unauthorized().into()),
    };
    if !user.can(&store, Permission::MODERATE) {
        return Ok(ApiError::forbidden().into());
    }

    let params = parse_query_params(req.uri());
    let page = get_int(&params, "page", 1);

    let ids: Vec<String> = store.get_json(COMMENTS_LIST_KEY)?.unwrap_or_default();
    let mut comments = Vec::new();
    for id in page_slice(&ids, page, COMMENTS_PER_PAGE) {
        if let Some(c) = load_comment(&store, &id)? {
            comments.push(c.to_json());
        }
    }

    json_response(200, &serde_json::json!(comments))
}

fn set_comment_ban(req: Request, ban: bool) -> anyhow::Result<Response> {
    let store = store();
    let user = match current_user(&store, &req)? {
        Some(u) => u,
        None => return Ok(ApiError::unauthorized().into()),
    };
    if !user.can(&store, Permission::MODERATE) {
        return Ok(ApiError::forbidden().into());
    }

    let comment_id = moderation_path_comment_id(req.path());
    if comment_id.is_empty() || !validate_uuid(&comment_id) {
        return Ok(ApiError::BadRequest("Comment ID required".to_string()).into());
    }

    let mut comment = match load_comment(&store, &comment_id)? {
        Some(c) => c,
        None => return Ok(ApiError::NotFound("Comment not found".to_string()).into()),
    };

    comment.is_ban = ban;
    store.set_json(&comment_key(&comment_id), &comment)?;

    json_response(200, &comment.to_json())
}

pub fn disable_comment(req: Request) -> anyhow::Result<Response> {
    set_comment_ban(req, true)
}

pub fn enable_comment(req: Request) -> anyhow::Result<Response> {
    set_comment_ban(req, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(is_ban: bool) -> Comment {
        let mut c = Comment::new("c1", "u1", "p1", "nice post");
        c.is_ban = is_ban;
        c
    }

    #[test]
    fn visible_comment_is_untouched() {
        let view = comment_view(&sample(false), false);
        assert_eq!(view["body"], "nice post");
        assert_eq!(view["is_ban"], false);
    }

    #[test]
    fn disabled_comment_is_redacted_for_readers() {
        let view = comment_view(&sample(true), false);
        assert_eq!(view["body"], DISABLED_PLACEHOLDER);
        assert_eq!(view["body_html"], DISABLED_PLACEHOLDER);
        assert_eq!(view["is_ban"], true);
    }

    #[test]
    fn moderators_see_disabled_body() {
        let view = comment_view(&sample(true), true);
        assert_eq!(view["body"], "nice post");
        assert_eq!(view["is_ban"], true);
    }

    #[test]
    fn reenabling_restores_visibility() {
        let mut comment = sample(true);
        comment.is_ban = false;
        let view = comment_view(&comment, false);
        assert_eq!(view["body"], "nice post");
    }

    #[test]
    fn path_parsing_extracts_ids() {
        assert_eq!(comments_path_post_id("/posts/abc/comments"), "abc");
        assert_eq!(moderation_path_comment_id("/comments/xyz/disable"), "xyz");
        assert_eq!(comments_path_post_id("/posts"), "");
    }
}
