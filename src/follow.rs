use spin_sdk::http::{Request, Response};
use spin_sdk::key_value::Store;

use crate::auth::current_user;
use crate::config::{followings_key, USERS_LIST_KEY};
use crate::core::errors::ApiError;
use crate::core::helpers::{get_user, json_response, now_iso, store, validate_uuid};
use crate::models::models::{Follow, Permission};

// === Graph operations ===

/// Check-then-insert; an existing edge makes this a no-op. The check and the
/// write are not atomic, mirroring the source system's application-level
/// uniqueness.
pub fn follow_user(store: &Store, fans_id: &str, blogger_id: &str) -> anyhow::Result<()> {
    if is_following(store, fans_id, blogger_id)? {
        return Ok(());
    }

    let key = followings_key(fans_id);
    let mut followings: Vec<Follow> = store.get_json(&key)?.unwrap_or_default();
    followings.push(Follow {
        blogger_id: blogger_id.to_string(),
        followed_at: now_iso(),
    });
    store.set_json(&key, &followings)?;

    Ok(())
}

/// Unfollow deletes the edge record; a missing edge is a no-op.
pub fn unfollow_user(store: &Store, fans_id: &str, blogger_id: &str) -> anyhow::Result<()> {
    let key = followings_key(fans_id);
    let mut followings: Vec<Follow> = store.get_json(&key)?.unwrap_or_default();

    followings.retain(|f| f.blogger_id != blogger_id);
    store.set_json(&key, &followings)?;

    Ok(())
}

pub fn is_following(store: &Store, fans_id: &str, blogger_id: &str) -> anyhow::Result<bool> {
    let followings: Vec<Follow> = store.get_json(&followings_key(fans_id))?.unwrap_or_default();
    Ok(followings.iter().any(|f| f.blogger_id == blogger_id))
}

pub fn get_followings(store: &Store, user_id: &str) -> anyhow::Result<Vec<Follow>> {
    Ok(store.get_json(&followings_key(user_id))?.unwrap_or_default())
}

/// Inbound edges, found by scanning every user's edge list.
pub fn get_followers(store: &Store, user_id: &str) -> anyhow::Result<Vec<serde_json::Value>> {
    let users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
    let mut followers = Vec::new();

    for fans_id in users {
        let followings: Vec<Follow> = store
            .get_json(&followings_key(&fans_id))?
            .unwrap_or_default();
        if let Some(edge) = followings.iter().find(|f| f.blogger_id == user_id) {
            followers.push(serde_json::json!({
                "fans_id": fans_id,
                "followed_at": edge.followed_at,
            }));
        }
    }

    Ok(followers)
}

// === HTTP Handlers ===

pub fn handle_follow(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let user = match current_user(&store, &req)? {
        Some(u) => u,
        None => return Ok(ApiError::unauthorized().into()),
    };
    if !user.can(&store, Permission::FOLLOW) {
        return Ok(ApiError::forbidden().into());
    }

    let value: serde_json::Value = serde_json::from_slice(req.body())?;
    let blogger_id = value["blogger_id"].as_str().unwrap_or_default();

    if blogger_id.is_empty() || !validate_uuid(blogger_id) || blogger_id == user.id {
        return Ok(ApiError::BadRequest("Invalid target user".to_string()).into());
    }
    if get_user(&store, blogger_id)?.is_none() {
        return Ok(ApiError::NotFound("Target user not found".to_string()).into());
    }

    follow_user(&store, &user.id, blogger_id)?;

    json_response(200, &serde_json::json!({"status": "followed"}))
}

pub fn handle_unfollow(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let user = match current_user(&store, &req)? {
        Some(u) => u,
        None => return Ok(ApiError::unauthorized().into()),
    };
    if !user.can(&store, Permission::FOLLOW) {
        return Ok(ApiError::forbidden().into());
    }

    let value: serde_json::Value = serde_json::from_slice(req.body())?;
    let blogger_id = value["blogger_id"].as_str().unwrap_or_default();

    if blogger_id.is_empty() || !validate_uuid(blogger_id) {
        return Ok(ApiError::BadRequest("Invalid target user".to_string()).into());
    }

    unfollow_user(&store, &user.id, blogger_id)?;

    json_response(200, &serde_json::json!({"status": "unfollowed"}))
}

pub fn get_followings_list(path: &str) -> anyhow::Result<Response> {
    let user_id = path.trim_start_matches("/followings/");

    if user_id.is_empty() || !validate_uuid(user_id) {
        return Ok(ApiError::BadRequest("User ID required".to_string()).into());
    }

    let store = store();
    let followings: Vec<serde_json::Value> = get_followings(&store, user_id)?
        .iter()
        .map(|f| {
            serde_json::json!({
                "blogger_id": f.blogger_id,
                "followed_at": f.followed_at,
            })
        })
        .collect();

    json_response(200, &serde_json::json!(followings))
}

pub fn get_followers_list(path: &str) -> anyhow::Result<Response> {
    let user_id = path.trim_start_matches("/followers/");

    if user_id.is_empty() || !validate_uuid(user_id) {
        return Ok(ApiError::BadRequest("User ID required".to_string()).into());
    }

    let store = store();
    let followers = get_followers(&store, user_id)?;

    json_response(200, &serde_json::json!(followers))
}
