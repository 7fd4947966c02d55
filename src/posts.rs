use spin_sdk::http::{Request, Response};
use spin_sdk::key_value::Store;
use uuid::Uuid;

use crate::auth::current_user;
use crate::config::{
    post_comments_key, post_key, FEED_KEY, MAX_POST_LENGTH, POSTS_PER_PAGE,
};
use crate::core::errors::ApiError;
use crate::core::helpers::{find_user_by_username, json_response, now_iso, store, validate_uuid};
use crate::core::pagination::page_slice;
use crate::core::query_params::{get_bool_flag, get_int, get_string, parse_query_params};
use crate::follow::get_followings;
use crate::models::models::{Permission, Post, User};

pub fn load_post(store: &Store, post_id: &str) -> anyhow::Result<Option<Post>> {
    Ok(store.get_json::<Post>(&post_key(post_id))?)
}

/// Persist a new post and prepend it to the global feed index.
pub fn insert_post(store: &Store, post: &Post) -> anyhow::Result<()> {
    store.set_json(&post_key(&post.id), post)?;

    let mut feed: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();
    feed.insert(0, post.id.clone()); // prepend newest
    store.set_json(FEED_KEY, &feed)?;

    Ok(())
}

// Authors edit their own posts; ADMIN overrides ownership.
fn can_modify(store: &Store, user: &User, post: &Post) -> bool {
    post.author_id == user.id || user.can(store, Permission::ADMIN)
}

pub fn create_post(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let user = match current_user(&store, &req)? {
        Some(u) => u,
        None => return Ok(ApiError::unauthorized().into()),
    };
    if !user.can(&store, Permission::WRITE) {
        return Ok(ApiError::forbidden().into());
    }

    let value: serde_json::Value = serde_json::from_slice(req.body())?;
    let body = value["body"].as_str().unwrap_or_default();
    if body.is_empty() || body.len() > MAX_POST_LENGTH {
        return Ok(ApiError::BadRequest("Invalid post body".to_string()).into());
    }

    let id = Uuid::new_v4().to_string();
    let post = Post::new(&id, &user.id, body);
    insert_post(&store, &post)?;

    json_response(201, &post.to_json())
}

pub fn get_post(path: &str) -> anyhow::Result<Response> {
    let post_id = path.trim_start_matches("/posts/").trim_end_matches('/');
    if post_id.is_empty() || !validate_uuid(post_id) {
        return Ok(ApiError::BadRequest("Post ID required".to_string()).into());
    }

    let store = store();
    match load_post(&store, post_id)? {
        Some(post) => json_response(200, &post.to_json()),
        None => Ok(ApiError::NotFound("Post not found".to_string()).into()),
    }
}

pub fn edit_post(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let user = match current_user(&store, &req)? {
        Some(u) => u,
        None => return Ok(ApiError::unauthorized().into()),
    };

    let post_id = req.path().split('/').next_back().unwrap_or("").to_string();
    if post_id.is_empty() || !validate_uuid(&post_id) {
        return Ok(ApiError::BadRequest("Post ID required".to_string()).into());
    }

    let mut post = match load_post(&store, &post_id)? {
        Some(p) => p,
        None => return Ok(ApiError::NotFound("Post not found".to_string()).into()),
    };
    if !can_modify(&store, &user, &post) {
        return Ok(ApiError::forbidden().into());
    }

    let value: serde_json::Value = serde_json::from_slice(req.body())?;
    let body = value["body"].as_str().unwrap_or_default();
    if body.is_empty() || body.len() > MAX_POST_LENGTH {
        return Ok(ApiError::BadRequest("Invalid post body".to_string()).into());
    }

    // Unchanged body leaves updated_at alone.
    if post.body == body {
        return json_response(200, &post.to_json());
    }

    post.set_body(body);
    post.updated_at = Some(now_iso());
    store.set_json(&post_key(&post_id), &post)?;

    json_response(200, &post.to_json())
}

pub fn delete_post(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let user = match current_user(&store, &req)? {
        Some(u) => u,
        None => return Ok(ApiError::unauthorized().into()),
    };

    let post_id = req.path().split('/').next_back().unwrap_or("").to_string();
    if post_id.is_empty() || !validate_uuid(&post_id) {
        return Ok(ApiError::BadRequest("Post ID required".to_string()).into());
    }

    let post = match load_post(&store, &post_id)? {
        Some(p) => p,
        None => return Ok(ApiError::NotFound("Post not found".to_string()).into()),
    };
    if !can_modify(&store, &user, &post) {
        return Ok(ApiError::forbidden().into());
    }

    // The post's comments go with it.
    let comment_ids: Vec<String> = store.get_json(&post_comments_key(&post_id))?.unwrap_or_default();
    let mut all_comments: Vec<String> = store
        .get_json(crate::config::COMMENTS_LIST_KEY)?
        .unwrap_or_default();
    for cid in &comment_ids {
        store.delete(&crate::config::comment_key(cid))?;
    }
    all_comments.retain(|cid| !comment_ids.contains(cid));
    store.set_json(crate::config::COMMENTS_LIST_KEY, &all_comments)?;
    store.delete(&post_comments_key(&post_id))?;

    store.delete(&post_key(&post_id))?;
    let mut feed: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();
    feed.retain(|id| *id != post_id);
    store.set_json(FEED_KEY, &feed)?;

    Ok(Response::builder().status(204).build())
}

pub fn list_posts(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let params = parse_query_params(req.uri());
    let filter_username = get_string(&params, "user", None);
    let show_all = get_bool_flag(&params, "all");
    let page = get_int(&params, "page", 1);

    // Filtered and "all" listings are public; the bare listing is the
    // caller's own posts and needs a session.
    let feed: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();

    let author_filter: Option<String> = if let Some(username) = filter_username {
        match find_user_by_username(&store, &username)? {
            Some(u) => Some(u.id),
            None => return Ok(ApiError::NotFound("User not found".to_string()).into()),
        }
    } else if show_all {
        None
    } else {
        match current_user(&store, &req)? {
            Some(u) => Some(u.id),
            None => return Ok(ApiError::unauthorized().into()),
        }
    };

    let mut posts = Vec::new();
    for id in feed.iter() {
        if let Some(p) = load_post(&store, id)? {
            match &author_filter {
                Some(author) if p.author_id != *author => {}
                _ => posts.push(p),
            }
        }
    }

    let page_posts: Vec<serde_json::Value> = page_slice(&posts, page, POSTS_PER_PAGE)
        .iter()
        .map(|p| p.to_json())
        .collect();
    json_response(200, &serde_json::json!(page_posts))
}

/// Posts written by the user or any blogger they follow, newest first.
pub fn followed_posts(store: &Store, user_id: &str) -> anyhow::Result<Vec<Post>> {
    let followings = get_followings(store, user_id)?;
    let feed: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();

    let mut posts = Vec::new();
    for post_id in feed.iter() {
        if let Some(p) = load_post(store, post_id)? {
            let from_followed = followings.iter().any(|f| f.blogger_id == p.author_id);
            if from_followed || p.author_id == user_id {
                posts.push(p);
            }
        }
    }

    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(posts)
}

pub fn get_feed(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let user = match current_user(&store, &req)? {
        Some(u) => u,
        None => return Ok(ApiError::unauthorized().into()),
    };

    let params = parse_query_params(req.uri());
    let page = get_int(&params, "page", 1);

    let posts = followed_posts(&store, &user.id)?;
    let page_posts: Vec<serde_json::Value> = page_slice(&posts, page, POSTS_PER_PAGE)
        .iter()
        .map(|p| p.to_json())
        .collect();

    json_response(200, &serde_json::json!(page_posts))
}
