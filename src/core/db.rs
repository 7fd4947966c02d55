use spin_sdk::key_value::Store;
use uuid::Uuid;

use crate::config::{
    comment_key, followings_key, post_comments_key, post_key, role_key, token_key, user_key,
    COMMENTS_LIST_KEY, FEED_KEY, OUTBOX_KEY, ROLES_LIST_KEY, TOKENS_LIST_KEY, USERS_LIST_KEY,
};
use crate::core::helpers::{hash_password, now_iso};
use crate::models::models::{role_presets, Comment, Follow, Post, Role, User, DEFAULT_ROLE};

/// Upsert the configured roles. Masks are reset to exactly the configured
/// union, so a preset change takes effect on the next run.
pub fn insert_roles(store: &Store) -> anyhow::Result<()> {
    let mut names: Vec<String> = store.get_json(ROLES_LIST_KEY)?.unwrap_or_default();

    for (name, mask) in role_presets() {
        let mut role = store
            .get_json::<Role>(&role_key(name))?
            .unwrap_or_else(|| Role::new(name));
        role.reset_permissions();
        role.add_permission(mask);
        role.default = name == DEFAULT_ROLE;
        store.set_json(&role_key(name), &role)?;

        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }

    store.set_json(ROLES_LIST_KEY, &names)?;
    Ok(())
}

pub fn default_role(store: &Store) -> anyhow::Result<Option<Role>> {
    let names: Vec<String> = store.get_json(ROLES_LIST_KEY)?.unwrap_or_default();
    for name in names {
        if let Some(role) = store.get_json::<Role>(&role_key(&name))? {
            if role.default {
                return Ok(Some(role));
            }
        }
    }
    Ok(None)
}

fn seed_user(
    store: &Store,
    username: &str,
    email: &str,
    password: &str,
    role: &str,
    about_me: &str,
) -> anyhow::Result<String> {
    let id = Uuid::new_v4().to_string();
    let user = User {
        id: id.clone(),
        username: username.to_string(),
        email: email.to_string(),
        password: hash_password(password)?,
        confirmed: true,
        role: Some(role.to_string()),
        nickname: None,
        location: None,
        about_me: Some(about_me.to_string()),
        avatar_url: None,
        member_since: now_iso(),
        last_seen: now_iso(),
    };
    store.set_json(&user_key(&id), &user)?;

    let mut users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
    users.push(id.clone());
    store.set_json(USERS_LIST_KEY, &users)?;

    Ok(id)
}

fn seed_post(store: &Store, author_id: &str, body: &str) -> anyhow::Result<String> {
    let id = Uuid::new_v4().to_string();
    let post = Post::new(&id, author_id, body);
    store.set_json(&post_key(&id), &post)?;

    let mut feed: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();
    feed.insert(0, id.clone());
    store.set_json(FEED_KEY, &feed)?;

    Ok(id)
}

fn seed_comment(store: &Store, author_id: &str, post_id: &str, body: &str) -> anyhow::Result<()> {
    let id = Uuid::new_v4().to_string();
    let comment = Comment::new(&id, author_id, post_id, body);
    store.set_json(&comment_key(&id), &comment)?;

    let mut post_comments: Vec<String> =
        store.get_json(&post_comments_key(post_id))?.unwrap_or_default();
    post_comments.push(id.clone());
    store.set_json(&post_comments_key(post_id), &post_comments)?;

    let mut all: Vec<String> = store.get_json(COMMENTS_LIST_KEY)?.unwrap_or_default();
    all.insert(0, id);
    store.set_json(COMMENTS_LIST_KEY, &all)?;

    Ok(())
}

/// Idempotent demo data: three confirmed users with posts, a comment and a
/// follow edge. `bob` moderates. Roles are (re)seeded on every call.
pub fn init_data(store: &Store) -> anyhow::Result<()> {
    insert_roles(store)?;

    let users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
    for id in &users {
        if let Some(u) = store.get_json::<User>(&user_key(id))? {
            if u.username == "test" {
                return Ok(()); // Already seeded
            }
        }
    }

    let test_id = seed_user(store, "test", "test@quill.local", "test-pass", "User", "Test user")?;
    let alice_id = seed_user(store, "alice", "alice@quill.local", "alice-pass", "User", "Hello, I'm Alice!")?;
    let bob_id = seed_user(store, "bob", "bob@quill.local", "bob-pass", "Moderator", "Bob keeps things tidy")?;

    seed_post(store, &test_id, "My first post, in *Markdown*.")?;
    let alice_post = seed_post(store, &alice_id, "Welcome to my blog! More at https://example.com")?;
    seed_post(store, &bob_id, "Moderation notes for the week.")?;

    seed_comment(store, &bob_id, &alice_post, "Looking forward to it!")?;

    let edge = Follow {
        blogger_id: bob_id,
        followed_at: now_iso(),
    };
    store.set_json(&followings_key(&test_id), &vec![edge])?;

    Ok(())
}

pub fn reset_db_data(store: &Store) -> anyhow::Result<()> {
    let users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
    for id in &users {
        store.delete(&user_key(id))?;
        store.delete(&followings_key(id))?;
    }

    let feed: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();
    for id in &feed {
        store.delete(&post_comments_key(id))?;
        store.delete(&post_key(id))?;
    }

    let comments: Vec<String> = store.get_json(COMMENTS_LIST_KEY)?.unwrap_or_default();
    for id in &comments {
        store.delete(&comment_key(id))?;
    }

    let tokens: Vec<String> = store.get_json(TOKENS_LIST_KEY)?.unwrap_or_default();
    for token in &tokens {
        store.delete(&token_key(token))?;
    }

    let roles: Vec<String> = store.get_json(ROLES_LIST_KEY)?.unwrap_or_default();
    for name in &roles {
        store.delete(&role_key(name))?;
    }

    store.delete(USERS_LIST_KEY)?;
    store.delete(FEED_KEY)?;
    store.delete(COMMENTS_LIST_KEY)?;
    store.delete(TOKENS_LIST_KEY)?;
    store.delete(ROLES_LIST_KEY)?;
    store.delete(OUTBOX_KEY)?;

    Ok(())
}
