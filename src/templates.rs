use rust_embed::RustEmbed;
use spin_sdk::http::Response;
use spin_sdk::key_value::Store;

use crate::comments::{load_comment, post_comment_ids};
use crate::config::FEED_KEY;
use crate::core::errors::ApiError;
use crate::core::helpers::{find_user_by_username, get_user, store};
use crate::follow::{get_followers, get_followings};
use crate::models::models::{Post, User};
use crate::posts::load_post;

#[derive(RustEmbed)]
#[folder = "static"]
struct Assets;

fn load_template(name: &str) -> anyhow::Result<String> {
    let raw = Assets::get(name).ok_or_else(|| anyhow::anyhow!("Template {} not found", name))?;
    Ok(String::from_utf8(raw.data.to_vec())?)
}

fn html_page(html: String) -> Response {
    Response::builder()
        .status(200)
        .header("Content-Type", "text/html; charset=utf-8")
        .body(html.into_bytes())
        .build()
}

fn escape(text: &str) -> String {
    html_escape::encode_text(text).to_string()
}

fn profile_field(label: &str, value: &str) -> String {
    format!(
        r#"<div class="profile-field">
            <div class="profile-field-label">{}</div>
            <div class="profile-field-value">{}</div>
        </div>"#,
        label,
        escape(value)
    )
}

fn user_posts(store: &Store, user_id: &str) -> anyhow::Result<Vec<Post>> {
    let feed: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();
    let mut posts = Vec::new();
    for id in feed.iter() {
        if let Some(p) = load_post(store, id)? {
            if p.author_id == user_id {
                posts.push(p);
            }
        }
    }
    Ok(posts)
}

/// Public profile page at `/{username}`.
pub fn render_user_profile(path: &str) -> anyhow::Result<Response> {
    let username = path.trim_start_matches('/');
    let store = store();

    let user = match find_user_by_username(&store, username)? {
        Some(u) => u,
        None => return Ok(ApiError::NotFound("User not found".to_string()).into()),
    };

    let follower_count = get_followers(&store, &user.id)?.len();
    let following_count = get_followings(&store, &user.id)?.len();

    let mut fields = String::new();
    if let Some(nickname) = &user.nickname {
        fields.push_str(&profile_field("Nickname", nickname));
    }
    if let Some(location) = &user.location {
        fields.push_str(&profile_field("Location", location));
    }
    if let Some(about_me) = &user.about_me {
        fields.push_str(&profile_field("About", about_me));
    }

    // body_html is already sanitized at write time; it goes in as-is.
    let mut posts_html = String::new();
    for post in user_posts(&store, &user.id)? {
        posts_html.push_str(&format!(
            r#"<article><div class="when">{}</div>{}</article>"#,
            escape(&post.created_at),
            post.body_html
        ));
    }

    let html = load_template("profile.html")?
        .replace("PROFILE_USERNAME", &escape(&user.username))
        .replace("PROFILE_MEMBER_SINCE", &escape(&user.member_since))
        .replace("PROFILE_FOLLOWER_COUNT", &follower_count.to_string())
        .replace("PROFILE_FOLLOWING_COUNT", &following_count.to_string())
        .replace("PROFILE_FIELDS", &fields)
        .replace("PROFILE_POSTS", &posts_html);

    Ok(html_page(html))
}

fn author_name(store: &Store, user_id: &str) -> String {
    match get_user(store, user_id) {
        Ok(Some(User { username, .. })) => username,
        _ => "unknown".to_string(),
    }
}

/// Public post page at `/posts/{id}/page`, comments included.
pub fn render_post_page(path: &str) -> anyhow::Result<Response> {
    let post_id = path
        .trim_start_matches("/posts/")
        .trim_end_matches("/page")
        .to_string();
    let store = store();

    let post = match load_post(&store, &post_id)? {
        Some(p) => p,
        None => return Ok(ApiError::NotFound("Post not found".to_string()).into()),
    };

    let mut comments_html = String::new();
    for comment_id in post_comment_ids(&store, &post_id)? {
        let comment = match load_comment(&store, &comment_id)? {
            Some(c) => c,
            None => continue,
        };
        if comment.is_ban {
            comments_html.push_str(
                r#"<div class="comment"><span class="disabled">This comment has been disabled by a moderator.</span></div>"#,
            );
        } else {
            comments_html.push_str(&format!(
                r#"<div class="comment"><span class="who">{}</span> on {}{}</div>"#,
                escape(&author_name(&store, &comment.author_id)),
                escape(&comment.created_at),
                comment.body_html
            ));
        }
    }
    if comments_html.is_empty() {
        comments_html.push_str("<p>No comments yet.</p>");
    }

    let html = load_template("post.html")?
        .replace("POST_AUTHOR", &escape(&author_name(&store, &post.author_id)))
        .replace("POST_CREATED_AT", &escape(&post.created_at))
        .replace("POST_BODY", &post.body_html)
        .replace("POST_COMMENTS", &comments_html);

    Ok(html_page(html))
}
