use spin_sdk::http::{IntoResponse, Request, Response};
use spin_sdk::http_component;

pub mod api;
pub mod auth;
pub mod comments;
pub mod config;
pub mod core;
pub mod follow;
pub mod mail;
pub mod models;
pub mod posts;
pub mod templates;
pub mod users;

/// Shared route table for the Spin component and the native adapter, so the
/// two entry points cannot diverge.
pub fn route(req: Request) -> anyhow::Result<Response> {
    // Roles (and, outside production, demo data) are seeded lazily; the
    // seeder early-returns once data exists.
    let store = crate::core::helpers::store();
    if config::run_mode() == "production" {
        let _ = crate::core::db::insert_roles(&store);
    } else {
        let _ = crate::core::db::init_data(&store);
    }

    let path = req.path().to_string();
    let method = req.method().to_string();

    match (method.as_str(), path.as_str()) {
        // Test support only; the next request reseeds.
        ("POST", "/reset") if config::run_mode() == "testing" => {
            crate::core::db::reset_db_data(&store)?;
            crate::core::helpers::json_response(200, &serde_json::json!({"message": "Store cleared"}))
        }
        ("POST", "/users") => users::create_user(req),
        ("POST", "/login") => auth::login_user(req),
        ("POST", "/logout") => auth::logout_user(req),
        ("GET", "/profile") => users::get_profile(req),
        ("PUT", "/profile") => users::update_profile(req),
        ("POST", "/password_reset") => auth::request_password_reset(req),
        ("POST", "/email_change") => auth::request_email_change(req),
        ("POST", "/posts") => posts::create_post(req),
        ("GET", "/posts") => posts::list_posts(req),
        ("GET", "/feed") => posts::get_feed(req),
        ("POST", "/follow") => follow::handle_follow(req),
        ("POST", "/unfollow") => follow::handle_unfollow(req),
        ("GET", "/comments") => comments::list_all_comments(req),
        ("GET", p) if p.starts_with("/confirm/") => auth::confirm_account(req, p),
        ("POST", p) if p.starts_with("/password_reset/") => auth::confirm_password_reset(req, p),
        ("GET", p) if p.starts_with("/email_change/") => auth::apply_email_change(req, p),
        ("POST", p) if p.starts_with("/comments/") && p.ends_with("/disable") => {
            comments::disable_comment(req)
        }
        ("POST", p) if p.starts_with("/comments/") && p.ends_with("/enable") => {
            comments::enable_comment(req)
        }
        ("GET", p) if p.starts_with("/posts/") && p.ends_with("/page") => {
            templates::render_post_page(p)
        }
        ("GET", p) if p.starts_with("/posts/") && p.ends_with("/comments") => {
            comments::list_post_comments(req)
        }
        ("POST", p) if p.starts_with("/posts/") && p.ends_with("/comments") => {
            comments::create_comment(req)
        }
        ("PUT", p) if p.starts_with("/posts/") => posts::edit_post(req),
        ("DELETE", p) if p.starts_with("/posts/") => posts::delete_post(req),
        ("GET", p) if p.starts_with("/posts/") => posts::get_post(p),
        ("GET", p) if p.starts_with("/followings/") => follow::get_followings_list(p),
        ("GET", p) if p.starts_with("/followers/") => follow::get_followers_list(p),
        ("GET", p) if p.starts_with("/users/") && p.len() > 7 => users::get_user_details(p),
        (_, p) if p.starts_with("/api/v1/") => api::route(req),
        ("GET", p) if !p.contains('.') && p.len() > 1 => templates::render_user_profile(p),
        ("GET", p) => crate::core::static_server::serve_static(p),
        _ => Ok(crate::core::errors::ApiError::NotFound("No route found".to_string()).into()),
    }
}

#[http_component]
fn handle(req: Request) -> anyhow::Result<impl IntoResponse> {
    route(req)
}
