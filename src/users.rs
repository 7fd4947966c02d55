use ammonia::Builder;
use spin_sdk::http::{Request, Response};
use uuid::Uuid;

use crate::auth::{current_user, invalidate_user_tokens, issue_session_token};
use crate::config::{
    self, user_key, CONFIRM_TOKEN_TTL_SECS, MAX_ABOUT_LENGTH, MAX_AVATAR_URL_LENGTH,
    MAX_EMAIL_LENGTH, MAX_LOCATION_LENGTH, MAX_NICKNAME_LENGTH, MAX_USERNAME_LENGTH,
    MIN_PASSWORD_LENGTH, MIN_USERNAME_LENGTH, USERS_LIST_KEY,
};
use crate::core::db;
use crate::core::errors::ApiError;
use crate::core::helpers::{
    find_user_by_email, find_user_by_username, hash_password, json_response, now_iso, store,
    validate_uuid, verify_password,
};
use crate::core::tokens::{self, PURPOSE_CONFIRM};
use crate::mail;
use crate::models::models::User;

// Profile fields are plain text only; all HTML is stripped at input time.
fn sanitize_text(text: &str) -> String {
    Builder::default()
        .tags(std::collections::HashSet::new())
        .clean(text)
        .to_string()
}

pub fn create_user(req: Request) -> anyhow::Result<Response> {
    let store = store();

    let value: serde_json::Value = serde_json::from_slice(req.body())?;
    let username = value["username"].as_str().unwrap_or("");
    let email = value["email"].as_str().unwrap_or("").to_lowercase();
    let password = value["password"].as_str().unwrap_or("");

    if username.len() < MIN_USERNAME_LENGTH || username.len() > MAX_USERNAME_LENGTH {
        return Ok(ApiError::BadRequest("Username must be 3-16 characters".to_string()).into());
    }
    if email.is_empty() || email.len() > MAX_EMAIL_LENGTH || !email.contains('@') {
        return Ok(ApiError::BadRequest("A valid email is required".to_string()).into());
    }
    if password.len() < MIN_PASSWORD_LENGTH {
        return Ok(ApiError::BadRequest("Password must be at least 6 characters".to_string()).into());
    }

    let username = sanitize_text(username);
    if find_user_by_username(&store, &username)?.is_some() {
        return Ok(ApiError::Conflict("Username exists".to_string()).into());
    }
    if find_user_by_email(&store, &email)?.is_some() {
        return Ok(ApiError::Conflict("Email already registered".to_string()).into());
    }

    let id = Uuid::new_v4().to_string();
    let user = User {
        id: id.clone(),
        username,
        email,
        password: hash_password(password)?,
        confirmed: false,
        // Nullable role falls back to the default role at construction.
        role: db::default_role(&store)?.map(|r| r.name),
        nickname: None,
        location: None,
        about_me: None,
        avatar_url: None,
        member_since: now_iso(),
        last_seen: now_iso(),
    };

    store.set_json(&user_key(&id), &user)?;
    let mut users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
    users.push(id.clone());
    store.set_json(USERS_LIST_KEY, &users)?;

    let token = tokens::generate(&config::secret_key(), &id, PURPOSE_CONFIRM, CONFIRM_TOKEN_TTL_SECS);
    mail::send_mail(
        &store,
        &user.email,
        "Activate your account",
        "confirm",
        &[("USERNAME", user.username.as_str()), ("TOKEN", token.as_str())],
    );

    let mut body = user.to_json();
    body["message"] =
        serde_json::Value::String("A confirmation email has been sent to your address".to_string());
    if config::run_mode() == "testing" {
        body["confirm_token"] = serde_json::Value::String(token);
    }
    json_response(201, &body)
}

pub fn get_profile(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let user = match current_user(&store, &req)? {
        Some(u) => u,
        None => return Ok(ApiError::unauthorized().into()),
    };

    // The owner also sees their email.
    let mut body = user.to_json();
    body["email"] = serde_json::Value::String(user.email.clone());
    json_response(200, &body)
}

pub fn get_user_details(path: &str) -> anyhow::Result<Response> {
    let user_id = path.trim_start_matches("/users/");

    if user_id.is_empty() || !validate_uuid(user_id) {
        return Ok(ApiError::BadRequest("User ID required".to_string()).into());
    }

    let store = store();
    match crate::core::helpers::get_user(&store, user_id)? {
        Some(user) => json_response(200, &user.to_json()),
        None => Ok(ApiError::NotFound("User not found".to_string()).into()),
    }
}

pub fn update_profile(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let mut user = match current_user(&store, &req)? {
        Some(u) => u,
        None => return Ok(ApiError::unauthorized().into()),
    };

    let value: serde_json::Value = serde_json::from_slice(req.body())?;
    let mut password_changed = false;

    if let Some(nickname) = value["nickname"].as_str() {
        if nickname.len() > MAX_NICKNAME_LENGTH {
            return Ok(ApiError::BadRequest("Nickname too long (max 16 chars)".to_string()).into());
        }
        let clean = sanitize_text(nickname);
        user.nickname = if clean.is_empty() { None } else { Some(clean) };
    }

    if let Some(location) = value["location"].as_str() {
        if location.len() > MAX_LOCATION_LENGTH {
            return Ok(ApiError::BadRequest("Location too long (max 64 chars)".to_string()).into());
        }
        let clean = sanitize_text(location);
        user.location = if clean.is_empty() { None } else { Some(clean) };
    }

    if let Some(about_me) = value["about_me"].as_str() {
        if about_me.len() > MAX_ABOUT_LENGTH {
            return Ok(ApiError::BadRequest("About me too long (max 500 chars)".to_string()).into());
        }
        let clean = sanitize_text(about_me);
        user.about_me = if clean.is_empty() { None } else { Some(clean) };
    }

    if let Some(avatar_url) = value["avatar_url"].as_str() {
        if avatar_url.len() > MAX_AVATAR_URL_LENGTH {
            return Ok(ApiError::BadRequest("Avatar URL too long (max 128 chars)".to_string()).into());
        }
        if !avatar_url.is_empty() && !avatar_url.starts_with("https://") && !avatar_url.starts_with("http://") {
            return Ok(ApiError::BadRequest("Avatar URL must be http(s)".to_string()).into());
        }
        user.avatar_url = if avatar_url.is_empty() {
            None
        } else {
            Some(avatar_url.to_string())
        };
    }

    if let Some(new_password) = value["new_password"].as_str() {
        if new_password.len() < MIN_PASSWORD_LENGTH {
            return Ok(ApiError::BadRequest("Password must be at least 6 characters".to_string()).into());
        }

        let old_password = value["old_password"].as_str().unwrap_or_default();
        if !verify_password(old_password, &user.password) {
            return Ok(ApiError::Unauthorized("Current password is incorrect".to_string()).into());
        }

        user.password = hash_password(new_password)?;
        password_changed = true;
    }

    store.set_json(&user_key(&user.id), &user)?;

    let mut body = user.to_json();
    if password_changed {
        // Every existing session dies with the old password.
        invalidate_user_tokens(&store, &user.id)?;
        let token = issue_session_token(&store, &user.id)?;
        body["token"] = serde_json::Value::String(token);
    }

    json_response(200, &body)
}
