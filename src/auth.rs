use spin_sdk::http::{Request, Response};
use spin_sdk::key_value::Store;
use uuid::Uuid;

use crate::config::{self, token_key, user_key, CONFIRM_TOKEN_TTL_SECS, MAX_EMAIL_LENGTH, MIN_PASSWORD_LENGTH, TOKENS_LIST_KEY};
use crate::core::errors::ApiError;
use crate::core::helpers::{find_user_by_email, get_user, hash_password, json_response, now_iso, store, verify_password};
use crate::core::tokens::{self, PURPOSE_CONFIRM, PURPOSE_EMAIL_CHANGE, PURPOSE_RESET};
use crate::mail;
use crate::models::models::{TokenData, User};

// === Session tokens ===

pub fn issue_session_token(store: &Store, user_id: &str) -> anyhow::Result<String> {
    let token = Uuid::new_v4().to_string();
    let data = TokenData {
        user_id: user_id.to_string(),
        created_at: now_iso(),
    };
    store.set_json(&token_key(&token), &data)?;

    let mut tokens: Vec<String> = store.get_json(TOKENS_LIST_KEY)?.unwrap_or_default();
    tokens.push(token.clone());
    store.set_json(TOKENS_LIST_KEY, &tokens)?;

    Ok(token)
}

/// Drop every session belonging to `user_id`. Used after password changes.
pub fn invalidate_user_tokens(store: &Store, user_id: &str) -> anyhow::Result<()> {
    let tokens: Vec<String> = store.get_json(TOKENS_LIST_KEY)?.unwrap_or_default();
    let mut kept = Vec::with_capacity(tokens.len());

    for token in tokens {
        let key = token_key(&token);
        match store.get_json::<TokenData>(&key) {
            Ok(Some(data)) if data.user_id == user_id => {
                store.delete(&key)?;
            }
            _ => kept.push(token),
        }
    }

    store.set_json(TOKENS_LIST_KEY, &kept)?;
    Ok(())
}

pub fn validate_token(req: &Request) -> Option<String> {
    let store = store();
    let auth_header = req.header("Authorization")?.as_str().unwrap_or_default();
    let token = auth_header.strip_prefix("Bearer ")?;

    let data = store.get_json::<TokenData>(&token_key(token)).ok()??;

    // Expired sessions are treated as absent.
    if let Ok(created) = chrono::DateTime::parse_from_rfc3339(&data.created_at) {
        let age_hours = (chrono::Utc::now() - created.with_timezone(&chrono::Utc)).num_hours();
        if age_hours > config::token_expiration_hours() {
            return None;
        }
    }

    // The account itself may be gone.
    if store.get_json::<User>(&user_key(&data.user_id)).ok()?.is_none() {
        return None;
    }

    Some(data.user_id)
}

pub fn current_user(store: &Store, req: &Request) -> anyhow::Result<Option<User>> {
    match validate_token(req) {
        Some(user_id) => get_user(store, &user_id),
        None => Ok(None),
    }
}

// === Login / logout ===

pub fn login_user(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let creds: serde_json::Value = serde_json::from_slice(req.body())?;
    let email = creds["email"].as_str().unwrap_or_default();
    let password = creds["password"].as_str().unwrap_or_default();

    let mut user = match find_user_by_email(&store, email)? {
        Some(u) => u,
        None => return Ok(ApiError::unauthorized().into()),
    };
    if !verify_password(password, &user.password) {
        return Ok(ApiError::unauthorized().into());
    }

    user.last_seen = now_iso();
    store.set_json(&user_key(&user.id), &user)?;

    let token = issue_session_token(&store, &user.id)?;
    json_response(
        200,
        &serde_json::json!({
            "token": token,
            "user_id": user.id,
            "confirmed": user.confirmed,
        }),
    )
}

pub fn logout_user(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let auth_header = req
        .header("Authorization")
        .and_then(|h| h.as_str())
        .unwrap_or_default();

    let token = match auth_header.strip_prefix("Bearer ") {
        Some(t) => t,
        None => return Ok(ApiError::unauthorized().into()),
    };

    store.delete(&token_key(token))?;
    let mut tokens: Vec<String> = store.get_json(TOKENS_LIST_KEY)?.unwrap_or_default();
    tokens.retain(|t| t != token);
    store.set_json(TOKENS_LIST_KEY, &tokens)?;

    json_response(200, &serde_json::json!({"message": "Logged out successfully"}))
}

// === Account confirmation ===

pub fn confirm_account(req: Request, path: &str) -> anyhow::Result<Response> {
    let store = store();
    let mut user = match current_user(&store, &req)? {
        Some(u) => u,
        None => return Ok(ApiError::unauthorized().into()),
    };

    if user.confirmed {
        return json_response(200, &serde_json::json!({"message": "Account already confirmed"}));
    }

    let token = path.trim_start_matches("/confirm/");
    match tokens::verify(&config::secret_key(), token, PURPOSE_CONFIRM) {
        Some(sub) if sub == user.id => {
            user.confirmed = true;
            store.set_json(&user_key(&user.id), &user)?;
            json_response(200, &serde_json::json!({"message": "Account confirmed"}))
        }
        _ => Ok(ApiError::BadRequest("Confirmation link is invalid or has expired".to_string()).into()),
    }
}

// === Password reset ===

pub fn request_password_reset(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let value: serde_json::Value = serde_json::from_slice(req.body())?;
    let email = value["email"].as_str().unwrap_or_default();

    let user = match find_user_by_email(&store, email)? {
        Some(u) => u,
        None => return Ok(ApiError::NotFound("No account with that email".to_string()).into()),
    };

    let token = tokens::generate(&config::secret_key(), &user.id, PURPOSE_RESET, CONFIRM_TOKEN_TTL_SECS);
    mail::send_mail(
        &store,
        &user.email,
        "Reset your password",
        "reset_password",
        &[("USERNAME", user.username.as_str()), ("TOKEN", token.as_str())],
    );

    let mut body = serde_json::json!({"message": "A password reset email has been sent"});
    if config::run_mode() == "testing" {
        body["reset_token"] = serde_json::Value::String(token);
    }
    json_response(200, &body)
}

pub fn confirm_password_reset(req: Request, path: &str) -> anyhow::Result<Response> {
    let store = store();
    let token = path.trim_start_matches("/password_reset/");

    let user_id = match tokens::verify(&config::secret_key(), token, PURPOSE_RESET) {
        Some(sub) => sub,
        None => return Ok(ApiError::BadRequest("Reset link is invalid or has expired".to_string()).into()),
    };
    let mut user = match get_user(&store, &user_id)? {
        Some(u) => u,
        None => return Ok(ApiError::NotFound("User not found".to_string()).into()),
    };

    let value: serde_json::Value = serde_json::from_slice(req.body())?;
    let new_password = value["new_password"].as_str().unwrap_or_default();
    if new_password.len() < MIN_PASSWORD_LENGTH {
        return Ok(ApiError::BadRequest("Password must be at least 6 characters".to_string()).into());
    }

    user.password = hash_password(new_password)?;
    store.set_json(&user_key(&user.id), &user)?;
    invalidate_user_tokens(&store, &user.id)?;

    json_response(200, &serde_json::json!({"message": "Password has been reset, please log in"}))
}

// === Email change ===

pub fn request_email_change(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let user = match current_user(&store, &req)? {
        Some(u) => u,
        None => return Ok(ApiError::unauthorized().into()),
    };

    let value: serde_json::Value = serde_json::from_slice(req.body())?;
    let new_email = value["new_email"].as_str().unwrap_or_default();
    let password = value["password"].as_str().unwrap_or_default();

    if new_email.is_empty() || new_email.len() > MAX_EMAIL_LENGTH || !new_email.contains('@') {
        return Ok(ApiError::BadRequest("A valid email is required".to_string()).into());
    }
    if new_email.eq_ignore_ascii_case(&user.email) {
        return Ok(ApiError::BadRequest("New email matches the current one".to_string()).into());
    }
    if !verify_password(password, &user.password) {
        return Ok(ApiError::unauthorized().into());
    }
    if find_user_by_email(&store, new_email)?.is_some() {
        return Ok(ApiError::Conflict("Email already registered".to_string()).into());
    }

    let token = tokens::generate(&config::secret_key(), &user.id, PURPOSE_EMAIL_CHANGE, CONFIRM_TOKEN_TTL_SECS);
    mail::send_mail(
        &store,
        new_email,
        "Confirm your new email address",
        "change_email",
        &[("USERNAME", user.username.as_str()), ("TOKEN", token.as_str())],
    );

    let mut body = serde_json::json!({"message": "A confirmation email has been sent to the new address"});
    if config::run_mode() == "testing" {
        body["change_token"] = serde_json::Value::String(token);
    }
    json_response(200, &body)
}

pub fn apply_email_change(req: Request, path: &str) -> anyhow::Result<Response> {
    let store = store();
    let mut user = match current_user(&store, &req)? {
        Some(u) => u,
        None => return Ok(ApiError::unauthorized().into()),
    };

    let token = path.trim_start_matches("/email_change/");
    match tokens::verify(&config::secret_key(), token, PURPOSE_EMAIL_CHANGE) {
        Some(sub) if sub == user.id => {}
        _ => return Ok(ApiError::BadRequest("Confirmation link is invalid or has expired".to_string()).into()),
    }

    let params = crate::core::query_params::parse_query_params(req.uri());
    let new_email = match params.get("email") {
        Some(e) if !e.is_empty() && e.len() <= MAX_EMAIL_LENGTH && e.contains('@') => e.clone(),
        _ => return Ok(ApiError::BadRequest("A valid email is required".to_string()).into()),
    };
    if find_user_by_email(&store, &new_email)?.is_some() {
        return Ok(ApiError::Conflict("Email already registered".to_string()).into());
    }

    user.email = new_email.to_lowercase();
    store.set_json(&user_key(&user.id), &user)?;

    json_response(200, &serde_json::json!({"message": "Email address updated"}))
}
