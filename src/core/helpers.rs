use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;
use spin_sdk::http::Response;
use spin_sdk::key_value::Store;
use uuid::Uuid;

use crate::config::{store_name, user_key, USERS_LIST_KEY};
use crate::models::models::User;

pub fn store() -> Store {
    Store::open(store_name()).expect("KV store must exist")
}

pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::PasswordHash;

    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

pub fn validate_uuid(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

pub fn get_user(store: &Store, user_id: &str) -> anyhow::Result<Option<User>> {
    Ok(store.get_json::<User>(&user_key(user_id))?)
}

pub fn find_user_by_email(store: &Store, email: &str) -> anyhow::Result<Option<User>> {
    let users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
    for id in users {
        if let Some(u) = get_user(store, &id)? {
            if u.email.eq_ignore_ascii_case(email) {
                return Ok(Some(u));
            }
        }
    }
    Ok(None)
}

pub fn find_user_by_username(store: &Store, username: &str) -> anyhow::Result<Option<User>> {
    let users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
    for id in users {
        if let Some(u) = get_user(store, &id)? {
            if u.username == username {
                return Ok(Some(u));
            }
        }
    }
    Ok(None)
}

pub fn json_response(status: u16, value: &serde_json::Value) -> anyhow::Result<Response> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(value)?)
        .build())
}
