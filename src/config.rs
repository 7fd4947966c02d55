// Environment-driven configuration. The run mode selects the KV store the
// way the original deployment selected per-environment database URIs.

pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 16;
pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MAX_EMAIL_LENGTH: usize = 64;
pub const MAX_NICKNAME_LENGTH: usize = 16;
pub const MAX_LOCATION_LENGTH: usize = 64;
pub const MAX_ABOUT_LENGTH: usize = 500;
pub const MAX_AVATAR_URL_LENGTH: usize = 128;
pub const MAX_POST_LENGTH: usize = 10_000;
pub const MAX_COMMENT_LENGTH: usize = 2_000;

pub const POSTS_PER_PAGE: usize = 10;
pub const COMMENTS_PER_PAGE: usize = 20;

pub const CONFIRM_TOKEN_TTL_SECS: i64 = 3600;
pub const API_TOKEN_TTL_SECS: i64 = 7 * 24 * 3600;

pub const MAIL_SUBJECT_PREFIX: &str = "[Quill] ";

pub const USERS_LIST_KEY: &str = "users_list";
pub const ROLES_LIST_KEY: &str = "roles_list";
pub const FEED_KEY: &str = "feed";
pub const COMMENTS_LIST_KEY: &str = "comments_list";
pub const TOKENS_LIST_KEY: &str = "tokens_list";
pub const OUTBOX_KEY: &str = "outbox";

pub fn run_mode() -> String {
    std::env::var("QUILL_ENV").unwrap_or_else(|_| "development".to_string())
}

pub fn store_name() -> &'static str {
    match run_mode().as_str() {
        "testing" => "testing",
        "production" => "production",
        _ => "default",
    }
}

pub fn secret_key() -> String {
    // Development fallback; production deployments set SECRET_KEY.
    std::env::var("SECRET_KEY")
        .unwrap_or_else(|_| "kalfa53465gEFDSFfdg5-dev-only".to_string())
}

pub fn token_expiration_hours() -> i64 {
    std::env::var("QUILL_TOKEN_EXPIRATION_HOURS")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(24)
}

pub fn mail_server() -> Option<String> {
    std::env::var("MAIL_SERVER").ok().filter(|s| !s.is_empty())
}

pub fn mail_port() -> u16 {
    std::env::var("MAIL_PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(25)
}

pub fn mail_username() -> String {
    std::env::var("MAIL_USERNAME").unwrap_or_default()
}

pub fn mail_password() -> String {
    std::env::var("MAIL_PASSWORD").unwrap_or_default()
}

pub fn mail_sender() -> String {
    std::env::var("MAIL_SENDER").unwrap_or_else(|_| "Quill Admin <admin@quill.local>".to_string())
}

// === KV key builders ===

pub fn user_key(id: &str) -> String {
    format!("user:{}", id)
}

pub fn role_key(name: &str) -> String {
    format!("role:{}", name)
}

pub fn post_key(id: &str) -> String {
    format!("post:{}", id)
}

pub fn comment_key(id: &str) -> String {
    format!("comment:{}", id)
}

pub fn post_comments_key(post_id: &str) -> String {
    format!("comments:{}", post_id)
}

pub fn followings_key(user_id: &str) -> String {
    format!("followings:{}", user_id)
}

pub fn token_key(token: &str) -> String {
    format!("token:{}", token)
}
