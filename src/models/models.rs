use serde::{Deserialize, Serialize};
use spin_sdk::key_value::Store;

use crate::config::role_key;
use crate::core::render::render_markdown;

/// Permission bits. A role's mask is the bitwise OR of the bits it grants.
pub struct Permission;

impl Permission {
    pub const FOLLOW: u32 = 0x01;
    pub const COMMENT: u32 = 0x02;
    pub const WRITE: u32 = 0x04;
    pub const MODERATE: u32 = 0x08;
    pub const ADMIN: u32 = 0x10;
}

pub const DEFAULT_ROLE: &str = "User";

/// Role table used by `crate::core::db::insert_roles`. The default role is the one
/// assigned to users created without an explicit role.
pub fn role_presets() -> [(&'static str, u32); 3] {
    [
        ("User", Permission::FOLLOW | Permission::COMMENT | Permission::WRITE),
        (
            "Moderator",
            Permission::FOLLOW | Permission::COMMENT | Permission::WRITE | Permission::MODERATE,
        ),
        (
            "Administrator",
            Permission::FOLLOW
                | Permission::COMMENT
                | Permission::WRITE
                | Permission::MODERATE
                | Permission::ADMIN,
        ),
    ]
}

#[derive(Serialize, Deserialize, Clone)]
pub struct Role {
    pub name: String,
    pub default: bool,
    pub permissions: u32,
    pub created: String,
}

impl Role {
    pub fn new(name: &str) -> Self {
        Role {
            name: name.to_string(),
            default: false,
            permissions: 0,
            created: crate::core::helpers::now_iso(),
        }
    }

    /// Exact bit containment, not inequality: every bit of `perm` must be set.
    pub fn has_permission(&self, perm: u32) -> bool {
        self.permissions & perm == perm
    }

    pub fn add_permission(&mut self, perm: u32) {
        if !self.has_permission(perm) {
            self.permissions |= perm;
        }
    }

    pub fn remove_permission(&mut self, perm: u32) {
        if self.has_permission(perm) {
            self.permissions &= !perm;
        }
    }

    pub fn reset_permissions(&mut self) {
        self.permissions = 0;
    }
}

#[derive(Serialize, Deserialize, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirmed: bool,
    // Role name; None falls back to the default role at construction.
    pub role: Option<String>,
    pub nickname: Option<String>,
    pub location: Option<String>,
    pub about_me: Option<String>,
    pub avatar_url: Option<String>,
    pub member_since: String,
    pub last_seen: String,
}

impl User {
    /// Role present AND exact containment of `perm` in the role's mask.
    /// Anonymous requests never reach this: handlers reject them at token
    /// validation, before a `User` is loaded.
    pub fn can(&self, store: &Store, perm: u32) -> bool {
        let name = match &self.role {
            Some(name) => name,
            None => return false,
        };
        match store.get_json::<Role>(&role_key(name)) {
            Ok(Some(role)) => role.has_permission(perm),
            _ => false,
        }
    }

    pub fn is_administrator(&self, store: &Store) -> bool {
        self.can(store, Permission::ADMIN)
    }

    /// Public representation; never exposes email or the password hash.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "username": self.username,
            "confirmed": self.confirmed,
            "role": self.role,
            "nickname": self.nickname.as_deref().unwrap_or(""),
            "location": self.location.as_deref().unwrap_or(""),
            "about_me": self.about_me.as_deref().unwrap_or(""),
            "avatar_url": self.avatar_url.as_deref().unwrap_or(""),
            "member_since": self.member_since,
            "last_seen": self.last_seen,
        })
    }
}

#[derive(Serialize, Deserialize, Clone)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub body: String,
    pub body_html: String,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl Post {
    pub fn new(id: &str, author_id: &str, body: &str) -> Self {
        Post {
            id: id.to_string(),
            author_id: author_id.to_string(),
            body: body.to_string(),
            body_html: render_markdown(body),
            created_at: crate::core::helpers::now_iso(),
            updated_at: None,
        }
    }

    /// The only write path for `body`; `body_html` is always re-derived.
    pub fn set_body(&mut self, body: &str) {
        self.body = body.to_string();
        self.body_html = render_markdown(body);
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "author_id": self.author_id,
            "body": self.body,
            "body_html": self.body_html,
            "created_at": self.created_at,
            "updated_at": self.updated_at,
        })
    }
}

#[derive(Serialize, Deserialize, Clone)]
pub struct Comment {
    pub id: String,
    pub author_id: String,
    pub post_id: String,
    pub body: String,
    pub body_html: String,
    pub created_at: String,
    #[serde(default)]
    pub is_ban: bool,
}

impl Comment {
    pub fn new(id: &str, author_id: &str, post_id: &str, body: &str) -> Self {
        Comment {
            id: id.to_string(),
            author_id: author_id.to_string(),
            post_id: post_id.to_string(),
            body: body.to_string(),
            body_html: render_markdown(body),
            created_at: crate::core::helpers::now_iso(),
            is_ban: false,
        }
    }

    pub fn set_body(&mut self, body: &str) {
        self.body = body.to_string();
        self.body_html = render_markdown(body);
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "author_id": self.author_id,
            "post_id": self.post_id,
            "body": self.body,
            "body_html": self.body_html,
            "created_at": self.created_at,
            "is_ban": self.is_ban,
        })
    }
}

/// Directed follow edge, stored in the follower's edge list under
/// `followings:{fans_id}`. The fans side is implicit in the key.
#[derive(Serialize, Deserialize, Clone)]
pub struct Follow {
    pub blogger_id: String,
    pub followed_at: String,
}

#[derive(Serialize, Deserialize)]
pub struct TokenData {
    pub user_id: String,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_mask_is_exact_containment() {
        let mut role = Role::new("Probe");
        role.add_permission(Permission::FOLLOW);
        role.add_permission(Permission::WRITE);

        assert!(role.has_permission(Permission::FOLLOW));
        assert!(role.has_permission(Permission::WRITE));
        assert!(role.has_permission(Permission::FOLLOW | Permission::WRITE));
        assert!(!role.has_permission(Permission::COMMENT));
        // Superset masks must not pass on a partial match.
        assert!(!role.has_permission(Permission::FOLLOW | Permission::COMMENT));
    }

    #[test]
    fn add_and_remove_are_idempotent() {
        let mut role = Role::new("Probe");
        role.add_permission(Permission::MODERATE);
        role.add_permission(Permission::MODERATE);
        assert_eq!(role.permissions, Permission::MODERATE);

        role.remove_permission(Permission::MODERATE);
        role.remove_permission(Permission::MODERATE);
        assert_eq!(role.permissions, 0);

        // Removing a bit that was never set leaves the mask alone.
        role.add_permission(Permission::WRITE);
        role.remove_permission(Permission::ADMIN);
        assert_eq!(role.permissions, Permission::WRITE);
    }

    #[test]
    fn reset_clears_every_bit() {
        let mut role = Role::new("Probe");
        for (_, mask) in role_presets() {
            role.add_permission(mask);
        }
        role.reset_permissions();
        assert!(!role.has_permission(Permission::FOLLOW));
        assert_eq!(role.permissions, 0);
    }

    #[test]
    fn presets_union_expected_flags() {
        let presets = role_presets();
        let lookup = |name: &str| presets.iter().find(|(n, _)| *n == name).unwrap().1;

        assert_eq!(lookup("User"), 0x01 | 0x02 | 0x04);
        assert_eq!(lookup("Moderator"), 0x01 | 0x02 | 0x04 | 0x08);
        assert_eq!(lookup("Administrator"), 0x01 | 0x02 | 0x04 | 0x08 | 0x10);

        // ADMIN stays a distinct bit: nothing below Administrator carries it.
        assert_eq!(lookup("User") & Permission::ADMIN, 0);
        assert_eq!(lookup("Moderator") & Permission::ADMIN, 0);
    }

    #[test]
    fn set_body_regenerates_html() {
        let mut post = Post::new("p1", "u1", "hello *world*");
        let first = post.body_html.clone();
        assert!(first.contains("<em>world</em>"));

        post.set_body("plain now");
        assert_ne!(post.body_html, first);
        assert!(post.body_html.contains("plain now"));
        assert!(!post.body_html.contains("<em>"));
    }
}
