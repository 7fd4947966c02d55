// Web-flow tests against a running server (`spin up` or the native binary)
// started with QUILL_ENV=testing so confirmation tokens come back in
// responses instead of only leaving via email.

use serde_json::json;
use std::sync::Mutex;

const BASE_URL: &str = "http://127.0.0.1:3000";
static TEST_LOCK: Mutex<()> = Mutex::new(());

fn lock_test() -> std::sync::MutexGuard<'static, ()> {
    TEST_LOCK.lock().unwrap()
}

async fn register(client: &reqwest::Client, username: &str, password: &str) -> serde_json::Value {
    let resp = client
        .post(format!("{}/users", BASE_URL))
        .json(&json!({
            "username": username,
            "email": format!("{}@quill.local", username),
            "password": password,
        }))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(resp.status(), 201);
    resp.json().await.unwrap()
}

async fn login(client: &reqwest::Client, email: &str, password: &str) -> String {
    let resp = client
        .post(format!("{}/login", BASE_URL))
        .json(&json!({"email": email, "password": password}))
        .send()
        .await
        .expect("Failed to login");
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    body["token"].as_str().unwrap().to_string()
}

async fn register_confirmed(client: &reqwest::Client, username: &str, password: &str) -> String {
    let user = register(client, username, password).await;
    let confirm_token = user["confirm_token"]
        .as_str()
        .expect("confirm_token requires QUILL_ENV=testing")
        .to_string();

    let token = login(client, &format!("{}@quill.local", username), password).await;
    let resp = client
        .get(format!("{}/confirm/{}", BASE_URL, confirm_token))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    token
}

fn unique(prefix: &str) -> String {
    format!("{}{}", prefix, &uuid::Uuid::new_v4().to_string()[0..8])
}

#[ignore]
#[tokio::test]
async fn test_register_confirm_and_post_flow() {
    let _lock = lock_test();
    let client = reqwest::Client::new();

    let username = unique("flow");
    let user = register(&client, &username, "secret-pass").await;
    assert_eq!(user["confirmed"], false);
    let user_id = user["id"].as_str().unwrap().to_string();

    let token = login(&client, &format!("{}@quill.local", username), "secret-pass").await;

    // A bad confirmation token is rejected.
    let resp = client
        .get(format!("{}/confirm/garbage", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let confirm_token = user["confirm_token"].as_str().unwrap();
    let resp = client
        .get(format!("{}/confirm/{}", BASE_URL, confirm_token))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Markdown body renders to sanitized HTML on write.
    let resp = client
        .post(format!("{}/posts", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({"body": "hello *world* <script>alert(1)</script>"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let post: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(post["author_id"], user_id);
    let html = post["body_html"].as_str().unwrap();
    assert!(html.contains("<em>world</em>"));
    assert!(!html.contains("<script"));
    let post_id = post["id"].as_str().unwrap().to_string();

    // Editing regenerates the derived html and stamps updated_at.
    let resp = client
        .put(format!("{}/posts/{}", BASE_URL, post_id))
        .bearer_auth(&token)
        .json(&json!({"body": "# Edited"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let edited: serde_json::Value = resp.json().await.unwrap();
    assert!(edited["body_html"].as_str().unwrap().contains("<h1>Edited</h1>"));
    assert!(edited["updated_at"].is_string());
}

#[ignore]
#[tokio::test]
async fn test_registration_validation() {
    let _lock = lock_test();
    let client = reqwest::Client::new();

    for body in [
        json!({"username": "ab", "email": "ab@quill.local", "password": "secret-pass"}),
        json!({"username": unique("val"), "email": "not-an-email", "password": "secret-pass"}),
        json!({"username": unique("val"), "email": "val@quill.local", "password": "short"}),
    ] {
        let resp = client
            .post(format!("{}/users", BASE_URL))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let err: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(err["error"], "Bad Request");
        assert!(err["message"].is_string());
    }

    // Duplicate username conflicts.
    let username = unique("dup");
    register(&client, &username, "secret-pass").await;
    let resp = client
        .post(format!("{}/users", BASE_URL))
        .json(&json!({
            "username": username,
            "email": format!("{}2@quill.local", username),
            "password": "secret-pass",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
}

#[ignore]
#[tokio::test]
async fn test_follow_unfollow_restores_edge_count() {
    let _lock = lock_test();
    let client = reqwest::Client::new();

    let fans = unique("fans");
    let blogger = unique("blog");
    let fans_token = register_confirmed(&client, &fans, "secret-pass").await;
    let blogger_token = register_confirmed(&client, &blogger, "secret-pass").await;

    let blogger_profile: serde_json::Value = client
        .get(format!("{}/profile", BASE_URL))
        .bearer_auth(&blogger_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let blogger_id = blogger_profile["id"].as_str().unwrap().to_string();
    let fans_profile: serde_json::Value = client
        .get(format!("{}/profile", BASE_URL))
        .bearer_auth(&fans_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let fans_id = fans_profile["id"].as_str().unwrap().to_string();

    let edge_count = |v: serde_json::Value| v.as_array().map(|a| a.len()).unwrap_or(0);

    let before: serde_json::Value = client
        .get(format!("{}/followings/{}", BASE_URL, fans_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let baseline = edge_count(before);

    // Follow; a duplicate follow is a no-op.
    for _ in 0..2 {
        let resp = client
            .post(format!("{}/follow", BASE_URL))
            .bearer_auth(&fans_token)
            .json(&json!({"blogger_id": blogger_id}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    let after_follow: serde_json::Value = client
        .get(format!("{}/followings/{}", BASE_URL, fans_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(edge_count(after_follow), baseline + 1);

    // The blogger's posts show up in the fan's timeline.
    let resp = client
        .post(format!("{}/posts", BASE_URL))
        .bearer_auth(&blogger_token)
        .json(&json!({"body": "from the blogger"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let feed: serde_json::Value = client
        .get(format!("{}/feed", BASE_URL))
        .bearer_auth(&fans_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(feed
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p["author_id"] == blogger_id.as_str()));

    let resp = client
        .post(format!("{}/unfollow", BASE_URL))
        .bearer_auth(&fans_token)
        .json(&json!({"blogger_id": blogger_id}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let after_unfollow: serde_json::Value = client
        .get(format!("{}/followings/{}", BASE_URL, fans_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(edge_count(after_unfollow), baseline);
}

#[ignore]
#[tokio::test]
async fn test_comment_moderation_cycle() {
    let _lock = lock_test();
    let client = reqwest::Client::new();

    let author = unique("auth");
    let author_token = register_confirmed(&client, &author, "secret-pass").await;
    // bob is seeded as Moderator.
    let moderator_token = login(&client, "bob@quill.local", "bob-pass").await;

    let post: serde_json::Value = client
        .post(format!("{}/posts", BASE_URL))
        .bearer_auth(&author_token)
        .json(&json!({"body": "moderate me"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let post_id = post["id"].as_str().unwrap().to_string();

    let comment: serde_json::Value = client
        .post(format!("{}/posts/{}/comments", BASE_URL, post_id))
        .bearer_auth(&author_token)
        .json(&json!({"body": "a rude remark"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let comment_id = comment["id"].as_str().unwrap().to_string();

    // Plain users cannot moderate.
    let resp = client
        .post(format!("{}/comments/{}/disable", BASE_URL, comment_id))
        .bearer_auth(&author_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = client
        .post(format!("{}/comments/{}/disable", BASE_URL, comment_id))
        .bearer_auth(&moderator_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Anonymous readers get the placeholder.
    let listed: serde_json::Value = client
        .get(format!("{}/posts/{}/comments", BASE_URL, post_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let redacted = &listed.as_array().unwrap()[0];
    assert_eq!(redacted["is_ban"], true);
    assert!(!redacted["body"].as_str().unwrap().contains("rude"));

    // Moderators still see the original body, flagged.
    let listed: serde_json::Value = client
        .get(format!("{}/posts/{}/comments", BASE_URL, post_id))
        .bearer_auth(&moderator_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let flagged = &listed.as_array().unwrap()[0];
    assert_eq!(flagged["is_ban"], true);
    assert_eq!(flagged["body"], "a rude remark");

    // Re-enabling restores visibility.
    let resp = client
        .post(format!("{}/comments/{}/enable", BASE_URL, comment_id))
        .bearer_auth(&moderator_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let listed: serde_json::Value = client
        .get(format!("{}/posts/{}/comments", BASE_URL, post_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.as_array().unwrap()[0]["body"], "a rude remark");
}

#[ignore]
#[tokio::test]
async fn test_password_change_invalidates_old_sessions() {
    let _lock = lock_test();
    let client = reqwest::Client::new();

    let username = unique("pw");
    let token = register_confirmed(&client, &username, "secret-pass").await;

    let resp = client
        .put(format!("{}/profile", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({"old_password": "secret-pass", "new_password": "another-pass"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    let fresh_token = body["token"].as_str().unwrap().to_string();
    assert_ne!(fresh_token, token);

    // The old session is gone; the fresh one works.
    let resp = client
        .get(format!("{}/profile", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(format!("{}/profile", BASE_URL))
        .bearer_auth(&fresh_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // And the new password logs in.
    login(&client, &format!("{}@quill.local", username), "another-pass").await;
}

#[ignore]
#[tokio::test]
async fn test_profile_page_renders() {
    let _lock = lock_test();
    let client = reqwest::Client::new();

    // alice is seeded with a post.
    let resp = client
        .get(format!("{}/alice", BASE_URL))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let html = resp.text().await.unwrap();
    assert!(html.contains("alice"));
    assert!(html.contains("Member since"));
}
