use rust_embed::RustEmbed;
use spin_sdk::key_value::Store;

use crate::config::{self, MAIL_SUBJECT_PREFIX};

#[derive(RustEmbed)]
#[folder = "static/mail"]
struct MailTemplates;

/// Fill an embedded plain-text template. Unknown placeholders are left as-is.
fn render_template(template: &str, ctx: &[(&str, &str)]) -> Option<String> {
    let raw = MailTemplates::get(&format!("{}.txt", template))?;
    let mut body = String::from_utf8(raw.data.to_vec()).ok()?;
    for (key, value) in ctx {
        body = body.replace(&format!("{{{{{}}}}}", key), value);
    }
    Some(body)
}

/// Render and dispatch one message, fire-and-forget: no retry, no delivery
/// confirmation. A failed send is logged and lost.
pub fn send_mail(store: &Store, to: &str, subject: &str, template: &str, ctx: &[(&str, &str)]) {
    let subject = format!("{}{}", MAIL_SUBJECT_PREFIX, subject);
    let body = match render_template(template, ctx) {
        Some(b) => b,
        None => {
            eprintln!("mail: template {} missing, dropping message to {}", template, to);
            return;
        }
    };

    deliver(store, to, &subject, &body);
}

#[cfg(not(target_arch = "wasm32"))]
fn deliver(_store: &Store, to: &str, subject: &str, body: &str) {
    let to = to.to_string();
    let subject = subject.to_string();
    let body = body.to_string();

    // Detached worker thread per send, matching the original's dispatch model.
    std::thread::spawn(move || {
        let server = match config::mail_server() {
            Some(s) => s,
            None => {
                println!("mail (no MAIL_SERVER) -> {}: {}\n{}", to, subject, body);
                return;
            }
        };
        if let Err(e) = smtp_send(&server, &to, &subject, &body) {
            eprintln!("mail: send to {} failed: {}", to, e);
        }
    });
}

#[cfg(not(target_arch = "wasm32"))]
fn smtp_send(server: &str, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
    use lettre::transport::smtp::authentication::Credentials;
    use lettre::{Message, SmtpTransport, Transport};

    let email = Message::builder()
        .from(config::mail_sender().parse()?)
        .to(to.parse()?)
        .subject(subject)
        .body(body.to_string())?;

    let mut builder = SmtpTransport::builder_dangerous(server).port(config::mail_port());
    let username = config::mail_username();
    if !username.is_empty() {
        builder = builder.credentials(Credentials::new(username, config::mail_password()));
    }

    builder.build().send(&email)?;
    Ok(())
}

// The component sandbox has no threads or sockets; messages land in a capped
// KV outbox instead.
#[cfg(target_arch = "wasm32")]
fn deliver(store: &Store, to: &str, subject: &str, body: &str) {
    let entry = serde_json::json!({
        "to": to,
        "subject": subject,
        "body": body,
        "queued_at": crate::core::helpers::now_iso(),
    });

    let mut outbox: Vec<serde_json::Value> = store
        .get_json(config::OUTBOX_KEY)
        .ok()
        .flatten()
        .unwrap_or_default();
    outbox.insert(0, entry);
    outbox.truncate(100);

    if let Err(e) = store.set_json(config::OUTBOX_KEY, &outbox) {
        eprintln!("mail: outbox write for {} failed: {}", to, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_placeholders() {
        let body = render_template(
            "confirm",
            &[("USERNAME", "alice"), ("TOKEN", "tok-123")],
        )
        .unwrap();
        assert!(body.contains("alice"));
        assert!(body.contains("tok-123"));
        assert!(!body.contains("{{USERNAME}}"));
        assert!(!body.contains("{{TOKEN}}"));
    }

    #[test]
    fn missing_template_is_none() {
        assert!(render_template("no_such_template", &[]).is_none());
    }

    #[test]
    fn every_shipped_template_renders() {
        for name in ["confirm", "reset_password", "change_email"] {
            assert!(render_template(name, &[]).is_some(), "template {} missing", name);
        }
    }
}
