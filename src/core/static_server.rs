use mime_guess::from_path;
use rust_embed::RustEmbed;
use spin_sdk::http::Response;

use crate::core::errors::ApiError;

#[derive(RustEmbed)]
#[folder = "static"]
#[exclude = "mail/*"]
struct Assets;

pub fn serve_static(path: &str) -> anyhow::Result<Response> {
    let file_path = match path.trim_start_matches('/') {
        "" => "index.html",
        rest => rest,
    };

    let file = match Assets::get(file_path) {
        Some(f) => f,
        None => return Ok(ApiError::NotFound("No such page".to_string()).into()),
    };

    let mime = from_path(file_path).first_or_octet_stream();

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", mime.as_ref())
        .header("Cache-Control", "public, max-age=300")
        .body(file.data.to_vec())
        .build())
}
