#[cfg(not(target_arch = "wasm32"))]
mod native {
    use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};

    mod adapter {
        use actix_web::HttpRequest;
        use spin_sdk::http::{Method, Request};

        pub fn actix_to_spin_request(
            req: &HttpRequest,
            body: actix_web::web::Bytes,
        ) -> anyhow::Result<Request> {
            let method = match req.method().as_str() {
                "GET" => Method::Get,
                "POST" => Method::Post,
                "PUT" => Method::Put,
                "DELETE" => Method::Delete,
                "HEAD" => Method::Head,
                "OPTIONS" => Method::Options,
                "PATCH" => Method::Patch,
                _ => Method::Get,
            };

            let mut builder = Request::builder();
            let with_uri = builder.method(method).uri(req.uri().to_string());

            let mut with_headers = with_uri;
            for (name, value) in req.headers() {
                if let Ok(val_str) = value.to_str() {
                    with_headers = with_headers.header(name.as_str(), val_str);
                }
            }

            Ok(with_headers.body(body.to_vec()).build())
        }

        pub fn spin_to_actix_response(spin_resp: spin_sdk::http::Response) -> actix_web::HttpResponse {
            let status = *spin_resp.status();
            let mut response = actix_web::HttpResponse::build(
                actix_web::http::StatusCode::from_u16(status)
                    .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR),
            );

            for key in ["Content-Type", "Location", "Cache-Control"] {
                if let Some(val_str) = spin_resp.header(key).and_then(|h| h.as_str()) {
                    response.insert_header((key, val_str));
                }
            }

            response.body(spin_resp.body().to_vec())
        }
    }

    async fn handle_all(req: HttpRequest, body: web::Bytes) -> HttpResponse {
        let spin_req = match adapter::actix_to_spin_request(&req, body) {
            Ok(r) => r,
            Err(_) => {
                return HttpResponse::BadRequest()
                    .json(serde_json::json!({"error": "Bad Request", "message": "Invalid request"}))
            }
        };

        match quill::route(spin_req) {
            Ok(spin_resp) => adapter::spin_to_actix_response(spin_resp),
            Err(e) => {
                eprintln!("request failed: {}", e);
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Internal Server Error",
                    "message": "Please retry",
                }))
            }
        }
    }

    pub async fn run() -> std::io::Result<()> {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        println!("Server listening on http://0.0.0.0:{}", port);

        HttpServer::new(|| App::new().default_service(web::route().to(handle_all)))
            .bind(("0.0.0.0", port))?
            .run()
            .await
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    native::run().await
}

#[cfg(target_arch = "wasm32")]
fn main() {}
