use axum::response::{IntoResponse, Json};
use serde_json::json;

// Undocumented banner route; load balancers and humans hit it to see what is
// running.
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
