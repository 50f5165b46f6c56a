use axum::response::Html;

const DASHBOARD: &str = include_str!("dashboard.html");

/// Self-contained page that polls `/api/gpu-data` once a second.
pub async fn index() -> Html<&'static str> {
    Html(DASHBOARD)
}
