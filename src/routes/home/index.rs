use axum::response::Html;

/// Documentation, not data: a static listing of the five data routes. Never
/// touches the dataset.
pub async fn index_handler() -> Html<String> {
    Html(route_listing())
}

pub fn route_listing() -> String {
    [
        "Welcome to the Climate API",
        "===========================",
        "Available Routes:",
        "/api/v1.0/precipitation",
        "/api/v1.0/stations",
        "/api/v1.0/tobs",
        "/api/v1.0/&lt;start&gt;",
        "/api/v1.0/&lt;start&gt;/&lt;stop&gt;",
    ]
    .map(|line| format!("{}<br/>", line))
    .join("")
}
