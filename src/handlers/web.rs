use axum::extract::State;
use axum::response::Html;

use crate::assets::INDEX_HTML;
use crate::AppState;

pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(inject_base_path(INDEX_HTML, &state.base_path))
}

fn inject_base_path(html: &str, base_path: &str) -> String {
    // The page script reads BASE_PATH to build API urls.
    let script = format!(r#"<script>window.BASE_PATH = "{}";</script>"#, base_path);
    let html = html.replace("<head>", &format!("<head>\n    {}", script));

    html.replace("href=\"/static/", &format!("href=\"{}/static/", base_path))
        .replace("src=\"/static/", &format!("src=\"{}/static/", base_path))
}
