//! The chat page, with UI settings baked in.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Html;

use crate::error::ApiError;
use crate::state::AppState;

const INDEX_TEMPLATE: &str = include_str!("../../templates/index.html");
const CONFIG_PLACEHOLDER: &str = "__APP_CONFIG__";

/// GET /
pub async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, ApiError> {
    let config = state
        .config
        .ui
        .to_json()
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Html(render(&config)))
}

/// Substitute the config JSON into the page.
///
/// `</` is escaped so a configured value cannot close the surrounding script tag.
fn render(config_json: &str) -> String {
    INDEX_TEMPLATE.replace(CONFIG_PLACEHOLDER, &config_json.replace("</", "<\\/"))
}
