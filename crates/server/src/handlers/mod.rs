mod body;
mod issues;

use axum::Router;
use axum::routing::{
  delete,
  get,
  post,
  put
};
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

pub use body::IssueBody;

pub fn router(
  state: AppState
) -> Router {
  Router::new()
        .route("/health", get(health))
        .route("/api/issues/:project", get(issues::list_issues))
        .route("/api/issues/:project", post(issues::create_issue))
        .route("/api/issues/:project", put(issues::update_issue))
        .route("/api/issues/:project", delete(issues::delete_issue))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
  "ok"
}
