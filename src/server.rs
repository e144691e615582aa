use crate::resolver::{Resolver, TranslationRequest};
use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/translate/:word/to/:lang", get(translate))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Always answers 200 with plain text: the translation, the word itself when
/// no engine could translate it, or nothing for blank input
async fn translate(
    State(state): State<AppState>,
    Path((word, lang)): Path<(String, String)>,
) -> String {
    match TranslationRequest::normalize(&word, &lang) {
        Some(request) => state.resolver.resolve(&request).await,
        None => String::new(),
    }
}

async fn health() -> &'static str {
    "ok"
}
