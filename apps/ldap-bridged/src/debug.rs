//! Debug HTTP endpoint: `GET /_debug` dumps the mapping store.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use tracing::{error, info};

use bridge_scim::User;
use bridge_store::MappingStore;

pub fn router(store: MappingStore) -> Router {
    Router::new()
        .route("/_debug", get(debug_handler))
        .with_state(store)
}

async fn debug_handler(
    State(store): State<MappingStore>,
) -> Result<Json<Vec<User>>, (StatusCode, String)> {
    info!("debug listing requested");
    match store.list().await {
        Ok(users) => Ok(Json(users)),
        Err(e) => {
            error!(error = %e, "debug listing failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("listing failed: {e}"),
            ))
        }
    }
}
