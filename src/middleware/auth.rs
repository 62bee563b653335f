use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::auth::AuthError;
use crate::response::json_error;
use crate::state::AppState;

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = crate::auth::extract_token(req.headers());
    let Some(token) = token else {
        return json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "Not authenticated")
            .into_response();
    };

    let config = state.config();
    match crate::auth::verify_request_token(state.db(), config.jwt_secret.as_deref(), &token).await
    {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(AuthError::Database(err)) => {
            tracing::error!(error = %err, "token user lookup failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error",
            )
            .into_response()
        }
        Err(err) => {
            tracing::debug!(error = %err, "rejected bearer token");
            json_error(
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Could not validate credentials",
            )
            .into_response()
        }
    }
}
