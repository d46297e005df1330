//! Sign-in and sign-out endpoints

use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::{Reply, Response};

use crate::auth::backend::Provider;
use crate::constants::LANDING_PATH;
use crate::handlers::{error_reply, see_other};
use crate::navigation::Navigator;

/// Body of a magic-link request
#[derive(Debug, Deserialize)]
pub struct MagicLinkRequest {
    pub email: String,
    pub metadata: Option<serde_json::Value>,
}

/// Query parameters the provider appends when returning the user agent
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    /// Authorization code of a PKCE ceremony
    pub code: Option<String>,
    pub access_token: Option<String>,
    pub error_description: Option<String>,
}

/// Implicit-flow tokens arrive in the URL fragment, which never reaches the
/// server; this page replays the fragment as a query string.
const FRAGMENT_RELAY_PAGE: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Signing in</title></head>
<body>
<script>
  var fragment = window.location.hash.substring(1);
  window.location.replace(fragment ? "/auth/callback?" + fragment : "/login");
</script>
</body>
</html>
"#;

/// Start an OAuth ceremony; the caller follows `redirect_url` when present
pub async fn handle_sign_in(
    provider: String,
    navigator: Arc<Navigator>,
) -> Result<Response, Infallible> {
    let provider = match provider.parse::<Provider>() {
        Ok(provider) => provider,
        Err(e) => return Ok(error_reply(StatusCode::BAD_REQUEST, &e.to_string())),
    };

    match navigator.store().sign_in_with_provider(provider).await {
        Ok(ticket) => Ok(warp::reply::json(&ticket).into_response()),
        // The user stays on the login surface with an inline error
        Err(e) => Ok(error_reply(StatusCode::BAD_GATEWAY, &e.to_string())),
    }
}

pub async fn handle_magic_link(
    request: MagicLinkRequest,
    navigator: Arc<Navigator>,
) -> Result<Response, Infallible> {
    match navigator
        .store()
        .sign_in_with_magic_link(&request.email, request.metadata)
        .await
    {
        Ok(()) => Ok(warp::reply::with_status(
            warp::reply::json(&serde_json::json!({ "sent": true })),
            StatusCode::ACCEPTED,
        )
        .into_response()),
        Err(e) => Ok(error_reply(StatusCode::BAD_GATEWAY, &e.to_string())),
    }
}

/// Finish a hosted ceremony; the landing redirect lets the guard pick the home
pub async fn handle_callback(
    params: CallbackParams,
    navigator: Arc<Navigator>,
) -> Result<Response, Infallible> {
    if let Some(description) = params.error_description {
        log::warn!("Identity provider returned an error: {}", description);
        return Ok(error_reply(StatusCode::UNAUTHORIZED, &description));
    }

    let store = navigator.store();
    let result = match (
        params.code.filter(|c| !c.is_empty()),
        params.access_token.filter(|t| !t.is_empty()),
    ) {
        (Some(code), _) => store.complete_code_exchange(&code).await,
        (None, Some(token)) => store.complete_ceremony(&token).await,
        (None, None) => return Ok(warp::reply::html(FRAGMENT_RELAY_PAGE).into_response()),
    };

    match result {
        Ok(()) => Ok(see_other(LANDING_PATH)),
        Err(e) => Ok(error_reply(StatusCode::UNAUTHORIZED, &e.to_string())),
    }
}

/// Always signs out locally; a degraded backend only adds a warning header
pub async fn handle_sign_out(navigator: Arc<Navigator>) -> Result<Response, Infallible> {
    let outcome = navigator.store().sign_out().await;
    let response = see_other(LANDING_PATH);

    match outcome.warning() {
        None => Ok(response),
        Some(reason) => {
            let warning: String = format!("signed out locally only: {}", reason)
                .chars()
                .filter(|c| c.is_ascii() && !c.is_ascii_control())
                .collect();
            Ok(warp::reply::with_header(response, "x-village-warning", warning).into_response())
        }
    }
}
