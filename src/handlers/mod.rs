//! Request handlers for the portal's navigation surface

pub mod auth;
pub mod pages;

use std::convert::Infallible;
use std::sync::Arc;
use warp::http::{StatusCode, Uri};
use warp::reply::{Reply, Response};
use warp::{Filter, Rejection};

use crate::navigation::Navigator;

/// Largest JSON body accepted by the auth endpoints
const MAX_BODY_BYTES: u64 = 16 * 1024;

/// All routes served by the gate
pub fn routes(
    navigator: Arc<Navigator>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| "OK");

    let session = warp::path!("api" / "session")
        .and(warp::get())
        .and(with_navigator(navigator.clone()))
        .map(pages::handle_session);

    let events = warp::path!("api" / "navigation" / "events")
        .and(warp::get())
        .and(with_navigator(navigator.clone()))
        .map(pages::handle_events);

    let sign_in = warp::path!("auth" / "signin" / String)
        .and(warp::post())
        .and(with_navigator(navigator.clone()))
        .and_then(auth::handle_sign_in);

    let magic_link = warp::path!("auth" / "magic-link")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_navigator(navigator.clone()))
        .and_then(auth::handle_magic_link);

    let callback = warp::path!("auth" / "callback")
        .and(warp::get())
        .and(warp::query::<auth::CallbackParams>())
        .and(with_navigator(navigator.clone()))
        .and_then(auth::handle_callback);

    let sign_out = warp::path!("auth" / "signout")
        .and(warp::post())
        .and(with_navigator(navigator.clone()))
        .and_then(auth::handle_sign_out);

    // Everything else is a portal page decided by the guard
    let pages = warp::get()
        .and(warp::path::full())
        .and(with_navigator(navigator))
        .map(pages::handle_page);

    health
        .or(session)
        .or(events)
        .or(sign_in)
        .or(magic_link)
        .or(callback)
        .or(sign_out)
        .or(pages)
}

// Helper function to include the navigator in request handlers
fn with_navigator(
    navigator: Arc<Navigator>,
) -> impl Filter<Extract = (Arc<Navigator>,), Error = Infallible> + Clone {
    warp::any().map(move || navigator.clone())
}

pub(crate) fn error_reply(status: StatusCode, message: &str) -> Response {
    warp::reply::with_status(
        warp::reply::json(&serde_json::json!({ "error": message })),
        status,
    )
    .into_response()
}

pub(crate) fn see_other(path: &str) -> Response {
    let location = path.parse::<Uri>().unwrap_or_else(|_| Uri::from_static("/"));
    warp::redirect::see_other(location).into_response()
}
