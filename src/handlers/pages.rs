//! Guarded page navigation, session snapshot and re-check events

use futures_util::stream::{self, Stream};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::path::FullPath;
use warp::reply::{Reply, Response};
use warp::sse::Event;

use crate::handlers::{error_reply, see_other};
use crate::navigation::{NavigationOutcome, Navigator};

pub fn handle_page(path: FullPath, navigator: Arc<Navigator>) -> Response {
    // Assets and stray paths must not move the displayed route
    if !navigator.knows(path.as_str()) {
        return error_reply(StatusCode::NOT_FOUND, "not a portal page");
    }

    match navigator.navigate(path.as_str()) {
        NavigationOutcome::Resolving { .. } => warp::reply::with_header(
            warp::reply::with_status(
                warp::reply::json(&serde_json::json!({ "state": "resolving" })),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            "retry-after",
            "1",
        )
        .into_response(),
        NavigationOutcome::Render {
            path,
            redirected_from: None,
        } => warp::reply::json(&serde_json::json!({
            "view": path,
            "session": navigator.store().current_session(),
        }))
        .into_response(),
        NavigationOutcome::Render { path, .. } => see_other(&path),
        NavigationOutcome::Denied { requested } => error_reply(
            StatusCode::FORBIDDEN,
            &format!("no route available for {}", requested),
        ),
    }
}

pub fn handle_session(navigator: Arc<Navigator>) -> Response {
    warp::reply::json(&navigator.store().current_session()).into_response()
}

/// Server-sent events carrying every change of the displayed route
pub fn handle_events(navigator: Arc<Navigator>) -> Response {
    warp::sse::reply(warp::sse::keep_alive().stream(navigation_events(&navigator))).into_response()
}

fn navigation_events(
    navigator: &Navigator,
) -> impl Stream<Item = Result<Event, serde_json::Error>> + Send + 'static {
    let displayed = navigator.displayed();

    stream::unfold((displayed, true), |(mut displayed, first)| async move {
        if !first && displayed.changed().await.is_err() {
            return None;
        }
        let outcome = displayed.borrow_and_update().clone();
        let event = Event::default().event("navigation").json_data(&outcome);
        Some((event, (displayed, false)))
    })
}
