//! HTTP adapter: one catch-all handler in front of the [`Mapper`].

use crate::mapper::Mapper;
use crate::mapping::{IncomingRequest, ResponseBody, ResponseData};
use axum::body::Body;
use axum::extract::State;
use axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use percent_encoding::percent_decode_str;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Router answering every method and path from the mapper.
pub fn app(mapper: Arc<Mapper>) -> Router {
    Router::new().fallback(handle_request).with_state(mapper)
}

/// Serve until Ctrl-C.
pub async fn run(listener: TcpListener, mapper: Arc<Mapper>) -> std::io::Result<()> {
    axum::serve(listener, app(mapper))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown requested");
}

async fn handle_request(
    State(mapper): State<Arc<Mapper>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let request = incoming_request(&method, &uri, &headers);

    // Store failures are logged by the mapper and answered like a miss.
    match mapper.resolve(&request) {
        Ok(data) => build_response(data).await,
        Err(_) => bare_status(StatusCode::NOT_FOUND),
    }
}

/// Empty reply that still carries the CORS header.
fn bare_status(status: StatusCode) -> Response {
    (status, [(ACCESS_CONTROL_ALLOW_ORIGIN, "*")]).into_response()
}

fn incoming_request(method: &Method, uri: &Uri, headers: &HeaderMap) -> IncomingRequest {
    // Mappings declare decoded paths; invalid UTF-8 sequences are replaced.
    let path = percent_decode_str(uri.path()).decode_utf8_lossy();
    headers.iter().fold(
        IncomingRequest::new(method.as_str(), path),
        |request, (name, value)| {
            request.with_header(name.as_str(), String::from_utf8_lossy(value.as_bytes()))
        },
    )
}

/// Turn a canned response into a wire response.
async fn build_response(data: ResponseData) -> Response {
    let body = match &data.body {
        ResponseBody::Inline { data } => data.clone(),
        ResponseBody::File { path } => match tokio::fs::read(path).await {
            Ok(contents) => contents,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to read response file");
                return bare_status(StatusCode::INTERNAL_SERVER_ERROR);
            }
        },
    };

    let mut response = Response::new(Body::from(body));

    if data.status != 0 {
        match StatusCode::from_u16(data.status) {
            Ok(status) => *response.status_mut() = status,
            Err(_) => warn!(status = data.status, "Ignoring invalid response status"),
        }
    }

    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));

    for (name, values) in &data.headers {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            warn!(header = %name, "Ignoring invalid response header name");
            continue;
        };

        // The first value replaces anything already set under the name.
        let mut first = true;
        for value in values {
            let Ok(value) = HeaderValue::from_str(value) else {
                warn!(header = %name, "Ignoring invalid response header value");
                continue;
            };
            if first {
                headers.insert(name.clone(), value);
                first = false;
            } else {
                headers.append(name.clone(), value);
            }
        }
    }

    response
}
