use axum::{
    extract::{Request, State},
    http::{header, Method},
    middleware::Next,
    response::Response,
    Router,
};
use tower::ServiceExt;

/// Send OPTIONS requests that are not CORS preflights straight to `routes`.
///
/// The CORS layer answers every OPTIONS itself, so without this a tus
/// capability request would never reach its handler. Only requests carrying
/// `Access-Control-Request-Method` are left to the CORS layer.
pub async fn route_plain_options(
    State(routes): State<Router>,
    req: Request,
    next: Next,
) -> Response {
    let is_preflight = req
        .headers()
        .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD);
    if req.method() != Method::OPTIONS || is_preflight {
        return next.run(req).await;
    }

    match routes.oneshot(req).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}
