//! Terminal stage: turns the parsed request into a flow message.
//!
//! The connection stays open until the flow replies through the message's
//! response handle. A handle dropped without a reply ends the request with
//! a 500.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::Response;
use serde_json::Value;

use crate::config::HttpMethod;
use crate::http::body::Payload;
use crate::http::chain::RouteContext;
use crate::http::middleware::metrics::MessageId;
use crate::http::path::extract_params;
use crate::http::request::HttpRequest;
use crate::http::response::{HttpResponse, ResponseFacade};
use crate::runtime::i18n::NO_RESPONSE;
use crate::runtime::Message;

/// Payload for a request: the query for GET, the parsed body otherwise.
pub fn select_payload(method: HttpMethod, request: &HttpRequest) -> Option<Payload> {
    if method.is_mutating() {
        request.body.clone()
    } else {
        Some(Payload::Json(Value::Object(request.query.clone())))
    }
}

pub async fn dispatch(State(route): State<Arc<RouteContext>>, req: Request) -> Response {
    let msgid = route.host.new_id();
    let (parts, _body) = req.into_parts();
    let params = extract_params(&route.config.url, parts.uri.path());
    let request = Arc::new(HttpRequest::from_parts(&parts, params));

    let (mut native, reply) = HttpResponse::channel();
    native.set_msgid(msgid.clone());
    let payload = select_payload(route.config.method, &request);

    tracing::debug!(msgid = %msgid, method = %request.method, url = %request.original_url, "Emitting message");
    route.host.emit(Message {
        msgid: msgid.clone(),
        req: request,
        res: ResponseFacade::new(native, route.host.clone()),
        payload,
    });

    let mut response = match reply.await {
        Ok(response) => response,
        Err(_) => {
            route.host.warn(NO_RESPONSE, &[("msgid", msgid.as_str())]);
            let mut response = Response::new(Body::from("Internal Server Error"));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    };
    response.extensions_mut().insert(MessageId(msgid));
    response
}
