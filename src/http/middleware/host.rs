//! Host-supplied middleware.
//!
//! The embedding runtime can insert its own request functions after cookie
//! parsing. Each one becomes its own layer, in configured order.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use futures_util::future::BoxFuture;

type MiddlewareFn = dyn Fn(Request, Next) -> BoxFuture<'static, Response> + Send + Sync;

/// One host middleware function.
#[derive(Clone)]
pub struct HttpNodeMiddleware(Arc<MiddlewareFn>);

impl HttpNodeMiddleware {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        Self(Arc::new(move |req, next| Box::pin(f(req, next))))
    }

    pub(crate) fn call(&self, req: Request, next: Next) -> BoxFuture<'static, Response> {
        (self.0)(req, next)
    }
}

impl fmt::Debug for HttpNodeMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HttpNodeMiddleware(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    #[tokio::test]
    async fn wraps_a_closure_as_a_layer() {
        let tag = HttpNodeMiddleware::new(|mut req: Request, next: Next| async move {
            req.headers_mut().insert("x-tag", "on".parse().unwrap());
            next.run(req).await
        });
        let app = Router::new()
            .route(
                "/",
                get(|headers: axum::http::HeaderMap| async move {
                    headers["x-tag"].to_str().unwrap().to_string()
                }),
            )
            .layer(axum::middleware::from_fn(move |req: Request, next: Next| tag.call(req, next)));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"on");
    }
}
