//! Multipart upload stage (upload-enabled POST routes).
//!
//! Text fields become the body object; file parts are kept in memory and
//! attached to the request as [`UploadedFiles`]. Requests that are not
//! `multipart/*` pass through untouched.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use multer::{Constraints, Multipart, SizeLimit};
use serde_json::{Map, Value};

use crate::http::body::urlencoded::insert_pair;
use crate::http::body::{
    content_type, media_type, BodyLimits, ParseError, ParsedBody, Payload, RequestError,
    UploadedFile, UploadedFiles,
};
use crate::http::chain::RouteContext;
use crate::http::middleware::error::failure_response;

fn is_multipart(req: &Request) -> bool {
    media_type(req.headers()).is_some_and(|m| m.type_() == mime::MULTIPART)
}

/// Parse a multipart body in place.
pub async fn parse_request(req: &mut Request, limits: &BodyLimits) -> Result<(), RequestError> {
    if req.extensions().get::<ParsedBody>().is_some() || !is_multipart(req) {
        return Ok(());
    }

    let boundary = content_type(req.headers())
        .map(multer::parse_boundary)
        .transpose()
        .map_err(ParseError::Multipart)?
        .ok_or(ParseError::Multipart(multer::Error::NoBoundary))?;

    let constraints =
        Constraints::new().size_limit(SizeLimit::new().whole_stream(limits.max_bytes as u64));
    let body = std::mem::take(req.body_mut());
    let mut multipart = Multipart::with_constraints(body.into_data_stream(), boundary, constraints);

    let mut fields = Map::new();
    let mut files = Vec::new();
    let read = async {
        while let Some(field) = multipart.next_field().await? {
            let field_name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(original_name) => {
                    let mime_type = field
                        .content_type()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string());
                    let buffer = field.bytes().await?;
                    tracing::debug!(field = %field_name, file = %original_name, size = buffer.len(), "Received upload");
                    files.push(UploadedFile {
                        field_name,
                        original_name,
                        mime_type,
                        size: buffer.len(),
                        buffer,
                    });
                }
                None => {
                    let value = field.text().await?;
                    insert_pair(&mut fields, &field_name, value);
                }
            }
        }
        Ok::<_, multer::Error>(())
    };

    match tokio::time::timeout(limits.read_timeout, read).await {
        Err(_) => return Err(crate::http::body::BodyError::Timeout(limits.read_timeout).into()),
        Ok(result) => result.map_err(ParseError::Multipart)?,
    }

    req.extensions_mut()
        .insert(ParsedBody(Payload::Json(Value::Object(fields))));
    req.extensions_mut().insert(UploadedFiles(files));
    Ok(())
}

pub async fn stage(State(route): State<Arc<RouteContext>>, mut req: Request, next: Next) -> Response {
    if let Err(e) = parse_request(&mut req, &route.limits).await {
        return failure_response(e);
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::header;
    use serde_json::json;

    const BODY: &str = "--XBOUND\r\n\
Content-Disposition: form-data; name=\"title\"\r\n\r\n\
hello\r\n\
--XBOUND\r\n\
Content-Disposition: form-data; name=\"doc\"; filename=\"a.txt\"\r\n\
Content-Type: text/plain\r\n\r\n\
file body\r\n\
--XBOUND--\r\n";

    fn upload(content_type: &str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(BODY))
            .unwrap()
    }

    #[tokio::test]
    async fn splits_fields_and_files() {
        let mut req = upload("multipart/form-data; boundary=XBOUND");
        parse_request(&mut req, &BodyLimits::default()).await.unwrap();

        let body = &req.extensions().get::<ParsedBody>().unwrap().0;
        assert_eq!(body, &Payload::Json(json!({"title": "hello"})));

        let files = &req.extensions().get::<UploadedFiles>().unwrap().0;
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].field_name, "doc");
        assert_eq!(files[0].original_name, "a.txt");
        assert_eq!(files[0].mime_type, "text/plain");
        assert_eq!(&files[0].buffer[..], b"file body");
        assert_eq!(files[0].size, 9);
    }

    #[tokio::test]
    async fn missing_boundary_fails() {
        let mut req = upload("multipart/form-data");
        let err = parse_request(&mut req, &BodyLimits::default()).await.unwrap_err();
        assert!(matches!(err, RequestError::Parse(ParseError::Multipart(_))));
    }

    #[tokio::test]
    async fn other_types_pass_through() {
        let mut req = upload("text/plain");
        parse_request(&mut req, &BodyLimits::default()).await.unwrap();
        assert!(req.extensions().get::<ParsedBody>().is_none());
        assert!(req.extensions().get::<UploadedFiles>().is_none());
    }
}
