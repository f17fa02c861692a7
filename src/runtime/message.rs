//! The unit handed to the flow graph.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::http::body::Payload;
use crate::http::request::HttpRequest;
use crate::http::response::ResponseFacade;

/// One inbound request, as seen by the rest of the flow.
///
/// `msgid` is also the correlation id stored on the response, so response
/// metrics can be tied back to the message.
#[derive(Debug)]
pub struct Message {
    pub msgid: String,
    pub req: Arc<HttpRequest>,
    pub res: ResponseFacade,
    pub payload: Option<Payload>,
}

impl Message {
    /// JSON view of the message for logs, without the response handle.
    pub fn summary(&self) -> Value {
        let mut summary = json!({
            "_msgid": self.msgid,
            "req": {
                "method": self.req.method.as_str(),
                "originalUrl": self.req.original_url,
                "params": self.req.params,
                "query": self.req.query,
                "cookies": self.req.cookies,
                "files": self.req.files.len(),
            },
        });
        if let Some(payload) = &self.payload {
            summary["payload"] = serde_json::to_value(payload).unwrap_or(Value::Null);
        }
        summary
    }
}
