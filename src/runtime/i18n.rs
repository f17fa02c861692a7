//! Message catalog for warnings and status text.

/// The node was configured without a path.
pub const MISSING_PATH: &str = "httpin.errors.missing-path";

/// The node path cannot be routed; params: `path`, `error`.
pub const INVALID_PATH: &str = "httpin.errors.invalid-path";

/// A facade operation was used; params: `method`.
pub const DEPRECATED_CALL: &str = "httpin.errors.deprecated-call";

/// A request failed inside the chain; params: `error`.
pub const REQUEST_FAILED: &str = "httpin.errors.request-failed";

/// A message's response handle was dropped unsent; params: `msgid`.
pub const NO_RESPONSE: &str = "httpin.errors.no-response";

/// Status shown when the dedicated listener cannot be used.
pub const SERVER_FAILED_STATUS: &str = "Cannot create server, restart nodered";

fn template(key: &str) -> Option<&'static str> {
    match key {
        MISSING_PATH => Some("missing path"),
        INVALID_PATH => Some("Cannot route __path__: __error__"),
        DEPRECATED_CALL => Some("Deprecated call to __method__"),
        REQUEST_FAILED => Some("Request failed: __error__"),
        NO_RESPONSE => Some("No response sent for message __msgid__"),
        _ => None,
    }
}

/// Render a catalog entry in English; unknown keys render as the key.
pub fn render(key: &str, params: &[(&str, &str)]) -> String {
    let mut text = template(key).unwrap_or(key).to_string();
    for (name, value) in params {
        text = text.replace(&format!("__{name}__"), value);
    }
    text
}
