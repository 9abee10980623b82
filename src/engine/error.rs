use std::any::Any;
use std::error::Error as StdError;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::Serializer;
use crate::host::Host;

/// Normalized failure shape. Everything the engine reports is one of
/// these, whatever was originally raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalError {
    pub name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    /// Single-level wrap chain. Never cyclic: attaching to an error that
    /// already carries an inner link is a no-op.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner: Option<Box<CanonicalError>>,
}

impl CanonicalError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
            file: None,
            line: None,
            column: None,
            inner: None,
        }
    }

    /// Attach an inner error unless one is already present.
    pub fn with_inner(mut self, inner: CanonicalError) -> Self {
        if self.inner.is_none() {
            self.inner = Some(Box::new(inner));
        }
        self
    }

    /// Source text for the dedup fingerprint: message plus stack.
    pub fn fingerprint_source(&self) -> String {
        let mut source = self.message.clone();
        if let Some(stack) = &self.stack {
            source.push_str(stack);
        }
        source
    }
}

/// The raw values the engine accepts at its reporting entry points.
pub enum ErrorLike {
    /// Already normalized; passed through unchanged.
    Canonical(CanonicalError),
    /// A typed error from the host application.
    Std(Box<dyn StdError + Send + Sync>),
    /// An unwind payload, message already extracted via `panic_text`.
    Panic {
        message: String,
        location: Option<PanicLocation>,
    },
    /// Anything else; serialized into the message.
    Value(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanicLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl From<CanonicalError> for ErrorLike {
    fn from(e: CanonicalError) -> Self {
        ErrorLike::Canonical(e)
    }
}

impl From<&str> for ErrorLike {
    fn from(s: &str) -> Self {
        ErrorLike::Value(Value::String(s.to_string()))
    }
}

impl From<String> for ErrorLike {
    fn from(s: String) -> Self {
        ErrorLike::Value(Value::String(s))
    }
}

impl From<Value> for ErrorLike {
    fn from(v: Value) -> Self {
        ErrorLike::Value(v)
    }
}

impl From<Box<dyn StdError + Send + Sync>> for ErrorLike {
    fn from(e: Box<dyn StdError + Send + Sync>) -> Self {
        ErrorLike::Std(e)
    }
}

impl From<anyhow::Error> for ErrorLike {
    fn from(e: anyhow::Error) -> Self {
        ErrorLike::Std(e.into())
    }
}

/// Best-effort text out of an unwind payload. `panic!` with a literal or a
/// formatted string covers nearly everything in practice.
pub fn panic_text(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Convert any accepted raw value into the canonical shape.
///
/// Error-shaped inputs pass their fields through; foreign values are
/// serialized into the message and get a synthetic stack captured here,
/// at normalization time.
pub fn normalize(raw: ErrorLike, serializer: &dyn Serializer, host: &dyn Host) -> CanonicalError {
    match raw {
        // Re-wrap no-op: canonical values (with or without an inner link)
        // come back unchanged, so nested catch layers cannot grow chains.
        ErrorLike::Canonical(e) => e,
        ErrorLike::Std(e) => {
            let mut out = CanonicalError::new("Error", e.to_string());
            out.stack = Some(host.capture_stack());
            if let Some(source) = e.source() {
                out = out.with_inner(CanonicalError::new("Error", source.to_string()));
            }
            out
        }
        ErrorLike::Panic { message, location } => {
            let mut out = CanonicalError::new("panic", message);
            out.stack = Some(host.capture_stack());
            if let Some(loc) = location {
                out.file = Some(loc.file);
                out.line = Some(loc.line);
                out.column = Some(loc.column);
            }
            out
        }
        ErrorLike::Value(v) => {
            let mut out = CanonicalError::new("Error", serializer.serialize(&v));
            out.stack = Some(host.capture_stack());
            out
        }
    }
}
