use serde_json::{json, Value};

/// A named block of supplementary context merged into every report.
/// Called synchronously at assembly time; implementations must not block.
pub trait ContextProvider: Send + Sync {
    fn name(&self) -> &str;
    fn report(&self) -> Value;
}

/// Fixed block, set once at startup (customer identity, build info).
pub struct StaticProvider {
    name: String,
    block: Value,
}

impl StaticProvider {
    pub fn new(name: impl Into<String>, block: Value) -> Self {
        Self {
            name: name.into(),
            block,
        }
    }
}

impl ContextProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn report(&self) -> Value {
        self.block.clone()
    }
}

/// Facts about the process the agent is riding in.
#[derive(Debug, Default)]
pub struct EnvironmentProvider;

impl ContextProvider for EnvironmentProvider {
    fn name(&self) -> &str {
        "environment"
    }

    fn report(&self) -> Value {
        json!({
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "pid": std::process::id(),
        })
    }
}
