use std::fmt;
use std::sync::Weak;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::agent::AgentInner;
use crate::engine::telemetry::Severity;

/// Subscriber layer that mirrors the host's tracing output into the
/// agent's console telemetry. The agent's own diagnostics are filtered
/// out by target, otherwise a warning about a dropped report would feed
/// the report path that dropped it.
pub struct ConsoleLayer {
    agent: Weak<AgentInner>,
}

impl ConsoleLayer {
    pub(crate) fn new(agent: Weak<AgentInner>) -> Self {
        Self { agent }
    }
}

impl<S: Subscriber> Layer<S> for ConsoleLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let target = event.metadata().target();
        if target.starts_with("vigil") {
            return;
        }
        let Some(agent) = self.agent.upgrade() else {
            return;
        };
        let severity = match *event.metadata().level() {
            Level::ERROR => Severity::Error,
            Level::WARN => Severity::Warn,
            Level::INFO => Severity::Info,
            Level::DEBUG | Level::TRACE => Severity::Debug,
        };
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        AgentInner::console_event(&agent, severity, target, visitor.render());
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: Vec<(&'static str, String)>,
}

impl LineVisitor {
    fn render(self) -> String {
        let mut line = self.message;
        for (name, value) in self.fields {
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(name);
            line.push('=');
            line.push_str(&value);
        }
        line
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push((field.name(), format!("{value:?}")));
        }
    }
}
