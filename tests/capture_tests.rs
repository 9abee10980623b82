use std::sync::Arc;

use serde_json::Value;
use tracing_subscriber::prelude::*;

use vigil::agent::{Agent, AgentConfig};
use vigil::context::BasicSerializer;
use vigil::engine::telemetry::{Category, Severity, VisitorAction};
use vigil::host::ManualHost;
use vigil::transport::MemoryTransport;

fn test_agent() -> (Agent, Arc<ManualHost>, Arc<MemoryTransport>) {
    let host = Arc::new(ManualHost::new());
    let transport = Arc::new(MemoryTransport::new());
    let agent = Agent::new(host.clone(), transport.clone(), Arc::new(BasicSerializer));
    (agent, host, transport)
}

fn config() -> AgentConfig {
    AgentConfig {
        token: "tok".to_string(),
        application: "demo".to_string(),
        ..AgentConfig::default()
    }
}

fn body(transport: &MemoryTransport, index: usize) -> Value {
    let sent = transport.sent();
    serde_json::from_str(sent[index].body.as_ref().unwrap()).unwrap()
}

#[test]
fn console_layer_mirrors_host_tracing_into_the_log() {
    let (agent, _host, _transport) = test_agent();
    let mut cfg = config();
    cfg.console.report_errors = false;
    agent.install(cfg);

    let subscriber = tracing_subscriber::registry().with(agent.console_layer());
    tracing::subscriber::with_default(subscriber, || {
        tracing::info!(target: "app", "cache warmed");
        tracing::warn!(target: "app", items = 3, "cart almost full");
    });

    let entries = agent.telemetry(Category::Console);
    assert_eq!(entries.len(), 2);
    let first = entries[0].clone().into_console().unwrap();
    assert_eq!(first.severity, Severity::Info);
    assert_eq!(first.message, "cache warmed");
    let second = entries[1].clone().into_console().unwrap();
    assert_eq!(second.severity, Severity::Warn);
    assert!(second.message.contains("cart almost full"));
    assert!(second.message.contains("items=3"));
}

#[test]
fn console_flood_stays_within_capacity() {
    let (agent, _host, _transport) = test_agent();
    let mut cfg = config();
    cfg.console.report_errors = false;
    agent.install(cfg);

    let subscriber = tracing_subscriber::registry().with(agent.console_layer());
    tracing::subscriber::with_default(subscriber, || {
        for i in 0..31 {
            match i % 3 {
                0 => tracing::debug!(target: "app", "line-{i}"),
                1 => tracing::info!(target: "app", "line-{i}"),
                _ => tracing::warn!(target: "app", "line-{i}"),
            }
        }
    });

    let entries = agent.telemetry(Category::Console);
    assert!(entries.len() <= 30);
    assert!(
        entries
            .iter()
            .all(|e| e.clone().into_console().unwrap().message != "line-0"),
        "oldest line evicted"
    );
}

#[test]
fn error_severity_lines_feed_the_report_path() {
    let (agent, _host, transport) = test_agent();
    agent.install(config());

    let subscriber = tracing_subscriber::registry().with(agent.console_layer());
    tracing::subscriber::with_default(subscriber, || {
        tracing::info!(target: "app", "before the failure");
        tracing::error!(target: "app", "unhandled rejection");
    });

    assert_eq!(transport.sent_count(), 1);
    let report = body(&transport, 0);
    assert_eq!(report["entry"], "console");
    assert_eq!(report["error"]["message"], "unhandled rejection");
    let console = report["console"].as_array().unwrap();
    assert_eq!(console.len(), 2, "snapshot includes the error line itself");
}

#[test]
fn own_diagnostics_never_feed_back() {
    let (agent, _host, _transport) = test_agent();
    agent.install(config());

    let subscriber = tracing_subscriber::registry().with(agent.console_layer());
    tracing::subscriber::with_default(subscriber, || {
        tracing::warn!(target: "vigil::agent", "internal warning");
    });

    assert!(
        agent.telemetry(Category::Console).is_empty(),
        "agent-originated lines are filtered by target"
    );
}

#[test]
fn network_entries_complete_in_place() {
    let (agent, host, _transport) = test_agent();
    agent.install(config());
    let network = agent.network();

    let key = network.begin("get", "https://api.example.com/items").unwrap();
    host.advance(40);
    network.complete(key, 200);

    let entries = agent.telemetry(Category::Network);
    let entry = entries[0].clone().into_network().unwrap();
    assert_eq!(entry.method, "GET");
    assert_eq!(entry.status, Some(200));
    assert_eq!(entry.duration_ms, Some(40));
    assert!(entry.completed);
}

#[test]
fn failed_network_calls_are_reported() {
    let (agent, host, transport) = test_agent();
    agent.install(config());
    let network = agent.network();

    let key = network.begin("post", "https://api.example.com/orders").unwrap();
    network.complete(key, 503);
    host.run_deferred();

    assert_eq!(transport.sent_count(), 1);
    let report = body(&transport, 0);
    assert_eq!(report["entry"], "network");
    assert_eq!(
        report["error"]["message"],
        "503 POST https://api.example.com/orders"
    );
}

#[test]
fn completion_of_an_evicted_entry_is_dropped() {
    let (agent, _host, transport) = test_agent();
    let mut cfg = config();
    cfg.log_capacity = 2;
    agent.install(cfg);
    let network = agent.network();

    let key = network.begin("get", "https://api.example.com/slow").unwrap();
    agent.navigation("/a", "/b");
    agent.navigation("/b", "/c"); // network entry evicted

    network.complete(key, 500);
    assert_eq!(transport.sent_count(), 0, "no entry, no failure report");
}

#[test]
fn network_capture_can_be_disabled() {
    let (agent, _host, _transport) = test_agent();
    let mut cfg = config();
    cfg.network.enabled = false;
    agent.install(cfg);

    assert!(agent.network().begin("get", "https://api.example.com").is_none());
    assert!(agent.telemetry(Category::Network).is_empty());
}

#[test]
fn navigation_and_visitor_actions_are_logged() {
    let (agent, _host, _transport) = test_agent();
    agent.install(config());

    agent.navigation("/home", "/cart");
    agent.visitor_action(VisitorAction::Click, "checkout-button");

    let nav = agent.telemetry(Category::Navigation);
    assert_eq!(nav[0].clone().into_navigation().unwrap().to, "/cart");

    let visitor = agent.telemetry(Category::Visitor);
    let action = visitor[0].clone().into_visitor().unwrap();
    assert_eq!(action.action, VisitorAction::Click);
    assert_eq!(action.element, "checkout-button");
}

#[test]
fn console_capture_can_be_disabled_entirely() {
    let (agent, _host, transport) = test_agent();
    let mut cfg = config();
    cfg.console.enabled = false;
    agent.install(cfg);

    let subscriber = tracing_subscriber::registry().with(agent.console_layer());
    tracing::subscriber::with_default(subscriber, || {
        tracing::error!(target: "app", "should vanish");
    });

    assert!(agent.telemetry(Category::Console).is_empty());
    assert_eq!(transport.sent_count(), 0);
}
