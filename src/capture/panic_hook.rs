use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::agent::{Agent, AgentInner};
use crate::engine::error::{panic_text, ErrorLike, PanicLocation};
use crate::engine::report::EntryKind;
use crate::wrap::in_guarded_section;

/// One interceptable ambient surface. `can_patch` answers whether the
/// surface exists and is still unclaimed; `patch` installs the
/// instrumentation. Never assume a surface is available.
pub trait PatchSurface: Send + Sync {
    fn name(&self) -> &'static str;
    fn can_patch(&self) -> bool;
    fn patch(&self, agent: &Agent) -> bool;
}

// Process-wide claim marker, shared with any other agent instance in the
// same process.
static PANIC_HOOK_CLAIMED: AtomicBool = AtomicBool::new(false);

/// Chains the process panic hook: panics are reported with kind `panic`
/// and then handed to the previous hook, so the host's own panic output
/// is unchanged. Panics already inside a guarded section are left to the
/// wrapper that is catching them, which has the better bind context.
pub struct PanicHookSurface;

impl PatchSurface for PanicHookSurface {
    fn name(&self) -> &'static str {
        "panic-hook"
    }

    fn can_patch(&self) -> bool {
        !PANIC_HOOK_CLAIMED.load(Ordering::SeqCst)
    }

    fn patch(&self, agent: &Agent) -> bool {
        if PANIC_HOOK_CLAIMED.swap(true, Ordering::SeqCst) {
            return false;
        }
        let weak = Arc::downgrade(agent.inner());
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if !in_guarded_section() {
                if let Some(this) = weak.upgrade() {
                    let message = panic_text(info.payload());
                    let location = info.location().map(|loc| PanicLocation {
                        file: loc.file().to_string(),
                        line: loc.line(),
                        column: loc.column(),
                    });
                    AgentInner::report(
                        &this,
                        ErrorLike::Panic { message, location },
                        EntryKind::Panic,
                        None,
                        false,
                    );
                }
            }
            previous(info);
        }));
        true
    }
}
