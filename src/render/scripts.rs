//! Trusted replay of inline scripts extracted by the replay policy.
//!
//! Whatever implements [`ScriptHost`] runs provider code with the host's
//! privileges. Sessions only call into it when `trusted_scripts` is set.

use std::sync::{Arc, Mutex};

use tracing::warn;

pub trait ScriptHost {
    fn execute(&mut self, index: usize, code: &str) -> Result<(), String>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub executed: usize,
    pub failed: Vec<(usize, String)>,
}

/// Runs each script in order. A failing script is logged and skipped; the
/// remaining scripts still run.
pub fn replay(host: &mut dyn ScriptHost, scripts: &[String]) -> ReplayReport {
    let mut report = ReplayReport::default();
    for (index, code) in scripts.iter().enumerate() {
        match host.execute(index, code) {
            Ok(()) => report.executed += 1,
            Err(e) => {
                warn!(index, error = %e, "script error");
                report.failed.push((index, e));
            }
        }
    }
    report
}

/// Keeps replayed scripts so the exporter can re-attach them after the body
/// of the written document. Clones share the collected list.
#[derive(Clone, Debug, Default)]
pub struct CollectingScriptHost {
    scripts: Arc<Mutex<Vec<String>>>,
}

impl CollectingScriptHost {
    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl ScriptHost for CollectingScriptHost {
    fn execute(&mut self, _index: usize, code: &str) -> Result<(), String> {
        self.scripts
            .lock()
            .map_err(|_| "script collector poisoned".to_string())?
            .push(code.to_string());
        Ok(())
    }
}
