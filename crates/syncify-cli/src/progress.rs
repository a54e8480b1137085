//! Terminal progress for `syncify sync`

use std::io::Write;
use std::sync::Mutex;

use syncify_core::{Phase, ProgressReporter, SyncStats};

/// Prints one line per phase change to stderr
///
/// Song counters are only printed when the phase changes, so a long
/// conversion does not flood the terminal.
#[derive(Default)]
pub struct ConsoleReporter {
    last: Mutex<Option<(String, Phase)>>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the phase; returns `false` if it is unchanged
    fn enter(&self, name: &str, phase: Phase) -> bool {
        let mut last = self.last.lock().unwrap_or_else(|p| p.into_inner());
        let changed = !matches!(&*last, Some((n, p)) if n == name && *p == phase);
        if changed {
            *last = Some((name.to_string(), phase));
        }
        changed
    }
}

fn line(text: &str) {
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{}", text);
}

impl ProgressReporter for ConsoleReporter {
    fn start(&self, playlist_names: &[String]) {
        line(&format!("Syncing {} playlist(s)...", playlist_names.len()));
    }

    fn playlist_status(&self, name: &str, phase: Phase, progress: Option<(usize, usize)>) {
        if !self.enter(name, phase) {
            return;
        }
        match progress {
            Some((done, total)) => line(&format!("  {}: {} ({}/{})", name, phase, done, total)),
            None => line(&format!("  {}: {}", name, phase)),
        }
    }

    fn playlist_complete(&self, name: &str, stats: &SyncStats) {
        self.enter(name, Phase::Completed);
        line(&format!("  {}: done, {}", name, stats));
    }

    fn playlist_error(&self, name: &str, message: &str) {
        self.enter(name, Phase::Error);
        line(&format!("  {}: {}", name, message));
    }

    fn failed_song(&self, _playlist: &str, label: &str, reason: &str) {
        line(&format!("    ✗ {}: {}", label, reason));
    }

    fn end(&self) {
        *self.last.lock().unwrap_or_else(|p| p.into_inner()) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_reports_changes_only() {
        let reporter = ConsoleReporter::new();
        assert!(reporter.enter("Mix", Phase::Syncing));
        assert!(!reporter.enter("Mix", Phase::Syncing));
        assert!(reporter.enter("Mix", Phase::Adding));
        assert!(reporter.enter("Focus", Phase::Adding));

        reporter.end();
        assert!(reporter.enter("Focus", Phase::Adding));
    }
}
