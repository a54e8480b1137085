//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use syncify_core::{SyncRun, SyncStats};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// A source playlist with its sync state, as shown by `playlists`
#[derive(Debug, Clone, Serialize)]
pub struct PlaylistRow {
    pub name: String,
    pub source_id: String,
    pub destination_id: Option<String>,
    pub active: bool,
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Check if output is JSON
    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print the source playlists with sync markers
    pub fn print_playlists(&self, rows: &[PlaylistRow]) {
        match self.format {
            OutputFormat::Human => {
                if rows.is_empty() {
                    println!("No Spotify playlists found.");
                    return;
                }
                for row in rows {
                    let marker = match (row.active, &row.destination_id) {
                        (true, _) => "[x]",
                        (false, Some(_)) => "[-]",
                        (false, None) => "[ ]",
                    };
                    println!("{} {} | {}", marker, row.source_id, truncate(&row.name, 50));
                }
                println!();
                println!("[x] syncing  [-] paused  [ ] not synced");
                println!("{} playlist(s)", rows.len());
            }
            OutputFormat::Json => print_json(&rows),
            OutputFormat::Quiet => {
                for row in rows.iter().filter(|r| r.active) {
                    println!("{}", row.source_id);
                }
            }
        }
    }

    /// Print the result of a sync run
    pub fn print_sync_run(&self, run: &SyncRun) {
        match self.format {
            OutputFormat::Human => match run {
                SyncRun::AlreadyRunning => println!("A sync is already running."),
                SyncRun::Completed(summary) => {
                    if summary.playlists.is_empty() {
                        println!("Nothing to sync.");
                        return;
                    }
                    for outcome in &summary.playlists {
                        match (&outcome.stats, &outcome.error) {
                            (Some(stats), _) => println!("✓ {}: {}", outcome.name, stats),
                            (None, Some(error)) => println!("✗ {}: {}", outcome.name, error),
                            (None, None) => println!("? {}", outcome.name),
                        }
                    }
                    println!();
                    println!(
                        "Synced {} playlist(s) in {:.1}s: {}",
                        summary.playlists.len() - summary.failed(),
                        summary.elapsed.as_secs_f64(),
                        summary.totals()
                    );
                    if summary.failed() > 0 {
                        println!("{} playlist(s) failed", summary.failed());
                    }
                }
            },
            OutputFormat::Json => print_json(run),
            OutputFormat::Quiet => {
                if let SyncRun::Completed(summary) = run {
                    let SyncStats { added, removed, .. } = summary.totals();
                    println!("{} {}", added, removed);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
