//! Console rendering of sequencer events.

use std::sync::Arc;

use tracing::{debug, info};

use qsequencer_core::{EventCallback, SequencerEvent};

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Human-readable size in binary units with two decimals, e.g. `1.50 KB`.
pub fn format_bytes(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}

/// One log line for `event`, or `None` for events not worth showing.
pub fn render(event: &SequencerEvent) -> Option<String> {
    let line = match event {
        SequencerEvent::NoCheckingTorrents => return None,
        SequencerEvent::CheckingFound { count } => {
            format!("Found {} torrents in 'checking' state", count)
        }
        SequencerEvent::AllPaused => "All torrents have been paused".to_string(),
        SequencerEvent::TorrentResumed { name, .. } => format!("Torrent '{}' resumed", name),
        SequencerEvent::Progress(p) => format!(
            "[{}/{}] {} | {} | {} | {:.1}%",
            p.position,
            p.total,
            p.name,
            format_bytes(p.size_bytes),
            p.state,
            p.progress * 100.0
        ),
        SequencerEvent::CheckFinished { name, state, .. } => {
            format!("Torrent '{}' finished checking ({})", name, state)
        }
        SequencerEvent::Restoring { count } => {
            format!("Unpausing {} torrents that were not originally paused", count)
        }
        SequencerEvent::SessionCompleted { checked, restored } => format!(
            "Session complete: {} checked, {} resumed",
            checked, restored
        ),
    };
    Some(line)
}

/// Event callback that writes each rendered event to the log.
///
/// Milestones are already logged by the sequencer, so only progress lines
/// show at `info`.
pub fn console_callback() -> EventCallback {
    Arc::new(|event: &SequencerEvent| {
        let Some(line) = render(event) else {
            return;
        };
        match event {
            SequencerEvent::Progress(_) => info!(target: "qsequencer::console", "{}", line),
            _ => debug!(target: "qsequencer::console", "{}", line),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use qsequencer_core::{TorrentProgress, TorrentState};

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0.00 B");
        assert_eq!(format_bytes(1023), "1023.00 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
        assert_eq!(format_bytes(2 * 1024u64.pow(4)), "2.00 TB");
        // Stays in TB past the last unit.
        assert_eq!(format_bytes(2048 * 1024u64.pow(4)), "2048.00 TB");
    }

    #[test]
    fn test_render_progress() {
        let event = SequencerEvent::Progress(TorrentProgress {
            hash: "abc".to_string(),
            name: "Ubuntu ISO".to_string(),
            size_bytes: 1536,
            state: TorrentState::CheckingUp,
            progress: 0.4567,
            position: 2,
            total: 3,
        });
        assert_eq!(
            render(&event).unwrap(),
            "[2/3] Ubuntu ISO | 1.50 KB | checkingUP | 45.7%"
        );
    }

    #[test]
    fn test_idle_tick_not_rendered() {
        assert!(render(&SequencerEvent::NoCheckingTorrents).is_none());
    }

    #[test]
    fn test_render_session_summary() {
        let line = render(&SequencerEvent::SessionCompleted {
            checked: 2,
            restored: 7,
        })
        .unwrap();
        assert_eq!(line, "Session complete: 2 checked, 7 resumed");
    }

    #[test]
    fn test_callback_accepts_every_event() {
        let callback = console_callback();
        callback(&SequencerEvent::AllPaused);
        callback(&SequencerEvent::NoCheckingTorrents);
    }
}
