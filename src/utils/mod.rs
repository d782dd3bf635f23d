use std::time::{Duration, Instant};
use tracing::info;

/// Wall-clock timer for CLI commands; logs on drop.
pub struct Timer {
    label: String,
    start: Instant,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        info!("Starting: {}", label);
        Self {
            label,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!("Finished: {} (took {:.2?})", self.label, self.elapsed());
    }
}

// ── Text ──────────────────────────────────────────────────────────────────────

/// Collapse runs of whitespace (NBSP included) into one space and trim.
/// Entities are already decoded by the HTML parser.
pub fn normalize_text(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `normalize_text`, with an empty result mapped to `None`.
pub fn non_empty(s: &str) -> Option<String> {
    let s = normalize_text(s);
    if s.is_empty() { None } else { Some(s) }
}

/// Title-case each word; hyphens and apostrophes start a new word.
/// "DUPONT" → "Dupont" | "jean-pierre" → "Jean-Pierre" | "d'ARC" → "D'Arc"
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;

    for ch in normalize_text(s).chars() {
        if at_word_start {
            out.extend(ch.to_uppercase());
        } else {
            out.extend(ch.to_lowercase());
        }
        at_word_start = matches!(ch, ' ' | '-' | '\'' | '’');
    }
    out
}

/// Case- and accent-insensitive key for label comparisons.
pub fn fold(s: &str) -> String {
    normalize_text(s)
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'à' | 'â' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' => 'i',
            'ô' | 'ö' => 'o',
            'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            c => c,
        })
        .collect()
}
