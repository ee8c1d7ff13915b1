//! Keystroke cadence.

use rand::Rng;
use std::time::Duration;

/// Characters typed when there is no configured text.
const FILLER: [char; 6] = [' ', 'a', 'e', 'i', 'o', 'u'];

/// Characters to type for `text`: the text itself, or one random filler
/// character if it is empty.
pub fn keystrokes<R: Rng + ?Sized>(rng: &mut R, text: &str) -> Vec<char> {
    if text.is_empty() {
        vec![FILLER[rng.random_range(0..FILLER.len())]]
    } else {
        text.chars().collect()
    }
}

/// Pause to take after typing `after`, inside `[min_ms, max_ms]`.
///
/// Word and sentence boundaries draw from the upper half of the window.
pub fn keystroke_delay<R: Rng + ?Sized>(
    rng: &mut R,
    after: char,
    (min_ms, max_ms): (u32, u32),
) -> Duration {
    let lo = if is_boundary(after) {
        min_ms + (max_ms - min_ms) / 2
    } else {
        min_ms
    };
    Duration::from_millis(u64::from(rng.random_range(lo..=max_ms)))
}

fn is_boundary(ch: char) -> bool {
    matches!(ch, ' ' | '.' | ',' | '!' | '?' | ';' | ':' | '\n')
}
