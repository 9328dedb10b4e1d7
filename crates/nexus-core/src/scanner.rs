//! # Barcode Scanner Decoder
//!
//! USB barcode readers present themselves as keyboards. This module
//! reconstructs discrete scans out of a raw key-press stream.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Barcode Decoder States                               │
//! │                                                                         │
//! │             alphanumeric key                                            │
//! │  ┌──────┐ ─────────────────────► ┌──────────────┐ ◄─┐                  │
//! │  │ Idle │                        │ Accumulating │   │ alphanumeric key │
//! │  └──────┘ ◄───────────────────── └──────────────┘ ──┘ (re-arm timer)   │
//! │      ▲      Enter (len >= min)  → emit ScanEvent                        │
//! │      │      Enter (len <  min)  → discard silently                      │
//! │      │      idle timeout        → discard silently                      │
//! │      │                                                                  │
//! │      └── events targeting an editable field are ignored entirely       │
//! │                                                                         │
//! │  A scanner types a whole code within a few milliseconds; a person      │
//! │  cannot, so a gap longer than the idle timeout discards the buffer.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The decoder never reads a clock: every event carries its own timestamp
//! and [`BarcodeDecoder::expire`] lets a driver apply the timeout eagerly.

use std::time::{Duration, Instant};

// =============================================================================
// Constants
// =============================================================================

/// Default minimum number of buffered characters for a scan to commit.
pub const DEFAULT_MIN_LENGTH: usize = 3;

/// Default idle gap after which a partial buffer is discarded.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(100);

// =============================================================================
// Input Events
// =============================================================================

/// A key as reported by the input layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    /// A single printable character.
    Char(char),
    /// The Enter / Return key.
    Enter,
    /// Any other named key (Shift, Tab, ArrowLeft, ...).
    Other(String),
}

impl Key {
    /// Maps a DOM `KeyboardEvent.key` value to a [`Key`].
    pub fn from_dom_key(key: &str) -> Self {
        if key == "Enter" {
            return Key::Enter;
        }
        let mut chars = key.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Key::Char(c),
            _ => Key::Other(key.to_string()),
        }
    }
}

/// The element a key event was dispatched to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTarget {
    /// The page itself or a non-editable element.
    Document,
    /// An `<input>` element.
    TextInput,
    /// A `<textarea>` element.
    TextArea,
    /// An element with `contenteditable`.
    ContentEditable,
}

impl EventTarget {
    /// Returns true if typing into this target is normal form input.
    pub fn is_editable(&self) -> bool {
        !matches!(self, EventTarget::Document)
    }
}

/// One raw key press.
#[derive(Debug, Clone)]
pub struct KeyEvent {
    pub key: Key,
    pub target: EventTarget,
    pub at: Instant,
}

impl KeyEvent {
    /// Key press on the document body.
    pub fn document(key: Key, at: Instant) -> Self {
        KeyEvent {
            key,
            target: EventTarget::Document,
            at,
        }
    }
}

/// A decoded barcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEvent {
    /// The buffered characters, in order.
    pub code: String,
    /// Timestamp of the Enter key that committed the scan.
    pub at: Instant,
}

// =============================================================================
// Decoder Configuration
// =============================================================================

/// Tuning for the decoder heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannerConfig {
    /// Minimum buffer length for Enter to commit. A buffer of exactly this
    /// length commits.
    pub min_length: usize,
    /// Maximum gap between characters of one scan.
    pub idle_timeout: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        ScannerConfig {
            min_length: DEFAULT_MIN_LENGTH,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

// =============================================================================
// Decoder
// =============================================================================

/// Decoder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerState {
    Idle,
    Accumulating,
}

impl std::fmt::Display for ScannerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScannerState::Idle => write!(f, "idle"),
            ScannerState::Accumulating => write!(f, "accumulating"),
        }
    }
}

#[derive(Debug, Default)]
struct ScanBuffer {
    chars: String,
    last_key_at: Option<Instant>,
}

impl ScanBuffer {
    fn reset(&mut self) {
        self.chars.clear();
        self.last_key_at = None;
    }
}

/// Heuristic keystroke-to-scan decoder.
///
/// This cannot tell whether a committed string is a real barcode; the
/// product lookup that follows a scan is the validation.
#[derive(Debug)]
pub struct BarcodeDecoder {
    config: ScannerConfig,
    buffer: ScanBuffer,
}

impl Default for BarcodeDecoder {
    fn default() -> Self {
        Self::new(ScannerConfig::default())
    }
}

impl BarcodeDecoder {
    /// Creates a decoder with the given tuning.
    pub fn new(config: ScannerConfig) -> Self {
        BarcodeDecoder {
            config,
            buffer: ScanBuffer::default(),
        }
    }

    /// Returns the decoder tuning.
    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> ScannerState {
        if self.buffer.chars.is_empty() {
            ScannerState::Idle
        } else {
            ScannerState::Accumulating
        }
    }

    /// Characters buffered so far.
    pub fn buffered(&self) -> &str {
        &self.buffer.chars
    }

    /// Instant at which the current buffer will be discarded, if accumulating.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state() {
            ScannerState::Idle => None,
            ScannerState::Accumulating => self
                .buffer
                .last_key_at
                .map(|at| at + self.config.idle_timeout),
        }
    }

    /// Discards the buffer if the idle timeout has elapsed at `now`.
    ///
    /// Returns true if a partial buffer was dropped.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.deadline() {
            Some(deadline) if now >= deadline => {
                self.buffer.reset();
                true
            }
            _ => false,
        }
    }

    /// Feeds one key press. Returns a scan when Enter commits the buffer.
    pub fn handle(&mut self, event: &KeyEvent) -> Option<ScanEvent> {
        if event.target.is_editable() {
            return None;
        }

        self.expire(event.at);

        match &event.key {
            Key::Enter => {
                let committed = if self.buffer.chars.len() >= self.config.min_length {
                    Some(ScanEvent {
                        code: self.buffer.chars.clone(),
                        at: event.at,
                    })
                } else {
                    None
                };
                self.buffer.reset();
                committed
            }
            Key::Char(c) if c.is_ascii_alphanumeric() => {
                self.buffer.chars.push(*c);
                self.buffer.last_key_at = Some(event.at);
                None
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(decoder: &mut BarcodeDecoder, start: Instant, keys: &[(&str, u64)]) -> Vec<ScanEvent> {
        keys.iter()
            .filter_map(|(key, ms)| {
                let event = KeyEvent::document(Key::from_dom_key(key), start + Duration::from_millis(*ms));
                decoder.handle(&event)
            })
            .collect()
    }

    #[test]
    fn test_commit_on_enter() {
        let mut decoder = BarcodeDecoder::default();
        let t0 = Instant::now();
        let scans = feed(&mut decoder, t0, &[("A", 0), ("B", 5), ("C", 10), ("Enter", 15)]);
        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0].code, "ABC");
        assert_eq!(decoder.state(), ScannerState::Idle);
        assert_eq!(decoder.buffered(), "");
    }

    #[test]
    fn test_short_buffer_discarded() {
        let mut decoder = BarcodeDecoder::default();
        let t0 = Instant::now();
        let scans = feed(&mut decoder, t0, &[("A", 0), ("B", 5), ("Enter", 10)]);
        assert!(scans.is_empty());
        assert_eq!(decoder.state(), ScannerState::Idle);
    }

    #[test]
    fn test_timeout_clears_partial_buffer() {
        let mut decoder = BarcodeDecoder::default();
        let t0 = Instant::now();
        let scans = feed(
            &mut decoder,
            t0,
            &[("A", 0), ("B", 150), ("C", 155), ("D", 160), ("Enter", 165)],
        );
        // "A" was dropped by the gap; "BCD" is exactly min_length and commits.
        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0].code, "BCD");
    }

    #[test]
    fn test_timeout_before_enter_discards() {
        let mut decoder = BarcodeDecoder::default();
        let t0 = Instant::now();
        let scans = feed(&mut decoder, t0, &[("A", 0), ("B", 5), ("C", 10), ("Enter", 200)]);
        assert!(scans.is_empty());
    }

    #[test]
    fn test_timeout_boundary_is_inclusive() {
        let mut decoder = BarcodeDecoder::default();
        let t0 = Instant::now();
        feed(&mut decoder, t0, &[("A", 0)]);
        assert!(!decoder.expire(t0 + Duration::from_millis(99)));
        assert_eq!(decoder.state(), ScannerState::Accumulating);
        assert!(decoder.expire(t0 + Duration::from_millis(100)));
        assert_eq!(decoder.state(), ScannerState::Idle);
    }

    #[test]
    fn test_each_char_rearms_timer() {
        let mut decoder = BarcodeDecoder::default();
        let t0 = Instant::now();
        let scans = feed(
            &mut decoder,
            t0,
            &[("1", 0), ("2", 90), ("3", 180), ("4", 270), ("Enter", 300)],
        );
        assert_eq!(scans[0].code, "1234");
        assert_eq!(decoder.deadline(), None);
    }

    #[test]
    fn test_editable_targets_ignored() {
        let mut decoder = BarcodeDecoder::default();
        let t0 = Instant::now();
        for (i, target) in [EventTarget::TextInput, EventTarget::TextArea, EventTarget::ContentEditable]
            .into_iter()
            .enumerate()
        {
            let event = KeyEvent {
                key: Key::Char('X'),
                target,
                at: t0 + Duration::from_millis(i as u64),
            };
            assert!(decoder.handle(&event).is_none());
        }
        assert_eq!(decoder.state(), ScannerState::Idle);

        // Enter typed into a form field does not flush a document buffer.
        feed(&mut decoder, t0, &[("A", 10), ("B", 11), ("C", 12)]);
        let enter_in_input = KeyEvent {
            key: Key::Enter,
            target: EventTarget::TextInput,
            at: t0 + Duration::from_millis(13),
        };
        assert!(decoder.handle(&enter_in_input).is_none());
        assert_eq!(decoder.buffered(), "ABC");
    }

    #[test]
    fn test_non_alphanumeric_ignored() {
        let mut decoder = BarcodeDecoder::default();
        let t0 = Instant::now();
        let scans = feed(
            &mut decoder,
            t0,
            &[("A", 0), ("-", 1), ("Shift", 2), ("ñ", 3), ("B", 4), ("C", 5), ("Enter", 6)],
        );
        assert_eq!(scans[0].code, "ABC");
    }

    #[test]
    fn test_custom_min_length() {
        let mut decoder = BarcodeDecoder::new(ScannerConfig {
            min_length: 8,
            ..Default::default()
        });
        let t0 = Instant::now();
        let scans = feed(&mut decoder, t0, &[("1", 0), ("2", 1), ("3", 2), ("Enter", 3)]);
        assert!(scans.is_empty());
    }

    #[test]
    fn test_from_dom_key() {
        assert_eq!(Key::from_dom_key("Enter"), Key::Enter);
        assert_eq!(Key::from_dom_key("7"), Key::Char('7'));
        assert_eq!(Key::from_dom_key("Tab"), Key::Other("Tab".into()));
    }
}
