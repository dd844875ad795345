//! ANSI escape sequence stripping

/// Position inside an escape sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Ground,
    /// Saw ESC
    Escape,
    /// Inside `ESC [`, until a final byte in 0x40..=0x7E
    Csi,
    /// Inside `ESC ]`, until BEL or `ESC \`
    Osc,
    /// Saw ESC inside an OSC string
    OscEscape,
    /// Saw `ESC (` or `ESC )`, one designator byte follows
    Charset,
}

/// Streaming ANSI stripper.
///
/// Keeps its position between calls, so a sequence split across two reads
/// from the terminal is still removed completely.
#[derive(Debug, Default)]
pub struct AnsiStripper {
    state: State,
}

impl AnsiStripper {
    /// Create a stripper in the ground state
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `data` to `out` with escape sequences removed
    pub fn feed(&mut self, data: &[u8], out: &mut Vec<u8>) {
        for &byte in data {
            self.state = match (self.state, byte) {
                (State::Ground, 0x1b) => State::Escape,
                (State::Ground, _) => {
                    out.push(byte);
                    State::Ground
                }
                (State::Escape, b'[') => State::Csi,
                (State::Escape, b']') => State::Osc,
                (State::Escape, b'(' | b')') => State::Charset,
                (State::Escape, _) => State::Ground,
                (State::Csi, 0x40..=0x7e) => State::Ground,
                (State::Csi, _) => State::Csi,
                (State::Osc, 0x07) => State::Ground,
                (State::Osc, 0x1b) => State::OscEscape,
                (State::Osc, _) => State::Osc,
                (State::OscEscape, b'\\') => State::Ground,
                (State::OscEscape, _) => State::Osc,
                (State::Charset, _) => State::Ground,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_ansi(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len());
        AnsiStripper::new().feed(data, &mut out);
        out
    }

    #[test]
    fn test_strip_csi() {
        assert_eq!(strip_ansi(b"Hello \x1b[31mred\x1b[0m world"), b"Hello red world");
    }

    #[test]
    fn test_strip_csi_tilde_terminator() {
        assert_eq!(strip_ansi(b"a\x1b[3~b"), b"ab");
    }

    #[test]
    fn test_strip_osc() {
        assert_eq!(strip_ansi(b"Hello \x1b]0;Title\x07 world"), b"Hello  world");
        assert_eq!(strip_ansi(b"x\x1b]0;Title\x1b\\y"), b"xy");
    }

    #[test]
    fn test_strip_charset() {
        assert_eq!(strip_ansi(b"\x1b(Bpassword:"), b"password:");
    }

    #[test]
    fn test_no_ansi() {
        assert_eq!(strip_ansi(b"Hello world"), b"Hello world");
    }

    #[test]
    fn test_sequence_split_across_feeds() {
        let mut stripper = AnsiStripper::new();
        let mut out = Vec::new();

        stripper.feed(b"Pass\x1b[", &mut out);
        stripper.feed(b"1mword:\x1b", &mut out);
        stripper.feed(b"[0m ", &mut out);

        assert_eq!(out, b"Password: ");
    }
}
