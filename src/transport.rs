//! Line-oriented wire format between the controller device and the host.
//!
//! One event per newline-terminated line, best-effort and one-directional.
//! A malformed or truncated line is dropped in isolation; there is no
//! stateful framing that could desynchronize the stream.

use crate::input::Button;

/// One decoded wire line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceLine {
    /// `GSR:<uint>` - raw ADC counts from the skin sensor
    Sensor(u16),
    /// `BTN:<NAME>:P` / `BTN:<NAME>:R` - a direction/marker edge
    Edge { button: Button, pressed: bool },
    /// `EVT:RECORD` - debounced record toggle
    RecordToggle,
    /// `EVT:END` - long-press session end
    SessionEnd,
}

/// Encode a line without its terminator. The device appends `\n`.
pub fn encode_line(line: &DeviceLine) -> String {
    match line {
        DeviceLine::Sensor(value) => format!("GSR:{}", value),
        DeviceLine::Edge { button, pressed } => {
            format!("BTN:{}:{}", button.name(), if *pressed { "P" } else { "R" })
        }
        DeviceLine::RecordToggle => "EVT:RECORD".to_string(),
        DeviceLine::SessionEnd => "EVT:END".to_string(),
    }
}

/// Parse one line. Unrecognized prefixes, malformed payloads, and values
/// out of range all yield `None` - receivers drop them and move on.
pub fn parse_line(line: &str) -> Option<DeviceLine> {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix("GSR:") {
        return rest.parse::<u16>().ok().map(DeviceLine::Sensor);
    }

    if let Some(rest) = line.strip_prefix("BTN:") {
        let mut parts = rest.splitn(2, ':');
        let button = Button::from_name(parts.next()?)?;
        let pressed = match parts.next()? {
            "P" => true,
            "R" => false,
            _ => return None,
        };
        return Some(DeviceLine::Edge { button, pressed });
    }

    match line {
        "EVT:RECORD" => Some(DeviceLine::RecordToggle),
        "EVT:END" => Some(DeviceLine::SessionEnd),
        _ => None,
    }
}

/// Buffers raw serial bytes until a line terminator is seen, so partial
/// reads split across buffer boundaries reassemble correctly.
pub struct LineAssembler {
    buf: Vec<u8>,
    max_line: usize,
    overflowed: bool,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            max_line: 256,
            overflowed: false,
        }
    }

    /// Feed raw bytes, returning every complete line they finish.
    /// Non-UTF8 lines are dropped; an overlong line is discarded whole so
    /// a noise burst cannot grow the buffer unboundedly.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();

        for &byte in bytes {
            if byte == b'\n' {
                if !self.overflowed {
                    if let Ok(line) = std::str::from_utf8(&self.buf) {
                        let line = line.trim_end_matches('\r');
                        if !line.is_empty() {
                            lines.push(line.to_string());
                        }
                    }
                }
                self.buf.clear();
                self.overflowed = false;
            } else if self.buf.len() >= self.max_line {
                self.buf.clear();
                self.overflowed = true;
            } else {
                self.buf.push(byte);
            }
        }

        lines
    }
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_line_round_trips() {
        let line = DeviceLine::Sensor(54_321);
        assert_eq!(encode_line(&line), "GSR:54321");
        assert_eq!(parse_line("GSR:54321"), Some(line));
    }

    #[test]
    fn edge_lines_round_trip() {
        let press = DeviceLine::Edge {
            button: Button::Up,
            pressed: true,
        };
        assert_eq!(encode_line(&press), "BTN:UP:P");
        assert_eq!(parse_line("BTN:UP:P"), Some(press));
        assert_eq!(
            parse_line("BTN:MARKER:R"),
            Some(DeviceLine::Edge {
                button: Button::Marker,
                pressed: false,
            })
        );
    }

    #[test]
    fn control_lines_parse() {
        assert_eq!(parse_line("EVT:RECORD"), Some(DeviceLine::RecordToggle));
        assert_eq!(parse_line("EVT:END"), Some(DeviceLine::SessionEnd));
    }

    #[test]
    fn malformed_lines_are_dropped() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("GSR:"), None);
        assert_eq!(parse_line("GSR:70000"), None); // out of u16 range
        assert_eq!(parse_line("GSR:abc"), None);
        assert_eq!(parse_line("BTN:UP"), None);
        assert_eq!(parse_line("BTN:SIDEWAYS:P"), None);
        assert_eq!(parse_line("BTN:UP:X"), None);
        assert_eq!(parse_line("EVT:UNKNOWN"), None);
        assert_eq!(parse_line("debug: boot ok"), None);
    }

    #[test]
    fn assembler_handles_split_reads() {
        let mut assembler = LineAssembler::new();
        assert!(assembler.push(b"GSR:12").is_empty());
        let lines = assembler.push(b"34\nBTN:UP");
        assert_eq!(lines, vec!["GSR:1234".to_string()]);
        let lines = assembler.push(b":P\n");
        assert_eq!(lines, vec!["BTN:UP:P".to_string()]);
    }

    #[test]
    fn assembler_recovers_after_garbage() {
        let mut assembler = LineAssembler::new();
        let lines = assembler.push(b"\xff\xfe\xfd\nGSR:100\n");
        // The binary garbage line drops; the following line still parses
        assert_eq!(lines, vec!["GSR:100".to_string()]);
        assert_eq!(parse_line(&lines[0]), Some(DeviceLine::Sensor(100)));
    }

    #[test]
    fn assembler_handles_crlf_and_blank_lines() {
        let mut assembler = LineAssembler::new();
        let lines = assembler.push(b"EVT:RECORD\r\n\r\nGSR:7\r\n");
        assert_eq!(
            lines,
            vec!["EVT:RECORD".to_string(), "GSR:7".to_string()]
        );
    }

    #[test]
    fn overlong_line_is_discarded_without_desync() {
        let mut assembler = LineAssembler::new();
        let noise = vec![b'x'; 1000];
        assert!(assembler.push(&noise).is_empty());
        let lines = assembler.push(b"\nGSR:5\n");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0], "GSR:5");
    }
}
