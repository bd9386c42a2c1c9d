//! Parses lines coming back from the firmware into structured events, and
//! owns the running [`MachineSnapshot`] those events update.
//!
//! Smoothieware's wire format for status/parser-state replies is not part
//! of any public spec this driver was built from; what's implemented here
//! is a plausible, internally-consistent realization of it — a bracketed
//! status line carrying position, modal, override, and receive-buffer
//! fields — sufficient for the Sender's self-tuning and the Dispatcher's
//! ack routing to work end to end.

/// An inbound line, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEvent {
    /// A bracketed status report (`<Idle|MPos:...|...>`). The snapshot has
    /// already been updated by the time this is returned.
    Status,
    /// A plain `ok`.
    Ok,
    /// An `error: <message>` line.
    Error(String),
    /// An `ALARM: <message>` line.
    Alarm(String),
    /// A `$G`-style parser-state reply (`[G0 G54 G17 G21 G90 G94 M0 M5 M9]`).
    ParserState(String),
    /// A `$#`-style parameters reply.
    Parameters(String),
    /// A firmware version/identification line.
    Version(String),
    /// Anything that didn't match a known shape.
    Other(String),
}

/// Coarse modal state tracked from parser-state replies, enough for the
/// preprocessor's context population and for coolant collapse on macro
/// restore.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModalState {
    /// Active motion mode (`G0`, `G1`, `G2`, `G3`, ...).
    pub motion: Option<String>,
    /// Active work coordinate system (`G54`..`G59`).
    pub wcs: Option<String>,
    /// Active plane selection (`G17`, `G18`, `G19`).
    pub plane: Option<String>,
    /// Active units mode (`G20`, `G21`).
    pub units: Option<String>,
    /// Active distance mode (`G90`, `G91`).
    pub distance: Option<String>,
    /// Active feed-rate mode (`G93`, `G94`).
    pub feedrate: Option<String>,
    /// Active program mode (`M0`, `M1`, `M2`, `M30`).
    pub program: Option<String>,
    /// Active spindle state (`M3`, `M4`, `M5`).
    pub spindle: Option<String>,
    /// Active coolant M-codes (`M7`, `M8`; empty means `M9`).
    pub coolant: Vec<String>,
}

/// The running picture of the machine, rebuilt incrementally from status
/// and parser-state replies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MachineSnapshot {
    /// Reported controller state (`Idle`, `Run`, `Hold`, `Alarm`, ...).
    pub machine_state: Option<String>,
    /// Machine-coordinate position.
    pub mpos: (f64, f64, f64, f64, f64, f64),
    /// Work-coordinate position.
    pub wpos: (f64, f64, f64, f64, f64, f64),
    /// Modal state, as last reported by a parser-state reply.
    pub modal: ModalState,
    /// Feed override percentage.
    pub ov_f: u16,
    /// Spindle override percentage.
    pub ov_s: u16,
    /// Bytes free in the firmware's receive buffer, if the last status
    /// report carried one.
    pub buf_rx: Option<u32>,
}

impl MachineSnapshot {
    fn new() -> Self {
        Self {
            ov_f: 100,
            ov_s: 100,
            ..Default::default()
        }
    }
}

/// Buffers partial lines and classifies completed ones, maintaining the
/// running [`MachineSnapshot`] as a side effect of parsing status reports.
pub struct SmoothiewareResponseParser {
    buffer: String,
    snapshot: MachineSnapshot,
}

impl SmoothiewareResponseParser {
    /// A parser with a fresh, default snapshot.
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            snapshot: MachineSnapshot::new(),
        }
    }

    /// The current machine snapshot.
    pub fn snapshot(&self) -> &MachineSnapshot {
        &self.snapshot
    }

    /// Feed newly received bytes. Complete (`\n`-terminated) lines are
    /// classified and returned in order; any trailing partial line is
    /// retained for the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ResponseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim_end_matches(['\r', '\n']).to_string();
            if line.is_empty() {
                continue;
            }
            events.push(self.classify(&line));
        }
        events
    }

    /// Discard any buffered partial line, e.g. after a reconnect.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Optimistically write override percentages ahead of the firmware's
    /// own status-report confirmation (`M220`/`M221` take effect
    /// immediately but the next status line may lag by up to a tick).
    pub fn set_overrides(&mut self, ov_f: u16, ov_s: u16) {
        self.snapshot.ov_f = ov_f;
        self.snapshot.ov_s = ov_s;
    }

    fn classify(&mut self, line: &str) -> ResponseEvent {
        let trimmed = line.trim();
        if trimmed.starts_with('<') && trimmed.ends_with('>') {
            self.apply_status(&trimmed[1..trimmed.len() - 1]);
            return ResponseEvent::Status;
        }
        if trimmed.eq_ignore_ascii_case("ok") {
            return ResponseEvent::Ok;
        }
        if let Some(rest) = strip_ci_prefix(trimmed, "error:") {
            return ResponseEvent::Error(rest.trim().to_string());
        }
        if let Some(rest) = strip_ci_prefix(trimmed, "alarm:") {
            return ResponseEvent::Alarm(rest.trim().to_string());
        }
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            let body = &trimmed[1..trimmed.len() - 1];
            self.apply_parser_state(body);
            return ResponseEvent::ParserState(body.to_string());
        }
        if let Some(rest) = strip_ci_prefix(trimmed, "$#") {
            return ResponseEvent::Parameters(rest.trim().to_string());
        }
        if trimmed.to_ascii_lowercase().contains("smoothieware") {
            return ResponseEvent::Version(trimmed.to_string());
        }
        ResponseEvent::Other(trimmed.to_string())
    }

    fn apply_status(&mut self, body: &str) {
        let mut fields = body.split('|');
        self.snapshot.machine_state = fields.next().map(str::to_string);

        for field in fields {
            let Some((key, value)) = field.split_once(':') else {
                continue;
            };
            match key {
                "MPos" => self.snapshot.mpos = parse_axes(value),
                "WPos" => self.snapshot.wpos = parse_axes(value),
                "RX" => self.snapshot.buf_rx = value.trim().parse().ok(),
                "OvF" => {
                    if let Ok(v) = value.trim().parse() {
                        self.snapshot.ov_f = v;
                    }
                }
                "OvS" => {
                    if let Ok(v) = value.trim().parse() {
                        self.snapshot.ov_s = v;
                    }
                }
                _ => {}
            }
        }
    }

    fn apply_parser_state(&mut self, body: &str) {
        let mut coolant = Vec::new();
        for token in body.split_whitespace() {
            match token {
                "G0" | "G1" | "G2" | "G3" => self.snapshot.modal.motion = Some(token.to_string()),
                "G54" | "G55" | "G56" | "G57" | "G58" | "G59" => {
                    self.snapshot.modal.wcs = Some(token.to_string())
                }
                "G17" | "G18" | "G19" => self.snapshot.modal.plane = Some(token.to_string()),
                "G20" | "G21" => self.snapshot.modal.units = Some(token.to_string()),
                "G90" | "G91" => self.snapshot.modal.distance = Some(token.to_string()),
                "G93" | "G94" => self.snapshot.modal.feedrate = Some(token.to_string()),
                "M0" | "M1" | "M2" | "M30" => {
                    self.snapshot.modal.program = Some(token.to_string())
                }
                "M3" | "M4" | "M5" => self.snapshot.modal.spindle = Some(token.to_string()),
                "M7" | "M8" => coolant.push(token.to_string()),
                "M9" => {}
                _ => {}
            }
        }
        self.snapshot.modal.coolant = coolant;
    }
}

impl Default for SmoothiewareResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_ci_prefix<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    if line.len() >= prefix.len() && line[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&line[prefix.len()..])
    } else {
        None
    }
}

fn parse_axes(value: &str) -> (f64, f64, f64, f64, f64, f64) {
    let mut parts = value
        .split(',')
        .map(|s| s.trim().parse::<f64>().unwrap_or(0.0));
    (
        parts.next().unwrap_or(0.0),
        parts.next().unwrap_or(0.0),
        parts.next().unwrap_or(0.0),
        parts.next().unwrap_or(0.0),
        parts.next().unwrap_or(0.0),
        parts.next().unwrap_or(0.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ok() {
        let mut p = SmoothiewareResponseParser::new();
        let events = p.feed(b"ok\n");
        assert_eq!(events, vec![ResponseEvent::Ok]);
    }

    #[test]
    fn buffers_partial_lines_across_feeds() {
        let mut p = SmoothiewareResponseParser::new();
        assert!(p.feed(b"o").is_empty());
        let events = p.feed(b"k\n");
        assert_eq!(events, vec![ResponseEvent::Ok]);
    }

    #[test]
    fn parses_error_and_alarm() {
        let mut p = SmoothiewareResponseParser::new();
        let events = p.feed(b"error: Bad number format\nALARM: Hard limit\n");
        assert_eq!(
            events,
            vec![
                ResponseEvent::Error("Bad number format".to_string()),
                ResponseEvent::Alarm("Hard limit".to_string()),
            ]
        );
    }

    #[test]
    fn parses_status_and_updates_snapshot() {
        let mut p = SmoothiewareResponseParser::new();
        let events =
            p.feed(b"<Idle|MPos:1.0,2.0,3.0,0,0,0|WPos:0,0,0,0,0,0|RX:100|OvF:110|OvS:90>\n");
        assert_eq!(events, vec![ResponseEvent::Status]);
        assert_eq!(p.snapshot().machine_state.as_deref(), Some("Idle"));
        assert_eq!(p.snapshot().mpos, (1.0, 2.0, 3.0, 0.0, 0.0, 0.0));
        assert_eq!(p.snapshot().buf_rx, Some(100));
        assert_eq!(p.snapshot().ov_f, 110);
        assert_eq!(p.snapshot().ov_s, 90);
    }

    #[test]
    fn parses_parser_state_into_modal() {
        let mut p = SmoothiewareResponseParser::new();
        let events = p.feed(b"[G0 G54 G17 G21 G90 G94 M0 M5 M8]\n");
        assert!(matches!(events[0], ResponseEvent::ParserState(_)));
        assert_eq!(p.snapshot().modal.motion.as_deref(), Some("G0"));
        assert_eq!(p.snapshot().modal.coolant, vec!["M8".to_string()]);
    }

    #[test]
    fn parses_version_line() {
        let mut p = SmoothiewareResponseParser::new();
        let events = p.feed(b"Smoothieware version edge-1234\n");
        assert!(matches!(events[0], ResponseEvent::Version(_)));
    }

    #[test]
    fn unrecognized_line_becomes_other() {
        let mut p = SmoothiewareResponseParser::new();
        let events = p.feed(b"some unexpected banner\n");
        assert_eq!(
            events,
            vec![ResponseEvent::Other("some unexpected banner".to_string())]
        );
    }
}
