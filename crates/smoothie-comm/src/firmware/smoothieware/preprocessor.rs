//! Line preprocessor: comment stripping, `%`-expression evaluation,
//! `[expr]` bracket substitution, and pause/tool-change detection.
//!
//! The preprocessor is a pure function of a raw line and a mutable
//! [`GcodeContext`]. It never touches the transport, the Sender, or the
//! Feeder directly — each pipeline (Sender, Feeder) calls it once per line
//! and routes the [`DetectedHold`] it returns to whichever state machine
//! owns hold semantics for that pipeline.

use std::collections::HashMap;

/// Numeric variables bound for `[expr]` substitution and `%name=expr`
/// assignment: bounding box, machine/work position, and modal flags,
/// refreshed by the caller before each preprocess call.
pub type GcodeContext = HashMap<String, f64>;

/// A pause/tool-change trigger detected while preprocessing a line.
///
/// Routing is the caller's responsibility: the Sender pipeline holds itself
/// directly on `Wait` and asks the Workflow to pause on `M0`/`M1`/`M6`; the
/// Feeder pipeline holds itself on all four.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedHold {
    /// A `%wait` directive — becomes a `G4 P0.5` dwell.
    Wait,
    /// `M0`, program pause.
    M0,
    /// `M1`, optional program pause.
    M1,
    /// `M6`, tool change.
    M6,
}

impl DetectedHold {
    /// The reason string surfaced in `hold_reason`/pause-event payloads.
    pub fn reason(&self) -> &'static str {
        match self {
            DetectedHold::Wait => "%wait",
            DetectedHold::M0 => "M0",
            DetectedHold::M1 => "M1",
            DetectedHold::M6 => "M6",
        }
    }
}

/// Outcome of preprocessing one raw line.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessResult {
    /// The line to transmit. Empty means "nothing to send" (assignment-only
    /// lines, or lines reduced to nothing by comment stripping).
    pub output: String,
    /// A pause/tool-change trigger detected in the line, if any.
    pub hold: Option<DetectedHold>,
}

/// Stateless line preprocessor. All behavior lives in associated functions
/// since there is no per-call state beyond the caller-owned [`GcodeContext`].
pub struct Preprocessor;

impl Preprocessor {
    /// Preprocess one raw line against `ctx`, mutating `ctx` for `%name=expr`
    /// assignments and returning the line to transmit plus any hold trigger.
    pub fn process(raw: &str, ctx: &mut GcodeContext) -> PreprocessResult {
        let stripped = strip_comment(raw);
        if stripped.is_empty() {
            return PreprocessResult {
                output: String::new(),
                hold: None,
            };
        }

        if let Some(rest) = stripped.strip_prefix('%') {
            return Self::process_percent(rest, ctx);
        }

        let substituted = substitute_brackets(&stripped, ctx);
        let hold = detect_hold(&substituted);
        PreprocessResult {
            output: substituted,
            hold,
        }
    }

    fn process_percent(rest: &str, ctx: &mut GcodeContext) -> PreprocessResult {
        // A bare `%` (empty `rest`) is not `%wait`, it's an assignment list
        // of zero assignments, handled below as a no-op.
        if rest == "wait" {
            return PreprocessResult {
                output: "G4 P0.5 (%wait)".to_string(),
                hold: Some(DetectedHold::Wait),
            };
        }

        for assignment in rest.split(',') {
            let assignment = assignment.trim();
            if assignment.is_empty() {
                continue;
            }
            match assignment.split_once('=') {
                Some((name, expr)) => match expr::eval(expr.trim(), ctx) {
                    Ok(value) => {
                        ctx.insert(name.trim().to_string(), value);
                    }
                    Err(err) => {
                        tracing::warn!(
                            assignment = assignment,
                            error = %err,
                            "expression evaluation failed, skipping assignment"
                        );
                    }
                },
                None => {
                    tracing::warn!(assignment, "malformed %-assignment, expected name=expr");
                }
            }
        }
        PreprocessResult {
            output: String::new(),
            hold: None,
        }
    }
}

/// Strip a trailing `;` comment and surrounding whitespace.
fn strip_comment(raw: &str) -> String {
    match raw.find(';') {
        Some(idx) => raw[..idx].trim().to_string(),
        None => raw.trim().to_string(),
    }
}

/// Replace every `[expr]` bracket expression with its evaluated numeric
/// value. Unparseable expressions are dropped (logged), leaving the
/// brackets' contents out of the substituted line entirely — matching the
/// "empty substitution on failure" contract in spec.md §4.1/§7.
fn substitute_brackets(line: &str, ctx: &GcodeContext) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.char_indices().peekable();
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'[' {
            if let Some(end) = line[i..].find(']').map(|o| i + o) {
                let expr = &line[i + 1..end];
                match expr::eval(expr, ctx) {
                    Ok(value) => out.push_str(&format_num(value)),
                    Err(err) => {
                        tracing::warn!(expr, error = %err, "bracket expression evaluation failed");
                    }
                }
                i = end + 1;
                continue;
            }
        }
        let ch = line[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    let _ = &mut chars; // silence unused-peekable warning on some toolchains
    out
}

fn format_num(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let s = format!("{:.4}", value);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Detect an M0/M1/M6 token among the line's whitespace-separated words.
fn detect_hold(line: &str) -> Option<DetectedHold> {
    for word in line.split_whitespace() {
        match word.to_ascii_uppercase().as_str() {
            "M0" | "M00" => return Some(DetectedHold::M0),
            "M1" | "M01" => return Some(DetectedHold::M1),
            "M6" | "M06" => return Some(DetectedHold::M6),
            _ => {}
        }
    }
    None
}

/// Populate the numeric context from a bounding box, machine/work position,
/// and a coarse modal summary. Called once per line by the owning pipeline
/// before `Preprocessor::process`.
pub fn populate_context(
    ctx: &mut GcodeContext,
    bbox: (f64, f64, f64, f64, f64, f64),
    mpos: (f64, f64, f64, f64, f64, f64),
    wpos: (f64, f64, f64, f64, f64, f64),
) {
    let (xmin, xmax, ymin, ymax, zmin, zmax) = bbox;
    ctx.insert("xmin".into(), xmin);
    ctx.insert("xmax".into(), xmax);
    ctx.insert("ymin".into(), ymin);
    ctx.insert("ymax".into(), ymax);
    ctx.insert("zmin".into(), zmin);
    ctx.insert("zmax".into(), zmax);

    let (mx, my, mz, ma, mb, mc) = mpos;
    ctx.insert("mposx".into(), mx);
    ctx.insert("mposy".into(), my);
    ctx.insert("mposz".into(), mz);
    ctx.insert("mposa".into(), ma);
    ctx.insert("mposb".into(), mb);
    ctx.insert("mposc".into(), mc);

    let (px, py, pz, pa, pb, pc) = wpos;
    ctx.insert("posx".into(), px);
    ctx.insert("posy".into(), py);
    ctx.insert("posz".into(), pz);
    ctx.insert("posa".into(), pa);
    ctx.insert("posb".into(), pb);
    ctx.insert("posc".into(), pc);
}

/// Collapse a modal-group coolant state (e.g. `["M7", "M8"]`) into
/// newline-joined command tokens. Smoothieware rejects two coolant M-codes
/// on a single line as a modal-group violation, so reissuing cached coolant
/// state as G-code text (macro restore, etc.) must emit one command per line.
pub fn collapse_coolant(coolant: &[String]) -> String {
    coolant.join("\n")
}

/// A restricted recursive-descent arithmetic grammar over `+ - * / ( )` and
/// identifiers bound in a [`GcodeContext`] — the concrete realization of the
/// "external contract" spec.md §4.1 leaves open, sufficient for
/// `[xmin+1]`-style substitutions.
pub mod expr {
    use super::GcodeContext;

    /// An expression failed to parse or reference an unbound identifier.
    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    pub enum ExprError {
        /// The expression text could not be parsed.
        #[error("syntax error in expression: {0}")]
        Syntax(String),
        /// An identifier is not bound in the context.
        #[error("unbound identifier: {0}")]
        Unbound(String),
        /// Division by zero.
        #[error("division by zero")]
        DivByZero,
    }

    /// Evaluate `input` against `ctx`.
    pub fn eval(input: &str, ctx: &GcodeContext) -> Result<f64, ExprError> {
        let mut parser = Parser {
            chars: input.chars().collect(),
            pos: 0,
            ctx,
        };
        let value = parser.parse_expr()?;
        parser.skip_ws();
        if parser.pos != parser.chars.len() {
            return Err(ExprError::Syntax(format!(
                "unexpected trailing input at offset {}",
                parser.pos
            )));
        }
        Ok(value)
    }

    struct Parser<'a> {
        chars: Vec<char>,
        pos: usize,
        ctx: &'a GcodeContext,
    }

    impl<'a> Parser<'a> {
        fn skip_ws(&mut self) {
            while self.peek().is_some_and(|c| c.is_whitespace()) {
                self.pos += 1;
            }
        }

        fn peek(&self) -> Option<char> {
            self.chars.get(self.pos).copied()
        }

        fn bump(&mut self) -> Option<char> {
            let c = self.peek();
            if c.is_some() {
                self.pos += 1;
            }
            c
        }

        fn parse_expr(&mut self) -> Result<f64, ExprError> {
            let mut value = self.parse_term()?;
            loop {
                self.skip_ws();
                match self.peek() {
                    Some('+') => {
                        self.bump();
                        value += self.parse_term()?;
                    }
                    Some('-') => {
                        self.bump();
                        value -= self.parse_term()?;
                    }
                    _ => break,
                }
            }
            Ok(value)
        }

        fn parse_term(&mut self) -> Result<f64, ExprError> {
            let mut value = self.parse_factor()?;
            loop {
                self.skip_ws();
                match self.peek() {
                    Some('*') => {
                        self.bump();
                        value *= self.parse_factor()?;
                    }
                    Some('/') => {
                        self.bump();
                        let rhs = self.parse_factor()?;
                        if rhs == 0.0 {
                            return Err(ExprError::DivByZero);
                        }
                        value /= rhs;
                    }
                    _ => break,
                }
            }
            Ok(value)
        }

        fn parse_factor(&mut self) -> Result<f64, ExprError> {
            self.skip_ws();
            match self.peek() {
                Some('-') => {
                    self.bump();
                    Ok(-self.parse_factor()?)
                }
                Some('+') => {
                    self.bump();
                    self.parse_factor()
                }
                Some('(') => {
                    self.bump();
                    let value = self.parse_expr()?;
                    self.skip_ws();
                    match self.bump() {
                        Some(')') => Ok(value),
                        _ => Err(ExprError::Syntax("missing closing parenthesis".into())),
                    }
                }
                Some(c) if c.is_ascii_digit() || c == '.' => self.parse_number(),
                Some(c) if c.is_alphabetic() || c == '_' => self.parse_identifier(),
                Some(c) => Err(ExprError::Syntax(format!("unexpected character '{c}'"))),
                None => Err(ExprError::Syntax("unexpected end of expression".into())),
            }
        }

        fn parse_number(&mut self) -> Result<f64, ExprError> {
            let start = self.pos;
            while self
                .peek()
                .is_some_and(|c| c.is_ascii_digit() || c == '.')
            {
                self.pos += 1;
            }
            let text: String = self.chars[start..self.pos].iter().collect();
            text.parse::<f64>()
                .map_err(|_| ExprError::Syntax(format!("invalid number '{text}'")))
        }

        fn parse_identifier(&mut self) -> Result<f64, ExprError> {
            let start = self.pos;
            while self
                .peek()
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
            {
                self.pos += 1;
            }
            let name: String = self.chars[start..self.pos].iter().collect();
            self.ctx
                .get(&name)
                .copied()
                .ok_or(ExprError::Unbound(name))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn ctx() -> GcodeContext {
            let mut c = GcodeContext::new();
            c.insert("xmin".to_string(), 1.0);
            c.insert("xmax".to_string(), 10.0);
            c
        }

        #[test]
        fn evaluates_arithmetic() {
            assert_eq!(eval("1+2*3", &ctx()).unwrap(), 7.0);
            assert_eq!(eval("(1+2)*3", &ctx()).unwrap(), 9.0);
            assert_eq!(eval("xmax-xmin", &ctx()).unwrap(), 9.0);
        }

        #[test]
        fn unbound_identifier_errors() {
            assert!(matches!(eval("foo+1", &ctx()), Err(ExprError::Unbound(_))));
        }

        #[test]
        fn division_by_zero_errors() {
            assert!(matches!(eval("1/0", &ctx()), Err(ExprError::DivByZero)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_comments() {
        let mut ctx = GcodeContext::new();
        let r = Preprocessor::process("G1 X1 ; move right", &mut ctx);
        assert_eq!(r.output, "G1 X1");
        assert!(r.hold.is_none());
    }

    #[test]
    fn preprocessing_is_idempotent() {
        let mut ctx = GcodeContext::new();
        let once = Preprocessor::process("G1 X1 ; comment", &mut ctx).output;
        let twice = Preprocessor::process(&once, &mut ctx).output;
        assert_eq!(once, twice);
    }

    #[test]
    fn percent_wait_becomes_dwell_and_holds() {
        let mut ctx = GcodeContext::new();
        let r = Preprocessor::process("%wait", &mut ctx);
        assert_eq!(r.output, "G4 P0.5 (%wait)");
        assert_eq!(r.hold, Some(DetectedHold::Wait));
    }

    #[test]
    fn bare_percent_is_a_no_op_not_a_wait() {
        let mut ctx = GcodeContext::new();
        let r = Preprocessor::process("%", &mut ctx);
        assert_eq!(r.output, "");
        assert_eq!(r.hold, None);
    }

    #[test]
    fn percent_assignment_mutates_context_and_emits_nothing() {
        let mut ctx = GcodeContext::new();
        ctx.insert("xmin".to_string(), 0.0);
        let r = Preprocessor::process("%a=xmin+5,b=2*3", &mut ctx);
        assert_eq!(r.output, "");
        assert_eq!(ctx.get("a"), Some(&5.0));
        assert_eq!(ctx.get("b"), Some(&6.0));
    }

    #[test]
    fn bracket_expression_is_substituted() {
        let mut ctx = GcodeContext::new();
        ctx.insert("xmin".to_string(), 1.0);
        let r = Preprocessor::process("G0 X[xmin+1]", &mut ctx);
        assert_eq!(r.output, "G0 X2");
    }

    #[test]
    fn bad_expression_yields_empty_substitution_not_abort() {
        let mut ctx = GcodeContext::new();
        let r = Preprocessor::process("G0 X[undefined_var]", &mut ctx);
        assert_eq!(r.output, "G0 X");
        assert!(r.hold.is_none());
    }

    #[test]
    fn detects_m0_m1_m6() {
        let mut ctx = GcodeContext::new();
        assert_eq!(
            Preprocessor::process("M0", &mut ctx).hold,
            Some(DetectedHold::M0)
        );
        assert_eq!(
            Preprocessor::process("M1", &mut ctx).hold,
            Some(DetectedHold::M1)
        );
        assert_eq!(
            Preprocessor::process("M6 T1", &mut ctx).hold,
            Some(DetectedHold::M6)
        );
    }

    #[test]
    fn blank_line_yields_empty_output() {
        let mut ctx = GcodeContext::new();
        let r = Preprocessor::process("   ; just a comment", &mut ctx);
        assert_eq!(r.output, "");
        assert!(r.hold.is_none());
    }
}
