use regex::Regex;
use std::ops::AddAssign;
use std::sync::OnceLock;

const TOOL_CALL_PREFIX: &str = "Tool call:";
const TOOL_CALL_GLYPH: &str = "\u{1f527}";
const MAX_TOOL_DESCRIPTION_CHARS: usize = 60;

/// Token accounting reported by the external tool at the end of a response.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Usage {
    pub input: u64,
    pub output: u64,
    pub cost: f64,
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        self.input += rhs.input;
        self.output += rhs.output;
        self.cost += rhs.cost;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoutedLine {
    /// Shown in the transcript.
    Display(String),
    /// Side-channel statistics; never shown as chat text.
    Usage(Usage),
    /// Tool-call continuation output.
    Suppressed,
}

/// Classifies framed lines. Holds one bit of state: whether the previous
/// display line opened a tool-call block.
#[derive(Debug, Default)]
pub struct StreamRouter {
    in_tool_call: bool,
}

impl StreamRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&mut self, line: &str) -> RoutedLine {
        if self.in_tool_call {
            if line.is_empty() {
                self.in_tool_call = false;
                return RoutedLine::Suppressed;
            }
            if line.starts_with(char::is_whitespace) {
                return RoutedLine::Suppressed;
            }
            self.in_tool_call = false;
        }

        if let Some(usage) = parse_token_usage(line) {
            return RoutedLine::Usage(usage);
        }

        if let Some(description) = line.strip_prefix(TOOL_CALL_PREFIX) {
            self.in_tool_call = true;
            return RoutedLine::Display(format_tool_call(description.trim()));
        }

        RoutedLine::Display(line.to_string())
    }
}

fn usage_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*Token usage:\s*([0-9][0-9,]*)\s+input,\s*([0-9][0-9,]*)\s+output(.*)$")
            .expect("usage pattern is a valid regex")
    })
}

fn cost_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#""cost"\s*:\s*(-?[0-9]+(?:\.[0-9]+)?(?:[eE][-+]?[0-9]+)?)"#)
            .expect("cost pattern is a valid regex")
    })
}

/// Parses `Token usage: 1,234 input, 56 output[, {"cost": 0.01}]`.
///
/// Returns `None` when the line does not have that shape or the counts do not
/// fit in a `u64`; callers then treat the line as ordinary output.
pub fn parse_token_usage(line: &str) -> Option<Usage> {
    let captures = usage_pattern().captures(line)?;
    let input = parse_count(captures.get(1)?.as_str())?;
    let output = parse_count(captures.get(2)?.as_str())?;
    let cost = captures
        .get(3)
        .and_then(|rest| cost_pattern().captures(rest.as_str()))
        .and_then(|cost| cost.get(1))
        .and_then(|value| value.as_str().parse::<f64>().ok())
        .unwrap_or(0.0);

    Some(Usage {
        input,
        output,
        cost,
    })
}

fn parse_count(raw: &str) -> Option<u64> {
    raw.replace(',', "").parse().ok()
}

pub fn format_tool_call(description: &str) -> String {
    format!(
        "{TOOL_CALL_GLYPH} {}",
        crate::util::truncate_chars(description, MAX_TOOL_DESCRIPTION_CHARS)
    )
}
