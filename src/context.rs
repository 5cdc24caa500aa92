//! Completion context: where a failure gets logged, and what it says.
//!
//! Messages are printf-style templates. A placeholder is
//! `%[flags][width][.precision]conversion`:
//!
//! - conversions: `s` (Display), `r` (Debug), `d`/`i` (integer),
//!   `f`/`F` (fixed point, precision defaults to 6)
//! - flags: `-` left-align, `0` zero-pad numbers, `+` and ` ` sign
//! - `%%` is a literal percent
//!
//! Arguments are formatted when they are added to the context, not when
//! the task fails: both their `Display` and `Debug` forms are kept.
//! Rendering is best-effort and never fails. A placeholder with no argument
//! left stays verbatim, surplus arguments are appended, and a numeric
//! conversion applied to a non-numeric argument falls back to its text.

use std::fmt::{self, Debug, Display};
use std::iter::Peekable;
use std::str::Chars;
use std::sync::Arc;

use crate::sink::LogSink;

/// One positional message argument, captured as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageArg {
    display: String,
    debug: String,
}

impl MessageArg {
    pub fn new<T: Display + Debug + ?Sized>(value: &T) -> Self {
        Self {
            display: value.to_string(),
            debug: format!("{value:?}"),
        }
    }

    /// `Display` form, used by every conversion but `%r`.
    pub fn display(&self) -> &str {
        &self.display
    }

    /// `Debug` form, used by `%r`.
    pub fn debug(&self) -> &str {
        &self.debug
    }
}

impl Display for MessageArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

/// Log sink plus message template and positional arguments, captured at
/// spawn time and read once when the task finishes.
#[derive(Clone)]
pub struct CompletionContext {
    sink: Arc<dyn LogSink>,
    message: String,
    args: Vec<MessageArg>,
}

impl CompletionContext {
    pub fn new<S>(sink: S, message: impl Into<String>) -> Self
    where
        S: LogSink + 'static,
    {
        Self::with_shared_sink(Arc::new(sink), message)
    }

    /// Build a context around a sink that is already shared.
    pub fn with_shared_sink(sink: Arc<dyn LogSink>, message: impl Into<String>) -> Self {
        Self {
            sink,
            message: message.into(),
            args: Vec::new(),
        }
    }

    /// Append one positional argument.
    pub fn arg<T: Display + Debug>(mut self, value: T) -> Self {
        self.args.push(MessageArg::new(&value));
        self
    }

    /// Append several positional arguments.
    pub fn args<I>(mut self, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Display + Debug,
    {
        self.args
            .extend(values.into_iter().map(|v| MessageArg::new(&v)));
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn message_args(&self) -> &[MessageArg] {
        &self.args
    }

    pub fn sink(&self) -> &dyn LogSink {
        self.sink.as_ref()
    }

    /// The message with its arguments substituted.
    pub fn render(&self) -> String {
        render(&self.message, &self.args)
    }
}

impl Debug for CompletionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionContext")
            .field("message", &self.message)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

#[derive(Debug, Default, PartialEq, Eq)]
struct Spec {
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    width: usize,
    precision: Option<usize>,
    conversion: char,
}

/// Parse what follows a `%`. On failure nothing is consumed.
fn parse_spec(chars: &mut Peekable<Chars<'_>>) -> Option<Spec> {
    let mut ahead = chars.clone();
    let mut spec = Spec::default();

    while let Some(&c) = ahead.peek() {
        match c {
            '-' => spec.left = true,
            '0' => spec.zero = true,
            '+' => spec.plus = true,
            ' ' => spec.space = true,
            '#' => {}
            _ => break,
        }
        ahead.next();
    }
    spec.width = digits(&mut ahead).unwrap_or(0);
    if ahead.peek() == Some(&'.') {
        ahead.next();
        spec.precision = Some(digits(&mut ahead).unwrap_or(0));
    }
    match ahead.next() {
        Some(c @ ('s' | 'r' | 'd' | 'i' | 'f' | 'F')) => spec.conversion = c,
        _ => return None,
    }

    *chars = ahead;
    Some(spec)
}

fn digits(chars: &mut Peekable<Chars<'_>>) -> Option<usize> {
    let mut value: Option<usize> = None;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        value = Some(value.unwrap_or(0).saturating_mul(10).saturating_add(d as usize));
        chars.next();
    }
    value
}

/// Apply one placeholder to one argument.
fn format_arg(spec: &Spec, arg: &MessageArg) -> String {
    let numeric = match spec.conversion {
        'd' | 'i' => integer(arg.display()),
        'f' | 'F' => arg
            .display()
            .trim()
            .parse::<f64>()
            .ok()
            .map(|v| format!("{:.*}", spec.precision.unwrap_or(6), v)),
        _ => None,
    };

    let Some(mut body) = numeric else {
        let text = match spec.conversion {
            'r' => arg.debug(),
            _ => arg.display(),
        };
        let text: String = match spec.precision {
            Some(p) if matches!(spec.conversion, 's' | 'r') => text.chars().take(p).collect(),
            _ => text.to_string(),
        };
        return pad(text, spec.width, spec.left);
    };

    let negative = body.starts_with('-');
    if negative {
        body.remove(0);
    }
    let sign = if negative {
        "-"
    } else if spec.plus {
        "+"
    } else if spec.space {
        " "
    } else {
        ""
    };

    if spec.zero && !spec.left {
        let fill = spec.width.saturating_sub(sign.len() + body.chars().count());
        format!("{sign}{}{body}", "0".repeat(fill))
    } else {
        pad(format!("{sign}{body}"), spec.width, spec.left)
    }
}

/// Integer text for `%d`: integers as-is, floats truncated toward zero.
fn integer(text: &str) -> Option<String> {
    let text = text.trim();
    if let Ok(v) = text.parse::<i128>() {
        return Some(v.to_string());
    }
    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| match v.trunc() {
            t if t == 0.0 => "0".to_string(),
            t => format!("{t:.0}"),
        })
}

fn pad(text: String, width: usize, left: bool) -> String {
    if left {
        format!("{text:<width$}")
    } else {
        format!("{text:>width$}")
    }
}

/// Substitute `args` into a printf-style `template`.
pub fn render(template: &str, args: &[MessageArg]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }
        let start = chars.clone();
        match parse_spec(&mut chars) {
            Some(spec) => match args.next() {
                Some(arg) => out.push_str(&format_arg(&spec, arg)),
                None => {
                    // Leave the whole placeholder as written.
                    out.push('%');
                    let consumed = start.clone().count() - chars.clone().count();
                    out.extend(start.take(consumed));
                }
            },
            None => out.push('%'),
        }
    }

    let extra: Vec<&str> = args.map(MessageArg::display).collect();
    if !extra.is_empty() {
        out.push_str(" [extra args: ");
        out.push_str(&extra.join(", "));
        out.push(']');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;

    fn args(values: &[&str]) -> Vec<MessageArg> {
        values.iter().map(|s| MessageArg::new(*s)).collect()
    }

    #[test]
    fn substitutes_positional_args_in_order() {
        assert_eq!(
            render("sync for %s failed after %d tries", &args(&["alice", "3"])),
            "sync for alice failed after 3 tries"
        );
    }

    #[test]
    fn template_without_args_is_unchanged() {
        assert_eq!(render("background flush failed", &[]), "background flush failed");
    }

    #[test]
    fn double_percent_is_literal() {
        assert_eq!(render("100%% of %s", &args(&["jobs"])), "100% of jobs");
    }

    #[test]
    fn missing_args_leave_placeholder() {
        assert_eq!(render("%s and %-5s", &args(&["one"])), "one and %-5s");
    }

    #[test]
    fn surplus_args_are_appended() {
        assert_eq!(
            render("failed: %s", &args(&["a", "b", "c"])),
            "failed: a [extra args: b, c]"
        );
    }

    #[test]
    fn unknown_conversion_and_trailing_percent_pass_through() {
        assert_eq!(
            render("%x at 50%", &args(&["unused"])),
            "%x at 50% [extra args: unused]"
        );
    }

    #[test]
    fn width_precision_and_flags() {
        assert_eq!(
            render("took %.2f s for %-8s id=%05d", &args(&["1.5", "bob", "42"])),
            "took 1.50 s for bob      id=00042"
        );
    }

    #[test]
    fn right_aligned_width() {
        assert_eq!(render("[%6s]", &args(&["ab"])), "[    ab]");
        assert_eq!(render("[%4d]", &args(&["7"])), "[   7]");
    }

    #[test]
    fn float_default_precision_and_zero_pad() {
        assert_eq!(render("%f", &args(&["2.5"])), "2.500000");
        assert_eq!(render("%08.3f", &args(&["-3.14159"])), "-003.142");
    }

    #[test]
    fn integer_conversion_truncates_floats() {
        assert_eq!(render("%d", &args(&["-7.9"])), "-7");
        assert_eq!(render("%i", &args(&["12"])), "12");
    }

    #[test]
    fn sign_flags_apply_to_numbers() {
        assert_eq!(render("%+d|% d|%+.1f", &args(&["5", "5", "-0.26"])), "+5| 5|-0.3");
    }

    #[test]
    fn string_precision_truncates() {
        assert_eq!(render("%.3s", &args(&["abcdef"])), "abc");
    }

    #[test]
    fn numeric_conversion_of_text_falls_back() {
        assert_eq!(render("id=%05d", &args(&["abc"])), "id=  abc");
    }

    #[test]
    fn repr_uses_debug_form() {
        let rendered = render("%s vs %r", &[MessageArg::new("bob"), MessageArg::new("bob")]);
        assert_eq!(rendered, "bob vs \"bob\"");
    }

    #[test]
    fn context_collects_args() {
        let ctx = CompletionContext::new(RecordingSink::new(), "processing failed: %s (%d)")
            .arg("user123")
            .args([7]);
        assert_eq!(ctx.message(), "processing failed: %s (%d)");
        let shown: Vec<&str> = ctx.message_args().iter().map(MessageArg::display).collect();
        assert_eq!(shown, ["user123", "7"]);
        assert_eq!(ctx.render(), "processing failed: user123 (7)");
    }
}
