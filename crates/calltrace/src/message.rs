//! Message templates for trace annotations.
//!
//! Messages and lap records can be built from a printf-style template and a
//! list of typed [`Arg`]s. Interpolation never fails: anything it cannot
//! satisfy is written out verbatim so that tracing can't break the code it
//! observes.
//!
//! Specifiers follow `%[flags][width][.precision]conversion`. Conversions are
//! `s`, `d`, `f`, `x`, `b`, `c` (uppercase forms upper-case the output), plus
//! `%%` and `%n`. Flags are `-` (left-justify), `0` (zero-pad), `+`, space and
//! `,` (thousands grouping). Any other text, `{}` included, is literal.

use std::borrow::Cow;
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

/// Recorded in place of a message whose template was absent.
pub const NULL_MESSAGE: &str = "<null message>";

/// Default number of fractional digits for `%f`.
const DEFAULT_FLOAT_PRECISION: usize = 6;

/// A typed template argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg<'a> {
    Str(Cow<'a, str>),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Char(char),
}

impl fmt::Display for Arg<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Str(s) => f.write_str(s),
            Arg::Int(v) => write!(f, "{}", v),
            Arg::UInt(v) => write!(f, "{}", v),
            Arg::Float(v) => write!(f, "{}", v),
            Arg::Bool(v) => write!(f, "{}", v),
            Arg::Char(v) => write!(f, "{}", v),
        }
    }
}

impl<'a> From<&'a str> for Arg<'a> {
    fn from(value: &'a str) -> Self {
        Arg::Str(Cow::Borrowed(value))
    }
}

impl<'a> From<&'a String> for Arg<'a> {
    fn from(value: &'a String) -> Self {
        Arg::Str(Cow::Borrowed(value.as_str()))
    }
}

impl From<String> for Arg<'_> {
    fn from(value: String) -> Self {
        Arg::Str(Cow::Owned(value))
    }
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for Arg<'_> {
            fn from(value: $t) -> Self {
                Arg::Int(value as i64)
            }
        })*
    };
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for Arg<'_> {
            fn from(value: $t) -> Self {
                Arg::UInt(value as u64)
            }
        })*
    };
}

impl_from_signed!(i8, i16, i32, i64, isize);
impl_from_unsigned!(u8, u16, u32, u64, usize);

impl From<f32> for Arg<'_> {
    fn from(value: f32) -> Self {
        Arg::Float(value as f64)
    }
}

impl From<f64> for Arg<'_> {
    fn from(value: f64) -> Self {
        Arg::Float(value)
    }
}

impl From<bool> for Arg<'_> {
    fn from(value: bool) -> Self {
        Arg::Bool(value)
    }
}

impl From<char> for Arg<'_> {
    fn from(value: char) -> Self {
        Arg::Char(value)
    }
}

impl Arg<'_> {
    fn is_numeric(&self) -> bool {
        matches!(self, Arg::Int(_) | Arg::UInt(_) | Arg::Float(_))
    }

    /// Convert for a lowercase conversion character. Mismatched types fall
    /// back to their natural display form.
    fn convert(&self, conversion: char, precision: Option<usize>) -> String {
        let digits = precision.unwrap_or(DEFAULT_FLOAT_PRECISION);
        match (conversion, self) {
            ('f', Arg::Float(v)) => format!("{:.*}", digits, v),
            ('f', Arg::Int(v)) => format!("{:.*}", digits, *v as f64),
            ('f', Arg::UInt(v)) => format!("{:.*}", digits, *v as f64),
            ('x', Arg::Int(v)) => format!("{:x}", v),
            ('x', Arg::UInt(v)) => format!("{:x}", v),
            ('c', Arg::UInt(v)) => match u32::try_from(*v).ok().and_then(char::from_u32) {
                Some(c) => c.to_string(),
                None => v.to_string(),
            },
            ('s', _) => match precision {
                Some(max) => self.to_string().chars().take(max).collect(),
                None => self.to_string(),
            },
            _ => self.to_string(),
        }
    }

    /// Render under a full specifier: conversion, then sign and grouping,
    /// then width and padding.
    fn format(&self, conversion: char, spec: &Spec) -> String {
        let lower = conversion.to_ascii_lowercase();
        let mut body = self.convert(lower, spec.precision);
        if conversion.is_ascii_uppercase() {
            body = body.to_uppercase();
        }

        let numeric = self.is_numeric() && matches!(lower, 'd' | 'f' | 'x');
        if numeric && lower != 'x' {
            if spec.group {
                body = group_thousands(&body);
            }
            if !body.starts_with('-') {
                if spec.plus {
                    body.insert(0, '+');
                } else if spec.space {
                    body.insert(0, ' ');
                }
            }
        }

        spec.pad(body, numeric)
    }
}

/// Flags, width and precision between `%` and the conversion character.
#[derive(Debug, Default)]
struct Spec {
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    group: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

impl Spec {
    /// Parse everything up to the conversion character, echoing the
    /// consumed text into `raw`.
    fn parse(chars: &mut Peekable<Chars<'_>>, raw: &mut String) -> Self {
        let mut spec = Spec::default();
        while let Some(&c) = chars.peek() {
            match c {
                '-' => spec.left = true,
                '0' => spec.zero = true,
                '+' => spec.plus = true,
                ' ' => spec.space = true,
                ',' => spec.group = true,
                _ => break,
            }
            raw.push(c);
            chars.next();
        }

        spec.width = take_number(chars, raw);
        if chars.peek() == Some(&'.') {
            chars.next();
            raw.push('.');
            spec.precision = Some(take_number(chars, raw).unwrap_or(0));
        }
        spec
    }

    fn is_plain(&self) -> bool {
        !(self.left || self.zero || self.plus || self.space || self.group)
            && self.width.is_none()
            && self.precision.is_none()
    }

    fn pad(&self, body: String, numeric: bool) -> String {
        let len = body.chars().count();
        let fill = match self.width {
            Some(width) if width > len => width - len,
            _ => return body,
        };

        if self.left {
            body + &" ".repeat(fill)
        } else if self.zero && numeric {
            let sign_len = usize::from(body.starts_with(['-', '+', ' ']));
            let (sign, digits) = body.split_at(sign_len);
            format!("{}{}{}", sign, "0".repeat(fill), digits)
        } else {
            " ".repeat(fill) + &body
        }
    }
}

fn take_number(chars: &mut Peekable<Chars<'_>>, raw: &mut String) -> Option<usize> {
    let mut digits = String::new();
    while let Some(&d) = chars.peek() {
        if !d.is_ascii_digit() {
            break;
        }
        digits.push(d);
        raw.push(d);
        chars.next();
    }
    digits.parse().ok()
}

/// Insert `,` between thousands of the integer part.
fn group_thousands(body: &str) -> String {
    let (sign, rest) = match body.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", body),
    };
    let (int, frac) = rest.split_at(rest.find('.').unwrap_or(rest.len()));
    if int.is_empty() || !int.bytes().all(|b| b.is_ascii_digit()) {
        return body.to_string();
    }

    let mut grouped = String::with_capacity(int.len() + int.len() / 3);
    for (i, c) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{}{}{}", sign, grouped, frac)
}

/// Substitute `args` into `template`.
///
/// Each `%` specifier takes the next argument, including specifiers with an
/// unknown conversion letter, which render the argument's display form.
/// Specifiers without a remaining argument are kept verbatim. Surplus
/// arguments are ignored.
pub fn interpolate(template: &str, args: &[Arg<'_>]) -> String {
    let mut out = String::with_capacity(template.len() + args.len() * 8);
    let mut args = args.iter();
    let mut missing = 0usize;
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut raw = String::from('%');
        let spec = Spec::parse(&mut chars, &mut raw);

        match chars.next() {
            Some('%') if spec.is_plain() => out.push('%'),
            Some('n') if spec.is_plain() => out.push('\n'),
            Some(conv) if conv.is_ascii_alphabetic() => match args.next() {
                Some(arg) => out.push_str(&arg.format(conv, &spec)),
                None => {
                    missing += 1;
                    out.push_str(&raw);
                    out.push(conv);
                }
            },
            Some(other) => {
                out.push_str(&raw);
                out.push(other);
            }
            None => out.push_str(&raw),
        }
    }

    if missing > 0 {
        tracing::warn!(
            template,
            missing,
            "Message template has more placeholders than arguments"
        );
    }

    out
}

/// Build the text of a message or lap record.
///
/// An absent template yields [`NULL_MESSAGE`]. Without arguments the
/// template is taken verbatim, so a literal `%` needs no escaping.
pub(crate) fn render(template: Option<&str>, args: &[Arg<'_>]) -> String {
    match template {
        None => {
            tracing::warn!("Trace message template is absent");
            NULL_MESSAGE.to_string()
        }
        Some(t) if args.is_empty() => t.to_string(),
        Some(t) => interpolate(t, args),
    }
}

/// Append an interpolated message to a trace.
///
/// ```rust
/// use calltrace::{Trace, trace_message};
///
/// let mut trace = Trace::new("Orders", "place");
/// trace_message!(trace, "value=%d", 5);
/// assert_eq!(trace.messages, vec!["value=5"]);
/// ```
#[macro_export]
macro_rules! trace_message {
    ($trace:expr, $template:expr $(,)?) => {
        $trace.add_message_with(::std::option::Option::Some($template), &[])
    };
    ($trace:expr, $template:expr, $($arg:expr),+ $(,)?) => {
        $trace.add_message_with(
            ::std::option::Option::Some($template),
            &[$($crate::Arg::from($arg)),+],
        )
    };
}

/// Append an interpolated lap record to a trace (no-op unless lap timing is on).
#[macro_export]
macro_rules! trace_time {
    ($trace:expr, $template:expr $(,)?) => {
        $trace.log_time_with(::std::option::Option::Some($template), &[])
    };
    ($trace:expr, $template:expr, $($arg:expr),+ $(,)?) => {
        $trace.log_time_with(
            ::std::option::Option::Some($template),
            &[$($crate::Arg::from($arg)),+],
        )
    };
}
