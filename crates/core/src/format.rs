//! Build-value format mini-language
//!
//! `build_value` constructs a Value from a compact format string plus a list
//! of arguments, one argument per format code. It exists so host code can
//! assemble call arguments without touching the interpreter.
//!
//! Format codes:
//!
//! - `i` `l` `b` `h` — integer
//! - `d` `f` — float
//! - `s` — string
//! - `z` — string, or an absent argument for the none value
//! - `c` — string of length 1
//! - `( … )` / `[ … ]` — sequence of the enclosed codes
//! - `{ k:v, … }` — mapping of the enclosed key/value pairs
//!
//! Commas, colons and whitespace are separators and carry no meaning. The
//! number of top-level format units decides the result shape: an empty
//! format yields the none value, exactly one unit yields that unit's value
//! directly, and two or more units yield a sequence. Parenthesize a single
//! unit to force a one-element sequence instead of a bare scalar.
//!
//! # Examples
//!
//! ```
//! use tether_core::{build_value, Value};
//!
//! assert_eq!(build_value("", &[]).unwrap(), Value::None);
//! assert_eq!(build_value("i", &[123.into()]).unwrap(), Value::Int(123));
//! assert_eq!(
//!     build_value("ii", &[1.into(), 2.into()]).unwrap().to_string(),
//!     "(1,2)"
//! );
//! assert_eq!(
//!     build_value("(i)", &[123.into()]).unwrap().to_string(),
//!     "(123,)"
//! );
//! assert_eq!(
//!     build_value("{s:i,s:i}", &["abc".into(), 123.into(), "def".into(), 456.into()])
//!         .unwrap()
//!         .to_string(),
//!     "{'abc':123,'def':456}"
//! );
//! ```

use crate::value::{Mapping, Sequence, Value};

/// One argument consumed by a format code.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildArg {
    Int(i64),
    Float(f64),
    Str(String),
    Char(char),
    /// The absent argument accepted by `z`.
    Absent,
}

impl From<i64> for BuildArg {
    fn from(n: i64) -> Self {
        BuildArg::Int(n)
    }
}

impl From<i32> for BuildArg {
    fn from(n: i32) -> Self {
        BuildArg::Int(n as i64)
    }
}

impl From<f64> for BuildArg {
    fn from(x: f64) -> Self {
        BuildArg::Float(x)
    }
}

impl From<&str> for BuildArg {
    fn from(s: &str) -> Self {
        BuildArg::Str(s.to_string())
    }
}

impl From<String> for BuildArg {
    fn from(s: String) -> Self {
        BuildArg::Str(s)
    }
}

impl From<char> for BuildArg {
    fn from(c: char) -> Self {
        BuildArg::Char(c)
    }
}

impl From<Option<&str>> for BuildArg {
    fn from(s: Option<&str>) -> Self {
        match s {
            Some(s) => BuildArg::Str(s.to_string()),
            None => BuildArg::Absent,
        }
    }
}

/// Error type for format parsing.
///
/// Allows proper propagation with `?` for both malformed format strings and
/// argument-list mismatches.
#[derive(Debug, PartialEq)]
pub enum BuildError {
    /// A character that is not a format code, separator or group delimiter
    UnknownCode(char),
    /// A group opened with `(`, `[` or `{` that never closes, or a stray closer
    UnbalancedGroup(char),
    /// A format code with no argument left to consume
    MissingArgument(char),
    /// An argument whose variant does not fit its format code
    ArgumentMismatch { code: char, argument: String },
    /// A `{…}` group with a key but no value
    DanglingKey,
    /// Arguments left over after the format string was exhausted
    TrailingArguments(usize),
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::UnknownCode(c) => write!(f, "unknown format code '{}'", c),
            BuildError::UnbalancedGroup(c) => write!(f, "unbalanced group delimiter '{}'", c),
            BuildError::MissingArgument(c) => {
                write!(f, "format code '{}' has no matching argument", c)
            }
            BuildError::ArgumentMismatch { code, argument } => {
                write!(f, "argument {} does not fit format code '{}'", argument, code)
            }
            BuildError::DanglingKey => write!(f, "mapping group holds a key without a value"),
            BuildError::TrailingArguments(n) => {
                write!(f, "{} argument(s) left over after the format string", n)
            }
        }
    }
}

impl std::error::Error for BuildError {}

/// Build a Value from `format` and `args`. See the module docs for the
/// format grammar and the unit-counting rule.
pub fn build_value(format: &str, args: &[BuildArg]) -> Result<Value, BuildError> {
    let mut parser = Parser {
        chars: format.chars().collect(),
        pos: 0,
        args,
        next_arg: 0,
    };
    let units = parser.units(None)?;
    if parser.next_arg < args.len() {
        return Err(BuildError::TrailingArguments(args.len() - parser.next_arg));
    }
    Ok(collapse(units))
}

/// The 0/1/many rule for a run of top-level units.
fn collapse(mut units: Vec<Value>) -> Value {
    match units.len() {
        0 => Value::None,
        1 => units.pop().expect("len checked"),
        _ => Value::Seq(Sequence::from(units)),
    }
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    args: &'a [BuildArg],
    next_arg: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_separators(&mut self) {
        while let Some(c) = self.peek() {
            if c == ',' || c == ':' || c.is_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn take_arg(&mut self, code: char) -> Result<&BuildArg, BuildError> {
        let arg = self
            .args
            .get(self.next_arg)
            .ok_or(BuildError::MissingArgument(code))?;
        self.next_arg += 1;
        Ok(arg)
    }

    /// Parse units until the group's closer (or end of input at top level).
    /// `group` is the (opener, closer) pair when inside a group.
    fn units(&mut self, group: Option<(char, char)>) -> Result<Vec<Value>, BuildError> {
        let mut out = Vec::new();
        let closer = group.map(|(_, close)| close);
        loop {
            self.skip_separators();
            let Some(c) = self.peek() else {
                return match group {
                    // ran out of input inside a group
                    Some((open, _)) => Err(BuildError::UnbalancedGroup(open)),
                    None => Ok(out),
                };
            };
            if Some(c) == closer {
                self.pos += 1;
                return Ok(out);
            }
            match c {
                '(' | '[' => {
                    self.pos += 1;
                    let close = if c == '(' { ')' } else { ']' };
                    let inner = self.units(Some((c, close)))?;
                    out.push(Value::Seq(Sequence::from(inner)));
                }
                '{' => {
                    self.pos += 1;
                    let inner = self.units(Some(('{', '}')))?;
                    if inner.len() % 2 != 0 {
                        return Err(BuildError::DanglingKey);
                    }
                    let mut map = Mapping::new();
                    let mut it = inner.into_iter();
                    while let (Some(k), Some(v)) = (it.next(), it.next()) {
                        map.insert(k, v);
                    }
                    out.push(Value::Map(map));
                }
                ')' | ']' | '}' => return Err(BuildError::UnbalancedGroup(c)),
                _ => {
                    self.pos += 1;
                    out.push(self.scalar(c)?);
                }
            }
        }
    }

    fn scalar(&mut self, code: char) -> Result<Value, BuildError> {
        let arg = self.take_arg(code)?.clone();
        let mismatch = |arg: &BuildArg| BuildError::ArgumentMismatch {
            code,
            argument: format!("{:?}", arg),
        };
        match code {
            'i' | 'l' | 'b' | 'h' => match arg {
                BuildArg::Int(n) => Ok(Value::Int(n)),
                other => Err(mismatch(&other)),
            },
            'd' | 'f' => match arg {
                BuildArg::Float(x) => Ok(Value::Float(x)),
                // C varargs promote integral arguments; accept the same here
                BuildArg::Int(n) => Ok(Value::Float(n as f64)),
                other => Err(mismatch(&other)),
            },
            's' => match arg {
                BuildArg::Str(s) => Ok(Value::Str(s)),
                other => Err(mismatch(&other)),
            },
            'z' => match arg {
                BuildArg::Str(s) => Ok(Value::Str(s)),
                BuildArg::Absent => Ok(Value::None),
                other => Err(mismatch(&other)),
            },
            'c' => match arg {
                BuildArg::Char(c) => Ok(Value::Str(c.to_string())),
                other => Err(mismatch(&other)),
            },
            _ => Err(BuildError::UnknownCode(code)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_format_is_none() {
        assert_eq!(build_value("", &[]).unwrap(), Value::None);
    }

    #[test]
    fn test_single_unit_is_bare() {
        assert_eq!(build_value("i", &[123.into()]).unwrap(), Value::Int(123));
        assert_eq!(
            build_value("s", &["hello".into()]).unwrap(),
            Value::from("hello")
        );
        assert_eq!(build_value("d", &[2.5.into()]).unwrap(), Value::Float(2.5));
    }

    #[test]
    fn test_two_units_make_a_sequence() {
        let v = build_value("ii", &[1.into(), 2.into()]).unwrap();
        assert_eq!(v.to_string(), "(1,2)");
    }

    #[test]
    fn test_parenthesized_single_unit_forces_sequence() {
        let v = build_value("(i)", &[123.into()]).unwrap();
        assert_eq!(v.to_string(), "(123,)");
    }

    #[test]
    fn test_empty_group_is_empty_sequence() {
        let v = build_value("()", &[]).unwrap();
        assert_eq!(v.to_string(), "()");
    }

    #[test]
    fn test_all_integer_codes() {
        let v = build_value("ilbh", &[1.into(), 2.into(), 3.into(), 4.into()]).unwrap();
        assert_eq!(v.to_string(), "(1,2,3,4)");
    }

    #[test]
    fn test_separators_are_ignored() {
        let a = build_value("(i,i)", &[1.into(), 2.into()]).unwrap();
        let b = build_value("(ii)", &[1.into(), 2.into()]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_bracket_group_builds_sequence() {
        let v = build_value("[i,i]", &[1.into(), 2.into()]).unwrap();
        assert_eq!(v.to_string(), "(1,2)");
    }

    #[test]
    fn test_nested_groups() {
        let v = build_value(
            "((ii)(ii))(ii)",
            &[1.into(), 2.into(), 3.into(), 4.into(), 5.into(), 6.into()],
        )
        .unwrap();
        assert_eq!(v.to_string(), "(((1,2),(3,4)),(5,6))");
    }

    #[test]
    fn test_mapping_group() {
        let v = build_value(
            "{s:i,s:i}",
            &["abc".into(), 123.into(), "def".into(), 456.into()],
        )
        .unwrap();
        assert_eq!(v.to_string(), "{'abc':123,'def':456}");
    }

    #[test]
    fn test_z_accepts_absent() {
        assert_eq!(build_value("z", &[BuildArg::Absent]).unwrap(), Value::None);
        assert_eq!(
            build_value("z", &["x".into()]).unwrap(),
            Value::from("x")
        );
    }

    #[test]
    fn test_c_builds_one_char_string() {
        assert_eq!(build_value("c", &['x'.into()]).unwrap(), Value::from("x"));
    }

    #[test]
    fn test_float_code_promotes_int_argument() {
        assert_eq!(build_value("d", &[2.into()]).unwrap(), Value::Float(2.0));
    }

    #[test]
    fn test_unknown_code() {
        assert_eq!(
            build_value("q", &[1.into()]),
            Err(BuildError::UnknownCode('q'))
        );
    }

    #[test]
    fn test_missing_argument() {
        assert_eq!(build_value("i", &[]), Err(BuildError::MissingArgument('i')));
    }

    #[test]
    fn test_argument_mismatch() {
        assert!(matches!(
            build_value("i", &["nope".into()]),
            Err(BuildError::ArgumentMismatch { code: 'i', .. })
        ));
    }

    #[test]
    fn test_unbalanced_groups() {
        assert_eq!(
            build_value("(i", &[1.into()]),
            Err(BuildError::UnbalancedGroup('('))
        );
        assert_eq!(build_value(")", &[]), Err(BuildError::UnbalancedGroup(')')));
    }

    #[test]
    fn test_dangling_key() {
        assert_eq!(
            build_value("{s}", &["k".into()]),
            Err(BuildError::DanglingKey)
        );
    }

    #[test]
    fn test_trailing_arguments() {
        assert_eq!(
            build_value("i", &[1.into(), 2.into()]),
            Err(BuildError::TrailingArguments(1))
        );
    }
}
