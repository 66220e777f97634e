//! Placeholder parsing and substitution for build instructions.
//!
//! Build instructions are templates that may reference locations only known once a
//! package has been resolved, such as its source directory or the vendor root.
//!
//! # Placeholder Format
//!
//! `$${name}` is replaced by the value of variable `name`. Variable names consist of ASCII
//! letters, digits and `_`.
//!
//! # Shell Variables
//!
//! Single `$` characters pass through unchanged, so shell variables like
//! `$HOME` and `$PATH` work naturally without any escaping.
//!
//! # Escaping
//!
//! Use `$$$` before `{` to produce a literal `$${` sequence.
//!
//! # Example
//!
//! ```
//! use pkg_lib::placeholder::{Vars, substitute};
//!
//! let vars = Vars::new().with("pkg", "/proj/vendor/pkg/zlib");
//! let cmd = substitute("./configure --prefix=$${pkg} CC=$CC", &vars).unwrap();
//! assert_eq!(cmd, "./configure --prefix=/proj/vendor/pkg/zlib CC=$CC");
//! ```

use std::collections::BTreeMap;

use thiserror::Error;

/// A segment of parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text (no placeholders)
  Literal(String),

  /// A variable reference to be resolved
  Variable(String),
}

/// Errors that can occur during placeholder parsing or resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaceholderError {
  #[error("unclosed placeholder at position {0}")]
  Unclosed(usize),

  #[error("malformed placeholder: {0}")]
  Malformed(String),

  #[error("unresolved variable: {0}")]
  Unresolved(String),
}

/// Variables available to a template.
///
/// Immutable once built; substitution never changes it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vars(BTreeMap<String, String>);

impl Vars {
  pub fn new() -> Self {
    Self::default()
  }

  /// Return a copy of `self` with `name` set to `value`.
  pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.0.insert(name.into(), value.into());
    self
  }

  pub fn get(&self, name: &str) -> Option<&str> {
    self.0.get(name).map(String::as_str)
  }
}

/// Parse a string containing placeholders into segments.
///
/// # Errors
///
/// Returns an error if a placeholder is unclosed or its name is not a valid variable name.
pub fn parse(input: &str) -> Result<Vec<Segment>, PlaceholderError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut chars = input.char_indices().peekable();

  while let Some((pos, ch)) = chars.next() {
    if ch != '$' {
      literal.push(ch);
      continue;
    }

    match chars.peek() {
      Some((_, '$')) => {
        chars.next();

        match chars.peek() {
          Some((_, '$')) => {
            chars.next();

            // $$${ -> literal $${
            if let Some((_, '{')) = chars.peek() {
              literal.push_str("$${");
              chars.next();
            } else {
              literal.push_str("$$$");
            }
          }
          Some((_, '{')) => {
            chars.next();

            if !literal.is_empty() {
              segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }

            let mut name = String::new();
            let mut found_close = false;
            for (_, c) in chars.by_ref() {
              if c == '}' {
                found_close = true;
                break;
              }
              name.push(c);
            }

            if !found_close {
              return Err(PlaceholderError::Unclosed(pos));
            }
            segments.push(Segment::Variable(validate_name(name)?));
          }
          _ => literal.push_str("$$"),
        }
      }
      _ => literal.push('$'),
    }
  }

  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

fn validate_name(name: String) -> Result<String, PlaceholderError> {
  let name = name.trim().to_string();
  if name.is_empty() {
    return Err(PlaceholderError::Malformed("empty variable name".to_string()));
  }
  if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
    return Err(PlaceholderError::Malformed(format!("invalid variable name '{name}'")));
  }
  Ok(name)
}

/// Substitute all placeholders in `input` with values from `vars`.
///
/// # Errors
///
/// Returns an error if parsing fails or if a variable is not defined.
pub fn substitute(input: &str, vars: &Vars) -> Result<String, PlaceholderError> {
  let segments = parse(input)?;
  substitute_segments(&segments, vars)
}

/// Substitute placeholders in pre-parsed segments.
pub fn substitute_segments(segments: &[Segment], vars: &Vars) -> Result<String, PlaceholderError> {
  let mut result = String::new();

  for segment in segments {
    match segment {
      Segment::Literal(s) => result.push_str(s),
      Segment::Variable(name) => {
        let value = vars
          .get(name)
          .ok_or_else(|| PlaceholderError::Unresolved(name.clone()))?;
        result.push_str(value);
      }
    }
  }

  Ok(result)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn vars() -> Vars {
    Vars::new()
      .with("vendor", "/proj/vendor")
      .with("src", "/proj/vendor/src/zlib")
      .with("pkg", "/proj/vendor/pkg/zlib")
      .with("name", "zlib")
  }

  #[test]
  fn configure_with_install_prefix() {
    let cmd = "./configure --prefix=$${pkg} && make -j4 install";
    assert_eq!(
      substitute(cmd, &vars()).unwrap(),
      "./configure --prefix=/proj/vendor/pkg/zlib && make -j4 install"
    );
  }

  #[test]
  fn multiple_variables_in_one_instruction() {
    let cmd = "cmake -S $${src} -B $${vendor}/build/$${name}";
    assert_eq!(
      substitute(cmd, &vars()).unwrap(),
      "cmake -S /proj/vendor/src/zlib -B /proj/vendor/build/zlib"
    );
  }

  #[test]
  fn shell_variables_pass_through() {
    let cmd = "export PATH=$${pkg}/bin:$PATH && echo ${HOME}";
    assert_eq!(
      substitute(cmd, &vars()).unwrap(),
      "export PATH=/proj/vendor/pkg/zlib/bin:$PATH && echo ${HOME}"
    );
  }

  #[test]
  fn escaped_placeholder_is_literal() {
    assert_eq!(substitute("echo '$$${pkg}'", &vars()).unwrap(), "echo '$${pkg}'");
    assert_eq!(substitute("a$$b", &vars()).unwrap(), "a$$b");
    assert_eq!(substitute("a$$$b", &vars()).unwrap(), "a$$$b");
  }

  #[test]
  fn parse_splits_literals_and_variables() {
    assert_eq!(
      parse("cd $${src} && make").unwrap(),
      vec![
        Segment::Literal("cd ".to_string()),
        Segment::Variable("src".to_string()),
        Segment::Literal(" && make".to_string()),
      ]
    );
    assert_eq!(parse("").unwrap(), vec![]);
  }

  #[test]
  fn unknown_variable_is_unresolved() {
    assert_eq!(
      substitute("make PREFIX=$${prefix}", &vars()),
      Err(PlaceholderError::Unresolved("prefix".to_string()))
    );
  }

  #[test]
  fn unclosed_placeholder_reports_position() {
    assert_eq!(parse("make $${pkg"), Err(PlaceholderError::Unclosed(5)));
  }

  #[test]
  fn malformed_names_are_rejected() {
    assert!(matches!(parse("$${}"), Err(PlaceholderError::Malformed(_))));
    assert!(matches!(parse("$${a b}"), Err(PlaceholderError::Malformed(_))));
    assert!(matches!(parse("$${build:abc:out}"), Err(PlaceholderError::Malformed(_))));
  }

  #[test]
  fn substitution_does_not_modify_vars() {
    let vars = vars();
    let before = vars.clone();
    substitute("$${src}", &vars).unwrap();
    assert_eq!(vars, before);
  }
}
