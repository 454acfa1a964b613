//! Sandbox fault types.
//!
//! Every failure inside the lexer, parser, or evaluator surfaces as a
//! [`Fault`].  Faults never escape [`crate::Sandbox::execute`]; they are
//! rendered into the `error` field of the execution result as
//! `"<fault-kind>: <message>"`.

use std::fmt;

/// The category of a runtime or syntax fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// The snippet could not be tokenized or parsed.
    Syntax,
    /// A name was read before it was bound.
    Name,
    /// An operation was applied to a value of the wrong type.
    Type,
    /// A value had the right type but an unacceptable content.
    Value,
    /// Division or modulo by zero.
    ZeroDivision,
    /// A sequence index was out of range.
    Index,
    /// A dict key was missing.
    Key,
    /// An attribute or method does not exist on a value.
    Attribute,
    /// Integer arithmetic overflowed 64 bits.
    Overflow,
    /// The execution fuel budget ran out.
    Timeout,
    /// A value or expression nested deeper than the evaluator allows.
    Recursion,
}

impl FaultKind {
    /// The fault-kind label used in rendered error strings.
    pub fn label(self) -> &'static str {
        match self {
            Self::Syntax => "SyntaxError",
            Self::Name => "NameError",
            Self::Type => "TypeError",
            Self::Value => "ValueError",
            Self::ZeroDivision => "ZeroDivisionError",
            Self::Index => "IndexError",
            Self::Key => "KeyError",
            Self::Attribute => "AttributeError",
            Self::Overflow => "OverflowError",
            Self::Timeout => "TimeoutError",
            Self::Recursion => "RecursionError",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A fault raised while compiling or evaluating a snippet.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Fault {
    /// What went wrong.
    pub kind: FaultKind,
    /// Human-readable detail.
    pub message: String,
}

impl Fault {
    /// Create a fault of the given kind.
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Syntax, message)
    }

    pub fn name(name: &str) -> Self {
        Self::new(FaultKind::Name, format!("name '{name}' is not defined"))
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Type, message)
    }

    pub fn value(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Value, message)
    }

    pub fn zero_division(message: impl Into<String>) -> Self {
        Self::new(FaultKind::ZeroDivision, message)
    }

    pub fn index(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Index, message)
    }

    pub fn key(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Key, message)
    }

    pub fn attribute(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Attribute, message)
    }

    pub fn overflow() -> Self {
        Self::new(FaultKind::Overflow, "integer overflow")
    }
}

/// Convenience alias used throughout the sandbox crate.
pub type Result<T> = std::result::Result<T, Fault>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_division_display() {
        let err = Fault::zero_division("division by zero");
        assert_eq!(err.to_string(), "ZeroDivisionError: division by zero");
    }

    #[test]
    fn name_error_display() {
        let err = Fault::name("y");
        assert_eq!(err.to_string(), "NameError: name 'y' is not defined");
    }

    #[test]
    fn syntax_error_display() {
        let err = Fault::syntax("unexpected ')' on line 2");
        assert_eq!(err.to_string(), "SyntaxError: unexpected ')' on line 2");
    }

    #[test]
    fn overflow_display() {
        assert_eq!(Fault::overflow().to_string(), "OverflowError: integer overflow");
    }

    #[test]
    fn every_label_ends_with_error() {
        let kinds = [
            FaultKind::Syntax,
            FaultKind::Name,
            FaultKind::Type,
            FaultKind::Value,
            FaultKind::ZeroDivision,
            FaultKind::Index,
            FaultKind::Key,
            FaultKind::Attribute,
            FaultKind::Overflow,
            FaultKind::Timeout,
            FaultKind::Recursion,
        ];
        for kind in kinds {
            assert!(kind.label().ends_with("Error"), "{kind:?}");
        }
    }
}
