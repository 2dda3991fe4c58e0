//! Expected-type model for graphical node slots.
//!
//! A node slot (a contact, a coil, a block pin) constrains the type of the
//! variable bound to it. Pins of standard library blocks are frequently
//! declared with IEC generic types (`ANY_NUM`, `ANY_BIT`, ...), so the check
//! understands the generic families as well as exact names.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{BaseType, VariableType};

/// IEC 61131-3 generic type families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenericType {
    AnyBit,
    AnyInt,
    AnyReal,
    AnyNum,
    AnyDate,
    AnyString,
    AnyMagnitude,
    AnyElementary,
}

impl GenericType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenericType::AnyBit => "ANY_BIT",
            GenericType::AnyInt => "ANY_INT",
            GenericType::AnyReal => "ANY_REAL",
            GenericType::AnyNum => "ANY_NUM",
            GenericType::AnyDate => "ANY_DATE",
            GenericType::AnyString => "ANY_STRING",
            GenericType::AnyMagnitude => "ANY_MAGNITUDE",
            GenericType::AnyElementary => "ANY_ELEMENTARY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        [
            GenericType::AnyBit,
            GenericType::AnyInt,
            GenericType::AnyReal,
            GenericType::AnyNum,
            GenericType::AnyDate,
            GenericType::AnyString,
            GenericType::AnyMagnitude,
            GenericType::AnyElementary,
        ]
        .into_iter()
        .find(|g| g.as_str().eq_ignore_ascii_case(s))
    }

    /// Base types belonging to the family.
    pub fn members(&self) -> Vec<BaseType> {
        use BaseType::*;
        match self {
            GenericType::AnyBit => vec![Bool, Byte, Word, Dword, Lword],
            GenericType::AnyInt => vec![Sint, Int, Dint, Lint, Usint, Uint, Udint, Ulint],
            GenericType::AnyReal => vec![Real, Lreal],
            GenericType::AnyNum => {
                let mut m = GenericType::AnyInt.members();
                m.extend(GenericType::AnyReal.members());
                m
            }
            GenericType::AnyDate => vec![Date, Tod, Dt],
            GenericType::AnyString => vec![String],
            GenericType::AnyMagnitude => {
                let mut m = GenericType::AnyNum.members();
                m.push(Time);
                m
            }
            GenericType::AnyElementary => BaseType::ALL.to_vec(),
        }
    }

    pub fn contains(&self, base: BaseType) -> bool {
        self.members().contains(&base)
    }
}

/// What a node slot requires of the variable bound to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedType {
    /// No constraint at all.
    Unconstrained,
    /// Declared as `ANY`: every type fits.
    Any,
    /// A generic family.
    Generic(GenericType),
    /// An exact type name (compared case-insensitively).
    Exact(String),
}

/// Result of checking a type against an [`ExpectedType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compatibility {
    pub is_compatible: bool,
    pub message: Option<String>,
}

impl Compatibility {
    fn ok() -> Self {
        Compatibility {
            is_compatible: true,
            message: None,
        }
    }

    fn mismatch(message: String) -> Self {
        Compatibility {
            is_compatible: false,
            message: Some(message),
        }
    }
}

impl ExpectedType {
    /// Exactly `BOOL`, the constraint of contacts and coils.
    pub fn bool() -> Self {
        ExpectedType::Exact(BaseType::Bool.as_str().to_string())
    }

    /// Interpret a declared pin type. Empty text means unconstrained.
    pub fn parse(declared: &str) -> Self {
        let declared = declared.trim();
        if declared.is_empty() {
            return ExpectedType::Unconstrained;
        }
        if declared.eq_ignore_ascii_case("ANY") {
            return ExpectedType::Any;
        }
        if let Some(generic) = GenericType::parse(declared) {
            return ExpectedType::Generic(generic);
        }
        ExpectedType::Exact(declared.to_ascii_uppercase())
    }

    /// Text shown to the user; empty for unconstrained slots.
    pub fn label(&self) -> String {
        match self {
            ExpectedType::Unconstrained => String::new(),
            ExpectedType::Any => "ANY".to_string(),
            ExpectedType::Generic(g) => g.as_str().to_string(),
            ExpectedType::Exact(name) => name.clone(),
        }
    }

    /// Check whether `actual` satisfies this expectation.
    pub fn check(&self, actual: &VariableType) -> Compatibility {
        let actual_text = actual.value().to_ascii_uppercase();
        match self {
            ExpectedType::Unconstrained | ExpectedType::Any => Compatibility::ok(),
            ExpectedType::Generic(generic) => {
                let fits = matches!(
                    actual,
                    VariableType::BaseType { value } if generic.contains(*value)
                );
                if fits {
                    Compatibility::ok()
                } else {
                    let names: Vec<&str> = generic.members().iter().map(|b| b.as_str()).collect();
                    Compatibility::mismatch(format!("Expected one of: {}", names.join(", ")))
                }
            }
            ExpectedType::Exact(expected) => {
                if actual_text.trim() == expected.trim().to_ascii_uppercase() {
                    Compatibility::ok()
                } else {
                    Compatibility::mismatch(format!(
                        "Expected: {}, Got: {}",
                        expected.to_ascii_uppercase(),
                        actual_text
                    ))
                }
            }
        }
    }
}

impl fmt::Display for ExpectedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
