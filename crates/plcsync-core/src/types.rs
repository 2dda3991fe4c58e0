//! IEC 61131-3 variable model shared by every engine component.
//!
//! A [`Variable`] is the row of a declaration table. Its [`VariableType`] is a
//! tagged union mirroring how declarations are written:
//!
//! - `base-type`: one of the elementary [`BaseType`]s (`BOOL`, `INT`, ...)
//! - `array`: `ARRAY[l..u, ...] OF <element>`
//! - `user-data-type`: a name resolved later against data types or
//!   function-block POUs (`Motor`, `TON`, ...)
//!
//! Names are compared case-insensitively everywhere, following IEC rules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================================
// Name Helpers
// ============================================================================

/// Case-insensitive name equality used for every IEC identifier comparison.
pub fn same_name(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Find a variable by name (case-insensitive) in declaration order.
pub fn find_variable<'a>(variables: &'a [Variable], name: &str) -> Option<&'a Variable> {
    variables.iter().find(|v| same_name(&v.name, name))
}

// ============================================================================
// Base Types
// ============================================================================

/// Elementary IEC data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseType {
    Bool,
    Sint,
    Int,
    Dint,
    Lint,
    Usint,
    Uint,
    Udint,
    Ulint,
    Real,
    Lreal,
    Time,
    Date,
    Tod,
    Dt,
    String,
    Byte,
    Word,
    Dword,
    Lword,
}

impl BaseType {
    /// Every base type, in declaration-menu order.
    pub const ALL: [BaseType; 20] = [
        BaseType::Bool,
        BaseType::Sint,
        BaseType::Int,
        BaseType::Dint,
        BaseType::Lint,
        BaseType::Usint,
        BaseType::Uint,
        BaseType::Udint,
        BaseType::Ulint,
        BaseType::Real,
        BaseType::Lreal,
        BaseType::Time,
        BaseType::Date,
        BaseType::Tod,
        BaseType::Dt,
        BaseType::String,
        BaseType::Byte,
        BaseType::Word,
        BaseType::Dword,
        BaseType::Lword,
    ];

    /// Upper-case IEC spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            BaseType::Bool => "BOOL",
            BaseType::Sint => "SINT",
            BaseType::Int => "INT",
            BaseType::Dint => "DINT",
            BaseType::Lint => "LINT",
            BaseType::Usint => "USINT",
            BaseType::Uint => "UINT",
            BaseType::Udint => "UDINT",
            BaseType::Ulint => "ULINT",
            BaseType::Real => "REAL",
            BaseType::Lreal => "LREAL",
            BaseType::Time => "TIME",
            BaseType::Date => "DATE",
            BaseType::Tod => "TOD",
            BaseType::Dt => "DT",
            BaseType::String => "STRING",
            BaseType::Byte => "BYTE",
            BaseType::Word => "WORD",
            BaseType::Dword => "DWORD",
            BaseType::Lword => "LWORD",
        }
    }

    /// Parse a base type name, ignoring case. Returns `None` for anything else.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        BaseType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Variable Types
// ============================================================================

/// Declared type of a variable or structure field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "definition", rename_all = "kebab-case")]
pub enum VariableType {
    /// Elementary type.
    BaseType { value: BaseType },
    /// Inline array declaration.
    #[serde(rename_all = "camelCase")]
    Array {
        /// Element type name (a base type or a user data type).
        element_type: String,
        /// Dimensions in `lower..upper` form.
        dimensions: Vec<String>,
    },
    /// Structure, enumeration, array alias or function-block instance, by name.
    UserDataType { value: String },
}

impl VariableType {
    /// Shorthand for a base type.
    pub fn base(value: BaseType) -> Self {
        VariableType::BaseType { value }
    }

    /// Shorthand for a named (derived) type.
    pub fn derived(name: impl Into<String>) -> Self {
        VariableType::UserDataType { value: name.into() }
    }

    /// Shorthand for an inline array.
    pub fn array(element_type: impl Into<String>, dimensions: &[&str]) -> Self {
        VariableType::Array {
            element_type: element_type.into(),
            dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
        }
    }

    /// The type's textual value, as written in a declaration.
    ///
    /// Base types are upper-cased; derived names keep their spelling.
    pub fn value(&self) -> String {
        match self {
            VariableType::BaseType { value } => value.as_str().to_string(),
            VariableType::Array {
                element_type,
                dimensions,
            } => {
                let element = BaseType::parse(element_type)
                    .map(|b| b.as_str().to_string())
                    .unwrap_or_else(|| element_type.clone());
                format!("ARRAY[{}] OF {}", dimensions.join(", "), element)
            }
            VariableType::UserDataType { value } => value.clone(),
        }
    }

    /// Name used to resolve the type against data types and POUs.
    ///
    /// For arrays this is `None`: arrays are never looked up by name.
    pub fn type_name(&self) -> Option<&str> {
        match self {
            VariableType::BaseType { value } => Some(value.as_str()),
            VariableType::Array { .. } => None,
            VariableType::UserDataType { value } => Some(value),
        }
    }

    /// Whether this is exactly the given base type.
    pub fn is_base(&self, base: BaseType) -> bool {
        matches!(self, VariableType::BaseType { value } if *value == base)
    }

    /// Whether the type is a derived (user data type) reference.
    pub fn is_derived(&self) -> bool {
        matches!(self, VariableType::UserDataType { .. })
    }

    /// Whether the type is an inline array.
    pub fn is_array(&self) -> bool {
        matches!(self, VariableType::Array { .. })
    }

    /// Case-insensitive comparison of the type value text.
    pub fn same_as(&self, other: &VariableType) -> bool {
        self.value().trim().eq_ignore_ascii_case(other.value().trim())
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value())
    }
}

/// Error returned when a type specification cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid type specification '{spec}': {reason}")]
pub struct TypeSpecError {
    pub spec: String,
    pub reason: String,
}

impl FromStr for VariableType {
    type Err = TypeSpecError;

    /// Parse `BOOL`, `Motor`, or `ARRAY[1..10, 0..3] OF INT`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec = s.trim();
        let err = |reason: &str| TypeSpecError {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        if spec.is_empty() {
            return Err(err("empty type"));
        }

        let upper = spec.to_ascii_uppercase();
        if upper.starts_with("ARRAY") && upper[5..].trim_start().starts_with('[') {
            let open = spec.find('[').ok_or_else(|| err("missing '['"))?;
            let close = spec.find(']').ok_or_else(|| err("missing ']'"))?;
            if close < open {
                return Err(err("mismatched brackets"));
            }
            let dimensions: Vec<String> = spec[open + 1..close]
                .split(',')
                .map(|d| d.trim().to_string())
                .collect();
            for dim in &dimensions {
                if parse_dimension(dim).is_none() {
                    return Err(err("dimensions must look like 'lower..upper'"));
                }
            }
            let rest = spec[close + 1..].trim();
            let element = rest
                .strip_prefix("OF")
                .or_else(|| rest.strip_prefix("of"))
                .or_else(|| rest.strip_prefix("Of"))
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .ok_or_else(|| err("missing 'OF <element type>'"))?;
            return Ok(VariableType::Array {
                element_type: element.to_string(),
                dimensions,
            });
        }

        if let Some(base) = BaseType::parse(spec) {
            return Ok(VariableType::base(base));
        }

        if !spec
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(err("not an identifier"));
        }
        Ok(VariableType::derived(spec))
    }
}

/// Parse an array dimension `lower..upper` into its inclusive bounds.
///
/// A bare length `n` is treated as `0..n-1`.
pub fn parse_dimension(dimension: &str) -> Option<(i64, i64)> {
    let dimension = dimension.trim();
    if let Some((lower, upper)) = dimension.split_once("..") {
        let lower: i64 = lower.trim().parse().ok()?;
        let upper: i64 = upper.trim().parse().ok()?;
        if upper < lower {
            return None;
        }
        return Some((lower, upper));
    }
    let len: i64 = dimension.parse().ok()?;
    if len <= 0 {
        return None;
    }
    Some((0, len - 1))
}

// ============================================================================
// Variable Class
// ============================================================================

/// Declaration section a variable belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VariableClass {
    Input,
    Output,
    InOut,
    Local,
    External,
    Temp,
    Global,
}

impl VariableClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableClass::Input => "input",
            VariableClass::Output => "output",
            VariableClass::InOut => "inOut",
            VariableClass::Local => "local",
            VariableClass::External => "external",
            VariableClass::Temp => "temp",
            VariableClass::Global => "global",
        }
    }
}

impl fmt::Display for VariableClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Variable
// ============================================================================

/// One declared variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    /// Identifier, unique per scope (case-insensitive).
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub var_type: VariableType,
    /// Declaration section.
    pub class: VariableClass,
    /// Located address such as `%QX0.1`; empty when unlocated.
    #[serde(default)]
    pub location: String,
    /// Initial value expression, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_value: Option<String>,
    /// Free-form documentation.
    #[serde(default)]
    pub documentation: String,
}

impl Variable {
    /// Create an unlocated variable without initial value or documentation.
    pub fn new(name: impl Into<String>, var_type: VariableType, class: VariableClass) -> Self {
        Variable {
            name: name.into(),
            var_type,
            class,
            location: String::new(),
            initial_value: None,
            documentation: String::new(),
        }
    }

    /// Local variable of a base type.
    pub fn local(name: impl Into<String>, base: BaseType) -> Self {
        Variable::new(name, VariableType::base(base), VariableClass::Local)
    }

    /// Set the located address.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Set the initial value.
    pub fn with_initial_value(mut self, value: impl Into<String>) -> Self {
        self.initial_value = Some(value.into());
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
