//! Variable-table validation applied by the commit sink.
//!
//! A table is accepted only when every name is a non-empty IEC identifier,
//! names are unique ignoring case, and every located address is unique and
//! fits the variable's type.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::commit::CommitResponse;
use crate::types::{BaseType, Variable, VariableClass, VariableType};

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern"));
static BIT_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^%[QI]X\d+\.[0-7]$").expect("bit location pattern"));
static WORD_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^%[QIM]W\d+$").expect("word location pattern"));
static DWORD_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^%MD\d+$").expect("dword location pattern"));
static LWORD_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^%ML\d+$").expect("lword location pattern"));

/// Why a variable table was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRejection {
    pub title: String,
    pub message: Option<String>,
}

impl TableRejection {
    fn new(title: &str, message: impl Into<String>) -> Self {
        TableRejection {
            title: title.to_string(),
            message: Some(message.into()),
        }
    }
}

impl From<TableRejection> for CommitResponse {
    fn from(rejection: TableRejection) -> Self {
        CommitResponse::rejected(rejection.title, rejection.message)
    }
}

/// Whether `name` is a valid IEC identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Whether a located address suits the type. An empty location always fits.
pub fn location_fits(location: &str, var_type: &VariableType) -> bool {
    if location.is_empty() {
        return true;
    }
    let VariableType::BaseType { value } = var_type else {
        return false;
    };
    use BaseType::*;
    match value {
        Bool => BIT_LOCATION.is_match(location),
        Int | Uint | Word => WORD_LOCATION.is_match(location),
        Dint | Udint | Real | Dword => DWORD_LOCATION.is_match(location),
        Lint | Ulint | Lreal | Lword => LWORD_LOCATION.is_match(location),
        _ => false,
    }
}

/// Hint listing the addresses accepted for a type.
pub fn location_hint(var_type: &VariableType) -> &'static str {
    use BaseType::*;
    match var_type {
        VariableType::BaseType { value: Bool } => "Valid locations: %QX0.0..7, %IX0.0..7",
        VariableType::BaseType {
            value: Int | Uint | Word,
        } => "Valid locations: %QW0, %IW0, %MW0",
        VariableType::BaseType {
            value: Dint | Udint | Real | Dword,
        } => "Valid locations: %MD0",
        VariableType::BaseType {
            value: Lint | Ulint | Lreal | Lword,
        } => "Valid locations: %ML0",
        _ => "This type cannot be located.",
    }
}

/// Validate a whole variable table.
pub fn validate_variables(variables: &[Variable]) -> Result<(), TableRejection> {
    let mut names = HashSet::new();
    let mut locations = HashSet::new();

    for variable in variables {
        let name = variable.name.as_str();
        if name.is_empty() {
            return Err(TableRejection::new(
                "Variable name is empty.",
                "Please make sure that the name is not empty.",
            ));
        }
        if !is_valid_identifier(name) {
            return Err(TableRejection::new(
                "Variable name is invalid.",
                format!("\"{}\" is not a valid IEC identifier.", name),
            ));
        }
        if !names.insert(name.to_ascii_lowercase()) {
            return Err(TableRejection::new(
                "Variable already exists",
                format!("The name \"{}\" is declared more than once.", name),
            ));
        }

        let location = variable.location.as_str();
        if location.is_empty() {
            continue;
        }
        if !locations.insert(location.to_ascii_uppercase()) {
            return Err(TableRejection::new(
                "Location already exists",
                format!("The location \"{}\" is used more than once.", location),
            ));
        }
        if !location_fits(location, &variable.var_type) {
            return Err(TableRejection::new(
                "Location is invalid.",
                format!(
                    "\"{}\" does not fit {} ({}).",
                    location,
                    variable.var_type,
                    location_hint(&variable.var_type)
                ),
            ));
        }
    }
    Ok(())
}

/// Copy of `variable` retyped to `new_type`, with fields that no longer
/// apply cleared.
///
/// A location that does not fit the new type is dropped. Switching to a
/// derived type also drops the initial value and moves a non-global
/// variable to the local section.
pub fn retype_variable(variable: &Variable, new_type: VariableType) -> Variable {
    let mut updated = variable.clone();
    if !location_fits(&updated.location, &new_type) {
        updated.location.clear();
    }
    if new_type.is_derived() {
        updated.location.clear();
        updated.initial_value = None;
        if updated.class != VariableClass::Global {
            updated.class = VariableClass::Local;
        }
    }
    updated.var_type = new_type;
    updated
}
