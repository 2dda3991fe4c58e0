//! JSON declaration parser.
//!
//! The CLI accepts a variable table as a JSON array of declarations:
//!
//! ```json
//! [
//!   { "name": "Start", "type": "BOOL", "location": "%IX0.0" },
//!   { "name": "Speeds", "type": "ARRAY[1..4] OF INT", "class": "output" },
//!   { "name": "M1", "type": "Motor", "initialValue": "(speed := 0)" }
//! ]
//! ```
//!
//! `type` takes the same spelling as a textual declaration. Derived types
//! must name a data type or function block visible in the parse context.

use serde::Deserialize;

use plcsync_core::commit::{DeclarationParser, ParseContext, ParseError};
use plcsync_core::project::PouKind;
use plcsync_core::types::{same_name, BaseType, Variable, VariableClass, VariableType};

/// One entry of the JSON declaration array.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Declaration {
    name: String,
    #[serde(rename = "type")]
    type_spec: String,
    #[serde(default = "default_class")]
    class: VariableClass,
    #[serde(default)]
    location: String,
    #[serde(default)]
    initial_value: Option<String>,
    #[serde(default)]
    documentation: String,
}

fn default_class() -> VariableClass {
    VariableClass::Local
}

/// Parses declarations written as a JSON array.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDeclarationParser;

impl JsonDeclarationParser {
    fn resolve_type(
        &self,
        spec: &str,
        context: &ParseContext<'_>,
    ) -> Result<VariableType, String> {
        let var_type: VariableType = spec.parse().map_err(|e| format!("{}", e))?;
        let named = match &var_type {
            VariableType::BaseType { .. } => None,
            VariableType::Array { element_type, .. } => {
                BaseType::parse(element_type).is_none().then_some(element_type.as_str())
            }
            VariableType::UserDataType { value } => Some(value.as_str()),
        };
        match named {
            Some(name) if !is_known_type(name, context) => Err(format!("unknown type '{}'", name)),
            _ => Ok(var_type),
        }
    }
}

fn is_known_type(name: &str, context: &ParseContext<'_>) -> bool {
    context.data_types.iter().any(|d| same_name(&d.name, name))
        || context
            .pous
            .iter()
            .chain(context.libraries.iter().flat_map(|l| l.pous.iter()))
            .any(|p| p.kind == PouKind::FunctionBlock && same_name(&p.name, name))
}

impl DeclarationParser for JsonDeclarationParser {
    fn parse(&self, text: &str, context: &ParseContext<'_>) -> Result<Vec<Variable>, ParseError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let declarations: Vec<Declaration> = serde_json::from_str(text).map_err(|e| {
            ParseError::at_line(e.line() as u32, e.to_string())
        })?;

        declarations
            .into_iter()
            .enumerate()
            .map(|(index, decl)| {
                let var_type = self.resolve_type(&decl.type_spec, context).map_err(|reason| {
                    ParseError::new(format!(
                        "declaration {} ('{}'): {}",
                        index + 1,
                        decl.name,
                        reason
                    ))
                })?;
                Ok(Variable {
                    name: decl.name,
                    var_type,
                    class: decl.class,
                    location: decl.location,
                    initial_value: decl.initial_value,
                    documentation: decl.documentation,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plcsync_core::project::{BodyLanguage, DataType, Pou, Project, StructField};

    fn project() -> Project {
        let mut project = Project::new("p");
        project.data_types.push(DataType::structure(
            "Motor",
            vec![StructField::new("speed", VariableType::base(BaseType::Int))],
        ));
        project
            .pous
            .push(Pou::new("Debounce", PouKind::FunctionBlock, BodyLanguage::St));
        project
    }

    fn parse(text: &str) -> Result<Vec<Variable>, ParseError> {
        let project = project();
        JsonDeclarationParser.parse(text, &ParseContext::from_project(&project))
    }

    #[test]
    fn parses_declarations() {
        let vars = parse(
            r#"[
                {"name": "Start", "type": "BOOL", "location": "%IX0.0"},
                {"name": "Speeds", "type": "ARRAY[1..4] OF INT", "class": "output"},
                {"name": "M1", "type": "motor", "initialValue": "(speed := 0)"},
                {"name": "Db", "type": "Debounce"}
            ]"#,
        )
        .unwrap();
        assert_eq!(vars.len(), 4);
        assert_eq!(vars[0].var_type, VariableType::base(BaseType::Bool));
        assert_eq!(vars[0].class, VariableClass::Local);
        assert_eq!(vars[0].location, "%IX0.0");
        assert!(vars[1].var_type.is_array());
        assert_eq!(vars[1].class, VariableClass::Output);
        assert_eq!(vars[2].initial_value.as_deref(), Some("(speed := 0)"));
        assert!(vars[3].var_type.is_derived());
    }

    #[test]
    fn empty_text_is_empty_table() {
        assert!(parse("  \n").unwrap().is_empty());
    }

    #[test]
    fn json_errors_carry_line() {
        let err = parse("[\n  {\"name\": \"A\",\n  \"type\": }\n]").unwrap_err();
        assert_eq!(err.line, Some(3));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = parse(r#"[{"name": "X", "type": "Pump"}]"#).unwrap_err();
        assert_eq!(err.message, "declaration 1 ('X'): unknown type 'Pump'");
        let err = parse(r#"[{"name": "Y", "type": "ARRAY[0..1] OF Pump"}]"#).unwrap_err();
        assert!(err.message.contains("unknown type 'Pump'"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(parse(r#"[{"name": "X", "type": "BOOL", "kind": "x"}]"#).is_err());
    }
}
