//! Formula declarations and batch requests

use serde::{Deserialize, Serialize};
use tally_core::{CoerceResult, Record, TypeTag};

/// A declared input of a formula: a variable name and the type it is coerced to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputRef {
    /// Field or prior output the value is read from
    pub var_name: String,
    /// Declared type tag, kept as written so unknown tags can be reported
    pub var_type: String,
}

impl InputRef {
    /// Create an input with a known type tag
    pub fn new(var_name: impl Into<String>, var_type: TypeTag) -> Self {
        Self {
            var_name: var_name.into(),
            var_type: var_type.as_str().to_string(),
        }
    }

    /// Create an input with an arbitrary, possibly unsupported, type tag
    pub fn with_raw_type(var_name: impl Into<String>, var_type: impl Into<String>) -> Self {
        Self {
            var_name: var_name.into(),
            var_type: var_type.into(),
        }
    }

    /// Parse the declared type tag
    pub fn type_tag(&self) -> CoerceResult<TypeTag> {
        self.var_type.parse()
    }
}

/// A named computation: `output_var = expression(inputs)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Formula {
    /// Name of the produced column
    pub output_var: String,
    /// Expression text
    pub expression: String,
    /// Declared inputs, coerced before evaluation
    #[serde(default)]
    pub inputs: Vec<InputRef>,
}

impl Formula {
    /// Create a formula without inputs
    pub fn new(output_var: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            output_var: output_var.into(),
            expression: expression.into(),
            inputs: Vec::new(),
        }
    }

    /// Add an input (builder style)
    pub fn input(mut self, var_name: impl Into<String>, var_type: TypeTag) -> Self {
        self.inputs.push(InputRef::new(var_name, var_type));
        self
    }

    /// Add an input with an arbitrary type tag (builder style)
    pub fn raw_input(mut self, var_name: impl Into<String>, var_type: impl Into<String>) -> Self {
        self.inputs.push(InputRef::with_raw_type(var_name, var_type));
        self
    }

    /// Names of the declared inputs, in declaration order
    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.iter().map(|i| i.var_name.as_str()).collect()
    }

    /// Whether the formula lists its own output among its inputs
    pub fn references_itself(&self) -> bool {
        self.inputs.iter().any(|i| i.var_name == self.output_var)
    }
}

/// A batch: records plus the ordered formulas to apply to each of them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormulaRequest {
    pub data: Vec<Record>,
    pub formulas: Vec<Formula>,
}

impl FormulaRequest {
    pub fn new(data: Vec<Record>, formulas: Vec<Formula>) -> Self {
        Self { data, formulas }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tally_core::{CoercionError, Value};

    #[test]
    fn test_builder() {
        let formula = Formula::new("total", "price * qty")
            .input("price", TypeTag::Currency)
            .input("qty", TypeTag::Number);

        assert_eq!(formula.input_names(), vec!["price", "qty"]);
        assert_eq!(formula.inputs[0].var_type, "currency");
        assert!(!formula.references_itself());
    }

    #[test]
    fn test_references_itself() {
        let formula = Formula::new("x", "x + 1").input("x", TypeTag::Number);
        assert!(formula.references_itself());
    }

    #[test]
    fn test_type_tag() {
        assert_eq!(
            InputRef::new("a", TypeTag::Percentage).type_tag(),
            Ok(TypeTag::Percentage)
        );
        assert_eq!(
            InputRef::with_raw_type("a", "complex").type_tag(),
            Err(CoercionError::UnsupportedType("complex".into()))
        );
    }

    #[test]
    fn test_deserialize_request() {
        let json = r#"{
            "data": [{"id": 1, "fieldA": 10}, {"id": 2, "fieldA": "20"}],
            "formulas": [
                {
                    "outputVar": "result",
                    "expression": "fieldA + 10",
                    "inputs": [{"varName": "fieldA", "varType": "number"}]
                }
            ]
        }"#;

        let request: FormulaRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.data.len(), 2);
        assert_eq!(request.data[1].get("fieldA"), Some(&Value::string("20")));
        assert_eq!(
            request.formulas,
            vec![Formula::new("result", "fieldA + 10").input("fieldA", TypeTag::Number)]
        );
    }

    #[test]
    fn test_inputs_default_to_empty() {
        let formula: Formula =
            serde_json::from_str(r#"{"outputVar": "one", "expression": "1"}"#).unwrap();
        assert!(formula.inputs.is_empty());
    }

    #[test]
    fn test_nested_values_are_rejected() {
        let json = r#"{"data": [{"id": 1, "tags": [1, 2]}], "formulas": []}"#;
        assert!(serde_json::from_str::<FormulaRequest>(json).is_err());
    }

    #[test]
    fn test_serialize_uses_camel_case() {
        let formula = Formula::new("y", "x * 2").input("x", TypeTag::Number);
        let json = serde_json::to_value(&formula).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "outputVar": "y",
                "expression": "x * 2",
                "inputs": [{"varName": "x", "varType": "number"}]
            })
        );
    }
}
