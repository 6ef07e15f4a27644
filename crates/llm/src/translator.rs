//! Tool Schema Translator
//!
//! Converts provider-neutral [`ToolDefinition`]s into the tool-declaration
//! shape each backend expects. Translation is pure, total, and keeps the
//! input order.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::types::{LlmError, LlmResult, ParameterSchema, ToolDefinition};

/// Wire shape of a tool declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolDialect {
    /// `{"type":"function","function":{name, description, parameters}}`
    /// (OpenAI, DeepSeek, GLM)
    OpenAiFunctions,
    /// `{name, description, input_schema}` (Anthropic)
    AnthropicTools,
}

/// Translate a list of definitions into the given dialect.
pub fn translate(dialect: ToolDialect, tools: &[ToolDefinition]) -> Vec<Value> {
    match dialect {
        ToolDialect::OpenAiFunctions => to_openai_tools(tools),
        ToolDialect::AnthropicTools => to_anthropic_tools(tools),
    }
}

pub fn to_openai_tools(tools: &[ToolDefinition]) -> Vec<Value> {
    tools.iter().map(tool_to_openai).collect()
}

pub fn to_anthropic_tools(tools: &[ToolDefinition]) -> Vec<Value> {
    tools.iter().map(tool_to_anthropic).collect()
}

fn tool_to_openai(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": schema_to_json(&tool.input_schema),
        }
    })
}

fn tool_to_anthropic(tool: &ToolDefinition) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": schema_to_json(&tool.input_schema),
    })
}

/// Render a schema as JSON Schema.
///
/// Objects always carry `properties` and a `required` array, even when empty,
/// since some backends reject object schemas without them.
pub fn schema_to_json(schema: &ParameterSchema) -> Value {
    let mut out = Map::new();
    out.insert("type".to_string(), json!(schema.schema_type));
    if let Some(description) = &schema.description {
        out.insert("description".to_string(), json!(description));
    }
    if let Some(values) = &schema.enum_values {
        out.insert("enum".to_string(), json!(values));
    }
    if let Some(items) = &schema.items {
        out.insert("items".to_string(), schema_to_json(items));
    }
    if schema.schema_type == "object" {
        let properties: Map<String, Value> = schema
            .properties
            .iter()
            .flatten()
            .map(|(name, prop)| (name.clone(), schema_to_json(prop)))
            .collect();
        out.insert("properties".to_string(), Value::Object(properties));
        out.insert("required".to_string(), json!(schema.required_fields()));
    }
    Value::Object(out)
}

/// Parse wire declarations back into neutral definitions.
pub fn from_wire(dialect: ToolDialect, values: &[Value]) -> LlmResult<Vec<ToolDefinition>> {
    values
        .iter()
        .map(|value| {
            let (decl, schema_key) = match dialect {
                ToolDialect::OpenAiFunctions => (&value["function"], "parameters"),
                ToolDialect::AnthropicTools => (value, "input_schema"),
            };
            let name = decl["name"].as_str().ok_or_else(|| LlmError::ParseError {
                message: format!("tool declaration without name: {}", value),
            })?;
            Ok(ToolDefinition {
                name: name.to_string(),
                description: decl["description"].as_str().unwrap_or_default().to_string(),
                input_schema: schema_from_json(&decl[schema_key])?,
            })
        })
        .collect()
}

fn schema_from_json(value: &Value) -> LlmResult<ParameterSchema> {
    let schema_type = value["type"]
        .as_str()
        .ok_or_else(|| LlmError::ParseError {
            message: format!("schema without type: {}", value),
        })?
        .to_string();

    let properties = match value.get("properties").and_then(Value::as_object) {
        Some(props) => {
            let mut map = BTreeMap::new();
            for (name, prop) in props {
                map.insert(name.clone(), schema_from_json(prop)?);
            }
            Some(map)
        }
        None => None,
    };
    let strings = |key: &str| {
        value.get(key).and_then(Value::as_array).map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
    };
    let items = match value.get("items") {
        Some(items) => Some(Box::new(schema_from_json(items)?)),
        None => None,
    };

    Ok(ParameterSchema {
        schema_type,
        description: value["description"].as_str().map(str::to_string),
        properties,
        required: strings("required"),
        items,
        enum_values: strings("enum"),
    })
}
