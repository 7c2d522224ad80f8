//! 工具参数 schema 与校验
//!
//! 每个工具声明一组参数（类型、是否必填、取值范围、枚举值）和一个链式输入参数。
//! 校验分两种模式：Plan 模式允许链式输入缺失（执行时注入），Execution 模式要求齐全。

use serde_json::{json, Value};

use crate::plan::StepParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    StringList,
}

impl ParamType {
    fn json_type(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::StringList => "array",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::StringList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
        }
    }
}

/// 单个参数的声明
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    /// 允许的取值（String / StringList 的元素）；空表示不限
    pub allowed: Vec<String>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: false,
            minimum: None,
            maximum: None,
            allowed: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn range(mut self, minimum: f64, maximum: f64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    pub fn allowed<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = values.into_iter().map(Into::into).collect();
        self
    }

    fn check(&self, value: &Value, issues: &mut Vec<String>) {
        if !self.param_type.matches(value) {
            issues.push(format!(
                "'{}' must be of type {}, got {}",
                self.name,
                self.param_type.json_type(),
                value
            ));
            return;
        }
        if let Some(n) = value.as_f64() {
            if let Some(min) = self.minimum.filter(|min| n < *min) {
                issues.push(format!("'{}' = {} is below minimum {}", self.name, n, min));
            }
            if let Some(max) = self.maximum.filter(|max| n > *max) {
                issues.push(format!("'{}' = {} exceeds maximum {}", self.name, n, max));
            }
        }
        if self.allowed.is_empty() {
            return;
        }
        let values: Vec<&str> = match value {
            Value::String(s) => vec![s.as_str()],
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        for v in values {
            if !self.allowed.iter().any(|a| a == v) {
                issues.push(format!(
                    "'{}' value '{}' not in [{}]",
                    self.name,
                    v,
                    self.allowed.join(", ")
                ));
            }
        }
    }
}

/// 校验模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// 计划校验：链式输入参数可缺失
    Plan,
    /// 执行前校验：链式输入已注入，必须存在
    Execution,
}

/// 工具的完整参数 schema
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
    /// 由上一步产物自动填充的参数名
    pub chained_input: String,
}

impl ToolSchema {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// 返回所有问题；空表示通过
    pub fn validate(&self, params: &StepParams, mode: ValidationMode) -> Result<(), Vec<String>> {
        let mut issues = Vec::new();

        for key in params.keys() {
            if self.param(key).is_none() {
                issues.push(format!("unknown parameter '{}' for tool '{}'", key, self.name));
            }
        }

        for param in &self.params {
            let is_chained = param.name == self.chained_input;
            match params.get(&param.name) {
                None | Some(Value::Null) if is_chained && mode == ValidationMode::Plan => {}
                None | Some(Value::Null) => {
                    if param.required || is_chained {
                        issues.push(format!("missing required parameter '{}'", param.name));
                    }
                }
                Some(value) => param.check(value, &mut issues),
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }

    /// 注入 prompt 的 JSON 描述
    pub fn to_prompt_json(&self) -> Value {
        let mut properties = serde_json::Map::new();
        for p in &self.params {
            let mut prop = json!({
                "type": p.param_type.json_type(),
                "description": p.description,
            });
            if p.param_type == ParamType::StringList {
                prop["items"] = json!({ "type": "string" });
            }
            if let Some(min) = p.minimum {
                prop["minimum"] = json!(min);
            }
            if let Some(max) = p.maximum {
                prop["maximum"] = json!(max);
            }
            if !p.allowed.is_empty() {
                prop["enum"] = json!(p.allowed);
            }
            properties.insert(p.name.clone(), prop);
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required && p.name != self.chained_input)
            .map(|p| p.name.as_str())
            .collect();
        json!({
            "name": self.name,
            "description": self.description,
            "chained_input": self.chained_input,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
            }
        })
    }
}
