//! 链式输入推断：(step, 上一步产物) → 实际参数
//!
//! 纯函数，不做 I/O；只在链式参数缺失、为 null 或空串时填充，显式给出的值保持不变。

use serde_json::Value;

use crate::plan::{Step, StepParams};
use crate::tools::ArtifactRef;

pub fn resolve_params(step: &Step, chained_input: &str, prior: &ArtifactRef) -> StepParams {
    let mut params = step.params.clone();
    let missing = match params.get(chained_input) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    };
    if missing {
        params.insert(
            chained_input.to_string(),
            Value::String(prior.as_str().to_string()),
        );
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(params: serde_json::Value) -> Step {
        Step {
            step_id: 2,
            description: "slope".into(),
            tool_type: "slope".into(),
            params: serde_json::from_value(params).unwrap(),
        }
    }

    #[test]
    fn test_injects_when_absent_null_or_empty() {
        let prior = ArtifactRef::new("results/buffer_1.json");
        for params in [
            json!({"max_slope": 15}),
            json!({"max_slope": 15, "input_geojson_path": null}),
            json!({"max_slope": 15, "input_geojson_path": "  "}),
        ] {
            let resolved = resolve_params(&step(params), "input_geojson_path", &prior);
            assert_eq!(resolved["input_geojson_path"], "results/buffer_1.json");
            assert_eq!(resolved["max_slope"], 15);
        }
    }

    #[test]
    fn test_explicit_value_kept_and_step_untouched() {
        let s = step(json!({"input_geojson_path": "custom.json"}));
        let resolved = resolve_params(&s, "input_geojson_path", &ArtifactRef::new("prior.json"));
        assert_eq!(resolved["input_geojson_path"], "custom.json");

        let s = step(json!({}));
        let _ = resolve_params(&s, "input_geojson_path", &ArtifactRef::new("prior.json"));
        assert!(s.params.is_empty());
    }
}
