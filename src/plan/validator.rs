//! 计划校验：Plan 与 Replan 共用
//!
//! 在计划进入执行之前拦截：空计划、step_id 与位置不一致、未注册工具、参数不满足 schema。
//! 通过校验的计划中工具名统一为规范名（别名已解析）。

use crate::core::PlanError;
use crate::plan::Plan;
use crate::tools::{ToolRegistry, ValidationMode};

pub struct PlanValidator<'a> {
    registry: &'a ToolRegistry,
}

impl<'a> PlanValidator<'a> {
    pub fn new(registry: &'a ToolRegistry) -> Self {
        Self { registry }
    }

    /// 收集所有问题后一次性返回
    pub fn validate(&self, mut plan: Plan) -> Result<Plan, PlanError> {
        if plan.steps.is_empty() {
            return Err(PlanError::validation("plan has no steps"));
        }

        let mut issues = Vec::new();
        for (i, step) in plan.steps.iter_mut().enumerate() {
            let position = i as u32 + 1;
            if step.step_id != position {
                issues.push(format!(
                    "step_id {} at position {} (step ids must be 1..n in order)",
                    step.step_id, position
                ));
            }
            let Some(tool) = self.registry.get(&step.tool_type) else {
                issues.push(format!(
                    "step {}: unknown tool '{}' (available: {})",
                    position,
                    step.tool_type,
                    self.registry.tool_names().join(", ")
                ));
                continue;
            };
            if let Err(errs) = tool.validate(&step.params, ValidationMode::Plan) {
                issues.extend(
                    errs.into_iter()
                        .map(|e| format!("step {} ({}): {}", position, tool.name(), e)),
                );
            }
            step.tool_type = tool.name().to_string();
        }

        if issues.is_empty() {
            Ok(plan)
        } else {
            Err(PlanError::Validation { issues })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::ResultSink;
    use crate::plan::{Step, StepParams};
    use crate::tools::geo_registry;
    use serde_json::json;

    fn plan(steps: Vec<(u32, &str, serde_json::Value)>) -> Plan {
        Plan {
            goal: "g".into(),
            estimated_steps: steps.len(),
            steps: steps
                .into_iter()
                .map(|(id, tool, params)| Step {
                    step_id: id,
                    description: tool.into(),
                    tool_type: tool.into(),
                    params: serde_json::from_value::<StepParams>(params).unwrap(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_valid_plan_gets_canonical_names() {
        let registry = geo_registry(ResultSink::new("unused"));
        let p = plan(vec![
            (1, "buffer_filter_tool", json!({"buffer_distance": 300})),
            (2, "slope", json!({"max_slope": 15})),
        ]);
        let validated = PlanValidator::new(&registry).validate(p).unwrap();
        assert_eq!(validated.steps[0].tool_type, "buffer");
    }

    #[test]
    fn test_nonexistent_tool_rejected() {
        let registry = geo_registry(ResultSink::new("unused"));
        let p = plan(vec![(1, "nonexistent_tool", json!({}))]);
        match PlanValidator::new(&registry).validate(p) {
            Err(PlanError::Validation { issues }) => {
                assert!(issues[0].contains("unknown tool 'nonexistent_tool'"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_collects_all_issues() {
        let registry = geo_registry(ResultSink::new("unused"));
        let p = plan(vec![
            (1, "buffer", json!({})),
            (3, "slope", json!({"max_slope": 15})),
        ]);
        match PlanValidator::new(&registry).validate(p) {
            Err(PlanError::Validation { issues }) => assert_eq!(issues.len(), 2),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_plan_rejected() {
        let registry = geo_registry(ResultSink::new("unused"));
        let err = PlanValidator::new(&registry).validate(plan(vec![])).unwrap_err();
        assert!(err.to_string().contains("no steps"));
    }
}
