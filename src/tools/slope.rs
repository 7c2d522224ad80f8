//! 坡度过滤：保留坡度落在 [min_slope, max_slope]（度，0-90，含边界）内的区域

use async_trait::async_trait;

use crate::geo::ResultSink;
use crate::plan::StepParams;
use crate::tools::filter::{self, CHAINED_INPUT};
use crate::tools::{Artifact, ParamSpec, ParamType, Tool, ToolSchema};

pub struct SlopeFilterTool {
    sink: ResultSink,
}

impl SlopeFilterTool {
    pub fn new(sink: ResultSink) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Tool for SlopeFilterTool {
    fn name(&self) -> &str {
        "slope"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "slope".into(),
            description: "Keep regions whose terrain slope in degrees lies within the given range; give min, max or both".into(),
            params: vec![
                filter::chained_input_spec(),
                ParamSpec::new("min_slope", ParamType::Number, "Lower bound in degrees").range(0.0, 90.0),
                ParamSpec::new("max_slope", ParamType::Number, "Upper bound in degrees (inclusive)").range(0.0, 90.0),
            ],
            chained_input: CHAINED_INPUT.into(),
        }
    }

    fn aliases(&self) -> &[&'static str] {
        &["slope_filter", "slope_filter_tool"]
    }

    fn check_constraints(&self, params: &StepParams) -> Result<(), String> {
        filter::check_bounds(params, "min_slope", "max_slope")
    }

    async fn execute(&self, params: &StepParams) -> Result<Artifact, String> {
        let min = filter::number(params, "min_slope").unwrap_or(0.0);
        let max = filter::number(params, "max_slope").unwrap_or(90.0);
        filter::run_filter(&self.sink, "slope", params, |r| {
            r.slope_deg >= min && r.slope_deg <= max
        })
        .await
    }
}
