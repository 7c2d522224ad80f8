//! 高程过滤：保留高程落在 [min_elevation, max_elevation] 内的区域

use async_trait::async_trait;

use crate::geo::ResultSink;
use crate::plan::StepParams;
use crate::tools::filter::{self, CHAINED_INPUT};
use crate::tools::{Artifact, ParamSpec, ParamType, Tool, ToolSchema};

pub struct ElevationFilterTool {
    sink: ResultSink,
}

impl ElevationFilterTool {
    pub fn new(sink: ResultSink) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Tool for ElevationFilterTool {
    fn name(&self) -> &str {
        "elevation"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "elevation".into(),
            description: "Keep regions whose elevation lies within the given range (meters); give min, max or both".into(),
            params: vec![
                filter::chained_input_spec(),
                ParamSpec::new("min_elevation", ParamType::Number, "Lower bound in meters")
                    .range(-500.0, 9000.0),
                ParamSpec::new("max_elevation", ParamType::Number, "Upper bound in meters")
                    .range(-500.0, 9000.0),
            ],
            chained_input: CHAINED_INPUT.into(),
        }
    }

    fn aliases(&self) -> &[&'static str] {
        &["elevation_filter", "elevation_filter_tool"]
    }

    fn check_constraints(&self, params: &StepParams) -> Result<(), String> {
        filter::check_bounds(params, "min_elevation", "max_elevation")
    }

    async fn execute(&self, params: &StepParams) -> Result<Artifact, String> {
        let min = filter::number(params, "min_elevation").unwrap_or(f64::NEG_INFINITY);
        let max = filter::number(params, "max_elevation").unwrap_or(f64::INFINITY);
        filter::run_filter(&self.sink, "elevation", params, |r| {
            r.elevation_m >= min && r.elevation_m <= max
        })
        .await
    }
}
