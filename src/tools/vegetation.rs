//! 地表覆盖过滤：保留地表类型在 land_cover_types 中的区域

use async_trait::async_trait;

use crate::geo::{ResultSink, LAND_COVER_TYPES};
use crate::plan::StepParams;
use crate::tools::filter::{self, CHAINED_INPUT};
use crate::tools::{Artifact, ParamSpec, ParamType, Tool, ToolSchema};

pub struct VegetationFilterTool {
    sink: ResultSink,
}

impl VegetationFilterTool {
    pub fn new(sink: ResultSink) -> Self {
        Self { sink }
    }
}

fn requested_types(params: &StepParams) -> Vec<String> {
    params
        .get("land_cover_types")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl Tool for VegetationFilterTool {
    fn name(&self) -> &str {
        "vegetation"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "vegetation".into(),
            description: "Keep regions whose land cover is one of the given types".into(),
            params: vec![
                filter::chained_input_spec(),
                ParamSpec::new("land_cover_types", ParamType::StringList, "Land cover classes to keep")
                    .required()
                    .allowed(LAND_COVER_TYPES.iter().copied()),
            ],
            chained_input: CHAINED_INPUT.into(),
        }
    }

    fn aliases(&self) -> &[&'static str] {
        &["vegetation_filter", "vegetation_filter_tool", "land_cover"]
    }

    fn check_constraints(&self, params: &StepParams) -> Result<(), String> {
        if requested_types(params).is_empty() {
            return Err("'land_cover_types' must list at least one class".to_string());
        }
        Ok(())
    }

    async fn execute(&self, params: &StepParams) -> Result<Artifact, String> {
        let types = requested_types(params);
        filter::run_filter(&self.sink, "vegetation", params, |r| {
            types.iter().any(|t| *t == r.land_cover)
        })
        .await
    }
}
