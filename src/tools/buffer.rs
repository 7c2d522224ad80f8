//! 缓冲区过滤：排除距建筑/道路不足 buffer_distance 的区域

use async_trait::async_trait;

use crate::geo::ResultSink;
use crate::plan::StepParams;
use crate::tools::filter::{self, CHAINED_INPUT};
use crate::tools::{Artifact, ParamSpec, ParamType, Tool, ToolSchema};

pub struct BufferFilterTool {
    sink: ResultSink,
}

impl BufferFilterTool {
    pub fn new(sink: ResultSink) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Tool for BufferFilterTool {
    fn name(&self) -> &str {
        "buffer"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "buffer".into(),
            description: "Keep regions at least buffer_distance meters away from buildings and roads".into(),
            params: vec![
                filter::chained_input_spec(),
                ParamSpec::new("buffer_distance", ParamType::Number, "Minimum distance to structures in meters")
                    .required()
                    .range(0.0, 10_000.0),
            ],
            chained_input: CHAINED_INPUT.into(),
        }
    }

    fn aliases(&self) -> &[&'static str] {
        &["buffer_filter", "buffer_filter_tool"]
    }

    async fn execute(&self, params: &StepParams) -> Result<Artifact, String> {
        let distance = filter::number(params, "buffer_distance")
            .ok_or("missing required parameter 'buffer_distance'")?;
        let prefix = format!("buffer_{}m", distance);
        filter::run_filter(&self.sink, &prefix, params, |r| {
            r.structure_distance_m >= distance
        })
        .await
    }
}
