//! 工具层：工具契约、注册表、执行器与区域过滤工具

pub mod artifact;
pub mod buffer;
pub mod elevation;
pub mod executor;
pub mod filter;
pub mod registry;
pub mod schema;
pub mod slope;
pub mod vegetation;

pub use artifact::{Artifact, ArtifactRef};
pub use buffer::BufferFilterTool;
pub use elevation::ElevationFilterTool;
pub use executor::ToolExecutor;
pub use filter::CHAINED_INPUT;
pub use registry::{Tool, ToolRegistry};
pub use schema::{ParamSpec, ParamType, ToolSchema, ValidationMode};
pub use slope::SlopeFilterTool;
pub use vegetation::VegetationFilterTool;

use crate::geo::ResultSink;

/// 注册四个区域过滤工具，产物写入同一结果目录
pub fn geo_registry(sink: ResultSink) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(BufferFilterTool::new(sink.clone()));
    registry.register(ElevationFilterTool::new(sink.clone()));
    registry.register(SlopeFilterTool::new(sink.clone()));
    registry.register(VegetationFilterTool::new(sink));
    registry
}
