//! 区域过滤工具的公共部分：链式输入参数、数值读取、读-筛-写流程

use crate::geo::{Region, RegionSet, ResultSink};
use crate::plan::StepParams;
use crate::tools::{Artifact, ParamSpec, ParamType};

/// 所有过滤工具共用的链式输入参数名
pub const CHAINED_INPUT: &str = "input_geojson_path";

pub(crate) fn chained_input_spec() -> ParamSpec {
    ParamSpec::new(
        CHAINED_INPUT,
        ParamType::String,
        "Region set produced by the previous step; filled in automatically when omitted",
    )
    .required()
}

pub(crate) fn number(params: &StepParams, key: &str) -> Option<f64> {
    params.get(key).and_then(|v| v.as_f64())
}

/// 可选的 [min, max] 区间：至少给出一端，且 min <= max
pub(crate) fn check_bounds(params: &StepParams, min_key: &str, max_key: &str) -> Result<(), String> {
    match (number(params, min_key), number(params, max_key)) {
        (None, None) => Err(format!("at least one of '{}' or '{}' is required", min_key, max_key)),
        (Some(min), Some(max)) if min > max => Err(format!(
            "'{}' ({}) must not exceed '{}' ({})",
            min_key, min, max_key, max
        )),
        _ => Ok(()),
    }
}

/// 读取链式输入，按谓词筛选，写出新产物；零结果也算成功
pub(crate) async fn run_filter(
    sink: &ResultSink,
    prefix: &str,
    params: &StepParams,
    keep: impl Fn(&Region) -> bool,
) -> Result<Artifact, String> {
    let input = params
        .get(CHAINED_INPUT)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("missing required parameter '{}'", CHAINED_INPUT))?;
    let set = RegionSet::read(input).await?;
    let before = set.len();
    let filtered = set.retain(keep);
    let reference = sink.write(prefix, &filtered).await?;
    tracing::debug!(tool = prefix, before, after = filtered.len(), "filtered regions");
    Ok(Artifact::new(reference, filtered.summary()))
}
