//! 候选区域集合：过滤工具之间传递的产物内容
//!
//! 一个产物文件是一个 RegionSet（JSON），每个区域带高程、坡度、地表类型和到最近建筑的距离。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::tools::ArtifactRef;

/// 地表类型（ESA WorldCover 分类）
pub const LAND_COVER_TYPES: &[&str] = &[
    "tree", "shrub", "grass", "cropland", "built_up", "bare", "snow", "water", "wetland",
    "mangrove", "moss",
];

/// 一个候选区域（栅格单元）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: u32,
    /// 中心点（投影坐标，米）
    pub center: [f64; 2],
    pub area_m2: f64,
    pub elevation_m: f64,
    pub slope_deg: f64,
    pub land_cover: String,
    /// 到最近建筑或道路的距离
    pub structure_distance_m: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionSet {
    pub regions: Vec<Region>,
}

impl RegionSet {
    pub fn new(regions: Vec<Region>) -> Self {
        Self { regions }
    }

    pub async fn read(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Read {} failed: {}", path.display(), e))?;
        serde_json::from_str(&raw).map_err(|e| format!("Invalid region set {}: {}", path.display(), e))
    }

    pub async fn write(&self, path: impl AsRef<Path>) -> Result<(), String> {
        let path = path.as_ref();
        let raw = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;
        tokio::fs::write(path, raw)
            .await
            .map_err(|e| format!("Write {} failed: {}", path.display(), e))
    }

    pub fn retain(mut self, keep: impl Fn(&Region) -> bool) -> Self {
        self.regions.retain(|r| keep(r));
        self
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn total_area_m2(&self) -> f64 {
        self.regions.iter().map(|r| r.area_m2).sum()
    }

    pub fn summary(&self) -> String {
        format!("{} regions, {:.0} m2", self.len(), self.total_area_m2())
    }
}

/// 结果目录：每次写入生成一个新文件
#[derive(Debug, Clone)]
pub struct ResultSink {
    dir: PathBuf,
}

impl ResultSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 写入 `<prefix>_<时间戳>_<短 id>.json` 并返回其引用
    pub async fn write(&self, prefix: &str, set: &RegionSet) -> Result<ArtifactRef, String> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| format!("Create {} failed: {}", self.dir.display(), e))?;
        let id = uuid::Uuid::new_v4().simple().to_string();
        let file = format!(
            "{}_{}_{}.json",
            prefix,
            chrono::Utc::now().format("%Y%m%d_%H%M%S"),
            &id[..8]
        );
        let path = self.dir.join(file);
        set.write(&path).await?;
        Ok(ArtifactRef::from_path(path))
    }
}
