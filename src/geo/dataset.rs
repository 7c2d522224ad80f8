//! 基础数据集：第一步的链式输入
//!
//! 可以是配置的区域集文件，也可以是写入结果目录的确定性合成栅格。

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::geo::{Region, RegionSet, ResultSink, LAND_COVER_TYPES};
use crate::tools::ArtifactRef;

#[async_trait]
pub trait BaseDataset: Send + Sync {
    /// 任务隐含的基础数据集产物
    async fn artifact(&self) -> Result<ArtifactRef, String>;
}

/// 已存在的区域集文件
pub struct FileDataset {
    path: PathBuf,
}

impl FileDataset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl BaseDataset for FileDataset {
    async fn artifact(&self) -> Result<ArtifactRef, String> {
        tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| format!("Base dataset {} unavailable: {}", self.path.display(), e))?;
        Ok(ArtifactRef::from_path(&self.path))
    }
}

/// 确定性合成栅格：rows × cols 个方形单元，首次使用时写入结果目录
pub struct GridDataset {
    rows: u32,
    cols: u32,
    cell_size_m: f64,
    sink: ResultSink,
    written: OnceCell<ArtifactRef>,
}

impl GridDataset {
    pub fn new(rows: u32, cols: u32, cell_size_m: f64, sink: ResultSink) -> Self {
        Self {
            rows,
            cols,
            cell_size_m,
            sink,
            written: OnceCell::new(),
        }
    }

    pub fn generate(&self) -> RegionSet {
        let mut regions = Vec::with_capacity((self.rows * self.cols) as usize);
        for r in 0..self.rows {
            for c in 0..self.cols {
                let half = self.cell_size_m / 2.0;
                regions.push(Region {
                    id: r * self.cols + c + 1,
                    center: [
                        c as f64 * self.cell_size_m + half,
                        r as f64 * self.cell_size_m + half,
                    ],
                    area_m2: self.cell_size_m * self.cell_size_m,
                    elevation_m: 40.0 + ((r * 37 + c * 53) % 600) as f64,
                    slope_deg: ((r * 7 + c * 11) % 35) as f64,
                    land_cover: LAND_COVER_TYPES[((r * 3 + c) % 6) as usize].to_string(),
                    structure_distance_m: (((r * 131 + c * 97) % 20) * 75) as f64,
                });
            }
        }
        RegionSet::new(regions)
    }
}

#[async_trait]
impl BaseDataset for GridDataset {
    async fn artifact(&self) -> Result<ArtifactRef, String> {
        self.written
            .get_or_try_init(|| async {
                let set = self.generate();
                let reference = self.sink.write("base_grid", &set).await?;
                tracing::info!(regions = set.len(), path = %reference, "wrote synthetic base grid");
                Ok::<_, String>(reference)
            })
            .await
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_grid_is_written_once_and_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let grid = GridDataset::new(4, 5, 100.0, ResultSink::new(dir.path()));
        assert_eq!(grid.generate(), grid.generate());

        let a = grid.artifact().await.unwrap();
        let b = grid.artifact().await.unwrap();
        assert_eq!(a, b);
        let set = RegionSet::read(a.to_path()).await.unwrap();
        assert_eq!(set.len(), 20);
        assert!(set.regions.iter().all(|r| (0.0..=90.0).contains(&r.slope_deg)));
    }

    #[tokio::test]
    async fn test_file_dataset_requires_existing_file() {
        let missing = FileDataset::new("/no/such/base.json");
        assert!(missing.artifact().await.is_err());

        let file = tempfile::NamedTempFile::new().unwrap();
        let ok = FileDataset::new(file.path());
        assert_eq!(ok.artifact().await.unwrap().to_path(), file.path());
    }
}
