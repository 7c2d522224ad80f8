//! 区域数据模型与基础数据集

pub mod dataset;
pub mod region;

pub use dataset::{BaseDataset, FileDataset, GridDataset};
pub use region::{Region, RegionSet, ResultSink, LAND_COVER_TYPES};
