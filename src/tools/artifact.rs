//! 步骤产物：对核心而言只是一个不透明的引用（文件路径或 blob 标识）

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// 产物引用；核心只传递，不读取内容
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self(path.as_ref().to_string_lossy().into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_path(&self) -> PathBuf {
        PathBuf::from(&self.0)
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 工具执行结果：产物引用 + 一行摘要（如保留的区域数）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub reference: ArtifactRef,
    pub summary: String,
}

impl Artifact {
    pub fn new(reference: ArtifactRef, summary: impl Into<String>) -> Self {
        Self {
            reference,
            summary: summary.into(),
        }
    }
}
