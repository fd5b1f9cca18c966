use crate::compression::DEFAULT_LEVEL;
use crate::error::CodecError;
use crate::DEFAULT_MAX_DIMENSION;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// 默认写入的 Java 版数据版本（1.21）
pub const DEFAULT_DATA_VERSION: i32 = 3953;

/// 基岩版调色板条目的默认 `version` 字段（1.18.10）
pub const DEFAULT_BEDROCK_BLOCK_VERSION: i32 = 17959425;

/// 编解码选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecOptions {
    /// 与编码无关的单轴尺寸上限
    pub max_dimension: i32,
    /// Sponge `DataVersion` / Litematic `MinecraftDataVersion`
    pub data_version: i32,
    pub name: String,
    pub author: String,
    pub description: String,
    /// Litematic 创建/修改时间（毫秒）
    pub timestamp: i64,
    pub compression_level: u32,
    pub bedrock_block_version: i32,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            data_version: DEFAULT_DATA_VERSION,
            name: "Unnamed".to_string(),
            author: String::new(),
            description: String::new(),
            timestamp: 0,
            compression_level: DEFAULT_LEVEL,
            bedrock_block_version: DEFAULT_BEDROCK_BLOCK_VERSION,
        }
    }
}

impl CodecOptions {
    /// 从 JSON 配置文件加载，缺省字段取默认值
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CodecError> {
        let reader = BufReader::new(File::open(path)?);
        serde_json::from_reader(reader)
            .map_err(|e| CodecError::Config(format!("配置文件解析错误: {}", e)))
    }

    pub fn with_max_dimension(mut self, max_dimension: i32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}
