use crate::SchematicFormat;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO错误: {0}")]
    Io(#[from] io::Error),

    #[error("NBT解析错误: {0}")]
    Nbt(String),

    #[error("无效的尺寸: {x}x{y}x{z}")]
    InvalidDimensions { x: i32, y: i32, z: i32 },

    #[error("调色板为空")]
    EmptyPalette,

    #[error("方块 ({x}, {y}, {z}) 的调色板索引 {index} 超出调色板大小 {len}")]
    PaletteIndexOutOfRange {
        x: i32,
        y: i32,
        z: i32,
        index: u32,
        len: usize,
    },

    #[error("方块坐标 ({x}, {y}, {z}) 超出结构范围")]
    BlockOutOfBounds { x: i32, y: i32, z: i32 },

    #[error("{format} 格式无法编码尺寸 {value}（上限 {max}）")]
    DimensionEncodingOverflow {
        format: SchematicFormat,
        value: i32,
        max: i32,
    },

    #[error("结构过大: 尺寸 {value} 超过上限 {max}")]
    StructureTooLarge { value: i32, max: i32 },

    #[error("坐标 ({x}, {y}, {z}) 上存在重复的方块")]
    DuplicateBlock { x: i32, y: i32, z: i32 },

    #[error("坐标 ({x}, {y}, {z}) 上的方块引用了空气条目")]
    AirBlock { x: i32, y: i32, z: i32 },

    #[error("{format} 格式的调色板过大: {len} 项（上限 {max}）")]
    PaletteTooLarge {
        format: SchematicFormat,
        len: usize,
        max: usize,
    },

    #[error("{format} 标签树结构错误: {detail}")]
    MalformedTagTree {
        format: SchematicFormat,
        detail: String,
    },

    #[error("数据被截断: 需要 {expected} 个方块，只解出 {decoded} 个")]
    TruncatedPayload { expected: usize, decoded: usize },

    #[error("VarInt 超过5字节")]
    VarIntTooLong,

    #[error("不支持的格式: {0}")]
    UnsupportedFormat(String),

    #[error("不支持的 {format} 版本: {version}")]
    UnsupportedVersion {
        format: SchematicFormat,
        version: i32,
    },

    #[error("无效的方块状态: {0}")]
    InvalidBlockState(String),

    #[error("配置错误: {0}")]
    Config(String),
}

impl CodecError {
    pub(crate) fn malformed(format: SchematicFormat, detail: impl Into<String>) -> Self {
        CodecError::MalformedTagTree {
            format,
            detail: detail.into(),
        }
    }
}
