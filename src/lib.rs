pub mod bitpack;
pub mod codec;
pub mod compression;
pub mod config;
pub mod error;
pub mod formats;
pub mod nbt;
pub mod palette;
pub mod types;
pub mod validation;
pub mod varint;

pub use crate::codec::{
    convert, detect_format, parse, parse_auto, parse_with, read_from_file, read_from_file_as, serialize,
    serialize_with, write_to_file, write_to_file_as,
};
pub use crate::config::CodecOptions;
pub use crate::error::CodecError;
pub use crate::types::{Block, Dimensions, PaletteEntry, ParsedSchematic};

use crate::compression::Compression;
use crate::nbt::Endian;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// 16位有符号尺寸字段能表示的最大值
pub const MAX_ENCODABLE_DIMENSION: i32 = i16::MAX as i32;

/// 与编码无关的默认尺寸上限
pub const DEFAULT_MAX_DIMENSION: i32 = 512;

/// 支持的结构文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SchematicFormat {
    /// MCEdit 经典 .schematic
    Schematic = 0,
    /// Sponge .schem
    Schem = 1,
    /// Litematica .litematic
    Litematic = 2,
    /// 基岩版 .mcstructure
    McStructure = 3,
}

impl SchematicFormat {
    pub const ALL: [SchematicFormat; 4] = [
        SchematicFormat::Schematic,
        SchematicFormat::Schem,
        SchematicFormat::Litematic,
        SchematicFormat::McStructure,
    ];

    /// 文件扩展名（不含点）
    pub fn extension(self) -> &'static str {
        match self {
            SchematicFormat::Schematic => "schematic",
            SchematicFormat::Schem => "schem",
            SchematicFormat::Litematic => "litematic",
            SchematicFormat::McStructure => "mcstructure",
        }
    }

    /// 该格式写出时使用的压缩方式
    pub fn compression(self) -> Compression {
        match self {
            SchematicFormat::McStructure => Compression::None,
            _ => Compression::Gzip,
        }
    }

    /// 该格式NBT的字节序
    pub fn endian(self) -> Endian {
        match self {
            SchematicFormat::McStructure => Endian::Little,
            _ => Endian::Big,
        }
    }

    /// 根标签名称
    pub fn root_name(self) -> &'static str {
        match self {
            SchematicFormat::Schematic | SchematicFormat::Schem => "Schematic",
            SchematicFormat::Litematic | SchematicFormat::McStructure => "",
        }
    }

    pub fn max_encodable_dimension(self) -> i32 {
        MAX_ENCODABLE_DIMENSION
    }

    /// 根据文件扩展名判断格式
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CodecError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| CodecError::UnsupportedFormat(path.display().to_string()))?;
        ext.parse()
    }
}

impl FromStr for SchematicFormat {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().trim_start_matches('.').to_ascii_lowercase();
        match tag.as_str() {
            "schematic" => Ok(SchematicFormat::Schematic),
            "schem" => Ok(SchematicFormat::Schem),
            "litematic" => Ok(SchematicFormat::Litematic),
            "mcstructure" => Ok(SchematicFormat::McStructure),
            _ => Err(CodecError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for SchematicFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
