//! 编解码入口：按格式分派到对应的适配器，并在适配器前后执行校验。

use crate::compression::{compress_data, decompress_lenient, is_gzip};
use crate::config::CodecOptions;
use crate::error::CodecError;
use crate::formats::{ClassicSchematic, FormatAdapter, Litematic, McStructure, SpongeSchematic};
use crate::nbt::{self, Endian, NbtCompound, NbtTagType};
use crate::types::ParsedSchematic;
use crate::validation::validate_schematic;
use crate::SchematicFormat;
use log::{debug, info};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// 使用默认选项解析
pub fn parse(format: SchematicFormat, bytes: &[u8]) -> Result<ParsedSchematic, CodecError> {
    parse_with(format, bytes, &CodecOptions::default())
}

/// 使用默认选项序列化
pub fn serialize(format: SchematicFormat, schematic: &ParsedSchematic) -> Result<Vec<u8>, CodecError> {
    serialize_with(format, schematic, &CodecOptions::default())
}

pub fn parse_with(
    format: SchematicFormat,
    bytes: &[u8],
    options: &CodecOptions,
) -> Result<ParsedSchematic, CodecError> {
    match format {
        SchematicFormat::Schematic => run_parse::<ClassicSchematic>(bytes, options),
        SchematicFormat::Schem => run_parse::<SpongeSchematic>(bytes, options),
        SchematicFormat::Litematic => run_parse::<Litematic>(bytes, options),
        SchematicFormat::McStructure => run_parse::<McStructure>(bytes, options),
    }
}

pub fn serialize_with(
    format: SchematicFormat,
    schematic: &ParsedSchematic,
    options: &CodecOptions,
) -> Result<Vec<u8>, CodecError> {
    match format {
        SchematicFormat::Schematic => run_serialize::<ClassicSchematic>(schematic, options),
        SchematicFormat::Schem => run_serialize::<SpongeSchematic>(schematic, options),
        SchematicFormat::Litematic => run_serialize::<Litematic>(schematic, options),
        SchematicFormat::McStructure => run_serialize::<McStructure>(schematic, options),
    }
}

/// 先识别格式再解析
pub fn parse_auto(bytes: &[u8], options: &CodecOptions) -> Result<(SchematicFormat, ParsedSchematic), CodecError> {
    let format = detect_format(bytes)?;
    debug!("识别为 {} 格式", format);
    parse_with(format, bytes, options).map(|schematic| (format, schematic))
}

/// 在两种格式之间转换
pub fn convert(from: SchematicFormat, to: SchematicFormat, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    let options = CodecOptions::default();
    let schematic = parse_with(from, bytes, &options)?;
    serialize_with(to, &schematic, &options)
}

/// 根据内容识别格式：gzip 魔数 + 根标签中的特征字段
pub fn detect_format(bytes: &[u8]) -> Result<SchematicFormat, CodecError> {
    let compressed = is_gzip(bytes);
    let data = decompress_lenient(bytes)?;
    if data.first() != Some(&(NbtTagType::Compound as u8)) {
        return Err(CodecError::UnsupportedFormat("无法识别的数据".to_string()));
    }

    if let Ok((_, root)) = nbt::read_root(&data, Endian::Big) {
        if let Some(format) = sniff_java(&root) {
            return Ok(format);
        }
    }

    if let Ok((_, root)) = nbt::read_root(&data, Endian::Little) {
        if root.contains_key("structure") && root.contains_key("size") {
            if compressed {
                debug!("基岩版数据带有 gzip 压缩");
            }
            return Ok(SchematicFormat::McStructure);
        }
    }

    Err(CodecError::UnsupportedFormat("无法识别的数据".to_string()))
}

fn sniff_java(root: &NbtCompound) -> Option<SchematicFormat> {
    if root.contains_key("Regions") {
        Some(SchematicFormat::Litematic)
    } else if root.contains_key("BlockData") || root.contains_key("Palette") || root.contains_key("Schematic") {
        Some(SchematicFormat::Schem)
    } else if root.contains_key("Blocks") && root.contains_key("Width") {
        Some(SchematicFormat::Schematic)
    } else {
        None
    }
}

/// 读取文件，格式由扩展名决定
pub fn read_from_file<P: AsRef<Path>>(path: P, options: &CodecOptions) -> Result<ParsedSchematic, CodecError> {
    let path = path.as_ref();
    let format = SchematicFormat::from_path(path)?;
    read_from_file_as(path, format, options)
}

/// 按指定格式读取文件，忽略扩展名
pub fn read_from_file_as<P: AsRef<Path>>(
    path: P,
    format: SchematicFormat,
    options: &CodecOptions,
) -> Result<ParsedSchematic, CodecError> {
    let path = path.as_ref();
    let mut bytes = Vec::new();
    BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;
    info!("读取 {} ({} 字节, {})", path.display(), bytes.len(), format);

    parse_with(format, &bytes, options)
}

/// 写入文件，格式由扩展名决定；已存在的文件会被覆盖
pub fn write_to_file<P: AsRef<Path>>(
    path: P,
    schematic: &ParsedSchematic,
    options: &CodecOptions,
) -> Result<(), CodecError> {
    let path = path.as_ref();
    let format = SchematicFormat::from_path(path)?;
    write_to_file_as(path, format, schematic, options)
}

/// 按指定格式写入文件，忽略扩展名
pub fn write_to_file_as<P: AsRef<Path>>(
    path: P,
    format: SchematicFormat,
    schematic: &ParsedSchematic,
    options: &CodecOptions,
) -> Result<(), CodecError> {
    let path = path.as_ref();
    let bytes = serialize_with(format, schematic, options)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&bytes)?;
    writer.flush()?;

    info!("写入 {} ({} 字节, {})", path.display(), bytes.len(), format);
    Ok(())
}

fn run_parse<A: FormatAdapter>(bytes: &[u8], options: &CodecOptions) -> Result<ParsedSchematic, CodecError> {
    let data = decompress_lenient(bytes)?;
    let (name, root) = nbt::read_root(&data, A::FORMAT.endian())?;
    if name != A::FORMAT.root_name() {
        debug!("根标签名称为 {:?}，预期 {:?}", name, A::FORMAT.root_name());
    }

    let schematic = A::parse(&root, options)?;
    validate_schematic(&schematic, Some(A::FORMAT), options.max_dimension)?;
    Ok(schematic)
}

fn run_serialize<A: FormatAdapter>(schematic: &ParsedSchematic, options: &CodecOptions) -> Result<Vec<u8>, CodecError> {
    validate_schematic(schematic, Some(A::FORMAT), options.max_dimension)?;

    let root = A::serialize(schematic, options)?;
    let data = nbt::write_root(A::FORMAT.root_name(), &root, A::FORMAT.endian())?;
    let bytes = compress_data(&data, A::FORMAT.compression(), options.compression_level)?;

    debug!(
        "{}: {} 个方块, NBT {} 字节, 输出 {} 字节",
        A::FORMAT,
        schematic.block_count(),
        data.len(),
        bytes.len()
    );
    Ok(bytes)
}
