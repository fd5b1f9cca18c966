//! 基岩版 `.mcstructure`：不压缩的小端NBT。
//!
//! `structure.block_indices` 有两层，只映射第一层；第二层（含水等附加状态）读取时忽略，
//! 写出时全部为 `-1`。负索引表示该位置没有方块。

use super::{collect_blocks, flat_index, Cell, FormatAdapter, Fields};
use crate::config::CodecOptions;
use crate::error::CodecError;
use crate::nbt::{NbtCompound, Tag};
use crate::types::{Dimensions, PaletteEntry, ParsedSchematic};
use crate::validation::validate_declared;
use crate::SchematicFormat;
use log::debug;
use std::collections::BTreeMap;

/// 支持的 `format_version`
pub const FORMAT_VERSION: i32 = 1;

/// 无方块哨兵值
const NO_BLOCK: i32 = -1;

pub struct McStructure;

impl FormatAdapter for McStructure {
    const FORMAT: SchematicFormat = SchematicFormat::McStructure;

    fn parse(root: &NbtCompound, options: &CodecOptions) -> Result<ParsedSchematic, CodecError> {
        let fields = Fields::new(Self::FORMAT, root);

        if let Some(version) = fields.opt_int("format_version")? {
            if version != FORMAT_VERSION {
                return Err(CodecError::UnsupportedVersion {
                    format: Self::FORMAT,
                    version,
                });
            }
        }

        let size = fields.int_list("size")?;
        let [x, y, z] = size[..] else {
            return Err(CodecError::malformed(Self::FORMAT, "size 必须包含3个整数"));
        };
        let dimensions = Dimensions::new(x, y, z);
        validate_declared(&dimensions, Self::FORMAT, options.max_dimension)?;

        let structure = fields.compound("structure")?;
        let palette = structure
            .compound("palette")?
            .compound("default")?
            .compound_list("block_palette")?
            .iter()
            .map(read_palette_entry)
            .collect::<Result<Vec<_>, _>>()?;

        let layers = structure.list("block_indices")?;
        let primary = layers
            .first()
            .and_then(Tag::as_list)
            .ok_or_else(|| CodecError::malformed(Self::FORMAT, "block_indices 缺少主层"))?;

        let volume = dimensions.volume();
        if primary.len() < volume {
            return Err(CodecError::TruncatedPayload {
                expected: volume,
                decoded: primary.len(),
            });
        }

        if let Some(secondary) = layers.get(1).and_then(Tag::as_list) {
            let used = secondary
                .iter()
                .filter(|t| t.as_i32().map_or(false, |i| i >= 0))
                .count();
            if used > 0 {
                debug!("忽略第二层中的 {} 个方块", used);
            }
        }

        let cells = primary[..volume]
            .iter()
            .map(|tag| match tag.as_i32() {
                Some(index) if index >= 0 => Ok(Cell::Present(index as u32)),
                Some(_) => Ok(Cell::Absent),
                None => Err(CodecError::malformed(Self::FORMAT, "block_indices 应为整数列表")),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let blocks = collect_blocks(&dimensions, &palette, cells)?;

        debug!(
            "mcstructure: {}x{}x{}, 调色板 {} 项, {} 个方块",
            dimensions.x,
            dimensions.y,
            dimensions.z,
            palette.len(),
            blocks.len()
        );

        Ok(ParsedSchematic::new(dimensions, palette, blocks))
    }

    fn serialize(schematic: &ParsedSchematic, options: &CodecOptions) -> Result<NbtCompound, CodecError> {
        let dimensions = &schematic.dimensions;
        let volume = dimensions.volume();

        // 调色板按原顺序写出，重复条目保留在原位置
        let mut primary = vec![NO_BLOCK; volume];
        for block in &schematic.blocks {
            primary[flat_index(dimensions, block.x, block.y, block.z)] = block.palette_index as i32;
        }

        let block_palette = schematic
            .palette
            .iter()
            .map(|entry| write_palette_entry(entry, options.bedrock_block_version))
            .collect();

        let mut default = NbtCompound::new();
        default.insert("block_palette".to_string(), Tag::List(block_palette));
        default.insert("block_position_data".to_string(), Tag::Compound(NbtCompound::new()));

        let mut palette = NbtCompound::new();
        palette.insert("default".to_string(), Tag::Compound(default));

        let layers = vec![
            Tag::List(primary.into_iter().map(Tag::Int).collect()),
            Tag::List(vec![Tag::Int(NO_BLOCK); volume]),
        ];

        let mut structure = NbtCompound::new();
        structure.insert("block_indices".to_string(), Tag::List(layers));
        structure.insert("entities".to_string(), super::empty_list());
        structure.insert("palette".to_string(), Tag::Compound(palette));

        let mut root = NbtCompound::new();
        root.insert("format_version".to_string(), Tag::Int(FORMAT_VERSION));
        root.insert("size".to_string(), int_list(dimensions.as_array()));
        root.insert("structure".to_string(), Tag::Compound(structure));
        root.insert("structure_world_origin".to_string(), int_list([0, 0, 0]));

        Ok(root)
    }
}

fn int_list(values: [i32; 3]) -> Tag {
    Tag::List(values.into_iter().map(Tag::Int).collect())
}

fn read_palette_entry(fields: &Fields<'_>) -> Result<PaletteEntry, CodecError> {
    let name = fields.string("name")?;
    let Some(states) = fields.opt_compound("states")? else {
        return Ok(PaletteEntry::new(name));
    };

    let mut properties = BTreeMap::new();
    for (key, tag) in states.inner() {
        properties.insert(key.clone(), state_to_string(key, tag)?);
    }
    Ok(PaletteEntry::with_properties(name, properties))
}

fn write_palette_entry(entry: &PaletteEntry, version: i32) -> Tag {
    let states: NbtCompound = entry
        .properties
        .iter()
        .flatten()
        .map(|(k, v)| (k.clone(), string_to_state(v)))
        .collect();

    let mut compound = NbtCompound::new();
    compound.insert("name".to_string(), Tag::String(entry.name.clone()));
    compound.insert("states".to_string(), Tag::Compound(states));
    compound.insert("version".to_string(), Tag::Int(version));
    Tag::Compound(compound)
}

/// 基岩版状态值 → 字符串：布尔为 Byte 0/1，数值为 Int
fn state_to_string(key: &str, tag: &Tag) -> Result<String, CodecError> {
    match tag {
        Tag::String(s) => Ok(s.clone()),
        Tag::Byte(0) => Ok("false".to_string()),
        Tag::Byte(1) => Ok("true".to_string()),
        Tag::Byte(v) => Ok(v.to_string()),
        Tag::Short(v) => Ok(v.to_string()),
        Tag::Int(v) => Ok(v.to_string()),
        Tag::Long(v) => Ok(v.to_string()),
        _ => Err(CodecError::malformed(
            SchematicFormat::McStructure,
            format!("状态 {} 的类型不受支持", key),
        )),
    }
}

/// 字符串 → 基岩版状态值，只有规范写法的整数才转为 Int
fn string_to_state(value: &str) -> Tag {
    match value {
        "true" => Tag::Byte(1),
        "false" => Tag::Byte(0),
        _ => match value.parse::<i32>() {
            Ok(number) if number.to_string() == value => Tag::Int(number),
            _ => Tag::String(value.to_string()),
        },
    }
}
