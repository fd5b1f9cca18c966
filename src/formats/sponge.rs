//! Sponge `.schem`：gzip + 大端NBT，`Palette` 复合标签（状态字符串 → 索引）+ VarInt 编码的 `BlockData`。
//!
//! 读取支持版本 1、2、3（v3 把调色板和数据放在 `Blocks` 下，并多一层 `Schematic` 包装），
//! 写出固定为版本 2。

use super::{collect_blocks, Cell, DensePalette, FormatAdapter, Fields, PaletteNotes};
use crate::config::CodecOptions;
use crate::error::CodecError;
use crate::nbt::{NbtCompound, Tag};
use crate::types::{Dimensions, PaletteEntry, ParsedSchematic};
use crate::validation::validate_declared;
use crate::varint;
use crate::SchematicFormat;
use log::{debug, warn};

/// 写出的 Sponge 版本
pub const SPONGE_VERSION: i32 = 2;

pub struct SpongeSchematic;

impl FormatAdapter for SpongeSchematic {
    const FORMAT: SchematicFormat = SchematicFormat::Schem;

    fn parse(root: &NbtCompound, options: &CodecOptions) -> Result<ParsedSchematic, CodecError> {
        let mut fields = Fields::new(Self::FORMAT, root);
        // v3 的根标签只包含一个 Schematic 复合标签
        if !fields.has("Version") && fields.has("Schematic") {
            fields = fields.compound("Schematic")?;
        }

        let version = fields.int("Version")?;
        if !(1..=3).contains(&version) {
            return Err(CodecError::UnsupportedVersion {
                format: Self::FORMAT,
                version,
            });
        }

        let dimensions = Dimensions::new(
            fields.int("Width")?,
            fields.int("Height")?,
            fields.int("Length")?,
        );
        validate_declared(&dimensions, Self::FORMAT, options.max_dimension)?;

        let (palette_fields, data) = if version >= 3 {
            let blocks = fields.compound("Blocks")?;
            (blocks.compound("Palette")?, blocks.byte_array("Data")?)
        } else {
            (fields.compound("Palette")?, fields.byte_array("BlockData")?)
        };

        let palette = invert_palette(&palette_fields)?;
        if let Some(max) = fields.opt_int("PaletteMax")? {
            if max as usize != palette.len() {
                warn!("PaletteMax ({}) 与调色板大小 ({}) 不一致", max, palette.len());
            }
        }

        let volume = dimensions.volume();
        let (indices, consumed) = varint::decode_exact(data, volume)?;
        if consumed < data.len() {
            debug!("BlockData 末尾有 {} 字节未使用", data.len() - consumed);
        }

        if fields.has("Offset") {
            let offset = fields.int_array("Offset")?;
            if offset.iter().any(|&v| v != 0) {
                debug!("Offset {:?} 不影响方块的相对坐标", offset);
            }
        }

        let blocks = collect_blocks(&dimensions, &palette, indices.into_iter().map(Cell::Present))?;
        let notes = PaletteNotes::read(fields.opt_compound("Metadata")?)?;
        let parsed = notes.apply(ParsedSchematic::new(dimensions, palette, blocks));

        debug!(
            "Sponge v{}: {}x{}x{}, 调色板 {} 项, {} 个方块",
            version,
            dimensions.x,
            dimensions.y,
            dimensions.z,
            parsed.palette.len(),
            parsed.block_count()
        );

        Ok(parsed)
    }

    fn serialize(schematic: &ParsedSchematic, options: &CodecOptions) -> Result<NbtCompound, CodecError> {
        let dimensions = &schematic.dimensions;
        let dense = DensePalette::interned(schematic);

        let mut palette = NbtCompound::new();
        for (index, entry) in dense.entries.iter().enumerate() {
            palette.insert(entry.to_string(), Tag::Int(index as i32));
        }

        let block_data = varint::encode_all(dense.fill(schematic));

        let mut root = NbtCompound::new();
        root.insert("Version".to_string(), Tag::Int(SPONGE_VERSION));
        root.insert("DataVersion".to_string(), Tag::Int(options.data_version));
        root.insert("Width".to_string(), Tag::Short(dimensions.x as i16));
        root.insert("Height".to_string(), Tag::Short(dimensions.y as i16));
        root.insert("Length".to_string(), Tag::Short(dimensions.z as i16));
        root.insert("Offset".to_string(), Tag::IntArray(vec![0, 0, 0]));
        root.insert("PaletteMax".to_string(), Tag::Int(dense.entries.len() as i32));
        root.insert("Palette".to_string(), Tag::Compound(palette));
        root.insert("BlockData".to_string(), Tag::ByteArray(block_data));
        root.insert("BlockEntities".to_string(), super::empty_list());
        let mut metadata = NbtCompound::new();
        dense.notes().write(&mut metadata);
        root.insert("Metadata".to_string(), Tag::Compound(metadata));

        Ok(root)
    }
}

/// 把 名称 → 索引 的调色板反转为按索引排列的列表；索引必须恰好覆盖 0..n
fn invert_palette(palette: &Fields<'_>) -> Result<Vec<PaletteEntry>, CodecError> {
    let compound = palette.inner();
    let mut slots: Vec<Option<PaletteEntry>> = vec![None; compound.len()];

    for (state, tag) in compound {
        let index = tag
            .as_i32()
            .and_then(|i| usize::try_from(i).ok())
            .filter(|&i| i < slots.len())
            .ok_or_else(|| CodecError::malformed(SchematicFormat::Schem, format!("调色板 {} 的索引无效", state)))?;
        if slots[index].is_some() {
            return Err(CodecError::malformed(
                SchematicFormat::Schem,
                format!("调色板索引 {} 重复", index),
            ));
        }
        slots[index] = Some(state.parse()?);
    }

    // 条目数与索引范围相同且无重复，因此每个位置都已填充
    Ok(slots.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Block;
    use assert_matches::assert_matches;

    fn v2_root(palette: &[(&str, i32)], data: Vec<u8>, dims: (i16, i16, i16)) -> NbtCompound {
        let mut pal = NbtCompound::new();
        for (name, index) in palette {
            pal.insert(name.to_string(), Tag::Int(*index));
        }
        let mut root = NbtCompound::new();
        root.insert("Version".to_string(), Tag::Int(2));
        root.insert("Width".to_string(), Tag::Short(dims.0));
        root.insert("Height".to_string(), Tag::Short(dims.1));
        root.insert("Length".to_string(), Tag::Short(dims.2));
        root.insert("Palette".to_string(), Tag::Compound(pal));
        root.insert("BlockData".to_string(), Tag::ByteArray(data));
        root
    }

    #[test]
    fn palette_order_follows_int_values() {
        let root = v2_root(
            &[("minecraft:stone", 1), ("minecraft:air", 0), ("minecraft:oak_stairs[facing=north,half=bottom]", 2)],
            vec![0, 1, 2, 0],
            (2, 2, 1),
        );
        let parsed = SpongeSchematic::parse(&root, &CodecOptions::default()).unwrap();
        assert!(parsed.palette[0].is_air());
        assert_eq!(parsed.palette[1].name, "minecraft:stone");
        assert_eq!(parsed.palette[2].property("facing"), Some("north"));
        // 索引 1 在 (1,0,0)，索引 2 在 (0,1,0)
        assert_eq!(parsed.blocks, vec![Block::new(1, 0, 0, 1), Block::new(0, 1, 0, 2)]);
    }

    #[test]
    fn multi_byte_varints_advance_correctly() {
        let names: Vec<String> = (0..200).map(|i| format!("test:block_{}", i)).collect();
        let palette: Vec<(&str, i32)> = names.iter().enumerate().map(|(i, n)| (n.as_str(), i as i32)).collect();
        // 150 = [0x96, 0x01]
        let root = v2_root(&palette, vec![0x96, 0x01, 0x05], (2, 1, 1));
        let parsed = SpongeSchematic::parse(&root, &CodecOptions::default()).unwrap();
        assert_eq!(parsed.blocks, vec![Block::new(0, 0, 0, 150), Block::new(1, 0, 0, 5)]);
    }

    #[test]
    fn missing_palette_is_malformed() {
        let mut root = v2_root(&[("minecraft:stone", 0)], vec![0], (1, 1, 1));
        root.remove("Palette");
        assert_matches!(
            SpongeSchematic::parse(&root, &CodecOptions::default()),
            Err(CodecError::MalformedTagTree { format: SchematicFormat::Schem, .. })
        );
    }

    #[test]
    fn palette_gap_is_malformed() {
        let root = v2_root(&[("minecraft:stone", 0), ("minecraft:dirt", 2)], vec![0], (1, 1, 1));
        assert_matches!(
            SpongeSchematic::parse(&root, &CodecOptions::default()),
            Err(CodecError::MalformedTagTree { .. })
        );
    }

    #[test]
    fn short_block_data_is_truncated() {
        let root = v2_root(&[("minecraft:stone", 0)], vec![0, 0], (3, 1, 1));
        assert_matches!(
            SpongeSchematic::parse(&root, &CodecOptions::default()),
            Err(CodecError::TruncatedPayload { expected: 3, decoded: 2 })
        );
    }

    #[test]
    fn index_beyond_palette_is_reported() {
        let root = v2_root(&[("minecraft:stone", 0)], vec![0, 3], (2, 1, 1));
        assert_matches!(
            SpongeSchematic::parse(&root, &CodecOptions::default()),
            Err(CodecError::PaletteIndexOutOfRange { x: 1, index: 3, .. })
        );
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut root = v2_root(&[("minecraft:stone", 0)], vec![0], (1, 1, 1));
        root.insert("Version".to_string(), Tag::Int(4));
        assert_matches!(
            SpongeSchematic::parse(&root, &CodecOptions::default()),
            Err(CodecError::UnsupportedVersion { version: 4, .. })
        );
    }

    #[test]
    fn version_three_layout_is_read() {
        let mut pal = NbtCompound::new();
        pal.insert("minecraft:stone".to_string(), Tag::Int(0));
        let mut blocks = NbtCompound::new();
        blocks.insert("Palette".to_string(), Tag::Compound(pal));
        blocks.insert("Data".to_string(), Tag::ByteArray(vec![0]));
        let mut inner = NbtCompound::new();
        inner.insert("Version".to_string(), Tag::Int(3));
        inner.insert("Width".to_string(), Tag::Short(1));
        inner.insert("Height".to_string(), Tag::Short(1));
        inner.insert("Length".to_string(), Tag::Short(1));
        inner.insert("Blocks".to_string(), Tag::Compound(blocks));
        let mut root = NbtCompound::new();
        root.insert("Schematic".to_string(), Tag::Compound(inner));

        let parsed = SpongeSchematic::parse(&root, &CodecOptions::default()).unwrap();
        assert_eq!(parsed.block_count(), 1);
    }

    #[test]
    fn writer_adds_air_only_for_gaps() {
        let schematic = ParsedSchematic::new(
            Dimensions::new(2, 1, 1),
            vec![PaletteEntry::new("minecraft:stone")],
            vec![Block::new(1, 0, 0, 0)],
        );
        let root = SpongeSchematic::serialize(&schematic, &CodecOptions::default()).unwrap();
        let fields = Fields::new(SchematicFormat::Schem, &root);
        let palette = fields.compound("Palette").unwrap();
        assert_eq!(palette.int("minecraft:stone").unwrap(), 0);
        assert_eq!(palette.int("minecraft:air").unwrap(), 1);
        assert_eq!(fields.byte_array("BlockData").unwrap(), &[1, 0]);
        assert_eq!(fields.int("PaletteMax").unwrap(), 2);
        assert_eq!(fields.compound("Metadata").unwrap().int("AddedAir").unwrap(), 1);

        // 补充的空气在解析时被去掉
        let parsed = SpongeSchematic::parse(&root, &CodecOptions::default()).unwrap();
        assert_eq!(parsed.palette, vec![PaletteEntry::new("minecraft:stone")]);
        assert_eq!(parsed.blocks, vec![Block::new(1, 0, 0, 0)]);
    }

    #[test]
    fn duplicate_entries_come_back_from_metadata() {
        let stone = PaletteEntry::new("minecraft:stone");
        let schematic = ParsedSchematic::new(
            Dimensions::new(2, 1, 1),
            vec![stone.clone(), stone.clone()],
            vec![Block::new(0, 0, 0, 0), Block::new(1, 0, 0, 1)],
        );
        let root = SpongeSchematic::serialize(&schematic, &CodecOptions::default()).unwrap();
        let fields = Fields::new(SchematicFormat::Schem, &root);
        assert_eq!(fields.int("PaletteMax").unwrap(), 1);

        let parsed = SpongeSchematic::parse(&root, &CodecOptions::default()).unwrap();
        assert_eq!(parsed.palette, vec![stone.clone(), stone]);
        assert_eq!(parsed.block_count(), 2);
    }

    #[test]
    fn offset_is_read_as_int_array() {
        let mut root = v2_root(&[("minecraft:stone", 0)], vec![0], (1, 1, 1));
        root.insert("Offset".to_string(), Tag::IntArray(vec![3, -2, 7]));
        assert_eq!(SpongeSchematic::parse(&root, &CodecOptions::default()).unwrap().block_count(), 1);

        root.insert("Offset".to_string(), Tag::Int(0));
        assert_matches!(
            SpongeSchematic::parse(&root, &CodecOptions::default()),
            Err(CodecError::MalformedTagTree { .. })
        );
    }
}
