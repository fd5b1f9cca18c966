//! MCEdit 经典 `.schematic`：gzip + 大端NBT，`Blocks`/`Data` 每方块一字节。
//!
//! 方块没有命名调色板，解析时按 `(方块ID, 数据值)` 首次出现的顺序合成调色板。
//! 写出时旧ID表中的方块使用真实ID，`data` 属性写入 `Data`；其余条目分配未占用的ID，
//! 并记录在 `SchematicaMapping`（方块状态字符串 → ID）中。
//! ID 超过255时用 `AddBlocks` 半字节数组保存高4位。

use super::{collect_blocks, flat_index, Cell, FormatAdapter, Fields, PaletteNotes};
use crate::config::CodecOptions;
use crate::error::CodecError;
use crate::nbt::{NbtCompound, Tag};
use crate::palette::{is_table_id, legacy_entry, legacy_pair, PaletteBuilder};
use crate::types::{Dimensions, PaletteEntry, ParsedSchematic};
use crate::validation::validate_declared;
use crate::SchematicFormat;
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap, HashSet};

/// `AddBlocks` 可表示的最大方块ID
pub const MAX_BLOCK_ID: usize = 0xFFF;

const MAPPING_KEY: &str = "SchematicaMapping";

pub struct ClassicSchematic;

impl FormatAdapter for ClassicSchematic {
    const FORMAT: SchematicFormat = SchematicFormat::Schematic;

    fn parse(root: &NbtCompound, options: &CodecOptions) -> Result<ParsedSchematic, CodecError> {
        let fields = Fields::new(Self::FORMAT, root);

        let dimensions = Dimensions::new(
            fields.int("Width")?,
            fields.int("Height")?,
            fields.int("Length")?,
        );
        validate_declared(&dimensions, Self::FORMAT, options.max_dimension)?;
        let volume = dimensions.volume();

        if let Ok(materials) = fields.string("Materials") {
            if materials != "Alpha" {
                warn!("非 Alpha 材质表: {}，按 Alpha 解析", materials);
            }
        }

        let blocks = fields.byte_array("Blocks")?;
        let data = fields.byte_array("Data")?;
        let shortest = blocks.len().min(data.len());
        if shortest < volume {
            return Err(CodecError::TruncatedPayload {
                expected: volume,
                decoded: shortest,
            });
        }

        let add = if fields.has("AddBlocks") {
            Some(fields.byte_array("AddBlocks")?)
        } else {
            None
        };
        let mapping = read_mapping(&fields)?;

        let mut builder = PaletteBuilder::new();
        let mut pairs: HashMap<(u16, u8), u32> = HashMap::new();
        let mut indices = Vec::with_capacity(volume);

        for i in 0..volume {
            let id = block_id(blocks, add, i);
            let meta = data[i] & 0x0F;
            let index = match pairs.get(&(id, meta)) {
                Some(&index) => index,
                None => {
                    let index = builder.intern(pair_entry(&mapping, id, meta));
                    pairs.insert((id, meta), index);
                    index
                }
            };
            indices.push(index);
        }

        // 未被使用的映射条目追加在末尾，保证调色板完整往返
        let mut unused: Vec<(&u16, &PaletteEntry)> = mapping.iter().collect();
        unused.sort_by_key(|(id, _)| **id);
        for (_, entry) in unused {
            if builder.get(entry).is_none() {
                builder.intern(entry.clone());
            }
        }

        let palette = builder.into_entries();
        let blocks = collect_blocks(&dimensions, &palette, indices.into_iter().map(Cell::Present))?;
        let parsed = PaletteNotes::read(Some(fields))?.apply(ParsedSchematic::new(dimensions, palette, blocks));

        debug!(
            "经典 schematic: {}x{}x{}, 调色板 {} 项, {} 个方块",
            dimensions.x,
            dimensions.y,
            dimensions.z,
            parsed.palette.len(),
            parsed.block_count()
        );

        Ok(parsed)
    }

    fn serialize(schematic: &ParsedSchematic, _options: &CodecOptions) -> Result<NbtCompound, CodecError> {
        let dimensions = &schematic.dimensions;
        let volume = dimensions.volume();
        let ids = assign_ids(schematic)?;

        // 只有无法用旧ID表示的条目进入映射
        let mut mapping = NbtCompound::new();
        for (entry, id) in schematic.palette.iter().zip(&ids) {
            if id.synthetic {
                mapping.entry(entry.to_string()).or_insert(Tag::Short(id.id as i16));
            }
        }

        let needs_add = ids.iter().any(|id| id.id > 0xFF);
        let mut blocks = vec![0u8; volume];
        let mut data = vec![0u8; volume];
        let mut add = if needs_add { vec![0u8; (volume + 1) / 2] } else { Vec::new() };

        for block in &schematic.blocks {
            let i = flat_index(dimensions, block.x, block.y, block.z);
            let id = ids[block.palette_index as usize];
            blocks[i] = (id.id & 0xFF) as u8;
            data[i] = id.data;
            if needs_add {
                let high = ((id.id >> 8) & 0x0F) as u8;
                if i & 1 == 0 {
                    add[i >> 1] |= high;
                } else {
                    add[i >> 1] |= high << 4;
                }
            }
        }

        let mut root = NbtCompound::new();
        root.insert("Width".to_string(), Tag::Short(dimensions.x as i16));
        root.insert("Height".to_string(), Tag::Short(dimensions.y as i16));
        root.insert("Length".to_string(), Tag::Short(dimensions.z as i16));
        root.insert("Materials".to_string(), Tag::String("Alpha".to_string()));
        root.insert("Blocks".to_string(), Tag::ByteArray(blocks));
        root.insert("Data".to_string(), Tag::ByteArray(data));
        if needs_add {
            root.insert("AddBlocks".to_string(), Tag::ByteArray(add));
        }
        if !mapping.is_empty() {
            root.insert(MAPPING_KEY.to_string(), Tag::Compound(mapping));
        }
        root.insert("Entities".to_string(), super::empty_list());
        root.insert("TileEntities".to_string(), super::empty_list());
        palette_notes(schematic, &ids).write(&mut root);

        Ok(root)
    }
}

/// 调色板条目写出时使用的 `(ID, 数据值)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ClassicId {
    id: u16,
    data: u8,
    /// 不在旧ID表中，靠 `SchematicaMapping` 还原
    synthetic: bool,
}

/// 空气为 ID 0；能用旧ID表示的条目使用真实ID和数据值；
/// 其余条目从1开始取未被占用的ID，相同条目共用一个ID。
fn assign_ids(schematic: &ParsedSchematic) -> Result<Vec<ClassicId>, CodecError> {
    let air = PaletteEntry::air();
    let legacy: Vec<Option<(u16, u8)>> = schematic.palette.iter().map(legacy_pair).collect();
    let taken: HashSet<u16> = legacy.iter().flatten().map(|(id, _)| *id).collect();

    let mut synthetic: HashMap<&PaletteEntry, u16> = HashMap::new();
    let mut next_id: u16 = 1;
    let mut ids = Vec::with_capacity(schematic.palette.len());

    for (entry, pair) in schematic.palette.iter().zip(legacy) {
        if *entry == air {
            ids.push(ClassicId { id: 0, data: 0, synthetic: false });
            continue;
        }
        if let Some((id, data)) = pair {
            ids.push(ClassicId { id, data, synthetic: false });
            continue;
        }
        let id = match synthetic.get(entry) {
            Some(&id) => id,
            None => {
                while is_table_id(next_id) || taken.contains(&next_id) {
                    next_id += 1;
                }
                if next_id as usize > MAX_BLOCK_ID {
                    return Err(CodecError::PaletteTooLarge {
                        format: SchematicFormat::Schematic,
                        len: schematic.palette.len(),
                        max: MAX_BLOCK_ID,
                    });
                }
                let id = next_id;
                synthetic.insert(entry, id);
                next_id += 1;
                id
            }
        };
        ids.push(ClassicId { id, data: 0, synthetic: true });
    }

    Ok(ids)
}

/// 解析时无法从方块数据还原的调色板差异：补充的空气、重复条目、未被使用的旧ID条目
fn palette_notes(schematic: &ParsedSchematic, ids: &[ClassicId]) -> PaletteNotes {
    let air = PaletteEntry::air();
    let has_gaps = schematic.blocks.len() < schematic.volume();
    let used: HashSet<&PaletteEntry> = schematic
        .blocks
        .iter()
        .map(|block| &schematic.palette[block.palette_index as usize])
        .collect();

    let mut notes = PaletteNotes {
        added_air: has_gaps && !schematic.palette.contains(&air),
        merged: Vec::new(),
    };
    for (i, (entry, id)) in schematic.palette.iter().zip(ids).enumerate() {
        let repeated = schematic.palette[..i].contains(entry);
        let restored = if *entry == air {
            has_gaps
        } else {
            id.synthetic || used.contains(entry)
        };
        if repeated || !restored {
            notes.merged.push(entry.clone());
        }
    }
    notes
}

/// 合并 `Blocks` 低8位与 `AddBlocks` 高4位
fn block_id(blocks: &[u8], add: Option<&[u8]>, index: usize) -> u16 {
    let low = blocks[index] as u16;
    let high = match add.and_then(|add| add.get(index >> 1)) {
        Some(&nibbles) if index & 1 == 0 => (nibbles & 0x0F) as u16,
        Some(&nibbles) => ((nibbles >> 4) & 0x0F) as u16,
        None => 0,
    };
    (high << 8) | low
}

/// 读取 `SchematicaMapping`（方块状态字符串 → ID）
fn read_mapping(fields: &Fields<'_>) -> Result<BTreeMap<u16, PaletteEntry>, CodecError> {
    let mut mapping = BTreeMap::new();
    let Some(compound) = fields.opt_compound(MAPPING_KEY)? else {
        return Ok(mapping);
    };

    for (state, tag) in compound.inner() {
        let id = tag
            .as_i32()
            .and_then(|id| u16::try_from(id).ok())
            .ok_or_else(|| CodecError::malformed(SchematicFormat::Schematic, format!("映射 {} 的ID无效", state)))?;
        mapping.insert(id, state.parse::<PaletteEntry>()?);
    }

    Ok(mapping)
}

/// `(ID, 数据值)` → 调色板条目
fn pair_entry(mapping: &BTreeMap<u16, PaletteEntry>, id: u16, data: u8) -> PaletteEntry {
    match mapping.get(&id) {
        Some(entry) if data == 0 => entry.clone(),
        Some(entry) => {
            let mut properties = entry.properties.clone().unwrap_or_default();
            properties.insert("data".to_string(), data.to_string());
            PaletteEntry::with_properties(entry.name.clone(), properties)
        }
        None => legacy_entry(id, data),
    }
}
