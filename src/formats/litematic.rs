//! Litematica `.litematic`：gzip + 大端NBT，每个区域有自己的 `BlockStatePalette` 列表
//! 和按位打包的 `BlockStates` 长整型数组。
//!
//! 区域内的迭代顺序为 `y`、`z`、`x`（x 最内）。`Size` 可以为负，表示区域从 `Position`
//! 向负方向延伸。多区域文件按所有区域的最小角对齐到零点，区域重叠时后面的区域覆盖前面的。

use super::{collect_blocks, flat_position, Cell, DensePalette, FormatAdapter, Fields, PaletteNotes};
use crate::bitpack;
use crate::config::CodecOptions;
use crate::error::CodecError;
use crate::nbt::{NbtCompound, Tag};
use crate::palette::PaletteBuilder;
use crate::types::{Block, Dimensions, PaletteEntry, ParsedSchematic};
use crate::validation::validate_declared;
use crate::SchematicFormat;
use log::debug;
use std::collections::{BTreeMap, HashMap};

/// 写出的 Litematica 版本
pub const LITEMATIC_VERSION: i32 = 6;
pub const LITEMATIC_SUB_VERSION: i32 = 1;

pub struct Litematic;

/// 解析出的单个区域
struct Region<'a> {
    name: &'a str,
    /// 区域最小角的绝对坐标
    min: [i32; 3],
    dimensions: Dimensions,
    palette: Vec<PaletteEntry>,
    states: &'a [i64],
}

impl FormatAdapter for Litematic {
    const FORMAT: SchematicFormat = SchematicFormat::Litematic;

    fn parse(root: &NbtCompound, options: &CodecOptions) -> Result<ParsedSchematic, CodecError> {
        let fields = Fields::new(Self::FORMAT, root);
        if let Some(version) = fields.opt_int("Version")? {
            debug!("Litematica 版本 {}", version);
        }

        let regions_fields = fields.compound("Regions")?;
        let mut regions = Vec::with_capacity(regions_fields.inner().len());
        for name in regions_fields.inner().keys() {
            let region = regions_fields.compound(name)?;
            regions.push(read_region(name, &region, options)?);
        }
        if regions.is_empty() {
            return Err(CodecError::malformed(Self::FORMAT, "Regions 为空"));
        }

        // 所有区域的包围盒
        let mut origin = regions[0].min;
        let mut far = [i32::MIN; 3];
        for region in &regions {
            let size = region.dimensions.as_array();
            for axis in 0..3 {
                origin[axis] = origin[axis].min(region.min[axis]);
                far[axis] = far[axis].max(region.min[axis].saturating_add(size[axis]));
            }
        }
        let extent = Dimensions::new(
            far[0].saturating_sub(origin[0]),
            far[1].saturating_sub(origin[1]),
            far[2].saturating_sub(origin[2]),
        );

        let metadata = fields.opt_compound("Metadata")?;
        let dimensions = match metadata {
            Some(metadata) if metadata.has("EnclosingSize") => {
                let enclosing = read_vec3(&metadata.compound("EnclosingSize")?)?;
                let declared = Dimensions::new(enclosing[0], enclosing[1], enclosing[2]);
                validate_declared(&declared, Self::FORMAT, options.max_dimension)?;
                if declared.x < extent.x || declared.y < extent.y || declared.z < extent.z {
                    return Err(CodecError::malformed(
                        Self::FORMAT,
                        format!(
                            "EnclosingSize {}x{}x{} 小于区域范围 {}x{}x{}",
                            declared.x, declared.y, declared.z, extent.x, extent.y, extent.z
                        ),
                    ));
                }
                declared
            }
            _ => extent,
        };
        validate_declared(&dimensions, Self::FORMAT, options.max_dimension)?;

        let parsed = if regions.len() == 1 {
            let region = &regions[0];
            let indices = unpack_region(region)?;
            let blocks = collect_blocks(&region.dimensions, &region.palette, indices.into_iter().map(Cell::Present))?;
            ParsedSchematic::new(dimensions, region.palette.clone(), blocks)
        } else {
            merge_regions(&regions, origin, dimensions)?
        };
        let parsed = PaletteNotes::read(metadata)?.apply(parsed);

        debug!(
            "Litematic: {} 个区域, {}x{}x{}, 调色板 {} 项, {} 个方块",
            regions.len(),
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
        let dense = DensePalette::positional(schematic);
        // 位宽按输出调色板计算
        let bits = bitpack::bits_per_entry(dense.entries.len());
        let states = bitpack::pack(dense.fill(schematic), dimensions.volume(), bits);

        let palette = dense.entries.iter().map(write_palette_entry).collect();

        let mut region = NbtCompound::new();
        region.insert("Position".to_string(), write_vec3([0, 0, 0]));
        region.insert("Size".to_string(), write_vec3(dimensions.as_array()));
        region.insert("BlockStatePalette".to_string(), Tag::List(palette));
        region.insert("BlockStates".to_string(), Tag::LongArray(states));
        region.insert("TileEntities".to_string(), super::empty_list());
        region.insert("Entities".to_string(), super::empty_list());
        region.insert("PendingBlockTicks".to_string(), super::empty_list());
        region.insert("PendingFluidTicks".to_string(), super::empty_list());

        let mut regions = NbtCompound::new();
        regions.insert(options.name.clone(), Tag::Compound(region));

        let mut metadata = NbtCompound::new();
        metadata.insert("Name".to_string(), Tag::String(options.name.clone()));
        metadata.insert("Author".to_string(), Tag::String(options.author.clone()));
        metadata.insert("Description".to_string(), Tag::String(options.description.clone()));
        metadata.insert("RegionCount".to_string(), Tag::Int(1));
        metadata.insert("TotalVolume".to_string(), Tag::Int(dimensions.volume() as i32));
        metadata.insert("TotalBlocks".to_string(), Tag::Int(schematic.block_count() as i32));
        metadata.insert("TimeCreated".to_string(), Tag::Long(options.timestamp));
        metadata.insert("TimeModified".to_string(), Tag::Long(options.timestamp));
        metadata.insert("EnclosingSize".to_string(), write_vec3(dimensions.as_array()));
        dense.notes().write(&mut metadata);

        let mut root = NbtCompound::new();
        root.insert("MinecraftDataVersion".to_string(), Tag::Int(options.data_version));
        root.insert("Version".to_string(), Tag::Int(LITEMATIC_VERSION));
        root.insert("SubVersion".to_string(), Tag::Int(LITEMATIC_SUB_VERSION));
        root.insert("Metadata".to_string(), Tag::Compound(metadata));
        root.insert("Regions".to_string(), Tag::Compound(regions));

        Ok(root)
    }
}

fn read_vec3(fields: &Fields<'_>) -> Result<[i32; 3], CodecError> {
    Ok([fields.int("x")?, fields.int("y")?, fields.int("z")?])
}

fn write_vec3(values: [i32; 3]) -> Tag {
    let mut compound = NbtCompound::new();
    compound.insert("x".to_string(), Tag::Int(values[0]));
    compound.insert("y".to_string(), Tag::Int(values[1]));
    compound.insert("z".to_string(), Tag::Int(values[2]));
    Tag::Compound(compound)
}

fn read_region<'a>(name: &'a str, fields: &Fields<'a>, options: &CodecOptions) -> Result<Region<'a>, CodecError> {
    let position = read_vec3(&fields.compound("Position")?)?;
    let size = read_vec3(&fields.compound("Size")?)?;

    let dimensions = Dimensions::new(size[0].saturating_abs(), size[1].saturating_abs(), size[2].saturating_abs());
    validate_declared(&dimensions, SchematicFormat::Litematic, options.max_dimension)?;

    let mut min = [0; 3];
    for axis in 0..3 {
        min[axis] = if size[axis] < 0 {
            position[axis].saturating_add(size[axis] + 1)
        } else {
            position[axis]
        };
    }

    let palette = fields
        .compound_list("BlockStatePalette")?
        .iter()
        .map(read_palette_entry)
        .collect::<Result<Vec<_>, _>>()?;
    if palette.is_empty() {
        return Err(CodecError::EmptyPalette);
    }

    Ok(Region {
        name,
        min,
        dimensions,
        palette,
        states: fields.long_array("BlockStates")?,
    })
}

fn unpack_region(region: &Region<'_>) -> Result<Vec<u32>, CodecError> {
    let bits = bitpack::bits_per_entry(region.palette.len());
    let indices = bitpack::unpack(region.states, region.dimensions.volume(), bits)?;
    debug!("区域 {}: {} 位/条目, {} 个长整型", region.name, bits, region.states.len());
    Ok(indices)
}

/// 多区域合并：调色板按条目去重，坐标平移到共同原点
fn merge_regions(regions: &[Region<'_>], origin: [i32; 3], dimensions: Dimensions) -> Result<ParsedSchematic, CodecError> {
    let mut builder = PaletteBuilder::new();
    let mut placed: HashMap<(i32, i32, i32), u32> = HashMap::new();

    for region in regions {
        let remap: Vec<u32> = region
            .palette
            .iter()
            .map(|entry| builder.intern(entry.clone()))
            .collect();
        let offset = [
            region.min[0] - origin[0],
            region.min[1] - origin[1],
            region.min[2] - origin[2],
        ];

        for (i, index) in unpack_region(region)?.into_iter().enumerate() {
            let (x, y, z) = flat_position(&region.dimensions, i);
            let entry = region
                .palette
                .get(index as usize)
                .ok_or_else(|| CodecError::PaletteIndexOutOfRange {
                    x: x + offset[0],
                    y: y + offset[1],
                    z: z + offset[2],
                    index,
                    len: region.palette.len(),
                })?;
            if entry.is_air() {
                continue;
            }
            placed.insert((x + offset[0], y + offset[1], z + offset[2]), remap[index as usize]);
        }
    }

    let mut blocks: Vec<Block> = placed
        .into_iter()
        .map(|((x, y, z), index)| Block::new(x, y, z, index))
        .collect();
    blocks.sort_by_key(|b| (b.y, b.z, b.x));

    Ok(ParsedSchematic::new(dimensions, builder.into_entries(), blocks))
}

fn read_palette_entry(fields: &Fields<'_>) -> Result<PaletteEntry, CodecError> {
    let name = fields.string("Name")?;
    let Some(properties) = fields.opt_compound("Properties")? else {
        return Ok(PaletteEntry::new(name));
    };

    let mut map = BTreeMap::new();
    for key in properties.inner().keys() {
        map.insert(key.clone(), properties.string(key)?.to_string());
    }
    Ok(PaletteEntry::with_properties(name, map))
}

fn write_palette_entry(entry: &PaletteEntry) -> Tag {
    let mut compound = NbtCompound::new();
    compound.insert("Name".to_string(), Tag::String(entry.name.clone()));
    if let Some(properties) = &entry.properties {
        let props = properties
            .iter()
            .map(|(k, v)| (k.clone(), Tag::String(v.clone())))
            .collect();
        compound.insert("Properties".to_string(), Tag::Compound(props));
    }
    Tag::Compound(compound)
}
