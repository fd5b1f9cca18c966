pub mod classic;
pub mod litematic;
pub mod mcstructure;
pub mod sponge;

pub use classic::ClassicSchematic;
pub use litematic::Litematic;
pub use mcstructure::McStructure;
pub use sponge::SpongeSchematic;

use crate::config::CodecOptions;
use crate::error::CodecError;
use crate::nbt::{NbtCompound, Tag};
use crate::palette::{find_air, PaletteBuilder};
use crate::types::{Block, Dimensions, PaletteEntry, ParsedSchematic};
use crate::SchematicFormat;

/// 格式适配器：在标签树与统一模型之间转换
pub trait FormatAdapter {
    const FORMAT: SchematicFormat;

    fn parse(root: &NbtCompound, options: &CodecOptions) -> Result<ParsedSchematic, CodecError>;

    fn serialize(schematic: &ParsedSchematic, options: &CodecOptions) -> Result<NbtCompound, CodecError>;
}

/// 单个位置的查找结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cell {
    Present(u32),
    Absent,
}

/// `y` 最外、`z` 居中、`x` 最内的扁平索引，四种格式共用
pub(crate) fn flat_index(dimensions: &Dimensions, x: i32, y: i32, z: i32) -> usize {
    let width = dimensions.x as usize;
    let length = dimensions.z as usize;
    (y as usize * length + z as usize) * width + x as usize
}

/// `flat_index` 的逆运算
pub(crate) fn flat_position(dimensions: &Dimensions, index: usize) -> (i32, i32, i32) {
    let width = dimensions.x as usize;
    let length = dimensions.z as usize;
    let x = index % width;
    let z = (index / width) % length;
    let y = index / (width * length);
    (x as i32, y as i32, z as i32)
}

/// 将逐位置的查找结果收集为稀疏方块列表，空气和缺失位置被省略
pub(crate) fn collect_blocks<I>(
    dimensions: &Dimensions,
    palette: &[PaletteEntry],
    cells: I,
) -> Result<Vec<Block>, CodecError>
where
    I: IntoIterator<Item = Cell>,
{
    let air: Vec<bool> = palette.iter().map(PaletteEntry::is_air).collect();
    let mut blocks = Vec::new();

    for (i, cell) in cells.into_iter().enumerate() {
        let Cell::Present(index) = cell else {
            continue;
        };
        let (x, y, z) = flat_position(dimensions, i);
        match air.get(index as usize) {
            None => {
                return Err(CodecError::PaletteIndexOutOfRange {
                    x,
                    y,
                    z,
                    index,
                    len: palette.len(),
                })
            }
            Some(true) => continue,
            Some(false) => blocks.push(Block::new(x, y, z, index)),
        }
    }

    Ok(blocks)
}

/// 稠密格式写出时使用的调色板
pub(crate) struct DensePalette {
    pub entries: Vec<PaletteEntry>,
    /// 模型索引 → 输出索引
    pub remap: Vec<u32>,
    /// 空位写入的索引
    pub air: u32,
    /// 为填充空位而补充了空气条目
    pub added_air: bool,
    /// 写出时被合并掉的重复条目
    pub merged: Vec<PaletteEntry>,
}

impl DensePalette {
    /// 按条目去重（调色板以名称为键的格式）。模型没有空气且存在空位时在末尾补充空气。
    pub fn interned(schematic: &ParsedSchematic) -> Self {
        let mut builder = PaletteBuilder::new();
        let mut merged = Vec::new();
        let remap: Vec<u32> = schematic
            .palette
            .iter()
            .map(|entry| {
                let before = builder.len();
                let index = builder.intern(entry.clone());
                if builder.len() == before {
                    merged.push(entry.clone());
                }
                index
            })
            .collect();

        let added_air = needs_added_air(schematic);
        let air = match find_air(&schematic.palette) {
            Some(i) => remap[i],
            None if added_air => builder.intern(PaletteEntry::air()),
            None => 0,
        };

        Self {
            entries: builder.into_entries(),
            remap,
            air,
            added_air,
            merged,
        }
    }

    /// 保持模型调色板的顺序和重复条目（调色板为列表的格式）。需要补充空气时放在索引0。
    pub fn positional(schematic: &ParsedSchematic) -> Self {
        let added_air = needs_added_air(schematic);
        let shift = u32::from(added_air);

        let mut entries = Vec::with_capacity(schematic.palette.len() + shift as usize);
        if added_air {
            entries.push(PaletteEntry::air());
        }
        entries.extend(schematic.palette.iter().cloned());

        let air = find_air(&schematic.palette).map_or(0, |i| i as u32 + shift);

        Self {
            entries,
            remap: (0..schematic.palette.len() as u32).map(|i| i + shift).collect(),
            air,
            added_air,
            merged: Vec::new(),
        }
    }

    /// 按扁平顺序生成每个位置的输出索引
    pub fn fill(&self, schematic: &ParsedSchematic) -> Vec<u32> {
        let dimensions = &schematic.dimensions;
        let mut grid = vec![self.air; dimensions.volume()];
        for block in &schematic.blocks {
            grid[flat_index(dimensions, block.x, block.y, block.z)] = self.remap[block.palette_index as usize];
        }
        grid
    }

    pub fn notes(&self) -> PaletteNotes {
        PaletteNotes {
            added_air: self.added_air,
            merged: self.merged.clone(),
        }
    }
}

/// 存在空位且调色板中没有任何空气条目
pub(crate) fn needs_added_air(schematic: &ParsedSchematic) -> bool {
    schematic.blocks.len() < schematic.volume() && find_air(&schematic.palette).is_none()
}

const ADDED_AIR_KEY: &str = "AddedAir";
const MERGED_PALETTE_KEY: &str = "MergedPalette";

/// 写出时对调色板所做的改动，记录在文件中以便解析时还原
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PaletteNotes {
    pub added_air: bool,
    /// 无法从方块数据还原、解析时追加回调色板的条目
    pub merged: Vec<PaletteEntry>,
}

impl PaletteNotes {
    /// 写入目标复合标签；没有改动时不写任何字段
    pub fn write(&self, target: &mut NbtCompound) {
        if self.added_air {
            target.insert(ADDED_AIR_KEY.to_string(), Tag::Byte(1));
        }
        if !self.merged.is_empty() {
            let merged = self.merged.iter().map(|e| Tag::String(e.to_string())).collect();
            target.insert(MERGED_PALETTE_KEY.to_string(), Tag::List(merged));
        }
    }

    pub fn read(fields: Option<Fields<'_>>) -> Result<Self, CodecError> {
        let Some(fields) = fields else {
            return Ok(Self::default());
        };

        let added_air = fields.opt_int(ADDED_AIR_KEY)?.map_or(false, |v| v != 0);
        let mut merged = Vec::new();
        if fields.has(MERGED_PALETTE_KEY) {
            for tag in fields.list(MERGED_PALETTE_KEY)? {
                let state = tag
                    .as_str()
                    .ok_or_else(|| fields.wrong_type(MERGED_PALETTE_KEY, "字符串列表"))?;
                merged.push(state.parse()?);
            }
        }

        Ok(Self { added_air, merged })
    }

    /// 去掉写出时补充的空气条目并重映射索引，再追加被合并的重复条目
    pub fn apply(self, schematic: ParsedSchematic) -> ParsedSchematic {
        let ParsedSchematic {
            dimensions,
            mut palette,
            mut blocks,
        } = schematic;

        if self.added_air {
            if let Some(removed) = palette.iter().position(|e| *e == PaletteEntry::air()) {
                palette.remove(removed);
                for block in &mut blocks {
                    if block.palette_index as usize > removed {
                        block.palette_index -= 1;
                    }
                }
            }
        }
        palette.extend(self.merged);

        ParsedSchematic::new(dimensions, palette, blocks)
    }
}

/// 带格式上下文的复合标签访问器，缺失或类型不符时返回 `MalformedTagTree`
#[derive(Clone, Copy)]
pub(crate) struct Fields<'a> {
    format: SchematicFormat,
    compound: &'a NbtCompound,
}

impl<'a> Fields<'a> {
    pub fn new(format: SchematicFormat, compound: &'a NbtCompound) -> Self {
        Self { format, compound }
    }

    pub fn inner(&self) -> &'a NbtCompound {
        self.compound
    }

    pub fn has(&self, key: &str) -> bool {
        self.compound.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Result<&'a Tag, CodecError> {
        self.compound
            .get(key)
            .ok_or_else(|| CodecError::malformed(self.format, format!("缺少 {}", key)))
    }

    pub fn wrong_type(&self, key: &str, expected: &str) -> CodecError {
        CodecError::malformed(self.format, format!("{} 应为 {}", key, expected))
    }

    pub fn int(&self, key: &str) -> Result<i32, CodecError> {
        self.get(key)?
            .as_i32()
            .ok_or_else(|| self.wrong_type(key, "整数"))
    }

    pub fn opt_int(&self, key: &str) -> Result<Option<i32>, CodecError> {
        match self.compound.get(key) {
            Some(_) => self.int(key).map(Some),
            None => Ok(None),
        }
    }

    pub fn string(&self, key: &str) -> Result<&'a str, CodecError> {
        self.get(key)?
            .as_str()
            .ok_or_else(|| self.wrong_type(key, "String"))
    }

    pub fn compound(&self, key: &str) -> Result<Fields<'a>, CodecError> {
        self.get(key)?
            .as_compound()
            .map(|c| Fields::new(self.format, c))
            .ok_or_else(|| self.wrong_type(key, "Compound"))
    }

    pub fn opt_compound(&self, key: &str) -> Result<Option<Fields<'a>>, CodecError> {
        match self.compound.get(key) {
            Some(_) => self.compound(key).map(Some),
            None => Ok(None),
        }
    }

    pub fn list(&self, key: &str) -> Result<&'a [Tag], CodecError> {
        self.get(key)?
            .as_list()
            .ok_or_else(|| self.wrong_type(key, "List"))
    }

    pub fn byte_array(&self, key: &str) -> Result<&'a [u8], CodecError> {
        match self.get(key)? {
            Tag::ByteArray(bytes) => Ok(bytes),
            _ => Err(self.wrong_type(key, "ByteArray")),
        }
    }

    pub fn int_array(&self, key: &str) -> Result<&'a [i32], CodecError> {
        match self.get(key)? {
            Tag::IntArray(ints) => Ok(ints),
            _ => Err(self.wrong_type(key, "IntArray")),
        }
    }

    pub fn long_array(&self, key: &str) -> Result<&'a [i64], CodecError> {
        match self.get(key)? {
            Tag::LongArray(longs) => Ok(longs),
            _ => Err(self.wrong_type(key, "LongArray")),
        }
    }

    /// 列表元素必须是 Compound
    pub fn compound_list(&self, key: &str) -> Result<Vec<Fields<'a>>, CodecError> {
        self.list(key)?
            .iter()
            .map(|tag| {
                tag.as_compound()
                    .map(|c| Fields::new(self.format, c))
                    .ok_or_else(|| self.wrong_type(key, "Compound 列表"))
            })
            .collect()
    }

    /// 列表元素必须是整数
    pub fn int_list(&self, key: &str) -> Result<Vec<i32>, CodecError> {
        self.list(key)?
            .iter()
            .map(|tag| tag.as_i32().ok_or_else(|| self.wrong_type(key, "整数列表")))
            .collect()
    }
}

/// 空列表标签
pub(crate) fn empty_list() -> Tag {
    Tag::List(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_index_is_y_then_z_then_x() {
        let dims = Dimensions::new(3, 4, 5);
        assert_eq!(flat_index(&dims, 1, 0, 0), 1);
        assert_eq!(flat_index(&dims, 0, 0, 1), 3);
        assert_eq!(flat_index(&dims, 0, 1, 0), 15);
        for i in 0..dims.volume() {
            let (x, y, z) = flat_position(&dims, i);
            assert_eq!(flat_index(&dims, x, y, z), i);
        }
    }

    #[test]
    fn interned_palette_appends_air_only_for_gaps() {
        let stone = PaletteEntry::new("minecraft:stone");
        let full = ParsedSchematic::new(Dimensions::new(1, 1, 1), vec![stone.clone()], vec![Block::new(0, 0, 0, 0)]);
        let dense = DensePalette::interned(&full);
        assert_eq!(dense.entries, vec![stone.clone()]);
        assert!(!dense.added_air);

        let sparse = ParsedSchematic::new(Dimensions::new(2, 1, 1), vec![stone.clone()], vec![Block::new(0, 0, 0, 0)]);
        let dense = DensePalette::interned(&sparse);
        assert_eq!(dense.entries, vec![stone, PaletteEntry::air()]);
        assert!(dense.added_air);
        assert_eq!(dense.fill(&sparse), vec![0, 1]);
    }

    #[test]
    fn interned_palette_records_merged_duplicates() {
        let stone = PaletteEntry::new("minecraft:stone");
        let palette = vec![stone.clone(), PaletteEntry::air(), stone.clone()];
        let schematic = ParsedSchematic::new(
            Dimensions::new(3, 1, 1),
            palette,
            vec![Block::new(0, 0, 0, 2), Block::new(2, 0, 0, 0)],
        );
        let dense = DensePalette::interned(&schematic);
        assert_eq!(dense.entries.len(), 2);
        assert_eq!(dense.remap, vec![0, 1, 0]);
        assert_eq!(dense.air, 1);
        assert!(!dense.added_air);
        assert_eq!(dense.merged, vec![stone]);
        assert_eq!(dense.fill(&schematic), vec![0, 1, 0]);
    }

    #[test]
    fn positional_palette_keeps_order_and_duplicates() {
        let stone = PaletteEntry::new("minecraft:stone");
        let sparse = ParsedSchematic::new(
            Dimensions::new(3, 1, 1),
            vec![stone.clone(), stone.clone()],
            vec![Block::new(0, 0, 0, 1), Block::new(2, 0, 0, 0)],
        );
        let dense = DensePalette::positional(&sparse);
        assert_eq!(dense.entries, vec![PaletteEntry::air(), stone.clone(), stone.clone()]);
        assert_eq!(dense.remap, vec![1, 2]);
        assert_eq!(dense.fill(&sparse), vec![2, 0, 1]);

        // 已有空气时不移动它
        let with_air = ParsedSchematic::new(
            Dimensions::new(2, 1, 1),
            vec![stone.clone(), PaletteEntry::air()],
            vec![Block::new(0, 0, 0, 0)],
        );
        let dense = DensePalette::positional(&with_air);
        assert!(!dense.added_air);
        assert_eq!(dense.entries.len(), 2);
        assert_eq!(dense.fill(&with_air), vec![0, 1]);
    }

    #[test]
    fn notes_undo_added_air_and_merges() {
        let stone = PaletteEntry::new("minecraft:stone");
        let parsed = ParsedSchematic::new(
            Dimensions::new(2, 1, 1),
            vec![PaletteEntry::air(), stone.clone()],
            vec![Block::new(1, 0, 0, 1)],
        );
        let notes = PaletteNotes {
            added_air: true,
            merged: vec![stone.clone()],
        };

        let mut compound = NbtCompound::new();
        notes.write(&mut compound);
        let read = PaletteNotes::read(Some(Fields::new(SchematicFormat::Schem, &compound))).unwrap();
        assert_eq!(read, notes);

        let restored = read.apply(parsed);
        assert_eq!(restored.palette, vec![stone.clone(), stone]);
        assert_eq!(restored.blocks, vec![Block::new(1, 0, 0, 0)]);

        let mut empty = NbtCompound::new();
        PaletteNotes::default().write(&mut empty);
        assert!(empty.is_empty());
    }

    #[test]
    fn collect_blocks_skips_air_and_absent_cells() {
        let dims = Dimensions::new(4, 1, 1);
        let palette = vec![PaletteEntry::air(), PaletteEntry::new("minecraft:stone")];
        let cells = vec![Cell::Present(0), Cell::Present(1), Cell::Absent, Cell::Present(1)];
        let blocks = collect_blocks(&dims, &palette, cells).unwrap();
        assert_eq!(blocks, vec![Block::new(1, 0, 0, 1), Block::new(3, 0, 0, 1)]);
    }

    #[test]
    fn collect_blocks_reports_bad_index_with_position() {
        let dims = Dimensions::new(2, 1, 1);
        let palette = vec![PaletteEntry::new("minecraft:stone")];
        let result = collect_blocks(&dims, &palette, vec![Cell::Present(0), Cell::Present(5)]);
        assert!(matches!(
            result,
            Err(CodecError::PaletteIndexOutOfRange { x: 1, index: 5, len: 1, .. })
        ));
    }
}
