use crate::error::CodecError;
use crate::types::PaletteEntry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// 空气方块名称
pub const AIR: &str = "minecraft:air";

/// 判断方块名称是否为空气
pub fn is_air_name(name: &str) -> bool {
    name == AIR || name == "air"
}

impl fmt::Display for PaletteEntry {
    /// 输出 `name[key=value,...]` 形式的方块状态字符串
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(props) = &self.properties {
            f.write_str("[")?;
            for (i, (key, value)) in props.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{}={}", key, value)?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

impl FromStr for PaletteEntry {
    type Err = CodecError;

    /// 解析 `name[key=value,...]` 形式的方块状态字符串
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CodecError::InvalidBlockState(s.to_string());

        let (name, props) = match s.find('[') {
            Some(open) => {
                let rest = s[open + 1..].strip_suffix(']').ok_or_else(invalid)?;
                (&s[..open], Some(rest))
            }
            None => (s, None),
        };

        if name.is_empty() || name.contains(']') {
            return Err(invalid());
        }

        let mut properties = BTreeMap::new();
        if let Some(props) = props {
            for pair in props.split(',').filter(|p| !p.is_empty()) {
                let (key, value) = pair.split_once('=').ok_or_else(invalid)?;
                if key.is_empty() {
                    return Err(invalid());
                }
                properties.insert(key.to_string(), value.to_string());
            }
        }

        Ok(PaletteEntry::with_properties(name, properties))
    }
}

/// 按首次出现顺序去重构建调色板
#[derive(Debug, Default)]
pub struct PaletteBuilder {
    entries: Vec<PaletteEntry>,
    index: HashMap<PaletteEntry, u32>,
}

impl PaletteBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回条目的索引，不存在时追加
    pub fn intern(&mut self, entry: PaletteEntry) -> u32 {
        if let Some(&index) = self.index.get(&entry) {
            return index;
        }
        let index = self.entries.len() as u32;
        self.index.insert(entry.clone(), index);
        self.entries.push(entry);
        index
    }

    pub fn get(&self, entry: &PaletteEntry) -> Option<u32> {
        self.index.get(entry).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<PaletteEntry> {
        self.entries
    }
}

/// 查找调色板中的空气条目
pub fn find_air(palette: &[PaletteEntry]) -> Option<usize> {
    palette.iter().position(PaletteEntry::is_air)
}

/// 经典格式的旧数字ID名称表（只覆盖常见方块）
const LEGACY_NAMES: &[(u16, &str)] = &[
    (0, "minecraft:air"),
    (1, "minecraft:stone"),
    (2, "minecraft:grass_block"),
    (3, "minecraft:dirt"),
    (4, "minecraft:cobblestone"),
    (5, "minecraft:oak_planks"),
    (7, "minecraft:bedrock"),
    (8, "minecraft:flowing_water"),
    (9, "minecraft:water"),
    (10, "minecraft:flowing_lava"),
    (11, "minecraft:lava"),
    (12, "minecraft:sand"),
    (13, "minecraft:gravel"),
    (14, "minecraft:gold_ore"),
    (15, "minecraft:iron_ore"),
    (16, "minecraft:coal_ore"),
    (17, "minecraft:oak_log"),
    (18, "minecraft:oak_leaves"),
    (20, "minecraft:glass"),
    (24, "minecraft:sandstone"),
    (35, "minecraft:white_wool"),
    (41, "minecraft:gold_block"),
    (42, "minecraft:iron_block"),
    (45, "minecraft:bricks"),
    (48, "minecraft:mossy_cobblestone"),
    (49, "minecraft:obsidian"),
    (50, "minecraft:torch"),
    (53, "minecraft:oak_stairs"),
    (54, "minecraft:chest"),
    (57, "minecraft:diamond_block"),
    (58, "minecraft:crafting_table"),
    (61, "minecraft:furnace"),
    (67, "minecraft:cobblestone_stairs"),
    (80, "minecraft:snow_block"),
    (82, "minecraft:clay"),
    (87, "minecraft:netherrack"),
    (89, "minecraft:glowstone"),
    (98, "minecraft:stone_bricks"),
    (155, "minecraft:quartz_block"),
];

/// 旧数字ID + 数据值 → 调色板条目
pub fn legacy_entry(id: u16, data: u8) -> PaletteEntry {
    let name = LEGACY_NAMES
        .iter()
        .find(|(legacy, _)| *legacy == id)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| format!("minecraft:legacy_{}", id));

    if data == 0 {
        PaletteEntry::new(name)
    } else {
        PaletteEntry::with_properties(name, [("data", data.to_string())])
    }
}

/// ID 是否在旧ID表中
pub fn is_table_id(id: u16) -> bool {
    LEGACY_NAMES.iter().any(|(legacy, _)| *legacy == id)
}

/// `legacy_entry` 的逆运算：条目能被旧ID + 数据值原样表示时返回 `(ID, 数据值)`。
///
/// 空气不在此列，数据值必须是 1..=15 的规范十进制写法。
pub fn legacy_pair(entry: &PaletteEntry) -> Option<(u16, u8)> {
    let id = match LEGACY_NAMES.iter().find(|(_, name)| *name == entry.name) {
        Some((id, _)) => *id,
        None => {
            let id: u16 = entry.name.strip_prefix("minecraft:legacy_")?.parse().ok()?;
            if is_table_id(id) || id > 0xFFF {
                return None;
            }
            id
        }
    };
    if id == 0 {
        return None;
    }

    let data = match &entry.properties {
        None => 0,
        Some(props) if props.len() == 1 => props.get("data")?.parse::<u8>().ok().filter(|d| (1..=15).contains(d))?,
        Some(_) => return None,
    };

    // 只接受能原样还原的写法（例如排除 "data=07"）
    (legacy_entry(id, data) == *entry).then_some((id, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn state_string_round_trips_properties() {
        let entry: PaletteEntry = "minecraft:oak_stairs[half=bottom,facing=north]".parse().unwrap();
        assert_eq!(entry.name, "minecraft:oak_stairs");
        assert_eq!(entry.property("facing"), Some("north"));
        assert_eq!(entry.property("half"), Some("bottom"));
        // 属性按键排序输出
        assert_eq!(entry.to_string(), "minecraft:oak_stairs[facing=north,half=bottom]");
    }

    #[test]
    fn state_string_without_properties() {
        let entry: PaletteEntry = "minecraft:stone".parse().unwrap();
        assert_eq!(entry, PaletteEntry::new("minecraft:stone"));
        let empty: PaletteEntry = "minecraft:stone[]".parse().unwrap();
        assert_eq!(empty.properties, None);
    }

    #[test]
    fn malformed_state_strings_are_rejected() {
        assert_matches!("".parse::<PaletteEntry>(), Err(CodecError::InvalidBlockState(_)));
        assert_matches!(
            "minecraft:stone[facing=north".parse::<PaletteEntry>(),
            Err(CodecError::InvalidBlockState(_))
        );
        assert_matches!(
            "minecraft:stone[facing]".parse::<PaletteEntry>(),
            Err(CodecError::InvalidBlockState(_))
        );
    }

    #[test]
    fn builder_deduplicates_in_first_seen_order() {
        let mut builder = PaletteBuilder::new();
        assert_eq!(builder.intern(PaletteEntry::new("minecraft:dirt")), 0);
        assert_eq!(builder.intern(PaletteEntry::new("minecraft:stone")), 1);
        assert_eq!(builder.intern(PaletteEntry::new("minecraft:dirt")), 0);
        assert_eq!(builder.len(), 2);
        assert_eq!(builder.into_entries()[1].name, "minecraft:stone");
    }

    #[test]
    fn legacy_ids_map_to_names() {
        assert!(legacy_entry(0, 0).is_air());
        assert_eq!(legacy_entry(1, 0), PaletteEntry::new("minecraft:stone"));
        assert_eq!(legacy_entry(35, 14).property("data"), Some("14"));
        assert_eq!(legacy_entry(3000, 0).name, "minecraft:legacy_3000");
    }

    #[test]
    fn legacy_pair_inverts_legacy_entry() {
        assert_eq!(legacy_pair(&PaletteEntry::new("minecraft:dirt")), Some((3, 0)));
        assert_eq!(legacy_pair(&legacy_entry(35, 14)), Some((35, 14)));
        assert_eq!(legacy_pair(&legacy_entry(3000, 2)), Some((3000, 2)));
        assert_eq!(legacy_pair(&PaletteEntry::air()), None);
        assert_eq!(legacy_pair(&PaletteEntry::new("minecraft:legacy_1")), None);
        assert_eq!(
            legacy_pair(&PaletteEntry::with_properties("minecraft:white_wool", [("data", "07")])),
            None
        );
        assert_eq!(
            legacy_pair(&PaletteEntry::with_properties("minecraft:oak_stairs", [("facing", "north")])),
            None
        );
        assert_eq!(legacy_pair(&PaletteEntry::new("minecraft:deepslate")), None);
    }
}
