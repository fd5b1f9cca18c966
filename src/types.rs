use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// 结构尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Dimensions {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// 总体积，任一维非正时为0
    pub fn volume(&self) -> usize {
        if self.x <= 0 || self.y <= 0 || self.z <= 0 {
            return 0;
        }
        self.x as usize * self.y as usize * self.z as usize
    }

    pub fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        (0..self.x).contains(&x) && (0..self.y).contains(&y) && (0..self.z).contains(&z)
    }

    pub fn as_array(&self) -> [i32; 3] {
        [self.x, self.y, self.z]
    }
}

/// 调色板条目：方块名称 + 可选的方块状态属性
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PaletteEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, String>>,
}

impl PaletteEntry {
    /// 创建不带属性的条目
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: None,
        }
    }

    /// 创建带属性的条目，空属性表归一化为 `None`
    pub fn with_properties<K, V, I>(name: impl Into<String>, properties: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let map: BTreeMap<String, String> = properties
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            name: name.into(),
            properties: if map.is_empty() { None } else { Some(map) },
        }
    }

    pub fn air() -> Self {
        Self::new(crate::palette::AIR)
    }

    /// 是否为空气（各格式中"无方块"的默认状态）
    pub fn is_air(&self) -> bool {
        crate::palette::is_air_name(&self.name)
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|p| p.get(key))
            .map(String::as_str)
    }
}

/// 结构中的单个方块（零起点坐标）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    #[serde(rename = "paletteIndex")]
    pub palette_index: u32,
}

impl Block {
    pub fn new(x: i32, y: i32, z: i32, palette_index: u32) -> Self {
        Self {
            x,
            y,
            z,
            palette_index,
        }
    }
}

/// 统一的体素模型，所有格式解析到它、从它序列化
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedSchematic {
    pub dimensions: Dimensions,
    pub palette: Vec<PaletteEntry>,
    pub blocks: Vec<Block>,
}

impl ParsedSchematic {
    pub fn new(dimensions: Dimensions, palette: Vec<PaletteEntry>, blocks: Vec<Block>) -> Self {
        Self {
            dimensions,
            palette,
            blocks,
        }
    }

    /// 已放置（非默认）方块数量
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn volume(&self) -> usize {
        self.dimensions.volume()
    }

    /// 按坐标查找调色板条目
    pub fn block_at(&self, x: i32, y: i32, z: i32) -> Option<&PaletteEntry> {
        self.blocks
            .iter()
            .rev()
            .find(|b| b.x == x && b.y == y && b.z == z)
            .and_then(|b| self.palette.get(b.palette_index as usize))
    }

    /// 坐标到调色板索引的映射
    pub fn block_map(&self) -> HashMap<(i32, i32, i32), u32> {
        self.blocks
            .iter()
            .map(|b| ((b.x, b.y, b.z), b.palette_index))
            .collect()
    }

    /// 调色板作为多重集合（忽略索引顺序），用于跨实例比较
    pub fn palette_multiset(&self) -> Vec<PaletteEntry> {
        let mut entries = self.palette.clone();
        entries.sort();
        entries
    }
}
