//! 体素模型的校验。
//!
//! 检查按固定顺序进行，只报告第一个失败项：
//! 尺寸 → 空调色板 → 调色板索引 → 方块坐标 → 格式编码上限 → 尺寸上限 → 重复方块 → 空气方块。
//!
//! 空气在模型中表示为“没有方块”，稀疏列表里引用空气条目的方块会被拒绝。

use crate::error::CodecError;
use crate::types::{Dimensions, ParsedSchematic};
use crate::SchematicFormat;
use std::collections::HashSet;

/// 每一维必须为正
pub fn validate_dimensions(dimensions: &Dimensions) -> Result<(), CodecError> {
    let Dimensions { x, y, z } = *dimensions;
    if x <= 0 || y <= 0 || z <= 0 {
        return Err(CodecError::InvalidDimensions { x, y, z });
    }
    Ok(())
}

/// 格式尺寸字段的编码上限（16位有符号）
pub fn validate_encoding(dimensions: &Dimensions, format: SchematicFormat) -> Result<(), CodecError> {
    let max = format.max_encodable_dimension();
    for value in dimensions.as_array() {
        if value > max {
            return Err(CodecError::DimensionEncodingOverflow { format, value, max });
        }
    }
    Ok(())
}

/// 与编码无关的尺寸上限
pub fn validate_size_limit(dimensions: &Dimensions, max_dimension: i32) -> Result<(), CodecError> {
    for value in dimensions.as_array() {
        if value > max_dimension {
            return Err(CodecError::StructureTooLarge {
                value,
                max: max_dimension,
            });
        }
    }
    Ok(())
}

/// 解析前对声明尺寸的检查，在读取大数组之前拒绝不合理的输入
pub fn validate_declared(
    dimensions: &Dimensions,
    format: SchematicFormat,
    max_dimension: i32,
) -> Result<(), CodecError> {
    validate_dimensions(dimensions)?;
    validate_encoding(dimensions, format)?;
    validate_size_limit(dimensions, max_dimension)
}

/// 完整校验；`format` 为 `None` 时跳过格式编码上限
pub fn validate_schematic(
    schematic: &ParsedSchematic,
    format: Option<SchematicFormat>,
    max_dimension: i32,
) -> Result<(), CodecError> {
    let dimensions = &schematic.dimensions;
    validate_dimensions(dimensions)?;

    if schematic.palette.is_empty() {
        return Err(CodecError::EmptyPalette);
    }

    let len = schematic.palette.len();
    if let Some(block) = schematic
        .blocks
        .iter()
        .find(|b| b.palette_index as usize >= len)
    {
        return Err(CodecError::PaletteIndexOutOfRange {
            x: block.x,
            y: block.y,
            z: block.z,
            index: block.palette_index,
            len,
        });
    }

    if let Some(block) = schematic
        .blocks
        .iter()
        .find(|b| !dimensions.contains(b.x, b.y, b.z))
    {
        return Err(CodecError::BlockOutOfBounds {
            x: block.x,
            y: block.y,
            z: block.z,
        });
    }

    if let Some(format) = format {
        validate_encoding(dimensions, format)?;
    }
    validate_size_limit(dimensions, max_dimension)?;

    let mut seen = HashSet::with_capacity(schematic.blocks.len());
    for block in &schematic.blocks {
        if !seen.insert((block.x, block.y, block.z)) {
            return Err(CodecError::DuplicateBlock {
                x: block.x,
                y: block.y,
                z: block.z,
            });
        }
    }

    if let Some(block) = schematic
        .blocks
        .iter()
        .find(|b| schematic.palette[b.palette_index as usize].is_air())
    {
        return Err(CodecError::AirBlock {
            x: block.x,
            y: block.y,
            z: block.z,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Block, PaletteEntry};
    use crate::DEFAULT_MAX_DIMENSION;
    use assert_matches::assert_matches;

    fn stone(dimensions: Dimensions, blocks: Vec<Block>) -> ParsedSchematic {
        ParsedSchematic::new(dimensions, vec![PaletteEntry::new("minecraft:stone")], blocks)
    }

    #[test]
    fn first_failing_check_wins() {
        // 空调色板 + 尺寸为0：先报尺寸
        let schematic = ParsedSchematic::new(Dimensions::new(0, 1, 1), Vec::new(), Vec::new());
        assert_matches!(
            validate_schematic(&schematic, None, DEFAULT_MAX_DIMENSION),
            Err(CodecError::InvalidDimensions { x: 0, .. })
        );

        // 越界索引 + 超大尺寸：先报索引
        let schematic = stone(Dimensions::new(600, 1, 1), vec![Block::new(0, 0, 0, 1)]);
        assert_matches!(
            validate_schematic(&schematic, Some(SchematicFormat::Schem), DEFAULT_MAX_DIMENSION),
            Err(CodecError::PaletteIndexOutOfRange { index: 1, len: 1, .. })
        );
    }

    #[test]
    fn encoding_overflow_precedes_size_limit() {
        let schematic = stone(Dimensions::new(40000, 1, 1), Vec::new());
        assert_matches!(
            validate_schematic(&schematic, Some(SchematicFormat::Litematic), DEFAULT_MAX_DIMENSION),
            Err(CodecError::DimensionEncodingOverflow { value: 40000, max: 32767, .. })
        );
        assert_matches!(
            validate_schematic(&schematic, None, DEFAULT_MAX_DIMENSION),
            Err(CodecError::StructureTooLarge { value: 40000, max: 512 })
        );
    }

    #[test]
    fn block_outside_dimensions_is_rejected() {
        let schematic = stone(Dimensions::new(2, 2, 2), vec![Block::new(0, 2, 0, 0)]);
        assert_matches!(
            validate_schematic(&schematic, None, DEFAULT_MAX_DIMENSION),
            Err(CodecError::BlockOutOfBounds { x: 0, y: 2, z: 0 })
        );
        let schematic = stone(Dimensions::new(2, 2, 2), vec![Block::new(-1, 0, 0, 0)]);
        assert_matches!(
            validate_schematic(&schematic, None, DEFAULT_MAX_DIMENSION),
            Err(CodecError::BlockOutOfBounds { x: -1, .. })
        );
    }

    #[test]
    fn duplicate_positions_are_rejected() {
        let schematic = stone(
            Dimensions::new(2, 2, 2),
            vec![Block::new(1, 1, 1, 0), Block::new(1, 1, 1, 0)],
        );
        assert_matches!(
            validate_schematic(&schematic, None, DEFAULT_MAX_DIMENSION),
            Err(CodecError::DuplicateBlock { x: 1, y: 1, z: 1 })
        );
    }

    #[test]
    fn declared_dimensions_checked_before_payload() {
        assert_matches!(
            validate_declared(&Dimensions::new(1, -3, 1), SchematicFormat::Schematic, 512),
            Err(CodecError::InvalidDimensions { y: -3, .. })
        );
        assert!(validate_declared(&Dimensions::new(512, 512, 512), SchematicFormat::Schematic, 512).is_ok());
    }

    #[test]
    fn blocks_referencing_air_are_rejected() {
        let palette = vec![PaletteEntry::new("minecraft:stone"), PaletteEntry::new("air")];
        let schematic = ParsedSchematic::new(
            Dimensions::new(2, 1, 1),
            palette,
            vec![Block::new(0, 0, 0, 0), Block::new(1, 0, 0, 1)],
        );
        assert_matches!(
            validate_schematic(&schematic, None, DEFAULT_MAX_DIMENSION),
            Err(CodecError::AirBlock { x: 1, y: 0, z: 0 })
        );

        // 重复方块先于空气方块报告
        let schematic = ParsedSchematic::new(
            Dimensions::new(2, 1, 1),
            vec![PaletteEntry::air()],
            vec![Block::new(0, 0, 0, 0), Block::new(0, 0, 0, 0)],
        );
        assert_matches!(
            validate_schematic(&schematic, None, DEFAULT_MAX_DIMENSION),
            Err(CodecError::DuplicateBlock { .. })
        );
    }
}
