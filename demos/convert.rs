use schemcodec::{
    convert, parse, serialize, Block, CodecError, Dimensions, PaletteEntry, ParsedSchematic, SchematicFormat,
};

fn main() -> Result<(), CodecError> {
    // 一个 3x3x3 的小屋：石砖地板，橡木楼梯，中间放箱子
    println!("创建示例建筑...");
    let palette = vec![
        PaletteEntry::new("minecraft:stone_bricks"),
        PaletteEntry::with_properties("minecraft:oak_stairs", [("facing", "north"), ("half", "bottom")]),
        PaletteEntry::with_properties("minecraft:chest", [("facing", "south")]),
    ];

    let mut blocks = Vec::new();
    for x in 0..3 {
        for z in 0..3 {
            blocks.push(Block::new(x, 0, z, 0));
        }
        blocks.push(Block::new(x, 1, 0, 1));
    }
    blocks.push(Block::new(1, 1, 1, 2));

    let schematic = ParsedSchematic::new(Dimensions::new(3, 3, 3), palette, blocks);

    let sponge = serialize(SchematicFormat::Schem, &schematic)?;
    println!("Sponge .schem: {} 字节", sponge.len());

    // .schem → .litematic → .mcstructure
    let litematic = convert(SchematicFormat::Schem, SchematicFormat::Litematic, &sponge)?;
    println!("Litematic: {} 字节", litematic.len());

    let bedrock = convert(SchematicFormat::Litematic, SchematicFormat::McStructure, &litematic)?;
    println!("mcstructure: {} 字节", bedrock.len());

    let result = parse(SchematicFormat::McStructure, &bedrock)?;
    println!("\n最终结果:");
    println!(
        "  尺寸: {} x {} x {}",
        result.dimensions.x, result.dimensions.y, result.dimensions.z
    );
    println!("  方块数量: {}", result.block_count());
    for entry in &result.palette {
        println!("  调色板: {}", entry);
    }

    Ok(())
}
