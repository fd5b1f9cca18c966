use clap::{Parser, Subcommand};
use schemcodec::{
    read_from_file, read_from_file_as, write_to_file, write_to_file_as, CodecError, CodecOptions, ParsedSchematic,
    SchematicFormat,
};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Minecraft 建筑结构文件转换工具 - 支持 .schematic / .schem / .litematic / .mcstructure
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON 配置文件（CodecOptions）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 在两种结构文件格式之间转换
    Convert {
        /// 输入文件路径
        #[arg(short, long)]
        input: PathBuf,

        /// 输出文件路径
        #[arg(short, long)]
        output: PathBuf,

        /// 输入格式，默认由扩展名决定
        #[arg(long)]
        from: Option<SchematicFormat>,

        /// 输出格式，默认由扩展名决定
        #[arg(long)]
        to: Option<SchematicFormat>,
    },

    /// 查看结构文件信息
    Info {
        /// 结构文件路径
        #[arg(short, long)]
        file: PathBuf,

        /// 是否列出完整调色板
        #[arg(short, long)]
        verbose: bool,
    },

    /// 将结构文件导出为 JSON
    Export {
        /// 输入结构文件
        #[arg(short, long)]
        input: PathBuf,

        /// 输出 JSON 文件
        #[arg(short, long)]
        output: PathBuf,
    },

    /// 从 JSON 生成结构文件
    Import {
        /// 输入 JSON 文件
        #[arg(short, long)]
        input: PathBuf,

        /// 输出结构文件，格式由扩展名决定
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<(), CodecError> {
    env_logger::init();
    let cli = Cli::parse();

    let mut options = match &cli.config {
        Some(path) => CodecOptions::from_json_file(path)?,
        None => CodecOptions::default(),
    };
    if options.timestamp == 0 {
        options.timestamp = now_millis();
    }

    let result = match &cli.command {
        Commands::Convert { input, output, from, to } => {
            convert_file(input, output, *from, *to, &options)
        }
        Commands::Info { file, verbose } => print_info(file, *verbose, &options),
        Commands::Export { input, output } => export_json(input, output, &options),
        Commands::Import { input, output } => import_json(input, output, &options),
    };

    if let Err(e) = &result {
        eprintln!("操作失败: {}", e);
    }
    result
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn check_input(path: &Path) -> Result<(), CodecError> {
    if !path.exists() {
        return Err(CodecError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("输入文件不存在: {}", path.display()),
        )));
    }
    Ok(())
}

fn convert_file(
    input: &Path,
    output: &Path,
    from: Option<SchematicFormat>,
    to: Option<SchematicFormat>,
    options: &CodecOptions,
) -> Result<(), CodecError> {
    check_input(input)?;
    let from = match from {
        Some(format) => format,
        None => SchematicFormat::from_path(input)?,
    };
    let to = match to {
        Some(format) => format,
        None => SchematicFormat::from_path(output)?,
    };

    println!("输入: {} ({})", input.display(), from);
    println!("输出: {} ({})", output.display(), to);

    let schematic = read_from_file_as(input, from, options)?;
    write_to_file_as(output, to, &schematic, options)?;

    let written = std::fs::metadata(output)?.len();
    println!("转换完成: {} 个方块, {} 字节", schematic.block_count(), written);
    Ok(())
}

fn print_info(file: &Path, verbose: bool, options: &CodecOptions) -> Result<(), CodecError> {
    check_input(file)?;
    let format = SchematicFormat::from_path(file)?;
    let schematic = read_from_file(file, options)?;
    let dims = schematic.dimensions;

    println!("=== 结构文件信息 ===");
    println!("文件: {}", file.display());
    println!("格式: {}", format);
    println!("尺寸: {} x {} x {}", dims.x, dims.y, dims.z);
    println!("体积: {}", schematic.volume());
    println!("方块数量: {}", schematic.block_count());
    println!("调色板大小: {}", schematic.palette.len());

    if verbose {
        let mut counts = vec![0usize; schematic.palette.len()];
        for block in &schematic.blocks {
            counts[block.palette_index as usize] += 1;
        }

        println!("\n=== 调色板 ===");
        for (i, (entry, count)) in schematic.palette.iter().zip(&counts).enumerate() {
            println!("  #{}: {} ({} 个)", i, entry, count);
        }
    }

    Ok(())
}

fn export_json(input: &Path, output: &Path, options: &CodecOptions) -> Result<(), CodecError> {
    check_input(input)?;
    let schematic = read_from_file(input, options)?;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(File::create(output)?);
    serde_json::to_writer_pretty(writer, &schematic)
        .map_err(|e| CodecError::Config(format!("JSON写入错误: {}", e)))?;

    println!("导出完成: {}", output.display());
    Ok(())
}

fn import_json(input: &Path, output: &Path, options: &CodecOptions) -> Result<(), CodecError> {
    check_input(input)?;
    let reader = BufReader::new(File::open(input)?);
    let schematic: ParsedSchematic = serde_json::from_reader(reader)
        .map_err(|e| CodecError::Config(format!("JSON解析错误: {}", e)))?;

    write_to_file(output, &schematic, options)?;
    println!("导入完成: {} ({} 个方块)", output.display(), schematic.block_count());
    Ok(())
}
