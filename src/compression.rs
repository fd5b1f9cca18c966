use crate::error::CodecError;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};

/// gzip 魔数
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// 默认 gzip 压缩级别
pub const DEFAULT_LEVEL: u32 = 6;

/// 结构文件使用的压缩方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
}

/// 数据是否以 gzip 魔数开头
pub fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(&GZIP_MAGIC)
}

/// 压缩数据
pub fn compress_data(data: &[u8], compression: Compression, level: u32) -> Result<Vec<u8>, CodecError> {
    match compression {
        Compression::None => Ok(data.to_vec()),

        Compression::Gzip => {
            let mut encoder = GzEncoder::new(
                Vec::with_capacity(data.len() / 4),
                flate2::Compression::new(level.min(9)),
            );
            encoder.write_all(data)?;
            Ok(encoder.finish()?)
        }
    }
}

/// 解压数据
pub fn decompress_data(data: &[u8], compression: Compression) -> Result<Vec<u8>, CodecError> {
    match compression {
        Compression::None => Ok(data.to_vec()),

        Compression::Gzip => {
            let mut decompressed = Vec::new();
            let mut decoder = GzDecoder::new(data);
            decoder.read_to_end(&mut decompressed)?;
            Ok(decompressed)
        }
    }
}

/// 按内容判断是否需要解压：带 gzip 魔数的一律解压，否则原样返回
pub fn decompress_lenient(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    if is_gzip(data) {
        decompress_data(data, Compression::Gzip)
    } else {
        decompress_data(data, Compression::None)
    }
}
