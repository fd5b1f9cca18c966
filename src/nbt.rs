// 结构文件使用的NBT标签树读写
// 只负责通用的标签结构，各格式的语义映射在 formats 模块中完成

use crate::error::CodecError;
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Write};

/// 复合标签，键有序以保证输出稳定
pub type NbtCompound = BTreeMap<String, Tag>;

/// 最大嵌套深度
const MAX_DEPTH: usize = 512;

/// 按声明长度预分配的上限，防止损坏的长度字段一次性申请过多内存
const MAX_PREALLOC: usize = 1 << 16;

/// NBT字节序：Java版为大端，基岩版为小端
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

/// NBT标签类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NbtTagType {
    End = 0,
    Byte = 1,
    Short = 2,
    Int = 3,
    Long = 4,
    Float = 5,
    Double = 6,
    ByteArray = 7,
    String = 8,
    List = 9,
    Compound = 10,
    IntArray = 11,
    LongArray = 12,
}

impl TryFrom<u8> for NbtTagType {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(NbtTagType::End),
            1 => Ok(NbtTagType::Byte),
            2 => Ok(NbtTagType::Short),
            3 => Ok(NbtTagType::Int),
            4 => Ok(NbtTagType::Long),
            5 => Ok(NbtTagType::Float),
            6 => Ok(NbtTagType::Double),
            7 => Ok(NbtTagType::ByteArray),
            8 => Ok(NbtTagType::String),
            9 => Ok(NbtTagType::List),
            10 => Ok(NbtTagType::Compound),
            11 => Ok(NbtTagType::IntArray),
            12 => Ok(NbtTagType::LongArray),
            _ => Err(CodecError::Nbt(format!("无效的NBT标签类型: {}", value))),
        }
    }
}

/// NBT标签值
#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<u8>),
    String(String),
    List(Vec<Tag>),
    Compound(NbtCompound),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl Tag {
    pub fn tag_type(&self) -> NbtTagType {
        match self {
            Tag::Byte(_) => NbtTagType::Byte,
            Tag::Short(_) => NbtTagType::Short,
            Tag::Int(_) => NbtTagType::Int,
            Tag::Long(_) => NbtTagType::Long,
            Tag::Float(_) => NbtTagType::Float,
            Tag::Double(_) => NbtTagType::Double,
            Tag::ByteArray(_) => NbtTagType::ByteArray,
            Tag::String(_) => NbtTagType::String,
            Tag::List(_) => NbtTagType::List,
            Tag::Compound(_) => NbtTagType::Compound,
            Tag::IntArray(_) => NbtTagType::IntArray,
            Tag::LongArray(_) => NbtTagType::LongArray,
        }
    }

    /// 整数类标签（Byte/Short/Int）统一取为 i32
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Tag::Byte(v) => Some(*v as i32),
            Tag::Short(v) => Some(*v as i32),
            Tag::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Tag::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_compound(&self) -> Option<&NbtCompound> {
        match self {
            Tag::Compound(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Tag]> {
        match self {
            Tag::List(list) => Some(list),
            _ => None,
        }
    }
}

/// 从字节读取根复合标签，返回 (根名称, 内容)
pub fn read_root(data: &[u8], endian: Endian) -> Result<(String, NbtCompound), CodecError> {
    let mut cursor = Cursor::new(data);
    let result = match endian {
        Endian::Big => read_root_with::<BigEndian, _>(&mut cursor),
        Endian::Little => read_root_with::<LittleEndian, _>(&mut cursor),
    };
    result.map_err(|e| CodecError::Nbt(e.to_string()))
}

/// 将根复合标签写为字节
pub fn write_root(name: &str, root: &NbtCompound, endian: Endian) -> Result<Vec<u8>, CodecError> {
    let mut buffer = Vec::new();
    let result = match endian {
        Endian::Big => write_root_with::<BigEndian, _>(&mut buffer, name, root),
        Endian::Little => write_root_with::<LittleEndian, _>(&mut buffer, name, root),
    };
    result.map_err(|e| CodecError::Nbt(e.to_string()))?;
    Ok(buffer)
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

fn read_len<B: ByteOrder, R: Read>(reader: &mut R) -> io::Result<usize> {
    let len = reader.read_i32::<B>()?;
    usize::try_from(len).map_err(|_| invalid(format!("负数长度: {}", len)))
}

fn read_root_with<B: ByteOrder, R: Read>(reader: &mut R) -> io::Result<(String, NbtCompound)> {
    let type_id = reader.read_u8()?;
    if type_id != NbtTagType::Compound as u8 {
        return Err(invalid(format!("根标签必须是Compound，实际为 {}", type_id)));
    }
    let name = read_string::<B, R>(reader)?;
    let root = read_compound::<B, R>(reader, 0)?;
    Ok((name, root))
}

fn read_string<B: ByteOrder, R: Read>(reader: &mut R) -> io::Result<String> {
    let len = reader.read_u16::<B>()? as usize;
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|e| invalid(e.to_string()))
}

fn read_compound<B: ByteOrder, R: Read>(reader: &mut R, depth: usize) -> io::Result<NbtCompound> {
    if depth > MAX_DEPTH {
        return Err(invalid("NBT嵌套过深"));
    }
    let mut compound = NbtCompound::new();
    loop {
        let type_id = reader.read_u8()?;
        if type_id == NbtTagType::End as u8 {
            break;
        }
        let name = read_string::<B, R>(reader)?;
        let tag = read_payload::<B, R>(reader, type_id, depth + 1)?;
        compound.insert(name, tag);
    }
    Ok(compound)
}

fn read_payload<B: ByteOrder, R: Read>(reader: &mut R, type_id: u8, depth: usize) -> io::Result<Tag> {
    let tag_type = NbtTagType::try_from(type_id).map_err(|e| invalid(e.to_string()))?;
    let tag = match tag_type {
        NbtTagType::End => return Err(invalid("意外的End标签")),
        NbtTagType::Byte => Tag::Byte(reader.read_i8()?),
        NbtTagType::Short => Tag::Short(reader.read_i16::<B>()?),
        NbtTagType::Int => Tag::Int(reader.read_i32::<B>()?),
        NbtTagType::Long => Tag::Long(reader.read_i64::<B>()?),
        NbtTagType::Float => Tag::Float(reader.read_f32::<B>()?),
        NbtTagType::Double => Tag::Double(reader.read_f64::<B>()?),
        NbtTagType::ByteArray => {
            let len = read_len::<B, R>(reader)?;
            let mut bytes = Vec::with_capacity(len.min(MAX_PREALLOC));
            reader.by_ref().take(len as u64).read_to_end(&mut bytes)?;
            if bytes.len() != len {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "ByteArray被截断"));
            }
            Tag::ByteArray(bytes)
        }
        NbtTagType::String => Tag::String(read_string::<B, R>(reader)?),
        NbtTagType::List => {
            let element_type = reader.read_u8()?;
            let len = read_len::<B, R>(reader)?;
            if depth > MAX_DEPTH {
                return Err(invalid("NBT嵌套过深"));
            }
            let mut list = Vec::with_capacity(len.min(MAX_PREALLOC));
            if element_type == NbtTagType::End as u8 {
                if len != 0 {
                    return Err(invalid("End类型的列表必须为空"));
                }
            } else {
                for _ in 0..len {
                    list.push(read_payload::<B, R>(reader, element_type, depth + 1)?);
                }
            }
            Tag::List(list)
        }
        NbtTagType::Compound => Tag::Compound(read_compound::<B, R>(reader, depth)?),
        NbtTagType::IntArray => {
            let len = read_len::<B, R>(reader)?;
            let mut ints = Vec::with_capacity(len.min(MAX_PREALLOC));
            for _ in 0..len {
                ints.push(reader.read_i32::<B>()?);
            }
            Tag::IntArray(ints)
        }
        NbtTagType::LongArray => {
            let len = read_len::<B, R>(reader)?;
            let mut longs = Vec::with_capacity(len.min(MAX_PREALLOC));
            for _ in 0..len {
                longs.push(reader.read_i64::<B>()?);
            }
            Tag::LongArray(longs)
        }
    };
    Ok(tag)
}

fn write_root_with<B: ByteOrder, W: Write>(writer: &mut W, name: &str, root: &NbtCompound) -> io::Result<()> {
    writer.write_u8(NbtTagType::Compound as u8)?;
    write_string::<B, W>(writer, name)?;
    write_compound::<B, W>(writer, root)
}

fn write_string<B: ByteOrder, W: Write>(writer: &mut W, value: &str) -> io::Result<()> {
    let len = u16::try_from(value.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "字符串超过65535字节"))?;
    writer.write_u16::<B>(len)?;
    writer.write_all(value.as_bytes())
}

fn write_len<B: ByteOrder, W: Write>(writer: &mut W, len: usize) -> io::Result<()> {
    let len = i32::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "数组长度超出i32范围"))?;
    writer.write_i32::<B>(len)
}

fn write_compound<B: ByteOrder, W: Write>(writer: &mut W, compound: &NbtCompound) -> io::Result<()> {
    for (name, tag) in compound {
        writer.write_u8(tag.tag_type() as u8)?;
        write_string::<B, W>(writer, name)?;
        write_payload::<B, W>(writer, tag)?;
    }
    writer.write_u8(NbtTagType::End as u8)
}

fn write_payload<B: ByteOrder, W: Write>(writer: &mut W, tag: &Tag) -> io::Result<()> {
    match tag {
        Tag::Byte(v) => writer.write_i8(*v),
        Tag::Short(v) => writer.write_i16::<B>(*v),
        Tag::Int(v) => writer.write_i32::<B>(*v),
        Tag::Long(v) => writer.write_i64::<B>(*v),
        Tag::Float(v) => writer.write_f32::<B>(*v),
        Tag::Double(v) => writer.write_f64::<B>(*v),
        Tag::ByteArray(v) => {
            write_len::<B, W>(writer, v.len())?;
            writer.write_all(v)
        }
        Tag::String(v) => write_string::<B, W>(writer, v),
        Tag::List(v) => {
            let element_type = v.first().map_or(NbtTagType::End, Tag::tag_type);
            if v.iter().any(|t| t.tag_type() != element_type) {
                return Err(io::Error::new(io::ErrorKind::InvalidInput, "列表元素类型不一致"));
            }
            writer.write_u8(element_type as u8)?;
            write_len::<B, W>(writer, v.len())?;
            for tag in v {
                write_payload::<B, W>(writer, tag)?;
            }
            Ok(())
        }
        Tag::Compound(v) => write_compound::<B, W>(writer, v),
        Tag::IntArray(v) => {
            write_len::<B, W>(writer, v.len())?;
            for &i in v {
                writer.write_i32::<B>(i)?;
            }
            Ok(())
        }
        Tag::LongArray(v) => {
            write_len::<B, W>(writer, v.len())?;
            for &l in v {
                writer.write_i64::<B>(l)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn sample() -> NbtCompound {
        let mut inner = NbtCompound::new();
        inner.insert("Name".to_string(), Tag::String("minecraft:stone".to_string()));
        let mut root = NbtCompound::new();
        root.insert("Width".to_string(), Tag::Short(3));
        root.insert("Data".to_string(), Tag::ByteArray(vec![1, 0x80, 0xff]));
        root.insert("States".to_string(), Tag::LongArray(vec![-1, 42]));
        root.insert("Size".to_string(), Tag::List(vec![Tag::Int(1), Tag::Int(2)]));
        root.insert("Empty".to_string(), Tag::List(Vec::new()));
        root.insert("Entry".to_string(), Tag::Compound(inner));
        root
    }

    #[test]
    fn big_endian_layout_matches_java_nbt() {
        let mut root = NbtCompound::new();
        root.insert("a".to_string(), Tag::Short(1));
        let bytes = write_root("", &root, Endian::Big).unwrap();
        assert_eq!(bytes, vec![10, 0, 0, 2, 0, 1, b'a', 0, 1, 0]);
    }

    #[test]
    fn little_endian_layout_matches_bedrock_nbt() {
        let mut root = NbtCompound::new();
        root.insert("a".to_string(), Tag::Int(1));
        let bytes = write_root("", &root, Endian::Little).unwrap();
        assert_eq!(bytes, vec![10, 0, 0, 3, 1, 0, b'a', 1, 0, 0, 0, 0]);
    }

    #[test]
    fn both_byte_orders_read_back() {
        for endian in [Endian::Big, Endian::Little] {
            let bytes = write_root("Schematic", &sample(), endian).unwrap();
            let (name, root) = read_root(&bytes, endian).unwrap();
            assert_eq!(name, "Schematic");
            assert_eq!(root, sample());
        }
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let bytes = write_root("", &sample(), Endian::Big).unwrap();
        assert_matches!(read_root(&bytes[..bytes.len() - 4], Endian::Big), Err(CodecError::Nbt(_)));
    }

    #[test]
    fn non_compound_root_is_rejected() {
        assert_matches!(read_root(&[8, 0, 0, 0, 0], Endian::Big), Err(CodecError::Nbt(_)));
    }

    #[test]
    fn negative_array_length_is_rejected() {
        // Compound "" { ByteArray "b" len=-1 }
        let bytes = [10, 0, 0, 7, 0, 1, b'b', 0xff, 0xff, 0xff, 0xff, 0];
        assert_matches!(read_root(&bytes, Endian::Big), Err(CodecError::Nbt(_)));
    }

    #[test]
    fn mixed_list_cannot_be_written() {
        let mut root = NbtCompound::new();
        root.insert("l".to_string(), Tag::List(vec![Tag::Int(1), Tag::Byte(1)]));
        assert_matches!(write_root("", &root, Endian::Big), Err(CodecError::Nbt(_)));
    }

    #[test]
    fn tag_type_ids_are_checked() {
        assert_eq!(NbtTagType::try_from(12).unwrap(), NbtTagType::LongArray);
        assert_matches!(NbtTagType::try_from(13), Err(CodecError::Nbt(_)));
    }
}
