//! Sponge `BlockData` 使用的小端 VarInt：每字节7位有效数据，除最后一字节外都带 `0x80` 延续位。

use crate::error::CodecError;

/// 一个 VarInt 最多占用的字节数（32位值）
pub const MAX_VARINT_LEN: usize = 5;

/// 编码单个值所需的字节数
pub fn varint_len(mut value: u32) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// 追加写入一个 VarInt
pub fn write_varint(buffer: &mut Vec<u8>, mut value: u32) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buffer.push(byte);
            return;
        }
        buffer.push(byte | 0x80);
    }
}

/// 从 `pos` 读取一个 VarInt 并推进 `pos`；数据不足时返回 `None`
pub fn read_varint(data: &[u8], pos: &mut usize) -> Result<Option<u32>, CodecError> {
    let mut value: u32 = 0;
    for i in 0..MAX_VARINT_LEN {
        let Some(&byte) = data.get(*pos + i) else {
            return Ok(None);
        };
        value |= ((byte & 0x7f) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            *pos += i + 1;
            return Ok(Some(value));
        }
    }
    Err(CodecError::VarIntTooLong)
}

/// 编码整个索引序列
pub fn encode_all<I>(values: I) -> Vec<u8>
where
    I: IntoIterator<Item = u32>,
{
    let iter = values.into_iter();
    let mut buffer = Vec::with_capacity(iter.size_hint().0);
    for value in iter {
        write_varint(&mut buffer, value);
    }
    buffer
}

/// 解码恰好 `count` 个 VarInt，返回值及实际消耗的字节数
pub fn decode_exact(data: &[u8], count: usize) -> Result<(Vec<u32>, usize), CodecError> {
    let mut values = Vec::with_capacity(count.min(data.len()));
    let mut pos = 0;
    while values.len() < count {
        match read_varint(data, &mut pos)? {
            Some(value) => values.push(value),
            None => {
                return Err(CodecError::TruncatedPayload {
                    expected: count,
                    decoded: values.len(),
                })
            }
        }
    }
    Ok((values, pos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn boundary_values_use_expected_widths() {
        for (value, bytes) in [
            (0u32, vec![0x00]),
            (127, vec![0x7f]),
            (128, vec![0x80, 0x01]),
            (16383, vec![0xff, 0x7f]),
            (16384, vec![0x80, 0x80, 0x01]),
            (2097151, vec![0xff, 0xff, 0x7f]),
            (2097152, vec![0x80, 0x80, 0x80, 0x01]),
        ] {
            let encoded = encode_all([value]);
            assert_eq!(encoded, bytes, "value {}", value);
            assert_eq!(varint_len(value), bytes.len());
        }
    }

    #[test]
    fn sequence_round_trips_across_widths() {
        let values: Vec<u32> = vec![0, 1, 127, 128, 255, 16383, 16384, 1 << 20, (1 << 21) + 5, u32::MAX];
        let encoded = encode_all(values.iter().copied());
        let (decoded, consumed) = decode_exact(&encoded, values.len()).unwrap();
        assert_eq!(decoded, values);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn decode_stops_after_requested_count() {
        let encoded = encode_all([300, 1, 2]);
        let (decoded, consumed) = decode_exact(&encoded, 1).unwrap();
        assert_eq!(decoded, vec![300]);
        assert_eq!(consumed, 2);
    }

    #[test]
    fn dangling_continuation_is_truncated_payload() {
        assert_matches!(
            decode_exact(&[0x05, 0x80], 2),
            Err(CodecError::TruncatedPayload { expected: 2, decoded: 1 })
        );
        assert_matches!(
            decode_exact(&[], 1),
            Err(CodecError::TruncatedPayload { expected: 1, decoded: 0 })
        );
    }

    #[test]
    fn six_byte_varint_is_rejected() {
        assert_matches!(
            decode_exact(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01], 1),
            Err(CodecError::VarIntTooLong)
        );
    }
}
