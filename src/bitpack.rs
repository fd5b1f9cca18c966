//! Litematica 风格的定宽位打包。
//!
//! 每个条目占 `bits` 位，按 LSB 优先依次写入 64 位字；条目可以跨越两个相邻字，
//! 低位在前一个字的高端，高位在后一个字的低端。

use crate::error::CodecError;

/// 调色板大小为 `palette_len` 时每个条目的位宽：`max(2, ceil(log2(n)))`
pub fn bits_per_entry(palette_len: usize) -> u32 {
    let needed = usize::BITS - palette_len.saturating_sub(1).leading_zeros();
    needed.max(2)
}

/// 容纳 `count` 个 `bits` 位条目所需的字数
pub fn packed_len(count: usize, bits: u32) -> usize {
    (count * bits as usize + 63) / 64
}

/// 将索引序列打包为 64 位字
pub fn pack<I>(values: I, count: usize, bits: u32) -> Vec<i64>
where
    I: IntoIterator<Item = u32>,
{
    debug_assert!((1..=32).contains(&bits));
    let mask = (1u64 << bits) - 1;
    let mut words = vec![0u64; packed_len(count, bits)];

    for (index, value) in values.into_iter().take(count).enumerate() {
        let value = value as u64;
        assert!(value <= mask, "值 {} 超出 {} 位", value, bits);

        let bit_index = index * bits as usize;
        let word = bit_index / 64;
        let offset = (bit_index % 64) as u32;

        words[word] |= value << offset;
        if offset + bits > 64 {
            words[word + 1] |= value >> (64 - offset);
        }
    }

    words.into_iter().map(|w| w as i64).collect()
}

/// 从 64 位字中解出 `count` 个条目
pub fn unpack(words: &[i64], count: usize, bits: u32) -> Result<Vec<u32>, CodecError> {
    if !(1..=32).contains(&bits) {
        return Err(CodecError::TruncatedPayload {
            expected: count,
            decoded: 0,
        });
    }

    let required = packed_len(count, bits);
    if words.len() < required {
        // 能完整解出的条目数
        let decoded = words.len() * 64 / bits as usize;
        return Err(CodecError::TruncatedPayload {
            expected: count,
            decoded: decoded.min(count),
        });
    }

    let mask = (1u64 << bits) - 1;
    let mut values = Vec::with_capacity(count);

    for index in 0..count {
        let bit_index = index * bits as usize;
        let word = bit_index / 64;
        let offset = (bit_index % 64) as u32;

        let mut value = (words[word] as u64) >> offset;
        if offset + bits > 64 {
            value |= (words[word + 1] as u64) << (64 - offset);
        }
        values.push((value & mask) as u32);
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn bits_per_entry_has_floor_of_two() {
        assert_eq!(bits_per_entry(1), 2);
        assert_eq!(bits_per_entry(2), 2);
        assert_eq!(bits_per_entry(4), 2);
        assert_eq!(bits_per_entry(5), 3);
        assert_eq!(bits_per_entry(16), 4);
        assert_eq!(bits_per_entry(17), 5);
        assert_eq!(bits_per_entry(10000), 14);
    }

    #[test]
    fn spanning_entries_cover_every_offset() {
        // 17 项调色板 → 5 位，64 个条目覆盖所有跨字偏移
        let bits = bits_per_entry(17);
        let values: Vec<u32> = (0..64).map(|i| (i * 7) % 17).collect();
        let words = pack(values.iter().copied(), values.len(), bits);
        assert_eq!(words.len(), 5);
        assert_eq!(unpack(&words, values.len(), bits).unwrap(), values);
    }

    #[test]
    fn span_places_low_bits_in_first_word() {
        // 第13个条目（5位）从第60位开始，跨越两个字
        let mut values = vec![0u32; 13];
        values[12] = 0b11011;
        let words = pack(values.iter().copied(), values.len(), 5);
        assert_eq!((words[0] as u64) >> 60, 0b1011);
        assert_eq!(words[1] as u64, 0b1);
    }

    #[test]
    fn symmetric_for_many_palette_sizes() {
        for n in [1usize, 2, 3, 5, 9, 17, 33, 100, 257, 1000, 4097, 10000] {
            let bits = bits_per_entry(n);
            let values: Vec<u32> = (0..300u32).map(|i| (i.wrapping_mul(2654435761) % n as u32)).collect();
            let words = pack(values.iter().copied(), values.len(), bits);
            assert_eq!(unpack(&words, values.len(), bits).unwrap(), values, "n = {}", n);
        }
    }

    #[test]
    fn short_array_is_truncated_payload() {
        let words = pack(vec![1u32; 64], 64, 5);
        assert_matches!(
            unpack(&words[..4], 64, 5),
            Err(CodecError::TruncatedPayload { expected: 64, decoded: 51 })
        );
    }
}
