//! 块键哈希策略
//!
//! 块缓存对哈希器泛型：默认使用 lru crate 的 `DefaultHasher`，
//! 也可以换成这里的 [`MixState`]，一个按 64 位字乘法混合、最后做雪崩的快速哈希。
//! 键的相等性始终由 [`BlockKey`](crate::BlockKey) 的 `Eq` 决定。

use byteorder::{ByteOrder, LittleEndian};
use core::hash::{BuildHasher, Hasher};

const MUL: u64 = 11_400_714_819_323_198_485;
const FMIX_1: u64 = 0xff51_afd7_ed55_8ccd;
const FMIX_2: u64 = 0xc4ce_b9fe_1a85_ec53;

/// 64 位混合哈希器
///
/// 每个 8 字节字：`h ^= word; h = h * MUL + 1`，不足 8 字节的尾部逐字节同样处理。
/// `finish` 时并入输入总长度再做雪崩。
#[derive(Debug, Clone, Copy, Default)]
pub struct MixHasher {
    state: u64,
    len: u64,
}

impl MixHasher {
    #[inline]
    fn mix(&mut self, word: u64) {
        self.state ^= word;
        self.state = self.state.wrapping_mul(MUL).wrapping_add(1);
    }
}

impl Hasher for MixHasher {
    fn write(&mut self, bytes: &[u8]) {
        let mut words = bytes.chunks_exact(8);
        for word in &mut words {
            self.mix(LittleEndian::read_u64(word));
        }
        for &byte in words.remainder() {
            self.mix(u64::from(byte));
        }
        self.len += bytes.len() as u64;
    }

    fn write_u64(&mut self, value: u64) {
        self.mix(value);
        self.len += 8;
    }

    fn finish(&self) -> u64 {
        let mut h = self.state ^ self.len;
        h ^= h >> 33;
        h = h.wrapping_mul(FMIX_1);
        h ^= h >> 33;
        h = h.wrapping_mul(FMIX_2);
        h ^= h >> 33;
        h
    }
}

/// [`MixHasher`] 的构造器
#[derive(Debug, Clone, Copy, Default)]
pub struct MixState;

impl BuildHasher for MixState {
    type Hasher = MixHasher;

    fn build_hasher(&self) -> MixHasher {
        MixHasher::default()
    }
}
