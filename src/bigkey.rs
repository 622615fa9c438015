//! Fixed-width byte-key arithmetic, in the style of `p4rs::table::BigUintKey`
//! (`num::bigint::BigUint` standing in for an
//! arbitrary-width unsigned integer). Used by the range collector to walk
//! and decompose intervals over 4/8/16-byte keys without writing bespoke
//! u32/u64/u128 code paths three times over.

use num::bigint::BigUint;
use num::{One, Zero};

/// Convert a big-endian byte key to a [`BigUint`].
pub fn key_to_biguint<const N: usize>(key: &[u8; N]) -> BigUint {
    BigUint::from_bytes_be(key)
}

/// Convert a [`BigUint`] back to a big-endian byte key of width `N`,
/// truncating/zero-extending on the left as needed.
pub fn biguint_to_key<const N: usize>(v: &BigUint) -> [u8; N] {
    let bytes = v.to_bytes_be();
    let mut out = [0u8; N];
    let n = bytes.len().min(N);
    out[N - n..].copy_from_slice(&bytes[bytes.len() - n..]);
    out
}

/// The successor of `key`, or `None` if `key` is the all-ones key.
pub fn key_succ<const N: usize>(key: &[u8; N]) -> Option<[u8; N]> {
    let v = key_to_biguint(key) + BigUint::one();
    let max = (BigUint::one() << (N * 8)) - BigUint::one();
    if v > max {
        None
    } else {
        Some(biguint_to_key(&v))
    }
}

/// The predecessor of `key`, or `None` if `key` is all zero.
pub fn key_pred<const N: usize>(key: &[u8; N]) -> Option<[u8; N]> {
    let v = key_to_biguint(key);
    if v.is_zero() {
        None
    } else {
        Some(biguint_to_key::<N>(&(v - BigUint::one())))
    }
}

/// Decompose the inclusive interval `[lo, hi]` into the minimal set of
/// CIDR-aligned `(prefix_value, prefix_len)` blocks that exactly cover it.
/// `prefix_len` is expressed against a domain of `N * 8` bits.
///
/// Standard greedy algorithm: repeatedly take the largest block aligned to
/// `lo` that still fits inside `[lo, hi]`, then advance past it.
pub fn range_to_prefixes<const N: usize>(
    lo: &[u8; N],
    hi: &[u8; N],
) -> Vec<(BigUint, u8)> {
    let bits = (N * 8) as u8;
    let hi_v = key_to_biguint(hi);
    let mut cur = key_to_biguint(lo);
    let mut out = Vec::new();

    while cur <= hi_v {
        // Largest power-of-two block size aligned to `cur`.
        let align_bits = if cur.is_zero() {
            bits
        } else {
            cur.trailing_zeros().unwrap_or(0).min(bits as u64) as u8
        };
        let mut block_bits = align_bits;
        loop {
            let block_size = BigUint::one() << block_bits;
            let block_end = &cur + &block_size - BigUint::one();
            if block_end <= hi_v {
                break;
            }
            if block_bits == 0 {
                break;
            }
            block_bits -= 1;
        }
        let prefix_len = bits - block_bits;
        out.push((cur.clone(), prefix_len));
        cur += BigUint::one() << block_bits;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn succ_pred_roundtrip() {
        let k = [0u8, 0, 0, 5];
        let s = key_succ(&k).unwrap();
        assert_eq!(s, [0, 0, 0, 6]);
        assert_eq!(key_pred(&s).unwrap(), k);
    }

    #[test]
    fn succ_of_max_is_none() {
        assert_eq!(key_succ(&[0xFFu8, 0xFF, 0xFF, 0xFF]), None);
    }

    #[test]
    fn pred_of_zero_is_none() {
        assert_eq!(key_pred(&[0u8, 0, 0, 0]), None);
    }

    #[test]
    fn single_address_is_one_prefix() {
        let addr = [10u8, 0, 0, 1];
        let prefixes = range_to_prefixes(&addr, &addr);
        assert_eq!(prefixes, vec![(key_to_biguint(&addr), 32)]);
    }

    #[test]
    fn whole_domain_is_prefix_len_zero() {
        let lo = [0u8, 0, 0, 0];
        let hi = [0xFFu8, 0xFF, 0xFF, 0xFF];
        let prefixes = range_to_prefixes(&lo, &hi);
        assert_eq!(prefixes, vec![(BigUint::zero(), 0)]);
    }

    #[test]
    fn aligned_range_is_one_prefix() {
        // 10.128.0.0 - 10.255.255.255 is exactly 10.128.0.0/9.
        let lo = [10u8, 128, 0, 0];
        let hi = [10u8, 255, 255, 255];
        let prefixes = range_to_prefixes(&lo, &hi);
        assert_eq!(prefixes, vec![(key_to_biguint(&lo), 9)]);
    }

    #[test]
    fn unaligned_range_decomposes_into_several_blocks() {
        // 10.0.0.1 - 10.0.0.4 has no single CIDR representation.
        let lo = [10u8, 0, 0, 1];
        let hi = [10u8, 0, 0, 4];
        let prefixes = range_to_prefixes(&lo, &hi);
        assert_eq!(
            prefixes,
            vec![
                (key_to_biguint(&[10u8, 0, 0, 1]), 32),
                (key_to_biguint(&[10u8, 0, 0, 2]), 31),
                (key_to_biguint(&[10u8, 0, 0, 4]), 32),
            ]
        );
    }
}
