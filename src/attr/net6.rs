//! The `net6_src`/`net6_dst` attributes: the IPv6
//! split-merge trick. Each 128-bit CIDR is split into independently
//! normalized 64-bit `(hi, lo)` halves (see [`crate::rule::Ipv6Cidr::split_halves`]);
//! each half is classified exactly like a `net4`-style attribute over
//! 8-byte keys, and the two resulting class numbers are composed through a
//! small 2-D value table, turning what would be a 2^128 domain into one of
//! size `(H+1) x (L+1)` where `H`/`L` are the hi/lo classifiers' own
//! (typically small) class counts.

use std::collections::BTreeSet;

use crate::attr::Side;
use crate::error::CompileError;
use crate::lpm::Lpm;
use crate::packet::PacketView;
use crate::range_collector::{RangeCollector, RangeIndex};
use crate::rule::{Ipv6Cidr, Rule};
use crate::value_registry::ValueRegistry;
use crate::value_table::ValueTable;

#[derive(serde::Serialize, serde::Deserialize)]
pub struct Net6Classifier {
    lpm_hi: Lpm<8>,
    lpm_lo: Lpm<8>,
    table: ValueTable<2>,
    side: Side,
}

impl Net6Classifier {
    pub fn init(rules: &[Rule], side: Side) -> Result<(Self, ValueRegistry), CompileError> {
        let attribute = match side {
            Side::Src => "net6_src",
            Side::Dst => "net6_dst",
        };

        let mut rc_hi = RangeCollector::<8>::new();
        let mut rc_lo = RangeCollector::<8>::new();
        // Per rule, the (hi handle, lo handle) pair for each of its CIDRs,
        // in the same order as `side.net6_cidrs(rule)`.
        let mut per_rule_handles: Vec<Vec<(usize, usize)>> = Vec::with_capacity(rules.len());
        for rule in rules {
            let cidrs = side.net6_cidrs(rule);
            let mut handles = Vec::with_capacity(cidrs.len());
            for cidr in cidrs {
                let (hi, lo) = cidr.split_halves();
                let (hi_from, hi_to) = hi.byte_range();
                let (lo_from, lo_to) = lo.byte_range();
                let hh = rc_hi.submit(hi_from, hi_to);
                let lh = rc_lo.submit(lo_from, lo_to);
                handles.push((hh, lh));
            }
            per_rule_handles.push(handles);
        }

        let (mut lpm_hi, range_index_hi) = rc_hi.build();
        let (mut lpm_lo, range_index_lo) = rc_lo.build();

        let mut table_hi = ValueTable::<1>::new("net6_hi", [range_index_hi.count() as usize])?;
        let mut table_lo = ValueTable::<1>::new("net6_lo", [range_index_lo.count() as usize])?;

        for handles in &per_rule_handles {
            if handles.is_empty() {
                continue;
            }
            let g_hi = table_hi.new_gen();
            let g_lo = table_lo.new_gen();
            for &(hh, lh) in handles {
                let (s, e) = range_index_hi.slice(hh);
                for i in s..e {
                    table_hi.touch([i as usize], g_hi);
                }
                let (s, e) = range_index_lo.slice(lh);
                for i in s..e {
                    table_lo.touch([i as usize], g_lo);
                }
            }
        }
        table_hi.compact();
        table_lo.compact();

        let h_dim = table_hi.max_class() as usize + 1;
        let l_dim = table_lo.max_class() as usize + 1;
        let mut table = ValueTable::<2>::new(attribute, [h_dim, l_dim])?;

        for (ridx, handles) in per_rule_handles.iter().enumerate() {
            if handles.is_empty() {
                continue;
            }
            let cidrs = side.net6_cidrs(&rules[ridx]);
            let gen = table.new_gen();
            for (&(hh, lh), cidr) in handles.iter().zip(cidrs.iter()) {
                // `::/0`: touching the whole (H+1)x(L+1) rectangle adds no
                // discriminating information, so it's skipped here exactly
                // like a full-width port range.
                if cidr.is_wildcard() {
                    continue;
                }
                for ch in distinct_classes(&table_hi, &range_index_hi, hh) {
                    for cl in distinct_classes(&table_lo, &range_index_lo, lh) {
                        table.touch([ch as usize, cl as usize], gen);
                    }
                }
            }
        }
        table.compact();

        lpm_hi.remap(&table_hi);
        lpm_hi.compact();
        lpm_lo.remap(&table_lo);
        lpm_lo.compact();

        let mut registry = ValueRegistry::new();
        let all_classes: Vec<u32> = {
            let mut v = Vec::with_capacity(h_dim * l_dim);
            for ch in 0..h_dim {
                for cl in 0..l_dim {
                    v.push(table.get([ch, cl]));
                }
            }
            v
        };
        for (ridx, handles) in per_rule_handles.iter().enumerate() {
            registry.start();
            if handles.is_empty() {
                for &class in &all_classes {
                    registry.collect(class);
                }
                continue;
            }
            let cidrs = side.net6_cidrs(&rules[ridx]);
            for (&(hh, lh), cidr) in handles.iter().zip(cidrs.iter()) {
                if cidr.is_wildcard() {
                    for &class in &all_classes {
                        registry.collect(class);
                    }
                    continue;
                }
                for ch in distinct_classes(&table_hi, &range_index_hi, hh) {
                    for cl in distinct_classes(&table_lo, &range_index_lo, lh) {
                        registry.collect(table.get([ch as usize, cl as usize]));
                    }
                }
            }
        }

        Ok((Self { lpm_hi, lpm_lo, table, side }, registry))
    }

    pub fn lookup(&self, pkt: &PacketView) -> u32 {
        let addr = self.side.net6_addr(pkt);
        let hi_bytes: [u8; 8] = addr[0..8].try_into().expect("16-byte address");
        let lo_bytes: [u8; 8] = addr[8..16].try_into().expect("16-byte address");
        let c_hi = self.lpm_hi.lookup(&hi_bytes).unwrap_or(0);
        let c_lo = self.lpm_lo.lookup(&lo_bytes).unwrap_or(0);
        self.table.get([c_hi as usize, c_lo as usize])
    }

    pub fn max_class(&self) -> u32 {
        self.table.max_class()
    }
}

/// The distinct compacted classes a submitted half-CIDR's elementary
/// interval slice spans.
fn distinct_classes(table: &ValueTable<1>, range_index: &RangeIndex, handle: usize) -> Vec<u32> {
    let (start, stop) = range_index.slice(handle);
    let mut set = BTreeSet::new();
    for i in start..stop {
        set.insert(table.get([i as usize]));
    }
    set.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cidr(hi: u64, lo: u64, prefix_len: u8) -> Ipv6Cidr {
        Ipv6Cidr::new(((hi as u128) << 64) | lo as u128, prefix_len)
    }

    #[test]
    fn matches_inside_prefix_not_outside() {
        let rules = vec![Rule {
            net6_src: vec![cidr(0x2001_0db8_0000_0000, 0, 32)],
            ..Default::default()
        }];
        let (c, _reg) = Net6Classifier::init(&rules, Side::Src).unwrap();
        let mut pkt = PacketView::default();
        pkt.src_ipv6 = ((0x2001_0db8_0000_0001u128 << 64) | 1).to_be_bytes();
        assert_ne!(c.lookup(&pkt), 0);
        pkt.src_ipv6 = ((0x2001_0db9u128) << 96).to_be_bytes();
        assert_eq!(c.lookup(&pkt), 0);
    }

    #[test]
    fn disjoint_prefixes_get_distinct_classes() {
        let rules = vec![
            Rule { net6_dst: vec![cidr(0x2001_0db8_0000_0000, 0, 32)], ..Default::default() },
            Rule { net6_dst: vec![cidr(0x2001_0db9_0000_0000, 0, 32)], ..Default::default() },
        ];
        let (c, _reg) = Net6Classifier::init(&rules, Side::Dst).unwrap();
        let mut pkt = PacketView::default();
        pkt.dst_ipv6 = ((0x2001_0db8_0000_0001u128) << 64).to_be_bytes();
        let a = c.lookup(&pkt);
        pkt.dst_ipv6 = ((0x2001_0db9_0000_0001u128) << 64).to_be_bytes();
        let b = c.lookup(&pkt);
        assert_ne!(a, 0);
        assert_ne!(b, 0);
        assert_ne!(a, b);
    }

    #[test]
    fn wildcard_cidr_is_skipped_in_touch_but_registered() {
        let rules = vec![Rule { net6_src: vec![cidr(0, 0, 0)], ..Default::default() }];
        let (c, reg) = Net6Classifier::init(&rules, Side::Src).unwrap();
        let mut pkt = PacketView::default();
        pkt.src_ipv6 = [0xAB; 16];
        assert_eq!(c.lookup(&pkt), 0);
        assert!(!reg.range(0).is_empty());
    }
}
