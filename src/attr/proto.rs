//! The `proto` attribute: a 9-bit TCP flag value table, plus two
//! synthetic classes for UDP and ICMP laid out immediately after it so the
//! whole attribute still fits in one dense class space.
//!
//! A `Tcp { enable, disable }` constraint matches flags `p` iff
//! `p & disable == 0 && p & enable == enable` — i.e. the set of matching
//! flag values is `{enable | m : m & (enable | disable) == 0}`, enumerated
//! with the classic "iterate all submasks of a mask" trick
//! `m = (m - 1) & free_mask`.

use crate::error::CompileError;
use crate::packet::{PacketView, PROTO_ICMP, PROTO_TCP, PROTO_UDP};
use crate::rule::{ProtoConstraint, Rule};
use crate::value_registry::ValueRegistry;
use crate::value_table::ValueTable;

/// The 9 bits of the TCP flag field this classifier indexes.
const TCP_FLAG_BITS: u32 = 9;
const TCP_DOMAIN: usize = 1 << TCP_FLAG_BITS;
const FLAG_MASK: u16 = (TCP_DOMAIN - 1) as u16;

/// Which L4 protocol family a flag value belongs to, used only to keep the
/// class-numbering derivation readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtoKind {
    Tcp,
    Udp,
    Icmp,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct ProtoClassifier {
    tcp_table: ValueTable<1>,
    udp_class: u32,
    icmp_class: u32,
}

/// Enumerate every flag value matching `enable`/`disable`, i.e. every
/// submask `m` of `free_mask = !(enable | disable) & FLAG_MASK`, yielding
/// `enable | m`.
fn matching_flag_values(enable: u16, disable: u16) -> Vec<u16> {
    let free_mask = !(enable | disable) & FLAG_MASK;
    let mut out = Vec::new();
    let mut m: u16 = free_mask;
    loop {
        out.push(enable | m);
        if m == 0 {
            break;
        }
        m = m.wrapping_sub(1) & free_mask;
    }
    out
}

impl ProtoClassifier {
    pub fn init(rules: &[Rule]) -> Result<(Self, ValueRegistry), CompileError> {
        let mut tcp_table = ValueTable::<1>::new("proto", [TCP_DOMAIN])?;

        for rule in rules {
            let Some(ProtoConstraint::Tcp { enable, disable }) = &rule.proto else {
                continue;
            };
            let gen = tcp_table.new_gen();
            for flags in matching_flag_values(*enable, *disable) {
                tcp_table.touch([flags as usize], gen);
            }
        }
        tcp_table.compact();

        let udp_class = tcp_table.max_class() + 1;
        let icmp_class = tcp_table.max_class() + 2;

        let mut registry = ValueRegistry::new();
        for rule in rules {
            registry.start();
            match &rule.proto {
                None => {
                    for flags in 0..TCP_DOMAIN {
                        registry.collect(tcp_table.get([flags]));
                    }
                    registry.collect(udp_class);
                    registry.collect(icmp_class);
                }
                Some(ProtoConstraint::Tcp { enable, disable }) => {
                    for flags in matching_flag_values(*enable, *disable) {
                        registry.collect(tcp_table.get([flags as usize]));
                    }
                }
                Some(ProtoConstraint::Udp) => registry.collect(udp_class),
                Some(ProtoConstraint::Icmp) => registry.collect(icmp_class),
            }
        }

        Ok((Self { tcp_table, udp_class, icmp_class }, registry))
    }

    pub fn lookup(&self, pkt: &PacketView) -> u32 {
        match pkt.transport_proto {
            PROTO_TCP => self.tcp_table.get([(pkt.tcp_flags & FLAG_MASK) as usize]),
            PROTO_UDP => self.udp_class,
            PROTO_ICMP => self.icmp_class,
            _ => 0,
        }
    }

    pub fn max_class(&self) -> u32 {
        self.icmp_class
    }

    pub fn kind_of(proto: u8) -> Option<ProtoKind> {
        match proto {
            PROTO_TCP => Some(ProtoKind::Tcp),
            PROTO_UDP => Some(ProtoKind::Udp),
            PROTO_ICMP => Some(ProtoKind::Icmp),
            _ => None,
        }
    }
}
