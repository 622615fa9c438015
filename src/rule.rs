//! The rule model: an immutable, priority-ordered list of
//! per-attribute constraints. An empty constraint on an attribute means
//! `ANY` — the rule is a wildcard on that attribute.

use serde::{Deserialize, Serialize};

/// A rule's position in the input list. Index 0 is highest priority.
pub type RuleId = u32;

/// A half-open-by-value inclusive range `[lo, hi]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range16 {
    pub lo: u16,
    pub hi: u16,
}

impl Range16 {
    pub fn new(lo: u16, hi: u16) -> Self {
        Self { lo, hi }
    }
}

/// A VLAN tag range, `0 <= lo <= hi <= 4095`.
pub type VlanRange = Range16;

/// An L4 port range, `0 <= lo <= hi <= 65535`.
pub type PortRange = Range16;

/// `true` for a port range spanning the whole 16-bit domain. Such ranges are
/// skipped in the value-table *touch* loop (touching every cell of a fresh
/// generation adds no information) but still enumerated when building the
/// rule's registry, so both call sites must agree — see
/// [`crate::attr::is_full_width`].
pub fn is_full_width_port(r: &PortRange) -> bool {
    r.lo == 0 && r.hi == 65535
}

/// The L4 protocol a rule constrains, with TCP flag enable/disable masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtoConstraint {
    /// 9-bit TCP flag space. A packet's flags `p` match iff
    /// `(p & disable) == 0 && (p & enable) == enable`.
    Tcp { enable: u16, disable: u16 },
    Udp,
    Icmp,
}

impl ProtoConstraint {
    /// A rule with `enable_bits & disable_bits != 0` specifies an
    /// impossible predicate and must be skipped (`InvalidRule`).
    pub fn is_invalid(&self) -> bool {
        match self {
            ProtoConstraint::Tcp { enable, disable } => enable & disable != 0,
            ProtoConstraint::Udp | ProtoConstraint::Icmp => false,
        }
    }
}

/// An IPv4 CIDR, normalized so that `addr & mask == addr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv4Cidr {
    pub addr: u32,
    pub prefix_len: u8,
}

impl Ipv4Cidr {
    pub fn new(addr: u32, prefix_len: u8) -> Self {
        assert!(prefix_len <= 32);
        let mask = Self::mask(prefix_len);
        Self { addr: addr & mask, prefix_len }
    }

    fn mask(prefix_len: u8) -> u32 {
        if prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - prefix_len)
        }
    }

    /// The inclusive byte-lexicographic interval `[from, to]` this CIDR
    /// covers, in network byte order.
    pub fn byte_range(&self) -> ([u8; 4], [u8; 4]) {
        let mask = Self::mask(self.prefix_len);
        let from = self.addr & mask;
        let to = from | !mask;
        (from.to_be_bytes(), to.to_be_bytes())
    }
}

/// An IPv6 CIDR, normalized so that `addr & mask == addr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv6Cidr {
    pub addr: u128,
    pub prefix_len: u8,
}

impl Ipv6Cidr {
    pub fn new(addr: u128, prefix_len: u8) -> Self {
        assert!(prefix_len <= 128);
        let mask = Self::mask(prefix_len);
        Self { addr: addr & mask, prefix_len }
    }

    fn mask(prefix_len: u8) -> u128 {
        if prefix_len == 0 {
            0
        } else {
            u128::MAX << (128 - prefix_len)
        }
    }

    pub fn byte_range(&self) -> ([u8; 16], [u8; 16]) {
        let mask = Self::mask(self.prefix_len);
        let from = self.addr & mask;
        let to = from | !mask;
        (from.to_be_bytes(), to.to_be_bytes())
    }

    /// Split into independently-normalized 64-bit `(hi, lo)` halves, the
    /// basis of the split-merge trick. A prefix length `<= 64`
    /// leaves `lo` a full wildcard (`ANY` on the low half); a prefix length
    /// `> 64` pins `hi` to an exact 64-bit match.
    pub fn split_halves(&self) -> (Ipv4LikeCidr<u64>, Ipv4LikeCidr<u64>) {
        let hi_addr = (self.addr >> 64) as u64;
        let lo_addr = self.addr as u64;
        let hi_len = self.prefix_len.min(64);
        let lo_len = self.prefix_len.saturating_sub(64);
        (
            Ipv4LikeCidr::new(hi_addr, hi_len),
            Ipv4LikeCidr::new(lo_addr, lo_len),
        )
    }

    /// `true` for `::/0`: skipped in the composed touch phase, still enumerated
    /// in the rule's registry.
    pub fn is_wildcard(&self) -> bool {
        self.prefix_len == 0
    }
}

/// A generic normalized CIDR over a `u64` key, used for the IPv6 hi/lo
/// halves (net4 reuses the dedicated [`Ipv4Cidr`] type instead, since it
/// also needs to report addresses back in dotted form at the API edge).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4LikeCidr<T> {
    pub addr: T,
    pub prefix_len: u8,
}

impl Ipv4LikeCidr<u64> {
    pub fn new(addr: u64, prefix_len: u8) -> Self {
        assert!(prefix_len <= 64);
        let mask = Self::mask(prefix_len);
        Self { addr: addr & mask, prefix_len }
    }

    fn mask(prefix_len: u8) -> u64 {
        if prefix_len == 0 {
            0
        } else {
            u64::MAX << (64 - prefix_len)
        }
    }

    pub fn byte_range(&self) -> ([u8; 8], [u8; 8]) {
        let mask = Self::mask(self.prefix_len);
        let from = self.addr & mask;
        let to = from | !mask;
        (from.to_be_bytes(), to.to_be_bytes())
    }
}

/// One immutable, priority-ordered rule. Index 0 in the slice passed to
/// [`crate::compile`] is the highest-priority rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rule {
    /// Device ids this rule constrains. Empty means `ANY`.
    pub device: Vec<u64>,
    /// VLAN tag ranges this rule constrains. Empty means `ANY`.
    pub vlan: Vec<VlanRange>,
    /// L4 protocol/flag constraint. `None` means `ANY`.
    pub proto: Option<ProtoConstraint>,
    /// Source port ranges. Empty means `ANY`.
    pub port_src: Vec<PortRange>,
    /// Destination port ranges. Empty means `ANY`.
    pub port_dst: Vec<PortRange>,
    /// Source IPv4 CIDRs. Empty means `ANY`.
    pub net4_src: Vec<Ipv4Cidr>,
    /// Destination IPv4 CIDRs. Empty means `ANY`.
    pub net4_dst: Vec<Ipv4Cidr>,
    /// Source IPv6 CIDRs. Empty means `ANY`.
    pub net6_src: Vec<Ipv6Cidr>,
    /// Destination IPv6 CIDRs. Empty means `ANY`.
    pub net6_dst: Vec<Ipv6Cidr>,
}

impl Rule {
    /// `true` if this rule specifies an impossible predicate and must be
    /// skipped (`InvalidRule`, non-fatal).
    pub fn is_invalid(&self) -> bool {
        matches!(&self.proto, Some(p) if p.is_invalid())
    }
}
