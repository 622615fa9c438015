//! Attribute plug-ins: the capability set `{init, lookup}` for each
//! of the nine attribute kinds the filter compiler understands.
//!
//! The plug-ins are modeled as a fixed, closed
//! enum rather than open-ended subclassing — [`ClassifierState`] below.
//! `port`/`net4`/`net6` each cover both the `-src` and `-dst` variants with
//! one type parameterized by [`Side`], since the only difference between
//! them is which half of the packet/rule they read.
//!
//! `free` from the source's `{init, lookup, free}` triplet has no Rust
//! counterpart: ordinary `Drop` already releases a classifier's owned
//! `Vec`s/tries when it goes out of scope, so there is nothing to hand-roll.

pub mod device;
pub mod net4;
pub mod net6;
pub mod port;
pub mod proto;
pub mod vlan;

pub use device::DeviceClassifier;
pub use net4::Net4Classifier;
pub use net6::Net6Classifier;
pub use port::PortClassifier;
pub use proto::ProtoClassifier;
pub use vlan::VlanClassifier;

use crate::packet::PacketView;
use crate::rule::{Ipv4Cidr, Ipv6Cidr, PortRange, Rule};

/// `true` for a port range spanning the whole 16-bit domain: such
/// ranges are skipped in the value-table *touch* loop but still enumerated
/// into the rule's registry, so both call sites share this one helper
/// rather than risk drifting apart.
pub use crate::rule::is_full_width_port as is_full_width;

/// Which half of a rule/packet a `-src`/`-dst` attribute reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Side {
    Src,
    Dst,
}

impl Side {
    pub fn port_ranges<'a>(&self, rule: &'a Rule) -> &'a [PortRange] {
        match self {
            Side::Src => &rule.port_src,
            Side::Dst => &rule.port_dst,
        }
    }

    pub fn port(&self, pkt: &PacketView) -> u16 {
        match self {
            Side::Src => pkt.src_port,
            Side::Dst => pkt.dst_port,
        }
    }

    pub fn net4_cidrs<'a>(&self, rule: &'a Rule) -> &'a [Ipv4Cidr] {
        match self {
            Side::Src => &rule.net4_src,
            Side::Dst => &rule.net4_dst,
        }
    }

    pub fn net4_addr(&self, pkt: &PacketView) -> [u8; 4] {
        match self {
            Side::Src => pkt.src_ipv4,
            Side::Dst => pkt.dst_ipv4,
        }
    }

    pub fn net6_cidrs<'a>(&self, rule: &'a Rule) -> &'a [Ipv6Cidr] {
        match self {
            Side::Src => &rule.net6_src,
            Side::Dst => &rule.net6_dst,
        }
    }

    pub fn net6_addr(&self, pkt: &PacketView) -> [u8; 16] {
        match self {
            Side::Src => pkt.src_ipv6,
            Side::Dst => pkt.dst_ipv6,
        }
    }
}

/// The fixed set of attribute plug-in variants. A [`crate::driver::FilterFlavor`]
/// picks an ordered subset of these to compile and run.
#[derive(serde::Serialize, serde::Deserialize)]
pub enum ClassifierState {
    Device(DeviceClassifier),
    Vlan(VlanClassifier),
    Proto(ProtoClassifier),
    Port(PortClassifier),
    Net4(Net4Classifier),
    Net6(Net6Classifier),
}

impl ClassifierState {
    pub fn lookup(&self, pkt: &PacketView) -> u32 {
        match self {
            ClassifierState::Device(c) => c.lookup(pkt),
            ClassifierState::Vlan(c) => c.lookup(pkt),
            ClassifierState::Proto(c) => c.lookup(pkt),
            ClassifierState::Port(c) => c.lookup(pkt),
            ClassifierState::Net4(c) => c.lookup(pkt),
            ClassifierState::Net6(c) => c.lookup(pkt),
        }
    }

    pub fn max_class(&self) -> u32 {
        match self {
            ClassifierState::Device(c) => c.max_class(),
            ClassifierState::Vlan(c) => c.max_class(),
            ClassifierState::Proto(c) => c.max_class(),
            ClassifierState::Port(c) => c.max_class(),
            ClassifierState::Net4(c) => c.max_class(),
            ClassifierState::Net6(c) => c.max_class(),
        }
    }
}

/// The nine named attribute kinds, used to pick a
/// [`crate::driver::FilterFlavor`]'s ordered attribute list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Device,
    Vlan,
    Proto,
    PortSrc,
    PortDst,
    Net4Src,
    Net4Dst,
    Net6Src,
    Net6Dst,
}

impl AttributeKind {
    pub fn name(&self) -> &'static str {
        match self {
            AttributeKind::Device => "device",
            AttributeKind::Vlan => "vlan",
            AttributeKind::Proto => "proto",
            AttributeKind::PortSrc => "port_src",
            AttributeKind::PortDst => "port_dst",
            AttributeKind::Net4Src => "net4_src",
            AttributeKind::Net4Dst => "net4_dst",
            AttributeKind::Net6Src => "net6_src",
            AttributeKind::Net6Dst => "net6_dst",
        }
    }
}
