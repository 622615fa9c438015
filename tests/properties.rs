//! The testable properties from the design notes (P1-P6), exercised against
//! randomly generated rule sets and packets where that's the natural check.

use rand::Rng;

use filter_compiler::packet::{PROTO_ICMP, PROTO_TCP, PROTO_UDP};
use filter_compiler::rule::{Ipv4Cidr, ProtoConstraint, Rule, VlanRange};
use filter_compiler::{compile, default_logger, lookup, FilterFlavor, PacketView, RuleId};

/// The trivial reference evaluator the properties are defined against.
fn matches(rule: &Rule, pkt: &PacketView) -> bool {
    if !rule.device.is_empty() && !rule.device.contains(&pkt.device_id) {
        return false;
    }
    if !rule.vlan.is_empty() && !rule.vlan.iter().any(|r| (r.lo..=r.hi).contains(&pkt.vlan_id())) {
        return false;
    }
    match &rule.proto {
        None => {}
        Some(ProtoConstraint::Tcp { enable, disable }) => {
            if pkt.transport_proto != PROTO_TCP {
                return false;
            }
            let flags = pkt.tcp_flags & 0x1FF;
            if flags & disable != 0 || flags & enable != *enable {
                return false;
            }
        }
        Some(ProtoConstraint::Udp) => {
            if pkt.transport_proto != PROTO_UDP {
                return false;
            }
        }
        Some(ProtoConstraint::Icmp) => {
            if pkt.transport_proto != PROTO_ICMP {
                return false;
            }
        }
    }
    if !rule.port_src.is_empty() && !rule.port_src.iter().any(|r| (r.lo..=r.hi).contains(&pkt.src_port)) {
        return false;
    }
    if !rule.port_dst.is_empty() && !rule.port_dst.iter().any(|r| (r.lo..=r.hi).contains(&pkt.dst_port)) {
        return false;
    }
    if !rule.net4_dst.is_empty() {
        let addr = u32::from_be_bytes(pkt.dst_ipv4);
        if !rule.net4_dst.iter().any(|c| {
            let (from, to) = c.byte_range();
            let (from, to) = (u32::from_be_bytes(from), u32::from_be_bytes(to));
            (from..=to).contains(&addr)
        }) {
            return false;
        }
    }
    true
}

fn reference_lookup(rules: &[Rule], pkt: &PacketView) -> Option<RuleId> {
    rules.iter().position(|r| matches(r, pkt)).map(|i| i as RuleId)
}

fn random_rule(rng: &mut impl Rng) -> Rule {
    let mut rule = Rule::default();
    if rng.random_bool(0.5) {
        rule.device = vec![rng.random_range(0..4)];
    }
    if rng.random_bool(0.3) {
        let lo = rng.random_range(0..4000);
        rule.vlan = vec![VlanRange::new(lo, lo + rng.random_range(0..50))];
    }
    if rng.random_bool(0.4) {
        rule.proto = Some(match rng.random_range(0..3) {
            0 => ProtoConstraint::Udp,
            1 => ProtoConstraint::Icmp,
            _ => ProtoConstraint::Tcp { enable: rng.random_range(0..0x1FF), disable: 0 },
        });
    }
    if rng.random_bool(0.4) {
        let base = rng.random_range(0..200) * 4_000_000u32;
        rule.net4_dst = vec![Ipv4Cidr::new(base, rng.random_range(8..32))];
    }
    rule
}

fn random_packet(rng: &mut impl Rng) -> PacketView {
    let mut pkt = PacketView::default();
    pkt.device_id = rng.random_range(0..4);
    pkt.vlan_tci = rng.random_range(0..4096);
    pkt.transport_proto = [PROTO_TCP, PROTO_UDP, PROTO_ICMP][rng.random_range(0..3)];
    pkt.tcp_flags = rng.random_range(0..0x1FF);
    pkt.dst_ipv4 = (rng.random_range(0..200) * 4_000_000u32).to_be_bytes();
    pkt
}

/// P1: compiled lookup agrees with the reference evaluator.
#[test]
fn p1_correctness_against_reference_evaluator() {
    let mut rng = rand::rng();
    for _ in 0..50 {
        let rules: Vec<Rule> = (0..rng.random_range(1..12)).map(|_| random_rule(&mut rng)).collect();
        let log = default_logger();
        let filter = compile(FilterFlavor::Ipv4, &rules, &log).unwrap();
        for _ in 0..50 {
            let pkt = random_packet(&mut rng);
            assert_eq!(lookup(&filter, &pkt), reference_lookup(&rules, &pkt));
        }
    }
}

/// P2: compiling the same rule set twice yields byte-identical output.
#[test]
fn p2_determinism() {
    let rules = vec![
        Rule { device: vec![1, 2], ..Default::default() },
        Rule { net4_dst: vec![Ipv4Cidr::new(u32::from_be_bytes([10, 0, 0, 0]), 8)], ..Default::default() },
    ];
    let log = default_logger();
    let a = compile(FilterFlavor::Ipv4, &rules, &log).unwrap();
    let b = compile(FilterFlavor::Ipv4, &rules, &log).unwrap();
    assert_eq!(a.to_bytes().unwrap(), b.to_bytes().unwrap());
}

/// P4: relocating a `CompiledFilter`'s bytes to a fresh allocation leaves
/// lookups unchanged.
#[test]
fn p4_offset_safety_across_relocation() {
    let rules = vec![Rule {
        net4_dst: vec![Ipv4Cidr::new(u32::from_be_bytes([192, 168, 0, 0]), 16)],
        ..Default::default()
    }];
    let log = default_logger();
    let filter = compile(FilterFlavor::Ipv4, &rules, &log).unwrap();
    let bytes = filter.to_bytes().unwrap();

    // Simulate a relocation: move the bytes through a freshly heap-allocated
    // buffer at an unrelated address before deserializing.
    let relocated_bytes: Box<[u8]> = bytes.into_boxed_slice();
    let restored = filter_compiler::CompiledFilter::from_bytes(&relocated_bytes).unwrap();

    let mut rng = rand::rng();
    for _ in 0..200 {
        let pkt = random_packet(&mut rng);
        assert_eq!(lookup(&filter, &pkt), lookup(&restored, &pkt));
    }
}

/// P5: touching the same cell twice within one generation is identical to
/// touching it once.
#[test]
fn p5_touch_is_idempotent() {
    use filter_compiler::value_table::ValueTable;

    let mut once = ValueTable::<1>::new("p5", [4]).unwrap();
    let g = once.new_gen();
    once.touch([0], g);
    once.compact();

    let mut twice = ValueTable::<1>::new("p5", [4]).unwrap();
    let g = twice.new_gen();
    twice.touch([0], g);
    twice.touch([0], g);
    twice.compact();

    assert_eq!(once.get([0]), twice.get([0]));
    assert_eq!(once.max_class(), twice.max_class());
}

/// P3: class minimality — two device ids end up in the same class iff the
/// exact same subset of rules constrains them.
#[test]
fn p3_class_minimality_for_device_attribute() {
    let rules = vec![
        Rule { device: vec![1, 2], ..Default::default() }, // {1,2}
        Rule { device: vec![2, 3], ..Default::default() }, // {2,3}
    ];
    let log = default_logger();
    let filter = compile(FilterFlavor::L2, &rules, &log).unwrap();

    // device 1: only rule 0. device 2: rules 0 and 1. device 3: only rule 1.
    // device 0 (or any id >3): no rule -- three distinct non-empty classes
    // plus the "matches nothing" class.
    let mut pkt = PacketView::default();
    let classes: Vec<Option<RuleId>> = [1u64, 2, 3, 0]
        .iter()
        .map(|&id| {
            pkt.device_id = id;
            lookup(&filter, &pkt)
        })
        .collect();
    assert_eq!(classes[0], Some(0)); // device 1 -> rule 0 wins
    assert_eq!(classes[1], Some(0)); // device 2 -> rule 0 wins (priority)
    assert_eq!(classes[2], Some(1)); // device 3 -> only rule 1
    assert_eq!(classes[3], None); // device 0 -> no rule

    let stats = filter.stats();
    let device_max_class = stats.attribute_max_classes[0].1;
    // Three distinct non-empty subsets of rules touch some device id here:
    // {0}, {0,1}, {1} -- so exactly 3 non-zero classes.
    assert_eq!(device_max_class, 3);
}

/// P6: a wildcard rule on an attribute matches every value in that
/// attribute's domain, checked by random sampling.
#[test]
fn p6_wildcard_matches_every_sampled_value() {
    let rules = vec![Rule::default()];
    let log = default_logger();
    let filter = compile(FilterFlavor::Ipv6, &rules, &log).unwrap();

    let mut rng = rand::rng();
    for _ in 0..200 {
        let mut pkt = random_packet(&mut rng);
        pkt.transport_proto = [PROTO_TCP, PROTO_UDP, PROTO_ICMP][rng.random_range(0..3)];
        rng.fill(&mut pkt.src_ipv6);
        rng.fill(&mut pkt.dst_ipv6);
        assert_eq!(lookup(&filter, &pkt), Some(0));
    }
}
