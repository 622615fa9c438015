//! The `port_src`/`port_dst` attributes: a 1-D value table over
//! the full 16-bit port domain, shared by both directions via [`Side`].

use crate::attr::{is_full_width, Side};
use crate::error::CompileError;
use crate::packet::PacketView;
use crate::rule::Rule;
use crate::value_registry::ValueRegistry;
use crate::value_table::ValueTable;

const PORT_DOMAIN: usize = 1 << 16;

#[derive(serde::Serialize, serde::Deserialize)]
pub struct PortClassifier {
    table: ValueTable<1>,
    side: Side,
}

impl PortClassifier {
    pub fn init(rules: &[Rule], side: Side) -> Result<(Self, ValueRegistry), CompileError> {
        let attribute = match side {
            Side::Src => "port_src",
            Side::Dst => "port_dst",
        };
        let mut table = ValueTable::<1>::new(attribute, [PORT_DOMAIN])?;

        for rule in rules {
            let ranges = side.port_ranges(rule);
            if ranges.is_empty() {
                continue;
            }
            let gen = table.new_gen();
            for r in ranges {
                if is_full_width(r) {
                    continue;
                }
                for port in r.lo..=r.hi {
                    table.touch([port as usize], gen);
                }
            }
        }
        table.compact();

        let mut registry = ValueRegistry::new();
        for rule in rules {
            registry.start();
            let ranges = side.port_ranges(rule);
            if ranges.is_empty() {
                for port in 0..PORT_DOMAIN {
                    registry.collect(table.get([port]));
                }
                continue;
            }
            for r in ranges {
                if is_full_width(r) {
                    for port in 0..PORT_DOMAIN {
                        registry.collect(table.get([port]));
                    }
                } else {
                    for port in r.lo..=r.hi {
                        registry.collect(table.get([port as usize]));
                    }
                }
            }
        }

        Ok((Self { table, side }, registry))
    }

    pub fn lookup(&self, pkt: &PacketView) -> u32 {
        if !pkt.has_l4_ports() {
            return 0;
        }
        self.table.get([self.side.port(pkt) as usize])
    }

    pub fn max_class(&self) -> u32 {
        self.table.max_class()
    }
}
