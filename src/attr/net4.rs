//! The `net4_src`/`net4_dst` attributes: a range collector over
//! 4-byte CIDRs feeding an LPM whose leaves are remapped to compacted value
//! classes, shared by both directions via [`Side`].

use crate::attr::Side;
use crate::error::CompileError;
use crate::lpm::Lpm;
use crate::packet::PacketView;
use crate::range_collector::RangeCollector;
use crate::rule::Rule;
use crate::value_registry::ValueRegistry;
use crate::value_table::ValueTable;

#[derive(serde::Serialize, serde::Deserialize)]
pub struct Net4Classifier {
    lpm: Lpm<4>,
    side: Side,
    max_class: u32,
}

impl Net4Classifier {
    pub fn init(rules: &[Rule], side: Side) -> Result<(Self, ValueRegistry), CompileError> {
        let attribute = match side {
            Side::Src => "net4_src",
            Side::Dst => "net4_dst",
        };

        let mut collector = RangeCollector::<4>::new();
        let mut per_rule_handles: Vec<Vec<usize>> = Vec::with_capacity(rules.len());
        for rule in rules {
            let cidrs = side.net4_cidrs(rule);
            let mut handles = Vec::with_capacity(cidrs.len());
            for cidr in cidrs {
                let (from, to) = cidr.byte_range();
                handles.push(collector.submit(from, to));
            }
            per_rule_handles.push(handles);
        }

        let (mut lpm, range_index) = collector.build();
        let mut table = ValueTable::<1>::new(attribute, [range_index.count() as usize])?;

        for handles in &per_rule_handles {
            if handles.is_empty() {
                continue;
            }
            let gen = table.new_gen();
            for &h in handles {
                let (start, stop) = range_index.slice(h);
                for i in start..stop {
                    table.touch([i as usize], gen);
                }
            }
        }
        table.compact();
        let max_class = table.max_class();

        lpm.remap(&table);
        lpm.compact();

        let mut registry = ValueRegistry::new();
        let domain = range_index.count() as usize;
        for handles in &per_rule_handles {
            registry.start();
            if handles.is_empty() {
                for i in 0..domain {
                    registry.collect(table.get([i]));
                }
                continue;
            }
            for &h in handles {
                let (start, stop) = range_index.slice(h);
                for i in start..stop {
                    registry.collect(table.get([i as usize]));
                }
            }
        }

        Ok((Self { lpm, side, max_class }, registry))
    }

    pub fn lookup(&self, pkt: &PacketView) -> u32 {
        let addr = self.side.net4_addr(pkt);
        self.lpm.lookup(&addr).unwrap_or(0)
    }

    pub fn max_class(&self) -> u32 {
        self.max_class
    }
}
