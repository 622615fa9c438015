//! The `vlan` attribute: a 1-D value table over the 12-bit VLAN
//! tag domain `{0, ..., 4095}`, with a rule contributing one or more
//! `[lo, hi]` ranges.

use crate::error::CompileError;
use crate::packet::PacketView;
use crate::rule::Rule;
use crate::value_registry::ValueRegistry;
use crate::value_table::ValueTable;

const VLAN_DOMAIN: usize = 4096;

#[derive(serde::Serialize, serde::Deserialize)]
pub struct VlanClassifier {
    table: ValueTable<1>,
}

impl VlanClassifier {
    pub fn init(rules: &[Rule]) -> Result<(Self, ValueRegistry), CompileError> {
        let mut table = ValueTable::<1>::new("vlan", [VLAN_DOMAIN])?;

        for rule in rules {
            if rule.vlan.is_empty() {
                continue;
            }
            let gen = table.new_gen();
            for r in &rule.vlan {
                for id in r.lo..=r.hi {
                    table.touch([id as usize], gen);
                }
            }
        }
        table.compact();

        let mut registry = ValueRegistry::new();
        for rule in rules {
            registry.start();
            if rule.vlan.is_empty() {
                for id in 0..VLAN_DOMAIN {
                    registry.collect(table.get([id]));
                }
            } else {
                for r in &rule.vlan {
                    for id in r.lo..=r.hi {
                        registry.collect(table.get([id as usize]));
                    }
                }
            }
        }

        Ok((Self { table }, registry))
    }

    pub fn lookup(&self, pkt: &PacketView) -> u32 {
        self.table.get([pkt.vlan_id() as usize])
    }

    pub fn max_class(&self) -> u32 {
        self.table.max_class()
    }
}
