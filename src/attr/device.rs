//! The `device` attribute: a 1-D value table over
//! `{0, ..., max_device_id}`.

use crate::error::CompileError;
use crate::packet::PacketView;
use crate::rule::Rule;
use crate::value_registry::ValueRegistry;
use crate::value_table::ValueTable;

#[derive(serde::Serialize, serde::Deserialize)]
pub struct DeviceClassifier {
    table: ValueTable<1>,
}

impl DeviceClassifier {
    pub fn init(rules: &[Rule]) -> Result<(Self, ValueRegistry), CompileError> {
        let max_id = rules.iter().flat_map(|r| r.device.iter()).copied().max().unwrap_or(0);
        let domain = max_id as usize + 1;
        let mut table = ValueTable::<1>::new("device", [domain])?;

        for rule in rules {
            if rule.device.is_empty() {
                continue;
            }
            let gen = table.new_gen();
            for &id in &rule.device {
                table.touch([id as usize], gen);
            }
        }
        table.compact();

        let mut registry = ValueRegistry::new();
        for rule in rules {
            registry.start();
            if rule.device.is_empty() {
                for id in 0..domain {
                    registry.collect(table.get([id]));
                }
            } else {
                for &id in &rule.device {
                    registry.collect(table.get([id as usize]));
                }
            }
        }

        Ok((Self { table }, registry))
    }

    pub fn lookup(&self, pkt: &PacketView) -> u32 {
        let id = pkt.device_id as usize;
        if id < self.table.dims()[0] {
            self.table.get([id])
        } else {
            0
        }
    }

    pub fn max_class(&self) -> u32 {
        self.table.max_class()
    }
}
