//! The filter driver: runs every active attribute plug-in,
//! folds their registries into a dense action table, and answers packet
//! lookups against the compiled result.

use serde::{Deserialize, Serialize};
use slog::{debug, trace, warn, Logger};

use crate::attr::{device::DeviceClassifier, net4::Net4Classifier, net6::Net6Classifier,
    port::PortClassifier, proto::ProtoClassifier, vlan::VlanClassifier, AttributeKind,
    ClassifierState, Side};
use crate::error::{CompileError, SkippedRule};
use crate::packet::PacketView;
use crate::rule::{Rule, RuleId};
use crate::value_registry::ValueRegistry;

/// Which fixed, ordered set of attributes a compiled filter runs: the one
/// compile-time configuration knob the filter compiler itself understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterFlavor {
    /// Layer-2 only: no IP-address attributes at all.
    L2,
    Ipv4,
    Ipv6,
}

impl FilterFlavor {
    pub fn attributes(&self) -> &'static [AttributeKind] {
        use AttributeKind::*;
        match self {
            FilterFlavor::L2 => &[Device, Vlan, Proto, PortSrc, PortDst],
            FilterFlavor::Ipv4 => &[Device, Vlan, Proto, PortSrc, PortDst, Net4Src, Net4Dst],
            FilterFlavor::Ipv6 => &[Device, Vlan, Proto, PortSrc, PortDst, Net6Src, Net6Dst],
        }
    }
}

/// The action table: a dense tensor of rank `k` (one dimension per
/// active attribute), cell value `rule_id + 1` or `0` for "no match". Rank
/// varies with [`FilterFlavor`] (5 or 7), so it's stored flattened with a
/// runtime-known shape rather than as a const-generic `ValueTable`.
#[derive(Serialize, Deserialize)]
struct ActionTable {
    dims: Vec<usize>,
    cells: Vec<u32>,
}

impl ActionTable {
    fn new(dims: Vec<usize>) -> Self {
        let total = dims.iter().product();
        Self { dims, cells: vec![0; total] }
    }

    fn flatten(&self, idx: &[u32]) -> usize {
        let mut flat = 0usize;
        for (i, &d) in self.dims.iter().enumerate() {
            flat = flat * d + idx[i] as usize;
        }
        flat
    }

    fn claim(&mut self, idx: &[u32], candidate: u32) {
        let flat = self.flatten(idx);
        if self.cells[flat] == 0 || candidate < self.cells[flat] {
            self.cells[flat] = candidate;
        }
    }

    fn get(&self, idx: &[u32]) -> u32 {
        self.cells[self.flatten(idx)]
    }
}

/// The compiled output of [`compile`]: every active classifier plus the
/// action table that composes them. Immutable and safe to share across any
/// number of concurrent [`lookup`] callers.
#[derive(Serialize, Deserialize)]
pub struct CompiledFilter {
    flavor: FilterFlavor,
    classifiers: Vec<ClassifierState>,
    table: ActionTable,
    skipped: Vec<SkippedRule>,
}

/// Diagnostic summary of a compiled filter, in the style of a
/// `Table::dump`-style introspection helper.
#[derive(Debug, Clone)]
pub struct FilterStats {
    pub flavor: FilterFlavor,
    pub attribute_max_classes: Vec<(&'static str, u32)>,
    pub action_table_cells: usize,
    pub rules_skipped: usize,
}

impl CompiledFilter {
    pub fn flavor(&self) -> FilterFlavor {
        self.flavor
    }

    pub fn skipped_rules(&self) -> &[SkippedRule] {
        &self.skipped
    }

    /// Serialize for transport to a fresh memory region. Stands in for a
    /// binary offset-relative layout: every classifier here already
    /// addresses its own nodes by `Vec` index rather than raw pointer, so a
    /// `serde_json` round trip through a byte buffer demonstrates the same
    /// "valid after an arbitrary relocation" property without `unsafe`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CompileError> {
        serde_json::to_vec(self).map_err(|e| CompileError::InternalInvariantViolation {
            detail: format!("serialize failed: {e}"),
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CompileError> {
        serde_json::from_slice(bytes).map_err(|e| CompileError::InternalInvariantViolation {
            detail: format!("deserialize failed: {e}"),
        })
    }

    pub fn stats(&self) -> FilterStats {
        let attribute_max_classes = self
            .flavor
            .attributes()
            .iter()
            .zip(self.classifiers.iter())
            .map(|(kind, c)| (kind.name(), c.max_class()))
            .collect();
        FilterStats {
            flavor: self.flavor,
            attribute_max_classes,
            action_table_cells: self.table.cells.len(),
            rules_skipped: self.skipped.len(),
        }
    }
}

fn init_classifier(kind: AttributeKind, rules: &[Rule]) -> Result<(ClassifierState, ValueRegistry), CompileError> {
    Ok(match kind {
        AttributeKind::Device => {
            let (c, r) = DeviceClassifier::init(rules)?;
            (ClassifierState::Device(c), r)
        }
        AttributeKind::Vlan => {
            let (c, r) = VlanClassifier::init(rules)?;
            (ClassifierState::Vlan(c), r)
        }
        AttributeKind::Proto => {
            let (c, r) = ProtoClassifier::init(rules)?;
            (ClassifierState::Proto(c), r)
        }
        AttributeKind::PortSrc => {
            let (c, r) = PortClassifier::init(rules, Side::Src)?;
            (ClassifierState::Port(c), r)
        }
        AttributeKind::PortDst => {
            let (c, r) = PortClassifier::init(rules, Side::Dst)?;
            (ClassifierState::Port(c), r)
        }
        AttributeKind::Net4Src => {
            let (c, r) = Net4Classifier::init(rules, Side::Src)?;
            (ClassifierState::Net4(c), r)
        }
        AttributeKind::Net4Dst => {
            let (c, r) = Net4Classifier::init(rules, Side::Dst)?;
            (ClassifierState::Net4(c), r)
        }
        AttributeKind::Net6Src => {
            let (c, r) = Net6Classifier::init(rules, Side::Src)?;
            (ClassifierState::Net6(c), r)
        }
        AttributeKind::Net6Dst => {
            let (c, r) = Net6Classifier::init(rules, Side::Dst)?;
            (ClassifierState::Net6(c), r)
        }
    })
}

/// Compile `rules` (priority order, index 0 highest) into a [`CompiledFilter`]
/// for the given `flavor`.
///
/// Rules that specify an impossible predicate (`InvalidRule`) are skipped
/// and recorded in [`CompiledFilter::skipped_rules`]; every other failure
/// is fatal and rolls back the whole compile (nothing from a failed
/// compile is returned to the caller to free — plain `Vec` drop handles
/// it).
pub fn compile(flavor: FilterFlavor, rules: &[Rule], log: &Logger) -> Result<CompiledFilter, CompileError> {
    let mut skipped = Vec::new();
    let mut live_rules: Vec<Rule> = Vec::with_capacity(rules.len());
    let mut live_ids: Vec<RuleId> = Vec::with_capacity(rules.len());
    for (id, rule) in rules.iter().enumerate() {
        if rule.is_invalid() {
            warn!(log, "skipping rule"; "rule_id" => id, "reason" => "invalid predicate");
            skipped.push(SkippedRule { rule_id: id as u32, reason: "invalid predicate".to_string() });
            continue;
        }
        live_rules.push(rule.clone());
        live_ids.push(id as u32);
    }

    let attrs = flavor.attributes();
    let mut classifiers = Vec::with_capacity(attrs.len());
    let mut registries = Vec::with_capacity(attrs.len());
    for &kind in attrs {
        debug!(log, "initializing attribute classifier"; "attribute" => kind.name());
        let (classifier, registry) = init_classifier(kind, &live_rules)?;
        trace!(log, "attribute classifier ready"; "attribute" => kind.name(), "max_class" => classifier.max_class());
        classifiers.push(classifier);
        registries.push(registry);
    }

    let dims: Vec<usize> = classifiers.iter().map(|c| c.max_class() as usize + 1).collect();
    let mut table = ActionTable::new(dims);

    for (local_idx, &rule_id) in live_ids.iter().enumerate() {
        let candidate = rule_id + 1;
        let ranges: Vec<&[u32]> = registries.iter().map(|r| r.range(local_idx)).collect();
        for_each_tuple(&ranges, &mut |tuple| table.claim(tuple, candidate));
    }

    debug!(log, "compile finished"; "rules_live" => live_rules.len(), "rules_skipped" => skipped.len(), "action_table_cells" => table.cells.len());

    Ok(CompiledFilter { flavor, classifiers, table, skipped })
}

/// Call `f` once per tuple in the cartesian product `ranges[0] x ... x ranges[k-1]`.
fn for_each_tuple(ranges: &[&[u32]], f: &mut impl FnMut(&[u32])) {
    let mut tuple = vec![0u32; ranges.len()];
    for_each_tuple_rec(ranges, 0, &mut tuple, f);
}

fn for_each_tuple_rec(ranges: &[&[u32]], depth: usize, tuple: &mut [u32], f: &mut impl FnMut(&[u32])) {
    if depth == ranges.len() {
        f(tuple);
        return;
    }
    for &v in ranges[depth] {
        tuple[depth] = v;
        for_each_tuple_rec(ranges, depth + 1, tuple, f);
    }
}

/// Classify `pkt` against `filter`. `None` if no rule matched, the
/// matching [`RuleId`] otherwise. Pure, allocation-free, safe to call
/// concurrently from any number of readers.
pub fn lookup(filter: &CompiledFilter, pkt: &PacketView) -> Option<RuleId> {
    let mut idx = [0u32; 8];
    for (i, c) in filter.classifiers.iter().enumerate() {
        idx[i] = c.lookup(pkt);
    }
    let action = filter.table.get(&idx[..filter.classifiers.len()]);
    if action == 0 {
        None
    } else {
        Some(action - 1)
    }
}
