//! The value registry: for each rule, one variable-length *range*
//! listing the class numbers on an attribute that the rule covers.
//! Duplicate class numbers within a range are harmless.

/// An ordered sequence of ranges, one per rule, in rule-priority order.
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct ValueRegistry {
    ranges: Vec<Vec<u32>>,
}

impl ValueRegistry {
    pub fn new() -> Self {
        Self { ranges: Vec::new() }
    }

    /// Begin a new range for the next rule.
    pub fn start(&mut self) {
        self.ranges.push(Vec::new());
    }

    /// Append a class number to the current range.
    pub fn collect(&mut self, class: u32) {
        self.ranges
            .last_mut()
            .expect("collect before start")
            .push(class);
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn range(&self, rule_index: usize) -> &[u32] {
        &self.ranges[rule_index]
    }

    pub fn ranges(&self) -> &[Vec<u32>] {
        &self.ranges
    }
}
