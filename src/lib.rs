//! The YANET filter compiler: turns a priority-ordered list of
//! packet-classification rules into per-attribute lookup structures plus a
//! dense cross-product action table, so that classifying a packet against
//! the whole rule set reduces to one class lookup per attribute and one
//! final table fetch.
//!
//! See [`compile`] and [`lookup`] for the compiler's two entry points, and
//! [`driver::FilterFlavor`] for the set of attributes a given filter runs.

pub mod attr;
pub mod bigkey;
pub mod driver;
pub mod error;
pub mod lpm;
pub mod offset;
pub mod packet;
pub mod range_collector;
pub mod rule;
pub mod value_registry;
pub mod value_table;

pub use driver::{compile, lookup, CompiledFilter, FilterFlavor, FilterStats};
pub use error::{CompileError, SkippedRule};
pub use packet::PacketView;
pub use rule::{Ipv4Cidr, Ipv6Cidr, ProtoConstraint, Rule, RuleId};

use slog::{o, Drain};

/// A reasonable default logger for callers that don't already have one:
/// async, term-formatted, built on the same `slog` stack the rest of the
/// crate logs through.
pub fn default_logger() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_envlogger::new(drain);
    let drain = slog_async::Async::new(drain).build().fuse();
    slog::Logger::root(drain, o!())
}
