//! Ledger summaries for `runledger list` and `runledger stats`

use crate::fingerprint::Fingerprint;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Write};

/// A ledger entry as printed by `list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonEntry {
    /// Short FNV id of the fingerprint line
    pub id: String,
    #[serde(flatten)]
    pub fingerprint: Fingerprint,
}

impl From<&Fingerprint> for JsonEntry {
    fn from(fingerprint: &Fingerprint) -> Self {
        Self {
            id: short_id(fingerprint),
            fingerprint: fingerprint.clone(),
        }
    }
}

/// Count of recorded edges reaching one callee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalleeStats {
    /// `Class.method`
    pub callee: String,
    pub entries: u64,
    /// Distinct caller functions among those entries
    pub callers: u64,
}

/// Per-callee counts over a set of ledger entries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub total: u64,
    /// Sorted by entry count, descending, then by callee
    pub callees: Vec<CalleeStats>,
}

impl LedgerSummary {
    pub fn from_entries(entries: &[Fingerprint]) -> Self {
        let mut by_callee: HashMap<String, (u64, Vec<&str>)> = HashMap::new();
        for entry in entries {
            let slot = by_callee.entry(entry.callee()).or_default();
            slot.0 += 1;
            if !slot.1.contains(&entry.caller_function.as_str()) {
                slot.1.push(&entry.caller_function);
            }
        }

        let mut callees: Vec<CalleeStats> = by_callee
            .into_iter()
            .map(|(callee, (entries, callers))| CalleeStats {
                callee,
                entries,
                callers: callers.len() as u64,
            })
            .collect();
        callees.sort_by(|a, b| b.entries.cmp(&a.entries).then_with(|| a.callee.cmp(&b.callee)));

        Self {
            total: entries.len() as u64,
            callees,
        }
    }

    pub fn write_text<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if self.callees.is_empty() {
            writeln!(out, "No ledger entries recorded.")?;
            return Ok(());
        }

        writeln!(out, "{:<50} {:>10} {:>10}", "Callee", "Entries", "Callers")?;
        writeln!(out, "{}", "─".repeat(72))?;
        for stats in &self.callees {
            writeln!(
                out,
                "{:<50} {:>10} {:>10}",
                stats.callee, stats.entries, stats.callers
            )?;
        }
        writeln!(out, "{}", "─".repeat(72))?;
        writeln!(out, "{:<50} {:>10}", "total", self.total)
    }
}

/// Zero-padded hex of the fingerprint id, first 8 digits
pub fn short_id(fingerprint: &Fingerprint) -> String {
    let mut id = format!("{:016x}", fingerprint.id());
    id.truncate(8);
    id
}

/// One line per entry: short id, then the fingerprint
pub fn write_entries_text<W: Write>(entries: &[Fingerprint], out: &mut W) -> io::Result<()> {
    for entry in entries {
        writeln!(out, "{}  {}", short_id(entry), entry)?;
    }
    Ok(())
}
