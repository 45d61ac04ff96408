use crate::record::RecordKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Counters collected while building the structural index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub records: usize,
    pub wafers: usize,
    pub parts: usize,
    pub part_counts: usize,
    /// Close markers seen with no scope of their kind open
    pub orphan_closes: usize,
    /// Scopes still open when the stream ended
    pub unterminated_scopes: usize,
    pub kinds: BTreeMap<RecordKind, usize>,
}

impl IndexStats {
    pub(crate) fn observe(&mut self, kind: RecordKind) {
        self.records += 1;
        *self.kinds.entry(kind).or_insert(0) += 1;
    }

    pub fn count_of(&self, kind: RecordKind) -> usize {
        self.kinds.get(&kind).copied().unwrap_or(0)
    }
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Index Statistics")?;
        writeln!(f, "================")?;
        writeln!(f, "Records:          {}", self.records)?;
        writeln!(f, "Wafer extents:    {}", self.wafers)?;
        writeln!(f, "Part extents:     {}", self.parts)?;
        writeln!(f, "Part counts:      {}", self.part_counts)?;
        if self.orphan_closes > 0 {
            writeln!(f, "Orphan closes:    {}", self.orphan_closes)?;
        }
        if self.unterminated_scopes > 0 {
            writeln!(f, "Unterminated:     {}", self.unterminated_scopes)?;
        }

        let mut sorted: Vec<_> = self.kinds.iter().collect();
        sorted.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

        writeln!(f)?;
        writeln!(f, "Records by kind:")?;
        for (kind, count) in sorted.iter().take(15) {
            writeln!(f, "  {:8} {}", kind.name(), count)?;
        }
        if sorted.len() > 15 {
            writeln!(f, "  ... and {} more", sorted.len() - 15)?;
        }
        Ok(())
    }
}
