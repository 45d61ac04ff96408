use serde::{Deserialize, Serialize};
use std::fmt;

/// STDF V4 record kinds.
///
/// The set is closed: the decoder maps every (type, subtype) pair it does not
/// recognize, and every record it failed to decode, to [`RecordKind::Unknown`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordKind {
    /// File attributes
    Far,
    /// Audit trail
    Atr,
    /// Master information (lot open)
    Mir,
    /// Master results (lot close)
    Mrr,
    /// Part count (per head/site, or the all-sites summary)
    Pcr,
    /// Hardware bin
    Hbr,
    /// Software bin
    Sbr,
    /// Pin map
    Pmr,
    /// Pin group
    Pgr,
    /// Pin list
    Plr,
    /// Retest data
    Rdr,
    /// Site description
    Sdr,
    /// Wafer information (wafer open)
    Wir,
    /// Wafer results (wafer close)
    Wrr,
    /// Wafer configuration
    Wcr,
    /// Part information (part open)
    Pir,
    /// Part results (part close)
    Prr,
    /// Test synopsis
    Tsr,
    /// Parametric test
    Ptr,
    /// Multiple-result parametric test
    Mpr,
    /// Functional test
    Ftr,
    /// Begin program section
    Bps,
    /// End program section
    Eps,
    /// Generic data
    Gdr,
    /// Datalog text
    Dtr,
    /// Unrecognized or undecodable record
    #[default]
    Unknown,
}

impl RecordKind {
    pub const ALL: [RecordKind; 26] = [
        RecordKind::Far,
        RecordKind::Atr,
        RecordKind::Mir,
        RecordKind::Mrr,
        RecordKind::Pcr,
        RecordKind::Hbr,
        RecordKind::Sbr,
        RecordKind::Pmr,
        RecordKind::Pgr,
        RecordKind::Plr,
        RecordKind::Rdr,
        RecordKind::Sdr,
        RecordKind::Wir,
        RecordKind::Wrr,
        RecordKind::Wcr,
        RecordKind::Pir,
        RecordKind::Prr,
        RecordKind::Tsr,
        RecordKind::Ptr,
        RecordKind::Mpr,
        RecordKind::Ftr,
        RecordKind::Bps,
        RecordKind::Eps,
        RecordKind::Gdr,
        RecordKind::Dtr,
        RecordKind::Unknown,
    ];

    /// Map an STDF (REC_TYP, REC_SUB) header pair to a kind
    pub fn from_code(rec_typ: u8, rec_sub: u8) -> Self {
        match (rec_typ, rec_sub) {
            (0, 10) => RecordKind::Far,
            (0, 20) => RecordKind::Atr,
            (1, 10) => RecordKind::Mir,
            (1, 20) => RecordKind::Mrr,
            (1, 30) => RecordKind::Pcr,
            (1, 40) => RecordKind::Hbr,
            (1, 50) => RecordKind::Sbr,
            (1, 60) => RecordKind::Pmr,
            (1, 62) => RecordKind::Pgr,
            (1, 63) => RecordKind::Plr,
            (1, 70) => RecordKind::Rdr,
            (1, 80) => RecordKind::Sdr,
            (2, 10) => RecordKind::Wir,
            (2, 20) => RecordKind::Wrr,
            (2, 30) => RecordKind::Wcr,
            (5, 10) => RecordKind::Pir,
            (5, 20) => RecordKind::Prr,
            (10, 30) => RecordKind::Tsr,
            (15, 10) => RecordKind::Ptr,
            (15, 15) => RecordKind::Mpr,
            (15, 20) => RecordKind::Ftr,
            (20, 10) => RecordKind::Bps,
            (20, 20) => RecordKind::Eps,
            (50, 10) => RecordKind::Gdr,
            (50, 30) => RecordKind::Dtr,
            _ => RecordKind::Unknown,
        }
    }

    /// The (REC_TYP, REC_SUB) header pair, `None` for [`RecordKind::Unknown`]
    pub fn code(self) -> Option<(u8, u8)> {
        let code = match self {
            RecordKind::Far => (0, 10),
            RecordKind::Atr => (0, 20),
            RecordKind::Mir => (1, 10),
            RecordKind::Mrr => (1, 20),
            RecordKind::Pcr => (1, 30),
            RecordKind::Hbr => (1, 40),
            RecordKind::Sbr => (1, 50),
            RecordKind::Pmr => (1, 60),
            RecordKind::Pgr => (1, 62),
            RecordKind::Plr => (1, 63),
            RecordKind::Rdr => (1, 70),
            RecordKind::Sdr => (1, 80),
            RecordKind::Wir => (2, 10),
            RecordKind::Wrr => (2, 20),
            RecordKind::Wcr => (2, 30),
            RecordKind::Pir => (5, 10),
            RecordKind::Prr => (5, 20),
            RecordKind::Tsr => (10, 30),
            RecordKind::Ptr => (15, 10),
            RecordKind::Mpr => (15, 15),
            RecordKind::Ftr => (15, 20),
            RecordKind::Bps => (20, 10),
            RecordKind::Eps => (20, 20),
            RecordKind::Gdr => (50, 10),
            RecordKind::Dtr => (50, 30),
            RecordKind::Unknown => return None,
        };
        Some(code)
    }

    /// Whether records of this kind carry a `head_num` field
    pub fn has_head(self) -> bool {
        matches!(
            self,
            RecordKind::Pcr
                | RecordKind::Hbr
                | RecordKind::Sbr
                | RecordKind::Pmr
                | RecordKind::Sdr
                | RecordKind::Wir
                | RecordKind::Wrr
                | RecordKind::Pir
                | RecordKind::Prr
                | RecordKind::Tsr
                | RecordKind::Ptr
                | RecordKind::Mpr
                | RecordKind::Ftr
        )
    }

    /// Whether records of this kind carry both `head_num` and `site_num`
    pub fn has_site(self) -> bool {
        matches!(
            self,
            RecordKind::Pcr
                | RecordKind::Hbr
                | RecordKind::Sbr
                | RecordKind::Pmr
                | RecordKind::Pir
                | RecordKind::Prr
                | RecordKind::Tsr
                | RecordKind::Ptr
                | RecordKind::Mpr
                | RecordKind::Ftr
        )
    }

    /// Kinds that open or close a structural scope
    pub fn is_marker(self) -> bool {
        matches!(
            self,
            RecordKind::Mir
                | RecordKind::Mrr
                | RecordKind::Wir
                | RecordKind::Wrr
                | RecordKind::Pir
                | RecordKind::Prr
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            RecordKind::Far => "FAR",
            RecordKind::Atr => "ATR",
            RecordKind::Mir => "MIR",
            RecordKind::Mrr => "MRR",
            RecordKind::Pcr => "PCR",
            RecordKind::Hbr => "HBR",
            RecordKind::Sbr => "SBR",
            RecordKind::Pmr => "PMR",
            RecordKind::Pgr => "PGR",
            RecordKind::Plr => "PLR",
            RecordKind::Rdr => "RDR",
            RecordKind::Sdr => "SDR",
            RecordKind::Wir => "WIR",
            RecordKind::Wrr => "WRR",
            RecordKind::Wcr => "WCR",
            RecordKind::Pir => "PIR",
            RecordKind::Prr => "PRR",
            RecordKind::Tsr => "TSR",
            RecordKind::Ptr => "PTR",
            RecordKind::Mpr => "MPR",
            RecordKind::Ftr => "FTR",
            RecordKind::Bps => "BPS",
            RecordKind::Eps => "EPS",
            RecordKind::Gdr => "GDR",
            RecordKind::Dtr => "DTR",
            RecordKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trips_for_known_kinds() {
        for kind in RecordKind::ALL {
            match kind.code() {
                Some((typ, sub)) => assert_eq!(RecordKind::from_code(typ, sub), kind),
                None => assert_eq!(kind, RecordKind::Unknown),
            }
        }
    }

    #[test]
    fn test_unrecognized_code_is_unknown() {
        assert_eq!(RecordKind::from_code(180, 1), RecordKind::Unknown);
        assert_eq!(RecordKind::from_code(1, 11), RecordKind::Unknown);
    }

    #[test]
    fn test_site_bearing_kinds_also_carry_head() {
        for kind in RecordKind::ALL {
            if kind.has_site() {
                assert!(kind.has_head(), "{kind} has a site but no head");
            }
        }
    }

    #[test]
    fn test_serde_uses_stdf_names() {
        let json = serde_json::to_string(&RecordKind::Prr).unwrap();
        assert_eq!(json, "\"PRR\"");
        let back: RecordKind = serde_json::from_str("\"WIR\"").unwrap();
        assert_eq!(back, RecordKind::Wir);
    }
}
