use crate::remote::RemoteFields;
use crate::error::SessionError;
use pulse_lib::metrics::hrv::HrvSummary;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Shown and stored in place of autonomic indices that were not computed.
pub const UNAVAILABLE: &str = "---";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    Local,
    Remote,
}

/// SNS/PNS index: a number from the remote service, or an explicit placeholder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AutonomicIndex {
    Unavailable,
    Value(f64),
}

impl AutonomicIndex {
    /// Rounded to three decimals, as delivered to the user.
    pub fn rounded(value: f64) -> Self {
        AutonomicIndex::Value((value * 1000.0).round_ties_even() / 1000.0)
    }
}

impl std::fmt::Display for AutonomicIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AutonomicIndex::Unavailable => f.write_str(UNAVAILABLE),
            AutonomicIndex::Value(v) => write!(f, "{v}"),
        }
    }
}

impl Serialize for AutonomicIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AutonomicIndex::Unavailable => serializer.serialize_str(UNAVAILABLE),
            AutonomicIndex::Value(v) => serializer.serialize_f64(*v),
        }
    }
}

impl<'de> Deserialize<'de> for AutonomicIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(v) => AutonomicIndex::Value(v),
            Raw::Text(_) => AutonomicIndex::Unavailable,
        })
    }
}

/// Result of one completed analysis. Built once, never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub id: u64,
    pub timestamp: u64,
    #[serde(rename = "type")]
    pub kind: AnalysisKind,
    pub mean_ppi: u32,
    pub mean_hr: u32,
    pub sdnn: u32,
    pub rmssd: u32,
    pub sns: AutonomicIndex,
    pub pns: AutonomicIndex,
}

impl MetricsRecord {
    pub fn local(id: u64, timestamp: u64, hrv: &HrvSummary) -> Self {
        Self {
            id,
            timestamp,
            kind: AnalysisKind::Local,
            mean_ppi: round_ms(hrv.mean_ppi),
            mean_hr: round_ms(hrv.mean_hr),
            sdnn: round_ms(hrv.sdnn),
            rmssd: round_ms(hrv.rmssd),
            sns: AutonomicIndex::Unavailable,
            pns: AutonomicIndex::Unavailable,
        }
    }

    /// Build from a parsed remote response. Every field is required here even
    /// though parsing tolerates absent ones.
    pub fn remote(id: u64, timestamp: u64, fields: &RemoteFields) -> Result<Self, SessionError> {
        Ok(Self {
            id,
            timestamp,
            kind: AnalysisKind::Remote,
            mean_ppi: round_ms(require(fields.mean_ppi, "mean_rr_ms")?),
            mean_hr: round_ms(require(fields.mean_hr, "mean_hr_bpm")?),
            sdnn: round_ms(require(fields.sdnn, "sdnn_ms")?),
            rmssd: round_ms(require(fields.rmssd, "rmssd_ms")?),
            sns: AutonomicIndex::rounded(require(fields.sns, "sns_index")?),
            pns: AutonomicIndex::rounded(require(fields.pns, "pns_index")?),
        })
    }

    /// `KEY: value` lines for the result screen.
    pub fn display_lines(&self) -> Vec<String> {
        vec![
            format!("MEAN PPI: {}", self.mean_ppi),
            format!("MEAN HR: {}", self.mean_hr),
            format!("SDNN: {}", self.sdnn),
            format!("RMSSD: {}", self.rmssd),
            format!("SNS: {}", self.sns),
            format!("PNS: {}", self.pns),
        ]
    }
}

fn require(value: Option<f64>, name: &'static str) -> Result<f64, SessionError> {
    value
        .filter(|v| v.is_finite())
        .ok_or(SessionError::MissingField(name))
}

fn round_ms(value: f64) -> u32 {
    value.round_ties_even().clamp(0.0, u32::MAX as f64) as u32
}
