//! Interpretation prompt templates
//!
//! Each variant is a different instruction heuristic applied to the same
//! report text, so alternative readings can be compared on real traffic.
//! The mapping from variant number to template is fixed and checked when a
//! call is made.

use crate::types::HistoricalBaseline;

/// Shared frame around every variant's instructions.
const INTERPRETATION_FRAME: &str = r#"You interpret bystander reports about a physical queue (an event line, a pop-up store, a venue door).
Convert the report into structured estimates.

### QUEUE CONTEXT
Historical average wait: {hist_wait} minutes
Historical average people in line: {hist_people}

### INSTRUCTIONS
{instructions}
If the report does not state a value, estimate it from the queue context and lower aiConfidence.
Output ONLY one JSON object with exactly these keys. No preamble. No markdown.

### OUTPUT FORMAT
{"estPplInLine": <integer >= 0>, "estimatedWaitMins": <number >= 0>, "movementRate": "stalled" | "slow" | "steady" | "fast", "entryOutcome": "likely-enter" | "uncertain" | "likely-rejected", "aiConfidence": <number from 0 to 1>}

### REPORT
{raw_text}"#;

/// Variant 0: take the report at face value.
const BALANCED_INSTRUCTIONS: &str = "\
1. Read counts and descriptions literally; convert vague sizes (\"two blocks\", \"around the corner\") into a people count.
2. Derive the wait from the people count and the described movement.
3. Set aiConfidence from how specific the report is.";

/// Variant 1: discount optimism, lean toward longer waits.
const CONSERVATIVE_INSTRUCTIONS: &str = "\
1. Bystanders underestimate lines; when a count is approximate, round it up.
2. Prefer the longer wait whenever the report is ambiguous.
3. Only choose likely-enter when the report clearly says the person will get in.
4. Keep aiConfidence at or below 0.7 unless the report gives exact numbers.";

/// Variant 2: focus on crowd dynamics rather than raw counts.
const CROWD_DYNAMICS_INSTRUCTIONS: &str = "\
1. Weigh movement cues (\"not moving\", \"people leaving\", \"moving fast\") above stated counts.
2. Treat people leaving the line or staff turning people away as evidence for likely-rejected.
3. Scale the historical wait by how the described pace compares with a steady line.
4. Set aiConfidence from how consistent the movement cues are with the count.";

/// Instruction heuristic selected by `variant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpretationVariant {
    Balanced,
    Conservative,
    CrowdDynamics,
}

impl InterpretationVariant {
    pub const ALL: [Self; 3] = [Self::Balanced, Self::Conservative, Self::CrowdDynamics];

    /// Look up a variant by its public number.
    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(Self::Balanced),
            1 => Some(Self::Conservative),
            2 => Some(Self::CrowdDynamics),
            _ => None,
        }
    }

    pub fn index(&self) -> u32 {
        match self {
            Self::Balanced => 0,
            Self::Conservative => 1,
            Self::CrowdDynamics => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Balanced => "balanced",
            Self::Conservative => "conservative",
            Self::CrowdDynamics => "crowd-dynamics",
        }
    }

    fn instructions(&self) -> &'static str {
        match self {
            Self::Balanced => BALANCED_INSTRUCTIONS,
            Self::Conservative => CONSERVATIVE_INSTRUCTIONS,
            Self::CrowdDynamics => CROWD_DYNAMICS_INSTRUCTIONS,
        }
    }

    /// Human-readable list of valid variants, for error messages.
    pub fn known_variants() -> String {
        Self::ALL
            .iter()
            .map(|v| format!("{}={}", v.index(), v.name()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Build the interpretation prompt for one report.
///
/// The report text is substituted last so placeholder-like text inside a
/// submission is never expanded.
pub fn build_interpretation_prompt(
    variant: InterpretationVariant,
    baseline: &HistoricalBaseline,
    raw_text: &str,
) -> String {
    INTERPRETATION_FRAME
        .replace("{hist_wait}", &format!("{:.0}", baseline.hist_avg_wait_mins))
        .replace("{hist_people}", &format!("{:.0}", baseline.hist_avg_people_in_line))
        .replace("{instructions}", variant.instructions())
        .replace("{raw_text}", raw_text.trim())
}
