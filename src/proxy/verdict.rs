//! Interpretation of raw engine answers.

use crate::core::{EngineStatus, RawVerdict, ScanVerdict};

/// Maps the engine's raw answer to a verdict.
///
/// Only an explicit `OK` counts as clean. A signature match, an engine-side
/// scan error and any status this library does not recognise all block the
/// content. The reason is the engine's text when present, otherwise the
/// status itself.
pub fn interpret(raw: &RawVerdict) -> ScanVerdict {
    match &raw.status {
        EngineStatus::Ok => ScanVerdict::Clean,
        status => {
            let reason = raw
                .reason
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string());
            ScanVerdict::infected(reason)
        }
    }
}
