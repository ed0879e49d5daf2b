//! `agentchain run`: execute a chain in-process, starting at one step.

use agentchain_core::workflow::{RunRecord, StepOutcome};
use agentchain_core::AppState;

use super::print_serialized;

pub async fn run(state: &AppState, start_step: &str, owner: &str, json: bool) -> Result<(), String> {
    tracing::info!("[Run] Starting chain at step {} for {}", start_step, owner);
    let record = state
        .engine
        .run(start_step, owner)
        .await
        .map_err(|e| format!("{} ({})", e, e.code()))?;

    if json {
        print_serialized(&record)?;
    } else {
        print_trace(&record);
    }

    match failed_step(&record) {
        Some((step_id, message)) => Err(format!("Chain failed at step {}: {}", step_id, message)),
        None => Ok(()),
    }
}

fn print_trace(record: &RunRecord) {
    println!("Workflow {} ({})", record.workflow_id, record.start_step_id);
    for (i, entry) in record.results.iter().enumerate() {
        let kind = entry.kind.as_deref().unwrap_or("?");
        match &entry.outcome {
            StepOutcome::Result(value) => {
                println!("  {}. {} [{}] ok", i + 1, entry.step_id, kind);
                let rendered = serde_json::to_string(value).unwrap_or_default();
                println!("     {}", preview(&rendered, 160));
            }
            StepOutcome::Error(err) => {
                println!("  {}. {} [{}] {}: {}", i + 1, entry.step_id, kind, err.code, err.message);
            }
        }
    }
    println!("{} step(s), {:?}", record.results.len(), record.status);
}

/// The last entry, if the run ended on an error.
pub fn failed_step(record: &RunRecord) -> Option<(&str, &str)> {
    if record.success {
        return None;
    }
    record
        .results
        .last()
        .and_then(|entry| entry.error().map(|err| (entry.step_id.as_str(), err.message.as_str())))
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_cuts_on_char_boundary() {
        assert_eq!(preview("héllo", 10), "héllo");
        assert_eq!(preview("héllo", 2), "hé…");
    }
}
