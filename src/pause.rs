//! Pause classifier (§4.6).
//!
//! Grounded on `trust_runtime::debug::control::DebugState`'s stop-reason
//! classification (`DebugStopReason`, the should-pause-or-not branch in
//! `on_statement_inner`), restructured as the decision table below. This
//! module holds only the *decision*: the manager gathers every input
//! (walking its breakpoint maps, running `shouldPauseAt`, waiting on the
//! source-map handler) and hands them here as a flat [`PauseInputs`], which
//! keeps the table itself a pure function and directly testable.

use std::time::Duration;

use crate::breakpoint::Breakpoint;

/// What the classifier decided to do with one CDP pause event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PauseVerdict {
    Surface {
        reason: String,
        hit_breakpoint_ids: Vec<u32>,
    },
    ResumeSilently,
    SyntheticStep,
}

/// Every input the decision table in §4.6 consults, precomputed by the
/// manager (including the bounded wait for the source-map handler, since
/// that wait must happen before the first row can be evaluated).
#[derive(Debug, Clone, Default)]
pub struct PauseInputs {
    pub reason: String,
    pub hit_breakpoint_dap_ids: Vec<u32>,
    pub first_frame_matches_entry: bool,
    pub any_hit_is_source_map_breakpoint: bool,
    pub handler_ui_location_matches_pause: bool,
    pub inspect_brk: bool,
    pub mid_step_in: bool,
    pub should_pause_at_continue_by_default_true: bool,
    pub should_pause_at_continue_by_default_false: bool,
    pub exception_pause_should_surface: bool,
    pub expected_pause_reason: Option<String>,
}

/// The decision table itself (first matching row wins).
#[must_use]
pub fn classify(inputs: &PauseInputs) -> PauseVerdict {
    let is_instrumentation_like =
        inputs.reason == "instrumentation" || inputs.first_frame_matches_entry || inputs.any_hit_is_source_map_breakpoint;

    if is_instrumentation_like {
        if inputs.handler_ui_location_matches_pause {
            return surface("breakpoint", &inputs.hit_breakpoint_dap_ids);
        }
        if inputs.inspect_brk {
            return surface("entry", &[]);
        }
        if inputs.should_pause_at_continue_by_default_true {
            return surface("breakpoint", &inputs.hit_breakpoint_dap_ids);
        }
        if inputs.mid_step_in {
            return PauseVerdict::SyntheticStep;
        }
        return PauseVerdict::ResumeSilently;
    }

    if inputs.reason == "exception" || inputs.reason == "promiseRejection" {
        return if inputs.exception_pause_should_surface {
            surface(&inputs.reason, &[])
        } else {
            PauseVerdict::ResumeSilently
        };
    }

    if !inputs.hit_breakpoint_dap_ids.is_empty() {
        return if inputs.should_pause_at_continue_by_default_false {
            surface("breakpoint", &inputs.hit_breakpoint_dap_ids)
        } else {
            PauseVerdict::ResumeSilently
        };
    }

    if let Some(reason) = &inputs.expected_pause_reason {
        return surface(reason, &[]);
    }

    surface("pause", &[])
}

fn surface(reason: &str, hit_breakpoint_ids: &[u32]) -> PauseVerdict {
    PauseVerdict::Surface {
        reason: reason.to_string(),
        hit_breakpoint_ids: hit_breakpoint_ids.to_vec(),
    }
}

/// Waits up to `timeout` for every hit breakpoint's deferred "set
/// completed" signal, then yields once so an in-flight step/continue
/// response can land first, before the caller emits the `stopped` event.
pub async fn settle_before_stopped(hit: &[&Breakpoint], timeout: Duration) {
    let waits = hit.iter().map(|bp| bp.wait_set_completed());
    let _ = tokio::time::timeout(timeout, futures::future::join_all(waits)).await;
    tokio::task::yield_now().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instrumentation_pause_with_matching_handler_location_surfaces_as_breakpoint() {
        let inputs = PauseInputs {
            reason: "instrumentation".to_string(),
            handler_ui_location_matches_pause: true,
            hit_breakpoint_dap_ids: vec![1],
            ..Default::default()
        };
        assert_eq!(
            classify(&inputs),
            PauseVerdict::Surface {
                reason: "breakpoint".to_string(),
                hit_breakpoint_ids: vec![1],
            }
        );
    }

    #[test]
    fn instrumentation_pause_resumes_when_nothing_says_pause() {
        let inputs = PauseInputs {
            reason: "instrumentation".to_string(),
            ..Default::default()
        };
        assert_eq!(classify(&inputs), PauseVerdict::ResumeSilently);
    }

    #[test]
    fn instrumentation_pause_mid_step_in_emits_synthetic_step() {
        let inputs = PauseInputs {
            reason: "instrumentation".to_string(),
            mid_step_in: true,
            ..Default::default()
        };
        assert_eq!(classify(&inputs), PauseVerdict::SyntheticStep);
    }

    #[test]
    fn exception_consults_exception_pause_service() {
        let surfacing = PauseInputs {
            reason: "exception".to_string(),
            exception_pause_should_surface: true,
            ..Default::default()
        };
        assert_eq!(
            classify(&surfacing),
            PauseVerdict::Surface {
                reason: "exception".to_string(),
                hit_breakpoint_ids: vec![],
            }
        );

        let resuming = PauseInputs {
            reason: "exception".to_string(),
            ..Default::default()
        };
        assert_eq!(classify(&resuming), PauseVerdict::ResumeSilently);
    }

    #[test]
    fn hit_breakpoints_defer_to_should_pause_at() {
        let pausing = PauseInputs {
            reason: "other".to_string(),
            hit_breakpoint_dap_ids: vec![7],
            should_pause_at_continue_by_default_false: true,
            ..Default::default()
        };
        assert_eq!(
            classify(&pausing),
            PauseVerdict::Surface {
                reason: "breakpoint".to_string(),
                hit_breakpoint_ids: vec![7],
            }
        );
    }

    #[test]
    fn expected_pause_reason_wins_over_default() {
        let inputs = PauseInputs {
            reason: "other".to_string(),
            expected_pause_reason: Some("step".to_string()),
            ..Default::default()
        };
        assert_eq!(
            classify(&inputs),
            PauseVerdict::Surface {
                reason: "step".to_string(),
                hit_breakpoint_ids: vec![],
            }
        );
    }

    #[test]
    fn default_case_is_debugger_statement_pause() {
        let inputs = PauseInputs {
            reason: "other".to_string(),
            ..Default::default()
        };
        assert_eq!(
            classify(&inputs),
            PauseVerdict::Surface {
                reason: "pause".to_string(),
                hit_breakpoint_ids: vec![],
            }
        );
    }
}
