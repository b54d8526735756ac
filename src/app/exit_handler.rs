//! Exit code logic for the brave-search process.
//!
//! Single responsibility: map a finished run to the process exit outcome.

use brave_search_core::RunOutcome;

use crate::ProcessExit;

/// Determines the process exit outcome of a run that reached the workers.
///
/// A fatal query error fails the run. An interrupt is a normal stop.
pub(crate) fn determine_exit_outcome(outcome: &RunOutcome) -> ProcessExit {
    if outcome.fatal.is_some() {
        ProcessExit::Failure
    } else {
        ProcessExit::Success
    }
}
