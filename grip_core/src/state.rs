//! Control phases and the pure transition function.
//!
//! A calibration trigger re-enters Calibration from any phase, discarding
//! the model and filter state. Sweep completion advances Calibration to
//! Motoring. No other transitions exist; there is no fault phase.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Standby,
    Calibration,
    Motoring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    Trigger,
    SweepComplete,
}

pub fn transition(phase: Phase, event: PhaseEvent) -> Phase {
    match (phase, event) {
        (_, PhaseEvent::Trigger) => Phase::Calibration,
        (Phase::Calibration, PhaseEvent::SweepComplete) => Phase::Motoring,
        // Completion is meaningless outside Calibration; stay put.
        (p, PhaseEvent::SweepComplete) => p,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Phase::Standby, PhaseEvent::Trigger, Phase::Calibration)]
    #[case(Phase::Calibration, PhaseEvent::Trigger, Phase::Calibration)]
    #[case(Phase::Motoring, PhaseEvent::Trigger, Phase::Calibration)]
    #[case(Phase::Standby, PhaseEvent::SweepComplete, Phase::Standby)]
    #[case(Phase::Calibration, PhaseEvent::SweepComplete, Phase::Motoring)]
    #[case(Phase::Motoring, PhaseEvent::SweepComplete, Phase::Motoring)]
    fn transition_table(#[case] from: Phase, #[case] ev: PhaseEvent, #[case] to: Phase) {
        assert_eq!(transition(from, ev), to);
    }
}
