use core::fmt::{Display, Formatter};

use log::{error, info};

/// One step of the bring-up, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    BusInit,
    Scan,
    ExpanderInit,
    PanelInit,
    DisplayPortInit,
    TouchInit,
    Done,
}

/// The fixed order. Only `run` knows it; components never call each
/// other.
pub const SEQUENCE: [Stage; 6] = [
    Stage::BusInit,
    Stage::Scan,
    Stage::ExpanderInit,
    Stage::PanelInit,
    Stage::DisplayPortInit,
    Stage::TouchInit,
];

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::BusInit => "bus-init",
            Stage::Scan => "scan",
            Stage::ExpanderInit => "expander-init",
            Stage::PanelInit => "panel-init",
            Stage::DisplayPortInit => "display-port-init",
            Stage::TouchInit => "touch-init",
            Stage::Done => "done",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of the sequence: the stage that broke and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageError<E> {
    pub stage: Stage,
    pub cause: E,
}

impl<E> Display for StageError<E>
where
    E: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "stage {} failed: {}", self.stage, self.cause)
    }
}

/// The board-specific side of the bring-up. Each method performs one
/// stage and stores whatever later stages or the runtime need.
pub trait BoardSequence {
    type Error: Display;

    fn bus_init(&mut self) -> Result<(), Self::Error>;
    fn scan(&mut self) -> Result<(), Self::Error>;
    fn expander_init(&mut self) -> Result<(), Self::Error>;
    fn panel_init(&mut self) -> Result<(), Self::Error>;
    fn display_port_init(&mut self) -> Result<(), Self::Error>;
    fn touch_init(&mut self) -> Result<(), Self::Error>;
}

/// Run the stages in order, stopping at the first failure.
///
/// Each stage runs exactly once; there is no retry at any level. A retry
/// is a fresh `run` after the bus has been torn down, never a resume
/// mid-sequence (a resume would re-drive lines that already toggled).
pub fn run<S>(board: &mut S) -> Result<(), StageError<S::Error>>
where
    S: BoardSequence,
{
    for stage in SEQUENCE {
        info!("bring-up: {stage}");
        let outcome = match stage {
            Stage::BusInit => board.bus_init(),
            Stage::Scan => board.scan(),
            Stage::ExpanderInit => board.expander_init(),
            Stage::PanelInit => board.panel_init(),
            Stage::DisplayPortInit => board.display_port_init(),
            Stage::TouchInit => board.touch_init(),
            Stage::Done => Ok(()),
        };
        if let Err(cause) = outcome {
            error!("bring-up: stage {stage} failed: {cause}");
            return Err(StageError { stage, cause });
        }
    }
    info!("bring-up: {}", Stage::Done);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pure call-recording fake; fails at one chosen stage.
    struct RecordingSequence {
        calls: Vec<Stage>,
        fail_at: Option<Stage>,
    }

    impl RecordingSequence {
        fn new(fail_at: Option<Stage>) -> Self {
            Self {
                calls: Vec::new(),
                fail_at,
            }
        }

        fn step(&mut self, stage: Stage) -> Result<(), &'static str> {
            self.calls.push(stage);
            if self.fail_at == Some(stage) {
                Err("injected failure")
            } else {
                Ok(())
            }
        }
    }

    impl BoardSequence for RecordingSequence {
        type Error = &'static str;

        fn bus_init(&mut self) -> Result<(), Self::Error> {
            self.step(Stage::BusInit)
        }

        fn scan(&mut self) -> Result<(), Self::Error> {
            self.step(Stage::Scan)
        }

        fn expander_init(&mut self) -> Result<(), Self::Error> {
            self.step(Stage::ExpanderInit)
        }

        fn panel_init(&mut self) -> Result<(), Self::Error> {
            self.step(Stage::PanelInit)
        }

        fn display_port_init(&mut self) -> Result<(), Self::Error> {
            self.step(Stage::DisplayPortInit)
        }

        fn touch_init(&mut self) -> Result<(), Self::Error> {
            self.step(Stage::TouchInit)
        }
    }

    #[test]
    fn all_stages_run_in_order_on_success() {
        let mut board = RecordingSequence::new(None);
        assert!(run(&mut board).is_ok());
        assert_eq!(board.calls, SEQUENCE.to_vec());
    }

    #[test]
    fn failure_stops_every_later_stage() {
        for (k, &failing) in SEQUENCE.iter().enumerate() {
            let mut board = RecordingSequence::new(Some(failing));
            let err = run(&mut board).unwrap_err();
            assert_eq!(err.stage, failing);
            assert_eq!(err.cause, "injected failure");
            // stages 0..=k ran, stages k+1.. were never invoked
            assert_eq!(board.calls, SEQUENCE[..=k].to_vec());
        }
    }
}
