//! Pen and controller state.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PenState {
    Up,
    Down,
}

/// `Idle` until the pen position is first known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerState {
    #[default]
    Idle,
    PenUp,
    PenDown,
}

impl ControllerState {
    pub fn pen(self) -> Option<PenState> {
        match self {
            ControllerState::Idle => None,
            ControllerState::PenUp => Some(PenState::Up),
            ControllerState::PenDown => Some(PenState::Down),
        }
    }
}

impl From<PenState> for ControllerState {
    fn from(p: PenState) -> Self {
        match p {
            PenState::Up => ControllerState::PenUp,
            PenState::Down => ControllerState::PenDown,
        }
    }
}
