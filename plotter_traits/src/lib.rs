pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// Line-oriented link to the plotter controller board.
///
/// Frames are complete ASCII command lines including the trailing `\r`;
/// `read_line` returns one response line with line terminators stripped.
pub trait Transport {
    fn write_frame(&mut self, frame: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn read_line(&mut self) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_frame(&mut self, frame: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).write_frame(frame)
    }

    fn read_line(&mut self) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read_line()
    }
}
