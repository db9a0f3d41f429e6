//! Test and helper transports for plotter_core

/// A transport whose link is down: every write and read fails.
pub struct FailingTransport;

impl plotter_traits::Transport for FailingTransport {
    fn write_frame(&mut self, _frame: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "link down",
        )))
    }

    fn read_line(&mut self) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "link down",
        )))
    }
}

/// Accepts every frame and never answers; reads report a timeout.
#[derive(Default)]
pub struct SilentTransport {
    pub frames: Vec<String>,
}

impl plotter_traits::Transport for SilentTransport {
    fn write_frame(&mut self, frame: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.frames.push(frame.to_string());
        Ok(())
    }

    fn read_line(&mut self) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "read timed out",
        )))
    }
}
