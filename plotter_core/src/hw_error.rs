//! Maps `Box<dyn Error>` from the transport boundary to typed `PlotterError`.
//!
//! `plotter_traits::Transport` uses `Box<dyn Error + Send + Sync>`; this module
//! converts those to our typed error enum, with an optional feature-gated path
//! for `plotter_hardware::HwError` downcasting.

use crate::error::PlotterError;

/// Map a trait-boundary error to a typed `PlotterError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> PlotterError {
    #[cfg(feature = "hardware-errors")]
    {
        use plotter_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout => PlotterError::Timeout,
                other => PlotterError::Transport(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") || s.to_lowercase().contains("timed out") {
        PlotterError::Timeout
    } else {
        PlotterError::Transport(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_fallback_detects_timeouts() {
        let e = std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out");
        assert_eq!(map_hw_error(&e), PlotterError::Timeout);
        let e = std::io::Error::other("broken pipe");
        assert!(matches!(map_hw_error(&e), PlotterError::Transport(_)));
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn downcasts_hw_errors() {
        use plotter_hardware::error::HwError;
        assert_eq!(map_hw_error(&HwError::Timeout), PlotterError::Timeout);
        assert_eq!(
            map_hw_error(&HwError::Disconnected),
            PlotterError::Transport("device disconnected".into())
        );
    }
}
