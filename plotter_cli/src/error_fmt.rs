//! Human-readable error descriptions and structured JSON error formatting.

use crate::cli::LAST_IDLE_MS;

/// Top-level tables accepted in the config file.
const CONFIG_SECTIONS: &str =
    "[motion], [pen], [stepper], [throttle], [timeouts], [serial], [optimize], [logging]";

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use plotter_core::error::{BuildError, PlotterError};

    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingTransport => {
                "What happened: No transport was provided to the motion controller.\nLikely causes: The serial link or simulator failed to initialize or was not wired into the builder.\nHow to fix: Ensure the transport is created successfully and passed via with_transport(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. Omitted keys fall back to built-in defaults."
            ),
        };
    }

    if let Some(pe) = err.downcast_ref::<PlotterError>() {
        return match pe {
            PlotterError::IdleTimeout { waited_ms } => format!(
                "What happened: The motors never reported idle (waited {waited_ms} ms, idle wait timed out).\nLikely causes: A stalled carriage, a queue longer than the timeout allows, or a firmware hang.\nHow to fix: Check the mechanics, then raise timeouts.idle_ms in the config if long moves are expected."
            ),
            PlotterError::Timeout => "What happened: The controller did not answer in time.\nLikely causes: Wrong serial port, board unpowered, or timeouts.serial_ms too low.\nHow to fix: Check the USB cable and power, pass --port explicitly, or raise timeouts.serial_ms.".to_string(),
            PlotterError::Transport(msg) => format!(
                "What happened: The link to the plotter failed ({msg}).\nLikely causes: USB cable unplugged, board reset, or the port is in use by another program.\nHow to fix: Reconnect the plotter, close other serial tools, then rerun."
            ),
            PlotterError::Device { command, response } => format!(
                "What happened: The controller rejected the {command} command ({response}).\nLikely causes: Steps per unit or speed too high for the board, or an unsupported firmware.\nHow to fix: Lower motion.max_velocity or stepper.steps_per_unit and check the firmware version."
            ),
            PlotterError::Protocol { command, response } => format!(
                "What happened: Unexpected reply to {command}: {response:?}.\nLikely causes: Another device on this port, or line noise.\nHow to fix: Pass the correct --port and rerun."
            ),
            PlotterError::Interrupted { index } => format!(
                "What happened: Plot interrupted before path {index}; the pen was raised.\nLikely causes: Ctrl-C was pressed.\nHow to fix: Run `plotter home` to park the carriage, then plot again."
            ),
            PlotterError::InvalidPath(msg) => format!(
                "What happened: The drawing contains an unusable path ({msg}).\nLikely causes: Empty paths or non-finite coordinates in the CSV.\nHow to fix: Fix the drawing file and rerun."
            ),
            PlotterError::Config(msg) => format!(
                "What happened: Invalid motion settings ({msg}).\nLikely causes: Zero or negative limits in the [motion] section.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = format!("{err:#}").to_ascii_lowercase();

    if lower.contains("no plotter found") {
        return "What happened: No plotter was found on any serial port.\nLikely causes: The board is unplugged or unpowered, or it enumerates with different USB ids.\nHow to fix: Plug the plotter in, or pass --port /dev/ttyACM0 (or the COM port on Windows).".to_string();
    }

    if lower.contains("serial error") {
        return format!(
            "What happened: Could not open the serial port.\nLikely causes: Wrong --port path or missing permissions (dialout group on Linux).\nHow to fix: Check the port name and permissions, then rerun. Original: {msg}"
        );
    }

    if lower.contains("invalid configuration") {
        return format!(
            "What happened: Configuration is invalid ({err:#}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
        );
    }

    if lower.contains("unknown field") || lower.contains("parsing config") {
        return format!(
            "What happened: The config file could not be parsed.\nLikely causes: A misspelled key or a value of the wrong type.\nHow to fix: Keep keys inside the {CONFIG_SECTIONS} tables and check their spelling. Original: {err:#}"
        );
    }

    // Drawing CSV header special-case
    if lower.contains("drawing csv must have headers") {
        return "Invalid headers in drawing CSV. Expected 'path,x,y'.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn plotter_error(err: &eyre::Report) -> Option<&plotter_core::PlotterError> {
    err.downcast_ref::<plotter_core::PlotterError>()
}

/// Stable exit codes: 3 for idle timeout, 4 for interrupt, 1 for anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    use plotter_core::PlotterError;
    match plotter_error(err) {
        Some(PlotterError::IdleTimeout { .. }) => 3,
        Some(PlotterError::Interrupted { .. }) => 4,
        _ => 1,
    }
}

pub fn reason_name(err: &eyre::Report) -> &'static str {
    use plotter_core::PlotterError::*;
    if err.downcast_ref::<plotter_core::BuildError>().is_some() {
        return "InvalidConfig";
    }
    match plotter_error(err) {
        Some(Transport(_)) => "Transport",
        Some(Timeout) => "Timeout",
        Some(Device { .. }) => "Device",
        Some(Protocol { .. }) => "Protocol",
        Some(IdleTimeout { .. }) => "IdleTimeout",
        Some(InvalidPath(_)) => "InvalidPath",
        Some(Config(_)) => "InvalidConfig",
        Some(Interrupted { .. }) => "Interrupted",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use plotter_core::PlotterError;
    use serde_json::json;

    let msg = humanize(err);
    let detail_obj = match plotter_error(err) {
        Some(PlotterError::IdleTimeout { waited_ms }) => Some(match LAST_IDLE_MS.get() {
            Some(idle_ms) => json!({ "waited_ms": waited_ms, "idle_ms": idle_ms }),
            None => json!({ "waited_ms": waited_ms }),
        }),
        Some(PlotterError::Interrupted { index }) => Some(json!({ "index": index })),
        Some(PlotterError::Device { command, response }) => {
            Some(json!({ "command": command, "response": response }))
        }
        _ => None,
    };

    let obj = if let Some(d) = detail_obj {
        json!({ "reason": reason_name(err), "details": d, "message": msg })
    } else {
        json!({ "reason": reason_name(err), "message": msg })
    };
    obj.to_string()
}
