use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Read one response line from `reader`, giving up once `timeout` has elapsed.
///
/// Bytes are consumed one at a time so nothing past the terminator is taken
/// from the port. Both `\r` and `\n` terminate a line and blank lines are
/// skipped, which absorbs the mixed `\r\n` / `\n\r` endings the controller
/// emits. Read timeouts from the port are retried until the deadline.
pub fn read_line_with_deadline(reader: &mut impl Read, timeout: Duration) -> Result<String> {
    let deadline = Instant::now() + timeout;
    let mut line: Vec<u8> = Vec::with_capacity(32);
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Err(HwError::Disconnected),
            Ok(_) => match byte[0] {
                b'\r' | b'\n' => {
                    if !line.is_empty() {
                        return Ok(String::from_utf8_lossy(&line).into_owned());
                    }
                }
                b => line.push(b),
            },
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {}
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(HwError::Io(e)),
        }
        if Instant::now() >= deadline {
            return Err(HwError::Timeout);
        }
    }
}
