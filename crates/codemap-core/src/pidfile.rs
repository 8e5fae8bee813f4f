//! PID file helpers shared by the daemon and the CLI.

use std::io;
use std::path::Path;

/// Read the PID recorded in `pid_file`, if any.
pub fn read_pid(pid_file: &Path) -> Option<u32> {
    std::fs::read_to_string(pid_file)
        .ok()?
        .trim()
        .parse::<u32>()
        .ok()
}

/// Check if a process is running by PID
pub fn is_process_running(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // kill(pid, 0) checks existence without delivering a signal
    unsafe { libc::kill(pid, 0) == 0 }
}

/// PID of the live daemon recorded in `pid_file`. A PID file naming a dead
/// process is removed.
pub fn running_daemon(pid_file: &Path) -> Option<u32> {
    let pid = read_pid(pid_file);
    match pid {
        Some(pid) if is_process_running(pid) => Some(pid),
        _ => {
            if pid_file.exists() {
                tracing::debug!(path = ?pid_file, "Removing stale PID file");
                let _ = std::fs::remove_file(pid_file);
            }
            None
        }
    }
}

/// Send `signal` to `pid`.
pub fn send_signal(pid: u32, signal: i32) -> io::Result<()> {
    let pid = i32::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "PID out of range"))?;
    if unsafe { libc::kill(pid, signal) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Ask `pid` to shut down.
pub fn terminate(pid: u32) -> io::Result<()> {
    send_signal(pid, libc::SIGTERM)
}

/// Kill `pid` outright.
pub fn kill(pid: u32) -> io::Result<()> {
    send_signal(pid, libc::SIGKILL)
}
