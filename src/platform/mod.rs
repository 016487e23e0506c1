//! Platform-specific process signalling

use crate::core::ProcessError;

/// Force kill a process (SIGKILL)
pub fn kill_process(pid: u32) -> Result<(), ProcessError> {
    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let raw = i32::try_from(pid).map_err(|_| ProcessError::Unknown {
            pid,
            message: "PID out of range".to_string(),
        })?;
        match kill(Pid::from_raw(raw), Signal::SIGKILL) {
            Ok(()) => Ok(()),
            Err(Errno::ESRCH) => Err(ProcessError::NotFound { pid }),
            Err(Errno::EPERM) => Err(ProcessError::PermissionDenied { pid }),
            Err(errno) => Err(ProcessError::Unknown {
                pid,
                message: errno.desc().to_string(),
            }),
        }
    }
    #[cfg(not(unix))]
    {
        Err(ProcessError::Unknown {
            pid,
            message: "Unsupported platform".to_string(),
        })
    }
}

/// Symbolic name of a signal number, e.g. `9` is `SIGKILL`
pub fn signal_name(signal: i32) -> String {
    #[cfg(unix)]
    {
        match nix::sys::signal::Signal::try_from(signal) {
            Ok(sig) => sig.as_str().to_string(),
            Err(_) => format!("SIG{}", signal),
        }
    }
    #[cfg(not(unix))]
    {
        format!("SIG{}", signal)
    }
}
