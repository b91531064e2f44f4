//! Process-group cleanup for build commands.
//!
//! The toolchain runs behind `sh -c`, so killing the direct child only stops
//! the shell. Each build is started as the leader of its own process group and
//! the guard kills the whole group when the build is abandoned.

use std::io;

/// Kills the process group on drop unless disarmed
#[derive(Debug)]
pub(crate) struct ProcessGroupGuard {
    pgid: Option<u32>,
}

impl ProcessGroupGuard {
    /// `pgid` is the pid of a child spawned as its own group leader
    pub(crate) fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    /// The build finished normally; leave the group alone
    pub(crate) fn disarm(mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            log::debug!("Killing build process group {}", pgid);
            if let Err(e) = kill_process_group(pgid) {
                log::warn!("Failed to kill build process group {}: {}", pgid, e);
            }
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pgid: u32) -> io::Result<()> {
    let result = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) };
    if result == -1 {
        let err = io::Error::last_os_error();
        // ESRCH: the group already exited
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(err);
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) -> io::Result<()> {
    Ok(())
}
