//! Process lifecycle management for spawned playbook runs
//!
//! `ansible-playbook` is started in its own process group so the whole tree
//! it forks (ssh, vagrant, python workers) can be signalled at once. PIDs are
//! tracked in a global registry; on SIGINT, SIGTERM or SIGHUP every tracked
//! group gets SIGTERM, then SIGKILL after a grace period.
//!
//! While a playbook runs its group also holds the terminal foreground (see
//! [`TerminalForeground`]), so prompts can read stdin and Ctrl-C reaches
//! the playbook rather than oct.
//!
//! Exiting from the signal handler skips destructors, so configuration is
//! not saved when oct is interrupted.

use nix::libc;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::unistd::{self, Pid};
use std::collections::HashSet;
use std::io::IsTerminal;
use std::os::fd::AsFd;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

static CHILD_REGISTRY: OnceLock<Arc<Mutex<ChildRegistry>>> = OnceLock::new();

/// Registry tracking running playbook processes
#[derive(Debug, Default)]
pub struct ChildRegistry {
    pids: HashSet<u32>,
    /// Set once termination starts so it only happens once
    cleanup_initiated: bool,
}

impl ChildRegistry {
    /// Get or create the global child registry
    pub fn global() -> Arc<Mutex<ChildRegistry>> {
        CHILD_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(ChildRegistry::default())))
            .clone()
    }

    pub fn register(&mut self, pid: u32) {
        self.pids.insert(pid);
        debug!("Registered child process PID {}", pid);
    }

    pub fn unregister(&mut self, pid: u32) {
        self.pids.remove(&pid);
        debug!("Unregistered child process PID {}", pid);
    }

    pub fn count(&self) -> usize {
        self.pids.len()
    }

    /// Terminate all tracked process groups.
    /// Sends SIGTERM first, waits up to `grace_period`, then SIGKILL.
    pub fn terminate_all(&mut self, grace_period: Duration) {
        if self.cleanup_initiated {
            return;
        }
        self.cleanup_initiated = true;

        if self.pids.is_empty() {
            return;
        }

        info!("Terminating {} playbook process(es)...", self.pids.len());

        let pids: Vec<u32> = self.pids.iter().copied().collect();
        for &pid in &pids {
            if let Err(e) = send_signal_to_group(pid, Signal::SIGTERM) {
                warn!("Failed to send SIGTERM to process group {}: {}", pid, e);
                let _ = send_signal(pid, Signal::SIGTERM);
            }
        }

        let start = Instant::now();
        while start.elapsed() < grace_period {
            if !pids.iter().any(|&pid| is_process_alive(pid)) {
                info!("All playbook processes terminated gracefully");
                self.pids.clear();
                return;
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        for &pid in &pids {
            if is_process_alive(pid) {
                warn!("Process group {} did not terminate, sending SIGKILL", pid);
                if send_signal_to_group(pid, Signal::SIGKILL).is_err() {
                    let _ = send_signal(pid, Signal::SIGKILL);
                }
            }
        }

        self.pids.clear();
    }
}

fn send_signal(pid: u32, signal: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(pid as i32), signal)
}

/// Negative PID addresses the whole process group
fn send_signal_to_group(pgid: u32, signal: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(-(pgid as i32)), signal)
}

/// Alive means it exists and is not a zombie
fn is_process_alive(pid: u32) -> bool {
    if signal::kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }

    // Field 3 of /proc/pid/stat is the state
    if let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        let fields: Vec<&str> = stat.split_whitespace().collect();
        if fields.len() > 2 {
            return !matches!(fields[2], "Z" | "X");
        }
    }

    true
}

/// Install handlers for SIGINT, SIGTERM and SIGHUP.
/// Call this once at program start.
pub fn init_signal_handlers() -> Result<(), std::io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;
    use std::thread;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    thread::spawn(move || {
        for sig in signals.forever() {
            info!("Received signal {}, stopping playbook runs...", sig);

            if let Ok(mut registry) = ChildRegistry::global().lock() {
                registry.terminate_all(Duration::from_secs(3));
            }

            std::process::exit(128 + sig);
        }
    });

    Ok(())
}

/// Extension trait for std::process::Command to set up process groups
pub trait CommandProcessGroup {
    /// Run the command as leader of a new process group that dies with us
    fn in_new_process_group(&mut self) -> &mut Self;
}

impl CommandProcessGroup for std::process::Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        unsafe {
            self.pre_exec(|| {
                nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0))
                    .map_err(std::io::Error::other)?;

                if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) == -1 {
                    return Err(std::io::Error::last_os_error());
                }

                Ok(())
            });
        }
        self
    }
}

/// Gives a child's process group the terminal foreground, and takes it back
/// on drop.
///
/// A background group that reads the terminal is stopped with SIGTTIN, so a
/// playbook in its own group could never answer a prompt without this.
pub struct TerminalForeground<F: AsFd> {
    terminal: F,
    previous: Pid,
}

impl<F: AsFd + IsTerminal> TerminalForeground<F> {
    /// Hand `terminal` to process group `pgid`.
    ///
    /// Returns `None` unless `terminal` is a terminal whose foreground group
    /// is ours.
    pub fn acquire(terminal: F, pgid: u32) -> Option<Self> {
        if !terminal.is_terminal() {
            return None;
        }
        let previous = unistd::tcgetpgrp(&terminal).ok()?;
        if previous != unistd::getpgrp() {
            debug!("Not the foreground process group, leaving the terminal alone");
            return None;
        }

        match unistd::tcsetpgrp(&terminal, Pid::from_raw(pgid as i32)) {
            Ok(()) => Some(Self { terminal, previous }),
            Err(e) => {
                warn!("Failed to hand the terminal to process group {}: {}", pgid, e);
                None
            }
        }
    }
}

impl<F: AsFd> Drop for TerminalForeground<F> {
    fn drop(&mut self) {
        // We are a background group now; tcsetpgrp would raise SIGTTOU
        let old = unsafe { signal::signal(Signal::SIGTTOU, SigHandler::SigIgn) };

        if let Err(e) = unistd::tcsetpgrp(&self.terminal, self.previous) {
            warn!("Failed to take back the terminal: {}", e);
        }

        if let Ok(old) = old {
            unsafe {
                let _ = signal::signal(Signal::SIGTTOU, old);
            }
        }
    }
}
