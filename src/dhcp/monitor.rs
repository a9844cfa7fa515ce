//! Process-wide DHCP child monitoring
//!
//! The kernel reports child termination with one `SIGCHLD` per process, not
//! per supervisor, so the identity of the watched child lives in statics.
//! Everything here is lock-free: the signal handler may interrupt a thread
//! that is in the middle of any other operation, including one holding a
//! regular lock.
//!
//! Protocol:
//! - `arm(pid)` publishes the pid, then enables monitoring.
//! - The handler only acts if the reported pid equals the published pid and
//!   it wins the `true -> false` exchange on the monitoring flag. It then
//!   records the pid in `EXITED_PID` for the supervisor to collect.
//! - `disarm()` clears the flag first, so a termination caused by `stop()`
//!   is never reported as unexpected.

use std::io;
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// Pid of the supervised child, 0 if none
static MONITORED_PID: AtomicI32 = AtomicI32::new(0);

/// True while an unexpected exit of `MONITORED_PID` should be reported
static MONITORING: AtomicBool = AtomicBool::new(false);

/// Pid whose unexpected exit has not been collected yet, 0 if none
static EXITED_PID: AtomicI32 = AtomicI32::new(0);

/// Serializes tests that touch the statics above
#[cfg(test)]
pub(crate) static TEST_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());

/// Start watching `pid`
pub(crate) fn arm(pid: i32) {
    EXITED_PID.store(0, Ordering::SeqCst);
    MONITORED_PID.store(pid, Ordering::SeqCst);
    MONITORING.store(true, Ordering::SeqCst);
}

/// Stop watching, returning whether monitoring was enabled
pub(crate) fn disarm() -> bool {
    let was_monitoring = MONITORING.swap(false, Ordering::SeqCst);
    MONITORED_PID.store(0, Ordering::SeqCst);
    was_monitoring
}

/// Record the termination of `pid`
///
/// Returns `true` if this was the unexpected exit of the watched child.
/// Stale or repeated notifications return `false` and change nothing.
/// Async-signal-safe.
pub(crate) fn on_child_exit(pid: i32) -> bool {
    if pid <= 0 || MONITORED_PID.load(Ordering::SeqCst) != pid {
        return false;
    }
    if MONITORING
        .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return false;
    }
    EXITED_PID.store(pid, Ordering::SeqCst);
    true
}

/// Collect a reported unexpected exit
pub(crate) fn take_exited() -> Option<i32> {
    let pid = EXITED_PID.swap(0, Ordering::SeqCst);
    (pid > 0).then_some(pid)
}

/// True while a child is being watched
pub fn is_monitoring() -> bool {
    MONITORING.load(Ordering::SeqCst)
}

/// Pid of the watched child
pub fn monitored_pid() -> Option<u32> {
    let pid = MONITORED_PID.load(Ordering::SeqCst);
    u32::try_from(pid).ok().filter(|&p| p > 0)
}

extern "C" fn sigchld_handler(
    _signo: libc::c_int,
    info: *mut libc::siginfo_t,
    _context: *mut libc::c_void,
) {
    if info.is_null() {
        return;
    }
    // SAFETY: the kernel passes a valid siginfo_t for SA_SIGINFO handlers
    let pid = unsafe { (*info).si_pid() };
    on_child_exit(pid);
}

/// Installed `SIGCHLD` handler; restores the previous disposition on drop
pub struct SigchldGuard {
    previous: libc::sigaction,
}

impl SigchldGuard {
    /// Install the monitoring handler, saving the current disposition
    ///
    /// # Errors
    ///
    /// Returns the OS error if `sigaction(2)` fails.
    pub fn install() -> io::Result<Self> {
        // SAFETY: zeroed sigaction is a valid "empty" value; both structs
        // outlive the call
        unsafe {
            let mut action: libc::sigaction = mem::zeroed();
            action.sa_sigaction = sigchld_handler as libc::sighandler_t;
            action.sa_flags = libc::SA_SIGINFO | libc::SA_RESTART | libc::SA_NOCLDSTOP;
            libc::sigemptyset(&mut action.sa_mask);

            let mut previous: libc::sigaction = mem::zeroed();
            if libc::sigaction(libc::SIGCHLD, &action, &mut previous) != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(Self { previous })
        }
    }
}

impl Drop for SigchldGuard {
    fn drop(&mut self) {
        // SAFETY: `previous` was filled by a successful sigaction call
        unsafe {
            libc::sigaction(libc::SIGCHLD, &self.previous, ptr::null_mut());
        }
    }
}

impl std::fmt::Debug for SigchldGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigchldGuard").finish_non_exhaustive()
    }
}
