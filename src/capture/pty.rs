//! Pseudo-terminal allocation and shell spawning (Unix).

use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtySize {
    pub cols: u16,
    pub rows: u16,
}

impl Default for PtySize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

impl PtySize {
    fn to_winsize(self) -> libc::winsize {
        libc::winsize {
            ws_row: self.rows,
            ws_col: self.cols,
            ws_xpixel: 0,
            ws_ypixel: 0,
        }
    }
}

/// A freshly allocated pseudo-terminal pair.
pub struct Pty {
    master: File,
    slave: OwnedFd,
}

impl Pty {
    /// Allocate a pty pair with the given initial size.
    pub fn open(size: PtySize) -> io::Result<Self> {
        let mut master: libc::c_int = -1;
        let mut slave: libc::c_int = -1;
        let mut winsize = size.to_winsize();

        let rc = unsafe {
            libc::openpty(
                &mut master,
                &mut slave,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                &mut winsize as *mut libc::winsize,
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }

        // SAFETY: openpty succeeded, both descriptors are open and owned by us.
        let master = unsafe { OwnedFd::from_raw_fd(master) };
        let slave = unsafe { OwnedFd::from_raw_fd(slave) };
        set_cloexec(master.as_raw_fd())?;
        set_cloexec(slave.as_raw_fd())?;

        Ok(Self {
            master: File::from(master),
            slave,
        })
    }

    /// Spawn `shell` as a session leader with the slave side as its
    /// controlling terminal. Consumes the pair and returns the master.
    ///
    /// The parent's copy of the slave is closed here, so reads on the master
    /// fail with EIO (or return 0) once the shell and its children exit.
    pub fn spawn(self, shell: &str, args: &[String]) -> io::Result<(File, Child)> {
        let stdin = self.slave.try_clone()?;
        let stdout = self.slave.try_clone()?;
        let stderr = self.slave.try_clone()?;

        let mut command = Command::new(shell);
        command
            .args(args)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        // SAFETY: only async-signal-safe calls between fork and exec.
        unsafe {
            command.pre_exec(|| {
                if libc::setsid() == -1 {
                    return Err(io::Error::last_os_error());
                }
                if libc::ioctl(0, libc::TIOCSCTTY as _, 0) == -1 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let child = command.spawn()?;
        drop(self.slave);
        Ok((self.master, child))
    }
}

/// Apply a new window size to the pty. The kernel notifies the shell's
/// foreground process group with SIGWINCH.
pub fn resize(master: RawFd, size: PtySize) -> io::Result<()> {
    let winsize = size.to_winsize();
    let rc = unsafe { libc::ioctl(master, libc::TIOCSWINSZ as _, &winsize) };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Read the current window size of a terminal descriptor.
pub fn window_size(fd: RawFd) -> io::Result<PtySize> {
    let mut winsize = PtySize::default().to_winsize();
    let rc = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ as _, &mut winsize) };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(PtySize {
        cols: winsize.ws_col,
        rows: winsize.ws_row,
    })
}

/// Wait until `fd` is readable or `timeout` passes.
///
/// Hang-up and error conditions count as readable so the caller's next read
/// observes them. An interrupted poll reports "not ready".
pub fn poll_readable(fd: RawFd, timeout: Duration) -> io::Result<bool> {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let millis = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);
    let rc = unsafe { libc::poll(&mut pollfd, 1, millis) };
    if rc == -1 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }
    Ok(rc > 0 && pollfd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0)
}

fn set_cloexec(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags == -1 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
