//! SSI daemon lifecycle.
//!
//! All ACSLS clients on one host share a single SSI process as their
//! transport endpoint. The daemon is kept as a supervised child: the
//! held handle answers "is it already running" directly, so starting
//! is idempotent without scanning the process table by name.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use rmc_api_types::StkHostInfo;

use crate::{Error, Result};

// environment consumed by the SSI and the vendor client library
const ACS_HOSTNAME_ENV: &str = "CSI_HOSTNAME";
const ACS_PORTNUM_ENV: &str = "ACSAPI_SSI_SOCKET";
const ACS_SSIHOST_ENV: &str = "SSI_HOSTNAME";
const ACS_SSI_INET_PORT_ENV: &str = "SSI_INET_PORT";
const ACS_CSI_HOSTPORT_ENV: &str = "CSI_HOSTPORT";
const ACS_ACCESS_ENV: &str = "ACSAPI_USER_ID";

const SSI_SPAWN_ATTEMPTS: u32 = 5;
const SSI_EXIT_POLLS: u32 = 5;

/// Export the ACSLS connection parameters into the process
/// environment, where the vendor client library picks them up.
pub fn set_acs_env(host_info: &StkHostInfo) {
    std::env::set_var(ACS_HOSTNAME_ENV, &host_info.hostname);
    std::env::set_var(ACS_PORTNUM_ENV, &host_info.portnum);
    if !host_info.access.is_empty() {
        std::env::set_var(ACS_ACCESS_ENV, &host_info.access);
    }
    if !host_info.ssi_host.is_empty() {
        std::env::set_var(ACS_SSIHOST_ENV, &host_info.ssi_host);
    }
    if !host_info.ssi_inet_portnum.is_empty() {
        std::env::set_var(ACS_SSI_INET_PORT_ENV, &host_info.ssi_inet_portnum);
    }
    if !host_info.csi_hostport.is_empty() {
        std::env::set_var(ACS_CSI_HOSTPORT_ENV, &host_info.csi_hostport);
    }
}

/// Supervisor for the SSI helper process.
///
/// Changing the target host requires stopping and restarting the
/// daemon - the connection parameters are read-only once it runs.
pub struct SsiDaemon {
    command: PathBuf,
    host_info: StkHostInfo,
    child: Option<Child>,
    spawn_retry_delay: Duration,
    exit_poll_delay: Duration,
}

impl SsiDaemon {
    pub fn new<P: Into<PathBuf>>(command: P, host_info: StkHostInfo) -> Self {
        Self {
            command: command.into(),
            host_info,
            child: None,
            spawn_retry_delay: Duration::from_secs(5),
            exit_poll_delay: Duration::from_secs(1),
        }
    }

    /// True while the supervised child is alive.
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Start the SSI helper. A no-op success when it is already
    /// running.
    ///
    /// The spawn is retried a bounded number of times; afterwards the
    /// child's exit status is polled (non blocking, bounded) to catch
    /// an immediate launch failure - the helper script forks the long
    /// running daemon and exits 0 itself.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            log::info!("ssi is already running");
            return Ok(());
        }

        let mut attempt = 0;
        let mut child = loop {
            let spawned = Command::new(&self.command)
                .env(ACS_HOSTNAME_ENV, &self.host_info.hostname)
                .env(ACS_PORTNUM_ENV, &self.host_info.portnum)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn();

            match spawned {
                Ok(child) => break child,
                Err(err) => {
                    attempt += 1;
                    if attempt >= SSI_SPAWN_ATTEMPTS {
                        return Err(Error::DaemonStartFailed(format!(
                            "{:?} - {}",
                            self.command, err
                        )));
                    }
                    log::error!("spawning {:?} failed ({}), retrying", self.command, err);
                    std::thread::sleep(self.spawn_retry_delay);
                }
            }
        };

        for _ in 0..SSI_EXIT_POLLS {
            match child.try_wait() {
                Ok(Some(status)) => {
                    if status.success() {
                        // helper handed off to the daemon and exited
                        break;
                    }
                    return Err(Error::DaemonStartFailed(format!(
                        "{:?} exited with {}",
                        self.command, status
                    )));
                }
                Ok(None) => std::thread::sleep(self.exit_poll_delay),
                Err(err) => {
                    return Err(Error::DaemonStartFailed(format!(
                        "cannot poll {:?} - {}",
                        self.command, err
                    )))
                }
            }
        }

        set_acs_env(&self.host_info);
        self.child = Some(child);

        Ok(())
    }

    /// Structured shutdown of the supervised child.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            if matches!(child.try_wait(), Ok(None)) {
                child.kill().map_err(|err| {
                    Error::DaemonStartFailed(format!("cannot stop ssi - {}", err))
                })?;
            }
            let _ = child.wait();
        }
        Ok(())
    }
}

impl Drop for SsiDaemon {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn host_info() -> StkHostInfo {
        StkHostInfo {
            hostname: "acsls1".to_string(),
            portnum: "50004".to_string(),
            ..Default::default()
        }
    }

    fn fast(mut daemon: SsiDaemon) -> SsiDaemon {
        daemon.spawn_retry_delay = Duration::from_millis(1);
        daemon.exit_poll_delay = Duration::from_millis(1);
        daemon
    }

    #[test]
    fn successful_helper_exit_is_ok() -> Result<()> {
        let mut daemon = fast(SsiDaemon::new("/bin/true", host_info()));
        daemon.start()?;
        Ok(())
    }

    #[test]
    fn nonzero_helper_exit_fails() {
        let mut daemon = fast(SsiDaemon::new("/bin/false", host_info()));
        assert!(matches!(
            daemon.start(),
            Err(Error::DaemonStartFailed(_))
        ));
    }

    #[test]
    fn unlaunchable_helper_gives_up_after_bounded_retries() {
        let mut daemon = fast(SsiDaemon::new("/nonexistent/ssi.sh", host_info()));
        assert!(matches!(
            daemon.start(),
            Err(Error::DaemonStartFailed(_))
        ));
    }

    #[test]
    fn start_is_idempotent_while_running() -> Result<()> {
        // sleep stands in for the long running daemon
        let mut daemon = fast(SsiDaemon::new("/bin/sleep", host_info()));

        let child = Command::new("/bin/sleep")
            .arg("60")
            .stdin(Stdio::null())
            .spawn()
            .unwrap();
        daemon.child = Some(child);

        assert!(daemon.is_running());
        daemon.start()?; // no-op success
        assert!(daemon.is_running());

        daemon.stop()?;
        assert!(!daemon.is_running());
        Ok(())
    }
}
