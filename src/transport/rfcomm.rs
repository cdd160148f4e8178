//! # Bluetooth RFCOMM Transport
//!
//! Communication with Peripage printers over Bluetooth Serial Port Profile
//! (SPP) via a bound RFCOMM device node.
//!
//! ## Bluetooth Setup (Linux)
//!
//! Before using this transport, the printer must be paired and bound to an
//! RFCOMM device:
//!
//! ```bash
//! # 1. Find the printer's Bluetooth address
//! $ bluetoothctl
//! [bluetooth]# scan on
//! # Look for "PeriPage+XXXX"
//! # Note the address, e.g., 00:15:83:XX:XX:XX
//!
//! # 2. Pair with the printer
//! [bluetooth]# pair 00:15:83:XX:XX:XX
//!
//! # 3. Bind to RFCOMM device
//! $ sudo rfcomm bind 0 00:15:83:XX:XX:XX
//! # This creates /dev/rfcomm0
//! ```
//!
//! [`setup_rfcomm`] automates steps 2–3; [`find_rfcomm_for_mac`] locates an
//! existing binding.
//!
//! ## TTY Configuration
//!
//! The RFCOMM device is opened read+write in raw mode so binary data passes
//! unmodified in both directions:
//!
//! - **No input processing**: IGNBRK, BRKINT, PARMRK, ISTRIP, INLCR, IGNCR,
//!   ICRNL disabled
//! - **No flow control**: IXON/IXOFF/IXANY disabled — 0x11 (XON) and 0x13
//!   (XOFF) both occur in raster payloads
//! - **No output processing**: OPOST disabled (no CR/LF translation)
//! - **8-bit characters**: CS8, no parity
//! - **No echo, non-canonical**: ECHO, ECHONL, ICANON, ISIG, IEXTEN disabled
//!
//! Reads are bounded with `VMIN = 0` / `VTIME = timeout`: a query that the
//! device does not answer within the session timeout returns zero bytes,
//! which this transport reports as a timeout error.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::PapelitoError;

use super::{Connector, Transport};

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Default RFCOMM device path
pub const DEFAULT_DEVICE: &str = "/dev/rfcomm0";

/// # RFCOMM Printer Transport
///
/// One open RFCOMM link. Produced by [`RfcommConnector`]; most callers go
/// through [`crate::transport::Session`] instead of using this directly.
pub struct RfcommTransport {
    file: File,
    path: PathBuf,
    timeout: Duration,
}

impl RfcommTransport {
    /// Open the RFCOMM device in raw mode with the given receive timeout.
    ///
    /// ## Errors
    ///
    /// Returns a transport error if the device doesn't exist, permission is
    /// denied (dialout group or root may be required), or TTY configuration
    /// fails.
    pub fn open<P: AsRef<Path>>(device: P, timeout: Duration) -> Result<Self, PapelitoError> {
        let path = device.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| {
                PapelitoError::Transport(format!("Failed to open {}: {}", path.display(), e))
            })?;

        #[cfg(unix)]
        configure_tty_raw(file.as_raw_fd(), timeout)?;

        debug!(device = %path.display(), "opened rfcomm transport");
        Ok(Self {
            file,
            path,
            timeout,
        })
    }
}

impl Transport for RfcommTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), PapelitoError> {
        self.file
            .write_all(data)
            .map_err(|e| PapelitoError::Transport(format!("Write failed: {}", e)))?;
        self.file
            .flush()
            .map_err(|e| PapelitoError::Transport(format!("Flush failed: {}", e)))
    }

    fn recv(&mut self, max_len: usize) -> Result<Vec<u8>, PapelitoError> {
        let mut buf = vec![0u8; max_len];
        let n = self
            .file
            .read(&mut buf)
            .map_err(|e| PapelitoError::Transport(format!("Read failed: {}", e)))?;
        if n == 0 {
            // VTIME expired without a single byte
            return Err(PapelitoError::Transport(format!(
                "No response within {:?}",
                self.timeout
            )));
        }
        buf.truncate(n);
        Ok(buf)
    }

    fn is_live(&self) -> bool {
        // Advisory peer probe: the descriptor must still be valid and the
        // binding must still exist. The device can still be asleep or out
        // of range even when both hold.
        #[cfg(unix)]
        {
            let fd_ok = unsafe { libc::fcntl(self.file.as_raw_fd(), libc::F_GETFD) } != -1;
            fd_ok && self.path.exists()
        }
        #[cfg(not(unix))]
        {
            self.path.exists()
        }
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
        #[cfg(unix)]
        if let Err(e) = configure_tty_raw(self.file.as_raw_fd(), timeout) {
            debug!("failed to update tty timeout: {}", e);
        }
    }
}

/// # RFCOMM Connector
///
/// Re-dials a fixed RFCOMM device node for every
/// [`crate::transport::Session`] (re)connect.
pub struct RfcommConnector {
    device: PathBuf,
}

impl RfcommConnector {
    /// Connector for a specific device node (e.g. `/dev/rfcomm0`).
    pub fn new<P: AsRef<Path>>(device: P) -> Self {
        Self {
            device: device.as_ref().to_path_buf(),
        }
    }

    /// Connector for [`DEFAULT_DEVICE`].
    pub fn default_device() -> Self {
        Self::new(DEFAULT_DEVICE)
    }

    /// Connector for a printer MAC address, using an existing binding when
    /// present and binding a new RFCOMM device otherwise.
    pub fn for_mac(mac: &str) -> Result<Self, PapelitoError> {
        if !is_valid_mac(mac) {
            return Err(PapelitoError::Protocol(format!(
                "Invalid Bluetooth MAC address: {:?}",
                mac
            )));
        }
        let device = match find_rfcomm_for_mac(mac)? {
            Some(device) => device,
            None => setup_rfcomm(mac, 0)?,
        };
        Ok(Self::new(device))
    }
}

impl Connector for RfcommConnector {
    fn open(&mut self, timeout: Duration) -> Result<Box<dyn Transport>, PapelitoError> {
        Ok(Box::new(RfcommTransport::open(&self.device, timeout)?))
    }
}

/// Configure a file descriptor for raw TTY mode with a bounded read.
///
/// `VMIN = 0`, `VTIME = timeout` (in tenths of a second, at least 1) makes
/// every `read()` return within the timeout, with zero bytes on expiry.
#[cfg(unix)]
fn configure_tty_raw(fd: i32, timeout: Duration) -> Result<(), PapelitoError> {
    use std::mem::MaybeUninit;

    let mut termios = MaybeUninit::uninit();
    let result = unsafe { libc::tcgetattr(fd, termios.as_mut_ptr()) };
    if result != 0 {
        return Err(PapelitoError::Transport(format!(
            "tcgetattr failed: {}",
            io::Error::last_os_error()
        )));
    }
    let mut termios = unsafe { termios.assume_init() };

    // Input flags: disable all processing.
    // IXON/IXOFF/IXANY: 0x11/0x13 appear in raster data
    termios.c_iflag &= !(libc::IGNBRK
        | libc::BRKINT
        | libc::PARMRK
        | libc::ISTRIP
        | libc::INLCR
        | libc::IGNCR
        | libc::ICRNL
        | libc::IXON
        | libc::IXOFF
        | libc::IXANY);

    // Output flags: disable post-processing
    termios.c_oflag &= !libc::OPOST;

    // Local flags: disable echo, canonical mode, signals
    termios.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);

    // Control flags: 8-bit characters, no parity
    termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
    termios.c_cflag |= libc::CS8;

    // Bounded reads: VTIME is in deciseconds, capped at 255 (~25 s)
    let vtime = (timeout.as_millis() / 100).clamp(1, 255) as libc::cc_t;
    termios.c_cc[libc::VMIN] = 0;
    termios.c_cc[libc::VTIME] = vtime;

    let result = unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) };
    if result != 0 {
        return Err(PapelitoError::Transport(format!(
            "tcsetattr failed: {}",
            io::Error::last_os_error()
        )));
    }

    Ok(())
}

// ============================================================================
// RFCOMM SETUP HELPERS
// ============================================================================

/// Validate a Bluetooth MAC address format (XX:XX:XX:XX:XX:XX).
pub fn is_valid_mac(mac: &str) -> bool {
    let parts: Vec<&str> = mac.split(':').collect();
    if parts.len() != 6 {
        return false;
    }
    parts
        .iter()
        .all(|part| part.len() == 2 && part.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Find an existing RFCOMM device bound to the given MAC address.
///
/// Checks `/proc/net/rfcomm` and falls back to the `rfcomm -a` command.
/// Returns the device path (e.g., "/dev/rfcomm0") if found.
#[cfg(unix)]
pub fn find_rfcomm_for_mac(mac: &str) -> Result<Option<PathBuf>, PapelitoError> {
    let mac_upper = mac.to_uppercase();

    // Try /proc/net/rfcomm first (format: "rfcomm0: XX:XX:XX:XX:XX:XX channel N ...")
    if let Ok(contents) = fs::read_to_string("/proc/net/rfcomm") {
        for line in contents.lines() {
            if line.to_uppercase().contains(&mac_upper) {
                if let Some(dev_name) = line.split(':').next() {
                    let device_path = PathBuf::from(format!("/dev/{}", dev_name.trim()));
                    if device_path.exists() {
                        return Ok(Some(device_path));
                    }
                }
            }
        }
    }

    // Fallback: rfcomm -a command
    let output = Command::new("rfcomm")
        .arg("-a")
        .output()
        .map_err(|e| PapelitoError::Transport(format!("Failed to run 'rfcomm -a': {}", e)))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        if line.to_uppercase().contains(&mac_upper) {
            if let Some(dev_name) = line.split(':').next() {
                let device_path = PathBuf::from(format!("/dev/{}", dev_name.trim()));
                if device_path.exists() {
                    return Ok(Some(device_path));
                }
            }
        }
    }

    Ok(None)
}

#[cfg(not(unix))]
pub fn find_rfcomm_for_mac(_mac: &str) -> Result<Option<PathBuf>, PapelitoError> {
    Ok(None)
}

/// Set up an RFCOMM device for a Bluetooth MAC address.
///
/// Runs:
/// 1. `bluetoothctl connect <MAC>` - connect to device
/// 2. `l2ping -c 1 <MAC>` - verify connectivity
/// 3. `rfcomm bind <channel> <MAC> 1` - create /dev/rfcommN
///
/// Returns the device path on success (e.g., "/dev/rfcomm0").
///
/// **Requires root privileges** for `rfcomm bind`.
#[cfg(unix)]
pub fn setup_rfcomm(mac: &str, channel: u8) -> Result<PathBuf, PapelitoError> {
    let mac_upper = mac.to_uppercase();
    let device_path = PathBuf::from(format!("/dev/rfcomm{}", channel));

    // Step 1: Connect via bluetoothctl (may fail if already connected, that's ok)
    info!("Connecting to {}...", mac_upper);
    let output = Command::new("bluetoothctl")
        .arg("connect")
        .arg(&mac_upper)
        .output()
        .map_err(|e| PapelitoError::Transport(format!("Failed to run bluetoothctl: {}", e)))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if stdout.contains("Connection successful") || stdout.contains("already connected") {
        info!("Connected.");
    } else {
        info!("bluetoothctl returned: {}", stdout.trim());
        // Continue anyway - l2ping will verify
    }

    // Small delay for connection to stabilize
    thread::sleep(Duration::from_millis(500));

    // Step 2: Verify connectivity with l2ping
    let output = Command::new("l2ping")
        .arg("-c")
        .arg("1")
        .arg(&mac_upper)
        .output()
        .map_err(|e| PapelitoError::Transport(format!("Failed to run l2ping: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PapelitoError::Transport(format!(
            "Device {} not reachable: {}",
            mac_upper,
            stderr.trim()
        )));
    }

    // Step 3: Bind RFCOMM
    let output = Command::new("rfcomm")
        .arg("bind")
        .arg(channel.to_string())
        .arg(&mac_upper)
        .arg("1") // RFCOMM channel 1 (standard for SPP)
        .output()
        .map_err(|e| PapelitoError::Transport(format!("Failed to run rfcomm bind: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PapelitoError::Transport(format!(
            "rfcomm bind failed: {}",
            stderr.trim()
        )));
    }

    // Wait for device to appear
    thread::sleep(Duration::from_millis(500));

    if !device_path.exists() {
        return Err(PapelitoError::Transport(format!(
            "Device {} was not created",
            device_path.display()
        )));
    }

    info!("Created {}", device_path.display());
    Ok(device_path)
}

#[cfg(not(unix))]
pub fn setup_rfcomm(_mac: &str, _channel: u8) -> Result<PathBuf, PapelitoError> {
    Err(PapelitoError::Transport(
        "RFCOMM setup not supported on this platform".to_string(),
    ))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_device_path() {
        assert_eq!(DEFAULT_DEVICE, "/dev/rfcomm0");
    }

    #[test]
    fn test_valid_mac_addresses() {
        assert!(is_valid_mac("00:15:83:15:bc:5f"));
        assert!(is_valid_mac("AA:BB:CC:DD:EE:FF"));
        assert!(is_valid_mac("00:00:00:00:00:00"));
    }

    #[test]
    fn test_invalid_mac_addresses() {
        assert!(!is_valid_mac("00:15:83:15:bc")); // too short
        assert!(!is_valid_mac("00:15:83:15:bc:5f:66")); // too long
        assert!(!is_valid_mac("00-15-83-15-bc-5f")); // wrong separator
        assert!(!is_valid_mac("GG:HH:II:JJ:KK:LL")); // invalid hex
        assert!(!is_valid_mac("")); // empty
        assert!(!is_valid_mac("not-a-mac")); // garbage
    }

    #[test]
    fn test_for_mac_rejects_bad_mac() {
        assert!(matches!(
            RfcommConnector::for_mac("nope"),
            Err(PapelitoError::Protocol(_))
        ));
    }

    #[test]
    fn test_open_missing_device_fails() {
        let err = RfcommTransport::open("/dev/definitely-not-a-device", Duration::from_secs(1))
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, PapelitoError::Transport(_)));
    }

    // Note: transport I/O tests require actual hardware.
    // Integration tests should be run manually with a connected printer.
}
