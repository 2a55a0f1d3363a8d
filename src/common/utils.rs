//! Utility functions for the data node

use crate::common::{Error, Result};
use std::net::{IpAddr, UdpSocket};

/// Storage directory for a node: `uploaded_<ip>_<client port>`.
///
/// Peers and the coordinator rebuild paths with the same formula, so the
/// format must not change.
pub fn upload_dir_name(ip: &str, client_port: u16) -> String {
    format!("uploaded_{}_{}", ip, client_port)
}

/// File names are flat: no separators, no parent/current dir components.
pub fn validate_file_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(Error::InvalidFileName(name.to_string()));
    }

    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Err(Error::InvalidFileName(name.to_string()));
    }

    Ok(())
}

/// Prefix `http://` when the address has no scheme
pub fn http_endpoint(addr: &str) -> String {
    if addr.contains("://") {
        addr.to_string()
    } else {
        format!("http://{}", addr)
    }
}

/// IPv4 address of the interface used for outbound traffic.
///
/// Connecting a UDP socket sends nothing; it only makes the kernel pick a
/// route and source address.
pub fn discover_local_ip() -> Result<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect("8.8.8.8:80")?;
    let ip = socket.local_addr()?.ip();

    if ip.is_loopback() || ip.is_unspecified() {
        return Err(Error::Internal("no suitable IP address found".into()));
    }

    Ok(ip)
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_idx])
}
