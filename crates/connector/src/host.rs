//! The local hostname, stamped onto every printer as the
//! `connector-hostname` derived tag.

/// Reads the hostname via `gethostname(3)` directly rather than pulling
/// in a dedicated hostname crate.
pub fn local_hostname() -> String {
    let mut buf = vec![0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return "localhost".to_string();
    }
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..len]).into_owned()
}
