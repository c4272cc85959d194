//! Size-prefixed record framing for the HTTP-stream transport: a decimal
//! size line, then that many bytes of JSON payload.

#[derive(Default)]
pub struct SizePrefixedFramer {
    buf: Vec<u8>,
}

impl SizePrefixedFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pops and returns the next complete record's payload bytes, if the
    /// size line and the full payload are both buffered.
    pub fn next_record(&mut self) -> Option<Vec<u8>> {
        let newline_pos = self.buf.iter().position(|&b| b == b'\n')?;
        let size_str = std::str::from_utf8(&self.buf[..newline_pos]).ok()?;
        let size: usize = size_str.trim().parse().ok()?;
        let payload_start = newline_pos + 1;
        let payload_end = payload_start + size;
        if self.buf.len() < payload_end {
            return None;
        }
        let payload = self.buf[payload_start..payload_end].to_vec();
        self.buf.drain(..payload_end);
        Some(payload)
    }
}

/// Extract the printer id from one decoded record: a JSON array whose first
/// element is an object containing `data.notification = printerID`.
pub fn extract_printer_id(payload: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(payload).ok()?;
    value
        .as_array()?
        .first()?
        .get("data")?
        .get("notification")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framer_yields_nothing_until_payload_is_complete() {
        let mut framer = SizePrefixedFramer::new();
        framer.push_bytes(b"5\nhel");
        assert_eq!(framer.next_record(), None);
        framer.push_bytes(b"lo");
        assert_eq!(framer.next_record(), Some(b"hello".to_vec()));
    }

    #[test]
    fn framer_yields_multiple_records_back_to_back() {
        let mut framer = SizePrefixedFramer::new();
        framer.push_bytes(b"2\nab3\nxyz");
        assert_eq!(framer.next_record(), Some(b"ab".to_vec()));
        assert_eq!(framer.next_record(), Some(b"xyz".to_vec()));
        assert_eq!(framer.next_record(), None);
    }

    #[test]
    fn extract_printer_id_from_well_formed_record() {
        let payload = br#"[{"data":{"notification":"printer-42"}}]"#;
        assert_eq!(extract_printer_id(payload), Some("printer-42".to_string()));
    }

    #[test]
    fn extract_printer_id_returns_none_for_malformed_record() {
        let payload = br#"{"not":"an array"}"#;
        assert_eq!(extract_printer_id(payload), None);
    }
}
