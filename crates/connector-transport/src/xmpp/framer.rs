//! Extracts complete top-level stanza fragments from the raw byte stream
//! that follows the initial `<stream:stream>` open tag. The wire protocol
//! never nests a `<message>` inside an `<iq>` or vice-versa, so scanning
//! for the next balanced `<message>...</message>` or self-closing/`<iq
//! .../>`/`<iq>...</iq>` fragment is sufficient.

#[derive(Default)]
pub struct StanzaFramer {
    buf: String,
}

impl StanzaFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.push_str(&String::from_utf8_lossy(bytes));
    }

    /// Pops and returns the next complete stanza fragment, if one is fully
    /// buffered.
    pub fn next_stanza(&mut self) -> Option<String> {
        for tag in ["message", "iq"] {
            if let Some(fragment) = Self::extract(&mut self.buf, tag) {
                return Some(fragment);
            }
        }
        None
    }

    fn extract(buf: &mut String, tag: &str) -> Option<String> {
        let open_self_closing = format!("<{tag} ");
        let open_tag_start = format!("<{tag}>");
        let close_tag = format!("</{tag}>");

        if let Some(start) = buf.find(&open_tag_start) {
            if let Some(end_rel) = buf[start..].find(&close_tag) {
                let end = start + end_rel + close_tag.len();
                let fragment = buf[start..end].to_string();
                buf.replace_range(start..end, "");
                return Some(fragment);
            }
            return None;
        }

        if let Some(start) = buf.find(&open_self_closing) {
            if let Some(end_rel) = buf[start..].find("/>") {
                let end = start + end_rel + 2;
                let fragment = buf[start..end].to_string();
                buf.replace_range(start..end, "");
                return Some(fragment);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_self_closing_iq() {
        let mut framer = StanzaFramer::new();
        framer.push_bytes(b"<iq id=\"1\" type=\"result\"/><iq id=\"2\" type=\"result\"/>");
        assert_eq!(
            framer.next_stanza().as_deref(),
            Some("<iq id=\"1\" type=\"result\"/>")
        );
        assert_eq!(
            framer.next_stanza().as_deref(),
            Some("<iq id=\"2\" type=\"result\"/>")
        );
        assert_eq!(framer.next_stanza(), None);
    }

    #[test]
    fn extracts_message_across_multiple_chunks() {
        let mut framer = StanzaFramer::new();
        framer.push_bytes(b"<message><push><data>ab");
        assert_eq!(framer.next_stanza(), None);
        framer.push_bytes(b"cd</data></push></message>");
        assert_eq!(
            framer.next_stanza().as_deref(),
            Some("<message><push><data>abcd</data></push></message>")
        );
    }
}
