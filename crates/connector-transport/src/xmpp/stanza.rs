//! Pure stanza classification for the streaming-session transport. No
//! I/O: parsing an already-read XML fragment into a classified event,
//! decoding push payloads.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::PrinterNotification;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomingStanza {
    Push(PrinterNotification),
    Pong { id: u8 },
    Ignored,
}

/// Build the SASL `X-OAUTH2` initial response: `NUL ‖ user ‖ NUL ‖
/// accessToken`, base64-encoded.
pub fn sasl_initial_response(user: &str, access_token: &str) -> String {
    let mut raw = Vec::with_capacity(user.len() + access_token.len() + 2);
    raw.push(0u8);
    raw.extend_from_slice(user.as_bytes());
    raw.push(0u8);
    raw.extend_from_slice(access_token.as_bytes());
    B64.encode(raw)
}

/// Decode a `<message><push><data>BASE64</data></push></message>` payload
/// into a notification: a `/delete` suffix is a `PrinterDelete(prefix)`; a
/// payload with no `/` at all is `NewJobs(data)`; any other `/`-suffixed
/// payload is unrecognized and ignored.
pub fn decode_push_data(base64_data: &str) -> Option<PrinterNotification> {
    let decoded = B64.decode(base64_data.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    if let Some(prefix) = text.strip_suffix("/delete") {
        Some(PrinterNotification::PrinterDelete(prefix.to_string()))
    } else if text.contains('/') {
        None
    } else {
        Some(PrinterNotification::NewJobs(text))
    }
}

/// Parse one top-level stanza fragment (a single `<message>...</message>`
/// or `<iq .../>` element) into a classified event.
pub fn classify_stanza(xml: &str) -> IncomingStanza {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut in_push_data = false;
    let mut push_data = String::new();
    let mut is_message = false;
    let mut iq_type: Option<String> = None;
    let mut iq_id: Option<u8> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let name = e.local_name();
                let name = String::from_utf8_lossy(name.as_ref()).to_string();
                match name.as_str() {
                    "message" => is_message = true,
                    "data" => in_push_data = true,
                    "iq" => {
                        for attr in e.attributes().flatten() {
                            let key = String::from_utf8_lossy(attr.key.local_name().as_ref())
                                .to_string();
                            let value = String::from_utf8_lossy(&attr.value).to_string();
                            match key.as_str() {
                                "type" => iq_type = Some(value),
                                "id" => iq_id = value.trim().parse::<u8>().ok(),
                                _ => {}
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) if in_push_data => {
                push_data.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Ok(Event::End(ref e)) => {
                if e.local_name().as_ref() == b"data" {
                    in_push_data = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => return IncomingStanza::Ignored,
            _ => {}
        }
        buf.clear();
    }

    if is_message && !push_data.is_empty() {
        return decode_push_data(&push_data)
            .map(IncomingStanza::Push)
            .unwrap_or(IncomingStanza::Ignored);
    }
    if iq_type.as_deref() == Some("result") {
        if let Some(id) = iq_id {
            return IncomingStanza::Pong { id };
        }
    }
    IncomingStanza::Ignored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sasl_response_packs_nul_user_nul_token() {
        let response = sasl_initial_response("robot@example.com", "tok123");
        let decoded = B64.decode(response).unwrap();
        assert_eq!(decoded[0], 0u8);
        let rest = &decoded[1..];
        let split: Vec<&[u8]> = rest.splitn(2, |&b| b == 0).collect();
        assert_eq!(split[0], b"robot@example.com");
        assert_eq!(split[1], b"tok123");
    }

    #[test]
    fn decode_push_data_without_slash_is_new_jobs() {
        let encoded = B64.encode("printer-123");
        assert_eq!(
            decode_push_data(&encoded),
            Some(PrinterNotification::NewJobs("printer-123".to_string()))
        );
    }

    #[test]
    fn decode_push_data_with_delete_suffix_strips_it() {
        let encoded = B64.encode("printer-123/delete");
        assert_eq!(
            decode_push_data(&encoded),
            Some(PrinterNotification::PrinterDelete("printer-123".to_string()))
        );
    }

    #[test]
    fn decode_push_data_with_other_suffix_is_ignored() {
        // only a "/delete" suffix is special; any other "/"-suffixed
        // payload is unrecognized, not a NewJobs carrying the raw string.
        let encoded = B64.encode("printer-123/other");
        assert_eq!(decode_push_data(&encoded), None);
    }

    #[test]
    fn classify_push_message_stanza() {
        let encoded = B64.encode("printer-abc");
        let xml = format!("<message><push><data>{encoded}</data></push></message>");
        assert_eq!(
            classify_stanza(&xml),
            IncomingStanza::Push(PrinterNotification::NewJobs("printer-abc".to_string()))
        );
    }

    #[test]
    fn classify_iq_result_is_pong() {
        let xml = "<iq id=\"7\" type=\"result\"/>";
        assert_eq!(classify_stanza(xml), IncomingStanza::Pong { id: 7 });
    }

    #[test]
    fn classify_unrelated_stanza_is_ignored() {
        let xml = "<presence/>";
        assert_eq!(classify_stanza(xml), IncomingStanza::Ignored);
    }
}
