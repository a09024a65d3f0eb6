use crate::error::AnalysisError;
use mailparse::{DispositionType, ParsedMail};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Ordered header collection. Duplicate names (compared case-insensitively)
/// collapse to the last occurrence, keeping the position of the first.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn insert(&mut self, name: &str, value: String) {
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            existing.0 = name.to_string();
            existing.1 = value;
        } else {
            self.entries.push((name.to_string(), value));
        }
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AttachmentMeta {
    pub filename: String,
    pub content_type: String,
    pub size_bytes: usize,
}

/// Parsed, in-memory representation of one message. Built once per analysis
/// and never mutated afterwards; holds no reference to the raw bytes.
#[derive(Debug, Clone, Default)]
pub struct StructuredEmail {
    pub sender: String,
    pub recipients: String,
    pub cc: String,
    pub bcc: String,
    pub subject: String,
    pub date: String,
    pub headers: HeaderMap,
    pub body_text: String,
    pub body_html: String,
    pub urls: Vec<String>,
    pub attachments: Vec<AttachmentMeta>,
}

impl StructuredEmail {
    /// Text the scoring modules operate on: the plain body, or the raw HTML
    /// when no plain text could be recovered at all.
    pub fn analysis_text(&self) -> &str {
        if !self.body_text.is_empty() {
            &self.body_text
        } else {
            &self.body_html
        }
    }
}

#[derive(Default)]
struct BodyParts {
    text: String,
    html: String,
    attachments: Vec<AttachmentMeta>,
}

fn url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"https?://[^\s<>"{}|\\^`\[\]]+"#).expect("url pattern")
    })
}

fn tag_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("tag pattern"))
}

fn script_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").expect("script pattern")
    })
}

/// Parse raw message bytes into a [`StructuredEmail`].
///
/// Tolerant by design: undecodable byte sequences are replaced, a missing
/// text/plain part falls back to stripped HTML, and attachments contribute
/// metadata only. Nothing is written to disk.
pub fn parse_message(raw: &[u8]) -> Result<StructuredEmail, AnalysisError> {
    let parsed =
        mailparse::parse_mail(raw).map_err(|e| AnalysisError::MalformedMessage(e.to_string()))?;

    let mut headers = HeaderMap::default();
    for header in &parsed.headers {
        headers.insert(&header.get_key(), header.get_value());
    }

    let mut parts = BodyParts::default();
    if parsed.ctype.mimetype.starts_with("multipart/") || !parsed.subparts.is_empty() {
        collect_parts(&parsed, &mut parts);
    } else {
        classify_leaf(&parsed, &mut parts);
    }

    if parts.text.is_empty() && !parts.html.is_empty() {
        parts.text = strip_html(&parts.html);
    }

    let sender = headers.get("From").unwrap_or_default().to_string();
    let mut url_source = String::with_capacity(parts.text.len() + parts.html.len() + sender.len());
    url_source.push_str(&parts.text);
    url_source.push_str(&parts.html);
    url_source.push_str(&sender);
    let urls = extract_urls(&url_source);

    Ok(StructuredEmail {
        recipients: headers.get("To").unwrap_or_default().to_string(),
        cc: headers.get("Cc").unwrap_or_default().to_string(),
        bcc: headers.get("Bcc").unwrap_or_default().to_string(),
        subject: headers.get("Subject").unwrap_or_default().to_string(),
        date: headers.get("Date").unwrap_or_default().to_string(),
        sender,
        headers,
        body_text: parts.text,
        body_html: parts.html,
        urls,
        attachments: parts.attachments,
    })
}

fn collect_parts(part: &ParsedMail, out: &mut BodyParts) {
    for sub in &part.subparts {
        if sub.ctype.mimetype.starts_with("multipart/") {
            collect_parts(sub, out);
        } else {
            classify_leaf(sub, out);
        }
    }
}

fn classify_leaf(part: &ParsedMail, out: &mut BodyParts) {
    let disposition = part.get_content_disposition();
    let mimetype = part.ctype.mimetype.as_str();

    if mimetype == "text/plain" && disposition.disposition != DispositionType::Attachment {
        out.text.push_str(&decoded_body(part));
    } else if mimetype == "text/html" && disposition.disposition != DispositionType::Attachment {
        out.html.push_str(&decoded_body(part));
    } else if disposition.disposition == DispositionType::Attachment {
        let filename = disposition
            .params
            .get("filename")
            .or_else(|| part.ctype.params.get("name"))
            .cloned()
            .unwrap_or_else(|| "unknown".to_string());
        let size_bytes = part.get_body_raw().map(|b| b.len()).unwrap_or(0);
        out.attachments.push(AttachmentMeta {
            filename,
            content_type: mimetype.to_string(),
            size_bytes,
        });
    } else if mimetype == "text/html" {
        out.html.push_str(&decoded_body(part));
    } else if mimetype.starts_with("text/") || mimetype.is_empty() {
        out.text.push_str(&decoded_body(part));
    }
}

fn decoded_body(part: &ParsedMail) -> String {
    match part.get_body() {
        Ok(body) => body,
        // Fall back to a lossy decode of the raw payload rather than failing
        // the whole parse on one bad part.
        Err(_) => part
            .get_body_raw()
            .map(|raw| String::from_utf8_lossy(&raw).into_owned())
            .unwrap_or_default(),
    }
}

/// Reduce an HTML body to readable text: script/style blocks go away,
/// remaining tags become line breaks, common entities are decoded.
pub fn strip_html(html: &str) -> String {
    let without_blocks = script_pattern().replace_all(html, " ");
    let without_tags = tag_pattern().replace_all(&without_blocks, "\n");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    decoded
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Distinct absolute URLs in `text`. Order is not significant.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    url_pattern()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .filter(|u| seen.insert(u.clone()))
        .collect()
}

/// Address portion of a From-style header: the angle-bracket content when
/// present, the trimmed value otherwise.
pub fn extract_address(header: &str) -> &str {
    if let (Some(start), Some(end)) = (header.find('<'), header.rfind('>')) {
        if start < end {
            return header[start + 1..end].trim();
        }
    }
    header.trim()
}

/// Domain after the last `@`, lowercased, stripped of angle-bracket residue.
pub fn extract_domain(value: &str) -> Option<String> {
    if !value.contains('@') {
        return None;
    }
    value
        .rsplit('@')
        .next()
        .map(|d| d.trim().trim_end_matches('>').trim().to_lowercase())
        .filter(|d| !d.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_message() {
        let raw = b"From: Alice <alice@example.com>\r\nTo: bob@example.com\r\nSubject: Hello\r\nDate: Tue, 5 Aug 2025 14:30:00 +0000\r\n\r\nJust checking in.\r\n";
        let email = parse_message(raw).unwrap();
        assert_eq!(email.sender, "Alice <alice@example.com>");
        assert_eq!(email.recipients, "bob@example.com");
        assert_eq!(email.subject, "Hello");
        assert!(email.body_text.contains("Just checking in."));
        assert!(email.attachments.is_empty());
        assert!(email.urls.is_empty());
    }

    #[test]
    fn collects_multipart_bodies_and_attachment_metadata() {
        let raw = concat!(
            "From: sender@example.com\r\n",
            "To: rcpt@example.com\r\n",
            "Subject: Report\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/mixed; boundary=\"xyz\"\r\n",
            "\r\n",
            "--xyz\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "See the attached file.\r\n",
            "--xyz\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<p>See the <b>attached</b> file.</p>\r\n",
            "--xyz\r\n",
            "Content-Type: application/octet-stream\r\n",
            "Content-Disposition: attachment; filename=\"report.pdf\"\r\n",
            "\r\n",
            "PDFDATA\r\n",
            "--xyz--\r\n",
        )
        .as_bytes();

        let email = parse_message(raw).unwrap();
        assert!(email.body_text.contains("See the attached file."));
        assert!(email.body_html.contains("<b>attached</b>"));
        assert_eq!(email.attachments.len(), 1);
        assert_eq!(email.attachments[0].filename, "report.pdf");
        assert_eq!(email.attachments[0].content_type, "application/octet-stream");
        assert!(email.attachments[0].size_bytes > 0);
    }

    #[test]
    fn html_only_message_gets_stripped_text() {
        let raw = concat!(
            "From: sender@example.com\r\n",
            "Subject: Offer\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/alternative; boundary=\"b\"\r\n",
            "\r\n",
            "--b\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<html><body><p>Click &amp; save</p></body></html>\r\n",
            "--b--\r\n",
        )
        .as_bytes();

        let email = parse_message(raw).unwrap();
        assert!(email.body_text.contains("Click & save"));
        assert!(!email.body_text.contains('<'));
    }

    #[test]
    fn urls_are_deduplicated_across_text_html_and_sender() {
        let raw = concat!(
            "From: promo@deals.example <promo@deals.example>\r\n",
            "Subject: Links\r\n",
            "\r\n",
            "Visit https://a.example/page and https://a.example/page again,\r\n",
            "plus http://b.example/x once.\r\n",
        )
        .as_bytes();

        let email = parse_message(raw).unwrap();
        let set: HashSet<&str> = email.urls.iter().map(String::as_str).collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains("https://a.example/page"));
        assert!(set.contains("http://b.example/x"));
    }

    #[test]
    fn duplicate_headers_collapse_to_last_value() {
        let raw = b"Received: one\r\nReceived: two\r\nFrom: a@b.co\r\n\r\nbody\r\n";
        let email = parse_message(raw).unwrap();
        assert_eq!(email.headers.get("received"), Some("two"));
    }

    #[test]
    fn address_helpers() {
        assert_eq!(extract_address("\"CEO\" <ceo@corp.example>"), "ceo@corp.example");
        assert_eq!(extract_address("plain@corp.example"), "plain@corp.example");
        assert_eq!(extract_domain("Name <x@Sub.Example.COM>"), Some("sub.example.com".to_string()));
        assert_eq!(extract_domain("no-at-here"), None);
    }

    #[test]
    fn strip_html_drops_scripts_and_tags() {
        let text = strip_html("<html><script>var x=1;</script><p>Hello</p><br>world</html>");
        assert!(text.contains("Hello"));
        assert!(text.contains("world"));
        assert!(!text.contains("var x"));
        assert!(!text.contains('<'));
    }
}
