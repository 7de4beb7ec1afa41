//! Lenient HTML scanning for AMP documents.
//!
//! This is not a conforming HTML parser; it is a forward-only tag scanner
//! that is enough to (a) read the format declaration off the root element
//! and (b) collect preloadable subresources. Malformed markup degrades to
//! "not AMP", which the handler turns into a verbatim proxy.

use crate::transformer::Preload;

/// A scanned start tag: lowercase name plus lowercase-name attributes.
#[derive(Debug)]
struct Tag {
    name: String,
    attrs: Vec<(String, Option<String>)>,
}

impl Tag {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_deref())
    }

    fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|(n, _)| n == name)
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

/// Scan the next start tag at or after `pos`. Returns the tag and the
/// offset just past its `>`.
fn next_tag(html: &str, mut pos: usize) -> Option<(Tag, usize)> {
    let bytes = html.as_bytes();
    loop {
        let open = html[pos..].find('<')? + pos;
        let mut i = open + 1;

        // Skip comments, doctype, closing tags and processing instructions.
        if html[i..].starts_with("!--") {
            pos = match html[i + 3..].find("-->") {
                Some(end) => i + 3 + end + 3,
                None => return None,
            };
            continue;
        }
        if i < bytes.len() && matches!(bytes[i], b'!' | b'/' | b'?') {
            pos = i;
            continue;
        }

        let name_start = i;
        while i < bytes.len() && is_name_byte(bytes[i]) {
            i += 1;
        }
        if i == name_start {
            pos = i;
            continue;
        }
        let name = html[name_start..i].to_ascii_lowercase();

        let mut attrs = Vec::new();
        loop {
            while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
                i += 1;
            }
            if i >= bytes.len() {
                return None;
            }
            if bytes[i] == b'>' {
                return Some((Tag { name, attrs }, i + 1));
            }

            // Attribute names may be non-ASCII (the ⚡ marker), so take
            // everything up to whitespace, '=', '>' or '/'.
            let attr_start = i;
            while i < bytes.len()
                && !bytes[i].is_ascii_whitespace()
                && !matches!(bytes[i], b'=' | b'>' | b'/')
            {
                i += 1;
            }
            if i == attr_start {
                i += 1;
                continue;
            }
            let attr_name = html[attr_start..i].to_ascii_lowercase();

            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            let value = if i < bytes.len() && bytes[i] == b'=' {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
                    let quote = bytes[i];
                    i += 1;
                    let value_start = i;
                    while i < bytes.len() && bytes[i] != quote {
                        i += 1;
                    }
                    let value = html[value_start..i].to_string();
                    if i < bytes.len() {
                        i += 1;
                    }
                    Some(value)
                } else {
                    let value_start = i;
                    while i < bytes.len()
                        && !bytes[i].is_ascii_whitespace()
                        && bytes[i] != b'>'
                    {
                        i += 1;
                    }
                    Some(html[value_start..i].to_string())
                }
            } else {
                None
            };

            attrs.push((attr_name, value));
        }
    }
}

/// Whether the document declares the bare AMP format on its root element.
/// `amp4email`, `amp4ads` and documents with no marker do not qualify.
pub fn is_amp_document(html: &str) -> bool {
    let mut pos = 0;
    while let Some((tag, next)) = next_tag(html, pos) {
        if tag.name == "html" {
            return tag.has_attr("amp") || tag.has_attr("⚡");
        }
        pos = next;
    }
    false
}

/// Collect preloadable subresources in document order: `<script src>` and
/// `<link rel=stylesheet href>`.
pub fn extract_preloads(html: &str) -> Vec<Preload> {
    let mut preloads = Vec::new();
    let mut pos = 0;
    while let Some((tag, next)) = next_tag(html, pos) {
        match tag.name.as_str() {
            "script" => {
                if let Some(src) = tag.attr("src") {
                    if !src.is_empty() {
                        preloads.push(Preload {
                            url: src.to_string(),
                            destination: "script".to_string(),
                        });
                    }
                }
            }
            "link" => {
                let is_stylesheet = tag
                    .attr("rel")
                    .map(|rel| {
                        rel.split_ascii_whitespace()
                            .any(|t| t.eq_ignore_ascii_case("stylesheet"))
                    })
                    .unwrap_or(false);
                if is_stylesheet {
                    if let Some(href) = tag.attr("href") {
                        if !href.is_empty() {
                            preloads.push(Preload {
                                url: href.to_string(),
                                destination: "style".to_string(),
                            });
                        }
                    }
                }
            }
            _ => {}
        }
        pos = next;
    }
    preloads
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_amp_attribute_qualifies() {
        assert!(is_amp_document("<html amp><body>hi</body></html>"));
        assert!(is_amp_document("<!doctype html>\n<html amp lang=\"en\">"));
        assert!(is_amp_document("<html ⚡>"));
    }

    #[test]
    fn non_amp_variants_do_not_qualify() {
        assert!(!is_amp_document("<html><body>plain</body></html>"));
        assert!(!is_amp_document("<html amp4email>"));
        assert!(!is_amp_document("<html amp4ads>"));
        assert!(!is_amp_document("no markup at all"));
    }

    #[test]
    fn comments_before_root_are_skipped() {
        assert!(is_amp_document("<!-- <html> --><html amp>"));
    }

    #[test]
    fn preloads_in_document_order() {
        let html = "<html amp><head><link rel=stylesheet href=foo><script src=bar></head>";
        let preloads = extract_preloads(html);
        assert_eq!(preloads.len(), 2);
        assert_eq!(preloads[0].url, "foo");
        assert_eq!(preloads[0].destination, "style");
        assert_eq!(preloads[1].url, "bar");
        assert_eq!(preloads[1].destination, "script");
    }

    #[test]
    fn quoted_attribute_values() {
        let html = r#"<html amp><head><script src="https://foo.com/a,b>c">"#;
        let preloads = extract_preloads(html);
        assert_eq!(preloads.len(), 1);
        assert_eq!(preloads[0].url, "https://foo.com/a,b>c");
    }

    #[test]
    fn non_stylesheet_links_ignored() {
        let html = "<html amp><link rel=canonical href=self><script>inline</script>";
        assert!(extract_preloads(html).is_empty());
    }
}
