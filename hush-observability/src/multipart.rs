//! Multipart bodies, rendered one part at a time as `name:content-type:content`.

use crate::body_masker::{MASK, truncation_marker};
use bytes::Bytes;
use futures::{FutureExt, stream};
use std::convert::Infallible;
use tracing::debug;

/// One part of a `multipart/*` body.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub name: Option<String>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub content: Bytes,
}

impl Part {
    /// Text parts are logged inline; everything else only by size.
    pub fn is_text(&self) -> bool {
        if self.filename.is_some() {
            return false;
        }
        match self.content_type.as_deref() {
            None => true,
            Some(ct) => {
                let ct = ct.to_ascii_lowercase();
                ct.starts_with("text/")
                    || ct.starts_with("application/json")
                    || ct.starts_with("application/x-www-form-urlencoded")
            }
        }
    }
}

/// Extract the `boundary` parameter of a multipart content type.
pub fn boundary(content_type: Option<&str>) -> Option<String> {
    content_type?
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, v)| v.trim().trim_matches('"').to_string())
        .filter(|b| !b.is_empty())
}

/// Split a buffered multipart body into parts with `multer`.
///
/// Parsing stops at the first malformed or cut-off part; the parts read
/// before it are returned.
pub fn parse(body: &[u8], boundary: &str) -> Vec<Part> {
    let data = Bytes::copy_from_slice(body);
    let mut multipart = multer::Multipart::new(stream::iter([Ok::<_, Infallible>(data)]), boundary);
    let mut parts = Vec::new();

    // The whole body is already in memory, so no future below can be pending.
    loop {
        let field = match multipart.next_field().now_or_never() {
            Some(Ok(Some(field))) => field,
            Some(Ok(None)) => break,
            Some(Err(e)) => {
                debug!(error = %e, parsed = parts.len(), "multipart body ends early");
                break;
            }
            None => break,
        };
        let name = field.name().map(str::to_string);
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(|m| m.to_string());
        match field.bytes().now_or_never() {
            Some(Ok(content)) => parts.push(Part {
                name,
                filename,
                content_type,
                content,
            }),
            Some(Err(e)) => {
                debug!(error = %e, parsed = parts.len(), "multipart part cut off");
                break;
            }
            None => break,
        }
    }
    parts
}

/// Render every part, joined by `;`. Text parts whose name is a mask key
/// become `***`; parts larger than `max_body_size` are replaced by the
/// truncation marker.
pub fn render(body: &[u8], boundary: &str, keys: &[String], max_body_size: usize) -> String {
    parse(body, boundary)
        .iter()
        .map(|part| render_part(part, keys, max_body_size))
        .collect::<Vec<_>>()
        .join(";")
}

fn render_part(part: &Part, keys: &[String], max_body_size: usize) -> String {
    let name = part.name.as_deref().unwrap_or_default();
    let content_type = part.content_type.as_deref().unwrap_or("text/plain");
    let size = part.content.len();

    let content = if !part.is_text() {
        format!("<FILE {size} bytes>")
    } else if keys.iter().any(|k| k == name) {
        MASK.to_string()
    } else if size > max_body_size {
        let (text, _) = crate::body_masker::truncate(&part.content, max_body_size);
        format!("{text}{}", truncation_marker(size))
    } else {
        String::from_utf8_lossy(&part.content).into_owned()
    };

    format!("{name}:{content_type}:{content}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARY: &str = "XyZ";

    fn body() -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(b"--XyZ\r\n");
        b.extend_from_slice(b"Content-Disposition: form-data; name=\"user\"\r\n\r\n");
        b.extend_from_slice(b"bob\r\n");
        b.extend_from_slice(b"--XyZ\r\n");
        b.extend_from_slice(b"Content-Disposition: form-data; name=\"password\"\r\n\r\n");
        b.extend_from_slice(b"hunter2\r\n");
        b.extend_from_slice(b"--XyZ\r\n");
        b.extend_from_slice(
            b"Content-Disposition: form-data; name=\"avatar\"; filename=\"a.png\"\r\n",
        );
        b.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
        b.extend_from_slice(&[0x89, 0x50, 0x4e, 0x47, 0x00, 0x01]);
        b.extend_from_slice(b"\r\n--XyZ--\r\n");
        b
    }

    #[test]
    fn boundary_is_extracted() {
        assert_eq!(
            boundary(Some("multipart/form-data; boundary=XyZ")).as_deref(),
            Some("XyZ")
        );
        assert_eq!(
            boundary(Some("multipart/form-data; charset=utf-8; Boundary=\"a b\"")).as_deref(),
            Some("a b")
        );
        assert!(boundary(Some("multipart/form-data")).is_none());
        assert!(boundary(None).is_none());
    }

    #[test]
    fn parts_are_parsed() {
        let b = body();
        let parts = parse(&b, BOUNDARY);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].name.as_deref(), Some("user"));
        assert_eq!(&parts[0].content[..], b"bob");
        assert!(parts[0].is_text());
        assert_eq!(parts[2].filename.as_deref(), Some("a.png"));
        assert_eq!(parts[2].content_type.as_deref(), Some("image/png"));
        assert_eq!(parts[2].content.len(), 6);
        assert!(!parts[2].is_text());
    }

    #[test]
    fn render_masks_and_summarises_files() {
        let keys = vec!["password".to_string()];
        let out = render(&body(), BOUNDARY, &keys, usize::MAX);
        assert_eq!(
            out,
            "user:text/plain:bob;password:text/plain:***;avatar:image/png:<FILE 6 bytes>"
        );
    }

    #[test]
    fn render_truncates_large_text_parts() {
        let out = render(&body(), BOUNDARY, &[], 3);
        assert!(out.contains("password:text/plain:hun <TRUNCATED 7 bytes>"));
        assert!(out.contains("user:text/plain:bob;"));
    }

    #[test]
    fn cut_off_body_keeps_complete_parts() {
        let b = body();
        let cut = &b[..b.len() - 20];
        let parts = parse(cut, BOUNDARY);
        assert_eq!(parts.len(), 2);
        assert_eq!(&parts[1].content[..], b"hunter2");
    }

    #[test]
    fn part_content_type_parameters_are_kept() {
        let b = b"--XyZ\r\nContent-Disposition: form-data; name=\"note\"\r\nContent-Type: text/plain; charset=utf-8\r\n\r\nv\r\n--XyZ--\r\n";
        let parts = parse(b, BOUNDARY);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].name.as_deref(), Some("note"));
        assert!(parts[0].is_text());
    }

    #[test]
    fn garbage_yields_no_parts() {
        assert!(parse(b"not multipart", BOUNDARY).is_empty());
        assert_eq!(render(b"", BOUNDARY, &[], 10), "");
    }
}
