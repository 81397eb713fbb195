//! Static HTML index page for an emulated directory.

use crate::models::listing::DirectoryEntry;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::fmt::Write as _;

const HREF_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const DATE_FORMAT: &str = "%d-%b-%Y %H:%M";

/// Render the index page for `prefix` inside `bucket`.
///
/// Links are relative, so the page must be served from the trailing-slash
/// form of the directory path. A `../` row is added below the bucket root.
pub fn render_directory_index(bucket: &str, prefix: &str, entries: &[DirectoryEntry]) -> String {
    let title = html_escape(&format!("Index of /{}/{}", bucket, prefix));

    let mut html = String::with_capacity(512 + entries.len() * 128);
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(html, "<title>{}</title>", title);
    html.push_str("</head>\n<body>\n");
    let _ = writeln!(html, "<h1>{}</h1>", title);
    html.push_str("<table>\n<tr><th>Name</th><th>Last modified</th><th>Size</th></tr>\n");

    if !prefix.is_empty() {
        html.push_str("<tr><td><a href=\"../\">../</a></td><td></td><td>-</td></tr>\n");
    }

    for entry in entries {
        let modified = entry
            .modified
            .map(|ts| ts.format(DATE_FORMAT).to_string())
            .unwrap_or_default();
        let _ = writeln!(
            html,
            "<tr><td><a href=\"{}\">{}</a></td><td>{}</td><td>{}</td></tr>",
            entry_href(entry),
            html_escape(&entry.name),
            modified,
            entry.size
        );
    }

    html.push_str("</table>\n</body>\n</html>\n");
    html
}

fn entry_href(entry: &DirectoryEntry) -> String {
    if entry.is_directory() {
        let segment = entry.name.trim_end_matches('/');
        format!("{}/", utf8_percent_encode(segment, HREF_ENCODE_SET))
    } else {
        utf8_percent_encode(&entry.name, HREF_ENCODE_SET).to_string()
    }
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::listing::EntrySize;
    use chrono::{DateTime, Utc};

    fn entries() -> Vec<DirectoryEntry> {
        let created = DateTime::parse_from_rfc3339("2024-02-05T13:07:00Z")
            .unwrap()
            .with_timezone(&Utc);
        vec![
            DirectoryEntry {
                name: "a <b>.txt".into(),
                modified: Some(created),
                size: EntrySize::Bytes(42),
            },
            DirectoryEntry {
                name: "sub dir/".into(),
                modified: None,
                size: EntrySize::Directory,
            },
        ]
    }

    #[test]
    fn renders_rows_with_escaped_names_and_encoded_links() {
        let html = render_directory_index("bucket", "dir/", &entries());

        assert!(html.contains("<title>Index of /bucket/dir/</title>"));
        assert!(html.contains(
            "<tr><td><a href=\"a%20%3Cb%3E.txt\">a &lt;b&gt;.txt</a></td><td>05-Feb-2024 13:07</td><td>42</td></tr>"
        ));
        assert!(html.contains(
            "<tr><td><a href=\"sub%20dir/\">sub dir/</a></td><td></td><td>-</td></tr>"
        ));
        assert!(html.contains("<a href=\"../\">../</a>"));
    }

    #[test]
    fn bucket_root_has_no_parent_link() {
        let html = render_directory_index("bucket", "", &entries());
        assert!(html.contains("Index of /bucket/"));
        assert!(!html.contains("../"));
    }

    #[test]
    fn empty_listing_still_renders_page() {
        let html = render_directory_index("bucket", "x/", &[]);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.ends_with("</html>\n"));
    }
}
