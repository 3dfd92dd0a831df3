//! HTML rendering of a merged listing, with an optional markdown footer.

use chrono::{DateTime, Utc};
use humansize::{BINARY, format_size};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use pulldown_cmark::{Event, Options, Parser, html::push_html};

use crate::models::entry::Entry;

const PAGE_HEAD: &str = include_str!("../../templates/page.html");

/// Stands in for raw HTML found in a README.
const RAW_HTML_OMITTED: &str = "<!-- raw HTML omitted -->";

/// Characters left as-is in hrefs: those of encodeURIComponent plus `/`.
static PATH_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Render the listing page for `path`.
///
/// Objects and directories go into separate tables. A `../` link leads every
/// page except the root, where `favicon.ico` is hidden.
pub fn render_listing(
    path: &str,
    entries: &[Entry],
    readme: Option<&[u8]>,
    now: DateTime<Utc>,
) -> String {
    let mut html = PAGE_HEAD.replace("{{path}}", &html_escape(path));
    html.push_str("<main><table>\n");
    if path != "/" {
        html.push_str("<tr><td><a href=\"../\">../</a></td></tr>\n");
    }

    for (i, entry) in entries.iter().enumerate() {
        if i > 0 && !entries[i - 1].is_directory() && entry.is_directory() {
            html.push_str("</table><table>\n");
        }
        if entry.name == "favicon.ico" && path == "/" {
            continue;
        }

        html.push_str(&format!(
            "<tr><td><a href=\"{}\">{}</a></td>",
            utf8_percent_encode(&entry.name, &PATH_ENCODE_SET),
            html_escape(&entry.name)
        ));
        if let Some(size) = entry.size {
            html.push_str(&format!("<td>{}</td>", format_size(size, BINARY)));
        }
        if let Some(timestamp) = entry.timestamp {
            html.push_str(&format!(
                "<td><time datetime=\"{}\" title=\"{}\">{}</time></td>",
                timestamp.to_rfc3339(),
                timestamp.format("%Y-%m-%d %H:%M:%S"),
                relative_time(timestamp, now)
            ));
        }
        if let Some(fingerprint) = &entry.fingerprint {
            html.push_str(&format!("<td><code>{}</code></td>", html_escape(fingerprint)));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table></main>");

    if let Some(markdown) = readme {
        html.push_str("\n<footer>\n");
        html.push_str(&render_markdown(markdown));
        html.push_str("</footer>");
    }

    html.push_str("\n</body>\n</html>\n");
    html
}

/// GitHub-flavoured markdown to HTML. Invalid UTF-8 is replaced, not rejected.
///
/// READMEs come from bucket contents, so raw HTML is never passed through.
pub fn render_markdown(markdown: &[u8]) -> String {
    let text = String::from_utf8_lossy(markdown);
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES;
    let events = Parser::new_ext(&text, options).map(|event| match event {
        Event::Html(_) => Event::Html(RAW_HTML_OMITTED.into()),
        Event::InlineHtml(_) => Event::InlineHtml(RAW_HTML_OMITTED.into()),
        other => other,
    });
    let mut html = String::with_capacity(text.len() * 3 / 2);
    push_html(&mut html, events);
    html
}

/// "3 hours ago", "2 days from now".
fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(then);
    let (secs, suffix) = if delta.num_seconds() >= 0 {
        (delta.num_seconds(), "ago")
    } else {
        (-delta.num_seconds(), "from now")
    };

    const UNITS: [(i64, &str); 6] = [
        (365 * 24 * 3600, "year"),
        (30 * 24 * 3600, "month"),
        (7 * 24 * 3600, "week"),
        (24 * 3600, "day"),
        (3600, "hour"),
        (60, "minute"),
    ];
    for (unit_secs, unit) in UNITS {
        let n = secs / unit_secs;
        if n > 0 {
            let plural = if n == 1 { "" } else { "s" };
            return format!("{n} {unit}{plural} {suffix}");
        }
    }
    "now".to_string()
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
