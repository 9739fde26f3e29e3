//! Display-time link rendering

use sqlx::SqliteConnection;
use tracing::debug;

use super::registry::LinkTypeRegistry;
use super::targets::fetch_stored_targets;
use super::tokens::rewrite_with;
use crate::Result;

/// Placeholder emitted for a stored link whose target was deleted
pub const BROKEN_LINK_HTML: &str = r#"<em class="broken-link">[broken link]</em>"#;

/// Replace storage-form tokens in `text` with HTML anchors
///
/// Targets are fetched with one query per link type. Tokens pointing at
/// deleted records become [`BROKEN_LINK_HTML`]. Unregistered names,
/// authoring-form slugs and malformed tokens are left as literal text. All
/// text outside the emitted anchors is HTML-escaped.
pub async fn render_all_links(
    conn: &mut SqliteConnection,
    registry: &LinkTypeRegistry,
    text: &str,
) -> Result<String> {
    let found = fetch_stored_targets(conn, registry, text, |_| true).await?;
    let mut broken = 0usize;

    let html = rewrite_with(text, push_escaped, |token| {
        let link_type = registry.lookup(token.name)?;
        let id = link_type.stored_id(&token.reference)?;

        match found.get(link_type.name).and_then(|targets| targets.get(&id)) {
            Some(target) => Some(format!(
                r#"<a href="{}">{}</a>"#,
                escape_html((link_type.url)(target)),
                escape_html((link_type.display)(target))
            )),
            None => {
                broken += 1;
                Some(BROKEN_LINK_HTML.to_string())
            }
        }
    });

    if broken > 0 {
        debug!("Rendered {} broken link(s)", broken);
    }

    Ok(html)
}

fn escape_html(raw: String) -> String {
    if !raw.contains(['&', '<', '>', '"', '\'']) {
        return raw;
    }

    let mut escaped = String::with_capacity(raw.len() + 8);
    push_escaped(&mut escaped, &raw);
    escaped
}

fn push_escaped(output: &mut String, raw: &str) {
    for c in raw.chars() {
        match c {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&#x27;"),
            _ => output.push(c),
        }
    }
}
