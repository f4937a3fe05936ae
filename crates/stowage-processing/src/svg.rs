//! SVG namespace normalization.
//!
//! Some editors emit SVG without explicit `xmlns` declarations; browsers that
//! insist on them render such files blank. Missing declarations are injected
//! into the root `<svg>` tag before the original is stored.

use regex::Regex;

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// Inject missing `xmlns`/`xmlns:xlink` declarations into the root tag.
///
/// Returns `None` when the document is not recognizable SVG or already
/// carries both declarations.
pub fn ensure_namespaces(data: &str) -> Option<String> {
    let root = Regex::new(r"(?s)<svg\s([^>]+)>").ok()?;

    let mut result = data.to_string();
    let mut changed = false;

    let captures = root.captures(&result)?;
    let attrs = captures.get(1)?.as_str().to_string();
    let tag = captures.get(0)?.as_str().to_string();

    if !attrs.contains("xmlns:xlink=") {
        result = result.replacen(
            tag.as_str(),
            &format!("<svg xmlns:xlink=\"{XLINK_NS}\" {attrs}>"),
            1,
        );
        changed = true;
    }

    let captures = root.captures(&result)?;
    let attrs = captures.get(1)?.as_str().to_string();
    let tag = captures.get(0)?.as_str().to_string();

    // `xmlns=` must not match `xmlns:xlink=`.
    let has_default_ns = Regex::new(r#"xmlns\s*=\s*""#)
        .ok()?
        .is_match(&attrs);
    if !has_default_ns {
        result = result.replacen(
            tag.as_str(),
            &format!("<svg xmlns=\"{SVG_NS}\" {attrs}>"),
            1,
        );
        changed = true;
    }

    changed.then_some(result)
}
