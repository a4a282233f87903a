//! Resolution of document-relative texture sources.

use url::Url;

/// Parse `path` as a URL, ignoring single-letter schemes which are drive letters.
fn parse_url(path: &str) -> Option<Url> {
    Url::parse(path).ok().filter(|url| url.scheme().len() > 1)
}

/// Collapse `.` and `..` segments and repeated separators.
///
/// `..` above the start of a relative path is kept; above the root of an absolute
/// path it is dropped.
fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            _ => segments.push(segment),
        }
    }

    let joined = segments.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Resolve `source` against the path of the document that references it.
///
/// Backslashes are treated as separators. Absolute URLs and rooted paths are used as
/// is, sources relative to a URL document are joined as URLs, and everything else is
/// joined onto the document's directory and normalized.
pub fn join_path(document_path: &str, source: &str) -> String {
    let source = source.replace('\\', "/");
    if source.is_empty() || parse_url(&source).is_some() {
        return source;
    }
    if source.starts_with('/') {
        return normalize(&source);
    }

    let document_path = document_path.replace('\\', "/");
    if let Some(base) = parse_url(&document_path) {
        match base.join(&source) {
            Ok(joined) => return joined.into(),
            Err(err) => {
                log::debug!(target: "renderer", "cannot join {source} onto {document_path}: {err}");
            }
        }
    }

    let directory = document_path
        .rfind('/')
        .map_or("", |separator| &document_path[..=separator]);
    normalize(&format!("{directory}{source}"))
}
