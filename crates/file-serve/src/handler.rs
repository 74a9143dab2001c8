use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use crate::Error;

/// Where a request URL points to under the served root
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolved {
    /// A regular file, either requested directly or a directory's `index.html`
    File(PathBuf),
    /// A directory without an index page
    Listing {
        dir: PathBuf,
        /// Decoded URL path, always ending in `/`
        url_path: String,
    },
    /// A directory requested without a trailing `/`
    RedirectToSlash(String),
    NotFound,
    /// The URL tried to leave the root
    Forbidden,
}

const INDEX_FILES: &[&str] = &["index.html", "index.htm"];

/// Map a request URL onto the filesystem below `root`
///
/// Nothing outside of `root` is ever returned: `..` segments that climb above it and
/// symlinks leading out of it both resolve to [`Resolved::Forbidden`].
pub fn resolve(root: &Path, url: &str) -> Resolved {
    // strip off any querystrings or fragments so `path.is_file()` matches (querystrings are
    // often used for cachebusting)
    let url = url.split('#').next().unwrap_or_default();
    let (raw_path, query) = url.split_once('?').unwrap_or((url, ""));
    if !raw_path.starts_with('/') {
        return Resolved::NotFound;
    }
    let Ok(decoded) = urlencoding::decode(raw_path) else {
        return Resolved::NotFound;
    };
    if decoded.contains(['\0', '\\']) {
        return Resolved::Forbidden;
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Resolved::Forbidden;
                }
            }
            segment => {
                // reject anything `Path::join` would treat as more than a single name, like
                // drive prefixes
                let mut components = Path::new(segment).components();
                if !matches!(
                    (components.next(), components.next()),
                    (Some(Component::Normal(_)), None)
                ) {
                    return Resolved::Forbidden;
                }
                segments.push(segment);
            }
        }
    }

    let path = segments
        .iter()
        .fold(root.to_path_buf(), |path, segment| path.join(segment));
    let (Ok(canonical_root), Ok(canonical)) = (root.canonicalize(), path.canonicalize()) else {
        return Resolved::NotFound;
    };
    if !canonical.starts_with(&canonical_root) {
        log::debug!("Refusing {url}, {} escapes the root", canonical.display());
        return Resolved::Forbidden;
    }

    let trailing_slash = decoded.ends_with('/');
    if canonical.is_file() {
        if trailing_slash {
            Resolved::NotFound
        } else {
            Resolved::File(canonical)
        }
    } else if canonical.is_dir() {
        let mut url_path = String::from("/");
        for segment in &segments {
            url_path.push_str(segment);
            url_path.push('/');
        }
        if !trailing_slash {
            let mut location = encode_path(&url_path);
            // only carried over when it can go into a header verbatim
            if !query.is_empty() && query.chars().all(|c| c.is_ascii_graphic()) {
                location.push('?');
                location.push_str(query);
            }
            return Resolved::RedirectToSlash(location);
        }
        match INDEX_FILES
            .iter()
            .map(|index| canonical.join(index))
            .find(|index| index.is_file())
        {
            Some(index) => Resolved::File(index),
            None => Resolved::Listing {
                dir: canonical,
                url_path,
            },
        }
    } else {
        Resolved::NotFound
    }
}

/// Render an HTML index of `dir`, shown to the client as `url_path`
pub fn render_listing(dir: &Path, url_path: &str) -> std::io::Result<String> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.path().is_dir() {
            name.push('/');
        }
        entries.push(name);
    }
    entries.sort_by_key(|name| name.to_lowercase());

    let title = format!("Directory listing for {}", html_escape(url_path));
    let mut html = String::new();
    html.push_str("<!DOCTYPE HTML>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{title}</title>\n</head>\n<body>\n"));
    html.push_str(&format!("<h1>{title}</h1>\n<hr>\n<ul>\n"));
    for name in &entries {
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            encode_path(name),
            html_escape(name)
        ));
    }
    html.push_str("</ul>\n<hr>\n</body>\n</html>\n");
    Ok(html)
}

pub(crate) fn static_file_handler(root: &Path, req: tiny_http::Request) -> Result<(), Error> {
    let method = req.method().clone();
    let url = req.url().to_owned();

    let (status, response) = match method {
        tiny_http::Method::Get | tiny_http::Method::Head => respond_to(root, &url)?,
        _ => (
            405,
            html_response("<h1>405: Method not allowed</h1>", 405)
                .with_header(header("Allow: GET, HEAD"))
                .boxed(),
        ),
    };
    req.respond(response)?;
    log::info!("\"{method} {url}\" {status}");

    Ok(())
}

fn respond_to(root: &Path, url: &str) -> Result<(u16, tiny_http::ResponseBox), Error> {
    let response = match resolve(root, url) {
        Resolved::File(path) => {
            let file = match std::fs::File::open(&path) {
                Ok(file) => file,
                Err(err) => {
                    log::debug!("Cannot open {}: {err}", path.display());
                    let body = "<h1>404: Page not found</h1>";
                    return Ok((404, html_response(body, 404).boxed()));
                }
            };
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            let content_type = if mime.type_().as_str() == "text" {
                format!("Content-Type: {mime}; charset=utf-8")
            } else {
                format!("Content-Type: {mime}")
            };
            let response = tiny_http::Response::from_file(file).with_header(header(&content_type));
            (200, response.boxed())
        }
        Resolved::Listing { dir, url_path } => match render_listing(&dir, &url_path) {
            Ok(listing) => (200, html_response(&listing, 200).boxed()),
            Err(err) => {
                log::debug!("Cannot list {}: {err}", dir.display());
                let body = "<h1>404: No permission to list directory</h1>";
                (404, html_response(body, 404).boxed())
            }
        },
        Resolved::RedirectToSlash(location) => {
            let response = tiny_http::Response::empty(301)
                .with_header(header(&format!("Location: {location}")));
            (301, response.boxed())
        }
        Resolved::Forbidden => (403, html_response("<h1>403: Forbidden</h1>", 403).boxed()),
        Resolved::NotFound => (
            404,
            html_response("<h1>404: Page not found</h1>", 404).boxed(),
        ),
    };
    Ok(response)
}

fn html_response(body: &str, status: u16) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    tiny_http::Response::from_string(body)
        .with_status_code(status)
        .with_header(header("Content-Type: text/html; charset=utf-8"))
}

/// Only called with ASCII headers built from constants or percent-encoded paths
fn header(line: &str) -> tiny_http::Header {
    tiny_http::Header::from_str(line).expect("formatted correctly")
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn html_escape(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut last = 0;
    for (i, c) in input.char_indices() {
        let escaped = match c {
            '<' => "&lt;",
            '>' => "&gt;",
            '\'' => "&#39;",
            '"' => "&quot;",
            '&' => "&amp;",
            _ => continue,
        };
        result.push_str(&input[last..i]);
        result.push_str(escaped);
        last = i + 1;
    }
    result.push_str(&input[last..]);
    result
}

#[cfg(test)]
mod test {
    use super::*;

    fn site() -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("index.html"), "<h1>hi</h1>").unwrap();
        std::fs::write(root.path().join("style.css"), "body {}").unwrap();
        std::fs::create_dir(root.path().join("docs")).unwrap();
        std::fs::write(root.path().join("docs").join("a b.txt"), "spaced").unwrap();
        root
    }

    fn canonical(root: &Path, rel: &str) -> PathBuf {
        root.join(rel).canonicalize().unwrap()
    }

    #[test]
    fn resolve_file() {
        let root = site();
        assert_eq!(
            resolve(root.path(), "/style.css"),
            Resolved::File(canonical(root.path(), "style.css"))
        );
    }

    #[test]
    fn resolve_ignores_querystring() {
        let root = site();
        assert_eq!(
            resolve(root.path(), "/style.css?v=42#top"),
            Resolved::File(canonical(root.path(), "style.css"))
        );
    }

    #[test]
    fn resolve_decodes_percent_escapes() {
        let root = site();
        assert_eq!(
            resolve(root.path(), "/docs/a%20b.txt"),
            Resolved::File(canonical(root.path(), "docs/a b.txt"))
        );
    }

    #[test]
    fn resolve_root_uses_index() {
        let root = site();
        assert_eq!(
            resolve(root.path(), "/"),
            Resolved::File(canonical(root.path(), "index.html"))
        );
    }

    #[test]
    fn resolve_directory_without_index_lists() {
        let root = site();
        assert_eq!(
            resolve(root.path(), "/docs/"),
            Resolved::Listing {
                dir: canonical(root.path(), "docs"),
                url_path: "/docs/".to_owned(),
            }
        );
    }

    #[test]
    fn resolve_directory_without_slash_redirects() {
        let root = site();
        assert_eq!(
            resolve(root.path(), "/docs"),
            Resolved::RedirectToSlash("/docs/".to_owned())
        );
    }

    #[test]
    fn resolve_redirect_keeps_querystring() {
        let root = site();
        assert_eq!(
            resolve(root.path(), "/docs?x=1&y=2#top"),
            Resolved::RedirectToSlash("/docs/?x=1&y=2".to_owned())
        );
    }

    #[test]
    fn resolve_missing() {
        let root = site();
        assert_eq!(resolve(root.path(), "/nope.html"), Resolved::NotFound);
        assert_eq!(resolve(root.path(), "/style.css/"), Resolved::NotFound);
    }

    #[test]
    fn resolve_rejects_traversal() {
        let root = site();
        assert_eq!(
            resolve(root.path(), "/../../etc/passwd"),
            Resolved::Forbidden
        );
        assert_eq!(
            resolve(root.path(), "/docs/../../etc/passwd"),
            Resolved::Forbidden
        );
        assert_eq!(
            resolve(root.path(), "/%2e%2e/%2e%2e/etc/passwd"),
            Resolved::Forbidden
        );
        assert_eq!(
            resolve(root.path(), "/..%5c..%5cetc%5cpasswd"),
            Resolved::Forbidden
        );
    }

    #[test]
    fn resolve_normalizes_traversal_within_root() {
        let root = site();
        assert_eq!(
            resolve(root.path(), "/docs/../style.css"),
            Resolved::File(canonical(root.path(), "style.css"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn resolve_rejects_symlink_out_of_root() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "secret").unwrap();
        let root = site();
        std::os::unix::fs::symlink(
            outside.path().join("secret.txt"),
            root.path().join("link.txt"),
        )
        .unwrap();

        assert_eq!(resolve(root.path(), "/link.txt"), Resolved::Forbidden);
    }

    #[cfg(unix)]
    #[test]
    fn listing_is_sorted_and_escaped() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("b.txt"), "").unwrap();
        std::fs::write(root.path().join("A <x>.txt"), "").unwrap();
        std::fs::create_dir(root.path().join("c")).unwrap();

        let listing = render_listing(root.path(), "/").unwrap();
        let a = listing
            .find("<li><a href=\"A%20%3Cx%3E.txt\">A &lt;x&gt;.txt</a></li>")
            .unwrap();
        let b = listing.find("<li><a href=\"b.txt\">b.txt</a></li>").unwrap();
        let c = listing.find("<li><a href=\"c/\">c/</a></li>").unwrap();
        assert!(a < b && b < c);
        assert!(listing.contains("<title>Directory listing for /</title>"));
    }

    #[test]
    fn listing_of_empty_directory() {
        let root = tempfile::tempdir().unwrap();
        let listing = render_listing(root.path(), "/").unwrap();
        assert!(listing.contains("<ul>\n</ul>"));
    }

    #[test]
    fn html_escape_multibyte() {
        assert_eq!(html_escape("é<ü>&"), "é&lt;ü&gt;&amp;");
    }
}
