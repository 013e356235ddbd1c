//! Post-processing of HTML help pages.
//!
//! Root-relative links in help pages point at the help mount as the
//! interpreter sees it. The filter re-roots them relative to the URI the
//! client actually used, so pages keep working when the session is exposed
//! under another path or behind a proxy, and appends the script the help pane
//! uses to track navigation.

/// The script appended to every filtered page.
pub const NAVIGATION_SCRIPT: &str = "<script type=\"text/javascript\">\n\
if (window.parent.helpNavigated)\n   \
window.parent.helpNavigated(document, window);</script>";

const LINK_ATTRIBUTES: [&[u8]; 2] = [b"href=\"/", b"src=\"/"];

/// Compute the base URL for links on a page served at `request_uri` under
/// `mount`: the relative path from the page's directory back to the mount.
///
/// `/help/library/stats/html/lm.html` under `/help` gives `../../..`; a page
/// directly below the mount gives `.`.
pub fn uncomplete(request_uri: &str, mount: &str) -> String {
    let path = match request_uri.find(['?', '#']) {
        Some(pos) => &request_uri[..pos],
        None => request_uri,
    };

    let below_mount = match path.strip_prefix(mount) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => {
            // Mount exposed under a prefix: use the text after its last occurrence.
            let needle = format!("{}/", mount);
            match path.rfind(&needle) {
                Some(pos) => &path[pos + mount.len()..],
                None => return ".".to_string(),
            }
        }
    };

    // Directory segments between the mount and the page itself.
    let depth = below_mount
        .trim_start_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .count()
        .saturating_sub(usize::from(!below_mount.ends_with('/')));

    if depth == 0 {
        ".".to_string()
    } else {
        vec![".."; depth].join("/")
    }
}

/// Post-processing applied to `text/html` bodies served under a mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentFilter {
    /// Content is served as produced.
    Identity,
    /// Help pages: links re-rooted at `base_url`, navigation script appended.
    HelpContents { base_url: String },
}

impl ContentFilter {
    /// Filter for a help page requested at `request_uri`.
    pub fn help_contents(request_uri: &str, mount: &str) -> Self {
        ContentFilter::HelpContents {
            base_url: uncomplete(request_uri, mount),
        }
    }

    pub fn apply(&self, content: Vec<u8>) -> Vec<u8> {
        match self {
            ContentFilter::Identity => content,
            ContentFilter::HelpContents { base_url } => rewrite_html(&content, base_url),
        }
    }
}

/// Rewrite `href="/` and then `src="/` to be relative to `base_url`, and
/// append [`NAVIGATION_SCRIPT`].
///
/// Running the filter again over its own output with the same base changes
/// nothing: links already carrying the base are left alone and the script is
/// only appended once.
pub fn rewrite_html(html: &[u8], base_url: &str) -> Vec<u8> {
    let mut content = html.to_vec();
    for attribute in LINK_ATTRIBUTES {
        content = rewrite_attribute(&content, attribute, base_url.as_bytes());
    }
    if !content.ends_with(NAVIGATION_SCRIPT.as_bytes()) {
        content.extend_from_slice(NAVIGATION_SCRIPT.as_bytes());
    }
    content
}

/// Replace each `attr="/` (pattern ends in `/`) with `attr="<base>/`.
fn rewrite_attribute(input: &[u8], pattern: &[u8], base: &[u8]) -> Vec<u8> {
    let prefix_len = pattern.len() - 1;
    let mut output = Vec::with_capacity(input.len() + 64);
    let mut rest = input;

    while let Some(pos) = find(rest, pattern) {
        let value_start = pos + prefix_len;
        output.extend_from_slice(&rest[..value_start]);

        let value = &rest[value_start..];
        let already_rooted = base.first() == Some(&b'/')
            && value.starts_with(base)
            && value.get(base.len()) == Some(&b'/');
        if !already_rooted {
            output.extend_from_slice(base);
        }

        // Copy the slash so the next search starts past this occurrence.
        output.push(b'/');
        rest = &value[1..];
    }
    output.extend_from_slice(rest);
    output
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}
