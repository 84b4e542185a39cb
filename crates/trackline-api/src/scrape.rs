// Token extraction from server-rendered pages and response headers.
//
// The portal's markup is not a contract. Every extractor returns `None`
// on anything unexpected and leaves the logging to the caller.

use reqwest::header::{HeaderMap, LOCATION, SET_COOKIE};
use url::Url;

const CSRF_MARKER: &str = "name=\"csrf-token\" content=\"";

/// Pull the CSRF token out of `<meta name="csrf-token" content="...">`.
pub fn parse_csrf(html: &str) -> Option<String> {
    let start = html.find(CSRF_MARKER)? + CSRF_MARKER.len();
    let rest = html.get(start..)?;
    let end = rest.find('"')?;
    let token = rest.get(..end)?;
    (!token.is_empty()).then(|| token.to_owned())
}

/// Find the named cookie's value in any `Set-Cookie` header.
///
/// `"foo=1; _iadmin=ABC123; path=/"` with name `_iadmin` yields `ABC123`.
pub fn parse_session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let needle = format!("{name}=");
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|raw| {
            let start = raw.find(&needle)? + needle.len();
            let value = raw.get(start..)?.split(';').next()?.trim();
            (!value.is_empty()).then(|| value.to_owned())
        })
}

/// Extract the account id from a redirect to `/users/{account}/...`.
///
/// Relative `Location` values are resolved against `base`, and the path
/// must start with `users` directly below the base path. A bounce to the
/// login page (`/auth/users/sign_in`) is not an account.
pub fn parse_account_redirect(headers: &HeaderMap, base: &Url) -> Option<String> {
    let location = headers.get(LOCATION)?.to_str().ok()?;
    let target = base.join(location).ok()?;
    let relative = target.path().strip_prefix(base.path())?;
    let mut segments = relative.split('/');
    if segments.next()? != "users" {
        return None;
    }
    segments
        .next()
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

/// Heuristic for "the server rendered a page instead of answering the API
/// call" -- what an expired session looks like on a 200.
pub(crate) fn looks_like_html(headers: &HeaderMap, body: &str) -> bool {
    let html_type = headers
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/html"));
    html_type || body.trim_start().starts_with('<')
}
