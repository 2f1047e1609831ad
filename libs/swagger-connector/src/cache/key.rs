use url::{Url, form_urlencoded};

use crate::request::RequestContext;

/// Path plus query of `url`, without scheme and host.
fn path_and_query(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => match parsed.query() {
            Some(query) => format!("{}?{query}", parsed.path()),
            None => parsed.path().to_owned(),
        },
        Err(_) => url.to_owned(),
    }
}

/// Cache key for a request: `"<path+query>;<headers>"`.
///
/// Only GET requests (method compared case-insensitively) are cacheable; every
/// other method yields `None`. Headers are form-encoded in insertion order, so
/// header variations such as `Accept-Language` produce distinct keys.
#[must_use]
pub fn cache_key(req: &RequestContext) -> Option<String> {
    if !req.method.as_str().eq_ignore_ascii_case("get") {
        return None;
    }
    let headers = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(req.headers.iter())
        .finish();
    Some(format!("{};{headers}", path_and_query(&req.url)))
}
