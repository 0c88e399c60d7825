//! Request URL splitting.

use indexmap::IndexMap;
use percent_encoding::percent_decode_str;

/// Split a request URL into its host part and decoded query parameters.
///
/// The host is everything before the first `?`. The rest, including any
/// further `?`, is the query string: pairs are separated by `&` and split on
/// the first `=`. Values are percent-decoded; a pair without `=` maps to an
/// empty value. Later duplicates overwrite earlier ones.
pub fn parse_send_url(url: &str) -> (String, IndexMap<String, String>) {
    let Some((host, query)) = url.split_once('?') else {
        return (url.to_string(), IndexMap::new());
    };

    let mut params = IndexMap::new();
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params.insert(key.to_string(), decode_component(value));
    }

    (host.to_string(), params)
}

fn decode_component(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}
