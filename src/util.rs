use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::req::HttpResponse;
use crate::Result;

pub(crate) fn base64url<T: ?Sized + AsRef<[u8]>>(input: &T) -> String {
    URL_SAFE_NO_PAD.encode(input)
}

pub(crate) fn base64url_decode(input: &str) -> Result<Vec<u8>> {
    // EAB keys are handed out both with and without padding.
    Ok(URL_SAFE_NO_PAD.decode(input.trim_end_matches('='))?)
}

pub(crate) fn read_json<T: DeserializeOwned>(res: &HttpResponse) -> Result<T> {
    let res_body = res.body();
    trace!("{}", res_body);
    Ok(serde_json::from_str(res_body)?)
}

/// `Retry-After` as delta seconds. HTTP-dates are ignored.
pub(crate) fn retry_after(res: &HttpResponse) -> Option<Duration> {
    res.header("retry-after")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Find the target of a `Link` header with the given relation.
pub(crate) fn link_rel(res: &HttpResponse, rel: &str) -> Option<String> {
    let want = format!("rel=\"{}\"", rel);
    res.headers("link")
        .flat_map(|v| v.split(','))
        .find(|link| link.split(';').skip(1).any(|p| p.trim() == want))
        .and_then(|link| {
            let url = link.split(';').next()?.trim();
            Some(url.trim_start_matches('<').trim_end_matches('>').to_string())
        })
}
