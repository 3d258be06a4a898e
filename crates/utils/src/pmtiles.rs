/// Converts a stored tileset URI into a PMTiles URL usable by map clients.
///
/// `s3_host_url` is the public base URL that serves objects from the
/// configured bucket; s3:// URIs cannot be translated without it.
pub fn to_pmtiles_url(uri: Option<&str>, s3_host_url: Option<&str>) -> Option<String> {
    let uri = uri?;

    if uri.is_empty() {
        return None;
    }

    if uri.starts_with("pmtiles://") {
        return Some(uri.to_string());
    }

    if uri.starts_with("http://") || uri.starts_with("https://") {
        return Some(format!("pmtiles://{uri}"));
    }

    if let Some(without_scheme) = uri.strip_prefix("s3://") {
        // First path segment is the bucket; the rest is the object key.
        let key = without_scheme.split_once('/').map(|(_, key)| key)?;

        if key.is_empty() {
            return None;
        }

        let host = s3_host_url?.trim_end_matches('/');
        return Some(format!("pmtiles://{host}/{key}"));
    }

    None
}
