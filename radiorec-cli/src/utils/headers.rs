use radiorec_engine::parse_header_line;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{info, warn};

const AUTH_TOKEN_HEADER: &str = "x-radiko-authtoken";
const AREA_ID_HEADER: &str = "x-radiko-areaid";

/// Parse a header string in format "Name: Value" and add it to the HeaderMap
pub fn parse_and_add_header(headers: &mut HeaderMap, header_str: &str) {
    match parse_header_line(header_str) {
        Ok((name, value)) => {
            info!("Adding header: {}", name);
            headers.insert(name, value);
        }
        Err(e) => warn!("Ignoring header: {e}"),
    }
}

/// Parse a collection of header strings and return a HeaderMap
pub fn parse_headers(header_strings: &[String]) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for header_str in header_strings {
        parse_and_add_header(&mut headers, header_str);
    }

    headers
}

/// Headers that authenticate every request of a session: the custom
/// headers, then the area id and token when set. Explicit `-H` values win.
pub fn authentication_headers(
    header_strings: &[String],
    area_id: &str,
    auth_token: Option<&str>,
) -> HeaderMap {
    let mut headers = parse_headers(header_strings);

    let extras = [(AREA_ID_HEADER, Some(area_id)), (AUTH_TOKEN_HEADER, auth_token)];
    for (name, value) in extras {
        let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            continue;
        };
        let name = HeaderName::from_static(name);
        if headers.contains_key(&name) {
            continue;
        }
        match HeaderValue::from_str(value) {
            Ok(mut value) => {
                value.set_sensitive(name.as_str() == AUTH_TOKEN_HEADER);
                headers.insert(name, value);
            }
            Err(_) => warn!("Invalid value for header '{}'", name),
        }
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_headers_are_skipped() {
        let headers = parse_headers(&[
            "Referer: https://radiko.jp/".to_string(),
            "garbage".to_string(),
        ]);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("referer").unwrap(), "https://radiko.jp/");
    }

    #[test]
    fn area_and_token_are_added() {
        let headers = authentication_headers(&[], "JP13", Some("secret"));
        assert_eq!(headers.get(AREA_ID_HEADER).unwrap(), "JP13");
        assert_eq!(headers.get(AUTH_TOKEN_HEADER).unwrap(), "secret");
        assert!(headers.get(AUTH_TOKEN_HEADER).unwrap().is_sensitive());
    }

    #[test]
    fn explicit_header_wins_and_empty_values_are_omitted() {
        let headers = authentication_headers(
            &["X-Radiko-AreaId: JP27".to_string()],
            "JP14",
            Some("  "),
        );
        assert_eq!(headers.get(AREA_ID_HEADER).unwrap(), "JP27");
        assert!(!headers.contains_key(AUTH_TOKEN_HEADER));
    }
}
