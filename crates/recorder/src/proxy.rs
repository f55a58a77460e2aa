use std::str::FromStr;

use reqwest::Proxy;

use crate::RecorderError;

/// Proxy configuration types
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub enum ProxyType {
    /// HTTP proxy
    Http,
    /// HTTPS proxy
    Https,
    /// SOCKS5 proxy
    Socks5,
    /// One proxy for every scheme
    All,
}

impl FromStr for ProxyType {
    type Err = RecorderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(ProxyType::Http),
            "https" => Ok(ProxyType::Https),
            "socks5" => Ok(ProxyType::Socks5),
            "all" => Ok(ProxyType::All),
            other => Err(RecorderError::ProxyError(format!(
                "Invalid proxy type: '{other}'"
            ))),
        }
    }
}

/// Proxy authentication type
#[derive(Debug, Clone)]
pub struct ProxyAuth {
    /// Username for proxy authentication
    pub username: String,
    /// Password for proxy authentication
    pub password: String,
}

/// Proxy configuration
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Proxy server URL (e.g., "http://proxy.example.com:8080")
    pub url: String,
    /// Type of proxy (HTTP, HTTPS, SOCKS5)
    pub proxy_type: ProxyType,
    /// Authentication for the proxy (optional)
    pub auth: Option<ProxyAuth>,
}

/// Build a reqwest Proxy object from our proxy configuration
pub fn build_proxy_from_config(config: &ProxyConfig) -> Result<Proxy, RecorderError> {
    let proxy_url = &config.url;

    let mut proxy = match config.proxy_type {
        ProxyType::Http => Proxy::http(proxy_url)
            .map_err(|e| RecorderError::ProxyError(format!("Invalid HTTP proxy URL: {e}")))?,
        ProxyType::Https => Proxy::https(proxy_url)
            .map_err(|e| RecorderError::ProxyError(format!("Invalid HTTPS proxy URL: {e}")))?,
        ProxyType::Socks5 => {
            let url = if proxy_url.starts_with("socks5://") || proxy_url.starts_with("socks5h://") {
                proxy_url.to_string()
            } else {
                format!("socks5://{proxy_url}")
            };

            Proxy::all(&url)
                .map_err(|e| RecorderError::ProxyError(format!("Invalid SOCKS5 proxy URL: {e}")))?
        }
        ProxyType::All => Proxy::all(proxy_url)
            .map_err(|e| RecorderError::ProxyError(format!("Invalid proxy URL: {e}")))?,
    };

    if let Some(auth) = &config.auth {
        proxy = proxy.basic_auth(&auth.username, &auth.password);
    }

    Ok(proxy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_type_parses_case_insensitively() {
        assert_eq!("SOCKS5".parse::<ProxyType>().unwrap(), ProxyType::Socks5);
        assert_eq!("all".parse::<ProxyType>().unwrap(), ProxyType::All);
        assert!("ftp".parse::<ProxyType>().is_err());
    }

    #[test]
    fn socks5_scheme_is_added_when_missing() {
        let config = ProxyConfig {
            url: "127.0.0.1:1080".to_string(),
            proxy_type: ProxyType::Socks5,
            auth: Some(ProxyAuth {
                username: "user".to_string(),
                password: "pass".to_string(),
            }),
        };
        assert!(build_proxy_from_config(&config).is_ok());
    }
}
