use std::time::Duration;

use chrono_tz::Tz;
use radiorec_engine::{ProxyAuth, ProxyConfig, ProxyType, RecorderConfig};
use tracing::info;

use crate::{cli::CliArgs, error::AppError};

/// Resolve the proxy flags into an explicit proxy and the system proxy switch.
pub fn proxy_settings(args: &CliArgs) -> Result<(Option<ProxyConfig>, bool), AppError> {
    if args.no_proxy {
        info!("All proxy settings disabled (--no-proxy flag)");
        return Ok((None, false));
    }

    if let Some(proxy_url) = args.proxy.as_ref() {
        let proxy_type: ProxyType = args.proxy_type.parse()?;

        let auth = match (&args.proxy_user, &args.proxy_pass) {
            (Some(username), Some(password)) => Some(ProxyAuth {
                username: username.clone(),
                password: password.clone(),
            }),
            (None, None) => None,
            _ => {
                return Err(AppError::InvalidInput(
                    "--proxy-user and --proxy-pass must be given together".to_string(),
                ));
            }
        };

        info!(
            proxy_url = %proxy_url,
            proxy_type = ?proxy_type,
            has_auth = auth.is_some(),
            "Using explicit proxy configuration for downloads"
        );

        return Ok((
            Some(ProxyConfig {
                url: proxy_url.clone(),
                proxy_type,
                auth,
            }),
            false,
        ));
    }

    if args.use_system_proxy {
        info!("Using system proxy settings for downloads");
        Ok((None, true))
    } else {
        info!("No proxy settings configured for downloads");
        Ok((None, false))
    }
}

/// Build the recorder configuration from the command line.
pub fn recorder_config(args: &CliArgs) -> Result<RecorderConfig, AppError> {
    let timezone: Tz = args
        .timezone
        .parse()
        .map_err(|_| AppError::InvalidInput(format!("Unknown timezone '{}'", args.timezone)))?;

    let (proxy, use_system_proxy) = proxy_settings(args)?;

    let mut builder = RecorderConfig::builder()
        .with_timeout(Duration::from_secs(args.timeout))
        .with_connect_timeout(Duration::from_secs(args.connect_timeout))
        .with_master_url(args.master_url.clone())
        .with_poll_interval(Duration::from_secs(args.poll_interval))
        .with_retry_delay(Duration::from_secs(args.retry_delay))
        .with_playlist_refresh_interval(
            (args.refresh_interval > 0).then(|| Duration::from_secs(args.refresh_interval)),
        )
        .with_reresolve_after_failures(args.reresolve_after)
        .with_download_concurrency(args.concurrency)
        .with_segment_backend(args.segment_backend)
        .with_concat_backend(args.concat_backend)
        .with_ffmpeg_path(args.ffmpeg_path.clone())
        .with_output_extension(args.extension.clone())
        .with_timezone(timezone);

    builder = match proxy {
        Some(proxy) => builder.with_proxy(proxy),
        None => builder.with_system_proxy(use_system_proxy),
    };

    let config = builder.build();
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use radiorec_engine::ConcatBackend;

    fn parse(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["radiorec", "TBS", "news", "30"];
        argv.extend_from_slice(extra);
        CliArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_produce_valid_config() {
        let config = recorder_config(&parse(&[])).unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.retry_delay, Duration::from_secs(3));
        assert_eq!(config.timezone, chrono_tz::Asia::Tokyo);
        assert_eq!(config.playlist_refresh_interval, Some(Duration::from_secs(600)));
    }

    #[test]
    fn zero_refresh_interval_disables_refresh() {
        let config = recorder_config(&parse(&["--refresh-interval", "0"])).unwrap();
        assert_eq!(config.playlist_refresh_interval, None);
    }

    #[test]
    fn native_concat_into_m4a_is_rejected() {
        assert!(recorder_config(&parse(&["-e", "m4a"])).is_err());
        let config =
            recorder_config(&parse(&["-e", "m4a", "--concat-backend", "ffmpeg"])).unwrap();
        assert_eq!(config.concat_backend, ConcatBackend::Ffmpeg);
    }

    #[test]
    fn explicit_proxy_overrides_system_proxy() {
        let args = parse(&["--proxy", "socks5://127.0.0.1:1080", "--proxy-type", "socks5"]);
        let (proxy, use_system) = proxy_settings(&args).unwrap();
        assert_eq!(proxy.unwrap().proxy_type, ProxyType::Socks5);
        assert!(!use_system);

        let (proxy, use_system) = proxy_settings(&parse(&["--no-proxy"])).unwrap();
        assert!(proxy.is_none());
        assert!(!use_system);
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        assert!(recorder_config(&parse(&["--timezone", "Mars/Olympus"])).is_err());
    }
}
