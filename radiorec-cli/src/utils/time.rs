use crate::error::AppError;
use std::fmt::Write;
use std::time::Duration;

/// Parses a recording duration. A bare number is minutes; `s`, `m` and `h`
/// suffixes are accepted.
pub fn parse_duration(time_str: &str) -> Result<Duration, AppError> {
    let time_str = time_str.trim();
    if time_str.is_empty() {
        return Err(AppError::ParseError("Invalid format: empty string".to_string()));
    }

    let split_index = time_str
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit() && *c != '.')
        .map(|(i, _)| i)
        .unwrap_or(time_str.len());

    let numeric_part = &time_str[..split_index];
    let unit_part = time_str[split_index..].trim().to_lowercase();

    let value = numeric_part
        .parse::<f64>()
        .map_err(|_| AppError::ParseError(format!("Invalid number in '{time_str}'")))?;

    let seconds = match unit_part.as_str() {
        "" | "m" => value * 60.0,
        "s" => value,
        "h" => value * 3600.0,
        other => return Err(AppError::ParseError(format!("Invalid unit '{other}'"))),
    };

    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(AppError::ParseError(format!(
            "Duration must be positive, got '{time_str}'"
        )));
    }
    Duration::try_from_secs_f64(seconds)
        .map_err(|_| AppError::ParseError(format!("Duration '{time_str}' is too large")))
}

/// Convert seconds to a human-readable format
pub fn format_duration(seconds: f64) -> String {
    let mut result = String::with_capacity(10);

    // Writing into a String cannot fail.
    if seconds >= 3600.0 {
        let hours = seconds / 3600.0;
        let _ = write!(result, "{hours:.2}h");
    } else if seconds >= 60.0 {
        let minutes = seconds / 60.0;
        let _ = write!(result, "{minutes:.2}m");
    } else {
        let _ = write!(result, "{seconds:.2}s");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_numbers_are_minutes() {
        assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("0.5").unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn units_are_honoured() {
        assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("2 m").unwrap(), Duration::from_secs(120));
    }

    #[test]
    fn invalid_durations_are_rejected() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("0").is_err());
        assert!(parse_duration("10d").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("111111111111111111111").is_err());
    }

    #[test]
    fn durations_are_formatted() {
        assert_eq!(format_duration(30.0), "30.00s");
        assert_eq!(format_duration(90.0), "1.50m");
        assert_eq!(format_duration(5400.0), "1.50h");
    }
}
