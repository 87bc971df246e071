/// Human-readable duration, pluralized per unit: "45 seconds",
/// "2 minutes 5 seconds", "1 hour 1 minute".
pub fn format_duration(seconds: u64) -> String {
    fn plural(n: u64, unit: &str) -> String {
        if n == 1 {
            format!("{} {}", n, unit)
        } else {
            format!("{} {}s", n, unit)
        }
    }

    if seconds < 60 {
        return plural(seconds, "second");
    }
    if seconds < 3600 {
        let minutes = seconds / 60;
        let secs = seconds % 60;
        return if secs == 0 {
            plural(minutes, "minute")
        } else {
            format!("{} {}", plural(minutes, "minute"), plural(secs, "second"))
        };
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    let mut out = plural(hours, "hour");
    if minutes > 0 {
        out = format!("{} {}", out, plural(minutes, "minute"));
    }
    if secs > 0 {
        out = format!("{} {}", out, plural(secs, "second"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_minute_values_are_seconds() {
        assert_eq!(format_duration(0), "0 seconds");
        assert_eq!(format_duration(1), "1 second");
        assert_eq!(format_duration(45), "45 seconds");
    }

    #[test]
    fn minutes_omit_zero_second_remainders() {
        assert_eq!(format_duration(60), "1 minute");
        assert_eq!(format_duration(125), "2 minutes 5 seconds");
        assert_eq!(format_duration(3599), "59 minutes 59 seconds");
    }

    #[test]
    fn hours_append_only_nonzero_parts() {
        assert_eq!(format_duration(3600), "1 hour");
        assert_eq!(format_duration(3660), "1 hour 1 minute");
        assert_eq!(format_duration(7325), "2 hours 2 minutes 5 seconds");
    }
}
