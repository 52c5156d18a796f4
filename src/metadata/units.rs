// Total parsers for free-form resource strings
//
// Runtime attributes arrive as whatever the workflow author wrote: "2",
// "7.5 GB", "8192 MB", "1TB", "true". These parsers never panic and return
// 0 when no numeric prefix exists.

/// Split a leading decimal number (digits with at most one '.') from the rest
fn scan_number(s: &str) -> (Option<f64>, &str) {
    let s = s.trim_start();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;

    for (i, c) in s.char_indices() {
        if c.is_ascii_digit() {
            seen_digit = true;
            end = i + 1;
        } else if c == '.' && !seen_dot {
            seen_dot = true;
            end = i + 1;
        } else {
            break;
        }
    }

    if !seen_digit {
        return (None, s);
    }

    let value = s[..end]
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite());
    (value, &s[end..])
}

/// Parse a CPU request ("2", "0.5", "4 cores"); 0 when unparseable
pub fn parse_cpu(s: &str) -> f64 {
    scan_number(s).0.unwrap_or(0.0)
}

/// Parse a memory request into GB; 0 when unparseable
///
/// `MB` divides by 1024, `TB` multiplies by 1024, `KB` divides twice, and
/// anything else (including no unit) is taken as GB. Binary (`MiB`) and
/// single-letter (`M`) spellings are accepted, case-insensitively.
///
/// # Example
/// ```
/// use runlens::metadata::parse_memory_gb;
///
/// assert_eq!(parse_memory_gb("8192 MB"), 8.0);
/// assert_eq!(parse_memory_gb("1 TB"), 1024.0);
/// assert_eq!(parse_memory_gb("7.5 GB"), 7.5);
/// assert_eq!(parse_memory_gb(""), 0.0);
/// ```
pub fn parse_memory_gb(s: &str) -> f64 {
    let (value, rest) = scan_number(s);
    let Some(value) = value else {
        return 0.0;
    };

    let unit = rest.trim_start();
    match unit.chars().next().map(|c| c.to_ascii_uppercase()) {
        Some('M') => value / 1024.0,
        Some('T') => value * 1024.0,
        Some('K') => value / (1024.0 * 1024.0),
        _ => value,
    }
}

/// Whether a preemptible configuration enables preemptible capacity
///
/// Empty, "false" and "0" mean disabled; anything else means enabled.
pub fn preemptible_enabled(config: &str) -> bool {
    let config = config.trim();
    !(config.is_empty() || config.eq_ignore_ascii_case("false") || config == "0")
}

/// Maximum number of preemptible attempts encoded in a configuration string
///
/// Empty/"false" → 0, "true" → 1, a number → that number, anything else → 0.
pub fn parse_max_preemptible(config: &str) -> u32 {
    let config = config.trim();
    if config.eq_ignore_ascii_case("true") {
        return 1;
    }
    config.parse::<u32>().unwrap_or(0)
}
