//! Human-readable byte counts.

const KIB: f64 = 1024.0;

/// Units above bytes, largest first, with their thresholds.
const UNITS: [(&str, i32); 8] = [
    ("YB", 8),
    ("ZB", 7),
    ("EB", 6),
    ("PB", 5),
    ("TB", 4),
    ("GB", 3),
    ("MB", 2),
    ("KB", 1),
];

/// Pretty print a size in bytes, base 1024, three significant digits.
///
/// The first unit whose threshold is strictly exceeded wins, so a value
/// sitting exactly on a threshold prints in the unit below it:
///
/// ```
/// use h5view::format_size;
///
/// assert_eq!(format_size(500.0), "500 B");
/// assert_eq!(format_size(1024.0), "1.02e+03 B");
/// assert_eq!(format_size(1025.0), "1 KB");
/// assert_eq!(format_size(40_000.0), "39.1 KB");
/// ```
pub fn format_size(num_bytes: f64) -> String {
    for (unit, power) in UNITS {
        let threshold = KIB.powi(power);
        if num_bytes > threshold {
            return format!("{} {unit}", format_significant(num_bytes / threshold, 3));
        }
    }
    format!("{} B", format_significant(num_bytes, 3))
}

/// Format `value` with `digits` significant digits, C `%g` style.
///
/// Trailing zeros are dropped; exponent notation is used when the decimal
/// exponent is below -4 or at least `digits`.
fn format_significant(value: f64, digits: usize) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{value}");
    }
    let digits = digits.max(1);
    // Round first: the exponent of the rounded value decides the notation.
    let sci = format!("{:.*e}", digits - 1, value);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exponent < -4 || exponent >= digits as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{sign}{:02}",
            strip_zeros(mantissa),
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (digits as i32 - 1 - exponent).max(0) as usize;
        strip_zeros(&format!("{value:.decimals$}")).to_string()
    }
}

fn strip_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_values_are_bytes() {
        assert_eq!(format_size(0.0), "0 B");
        assert_eq!(format_size(1.0), "1 B");
        assert_eq!(format_size(480.0), "480 B");
        assert_eq!(format_size(999.0), "999 B");
    }

    #[test]
    fn threshold_is_strict() {
        // 1024 is not > 1024: stays in bytes and needs an exponent at 3 digits.
        assert_eq!(format_size(1024.0), "1.02e+03 B");
        assert_eq!(format_size(1025.0), "1 KB");
        assert_eq!(format_size(1024.0 * 1024.0), "1.02e+03 KB");
        assert_eq!(format_size(1024.0 * 1024.0 + 1.0), "1 MB");
    }

    #[test]
    fn every_unit_is_reachable() {
        let expected = ["KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];
        for (i, unit) in expected.iter().enumerate() {
            let n = 1.5 * KIB.powi(i as i32 + 1);
            assert_eq!(format_size(n), format!("1.5 {unit}"));
        }
    }

    #[test]
    fn three_significant_digits() {
        assert_eq!(format_size(40_000.0), "39.1 KB");
        assert_eq!(format_size(40_480.0), "39.5 KB");
        assert_eq!(format_size(1536.0), "1.5 KB");
        assert_eq!(format_size(10.0 * 1024.0 * 1024.0 * 1024.0), "10 GB");
    }

    #[test]
    fn unit_choice_is_monotonic() {
        fn rank(s: &str) -> usize {
            let unit = s.rsplit(' ').next().unwrap_or("");
            ["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"]
                .iter()
                .position(|u| *u == unit)
                .unwrap()
        }
        let mut last = 0;
        let mut n = 1.0_f64;
        while n < 1e27 {
            let r = rank(&format_size(n));
            assert!(r >= last, "unit went down at {n}");
            last = r;
            n *= 1.7;
        }
    }

    #[test]
    fn significant_formatting() {
        assert_eq!(format_significant(0.5, 3), "0.5");
        assert_eq!(format_significant(0.000_012_34, 3), "1.23e-05");
        assert_eq!(format_significant(123.456, 3), "123");
        assert_eq!(format_significant(1234.0, 3), "1.23e+03");
        assert_eq!(format_significant(99.96, 3), "100");
    }
}
