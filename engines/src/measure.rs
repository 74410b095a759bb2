//! Labeled-value scanning over benchmark tool output
//!
//! Every engine reads its numbers the same way: a regex anchored on the
//! label the tool prints, with the value in the first capture group.

use regex::Regex;

/// First numeric capture of `label` in `text`
///
/// `None` when the label is absent or its capture is not a number.
pub fn measure(label: &Regex, text: &str) -> Option<f64> {
    label
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Like [`measure`], falling back to `default` when the label is absent
pub fn measure_or(label: &Regex, text: &str, default: f64) -> f64 {
    measure(label, text).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label() -> Regex {
        Regex::new(r"Complete requests:\s+([0-9.]+)").unwrap()
    }

    #[test]
    fn test_measure_reads_first_capture() {
        let text = "Complete requests:      12500\nFailed requests:        0\n";
        assert_eq!(measure(&label(), text), Some(12500.0));
    }

    #[test]
    fn test_measure_absent_label() {
        assert_eq!(measure(&label(), "Failed requests: 3"), None);
    }

    #[test]
    fn test_measure_zero_is_present() {
        assert_eq!(measure(&label(), "Complete requests: 0"), Some(0.0));
    }

    #[test]
    fn test_measure_or_default() {
        assert_eq!(measure_or(&label(), "", 7.0), 7.0);
        assert_eq!(measure_or(&label(), "Complete requests: 5", 7.0), 5.0);
    }

    #[test]
    fn test_measure_unparsable_capture() {
        let dotted = Regex::new(r"Rate:\s+([0-9.]+)").unwrap();
        assert_eq!(measure(&dotted, "Rate: 1.2.3"), None);
    }
}
