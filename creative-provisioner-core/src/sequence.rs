//! Sequence allocation for numbered child folders.

use std::sync::OnceLock;

use regex::Regex;

fn leading_digits() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+").expect("static regex"))
}

/// Extracts the integer prefix of a folder name, if the name starts with a digit.
///
/// Runs too long for `u64` saturate at `u64::MAX`.
pub fn leading_number(name: &str) -> Option<u64> {
    let digits = leading_digits().find(name)?.as_str();
    Some(digits.parse::<u64>().unwrap_or(u64::MAX))
}

/// Returns the next unused sequence number for a set of sibling names.
///
/// The result is one more than the largest leading integer found, or 1 when no
/// name starts with a digit.
pub fn next_sequence<I, S>(names: I) -> u64
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .filter_map(|name| leading_number(name.as_ref()))
        .max()
        .unwrap_or(0)
        .saturating_add(1)
}

/// Builds the display name of a newly allocated folder.
pub fn build_folder_name(sequence: u64, creative_name: &str, campaign_period: Option<&str>) -> String {
    match campaign_period.map(str::trim).filter(|p| !p.is_empty()) {
        Some(period) => format!("{sequence} - {creative_name} - {period}"),
        None => format!("{sequence} - {creative_name}"),
    }
}
