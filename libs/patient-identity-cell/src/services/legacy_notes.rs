use std::sync::OnceLock;

use regex::Regex;

/// Older bookings named the treated patient inline in `notes`, e.g.
/// `就診者：SENG HANG LEI\n預約原因：心理諮詢`. Best effort only.
const DECLARED_PATIENT_PATTERN: &str = r"就診者：([^\r\n]*)";

fn declared_patient_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(DECLARED_PATIENT_PATTERN).expect("declared patient pattern is valid")
    })
}

/// Returns the name following the first `就診者：` label, up to the end of its line.
pub fn extract_declared_patient(notes: &str) -> Option<String> {
    let captures = declared_patient_regex().captures(notes)?;
    let name = captures.get(1)?.as_str().trim();

    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
