/// Stall / tenant extraction from the portal's free-text unit labels
///
/// Labels are typed by hand on the portal side and come in many shapes:
/// "Stpl.242 / TNr 271", "STPL 12 Tn 4", "stpl242 TNR7". Extraction never fails;
/// an absent marker yields an empty string.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static STALL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Stpl.??\s*(\d+)").expect("stall pattern is valid"));
static TENANT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)TnR?\s*(\d+)").expect("tenant pattern is valid"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StallIdentifier {
    pub stall_code: String,
    pub tenant_number: String,
}

impl StallIdentifier {
    pub fn new(stall_code: impl Into<String>, tenant_number: impl Into<String>) -> Self {
        Self {
            stall_code: stall_code.into(),
            tenant_number: tenant_number.into(),
        }
    }

    /// Both stall code and tenant number were found.
    pub fn is_complete(&self) -> bool {
        !self.stall_code.is_empty() && !self.tenant_number.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.stall_code.is_empty() && self.tenant_number.is_empty()
    }
}

/// Extract stall code and tenant number from a unit label.
///
/// The stall marker is `Stpl`, one optional separator, then digits. Unlike a
/// greedy `Stpl.?\s*(\d+)`, a missing separator never consumes the first
/// digit: "stpl242" gives "242".
///
/// # Examples
///
/// ```
/// use evohaus_parking::meter::extract_identifier;
///
/// let id = extract_identifier("Stpl.242 / TNr 271");
/// assert_eq!(id.stall_code, "242");
/// assert_eq!(id.tenant_number, "271");
///
/// let none = extract_identifier("no markers here");
/// assert!(none.is_empty());
/// ```
pub fn extract_identifier(label: &str) -> StallIdentifier {
    StallIdentifier {
        stall_code: first_capture(&STALL_RE, label),
        tenant_number: first_capture(&TENANT_RE, label),
    }
}

fn first_capture(re: &Regex, text: &str) -> String {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}
