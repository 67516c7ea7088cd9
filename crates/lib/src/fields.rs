//! Required-field validation shared by the inbound and outbound pipelines.

use std::collections::HashMap;

/// Fields a vendor delivery notification must carry.
pub const INBOUND_FIELDS: &[&str] = &[
    "sender",
    "receiver",
    "msgdata",
    "recvtime",
    "msgid",
    "operator",
];

/// Fields an outbound bus message must carry before a send is attempted.
pub const OUTBOUND_FIELDS: &[&str] = &["from_addr", "to_addr", "content"];

/// Split a parsed field map into the expected sub-map and the names that are
/// missing or empty. Absence is data, not an error: this never fails.
pub fn split_fields(
    values: &HashMap<String, String>,
    expected: &[&str],
) -> (HashMap<String, String>, Vec<String>) {
    let mut found = HashMap::new();
    let mut missing = Vec::new();
    for &name in expected {
        match values.get(name).filter(|v| !v.is_empty()) {
            Some(value) => {
                found.insert(name.to_string(), value.clone());
            }
            None => missing.push(name.to_string()),
        }
    }
    missing.sort();
    (found, missing)
}
