use serde_json::Value;

/// Returns `true` when a looked-up attribute slot holds something usable.
///
/// Absent slots and stored `null` both count as "not present". Falsy but
/// defined values (`0`, `false`, `""`) are present.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use registrar_util::presence::is_present;
///
/// assert!(is_present(Some(&json!(0))));
/// assert!(is_present(Some(&json!(""))));
/// assert!(!is_present(Some(&json!(null))));
/// assert!(!is_present(None));
/// ```
pub fn is_present(slot: Option<&Value>) -> bool {
    matches!(slot, Some(v) if !v.is_null())
}
