//! Content fingerprints for change detection.
//!
//! Only the semantic fields of a task feed the hash. Moving a task to
//! another line or file leaves its fingerprint alone; path changes are
//! detected separately by the ledger.

use sha2::{Digest, Sha256};

use super::Task;

/// Length of the hex prefix used for synthetic ids.
const SYNTHETIC_ID_LEN: usize = 8;

/// Longest label name GitHub accepts.
pub const MAX_LABEL_LEN: usize = 50;

/// Hex characters of the digest kept in a shortened label.
const LABEL_DIGEST_LEN: usize = 8;

/// Feed a length-prefixed field so adjacent fields cannot run together.
fn update_field(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

/// Compute the content hash of a task.
///
/// The digest covers id, title, description, status and the requirements
/// in sorted order. The result is always 64 lowercase hex characters.
///
/// # Example
///
/// ```
/// use specsync::task::{generate_content_hash, parse_tasks};
///
/// let a = parse_tasks("- [ ] 1 Task", "specs/a/tasks.md");
/// let b = parse_tasks("\n\n- [ ] 1 Task", "specs/a/other.md");
/// assert_eq!(generate_content_hash(&a[0]), generate_content_hash(&b[0]));
/// assert_eq!(generate_content_hash(&a[0]).len(), 64);
/// ```
#[must_use]
pub fn generate_content_hash(task: &Task) -> String {
    let mut requirements: Vec<&str> = task.requirements.iter().map(String::as_str).collect();
    requirements.sort_unstable();

    let mut hasher = Sha256::new();
    update_field(&mut hasher, &task.id);
    update_field(&mut hasher, &task.title);
    match &task.description {
        Some(description) => {
            hasher.update([1u8]);
            update_field(&mut hasher, description);
        }
        None => hasher.update([0u8]),
    }
    update_field(&mut hasher, task.status.as_str());
    hasher.update((requirements.len() as u64).to_le_bytes());
    for requirement in requirements {
        update_field(&mut hasher, requirement);
    }

    hex::encode(hasher.finalize())
}

/// Check if two tasks carry the same semantic content.
#[must_use]
pub fn are_equivalent(a: &Task, b: &Task) -> bool {
    generate_content_hash(a) == generate_content_hash(b)
}

/// Collapse runs of whitespace so reformatting alone keeps the id stable.
fn canonical(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build a deterministic id for a task that has no explicit one.
///
/// The id is `t-` plus the first eight hex characters of a SHA-256 over the
/// spec group, the title and the whitespace-normalised description, so the
/// same content always maps to the same id across runs.
///
/// # Example
///
/// ```
/// use specsync::task::synthetic_id;
///
/// let id = synthetic_id("docs", "Write guide", None);
/// assert_eq!(id, synthetic_id("docs", "Write   guide", None));
/// assert_ne!(id, synthetic_id("api", "Write guide", None));
/// assert!(id.starts_with("t-"));
/// ```
#[must_use]
pub fn synthetic_id(spec_group: &str, title: &str, description: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    update_field(&mut hasher, spec_group);
    update_field(&mut hasher, &canonical(title));
    update_field(&mut hasher, &canonical(description.unwrap_or_default()));
    let digest = hex::encode(hasher.finalize());
    format!("t-{}", &digest[..SYNTHETIC_ID_LEN])
}

/// Build `prefix` + `value` as a label that fits GitHub's length limit.
///
/// Labels within [`MAX_LABEL_LEN`] characters come back unchanged. Longer
/// ones keep the prefix and the start of `value`, followed by `~` and a
/// digest of the full value, so distinct values stay distinct and the same
/// value always yields the same label.
///
/// # Example
///
/// ```
/// use specsync::task::{bounded_label, MAX_LABEL_LEN};
///
/// assert_eq!(bounded_label("spec:", "core"), "spec:core");
///
/// let long = bounded_label("task:", "user-authentication-session-management-rework/1.1");
/// assert_eq!(long.chars().count(), MAX_LABEL_LEN);
/// assert!(long.starts_with("task:user-authentication"));
/// ```
#[must_use]
pub fn bounded_label(prefix: &str, value: &str) -> String {
    let full = format!("{}{}", prefix, value);
    if full.chars().count() <= MAX_LABEL_LEN {
        return full;
    }

    let digest = hex::encode(Sha256::digest(value.as_bytes()));
    let keep = MAX_LABEL_LEN.saturating_sub(prefix.chars().count() + LABEL_DIGEST_LEN + 1);
    let head: String = value.chars().take(keep).collect();
    format!("{}{}~{}", prefix, head, &digest[..LABEL_DIGEST_LEN])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;

    fn task() -> Task {
        Task {
            id: "1.1".to_string(),
            title: "Create models".to_string(),
            description: Some("- define structs".to_string()),
            status: TaskStatus::NotStarted,
            file_path: "specs/core/tasks.md".to_string(),
            line_number: 3,
            spec_group: "core".to_string(),
            requirements: vec!["1.2".to_string(), "1.1".to_string()],
        }
    }

    #[test]
    fn test_hash_is_fixed_length_hex() {
        let hash = generate_content_hash(&task());
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_ignores_location() {
        let original = task();
        let mut moved = task();
        moved.file_path = "specs/elsewhere/tasks.md".to_string();
        moved.line_number = 99;
        assert_eq!(generate_content_hash(&original), generate_content_hash(&moved));
        assert!(are_equivalent(&original, &moved));
    }

    #[test]
    fn test_hash_changes_with_semantic_fields() {
        let base = generate_content_hash(&task());

        let mut changed = task();
        changed.title = "Create model types".to_string();
        assert_ne!(base, generate_content_hash(&changed));

        let mut changed = task();
        changed.description = None;
        assert_ne!(base, generate_content_hash(&changed));

        let mut changed = task();
        changed.status = TaskStatus::Completed;
        assert_ne!(base, generate_content_hash(&changed));

        let mut changed = task();
        changed.requirements.push("3.1".to_string());
        assert_ne!(base, generate_content_hash(&changed));

        let mut changed = task();
        changed.id = "1.2".to_string();
        assert_ne!(base, generate_content_hash(&changed));
    }

    #[test]
    fn test_hash_ignores_requirement_order() {
        let mut reordered = task();
        reordered.requirements.reverse();
        assert!(are_equivalent(&task(), &reordered));
    }

    #[test]
    fn test_empty_description_differs_from_none() {
        let mut none = task();
        none.description = None;
        let mut empty = task();
        empty.description = Some(String::new());
        assert!(!are_equivalent(&none, &empty));
    }

    #[test]
    fn test_synthetic_id_depends_on_description() {
        let a = synthetic_id("core", "Task", Some("first"));
        let b = synthetic_id("core", "Task", Some("second"));
        assert_ne!(a, b);
        assert_eq!(a, synthetic_id("core", "Task", Some("  first ")));
    }

    #[test]
    fn test_bounded_label_keeps_short_labels() {
        assert_eq!(bounded_label("task:", "core/1"), "task:core/1");
        let exact = format!("spec:{}", "g".repeat(MAX_LABEL_LEN - 5));
        assert_eq!(bounded_label("spec:", &"g".repeat(MAX_LABEL_LEN - 5)), exact);
    }

    #[test]
    fn test_bounded_label_shortens_long_values() {
        let group = "user-authentication-session-management-rework";
        let first = bounded_label("task:", &format!("{}/1.1", group));
        let second = bounded_label("task:", &format!("{}/1.2", group));

        assert_eq!(first.chars().count(), MAX_LABEL_LEN);
        assert_eq!(second.chars().count(), MAX_LABEL_LEN);
        assert_ne!(first, second);
        assert_eq!(first, bounded_label("task:", &format!("{}/1.1", group)));
        assert!(bounded_label("spec:", group).chars().count() <= MAX_LABEL_LEN);
    }

    #[test]
    fn test_bounded_label_counts_characters() {
        let label = bounded_label("spec:", &"é".repeat(60));
        assert_eq!(label.chars().count(), MAX_LABEL_LEN);
    }
}
