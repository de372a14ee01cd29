// File: src/models/choice.rs

/// One entry in a config-UI dropdown: stable id plus display label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceEntry {
    pub id: String,
    pub label: String,
}

impl ChoiceEntry {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Sort by label, drop duplicate ids, optionally prepend synthetic entries
/// (e.g. a "Current scene" default).
pub fn build_choices(
    mut entries: Vec<ChoiceEntry>,
    head: &[ChoiceEntry],
) -> Vec<ChoiceEntry> {
    entries.sort_by(|a, b| a.label.to_lowercase().cmp(&b.label.to_lowercase()));
    let mut seen = std::collections::HashSet::new();
    let mut out: Vec<ChoiceEntry> = head.to_vec();
    for e in head {
        seen.insert(e.id.clone());
    }
    for e in entries {
        if seen.insert(e.id.clone()) {
            out.push(e);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_deduped_with_head() {
        let head = [ChoiceEntry::new("current", "Current")];
        let out = build_choices(
            vec![
                ChoiceEntry::new("b", "beta"),
                ChoiceEntry::new("a", "Alpha"),
                ChoiceEntry::new("b", "beta again"),
            ],
            &head,
        );
        let ids: Vec<&str> = out.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["current", "a", "b"]);
    }
}
