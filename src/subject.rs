//! Groups a validated step list by inferred subject (app, URL host, or file)
//! for diagnostics and the `list_pending`/last-result UI, per the subject
//! extractor the distilled spec dropped but whose grouping is load-bearing
//! for the "multiple apps/sites in one utterance" property.
//!
//! Unlike the keyword-matching original, grouping here is driven entirely by
//! subject-bearing steps (`open_app`, `open_url`, `open_file`) in list order:
//! every step between two subject-bearing steps joins the preceding group.

use crate::types::{Intent, Step, SubjectGroup};

pub struct SubjectExtraction {
    pub groups: Vec<SubjectGroup>,
    /// Diagnostic only: count of " and "/" then " clauses detected in the
    /// raw text. Never used to gate or reorder grouping.
    pub clause_hint: usize,
}

pub fn extract(text: &str, steps: &[Step]) -> SubjectExtraction {
    let clause_hint = count_conjunctions(text);

    if steps.is_empty() {
        return SubjectExtraction { groups: Vec::new(), clause_hint };
    }

    let mut groups: Vec<SubjectGroup> = Vec::new();

    for (idx, step) in steps.iter().enumerate() {
        match subject_for_step(step) {
            Some(subject) => groups.push(SubjectGroup { subject, start_index: idx, member_indices: vec![idx] }),
            None => {
                if let Some(last) = groups.last_mut() {
                    last.member_indices.push(idx);
                } else {
                    groups.push(SubjectGroup { subject: "unknown".to_string(), start_index: idx, member_indices: vec![idx] });
                }
            }
        }
    }

    SubjectExtraction { groups, clause_hint }
}

fn subject_for_step(step: &Step) -> Option<String> {
    match step.intent {
        Intent::OpenApp => step.field_str("app").map(str::to_string),
        Intent::OpenUrl => step.field_str("url").map(registrable_domain),
        Intent::OpenFile => step.field_str("path").map(file_name_component),
        _ => None,
    }
}

fn registrable_domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

fn file_name_component(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

fn count_conjunctions(text: &str) -> usize {
    let lower = text.to_lowercase();
    lower.matches(" and ").count() + lower.matches(" then ").count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(intent: Intent, fields: serde_json::Value) -> Step {
        Step { intent, target: None, fields, resolved_url: None, precomputed: false, defer_open: false }
    }

    #[test]
    fn single_subject_groups_all_steps_together() {
        let steps = vec![
            step(Intent::OpenApp, json!({"app": "Spotify"})),
            step(Intent::KeyCombo, json!({"keys": ["space"]})),
        ];
        let result = extract("play music on spotify", &steps);
        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].subject, "Spotify");
        assert_eq!(result.groups[0].member_indices, vec![0, 1]);
    }

    #[test]
    fn multiple_subjects_split_into_separate_groups_in_order() {
        let steps = vec![
            step(Intent::OpenApp, json!({"app": "Gmail"})),
            step(Intent::OpenApp, json!({"app": "Spotify"})),
            step(Intent::KeyCombo, json!({"keys": ["space"]})),
        ];
        let result = extract("open gmail and spotify", &steps);
        assert_eq!(result.groups.len(), 2);
        assert_eq!(result.groups[0].subject, "Gmail");
        assert_eq!(result.groups[0].start_index, 0);
        assert_eq!(result.groups[1].subject, "Spotify");
        assert_eq!(result.groups[1].member_indices, vec![1, 2]);
        assert_eq!(result.clause_hint, 1);
    }

    #[test]
    fn url_subject_uses_registrable_domain() {
        let steps = vec![step(Intent::OpenUrl, json!({"url": "https://www.youtube.com/watch?v=1"}))];
        let result = extract("open youtube", &steps);
        assert_eq!(result.groups[0].subject, "www.youtube.com");
    }

    #[test]
    fn leading_non_subject_step_falls_back_to_unknown_group() {
        let steps = vec![step(Intent::TypeText, json!({"text": "hi"}))];
        let result = extract("type hi", &steps);
        assert_eq!(result.groups[0].subject, "unknown");
    }
}
