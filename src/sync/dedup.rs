use crate::model::time_entry::MatchedEntry;

/// True if any existing description starts with `[<source_id>]`.
///
/// The closing bracket is part of the prefix so that `[123]` never matches
/// a description beginning with `[1234]`.
pub fn already_entered<S: AsRef<str>>(candidate: &MatchedEntry, existing_descriptions: &[S]) -> bool {
    let fingerprint = format!("[{}]", candidate.source_id());
    existing_descriptions
        .iter()
        .any(|d| d.as_ref().starts_with(&fingerprint))
}
