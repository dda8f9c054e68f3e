//! Small helpers shared across modules.

use strsim::levenshtein;

/// Maximum allowed Levenshtein distance as a percentage of target length for suggestions.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// Closest candidate to `target` by Levenshtein distance.
///
/// Returns `None` when no candidate is within half the target length, or when
/// `target` itself is one of the candidates.
pub fn closest_match<I, S>(target: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut scored: Vec<(String, usize)> = candidates
        .into_iter()
        .map(|candidate| {
            let candidate = candidate.as_ref().to_string();
            let distance = levenshtein(target, &candidate);
            (candidate, distance)
        })
        .collect();
    if scored.iter().any(|(_, distance)| *distance == 0) {
        return None;
    }
    scored.sort_by(|(a, da), (b, db)| da.cmp(db).then_with(|| a.cmp(b)));
    scored
        .into_iter()
        .find(|(_, distance)| *distance <= target.len() * SIMILARITY_THRESHOLD_PERCENT / 100)
        .map(|(candidate, _)| candidate)
}

/// Split an `alias:property` reference.
///
/// Returns `None` unless there are exactly two non-empty parts.
pub fn split_reference(reference: &str) -> Option<(&str, &str)> {
    let mut parts = reference.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(alias), Some(property), None) if !alias.is_empty() && !property.is_empty() => {
            Some((alias, property))
        }
        _ => None,
    }
}
