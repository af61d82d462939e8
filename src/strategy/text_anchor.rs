use crate::driver::{DocumentDriver, DriverError, Element};

use super::{AttemptOutcome, StrategyConfigError};

pub(super) fn validate_config(anchor_text: &str) -> Vec<StrategyConfigError> {
    let mut errors = Vec::new();
    if anchor_text.is_empty() {
        errors.push(StrategyConfigError::EmptyField {
            field: "anchor_text",
        });
    }
    errors
}

fn trimmed_eq(candidate: &str, anchor_text: &str, case_sensitive: bool) -> bool {
    let candidate = candidate.trim();
    if case_sensitive {
        candidate == anchor_text
    } else {
        candidate.eq_ignore_ascii_case(anchor_text)
    }
}

/// Depth to the nearest common ancestor, expressed as total edge distance
/// (anchor-to-ancestor plus candidate-to-ancestor).
fn path_distance(anchor_path: &str, candidate_path: &str) -> usize {
    let anchor_segments: Vec<&str> = anchor_path.split('/').collect();
    let candidate_segments: Vec<&str> = candidate_path.split('/').collect();
    let common = anchor_segments
        .iter()
        .zip(candidate_segments.iter())
        .take_while(|(a, b)| a == b)
        .count();
    (anchor_segments.len() - common) + (candidate_segments.len() - common)
}

pub(super) async fn attempt(
    driver: &dyn DocumentDriver,
    anchor_text: &str,
    proximity_selector: Option<&str>,
    case_sensitive: bool,
) -> Result<AttemptOutcome, DriverError> {
    let all = driver.query_all("*").await?;

    let exact = all
        .iter()
        .find(|el| trimmed_eq(&el.text_content, anchor_text, case_sensitive));

    let anchor = match exact {
        Some(anchor) => anchor,
        None => {
            if case_sensitive
                && all
                    .iter()
                    .any(|el| el.text_content.trim().eq_ignore_ascii_case(anchor_text))
            {
                return Ok(AttemptOutcome::no_match("case_sensitivity_mismatch"));
            }
            return Ok(AttemptOutcome::no_match("anchor_not_found"));
        }
    };

    let Some(proximity_selector) = proximity_selector else {
        return Ok(AttemptOutcome::Match(anchor.to_element_info()));
    };

    let candidates = driver.query_all(proximity_selector).await?;
    if candidates.is_empty() {
        return Ok(AttemptOutcome::no_match("no_proximity_match"));
    }

    let nearest = nearest_candidate(anchor, &candidates);
    Ok(AttemptOutcome::Match(nearest.to_element_info()))
}

fn nearest_candidate<'a>(anchor: &Element, candidates: &'a [Element]) -> &'a Element {
    let mut best = &candidates[0];
    let mut best_distance = path_distance(&anchor.dom_path, &best.dom_path);
    for candidate in &candidates[1..] {
        let distance = path_distance(&anchor.dom_path, &candidate.dom_path);
        if distance < best_distance {
            best = candidate;
            best_distance = distance;
        }
    }
    best
}
