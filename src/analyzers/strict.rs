use std::collections::BTreeMap;
use std::fmt::Display;

use crate::error::AnalysisError;

/// Returns the single most frequent value of `values`.
///
/// A tie for most frequent is a data-quality fault: the error carries every
/// value with its count instead of silently picking one.
pub fn strict_mode<T: Ord + Clone + Display>(column: &str, values: &[T]) -> Result<T, AnalysisError> {
    let mut counts: BTreeMap<&T, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_default() += 1;
    }

    let Some(max) = counts.values().copied().max() else {
        return Err(AnalysisError::EmptyGroup {
            column: column.to_string(),
        });
    };

    let mut modes = counts.iter().filter(|(_, count)| **count == max);
    let first = modes.next().map(|(value, _)| (*value).clone());
    if modes.next().is_some() {
        let mut counts: Vec<(String, usize)> = counts
            .iter()
            .map(|(value, count)| (value.to_string(), *count))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        return Err(AnalysisError::AmbiguousMode {
            column: column.to_string(),
            counts,
        });
    }

    first.ok_or_else(|| AnalysisError::EmptyGroup {
        column: column.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_mode_unique() {
        assert_eq!(strict_mode("stop_sequence", &[3, 3, 3, 5]), Ok(3));
        assert_eq!(strict_mode("stop_sequence", &[7]), Ok(7));
    }

    #[test]
    fn test_strict_mode_tie_is_fault() {
        let err = strict_mode("stop_sequence", &[3, 3, 5, 5]).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::AmbiguousMode {
                column: "stop_sequence".to_string(),
                counts: vec![("3".to_string(), 2), ("5".to_string(), 2)],
            }
        );
        let message = err.to_string();
        assert!(message.contains('3') && message.contains('5'));
    }

    #[test]
    fn test_strict_mode_all_distinct_is_fault() {
        assert!(strict_mode("stop_sequence", &[1, 2]).is_err());
    }

    #[test]
    fn test_strict_mode_empty() {
        let empty: [u32; 0] = [];
        assert!(matches!(
            strict_mode("stop_sequence", &empty),
            Err(AnalysisError::EmptyGroup { .. })
        ));
    }
}
