use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SliceError {
    #[error("both RANGE and HEAD are set; set only one")]
    BothSet,
    #[error("RANGE must be in the form N-M (1-based), got {0:?}")]
    RangeFormat(String),
    #[error("invalid RANGE values start={start}, end={end}; must satisfy 1 <= start <= end")]
    RangeOrder { start: usize, end: usize },
    #[error("RANGE {start}-{end} out of bounds for {total} records")]
    RangeOutOfBounds {
        start: usize,
        end: usize,
        total: usize,
    },
    #[error("HEAD must be between 1 and {total}, got {head}")]
    HeadOutOfBounds { head: usize, total: usize },
}

/// Parses `N-M` or `N:M`, whitespace allowed around each part.
fn parse_range(range: &str) -> Result<(usize, usize), SliceError> {
    let bad = || SliceError::RangeFormat(range.to_string());
    let (start, end) = range.split_once(['-', ':']).ok_or_else(bad)?;
    let number = |part: &str| {
        let part = part.trim();
        if part.is_empty() || !part.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(bad());
        }
        part.parse::<usize>().map_err(|_| bad())
    };
    Ok((number(start)?, number(end)?))
}

/// Selects a 1-based inclusive `range` or the first `head` records.
///
/// A `head` of zero and a blank `range` count as unset. With neither set all
/// records are returned; an empty input is returned as is.
///
/// # Errors
/// Returns `SliceError` if both are set or either is malformed or out of bounds.
pub fn apply_slice<T>(
    mut records: Vec<T>,
    head: Option<usize>,
    range: Option<&str>,
) -> Result<Vec<T>, SliceError> {
    let total = records.len();
    if total == 0 {
        return Ok(records);
    }

    let head = head.filter(|head| *head > 0);
    let range = range.map(str::trim).filter(|range| !range.is_empty());

    match (head, range) {
        (Some(_), Some(_)) => Err(SliceError::BothSet),
        (None, Some(range)) => {
            let (start, end) = parse_range(range)?;
            if start < 1 || end < start {
                return Err(SliceError::RangeOrder { start, end });
            }
            if end > total {
                return Err(SliceError::RangeOutOfBounds { start, end, total });
            }
            info!(start, end, total, "using RANGE (inclusive)");
            records.truncate(end);
            Ok(records.split_off(start - 1))
        }
        (Some(head), None) => {
            if head > total {
                return Err(SliceError::HeadOutOfBounds { head, total });
            }
            info!(head, total, "using HEAD");
            records.truncate(head);
            Ok(records)
        }
        (None, None) => {
            info!(total, "no RANGE/HEAD set; processing all records");
            Ok(records)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers() -> Vec<u32> {
        (1..=10).collect()
    }

    #[test]
    fn selects_inclusive_ranges() {
        assert_eq!(apply_slice(numbers(), None, Some("3-5")).unwrap(), vec![3, 4, 5]);
        assert_eq!(apply_slice(numbers(), None, Some(" 9 : 10 ")).unwrap(), vec![9, 10]);
        assert_eq!(apply_slice(numbers(), None, Some("1-1")).unwrap(), vec![1]);
    }

    #[test]
    fn selects_head_and_all() {
        assert_eq!(apply_slice(numbers(), Some(2), None).unwrap(), vec![1, 2]);
        assert_eq!(apply_slice(numbers(), Some(0), Some("  ")).unwrap().len(), 10);
        assert_eq!(apply_slice(Vec::<u32>::new(), Some(3), Some("x")).unwrap(), Vec::<u32>::new());
    }

    #[test]
    fn rejects_invalid_slices() {
        assert_eq!(apply_slice(numbers(), Some(1), Some("1-2")), Err(SliceError::BothSet));
        assert_eq!(
            apply_slice(numbers(), None, Some("1..2")),
            Err(SliceError::RangeFormat("1..2".to_string()))
        );
        assert_eq!(
            apply_slice(numbers(), None, Some("5-3")),
            Err(SliceError::RangeOrder { start: 5, end: 3 })
        );
        assert_eq!(
            apply_slice(numbers(), None, Some("0-3")),
            Err(SliceError::RangeOrder { start: 0, end: 3 })
        );
        assert_eq!(
            apply_slice(numbers(), None, Some("8-11")),
            Err(SliceError::RangeOutOfBounds {
                start: 8,
                end: 11,
                total: 10
            })
        );
        assert_eq!(
            apply_slice(numbers(), Some(11), None),
            Err(SliceError::HeadOutOfBounds { head: 11, total: 10 })
        );
    }
}
