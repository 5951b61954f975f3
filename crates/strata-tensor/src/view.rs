//! Logical views over sample positions
//!
//! A [`View`] is a list of [`Selector`]s applied left to right. Each selector
//! picks from the positions produced by the previous one, using Python
//! indexing rules: negative indices count from the end, slices clamp, and
//! a negative step walks backwards.

use crate::{TensorError, TensorResult};

/// One indexing step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Single position
    Index(i64),
    /// `start:stop:step`, each bound optional
    Slice {
        /// First index (inclusive)
        start: Option<i64>,
        /// Last index (exclusive)
        stop: Option<i64>,
        /// Stride, never zero
        step: Option<i64>,
    },
    /// Fancy indexing; duplicates allowed
    List(Vec<i64>),
    /// Keep positions whose flag is set; length must match
    Mask(Vec<bool>),
}

impl Selector {
    /// `start..stop` with step 1
    pub fn range(start: i64, stop: i64) -> Self {
        Selector::Slice {
            start: Some(start),
            stop: Some(stop),
            step: None,
        }
    }

    /// Slice with optional bounds
    pub fn slice(start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Self {
        Selector::Slice { start, stop, step }
    }

    /// Every position, in order
    pub fn all() -> Self {
        Selector::Slice {
            start: None,
            stop: None,
            step: None,
        }
    }

    /// Select from `positions`
    pub fn apply(&self, positions: &[usize]) -> TensorResult<Vec<usize>> {
        let n = positions.len();
        match self {
            Selector::Index(i) => Ok(vec![positions[wrap(*i, n)?]]),
            Selector::Slice { start, stop, step } => Ok(slice_indices(n, *start, *stop, *step)?
                .into_iter()
                .map(|i| positions[i])
                .collect()),
            Selector::List(indices) => indices
                .iter()
                .map(|&i| wrap(i, n).map(|i| positions[i]))
                .collect(),
            Selector::Mask(mask) => {
                if mask.len() != n {
                    return Err(TensorError::InvalidArgument(format!(
                        "mask of length {} applied to {n} samples",
                        mask.len()
                    )));
                }
                Ok(positions
                    .iter()
                    .zip(mask)
                    .filter_map(|(&p, &keep)| keep.then_some(p))
                    .collect())
            }
        }
    }
}

/// Resolve a possibly negative index against `n`
fn wrap(index: i64, n: usize) -> TensorResult<usize> {
    let len = n as i64;
    let resolved = if index < 0 { index + len } else { index };
    if resolved < 0 || resolved >= len {
        return Err(TensorError::IndexOutOfRange { index, length: n });
    }
    Ok(resolved as usize)
}

/// Python `slice(start, stop, step).indices(n)` expanded into indices
fn slice_indices(
    n: usize,
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
) -> TensorResult<Vec<usize>> {
    let len = n as i64;
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(TensorError::InvalidArgument(
            "slice step cannot be zero".to_string(),
        ));
    }

    // clamp bounds the way Python does: [0, len] going forward, [-1, len-1] going back
    let (lower, upper) = if step > 0 { (0, len) } else { (-1, len - 1) };
    let clamp = |bound: i64| {
        let bound = if bound < 0 { bound + len } else { bound };
        bound.clamp(lower, upper)
    };
    let start = start.map_or(if step > 0 { lower } else { upper }, clamp);
    let stop = stop.map_or(if step > 0 { upper } else { lower }, clamp);

    let mut out = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        out.push(i as usize);
        match i.checked_add(step) {
            Some(next) => i = next,
            None => break,
        }
    }
    Ok(out)
}

/// Ordered composition of selectors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct View {
    selectors: Vec<Selector>,
}

impl View {
    /// The identity view
    pub fn new() -> Self {
        Self::default()
    }

    /// This view followed by `selector`
    pub fn then(&self, selector: Selector) -> Self {
        let mut selectors = self.selectors.clone();
        selectors.push(selector);
        Self { selectors }
    }

    /// Selectors in application order
    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    /// Whether the view selects everything in order
    pub fn is_identity(&self) -> bool {
        self.selectors.is_empty()
    }

    /// Positions selected from `0..len`
    pub fn resolve(&self, len: usize) -> TensorResult<Vec<usize>> {
        let mut positions: Vec<usize> = (0..len).collect();
        for selector in &self.selectors {
            positions = selector.apply(&positions)?;
        }
        Ok(positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(selectors: &[Selector], len: usize) -> TensorResult<Vec<usize>> {
        selectors
            .iter()
            .fold(View::new(), |view, s| view.then(s.clone()))
            .resolve(len)
    }

    #[test]
    fn test_identity() {
        assert_eq!(View::new().resolve(4).unwrap(), vec![0, 1, 2, 3]);
        assert!(View::new().is_identity());
    }

    #[test]
    fn test_index() {
        assert_eq!(resolve(&[Selector::Index(2)], 5).unwrap(), vec![2]);
        assert_eq!(resolve(&[Selector::Index(-1)], 5).unwrap(), vec![4]);
        assert!(matches!(
            resolve(&[Selector::Index(5)], 5),
            Err(TensorError::IndexOutOfRange { index: 5, length: 5 })
        ));
        assert!(resolve(&[Selector::Index(-6)], 5).is_err());
    }

    #[test]
    fn test_slices_match_python() {
        // (start, stop, step) -> list(range(10))[start:stop:step]
        let cases: &[(Option<i64>, Option<i64>, Option<i64>, &[usize])] = &[
            (Some(2), Some(7), None, &[2, 3, 4, 5, 6]),
            (None, None, Some(3), &[0, 3, 6, 9]),
            (Some(-3), None, None, &[7, 8, 9]),
            (None, None, Some(-1), &[9, 8, 7, 6, 5, 4, 3, 2, 1, 0]),
            (Some(8), Some(2), Some(-2), &[8, 6, 4]),
            (Some(-2), Some(-8), Some(-3), &[8, 5]),
            (Some(20), None, Some(-4), &[9, 5, 1]),
            (Some(5), Some(100), None, &[5, 6, 7, 8, 9]),
            (Some(7), Some(2), None, &[]),
            (Some(-100), Some(2), None, &[0, 1]),
        ];
        for &(start, stop, step, expected) in cases {
            let got = resolve(&[Selector::slice(start, stop, step)], 10).unwrap();
            assert_eq!(got, expected, "[{start:?}:{stop:?}:{step:?}]");
        }
        assert!(matches!(
            resolve(&[Selector::slice(None, None, Some(0))], 10),
            Err(TensorError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_extreme_steps() {
        let view = View::new().then(Selector::slice(Some(1), None, Some(i64::MAX)));
        assert_eq!(view.resolve(10).unwrap(), vec![1]);

        let view = View::new().then(Selector::slice(None, None, Some(i64::MIN)));
        assert_eq!(view.resolve(10).unwrap(), vec![9]);

        let view = View::new().then(Selector::slice(Some(i64::MIN), Some(i64::MAX), Some(i64::MAX)));
        assert_eq!(view.resolve(10).unwrap(), vec![0]);
    }

    #[test]
    fn test_list_and_mask() {
        assert_eq!(
            resolve(&[Selector::List(vec![3, 0, 3, -1])], 5).unwrap(),
            vec![3, 0, 3, 4]
        );
        assert!(resolve(&[Selector::List(vec![0, 9])], 5).is_err());

        let mask = vec![true, false, true, false];
        assert_eq!(resolve(&[Selector::Mask(mask)], 4).unwrap(), vec![0, 2]);
        assert!(resolve(&[Selector::Mask(vec![true])], 4).is_err());
    }

    #[test]
    fn test_composition() {
        // [1:9][::-2][[0, 0, 2]]
        let selectors = [
            Selector::range(1, 9),
            Selector::slice(None, None, Some(-2)),
            Selector::List(vec![0, 0, 2]),
        ];
        assert_eq!(resolve(&selectors, 12).unwrap(), vec![8, 8, 4]);

        // indices of a later selector are relative to the earlier result
        let selectors = [Selector::range(5, 10), Selector::Index(-1)];
        assert_eq!(resolve(&selectors, 20).unwrap(), vec![9]);
    }

    #[test]
    fn test_empty_length() {
        assert!(resolve(&[Selector::all()], 0).unwrap().is_empty());
        assert!(resolve(&[Selector::Index(0)], 0).is_err());
    }
}
