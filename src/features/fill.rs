/// Replace missing cells with the nearest preceding value
pub fn forward_fill(values: &mut [Option<f64>]) {
    let mut last = None;
    for cell in values.iter_mut() {
        match *cell {
            Some(v) => last = Some(v),
            None => *cell = last,
        }
    }
}

/// Replace missing cells with the nearest following value
pub fn back_fill(values: &mut [Option<f64>]) {
    let mut next = None;
    for cell in values.iter_mut().rev() {
        match *cell {
            Some(v) => next = Some(v),
            None => *cell = next,
        }
    }
}

/// Forward fill, then back fill whatever is still missing at the start.
///
/// The order matters: interior gaps take the preceding value, only the
/// leading run takes a following one.
pub fn fill_missing(values: &mut [Option<f64>]) {
    forward_fill(values);
    back_fill(values);
}
