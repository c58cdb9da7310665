use crate::error::ChangeError;
use crate::model::ChangeResult;

/// Percentage change from `old` to `new`: `((new - old) / old) * 100`.
///
/// A zero baseline is reported as [`ChangeError::DivideByZero`]; any other
/// input that overflows to an infinity or NaN is [`ChangeError::NonFinite`].
pub fn percent_change(old: f64, new: f64) -> Result<f64, ChangeError> {
    if old == 0.0 {
        return Err(ChangeError::DivideByZero);
    }
    let change = ((new - old) / old) * 100.0;
    if !change.is_finite() {
        return Err(ChangeError::NonFinite);
    }
    Ok(change)
}

/// Compare `new` against `old` and flag whether the move reaches `threshold`.
///
/// The threshold is inclusive: a change of exactly `threshold` percent counts.
pub fn evaluate(
    asset_id: &str,
    old: f64,
    new: f64,
    threshold: f64,
) -> Result<ChangeResult, ChangeError> {
    let percent_change = percent_change(old, new)?;
    Ok(ChangeResult {
        asset_id: asset_id.to_owned(),
        old_price: old,
        new_price: new,
        percent_change,
        exceeded: percent_change.abs() >= threshold,
    })
}
