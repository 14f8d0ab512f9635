use zeolite_core::FormatError;

/// Errors converting between JSON and codec values.
#[derive(Debug, thiserror::Error)]
pub enum JsonError {
    /// The value graph is cyclic; JSON cannot express cycles.
    #[error("cyclic value has no JSON form")]
    Cycle,
    /// The value kind has no JSON counterpart.
    #[error("{0} has no JSON form")]
    Unrepresentable(&'static str),
    /// NaN and infinities are not JSON numbers.
    #[error("non-finite number {0} has no JSON form")]
    NonFiniteNumber(f64),
    /// The table was rejected before conversion could start.
    #[error(transparent)]
    Format(#[from] FormatError),
}
