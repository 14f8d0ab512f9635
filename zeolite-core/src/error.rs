/// Error for tables that cannot be accepted for decoding.
///
/// Always recoverable: rejecting the input produces no partial state. A
/// table that passes these checks but still violates the format invariants
/// was not produced by a conforming encoder; such violations panic with a
/// `table invariant violated:` message instead of degrading silently.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// The marker slot does not carry the expected format string.
    #[error("unrecognized table marker (expected {expected:?})", expected = crate::table::MARKER)]
    UnrecognizedMarker,
    /// The byte stream is not valid CBOR for a table.
    #[error("malformed table bytes: {0}")]
    Malformed(#[from] ciborium::de::Error<std::io::Error>),
}
