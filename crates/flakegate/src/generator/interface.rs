/// A minimal interface for minting 64-bit identifiers.
///
/// Useful for holding a generator behind `Arc<dyn IdGenerator + Send + Sync>`
/// without naming its clock type.
pub trait IdGenerator {
    /// Returns the next identifier. Implementations may block briefly but
    /// never return an error.
    fn generate_id(&self) -> i64;
}
