pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Failures of clock corrections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// An earlier staged update never completed, the pending bit stayed set
    #[cfg_attr(feature = "std", error("staged clock update did not complete in time"))]
    UpdateTimeout,
}
