use itertools::Itertools;
use std::collections::TryReserveError;

/// Copies `data` into a new vector, reporting allocation failure instead of
/// aborting.
pub fn try_copy(data: &[u8]) -> Result<Vec<u8>, TryReserveError> {
    let mut copy = Vec::new();
    copy.try_reserve_exact(data.len())?;
    copy.extend_from_slice(data);

    Ok(copy)
}

///
///
///
pub fn to_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).join("")
}
