//! Batch sizes that keep a thumbnail grid filled with whole rows.

/// Size of the very first request for an album.
pub const INITIAL_BATCH: u32 = 5;

/// Grid columns for a viewport width in CSS pixels.
pub fn columns_for_width(width_px: u32) -> u32 {
    match width_px {
        0..=639 => 4,
        640..=1023 => 6,
        1024..=1439 => 8,
        _ => 10,
    }
}

/// Two full rows per request.
pub fn batch_for_width(width_px: u32) -> u32 {
    columns_for_width(width_px) * 2
}
