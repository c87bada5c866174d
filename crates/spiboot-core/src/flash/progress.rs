//! Progress reporting for long-running operations

/// Callback for progress reporting during erase, write and verify
pub trait Progress {
    /// Called when starting an erase covering `total_bytes`
    fn erasing(&mut self, total_bytes: usize);

    /// Called after each erase command completes
    fn erase_progress(&mut self, bytes_erased: usize);

    /// Called when starting to write `total_bytes`
    fn writing(&mut self, total_bytes: usize);

    /// Called after each page is programmed
    fn write_progress(&mut self, bytes_written: usize);

    /// Called when starting to verify `total_bytes`
    fn verifying(&mut self, total_bytes: usize);

    /// Called after each chunk is compared
    fn verify_progress(&mut self, bytes_verified: usize);
}

/// A no-op progress reporter
pub struct NoProgress;

impl Progress for NoProgress {
    fn erasing(&mut self, _total_bytes: usize) {}
    fn erase_progress(&mut self, _bytes_erased: usize) {}
    fn writing(&mut self, _total_bytes: usize) {}
    fn write_progress(&mut self, _bytes_written: usize) {}
    fn verifying(&mut self, _total_bytes: usize) {}
    fn verify_progress(&mut self, _bytes_verified: usize) {}
}
