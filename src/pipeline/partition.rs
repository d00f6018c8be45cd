use std::ops::Range;

/// A slice of the video handled by one worker. Frames in
/// `overlap_start..effective_start` only warm the detector window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub overlap_start: usize,
    pub end: usize,
    pub effective_start: usize,
}

impl Chunk {
    pub fn whole(frame_count: usize) -> Self {
        Self {
            overlap_start: 0,
            end: frame_count,
            effective_start: 0,
        }
    }

    pub fn processed(&self) -> Range<usize> {
        self.overlap_start..self.end
    }

    pub fn owned(&self) -> Range<usize> {
        self.effective_start..self.end
    }

    pub fn is_warm_up(&self, index: usize) -> bool {
        index < self.effective_start
    }

    pub fn warm_up_len(&self) -> usize {
        self.effective_start - self.overlap_start
    }
}

/// Splits `0..frame_count` into chunks of `chunk_len` owned frames, each
/// back-extended by `window_size - 1` warm-up frames.
pub fn partition(frame_count: usize, chunk_len: usize, window_size: usize) -> Vec<Chunk> {
    let chunk_len = chunk_len.max(1);
    let overlap = window_size.saturating_sub(1);
    let mut chunks = Vec::with_capacity(frame_count.div_ceil(chunk_len));
    let mut start = 0;
    while start < frame_count {
        let end = (start + chunk_len).min(frame_count);
        chunks.push(Chunk {
            overlap_start: start.saturating_sub(overlap),
            end,
            effective_start: start,
        });
        start = end;
    }
    chunks
}
