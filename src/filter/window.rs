use crate::numeric::Sample;

/// Window-API input: the current block preceded by `margin` samples of
/// history carried over from earlier blocks
///
/// The history starts out as empty samples, so the first block behaves as if
/// the stream had been silent before it.
#[derive(Debug, Clone)]
pub struct SampleWindow<T> {
    margin: usize,
    samples: Vec<T>,
}

impl<T: Sample> SampleWindow<T> {
    pub fn new(margin: usize) -> Self {
        Self {
            margin,
            samples: vec![T::empty(); margin],
        }
    }

    /// Replace the current block, keeping the trailing `margin` samples as
    /// history.
    pub fn load(&mut self, block: &[T]) {
        let keep_from = self.samples.len() - self.margin;
        self.samples.drain(..keep_from);
        self.samples.extend_from_slice(block);
    }

    pub fn margin(&self) -> usize {
        self.margin
    }

    pub fn as_slice(&self) -> &[T] {
        &self.samples
    }
}

/// Stream-API input FIFO
///
/// Positions are absolute: position 0 is the first of `lead` empty samples
/// that stand in for time before the stream start. Samples move from the
/// pending queue into residency one load at a time, only when a consumer
/// needs data beyond what is already loaded, and are discarded once no
/// future output can reach them.
#[derive(Debug, Clone)]
pub struct StreamBuffer<T> {
    resident: Vec<T>,
    pending: Vec<T>,
    origin: usize,
    loaded: usize,
    load_size: usize,
}

impl<T: Sample> StreamBuffer<T> {
    pub fn new(lead: usize, load_size: usize) -> Self {
        Self {
            resident: vec![T::empty(); lead],
            pending: Vec::new(),
            origin: 0,
            loaded: lead,
            load_size: load_size.max(1),
        }
    }

    /// Queue newly arrived samples behind everything already queued.
    pub fn push(&mut self, block: &[T]) {
        self.pending.extend_from_slice(block);
    }

    /// One past the last resident position
    pub fn loaded(&self) -> usize {
        self.loaded
    }

    /// Position of the oldest resident sample
    pub fn origin(&self) -> usize {
        self.origin
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Load until every position below `needed` is resident. Returns false
    /// if the queue ran dry first.
    pub fn ensure(&mut self, needed: usize) -> bool {
        while self.loaded < needed {
            if self.pending.is_empty() {
                return false;
            }
            let take = self.load_size.min(self.pending.len());
            self.resident.extend(self.pending.drain(..take));
            self.loaded += take;
        }
        true
    }

    /// Drop resident samples before `position`.
    pub fn discard_before(&mut self, position: usize) {
        let count = position.saturating_sub(self.origin).min(self.resident.len());
        self.resident.drain(..count);
        self.origin += count;
    }

    /// Resident samples; index 0 is position `origin()`
    pub fn as_slice(&self) -> &[T] {
        &self.resident
    }
}

/// Merge two input ports into one sequence, alternating `chunk`-sample runs
/// starting with `first`.
pub fn interleave_chunks<T: Copy>(first: &[T], second: &[T], chunk: usize) -> Vec<T> {
    let chunk = chunk.max(1);
    let mut merged = Vec::with_capacity(first.len() + second.len());
    let mut a = first.chunks(chunk);
    let mut b = second.chunks(chunk);
    loop {
        match (a.next(), b.next()) {
            (None, None) => break,
            (x, y) => {
                merged.extend_from_slice(x.unwrap_or_default());
                merged.extend_from_slice(y.unwrap_or_default());
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_keeps_margin_across_blocks() {
        let mut window = SampleWindow::<i32>::new(3);
        assert_eq!(window.as_slice(), &[0, 0, 0]);

        window.load(&[1, 2, 3, 4]);
        assert_eq!(window.as_slice(), &[0, 0, 0, 1, 2, 3, 4]);

        window.load(&[5, 6, 7, 8]);
        assert_eq!(window.as_slice(), &[2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(window.margin(), 3);
    }

    #[test]
    fn test_stream_loads_only_when_needed() {
        let mut stream = StreamBuffer::<i32>::new(2, 4);
        stream.push(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(stream.loaded(), 2);

        assert!(stream.ensure(2));
        assert_eq!(stream.loaded(), 2);

        assert!(stream.ensure(3));
        assert_eq!(stream.loaded(), 6);
        assert_eq!(stream.as_slice(), &[0, 0, 1, 2, 3, 4]);

        assert!(stream.ensure(12));
        assert_eq!(stream.loaded(), 12);
        assert_eq!(stream.pending(), 0);
        assert!(!stream.ensure(13));
    }

    #[test]
    fn test_stream_discards_consumed_samples() {
        let mut stream = StreamBuffer::<i32>::new(2, 4);
        stream.push(&[1, 2, 3, 4]);
        assert!(stream.ensure(6));
        stream.discard_before(3);
        assert_eq!(stream.origin(), 3);
        assert_eq!(stream.as_slice(), &[2, 3, 4]);
    }

    #[test]
    fn test_interleave_chunks() {
        let merged = interleave_chunks(&[1, 2, 3, 4], &[10, 20, 30, 40], 2);
        assert_eq!(merged, vec![1, 2, 10, 20, 3, 4, 30, 40]);
    }
}
