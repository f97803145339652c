//! Frame/hop windowing over a bounded sample queue (SPEC_FULL.md §4.1).
//!
//! Built on `ringbuf`'s SPSC heap ring rather than a hand-rolled Vec pool,
//! since a single producer (the streaming ingest call) and a single consumer
//! (the frame extraction loop) is exactly what `ringbuf::HeapRb` models.

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// Accumulates incoming samples and yields fixed-size, overlapping analysis
/// frames at a fixed hop. Push order is preserved; frames are drained oldest
/// first and the hop (not the full frame) is discarded after each drain, so
/// consecutive frames overlap by `frame_size - hop_size` samples.
pub struct RingBuffer {
    producer: HeapProd<f32>,
    consumer: HeapCons<f32>,
    frame_size: usize,
    hop_size: usize,
    scratch: Vec<f32>,
}

impl RingBuffer {
    /// `capacity` must be able to hold at least one frame; a few hops of
    /// extra headroom are kept so a momentarily slow consumer never blocks
    /// the producer.
    pub fn new(frame_size: usize, hop_size: usize) -> Self {
        assert!(frame_size > 0, "frame_size must be > 0");
        assert!(hop_size > 0 && hop_size <= frame_size, "0 < hop_size <= frame_size");
        let capacity = frame_size + hop_size * 4;
        let rb = HeapRb::<f32>::new(capacity);
        let (producer, consumer) = rb.split();
        Self {
            producer,
            consumer,
            frame_size,
            hop_size,
            scratch: Vec::with_capacity(frame_size),
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Appends samples, dropping the oldest unread samples on overflow rather
    /// than blocking or erroring — the caller is a realtime ingest path and a
    /// producer that never slows down must win over a reader that fell behind.
    pub fn push_slice(&mut self, samples: &[f32]) {
        let pushed = self.producer.push_slice(samples);
        if pushed < samples.len() {
            let overflow = samples.len() - pushed;
            let to_drop = overflow.min(self.consumer.occupied_len());
            self.consumer.skip(to_drop);
            self.producer.push_slice(&samples[pushed..]);
        }
    }

    pub fn available_frames(&self) -> usize {
        let occupied = self.consumer.occupied_len();
        if occupied < self.frame_size {
            0
        } else {
            (occupied - self.frame_size) / self.hop_size + 1
        }
    }

    /// Copies out the next overlapping frame without consuming it, then
    /// advances the read cursor by exactly one hop. Returns `None` if fewer
    /// than `frame_size` samples are buffered.
    pub fn drain_frame(&mut self) -> Option<&[f32]> {
        if self.consumer.occupied_len() < self.frame_size {
            return None;
        }
        self.scratch.clear();
        let (a, b) = self.consumer.as_slices();
        let mut remaining = self.frame_size;
        for chunk in [a, b] {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(chunk.len());
            self.scratch.extend_from_slice(&chunk[..take]);
            remaining -= take;
        }
        self.consumer.skip(self.hop_size);
        Some(&self.scratch)
    }

    pub fn clear(&mut self) {
        self.consumer.skip(self.consumer.occupied_len());
        self.scratch.clear();
    }

    pub fn pending_len(&self) -> usize {
        self.consumer.occupied_len()
    }

    /// Drains whatever is left when fewer than `frame_size` samples remain,
    /// zero-padding up to `frame_size` so finalize can still extract one
    /// last frame from a partial tail (SPEC_FULL.md §4.7 step 1). Returns
    /// `None` if nothing is pending.
    pub fn drain_final_partial(&mut self) -> Option<Vec<f32>> {
        let pending = self.consumer.occupied_len();
        if pending == 0 {
            return None;
        }
        let mut frame = vec![0.0f32; self.frame_size];
        let (a, b) = self.consumer.as_slices();
        let mut offset = 0;
        for chunk in [a, b] {
            let take = chunk.len().min(frame.len() - offset);
            frame[offset..offset + take].copy_from_slice(&chunk[..take]);
            offset += take;
        }
        self.consumer.skip(pending);
        Some(frame)
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("frame_size", &self.frame_size)
            .field("hop_size", &self.hop_size)
            .field("occupied", &self.consumer.occupied_len())
            .finish()
    }
}
