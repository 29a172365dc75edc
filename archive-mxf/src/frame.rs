//! Frames delivered by track readers.

use crate::types::Rational;
use std::collections::VecDeque;

/// One edit unit (or a run of audio samples) of essence data.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Position in the track's edit rate, origin-relative
    pub position: i64,
    /// Edit rate of `position`
    pub edit_rate: Rational,
    /// Samples contained in `data`
    pub num_samples: u32,
    /// Index temporal offset of the first sample
    pub temporal_offset: i8,
    /// Index key frame offset of the first sample
    pub key_frame_offset: i8,
    /// Index flags of the first sample
    pub flags: u8,
    /// Essence bytes
    pub data: Vec<u8>,
}

impl Frame {
    /// A frame without index information.
    pub fn new(position: i64, edit_rate: Rational, num_samples: u32, data: Vec<u8>) -> Self {
        Frame {
            position,
            edit_rate,
            num_samples,
            temporal_offset: 0,
            key_frame_offset: 0,
            flags: 0,
            data,
        }
    }
}

/// Frames read for one track and not yet consumed.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    frames: VecDeque<Frame>,
    next_position: Option<i64>,
    snapshot: Option<usize>,
}

impl FrameBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame. A position stamped with
    /// [`set_next_frame_position`](Self::set_next_frame_position) overrides
    /// the frame's own position once.
    pub fn push(&mut self, mut frame: Frame) {
        if let Some(position) = self.next_position.take() {
            frame.position = position;
        }
        self.frames.push_back(frame);
    }

    /// Take the oldest frame.
    pub fn pop(&mut self) -> Option<Frame> {
        let frame = self.frames.pop_front();
        if let Some(snapshot) = self.snapshot.as_mut() {
            *snapshot = snapshot.saturating_sub(1);
        }
        frame
    }

    /// The oldest frame.
    pub fn front(&self) -> Option<&Frame> {
        self.frames.front()
    }

    /// The newest frame.
    pub fn back(&self) -> Option<&Frame> {
        self.frames.back()
    }

    /// Buffered frame count.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// No frames buffered.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Drop every buffered frame.
    pub fn clear(&mut self) {
        self.frames.clear();
        self.next_position = None;
        self.snapshot = None;
    }

    /// Position the next pushed frame must carry.
    pub fn set_next_frame_position(&mut self, position: i64) {
        self.next_position = Some(position);
    }

    /// Remember the current length so a failed read can be undone.
    pub fn snapshot(&mut self) {
        self.snapshot = Some(self.frames.len());
    }

    /// Remove frames pushed since the last snapshot.
    pub fn abort(&mut self) {
        if let Some(len) = self.snapshot.take() {
            self.frames.truncate(len);
        }
        self.next_position = None;
    }

    /// Forget the snapshot after a successful read.
    pub fn commit(&mut self) {
        self.snapshot = None;
        self.next_position = None;
    }

    /// Iterate the buffered frames, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }
}
