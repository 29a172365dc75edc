//! Run-length timecode index.
//!
//! A [`TimecodeIndex`] records the timecode observed at each sequential
//! content package position. Contiguous runs collapse into one element and
//! repeated values become "frozen" elements, so memory grows with the
//! number of timecode discontinuities rather than the number of frames.
//!
//! Positions are implicit: an element's start position is the sum of the
//! durations of every element before it.
//!
//! ```rust
//! use archive_timecode::{FrameRate, Timecode, TimecodeIndex};
//!
//! let mut index = TimecodeIndex::new(16, 25);
//! for frame in 0..50 {
//!     index.add_timecode(&Timecode::from_frame_number(90000 + frame, FrameRate::Fps25, false));
//! }
//! assert_eq!(index.len_elements(), 1);
//!
//! let mut searcher = index.searcher();
//! let tc = searcher.find_timecode(10).unwrap();
//! assert_eq!(tc.to_string(), "01:00:00:10");
//! ```

use crate::smpte::{FrameRate, Timecode};
use serde::{Deserialize, Serialize};

/// Default number of elements per index array block.
pub const DEFAULT_ARRAY_SIZE: usize = 256;

/// Timecode position stored for an absent (invalid) observation.
const INVALID_TIMECODE_POS: i64 = i64::MIN;

/// One run of timecodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimecodeIndexElement {
    /// The same timecode repeats for the whole run.
    pub frozen: bool,
    /// Timecode position of the first frame in the run.
    pub timecode_pos: i64,
    /// Number of content package positions covered.
    pub duration: i64,
}

impl TimecodeIndexElement {
    fn new(timecode_pos: i64) -> Self {
        Self {
            frozen: false,
            timecode_pos,
            duration: 1,
        }
    }

    /// Timecode position at `offset` frames into the run.
    #[must_use]
    pub fn timecode_pos_at(&self, offset: i64) -> i64 {
        if self.frozen || self.timecode_pos == INVALID_TIMECODE_POS {
            self.timecode_pos
        } else {
            self.timecode_pos + offset
        }
    }

    /// Offset of `timecode_pos` in the run when it is at or after `from_offset`.
    fn offset_of(&self, timecode_pos: i64, from_offset: i64) -> Option<i64> {
        if from_offset >= self.duration {
            return None;
        }
        if self.frozen {
            (self.timecode_pos == timecode_pos).then_some(from_offset)
        } else if timecode_pos >= self.timecode_pos + from_offset
            && timecode_pos < self.timecode_pos + self.duration
        {
            Some(timecode_pos - self.timecode_pos)
        } else {
            None
        }
    }
}

/// Fixed capacity block of index elements.
#[derive(Debug, Clone)]
pub struct TimecodeIndexArray {
    elements: Vec<TimecodeIndexElement>,
}

impl TimecodeIndexArray {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            elements: Vec::with_capacity(capacity),
        }
    }

    /// Elements in this block.
    #[must_use]
    pub fn elements(&self) -> &[TimecodeIndexElement] {
        &self.elements
    }
}

/// Append-only run-length index from position to timecode.
#[derive(Debug, Clone)]
pub struct TimecodeIndex {
    array_size: usize,
    rounded_tc_base: u32,
    drop_frame: bool,
    arrays: Vec<TimecodeIndexArray>,
}

impl TimecodeIndex {
    /// Create an empty index.
    ///
    /// `array_size` is the element capacity of each block (at least 1);
    /// `rounded_tc_base` is the nominal frames per second used to turn
    /// timecodes into positions.
    #[must_use]
    pub fn new(array_size: usize, rounded_tc_base: u32) -> Self {
        Self {
            array_size: array_size.max(1),
            rounded_tc_base,
            drop_frame: false,
            arrays: Vec::new(),
        }
    }

    /// Rounded timecode base the index was created with.
    #[must_use]
    pub fn rounded_tc_base(&self) -> u32 {
        self.rounded_tc_base
    }

    /// Whether the most recently added timecode was drop-frame.
    #[must_use]
    pub fn drop_frame(&self) -> bool {
        self.drop_frame
    }

    /// Element capacity of each block.
    #[must_use]
    pub fn array_size(&self) -> usize {
        self.array_size
    }

    /// Append the timecode observed at the next position.
    pub fn add_timecode(&mut self, timecode: &Timecode) {
        let timecode_pos = if timecode.is_valid() {
            self.drop_frame = timecode.drop_frame;
            timecode.to_position(self.rounded_tc_base)
        } else {
            INVALID_TIMECODE_POS
        };

        if let Some(last) = self.arrays.last_mut().and_then(|a| a.elements.last_mut()) {
            let next = last.timecode_pos.saturating_add(last.duration);
            if !last.frozen && timecode_pos == next && timecode_pos != INVALID_TIMECODE_POS {
                last.duration += 1;
                return;
            }
            if timecode_pos == last.timecode_pos && (last.frozen || last.duration == 1) {
                last.frozen = true;
                last.duration += 1;
                return;
            }
        }

        let needs_array = self
            .arrays
            .last()
            .map_or(true, |a| a.elements.len() >= self.array_size);
        if needs_array {
            self.arrays
                .push(TimecodeIndexArray::with_capacity(self.array_size));
        }
        if let Some(array) = self.arrays.last_mut() {
            array.elements.push(TimecodeIndexElement::new(timecode_pos));
        }
    }

    /// True when the index holds no usable timecode.
    ///
    /// That is an empty index, or a single frozen run of 00:00:00:00 which
    /// is what sources without timecode produce.
    #[must_use]
    pub fn is_null(&self) -> bool {
        let mut elements = self.elements();
        match (elements.next(), elements.next()) {
            (None, _) => true,
            (Some(first), None) => first.frozen && first.timecode_pos == 0 && first.duration > 1,
            _ => false,
        }
    }

    /// True when no timecode was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    /// Total number of elements across all blocks.
    #[must_use]
    pub fn len_elements(&self) -> usize {
        self.arrays.iter().map(|a| a.elements.len()).sum()
    }

    /// Total number of positions covered.
    #[must_use]
    pub fn duration(&self) -> i64 {
        self.elements().map(|e| e.duration).sum()
    }

    /// Iterate over all elements in position order.
    pub fn elements(&self) -> impl Iterator<Item = &TimecodeIndexElement> + '_ {
        self.arrays.iter().flat_map(|a| a.elements.iter())
    }

    /// Index blocks in position order.
    #[must_use]
    pub fn arrays(&self) -> &[TimecodeIndexArray] {
        &self.arrays
    }

    /// Remove every element.
    pub fn clear(&mut self) {
        self.arrays.clear();
    }

    /// A searcher positioned before the first element.
    #[must_use]
    pub fn searcher(&self) -> TimecodeIndexSearcher<'_> {
        TimecodeIndexSearcher::new(self)
    }

    fn element(&self, array_num: usize, element_num: usize) -> Option<&TimecodeIndexElement> {
        self.arrays
            .get(array_num)
            .and_then(|a| a.elements.get(element_num))
    }

    fn next_element_index(&self, array_num: usize, element_num: usize) -> Option<(usize, usize)> {
        let array = self.arrays.get(array_num)?;
        if element_num + 1 < array.elements.len() {
            Some((array_num, element_num + 1))
        } else if self
            .arrays
            .get(array_num + 1)
            .is_some_and(|a| !a.elements.is_empty())
        {
            Some((array_num + 1, 0))
        } else {
            None
        }
    }

    pub(crate) fn to_timecode(&self, timecode_pos: i64) -> Timecode {
        let frame_rate = FrameRate::from_rounded_base(self.rounded_tc_base, self.drop_frame);
        if timecode_pos == INVALID_TIMECODE_POS {
            return Timecode::invalid(frame_rate);
        }
        Timecode::from_position(timecode_pos, self.rounded_tc_base, self.drop_frame)
    }
}

impl Default for TimecodeIndex {
    fn default() -> Self {
        Self::new(DEFAULT_ARRAY_SIZE, 25)
    }
}

/// Forward-only cursor over a [`TimecodeIndex`].
///
/// Searchers are plain values: copy one to snapshot it and assign it back
/// to roll back. A failed query never moves the cursor.
#[derive(Debug, Clone, Copy)]
pub struct TimecodeIndexSearcher<'a> {
    index: &'a TimecodeIndex,
    array_num: usize,
    element_num: usize,
    element_offset: i64,
    position: i64,
    at_end: bool,
    before_start: bool,
    matched_at_cursor: bool,
}

impl<'a> TimecodeIndexSearcher<'a> {
    /// Create a searcher positioned before the first element.
    #[must_use]
    pub fn new(index: &'a TimecodeIndex) -> Self {
        Self {
            index,
            array_num: 0,
            element_num: 0,
            element_offset: 0,
            position: 0,
            at_end: false,
            before_start: true,
            matched_at_cursor: false,
        }
    }

    /// Return to the initial state.
    pub fn reset(&mut self) {
        *self = Self::new(self.index);
    }

    /// The index being searched.
    #[must_use]
    pub fn index(&self) -> &'a TimecodeIndex {
        self.index
    }

    /// Current cursor position.
    #[must_use]
    pub fn position(&self) -> i64 {
        self.position
    }

    /// No query has succeeded yet.
    #[must_use]
    pub fn before_start(&self) -> bool {
        self.before_start
    }

    /// The cursor was moved past the last element.
    #[must_use]
    pub fn at_end(&self) -> bool {
        self.at_end
    }

    /// Element under the cursor.
    #[must_use]
    pub fn current_element(&self) -> Option<&'a TimecodeIndexElement> {
        if self.at_end {
            return None;
        }
        self.index.element(self.array_num, self.element_num)
    }

    /// Position of the first frame of the element under the cursor.
    #[must_use]
    pub fn current_element_start(&self) -> i64 {
        self.position - self.element_offset
    }

    /// Timecode at `position`, moving the cursor there.
    ///
    /// `position` must not be before the cursor.
    pub fn find_timecode(&mut self, position: i64) -> Option<Timecode> {
        let timecode_pos = self.find_timecode_pos(position)?;
        Some(self.index.to_timecode(timecode_pos))
    }

    /// Like [`find_timecode`](Self::find_timecode) but returns the raw
    /// timecode position.
    pub fn find_timecode_pos(&mut self, position: i64) -> Option<i64> {
        let moved = self.located(position)?;
        *self = moved;
        self.current_element()
            .map(|e| e.timecode_pos_at(self.element_offset))
    }

    /// Move the cursor to `position` without reading the timecode.
    pub fn move_to(&mut self, position: i64) -> bool {
        match self.located(position) {
            Some(moved) => {
                *self = moved;
                true
            }
            None => false,
        }
    }

    /// Move the cursor to the first frame of the next element.
    pub fn move_to_next_element(&mut self) -> bool {
        let Some(element) = self.current_element() else {
            return false;
        };
        let Some((array_num, element_num)) = self
            .index
            .next_element_index(self.array_num, self.element_num)
        else {
            return false;
        };
        self.position += element.duration - self.element_offset;
        self.array_num = array_num;
        self.element_num = element_num;
        self.element_offset = 0;
        self.before_start = false;
        self.matched_at_cursor = false;
        true
    }

    /// Position of `timecode` at or after the cursor, moving the cursor there.
    ///
    /// A value equal to the one under the cursor is accepted on the first
    /// query and after any cursor move other than a previous successful
    /// `find_position`. Repeating a query therefore walks forward through
    /// a frozen run one frame at a time.
    pub fn find_position(&mut self, timecode: &Timecode) -> Option<i64> {
        if !timecode.is_valid() {
            return None;
        }
        let timecode_pos = timecode.to_position(self.index.rounded_tc_base);
        self.find_position_of(timecode_pos)
    }

    /// Like [`find_position`](Self::find_position) for a raw timecode position.
    pub fn find_position_of(&mut self, timecode_pos: i64) -> Option<i64> {
        if timecode_pos == INVALID_TIMECODE_POS || self.at_end {
            return None;
        }

        let mut array_num = self.array_num;
        let mut element_num = self.element_num;
        let mut element_start = self.current_element_start();
        let mut from_offset = if self.before_start || !self.matched_at_cursor {
            self.element_offset
        } else {
            self.element_offset + 1
        };

        loop {
            let element = self.index.element(array_num, element_num)?;
            if let Some(offset) = element.offset_of(timecode_pos, from_offset) {
                self.array_num = array_num;
                self.element_num = element_num;
                self.element_offset = offset;
                self.position = element_start + offset;
                self.before_start = false;
                self.matched_at_cursor = true;
                return Some(self.position);
            }

            let (next_array, next_element) =
                self.index.next_element_index(array_num, element_num)?;
            element_start += element.duration;
            array_num = next_array;
            element_num = next_element;
            from_offset = 0;
        }
    }

    pub(crate) fn mark_matched(&mut self) {
        self.matched_at_cursor = true;
    }

    /// Copy of the cursor moved to `position`, or `None` when `position`
    /// is behind the cursor or past the end of the index.
    fn located(&self, position: i64) -> Option<Self> {
        if position < 0 || self.at_end {
            return None;
        }
        if position < self.position && !self.before_start {
            return None;
        }

        let mut moved = *self;
        if moved.before_start {
            moved.array_num = 0;
            moved.element_num = 0;
            moved.element_offset = 0;
            moved.position = 0;
        }

        loop {
            let element = moved.index.element(moved.array_num, moved.element_num)?;
            let offset = moved.element_offset + (position - moved.position);
            if offset < element.duration {
                moved.element_offset = offset;
                moved.position = position;
                break;
            }
            let (array_num, element_num) = moved
                .index
                .next_element_index(moved.array_num, moved.element_num)?;
            moved.position += element.duration - moved.element_offset;
            moved.array_num = array_num;
            moved.element_num = element_num;
            moved.element_offset = 0;
        }

        moved.before_start = false;
        moved.matched_at_cursor = false;
        Some(moved)
    }
}
