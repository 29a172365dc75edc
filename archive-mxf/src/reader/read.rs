//! Reading and seeking the composed tracks.

use super::{MxfFileReader, OpenFile};
use crate::edit_rate::{to_higher, to_lower, Rounding};
use crate::error::{MxfError, Result};
use crate::essence_reader::EssenceReader;
use crate::frame_info::{EndOfEssence, Extraction};
use crate::track_reader::MxfTrackReader;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

impl MxfFileReader {
    /// Read up to `num_samples` edit units into the frame buffers of the
    /// enabled tracks and return the number read.
    ///
    /// 0 is returned at the end of the essence or read limits, and on
    /// failure; [`read_error`](Self::read_error) tells them apart. A
    /// failed read leaves the position and the frame buffers unchanged.
    pub fn read(&mut self, num_samples: u32) -> u32 {
        self.with_logging(|reader| reader.read_logged(num_samples))
    }

    fn read_logged(&mut self, num_samples: u32) -> u32 {
        self.read_error = false;
        self.read_error_message.clear();
        match self.read_internal(num_samples, true) {
            Ok(count) => count,
            Err(e) => {
                warn!(position = self.position(), error = %e, "read failed");
                self.read_error = true;
                self.read_error_message = e.to_string();
                0
            }
        }
    }

    /// Read for this reader or, with `is_top` false, on behalf of a
    /// referencing reader that manages the frame buffer snapshots.
    pub(crate) fn read_internal(&mut self, num_samples: u32, is_top: bool) -> Result<u32> {
        self.ensure_frame_info()?;
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| MxfError::precondition("no file is open"))?;
        let start = file.position;

        if is_top {
            for track in &file.tracks {
                let mut reader = track.reader.borrow_mut();
                if !reader.is_enabled() {
                    continue;
                }
                let position = match track.external {
                    Some(index) => to_higher(start, &file.externals[index].sample_sequence),
                    None => start,
                };
                let buffer = reader.frame_buffer_mut();
                buffer.snapshot();
                buffer.set_next_frame_position(position);
            }
        }

        match read_composed(file, num_samples) {
            Ok(count) => {
                file.position = start + count as i64;
                if is_top {
                    for track in &file.tracks {
                        track.reader.borrow_mut().frame_buffer_mut().commit();
                    }
                }
                Ok(count)
            }
            Err(e) => {
                if is_top {
                    for track in &file.tracks {
                        track.reader.borrow_mut().frame_buffer_mut().abort();
                    }
                }
                file.position = start;
                if let Some(essence_reader) = file.essence_reader.as_mut() {
                    essence_reader.seek(start);
                }
                for external in &file.externals {
                    external
                        .reader
                        .borrow_mut()
                        .seek(to_higher(start, &external.sample_sequence));
                }
                Err(e)
            }
        }
    }

    /// Move to `position`.
    pub fn seek(&mut self, position: i64) {
        self.with_logging(|reader| reader.seek_logged(position));
    }

    fn seek_logged(&mut self, position: i64) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        debug!(position, "seek");
        file.position = position;
        if file.internal_enabled() {
            if let Some(essence_reader) = file.essence_reader.as_mut() {
                essence_reader.seek(position);
            }
        }
        for (index, external) in file.externals.iter().enumerate() {
            if file.external_enabled(index) {
                external
                    .reader
                    .borrow_mut()
                    .seek(to_higher(position, &external.sample_sequence));
            }
        }
    }

    /// Extract in-frame track information once, before the first read.
    ///
    /// Frames are read from the current position and discarded; the
    /// position is restored afterwards. Streams that cannot seek back skip
    /// the extraction.
    fn ensure_frame_info(&mut self) -> Result<()> {
        let max_frames = self.config.max_frame_info_frames;
        let extract = self.config.extract_frame_info;
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        if file.frame_info_done {
            return Ok(());
        }
        for external in &file.externals {
            external.reader.borrow_mut().ensure_frame_info()?;
        }

        let wanted = file
            .internal_tracks
            .iter()
            .any(|track| track.borrow().wants_frame_info());
        let seekable = file
            .essence_reader
            .as_ref()
            .is_some_and(EssenceReader::is_seekable);
        if !(extract && wanted && seekable) {
            if wanted && !seekable {
                debug!("stream is not seekable, skipping frame info extraction");
            }
            finish_frame_info(file);
            return Ok(());
        }

        let result = extract_frame_info(file, max_frames);
        if let Some(essence_reader) = file.essence_reader.as_mut() {
            essence_reader.seek(file.position);
        }
        Self::clear_internal_frame_buffers(file);
        result?;
        finish_frame_info(file);
        Ok(())
    }
}

fn read_composed(file: &mut OpenFile, num_samples: u32) -> Result<u32> {
    let start = file.position;
    if start < file.read_start {
        return Ok(0);
    }
    let mut count = num_samples as i64;
    if file.read_duration >= 0 {
        count = count.min(file.read_start + file.read_duration - start);
    }
    if count <= 0 {
        return Ok(0);
    }

    let mut max_read = 0;
    let internal_enabled = file.internal_enabled();
    if let Some(essence_reader) = file.essence_reader.as_mut().filter(|_| internal_enabled) {
        if essence_reader.position() != start {
            essence_reader.seek(start);
        }
        max_read = essence_reader.read(count as u32)? as i64;
    }

    for (index, external) in file.externals.iter().enumerate() {
        if !file.external_enabled(index) {
            continue;
        }
        let sequence = &external.sample_sequence;
        let external_start = to_higher(start, sequence);
        let external_count = to_higher(start + count, sequence) - external_start;
        let mut reader = external.reader.borrow_mut();
        if reader.position() != external_start {
            debug!(
                expected = external_start,
                actual = reader.position(),
                "resynchronising external reader"
            );
            reader.seek(external_start);
        }
        let read = reader.read_internal(external_count as u32, false)? as i64;
        let clip_read = to_lower(external_start + read, sequence, Rounding::Down) - start;
        max_read = max_read.max(clip_read);
    }
    Ok(max_read as u32)
}

fn finish_frame_info(file: &mut OpenFile) {
    for track in &file.internal_tracks {
        track.borrow_mut().finish_frame_info();
    }
    file.frame_info_done = true;
}

fn extract_frame_info(file: &mut OpenFile, max_frames: u32) -> Result<()> {
    let Some(essence_reader) = file.essence_reader.as_mut() else {
        return Ok(());
    };
    essence_reader.seek(file.position);
    for _ in 0..max_frames {
        match extraction_step(essence_reader, &file.internal_tracks)? {
            Ok(Extraction::Complete) => return Ok(()),
            Ok(Extraction::NeedMore) => {}
            Err(EndOfEssence) => {
                debug!("essence ended during frame info extraction");
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Read one edit unit and offer it to the pending extractors.
fn extraction_step(
    essence_reader: &mut EssenceReader,
    tracks: &[Rc<RefCell<MxfTrackReader>>],
) -> Result<std::result::Result<Extraction, EndOfEssence>> {
    if essence_reader.read(1)? == 0 {
        return Ok(Err(EndOfEssence));
    }

    let mut outcome = Extraction::Complete;
    for track in tracks {
        let mut reader = track.borrow_mut();
        let reader = &mut *reader;
        let frame = reader.frame_buffer_mut().pop();
        let Some(frame) = frame.filter(|_| reader.wants_frame_info()) else {
            continue;
        };
        let Some(mut extractor) = reader.extractor.take() else {
            continue;
        };
        match extractor.extract(&frame, &mut reader.frame_info) {
            Ok(Extraction::Complete) => reader.finish_frame_info(),
            Ok(Extraction::NeedMore) => {
                reader.frame_info_frames += 1;
                reader.extractor = Some(extractor);
                outcome = Extraction::NeedMore;
            }
            Err(e) if reader.frame_info_frames > 0 => {
                warn!(
                    track_id = reader.info().file_track_id,
                    error = %e,
                    "frame info extraction stopped after partial success"
                );
                reader.finish_frame_info();
            }
            Err(e) => {
                reader.extractor = Some(extractor);
                return Err(e);
            }
        }
    }
    Ok(Ok(outcome))
}
