/*
    efmdec
    https://github.com/dbalsom/efmdec

    Copyright 2024 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    src/framer/mod.rs

    The F3 framer: a state machine that locates T11+T11 frame sync patterns
    in the incoming T-value stream, maintains lock on the 588-bit frame
    cadence, and emits one demodulated F3 frame per frame window.

*/

//! Frame synchronization over the T-value stream.
//!
//! The frame sync pattern is the only place two maximum-length runs (T11)
//! occur back to back, which makes it cheap to find in run-length data
//! without demodulating anything. Once locked, the framer expects a sync
//! every 588 channel bits and classifies each window against that
//! expectation, shifting the window or dropping a transition to ride out
//! localized noise. Sixteen consecutive poor syncs abandon the lock and
//! restart the initial search.
//!
//! The framer is purely sequential: it owns a growing input buffer and an
//! implicit position cursor, so a pipeline instance must not be shared
//! between threads without external synchronization.

use crate::{
    demod::{DemodStatistics, EfmDemodulator, FRAME_CHANNEL_BITS},
    types::F3Frame,
};
use std::collections::VecDeque;

/// A sync is declared lost after this many consecutive poor sync windows.
const MAX_POOR_SYNCS: u32 = 16;
/// Initial lock gives up after searching this many channel bits.
const INITIAL_SEARCH_BITS: u32 = (FRAME_CHANNEL_BITS * 4) as u32;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
enum FramerState {
    #[default]
    Initial,
    FindInitialSync1,
    FindInitialSync2,
    FindSecondSync,
    ProcessFrame,
    SyncLost,
}

/// How a steady-state frame window lined up against the expected 588-bit
/// cadence. Produced by [`classify_sync`], which is pure so the recovery
/// policy can be tested without a stream attached.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SyncClass {
    /// Window is exactly 588 bits.
    Valid,
    /// Window length is off but a valid sync pattern sits in the expected
    /// place - the frame contains a corrupt T-value internally.
    ValidWithBadT,
    /// A sync-like pattern sits one transition before the expected place.
    ShiftBack,
    /// Window length is off by less than one minimum run; nothing smarter
    /// to do than accept it.
    PoorAccept,
    /// Window length is off by a full run or more; shift the window edge in
    /// an attempt to re-align.
    PoorShift,
}

/// Classify a steady-state sync window. `window` must contain at least two
/// T-values beyond index `i`; `i` is the index of the first T-value after
/// 588 accumulated bits and `t_total` the accumulated bit count.
pub fn classify_sync(window: &VecDeque<u8>, i: usize, t_total: u32) -> (SyncClass, usize) {
    if t_total == 588 {
        return (SyncClass::Valid, i);
    }

    if window[i] == 11 && window[i + 1] == 11 {
        // Sync is where it should be; the length error is inside the frame
        (SyncClass::ValidWithBadT, i)
    }
    else if i > 0 && window[i - 1] == 11 && window[i] == 11 {
        (SyncClass::ShiftBack, i - 1)
    }
    else if i > 0 && window[i - 1] >= 10 && window[i] >= 10 {
        // Sync-like pattern (degraded T11s) one transition early
        (SyncClass::ShiftBack, i - 1)
    }
    else if t_total.abs_diff(588) < 3 {
        (SyncClass::PoorAccept, i)
    }
    else {
        let end = if t_total > 588 && i > 0 { i - 1 } else { i };
        (SyncClass::PoorShift, end)
    }
}

/// Statistics maintained by the [`F3Framer`].
#[derive(Copy, Clone, Debug, Default)]
pub struct FramerStatistics {
    pub valid_syncs: u64,
    pub overshoot_syncs: u64,
    pub undershoot_syncs: u64,
    pub valid_frames: u64,
    pub undershoot_frames: u64,
    pub overshoot_frames: u64,
    pub sync_losses: u64,
}

impl FramerStatistics {
    pub fn total_frames(&self) -> u64 {
        self.valid_frames + self.undershoot_frames + self.overshoot_frames
    }
}

/// Recovers F3 frame boundaries from a stream of T-values and demodulates
/// each 588-bit window into an [`F3Frame`].
pub struct F3Framer {
    buffer: VecDeque<u8>,
    state: FramerState,
    end_sync: usize,
    poor_sync_count: u32,
    waiting_for_data: bool,
    demod: EfmDemodulator,
    output: VecDeque<F3Frame>,
    stats: FramerStatistics,
}

impl Default for F3Framer {
    fn default() -> Self {
        F3Framer {
            buffer: VecDeque::new(),
            state: FramerState::Initial,
            end_sync: 0,
            poor_sync_count: 0,
            waiting_for_data: false,
            demod: EfmDemodulator::new(),
            output: VecDeque::new(),
            stats: Default::default(),
        }
    }
}

impl F3Framer {
    pub fn new() -> Self {
        Default::default()
    }

    /// Append T-values to the input buffer and run the state machine until
    /// it stalls waiting for more data. Demodulated frames accumulate in
    /// the output queue; drain them with [`F3Framer::next_frame`].
    pub fn push_tvalues(&mut self, tvalues: &[u8]) {
        self.buffer.extend(tvalues.iter().copied());

        self.waiting_for_data = false;
        while !self.waiting_for_data {
            self.state = match self.state {
                FramerState::Initial => FramerState::FindInitialSync1,
                FramerState::FindInitialSync1 => self.find_initial_sync_1(),
                FramerState::FindInitialSync2 => self.find_initial_sync_2(),
                FramerState::FindSecondSync => self.find_second_sync(),
                FramerState::ProcessFrame => self.process_frame(),
                FramerState::SyncLost => self.sync_lost(),
            };
        }
    }

    /// Pop the next demodulated frame, if any.
    pub fn next_frame(&mut self) -> Option<F3Frame> {
        self.output.pop_front()
    }

    pub fn pending_frames(&self) -> usize {
        self.output.len()
    }

    /// Discard all buffered input and return to the initial sync search.
    pub fn flush(&mut self) {
        self.buffer.clear();
        self.output.clear();
        self.state = FramerState::Initial;
        self.end_sync = 0;
        self.poor_sync_count = 0;
    }

    pub fn statistics(&self) -> &FramerStatistics {
        &self.stats
    }

    pub fn demod_statistics(&self) -> &DemodStatistics {
        self.demod.statistics()
    }

    // State machine methods ------------------------------------------------

    /// Search the buffer for the first T11+T11 sync pattern, discarding
    /// everything before it.
    fn find_initial_sync_1(&mut self) -> FramerState {
        let mut start_sync = None;
        for i in 0..self.buffer.len().saturating_sub(1) {
            if self.buffer[i] == 11 && self.buffer[i + 1] == 11 {
                start_sync = Some(i);
                break;
            }
        }

        match start_sync {
            Some(start) => {
                log::trace!("F3Framer::find_initial_sync_1(): Initial sync found at buffer position {start}");
                self.buffer.drain(..start);
                FramerState::FindInitialSync2
            }
            None => {
                // Discard the T-values already tested and wait for more
                let keep_from = self.buffer.len().saturating_sub(1);
                self.buffer.drain(..keep_from);
                self.waiting_for_data = true;
                FramerState::FindInitialSync1
            }
        }
    }

    /// Confirm the lock by finding a second sync pattern exactly one frame
    /// after the first. Gives up and rescans if nothing turns up within a
    /// few frame lengths.
    fn find_initial_sync_2(&mut self) -> FramerState {
        let mut end_sync = None;
        let mut t_total: u32 = 11;

        for i in 1..self.buffer.len().saturating_sub(1) {
            if self.buffer[i] == 11 && self.buffer[i + 1] == 11 {
                end_sync = Some(i);
                break;
            }
            t_total += self.buffer[i] as u32;

            if t_total > INITIAL_SEARCH_BITS {
                end_sync = Some(i);
                break;
            }
        }

        if t_total > INITIAL_SEARCH_BITS {
            log::debug!(
                "F3Framer::find_initial_sync_2(): No second sync within {INITIAL_SEARCH_BITS} bits, restarting search"
            );
            self.buffer.drain(..end_sync.unwrap_or(0));
            return FramerState::FindInitialSync1;
        }

        let Some(end_sync) = end_sync else {
            self.waiting_for_data = true;
            return FramerState::FindInitialSync2;
        };

        // Is the frame length valid (or close enough)?
        if !(587..=589).contains(&t_total) {
            self.buffer.drain(..end_sync);
            return FramerState::FindInitialSync2;
        }

        log::debug!("F3Framer::find_initial_sync_2(): Locked with a first frame length of {t_total} bits");
        self.end_sync = end_sync;
        FramerState::ProcessFrame
    }

    /// Steady state: expect a sync pattern every 588 bits, classify what we
    /// actually find and recover where possible.
    fn find_second_sync(&mut self) -> FramerState {
        // Accumulate at least 588 bits of T-values
        let mut i = 0usize;
        let mut t_total: u32 = 0;
        while i < self.buffer.len() && t_total < 588 {
            t_total += self.buffer[i] as u32;
            i += 1;
        }

        // Enough data to fill the window and verify the sync position?
        if t_total < 588 || self.buffer.len() - i < 2 {
            self.waiting_for_data = true;
            return FramerState::FindSecondSync;
        }

        let (class, end_sync) = classify_sync(&self.buffer, i, t_total);
        self.end_sync = end_sync;

        match class {
            SyncClass::Valid => {
                self.poor_sync_count = 0;
                self.stats.valid_syncs += 1;
            }
            SyncClass::ValidWithBadT => {
                self.stats.valid_syncs += 1;
            }
            SyncClass::ShiftBack => {
                self.stats.undershoot_syncs += 1;
            }
            SyncClass::PoorAccept | SyncClass::PoorShift => {
                self.poor_sync_count += 1;
                if t_total > 588 {
                    self.stats.overshoot_syncs += 1;
                }
                else {
                    self.stats.undershoot_syncs += 1;
                }
            }
        }

        if self.poor_sync_count > MAX_POOR_SYNCS {
            self.poor_sync_count = 0;
            log::debug!("F3Framer::find_second_sync(): More than {MAX_POOR_SYNCS} sequential poor syncs - sync lost");
            return FramerState::SyncLost;
        }

        FramerState::ProcessFrame
    }

    fn sync_lost(&mut self) -> FramerState {
        self.stats.sync_losses += 1;
        FramerState::FindInitialSync1
    }

    /// Demodulate the accepted window into an F3 frame and remove it from
    /// the buffer.
    fn process_frame(&mut self) -> FramerState {
        let window: Vec<u8> = self.buffer.iter().take(self.end_sync).copied().collect();

        let t_total: u32 = window.iter().map(|&t| t.clamp(3, 11) as u32).sum();
        match t_total {
            0..=587 => self.stats.undershoot_frames += 1,
            588 => self.stats.valid_frames += 1,
            _ => self.stats.overshoot_frames += 1,
        }

        match self.demod.frame_from_tvalues(&window) {
            Ok(frame) => self.output.push_back(frame),
            Err(e) => {
                // Only an empty window can fail, and an empty window means
                // the state machine is confused enough to start over
                log::warn!("F3Framer::process_frame(): Dropping unframeable window: {e}");
                return FramerState::SyncLost;
            }
        }

        self.buffer.drain(..self.end_sync);
        FramerState::FindSecondSync
    }
}
