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

    src/pipeline/mod.rs

    The full decode chain: T-values (or byte-accurate F3 frames) in,
    sections, PCM audio frames and corrected sectors out. Owns one instance
    of every stage and preserves strict frame ordering between them.

*/

//! Pipeline orchestration.
//!
//! Stages are applied strictly in order on a single logical thread of
//! control - the C1 and C2 delay lines assume frame N arrives after frame
//! N-1, so out-of-order delivery would silently corrupt the deinterleave.
//! Independent streams get independent pipeline instances; the only state
//! shared between instances is the immutable lookup tables.
//!
//! Section metadata (decoded from the subcode channel) rides ahead of the
//! payload it describes, because the CIRC delay lines hold payload back by
//! roughly 110 frames. Decoded sections queue up and are consumed one per
//! 98 payload frames, which keeps timestamps and payload in step to within
//! a section - the same approximation the delay lines impose on the disc
//! itself. A jump in section disc time flushes the CIRC state, since the
//! delay lines would otherwise mix unrelated data across the gap.

use crate::{
    audio::{AudioFrame, AudioGenerator, AudioStatistics, ErrorTreatment},
    circ::{
        c1::{C1Decoder, C1Statistics},
        c2::{C2Decoder, C2Deinterleaver, C2Statistics, DeinterleaveStatistics},
    },
    demod::DemodStatistics,
    framer::{F3Framer, FramerStatistics},
    sector::{AssemblerStatistics, CorrectorStatistics, SectorAssembler, SectorCorrector},
    subcode::{QMode, Section, SectionMetadata, SECTION_FRAMES},
    types::{Data24, F3Frame, Sector, SectorAddress},
};
use std::collections::VecDeque;

/// A section's worth of decoded payload frames with its Q-channel
/// metadata. Complete sections carry exactly 98 frames; an incomplete
/// section only occurs at end of stream.
#[derive(Clone, Debug)]
pub struct Data24Section {
    pub frames: Vec<Data24>,
    pub metadata: SectionMetadata,
    pub disc_time: SectorAddress,
    pub complete: bool,
}

/// Counters owned by the pipeline itself (stage counters live with their
/// stages).
#[derive(Copy, Clone, Debug, Default)]
pub struct PipelineCounters {
    pub total_f3_frames: u64,
    pub total_data24_frames: u64,
    pub sequence_interruptions: u64,
    pub missing_frames: u64,
    pub initial_disc_time: SectorAddress,
    pub current_disc_time: SectorAddress,
}

/// The assembled decode chain. Push T-values or F3 frames in; pull
/// sections, audio frames and sectors out.
pub struct EfmPipeline {
    framer: F3Framer,
    c1: C1Decoder,
    c2: C2Decoder,
    deinterleaver: C2Deinterleaver,
    audio: AudioGenerator,
    assembler: SectorAssembler,
    corrector: SectorCorrector,

    subcode_symbols: Vec<u8>,
    section_queue: VecDeque<(SectionMetadata, SectorAddress)>,
    data24_pending: Vec<Data24>,

    initial_time_set: bool,
    last_disc_time: SectorAddress,

    sections_out: VecDeque<Data24Section>,
    audio_out: VecDeque<AudioFrame>,
    sectors_out: VecDeque<Sector>,

    counters: PipelineCounters,
}

impl Default for EfmPipeline {
    fn default() -> Self {
        EfmPipeline::new(ErrorTreatment::Silence)
    }
}

impl EfmPipeline {
    pub fn new(treatment: ErrorTreatment) -> Self {
        EfmPipeline {
            framer: F3Framer::new(),
            c1: C1Decoder::new(),
            c2: C2Decoder::new(),
            deinterleaver: C2Deinterleaver::new(),
            audio: AudioGenerator::new(treatment),
            assembler: SectorAssembler::new(),
            corrector: SectorCorrector::new(),
            subcode_symbols: Vec::with_capacity(SECTION_FRAMES),
            section_queue: VecDeque::new(),
            data24_pending: Vec::new(),
            initial_time_set: false,
            last_disc_time: SectorAddress::ZERO,
            sections_out: VecDeque::new(),
            audio_out: VecDeque::new(),
            sectors_out: VecDeque::new(),
            counters: Default::default(),
        }
    }

    /// Push PLL output (T-value run lengths) into the chain.
    pub fn push_tvalues(&mut self, tvalues: &[u8]) {
        self.framer.push_tvalues(tvalues);
        while let Some(frame) = self.framer.next_frame() {
            self.process_f3(frame);
        }
    }

    /// Push an already-demodulated F3 frame (the byte-accurate capture
    /// entry point) into the chain.
    pub fn push_f3_frame(&mut self, frame: F3Frame) {
        self.process_f3(frame);
    }

    /// Pop the next decoded section, if any.
    pub fn next_section(&mut self) -> Option<Data24Section> {
        self.sections_out.pop_front()
    }

    /// Pop the next PCM audio frame, if any.
    pub fn next_audio_frame(&mut self) -> Option<AudioFrame> {
        self.audio_out.pop_front()
    }

    /// Pop the next corrected sector, if any.
    pub fn next_sector(&mut self) -> Option<Sector> {
        self.sectors_out.pop_front()
    }

    /// End of stream or cancellation: emit any partial section (flagged
    /// incomplete) and reset every stage to its initial state. Queued
    /// output remains available.
    pub fn flush(&mut self) {
        if !self.data24_pending.is_empty() {
            let frames = std::mem::take(&mut self.data24_pending);
            let (metadata, disc_time) = self
                .section_queue
                .pop_front()
                .unwrap_or_else(|| (SectionMetadata::default(), self.last_disc_time));
            self.route_section(frames, metadata, disc_time, false);
        }

        self.framer.flush();
        self.c1.flush();
        self.c2.flush();
        self.deinterleaver.flush();
        self.assembler.flush();
        self.subcode_symbols.clear();
        self.section_queue.clear();
        self.initial_time_set = false;
        self.last_disc_time = SectorAddress::ZERO;
    }

    pub fn counters(&self) -> &PipelineCounters {
        &self.counters
    }

    pub fn framer_statistics(&self) -> &FramerStatistics {
        self.framer.statistics()
    }

    pub fn demod_statistics(&self) -> &DemodStatistics {
        self.framer.demod_statistics()
    }

    pub fn c1_statistics(&self) -> &C1Statistics {
        self.c1.statistics()
    }

    pub fn c2_statistics(&self) -> &C2Statistics {
        self.c2.statistics()
    }

    pub fn deinterleave_statistics(&self) -> &DeinterleaveStatistics {
        self.deinterleaver.statistics()
    }

    pub fn assembler_statistics(&self) -> &AssemblerStatistics {
        self.assembler.statistics()
    }

    pub fn corrector_statistics(&self) -> &CorrectorStatistics {
        self.corrector.statistics()
    }

    pub fn audio_statistics(&self) -> &AudioStatistics {
        self.audio.statistics()
    }

    /// Log a summary of the decode run at info level.
    pub fn report(&self) {
        let framer = self.framer.statistics();
        let demod = self.framer.demod_statistics();
        let c1 = self.c1.statistics();
        let c2 = self.c2.statistics();
        let corrector = self.corrector.statistics();
        let audio = self.audio.statistics();

        log::info!("EFM decode summary:");
        log::info!(
            "  Framer: {} frames ({} valid syncs, {} sync losses)",
            framer.total_frames(),
            framer.valid_syncs,
            framer.sync_losses
        );
        log::info!(
            "  EFM symbols: {} valid, {} corrected",
            demod.valid_symbols,
            demod.corrected_symbols
        );
        log::info!(
            "  C1: {} passed, {} corrected, {} failed",
            c1.passed,
            c1.corrected,
            c1.failed
        );
        log::info!(
            "  C2: {} passed, {} corrected, {} failed",
            c2.passed,
            c2.corrected,
            c2.failed
        );
        log::info!(
            "  Sectors: {} valid, {} corrected, {} invalid, {} missing",
            corrector.valid_sectors,
            corrector.corrected_sectors,
            corrector.invalid_sectors,
            corrector.missing_sectors
        );
        log::info!(
            "  Audio: {} samples ({} corrupt, {} missing)",
            audio.total_samples,
            audio.corrupt_samples,
            audio.missing_samples
        );
        log::info!(
            "  Stream: {} interruptions, {} missing frames, {} - {}",
            self.counters.sequence_interruptions,
            self.counters.missing_frames,
            self.counters.initial_disc_time,
            self.counters.current_disc_time
        );
    }

    // ----------------------------------------------------------------------

    fn process_f3(&mut self, frame: F3Frame) {
        self.counters.total_f3_frames += 1;

        self.subcode_symbols.push(frame.subcode);

        // The CIRC chain proper
        if let Some(c1_block) = self.c1.push_frame(&frame) {
            if let Some(c2_block) = self.c2.push_block(c1_block) {
                if let Some(data24) = self.deinterleaver.push_block(c2_block) {
                    self.counters.total_data24_frames += 1;
                    self.data24_pending.push(data24);
                }
            }
        }

        if self.subcode_symbols.len() == SECTION_FRAMES {
            let mut symbols = [0u8; SECTION_FRAMES];
            symbols.copy_from_slice(&self.subcode_symbols);
            self.subcode_symbols.clear();

            let section = Section::from_subcode_symbols(&symbols);
            self.track_section(section);
        }

        self.emit_ready_sections();
    }

    /// Resolve the section's disc time, detect discontinuities, and queue
    /// its metadata for pairing with payload frames.
    fn track_section(&mut self, section: Section) {
        let metadata = section.metadata;
        let timestamped = matches!(metadata.q_mode, QMode::Mode1 | QMode::Mode4);

        let current_time = if !self.initial_time_set {
            match (&metadata.position, timestamped) {
                (Some(position), true) => {
                    self.initial_time_set = true;
                    self.counters.initial_disc_time = position.disc_time;
                    log::debug!(
                        "EfmPipeline::track_section(): Initial disc time is {}",
                        position.disc_time
                    );
                    position.disc_time
                }
                _ => {
                    // No timestamp yet; assume the stream starts at zero
                    self.last_disc_time
                }
            }
        }
        else {
            match (&metadata.position, timestamped) {
                (Some(position), true) => position.disc_time,
                // No valid timestamp: assume the section is contiguous
                _ => self.last_disc_time.add_frames(1),
            }
        };

        if self.initial_time_set {
            let gap = current_time.difference(self.last_disc_time);
            if gap > 1 {
                // The delay lines are full of data from before the gap;
                // flush them rather than let them mix across it
                let missing_sections = (gap - 1) as u64;
                log::debug!(
                    "EfmPipeline::track_section(): Non-contiguous section ({} -> {}), flushing CIRC state",
                    self.last_disc_time,
                    current_time
                );
                self.counters.sequence_interruptions += 1;
                self.counters.missing_frames += missing_sections * SECTION_FRAMES as u64;

                self.c1.flush();
                self.c2.flush();
                self.deinterleaver.flush();
                self.data24_pending.clear();
                self.section_queue.clear();

                // Keep the audio timeline contiguous across the gap
                let padding = self
                    .audio
                    .padding_frames(missing_sections as usize * SECTION_FRAMES);
                self.audio_out.extend(padding);
            }
        }

        self.last_disc_time = current_time;
        self.counters.current_disc_time = current_time;
        self.section_queue.push_back((metadata, current_time));
    }

    /// Pair queued section metadata with decoded payload, 98 frames at a
    /// time.
    fn emit_ready_sections(&mut self) {
        while self.data24_pending.len() >= SECTION_FRAMES && !self.section_queue.is_empty() {
            let frames: Vec<Data24> = self.data24_pending.drain(..SECTION_FRAMES).collect();
            let (metadata, disc_time) = self.section_queue.pop_front().unwrap();
            self.route_section(frames, metadata, disc_time, true);
        }
    }

    /// Feed one section's frames to the audio and sector emitters and
    /// queue the section itself.
    fn route_section(
        &mut self,
        frames: Vec<Data24>,
        metadata: SectionMetadata,
        disc_time: SectorAddress,
        complete: bool,
    ) {
        for frame in &frames {
            self.audio_out.push_back(self.audio.frame_from_data24(frame));
            self.assembler.push_data24(frame);
        }
        while let Some(raw) = self.assembler.next_sector() {
            self.sectors_out.push_back(self.corrector.correct(raw));
        }

        self.sections_out.push_back(Data24Section {
            frames,
            metadata,
            disc_time,
            complete,
        });
    }
}
