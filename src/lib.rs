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
*/

//! # efmdec
//!
//! A library for decoding EFM channel data - as recovered from CD and
//! LaserDisc RF captures - into error-corrected sectors and PCM audio.
//!
//! The decode chain mirrors the ECMA-130 frame hierarchy:
//!
//! 1. T-value run lengths are synchronized into 588-bit F3 frames and
//!    demodulated ([`framer`], [`demod`])
//! 2. The C1 and C2 CIRC stages correct symbol errors across the
//!    cross-interleave ([`circ`])
//! 3. Corrected 24-byte payload frames are grouped into subcode sections
//!    ([`subcode`]) and emitted as PCM audio ([`audio`]) or assembled into
//!    EDC/ECC-verified sectors ([`sector`])
//!
//! [`pipeline::EfmPipeline`] wires the whole chain together; the stage
//! types are public for callers that need only part of it.
//!
//! Errors found in the channel data are never fatal: each stage records
//! them as per-symbol flags and counters and keeps the stream flowing, so
//! a damaged disc decodes to flagged-but-present output rather than a
//! truncated one.

pub mod audio;
pub mod circ;
pub mod demod;
pub mod framer;
pub mod pipeline;
pub mod sector;
pub mod subcode;
pub mod types;
pub mod wire;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EfmError {
    #[error("An IO error occurred reading or writing a frame stream")]
    IoError,
    #[error("A frame record stream was malformed or truncated")]
    WireFormat,
    #[error("An empty T-value window cannot form a frame")]
    EmptyFrame,
    #[error("Unknown frame-type tag {0} in frame record")]
    BadFrameTag(u8),
    #[error("Erasure map length {actual} does not match frame stream (expected {expected})")]
    ErasureMapMismatch { expected: usize, actual: usize },
}

pub use audio::{AudioFrame, AudioGenerator, ErrorTreatment};
pub use demod::EfmDemodulator;
pub use framer::F3Framer;
pub use pipeline::{Data24Section, EfmPipeline};
pub use sector::{SectorAssembler, SectorCorrector};
pub use subcode::Section;
pub use types::{Data24, F3Frame, FrameType, RawSector, Sector, SectorAddress, SectorMode, SectorStatus};
