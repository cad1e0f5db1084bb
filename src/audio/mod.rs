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

    src/audio/mod.rs

    The audio emitter: converts corrected 24-byte payload frames into six
    stereo sample pairs, substituting silence for frames the CIRC stages
    could not recover.

*/

use crate::types::Data24;
use bytemuck::{Pod, Zeroable};

/// Samples per payload frame (6 stereo pairs).
pub const SAMPLES_PER_FRAME: usize = 12;

/// How sample errors are treated on output.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ErrorTreatment {
    /// Zero out samples from invalid frames.
    #[default]
    Silence,
    /// Emit whatever bytes survived, errors and all.
    PassThrough,
}

/// One frame of PCM output: 12 interleaved 16-bit samples (L,R x 6).
/// Samples are little-endian byte pairs on disc, decoded here to native
/// i16. The struct is plain-old-data so a frame run can be viewed as a
/// byte slice for file output without copying.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct AudioFrame {
    pub samples: [i16; SAMPLES_PER_FRAME],
}

impl AudioFrame {
    pub const SILENT: AudioFrame = AudioFrame {
        samples: [0; SAMPLES_PER_FRAME],
    };

    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|&s| s == 0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// View a run of audio frames as its raw little-endian byte stream.
pub fn frames_as_bytes(frames: &[AudioFrame]) -> &[u8] {
    bytemuck::cast_slice(frames)
}

/// Statistics maintained by the [`AudioGenerator`].
#[derive(Copy, Clone, Debug, Default)]
pub struct AudioStatistics {
    pub valid_samples: u64,
    pub corrupt_samples: u64,
    pub missing_samples: u64,
    pub total_samples: u64,
}

/// Converts Data24 frames to PCM sample frames.
#[derive(Default)]
pub struct AudioGenerator {
    treatment: ErrorTreatment,
    stats: AudioStatistics,
}

impl AudioGenerator {
    pub fn new(treatment: ErrorTreatment) -> Self {
        AudioGenerator {
            treatment,
            ..Default::default()
        }
    }

    pub fn statistics(&self) -> &AudioStatistics {
        &self.stats
    }

    /// Convert one payload frame. Invalid or padding frames become silence
    /// under [`ErrorTreatment::Silence`]; their sample count is recorded so
    /// the output stays time-aligned with the input.
    pub fn frame_from_data24(&mut self, frame: &Data24) -> AudioFrame {
        self.stats.total_samples += SAMPLES_PER_FRAME as u64;

        if frame.padded {
            self.stats.missing_samples += SAMPLES_PER_FRAME as u64;
            return AudioFrame::SILENT;
        }

        if !frame.valid && self.treatment == ErrorTreatment::Silence {
            self.stats.corrupt_samples += SAMPLES_PER_FRAME as u64;
            return AudioFrame::SILENT;
        }

        let mut out = AudioFrame::default();
        for (i, sample) in out.samples.iter_mut().enumerate() {
            *sample = i16::from_le_bytes([frame.data[i * 2], frame.data[i * 2 + 1]]);
            if frame.errors[i * 2] || frame.errors[i * 2 + 1] {
                self.stats.corrupt_samples += 1;
            }
            else {
                self.stats.valid_samples += 1;
            }
        }
        out
    }

    /// Emit `count` frames of silence for a gap in the stream.
    pub fn padding_frames(&mut self, count: usize) -> Vec<AudioFrame> {
        self.stats.total_samples += (count * SAMPLES_PER_FRAME) as u64;
        self.stats.missing_samples += (count * SAMPLES_PER_FRAME) as u64;
        vec![AudioFrame::SILENT; count]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DATA24_LEN;

    #[test]
    fn samples_decode_little_endian() {
        let mut frame = Data24 {
            valid: true,
            ..Default::default()
        };
        frame.data[0] = 0x34;
        frame.data[1] = 0x12;
        frame.data[2] = 0x00;
        frame.data[3] = 0x80;

        let mut generator = AudioGenerator::new(ErrorTreatment::Silence);
        let audio = generator.frame_from_data24(&frame);
        assert_eq!(audio.samples[0], 0x1234);
        assert_eq!(audio.samples[1], i16::MIN);
    }

    #[test]
    fn invalid_frame_is_silenced() {
        let mut frame = Data24::default();
        frame.data = [0xFF; DATA24_LEN];
        frame.valid = false;

        let mut generator = AudioGenerator::new(ErrorTreatment::Silence);
        let audio = generator.frame_from_data24(&frame);
        assert!(audio.is_silent());
        assert_eq!(generator.statistics().corrupt_samples, 12);
    }

    #[test]
    fn pass_through_keeps_corrupt_data() {
        let mut frame = Data24::default();
        frame.data[0] = 0x01;
        frame.valid = false;
        frame.errors[0] = true;

        let mut generator = AudioGenerator::new(ErrorTreatment::PassThrough);
        let audio = generator.frame_from_data24(&frame);
        assert_eq!(audio.samples[0], 1);
        assert_eq!(generator.statistics().corrupt_samples, 1);
    }

    #[test]
    fn byte_view_round_trips() {
        let frame = AudioFrame {
            samples: [0x0102; SAMPLES_PER_FRAME],
        };
        let bytes = frame.as_bytes();
        assert_eq!(bytes.len(), 24);
        #[cfg(target_endian = "little")]
        {
            assert_eq!(bytes[0], 0x02);
            assert_eq!(bytes[1], 0x01);
        }

        let frames = [frame, AudioFrame::SILENT];
        assert_eq!(frames_as_bytes(&frames).len(), 48);
    }
}
