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

    src/wire.rs

    The persisted F3 frame record format: 34-byte records (frame-type tag,
    subcode symbol, 32 data symbols), optionally paired with a parallel
    erasure-bitmap stream of one byte per data symbol. Capture tools in
    this ecosystem produce either T-values or these byte-accurate records;
    both feed the same pipeline.

*/

use crate::{
    types::{F3Frame, FrameType, F3_DATA_LEN},
    EfmError,
};
use binrw::{binrw, BinRead, BinWrite};
use std::io::{Read, Seek, Write};

/// Bytes per erasure-map record (one flag byte per data symbol).
pub const ERASURE_RECORD_LEN: usize = F3_DATA_LEN;

/// One F3 frame as persisted: a frame-type discriminator, the subcode (or
/// sync placeholder) symbol, and the 32 payload symbols.
#[binrw]
#[brw(little)]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct F3FrameRecord {
    pub frame_type: u8,
    pub subcode: u8,
    pub data: [u8; F3_DATA_LEN],
}

impl F3FrameRecord {
    pub fn from_frame(frame: &F3Frame) -> F3FrameRecord {
        F3FrameRecord {
            frame_type: match frame.frame_type {
                FrameType::Subcode => 0,
                FrameType::Sync0 => 1,
                FrameType::Sync1 => 2,
            },
            subcode: frame.subcode,
            data: frame.data,
        }
    }

    /// Reconstitute a frame, taking per-symbol error flags from an erasure
    /// record (nonzero byte = erasure). Unknown frame-type tags are
    /// structural corruption.
    pub fn into_frame(self, erasure: Option<&[u8; ERASURE_RECORD_LEN]>) -> Result<F3Frame, EfmError> {
        let frame_type = match self.frame_type {
            0 => FrameType::Subcode,
            1 => FrameType::Sync0,
            2 => FrameType::Sync1,
            tag => return Err(EfmError::BadFrameTag(tag)),
        };

        let mut errors = [false; F3_DATA_LEN];
        if let Some(erasure) = erasure {
            for (flag, &byte) in errors.iter_mut().zip(erasure.iter()) {
                *flag = byte != 0;
            }
        }

        Ok(F3Frame {
            frame_type,
            subcode: self.subcode,
            data: self.data,
            errors,
        })
    }
}

/// Bytes per persisted F3 frame record.
pub const F3_RECORD_LEN: usize = 2 + F3_DATA_LEN;

/// Read every F3 frame record from a stream until EOF. A trailing partial
/// record is structural corruption.
pub fn read_f3_records<R: Read + Seek>(reader: &mut R) -> Result<Vec<F3FrameRecord>, EfmError> {
    let start = reader.stream_position().map_err(|_| EfmError::IoError)?;
    let end = reader.seek(std::io::SeekFrom::End(0)).map_err(|_| EfmError::IoError)?;
    reader.seek(std::io::SeekFrom::Start(start)).map_err(|_| EfmError::IoError)?;

    let stream_len = (end - start) as usize;
    if stream_len % F3_RECORD_LEN != 0 {
        log::error!("read_f3_records(): Stream length {stream_len} is not a whole number of records");
        return Err(EfmError::WireFormat);
    }

    let mut records = Vec::with_capacity(stream_len / F3_RECORD_LEN);
    for _ in 0..stream_len / F3_RECORD_LEN {
        let record = F3FrameRecord::read(reader).map_err(|e| {
            log::error!("read_f3_records(): {e}");
            EfmError::WireFormat
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Write F3 frame records to a stream.
pub fn write_f3_records<W: Write + Seek>(
    writer: &mut W,
    frames: &[F3Frame],
) -> Result<(), EfmError> {
    for frame in frames {
        F3FrameRecord::from_frame(frame)
            .write(writer)
            .map_err(|e| {
                log::error!("write_f3_records(): {e}");
                EfmError::WireFormat
            })?;
    }
    Ok(())
}

/// Pair a record stream with its parallel erasure-bitmap stream. The
/// erasure stream must carry exactly one record per frame.
pub fn frames_with_erasures(
    records: Vec<F3FrameRecord>,
    erasure_stream: &[u8],
) -> Result<Vec<F3Frame>, EfmError> {
    if erasure_stream.len() != records.len() * ERASURE_RECORD_LEN {
        return Err(EfmError::ErasureMapMismatch {
            expected: records.len() * ERASURE_RECORD_LEN,
            actual: erasure_stream.len(),
        });
    }

    records
        .into_iter()
        .zip(erasure_stream.chunks_exact(ERASURE_RECORD_LEN))
        .map(|(record, erasure)| {
            let erasure: &[u8; ERASURE_RECORD_LEN] = erasure.try_into().unwrap();
            record.into_frame(Some(erasure))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn record_round_trip() {
        let mut frame = F3Frame {
            frame_type: FrameType::Sync1,
            subcode: 0,
            ..Default::default()
        };
        frame.data[5] = 0xAB;

        let mut buffer = Cursor::new(Vec::new());
        write_f3_records(&mut buffer, &[frame.clone()]).unwrap();
        assert_eq!(buffer.get_ref().len(), 34);

        buffer.set_position(0);
        let mut records = read_f3_records(&mut buffer).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records.remove(0).into_frame(None).unwrap(), frame);
    }

    #[test]
    fn erasure_pairing_sets_flags() {
        let record = F3FrameRecord {
            frame_type: 0,
            subcode: 0x12,
            data: [0; F3_DATA_LEN],
        };
        let mut erasures = vec![0u8; ERASURE_RECORD_LEN];
        erasures[3] = 1;
        erasures[30] = 0xFF;

        let frames = frames_with_erasures(vec![record], &erasures).unwrap();
        assert!(frames[0].errors[3]);
        assert!(frames[0].errors[30]);
        assert!(!frames[0].errors[0]);
    }

    #[test]
    fn mismatched_erasure_stream_is_rejected() {
        let record = F3FrameRecord::default();
        assert!(frames_with_erasures(vec![record], &[0u8; 10]).is_err());
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let record = F3FrameRecord {
            frame_type: 7,
            ..Default::default()
        };
        assert!(record.into_frame(None).is_err());
    }
}
