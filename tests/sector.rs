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

    tests/sector.rs

    Sector-level properties: scramble inverse, EDC idempotence, ECC
    recovery, and the byte-accurate wire entry point.

*/

mod common;

use common::{init, mode1_sector, scrambled_mode1_sector};
use efmdec::{
    sector::scramble,
    types::{SectorAddress, SECTOR_SYNC_PATTERN},
    wire::{self, F3FrameRecord},
    FrameType, SectorCorrector,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::io::Cursor;

#[test]
fn scramble_is_its_own_inverse() {
    init();

    let address = SectorAddress::new(0, 3, 0);
    let clean = mode1_sector(address).data;

    let mut working = clean;
    scramble::descramble(&mut working); // scramble
    assert_ne!(&working[16..], &clean[16..]);
    assert_eq!(&working[..12], &SECTOR_SYNC_PATTERN);

    scramble::descramble(&mut working); // descramble
    assert_eq!(working, clean);
}

#[test]
fn edc_pass_requires_no_ecc() {
    init();

    let mut corrector = SectorCorrector::new();
    let sector = corrector.correct(mode1_sector(SectorAddress::new(0, 3, 1)));

    assert!(sector.is_valid());
    assert!(!sector.is_corrected());
    assert_eq!(corrector.statistics().corrected_sectors, 0);
}

#[test]
fn scattered_byte_errors_recover_via_ecc() {
    init();

    // Several independent single-byte hits across the payload; each lands
    // in different P/Q codewords and is within correction capacity
    let mut rng = StdRng::seed_from_u64(0x5EC7);
    let clean = mode1_sector(SectorAddress::new(0, 3, 2));

    for _ in 0..10 {
        let mut raw = clean.clone();
        let offset = rng.gen_range(16..2064);
        raw.data[offset] ^= rng.gen_range(1..=255u8);

        let mut corrector = SectorCorrector::new();
        let sector = corrector.correct(raw);

        assert!(sector.is_valid(), "offset {offset} not recovered");
        assert!(sector.is_corrected());
        assert_eq!(sector.user_data, clean.data[16..2064].to_vec());
    }
}

#[test]
fn paired_byte_errors_recover_across_both_passes() {
    init();

    // Two flagged errors in nearby even-lane bytes: the Q and P
    // permutations put them in different codewords, so each pass sees at
    // most one error per codeword (plus its erasure hint) and the sector
    // comes back intact
    let clean = mode1_sector(SectorAddress::new(0, 3, 3));
    let mut raw = clean.clone();

    raw.data[100] ^= 0x11;
    raw.errors[100] = true;
    raw.data[102] ^= 0x22;
    raw.errors[102] = true;

    let mut corrector = SectorCorrector::new();
    let sector = corrector.correct(raw);

    assert!(sector.is_valid());
    assert!(sector.is_corrected());
    assert_eq!(sector.user_data, clean.data[16..2064].to_vec());
}

#[test]
fn wire_records_feed_the_pipeline() {
    init();

    // Round-trip a small frame stream through the persisted record format
    // plus an erasure bitmap, then confirm reconstruction
    let mut frames = Vec::new();
    for n in 0..4u8 {
        let mut frame = efmdec::F3Frame {
            frame_type: if n == 0 { FrameType::Sync0 } else { FrameType::Subcode },
            subcode: n,
            ..Default::default()
        };
        for (i, byte) in frame.data.iter_mut().enumerate() {
            *byte = n.wrapping_mul(31).wrapping_add(i as u8);
        }
        frame.errors[7] = n == 2;
        frames.push(frame);
    }

    let mut buffer = Cursor::new(Vec::new());
    wire::write_f3_records(&mut buffer, &frames).unwrap();
    assert_eq!(buffer.get_ref().len(), frames.len() * wire::F3_RECORD_LEN);

    let mut erasure_stream = vec![0u8; frames.len() * wire::ERASURE_RECORD_LEN];
    erasure_stream[2 * wire::ERASURE_RECORD_LEN + 7] = 1;

    buffer.set_position(0);
    let records: Vec<F3FrameRecord> = wire::read_f3_records(&mut buffer).unwrap();
    let restored = wire::frames_with_erasures(records, &erasure_stream).unwrap();

    assert_eq!(restored, frames);
}

#[test]
fn scrambled_sector_image_carries_intact_sync() {
    init();

    // The on-disc form keeps its sync pattern in the clear; everything
    // else is whitened
    let image = scrambled_mode1_sector(SectorAddress::new(1, 0, 0));
    assert_eq!(&image[..12], &SECTOR_SYNC_PATTERN);
    assert_ne!(image[15], 1); // the mode byte is scrambled
}
