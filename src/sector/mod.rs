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

    src/sector/mod.rs

    Sector assembly and correction: frames raw 2352-byte sectors out of the
    Data24 payload stream by scanning for the sector sync pattern, then
    descrambles, addresses, EDC-checks and (for Mode 1) ECC-corrects them.

*/

//! Sector recovery over the Data24 stream.
//!
//! Raw sectors are located with a WaitingForSync / InSync / LostSync state
//! machine keyed on the 12-byte sector sync pattern. In lock, a sector is
//! emitted every 2352 bytes even when the expected sync is damaged; four
//! consecutive missed syncs abandon the lock. The 12 sync bytes of each
//! emitted sector are replaced with the canonical pattern so a corrupted
//! sync cannot fail the EDC on its own.
//!
//! Correction is the archival-friendly kind: a sector that fails EDC after
//! a full Q and P pass is still emitted, flagged invalid; sectors whose
//! structural fields disagree in more than one way are additionally
//! flagged missing, distinguishing a capture dropout from a localized
//! corruption.

pub mod edc;
pub mod rspc;
pub mod scramble;

use crate::types::{
    Data24,
    RawSector,
    Sector,
    SectorMode,
    SectorStatus,
    RAW_SECTOR_LEN,
    SECTOR_SYNC_PATTERN,
};
use std::collections::VecDeque;

/// Consecutive missed sync patterns tolerated before the lock is dropped.
const MAX_MISSED_SYNCS: u32 = 4;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
enum AssemblerState {
    #[default]
    WaitingForSync,
    InSync,
    LostSync,
}

/// Statistics maintained by the [`SectorAssembler`].
#[derive(Copy, Clone, Debug, Default)]
pub struct AssemblerStatistics {
    pub sectors_framed: u64,
    pub discarded_bytes: u64,
    pub good_syncs: u64,
    pub missed_syncs: u64,
    pub sync_losses: u64,
}

/// Frames raw sectors out of the byte stream formed by successive Data24
/// frames (98 frames x 24 bytes per section; 2352 bytes per sector).
pub struct SectorAssembler {
    data: VecDeque<u8>,
    errors: VecDeque<bool>,
    state: AssemblerState,
    missed_syncs: u32,
    output: VecDeque<RawSector>,
    stats: AssemblerStatistics,
}

impl Default for SectorAssembler {
    fn default() -> Self {
        SectorAssembler {
            data: VecDeque::new(),
            errors: VecDeque::new(),
            state: AssemblerState::WaitingForSync,
            missed_syncs: 0,
            output: VecDeque::new(),
            stats: Default::default(),
        }
    }
}

impl SectorAssembler {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn statistics(&self) -> &AssemblerStatistics {
        &self.stats
    }

    /// Append a Data24 frame's payload to the stream and run the framing
    /// state machine. Framed sectors accumulate in the output queue.
    pub fn push_data24(&mut self, frame: &Data24) {
        self.data.extend(frame.data.iter().copied());
        self.errors.extend(frame.errors.iter().copied());
        self.process();
    }

    /// Pop the next framed raw sector, if any.
    pub fn next_sector(&mut self) -> Option<RawSector> {
        self.output.pop_front()
    }

    /// Discard all buffered stream state.
    pub fn flush(&mut self) {
        self.data.clear();
        self.errors.clear();
        self.state = AssemblerState::WaitingForSync;
        self.missed_syncs = 0;
    }

    fn process(&mut self) {
        loop {
            let advanced = match self.state {
                AssemblerState::WaitingForSync => self.waiting_for_sync(),
                AssemblerState::InSync => self.in_sync(),
                AssemblerState::LostSync => {
                    self.missed_syncs = 0;
                    self.stats.sync_losses += 1;
                    self.state = AssemblerState::WaitingForSync;
                    true
                }
            };
            if !advanced {
                break;
            }
        }
    }

    /// Scan the buffer for the sector sync pattern, discarding everything
    /// before it.
    fn waiting_for_sync(&mut self) -> bool {
        if self.data.len() < SECTOR_SYNC_PATTERN.len() {
            return false;
        }

        let mut found = None;
        'scan: for start in 0..=(self.data.len() - SECTOR_SYNC_PATTERN.len()) {
            for (i, &expected) in SECTOR_SYNC_PATTERN.iter().enumerate() {
                if self.data[start + i] != expected {
                    continue 'scan;
                }
            }
            found = Some(start);
            break;
        }

        match found {
            Some(start) => {
                if start > 0 {
                    log::debug!("SectorAssembler::waiting_for_sync(): Discarding {start} bytes before sector sync");
                    self.discard(start);
                    self.stats.discarded_bytes += start as u64;
                }
                self.state = AssemblerState::InSync;
                true
            }
            None => {
                // Keep the tail that might be a partial sync pattern
                let keep_from = self.data.len() - (SECTOR_SYNC_PATTERN.len() - 1);
                self.discard(keep_from);
                self.stats.discarded_bytes += keep_from as u64;
                false
            }
        }
    }

    /// Emit one sector per 2352 bytes, tolerating a bounded number of
    /// damaged sync patterns before declaring the lock lost.
    fn in_sync(&mut self) -> bool {
        if self.data.len() < RAW_SECTOR_LEN {
            return false;
        }

        let sync_ok = SECTOR_SYNC_PATTERN
            .iter()
            .enumerate()
            .all(|(i, &expected)| self.data[i] == expected);

        if sync_ok {
            self.missed_syncs = 0;
            self.stats.good_syncs += 1;
        }
        else {
            self.missed_syncs += 1;
            self.stats.missed_syncs += 1;
            if self.missed_syncs > MAX_MISSED_SYNCS {
                log::debug!("SectorAssembler::in_sync(): Too many missed sync patterns, sync lost");
                self.state = AssemblerState::LostSync;
                return true;
            }
        }

        let mut raw = RawSector::default();
        for i in 0..RAW_SECTOR_LEN {
            raw.data[i] = self.data[i];
            raw.errors[i] = self.errors[i];
        }

        // Restore the canonical sync pattern so a corrupt sync can't fail
        // the EDC, then descramble the body
        raw.data[..12].copy_from_slice(&SECTOR_SYNC_PATTERN);
        for flag in raw.errors[..12].iter_mut() {
            *flag = false;
        }
        scramble::descramble(&mut raw.data);

        self.output.push_back(raw);
        self.stats.sectors_framed += 1;
        self.discard(RAW_SECTOR_LEN);
        true
    }

    fn discard(&mut self, count: usize) {
        self.data.drain(..count);
        self.errors.drain(..count);
    }
}

/// Statistics maintained by the [`SectorCorrector`].
#[derive(Copy, Clone, Debug, Default)]
pub struct CorrectorStatistics {
    pub valid_sectors: u64,
    pub corrected_sectors: u64,
    pub invalid_sectors: u64,
    pub missing_sectors: u64,
    pub mode0_sectors: u64,
    pub mode1_sectors: u64,
    pub mode2_sectors: u64,
}

/// Turns raw sectors into corrected, addressed sectors: mode extraction,
/// EDC verification, and the Q+P ECC fallback for Mode 1.
#[derive(Default)]
pub struct SectorCorrector {
    stats: CorrectorStatistics,
}

impl SectorCorrector {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn statistics(&self) -> &CorrectorStatistics {
        &self.stats
    }

    /// Correct a raw sector. The sector is always returned - failures are
    /// recorded in its status flags, never by dropping it.
    pub fn correct(&mut self, mut raw: RawSector) -> Sector {
        // Structural failures counted toward the "missing" heuristic: a
        // single bad field suggests corruption, several suggest the EFM
        // data simply wasn't there
        let mut structural_failures = 0u32;

        let mode = match SectorMode::from_byte(raw.data[15]) {
            Some(mode) => mode,
            None => {
                log::debug!(
                    "SectorCorrector::correct(): Invalid mode byte {:#04x}, assuming Mode 1",
                    raw.data[15]
                );
                structural_failures += 1;
                SectorMode::Mode1
            }
        };

        let mut status = SectorStatus::empty();

        match mode {
            SectorMode::Mode0 => {
                // An empty sector is all zeros by definition
                status |= SectorStatus::VALID;
                self.stats.mode0_sectors += 1;
            }
            SectorMode::Mode1 => {
                self.stats.mode1_sectors += 1;

                // ECC is expensive; only correct when the checksum fails
                if edc::edc_valid(&raw.data) {
                    status |= SectorStatus::VALID;
                }
                else {
                    let q_ok = rspc::q_parity_pass(&mut raw.data, &raw.errors);
                    let p_ok = rspc::p_parity_pass(&mut raw.data, &raw.errors);

                    if edc::edc_valid(&raw.data) {
                        status |= SectorStatus::VALID | SectorStatus::CORRECTED;
                    }
                    else {
                        log::debug!(
                            "SectorCorrector::correct(): EDC still failing after ECC ({q_ok}/{} Q, {p_ok}/{} P codewords ok)",
                            rspc::Q_CODEWORDS,
                            rspc::P_CODEWORDS
                        );
                        structural_failures += 1;
                    }
                }
            }
            SectorMode::Mode2 => {
                // Mode 2 carries no ECC; take the payload as-is
                status |= SectorStatus::VALID;
                self.stats.mode2_sectors += 1;
            }
        }

        if structural_failures > 1 {
            status |= SectorStatus::MISSING;
        }

        let user_data = match mode {
            SectorMode::Mode0 => vec![0u8; mode.data_len()],
            SectorMode::Mode1 => raw.data[16..16 + 2048].to_vec(),
            SectorMode::Mode2 => raw.data[16..16 + 2336].to_vec(),
        };

        if status.contains(SectorStatus::VALID) {
            if status.contains(SectorStatus::CORRECTED) {
                self.stats.corrected_sectors += 1;
            }
            else {
                self.stats.valid_sectors += 1;
            }
        }
        else {
            self.stats.invalid_sectors += 1;
        }
        if status.contains(SectorStatus::MISSING) {
            self.stats.missing_sectors += 1;
        }

        Sector {
            address: raw.address(),
            mode,
            status,
            user_data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SectorAddress, DATA24_LEN};

    fn frames_from_bytes(bytes: &[u8]) -> Vec<Data24> {
        bytes
            .chunks(DATA24_LEN)
            .map(|chunk| {
                let mut frame = Data24 {
                    valid: true,
                    ..Default::default()
                };
                frame.data[..chunk.len()].copy_from_slice(chunk);
                frame
            })
            .collect()
    }

    /// A scrambled sector image whose descrambled body is all zeros.
    fn scrambled_zero_sector() -> Vec<u8> {
        let mut sector = [0u8; RAW_SECTOR_LEN];
        // Descrambling XORs the table in; a body equal to the table
        // descrambles to zero
        scramble::descramble(&mut sector);
        sector[..12].copy_from_slice(&SECTOR_SYNC_PATTERN);
        sector.to_vec()
    }

    #[test]
    fn assembler_frames_aligned_sectors() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&scrambled_zero_sector());
        stream.extend_from_slice(&scrambled_zero_sector());

        let mut assembler = SectorAssembler::new();
        for frame in frames_from_bytes(&stream) {
            assembler.push_data24(&frame);
        }

        let first = assembler.next_sector().expect("first sector");
        assert!(assembler.next_sector().is_some());
        assert!(assembler.next_sector().is_none());

        // Body descrambles back to zero
        assert_eq!(&first.data[..12], &SECTOR_SYNC_PATTERN);
        assert!(first.data[12..].iter().all(|&b| b == 0));
        assert_eq!(assembler.statistics().good_syncs, 2);
    }

    #[test]
    fn assembler_skips_leading_garbage() {
        let mut stream = vec![0xAAu8; 100];
        stream.extend_from_slice(&scrambled_zero_sector());

        let mut assembler = SectorAssembler::new();
        for frame in frames_from_bytes(&stream) {
            assembler.push_data24(&frame);
        }

        assert!(assembler.next_sector().is_some());
        assert!(assembler.statistics().discarded_bytes >= 100);
    }

    #[test]
    fn assembler_rides_out_one_bad_sync() {
        let mut second = scrambled_zero_sector();
        second[1] = 0x00; // damage the second sector's sync

        let mut stream = Vec::new();
        stream.extend_from_slice(&scrambled_zero_sector());
        stream.extend_from_slice(&second);
        stream.extend_from_slice(&scrambled_zero_sector());

        let mut assembler = SectorAssembler::new();
        for frame in frames_from_bytes(&stream) {
            assembler.push_data24(&frame);
        }

        let mut count = 0;
        while assembler.next_sector().is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
        assert_eq!(assembler.statistics().missed_syncs, 1);
    }

    /// Build a valid Mode 1 raw sector (descrambled domain) with the given
    /// address and patterned user data.
    pub(crate) fn mode1_sector(address: SectorAddress) -> RawSector {
        let mut raw = RawSector::default();
        raw.data[..12].copy_from_slice(&SECTOR_SYNC_PATTERN);
        let (m, s, f) = address.to_bcd();
        raw.data[12] = m;
        raw.data[13] = s;
        raw.data[14] = f;
        raw.data[15] = 1;
        for i in 16..2064 {
            raw.data[i] = (i * 13 + 7) as u8;
        }
        let edc = edc::edc_checksum(&raw.data[..edc::EDC_COVERAGE]);
        raw.data[edc::EDC_OFFSET..edc::EDC_OFFSET + 4].copy_from_slice(&edc.to_le_bytes());
        rspc::generate_p_parity(&mut raw.data);
        rspc::generate_q_parity(&mut raw.data);
        raw
    }

    #[test]
    fn clean_mode1_sector_is_valid_without_ecc() {
        let address = SectorAddress::new(0, 2, 16);
        let mut corrector = SectorCorrector::new();
        let sector = corrector.correct(mode1_sector(address));

        assert!(sector.is_valid());
        assert!(!sector.is_corrected());
        assert_eq!(sector.address, address);
        assert_eq!(sector.mode, SectorMode::Mode1);
        assert_eq!(sector.user_data.len(), 2048);
        assert_eq!(corrector.statistics().valid_sectors, 1);
    }

    #[test]
    fn single_byte_error_recovers_as_corrected() {
        let mut raw = mode1_sector(SectorAddress::new(0, 2, 17));
        raw.data[500] ^= 0x42;

        let mut corrector = SectorCorrector::new();
        let sector = corrector.correct(raw);

        assert!(sector.is_valid());
        assert!(sector.is_corrected());
        assert!(!sector.is_missing());
        // The corrected payload matches the original pattern
        assert_eq!(sector.user_data[500 - 16], (500u32 * 13 + 7) as u8);
    }

    #[test]
    fn unfixable_sector_is_emitted_invalid() {
        let mut raw = mode1_sector(SectorAddress::new(0, 2, 18));
        // Trash enough of the payload that the ECC cannot recover it
        for i in 100..600 {
            raw.data[i] = !raw.data[i];
        }

        let mut corrector = SectorCorrector::new();
        let sector = corrector.correct(raw);

        assert!(!sector.is_valid());
        assert_eq!(sector.user_data.len(), 2048);
        assert_eq!(corrector.statistics().invalid_sectors, 1);
    }

    #[test]
    fn bad_mode_plus_bad_edc_is_missing() {
        let mut raw = mode1_sector(SectorAddress::new(0, 2, 19));
        raw.data[15] = 9; // invalid mode
        for i in 100..600 {
            raw.data[i] = !raw.data[i];
        }

        let mut corrector = SectorCorrector::new();
        let sector = corrector.correct(raw);

        assert!(!sector.is_valid());
        assert!(sector.is_missing());
        assert_eq!(sector.mode, SectorMode::Mode1);
    }

    #[test]
    fn mode2_sector_passes_without_ecc() {
        let mut raw = RawSector::default();
        raw.data[..12].copy_from_slice(&SECTOR_SYNC_PATTERN);
        raw.data[15] = 2;
        raw.data[16] = 0xDE;

        let mut corrector = SectorCorrector::new();
        let sector = corrector.correct(raw);

        assert!(sector.is_valid());
        assert_eq!(sector.mode, SectorMode::Mode2);
        assert_eq!(sector.user_data.len(), 2336);
        assert_eq!(sector.user_data[0], 0xDE);
    }
}
