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

    src/types/sector.rs

    Defines the raw (2352-byte) and corrected sector types along with the
    sector mode enum and status flags.

*/

use crate::types::address::SectorAddress;
use bitflags::bitflags;
use std::fmt::{self, Display, Formatter};

#[cfg(feature = "serde")]
use serde_big_array::BigArray;

/// Size of a raw sector, including sync, header, EDC and ECC fields.
pub const RAW_SECTOR_LEN: usize = 2352;
/// Size of the user data payload of a Mode 1 sector.
pub const MODE1_DATA_LEN: usize = 2048;
/// Size of the payload of a Mode 0 or Mode 2 sector.
pub const MODE2_DATA_LEN: usize = 2336;

/// The 12-byte sync pattern that opens every raw sector.
pub const SECTOR_SYNC_PATTERN: [u8; 12] = [
    0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00,
];

/// Sector mode, from byte 15 of the descrambled header.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, strum::EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SectorMode {
    /// Empty sector, payload is 2336 zero bytes.
    Mode0,
    /// User data with EDC/ECC protection (2048 payload bytes).
    #[default]
    Mode1,
    /// Unprotected payload (2336 bytes).
    Mode2,
}

impl SectorMode {
    /// Decode the mode byte. Returns `None` for out-of-range values so the
    /// caller can apply its clamp-and-flag policy.
    pub fn from_byte(byte: u8) -> Option<SectorMode> {
        match byte {
            0 => Some(SectorMode::Mode0),
            1 => Some(SectorMode::Mode1),
            2 => Some(SectorMode::Mode2),
            _ => None,
        }
    }

    /// Size of the user data payload for this mode.
    pub fn data_len(&self) -> usize {
        match self {
            SectorMode::Mode0 => MODE2_DATA_LEN,
            SectorMode::Mode1 => MODE1_DATA_LEN,
            SectorMode::Mode2 => MODE2_DATA_LEN,
        }
    }
}

impl Display for SectorMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SectorMode::Mode0 => write!(f, "Mode 0"),
            SectorMode::Mode1 => write!(f, "Mode 1"),
            SectorMode::Mode2 => write!(f, "Mode 2"),
        }
    }
}

bitflags! {
    /// Status flags attached to a corrected sector.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[rustfmt::skip]
    pub struct SectorStatus: u8 {
        #[doc = "Sector passed EDC (possibly after ECC correction)"]
        const VALID     = 0b0000_0001;
        #[doc = "Sector only passed EDC after a P/Q ECC pass"]
        const CORRECTED = 0b0000_0010;
        #[doc = "Multiple structural fields disagree - the channel data is most likely absent rather than corrupt"]
        const MISSING   = 0b0000_0100;
    }
}

/// A descrambled but uncorrected 2352-byte sector, with per-byte erasure
/// flags carried over from the CIRC stage.
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawSector {
    #[cfg_attr(feature = "serde", serde(with = "BigArray"))]
    pub data: [u8; RAW_SECTOR_LEN],
    #[cfg_attr(feature = "serde", serde(with = "BigArray"))]
    pub errors: [bool; RAW_SECTOR_LEN],
}

impl Default for RawSector {
    fn default() -> Self {
        RawSector {
            data: [0; RAW_SECTOR_LEN],
            errors: [false; RAW_SECTOR_LEN],
        }
    }
}

impl RawSector {
    /// Read the sector address from the BCD header bytes. The header may be
    /// corrupt; the conversion is lenient and the caller should consult the
    /// error flags for bytes 12-14 before trusting the result.
    pub fn address(&self) -> SectorAddress {
        SectorAddress::from_bcd(self.data[12], self.data[13], self.data[14])
    }

    /// Count of bytes flagged as errors.
    pub fn error_count(&self) -> usize {
        self.errors.iter().filter(|&&e| e).count()
    }
}

/// A corrected, application-usable sector. Invalid sectors are still
/// emitted with their best-effort payload - archival output favors
/// "corrupt but present" over "silently missing".
#[derive(Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sector {
    pub address: SectorAddress,
    pub mode: SectorMode,
    pub status: SectorStatus,
    pub user_data: Vec<u8>,
}

impl Sector {
    pub fn is_valid(&self) -> bool {
        self.status.contains(SectorStatus::VALID)
    }

    pub fn is_corrected(&self) -> bool {
        self.status.contains(SectorStatus::CORRECTED)
    }

    pub fn is_missing(&self) -> bool {
        self.status.contains(SectorStatus::MISSING)
    }
}

impl Display for Sector {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}{}{}",
            self.address,
            self.mode,
            if self.is_valid() { "valid" } else { "invalid" },
            if self.is_corrected() { " corrected" } else { "" },
            if self.is_missing() { " missing" } else { "" },
        )
    }
}
