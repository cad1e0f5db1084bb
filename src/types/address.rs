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

    src/types/address.rs

    Defines the SectorAddress type representing a "minute:second:frame"
    disc position, along with BCD conversion helpers.

*/

//! Disc positions are expressed as "minute:second:frame" timecodes, where
//! a frame is one sector (75 frames per second, 60 seconds per minute).
//! On disc all three components are stored as packed BCD; internally we
//! normalize to an absolute frame count so addresses order and subtract
//! cheaply.

use std::fmt::{self, Display, Formatter};

pub const FRAMES_PER_SECOND: u32 = 75;
pub const FRAMES_PER_MINUTE: u32 = 75 * 60;

/// Convert a packed BCD byte to binary. Out-of-range nibbles are converted
/// arithmetically rather than rejected, matching the permissive behavior
/// expected when reading addresses out of possibly-corrupt sector headers.
#[inline]
pub fn bcd_to_binary(bcd: u8) -> u8 {
    (bcd >> 4).wrapping_mul(10).wrapping_add(bcd & 0x0F)
}

/// Convert a binary value 0-99 to packed BCD.
#[inline]
pub fn binary_to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

/// Return true if both nibbles of `bcd` are valid decimal digits.
#[inline]
pub fn is_valid_bcd(bcd: u8) -> bool {
    (bcd & 0x0F) <= 9 && (bcd >> 4) <= 9
}

/// An absolute disc address, stored as a frame count from 00:00:00.
///
/// Addresses are expected to increase monotonically across a session except
/// at layer or track boundaries; this type makes no attempt to police that,
/// it just normalizes the representation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SectorAddress(u32);

impl SectorAddress {
    pub const ZERO: SectorAddress = SectorAddress(0);

    /// Build an address from binary minute/second/frame components.
    /// Out-of-range seconds or frames are carried into the next larger unit.
    pub fn new(minutes: u32, seconds: u32, frames: u32) -> SectorAddress {
        SectorAddress(minutes * FRAMES_PER_MINUTE + seconds * FRAMES_PER_SECOND + frames)
    }

    /// Build an address from the BCD-encoded header bytes of a sector
    /// (bytes 12-14 of a raw sector). The conversion is lenient: invalid
    /// BCD digits produce a best-effort value rather than a failure, since
    /// corrupt headers must still yield an address for archival output.
    pub fn from_bcd(m: u8, s: u8, f: u8) -> SectorAddress {
        SectorAddress::new(
            bcd_to_binary(m) as u32,
            bcd_to_binary(s) as u32,
            bcd_to_binary(f) as u32,
        )
    }

    /// Build an address directly from an absolute frame index.
    pub fn from_index(index: u32) -> SectorAddress {
        SectorAddress(index)
    }

    /// Return the absolute frame index (minutes*4500 + seconds*75 + frames).
    pub fn index(&self) -> u32 {
        self.0
    }

    pub fn minutes(&self) -> u32 {
        self.0 / FRAMES_PER_MINUTE
    }

    pub fn seconds(&self) -> u32 {
        (self.0 % FRAMES_PER_MINUTE) / FRAMES_PER_SECOND
    }

    pub fn frames(&self) -> u32 {
        self.0 % FRAMES_PER_SECOND
    }

    /// Return the BCD-encoded (minute, second, frame) triplet for this
    /// address as it would appear in a sector header.
    pub fn to_bcd(&self) -> (u8, u8, u8) {
        (
            binary_to_bcd((self.minutes() % 100) as u8),
            binary_to_bcd(self.seconds() as u8),
            binary_to_bcd(self.frames() as u8),
        )
    }

    /// Return the address advanced by `frames` frames.
    pub fn add_frames(&self, frames: u32) -> SectorAddress {
        SectorAddress(self.0.saturating_add(frames))
    }

    /// Return the signed frame difference `self - other`.
    pub fn difference(&self, other: SectorAddress) -> i64 {
        self.0 as i64 - other.0 as i64
    }
}

impl Display for SectorAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}.{:02}",
            self.minutes(),
            self.seconds(),
            self.frames()
        )
    }
}
