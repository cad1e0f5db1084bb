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

    src/subcode/mod.rs

    Subcode section decoding: splits the 98 subcode symbols of a section
    into the eight P..W channels and decodes the Q channel (CRC16-verified
    position and control metadata).

*/

//! A section groups 98 consecutive frames; their subcode symbols form the
//! eight subcode channels, one bit per symbol per channel. Only the Q
//! channel is decoded here: it carries the CRC16-protected position and
//! control metadata (track number, index, track-relative and absolute
//! timecodes) that the rest of the pipeline uses to timestamp output and
//! detect discontinuities. The first two symbols of a section are the
//! Sync0/Sync1 markers and carry no channel data.

use crate::types::address::{bcd_to_binary, SectorAddress};
use std::fmt::{self, Display, Formatter};

/// Frames (and thus subcode symbols) per section.
pub const SECTION_FRAMES: usize = 98;
/// Bytes per decoded subcode channel (96 bits).
pub const CHANNEL_LEN: usize = 12;

/// The Q-channel ADR field: what the Q data payload describes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, strum::EnumIter)]
pub enum QMode {
    /// Custom DATA-Q; payload is not interpreted.
    Mode0,
    /// CD position metadata.
    Mode1,
    /// Catalogue number.
    Mode2,
    /// Track ID; payload is not interpreted.
    Mode3,
    /// LaserDisc position metadata (same layout as Mode 1).
    Mode4,
    /// CRC failed or ADR out of range; payload must not be trusted.
    #[default]
    Invalid,
}

impl Display for QMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            QMode::Mode0 => write!(f, "Q Mode 0"),
            QMode::Mode1 => write!(f, "Q Mode 1"),
            QMode::Mode2 => write!(f, "Q Mode 2"),
            QMode::Mode3 => write!(f, "Q Mode 3"),
            QMode::Mode4 => write!(f, "Q Mode 4"),
            QMode::Invalid => write!(f, "Q Invalid"),
        }
    }
}

/// The Q-channel CONTROL field flags.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct QControl {
    pub is_audio: bool,
    pub is_stereo: bool,
    pub is_copy_permitted: bool,
    pub has_preemphasis: bool,
}

/// Position metadata from a Q Mode 1 or Mode 4 packet.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct QPosition {
    pub track_number: u8,
    pub index: u8,
    pub is_lead_in: bool,
    pub is_lead_out: bool,
    pub track_time: SectorAddress,
    pub disc_time: SectorAddress,
    pub is_encoder_running: bool,
}

/// Decoded metadata for one section.
#[derive(Clone, Debug, Default)]
pub struct SectionMetadata {
    pub q_mode: QMode,
    pub control: QControl,
    pub position: Option<QPosition>,
    pub catalogue_number: Option<String>,
}

/// One decoded subcode section: the eight channels plus the interpreted Q
/// metadata.
#[derive(Clone, Debug)]
pub struct Section {
    pub channels: [[u8; CHANNEL_LEN]; 8],
    pub metadata: SectionMetadata,
}

impl Section {
    /// Decode a section from its 98 subcode symbols. Symbols 0 and 1 are
    /// the sync markers and are skipped; each remaining symbol contributes
    /// one bit to each of the eight channels, MSB (P) first.
    pub fn from_subcode_symbols(symbols: &[u8; SECTION_FRAMES]) -> Section {
        let mut channels = [[0u8; CHANNEL_LEN]; 8];

        let mut symbol = 2;
        for byte in 0..CHANNEL_LEN {
            for bit in (0..8).rev() {
                let value = symbols[symbol];
                for (channel, row) in channels.iter_mut().enumerate() {
                    if value & (0x80 >> channel) != 0 {
                        row[byte] |= 1 << bit;
                    }
                }
                symbol += 1;
            }
        }

        let metadata = decode_q_channel(&channels[1]);
        Section { channels, metadata }
    }

    pub fn q_channel(&self) -> &[u8; CHANNEL_LEN] {
        &self.channels[1]
    }
}

/// Interpret the Q channel of a section. Returns metadata with
/// `QMode::Invalid` when the CRC rejects the payload.
fn decode_q_channel(q: &[u8; CHANNEL_LEN]) -> SectionMetadata {
    let mut metadata = SectionMetadata::default();

    if !verify_q(q) {
        return metadata;
    }

    metadata.control = decode_q_control(q[0] >> 4);

    metadata.q_mode = match q[0] & 0x0F {
        0 => QMode::Mode0,
        1 => QMode::Mode1,
        2 => QMode::Mode2,
        3 => QMode::Mode3,
        4 => QMode::Mode4,
        _ => QMode::Invalid,
    };

    match metadata.q_mode {
        QMode::Mode1 | QMode::Mode4 => {
            metadata.position = Some(decode_q_position(q));
        }
        QMode::Mode2 => {
            metadata.catalogue_number = Some(decode_q_catalogue(q));
        }
        _ => {
            log::debug!("decode_q_channel(): Uninterpreted {}", metadata.q_mode);
        }
    }

    metadata
}

/// CRC check the Q channel: 80 bits of control+mode+data, with the 16-bit
/// CRC stored inverted on disc.
fn verify_q(q: &[u8; CHANNEL_LEN]) -> bool {
    let stored = !(((q[10] as u16) << 8) | q[11] as u16);
    crc16(&q[..10]) == stored
}

/// CRC16/XMODEM (polynomial 0x1021).
fn crc16(data: &[u8]) -> u16 {
    let mut crc: u32 = 0;
    for &byte in data {
        crc ^= (byte as u32) << 8;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x10000 != 0 {
                crc = (crc ^ 0x1021) & 0xFFFF;
            }
        }
    }
    crc as u16
}

fn decode_q_control(control: u8) -> QControl {
    QControl {
        is_stereo: control & 0x08 == 0,
        is_audio: control & 0x04 == 0,
        is_copy_permitted: control & 0x02 != 0,
        has_preemphasis: control & 0x01 != 0,
    }
}

fn decode_q_position(q: &[u8; CHANNEL_LEN]) -> QPosition {
    let mut position = QPosition {
        track_number: bcd_to_binary(q[1]),
        index: bcd_to_binary(q[2]),
        is_lead_in: false,
        is_lead_out: false,
        track_time: SectorAddress::new(
            bcd_to_binary(q[3]) as u32,
            bcd_to_binary(q[4]) as u32,
            bcd_to_binary(q[5]) as u32,
        ),
        disc_time: SectorAddress::new(
            bcd_to_binary(q[7]) as u32,
            bcd_to_binary(q[8]) as u32,
            bcd_to_binary(q[9]) as u32,
        ),
        is_encoder_running: true,
    };

    // TNO 0xAA marks lead-out, TNO 0 marks lead-in
    if q[1] == 0xAA {
        position.is_lead_out = true;
    }
    else if q[1] == 0 {
        position.is_lead_in = true;
    }

    // Lead-in sections and index 0 sections have the encoder paused
    position.is_encoder_running = !position.is_lead_in && position.index != 0;

    position
}

fn decode_q_catalogue(q: &[u8; CHANNEL_LEN]) -> String {
    let mut number = String::with_capacity(14);
    for &byte in &q[1..8] {
        number.push_str(&format!("{:02}", bcd_to_binary(byte)));
    }
    number.truncate(13);
    number
}
