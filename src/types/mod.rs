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

    src/types/mod.rs

    Common types used throughout the decode chain.

*/

pub mod address;
pub mod frame;
pub mod sector;

pub use address::{SectorAddress, FRAMES_PER_MINUTE, FRAMES_PER_SECOND};
pub use frame::{C1Block, C2Block, Data24, F3Frame, FrameType, C1_BLOCK_LEN, DATA24_LEN, F3_DATA_LEN};
pub use sector::{
    RawSector,
    Sector,
    SectorMode,
    SectorStatus,
    MODE1_DATA_LEN,
    MODE2_DATA_LEN,
    RAW_SECTOR_LEN,
    SECTOR_SYNC_PATTERN,
};
