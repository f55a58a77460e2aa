//! A crate for walking AAC elementary streams.
//!
//! Live radio HLS segments carry raw ADTS frames, usually prefixed by an
//! ID3v2 tag holding the segment timestamp. This crate finds the frames,
//! skips the tags and reports each frame's AudioSpecificConfig fields.
//!
//! ## License
//!
//! This project is licensed under the [MIT](./LICENSE.MIT) or
//! [Apache-2.0](./LICENSE.Apache-2.0) license. You can choose between one of
//! them if you use this work.
//!
//! `SPDX-License-Identifier: MIT OR Apache-2.0`
#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(unsafe_code)]

use std::io;

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

/// Length of an ADTS header without CRC.
pub const ADTS_HEADER_LEN: usize = 7;

/// Length of an ADTS header carrying a CRC.
pub const ADTS_HEADER_LEN_WITH_CRC: usize = 9;

/// Length of an ID3v2 tag header (and footer).
pub const ID3V2_HEADER_LEN: usize = 10;

/// A Partial Audio Specific Config
/// ISO/IEC 14496-3:2019(E) - 1.6
///
/// This struct does not represent the full AudioSpecificConfig, it only
/// represents the top few fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct PartialAudioSpecificConfig {
    /// Audio Object Type
    pub audio_object_type: AudioObjectType,
    /// Sampling Frequency
    pub sampling_frequency: u32,
    /// Channel Configuration
    pub channel_configuration: u8,
}

/// SBR Audio Object Type
/// ISO/IEC 14496-3:2019(E) - 1.5.1.2.6
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum AudioObjectType {
    /// AAC main
    AacMain,
    /// AAC LC
    AacLowComplexity,
    /// AAC SSR
    AacScalableSampleRate,
    /// AAC LTP
    AacLongTermPrediction,
    /// Any other object type
    Unknown(u16),
}

impl AudioObjectType {
    /// Converts an AudioObjectType to a u16
    pub const fn as_u16(&self) -> u16 {
        match self {
            AudioObjectType::AacMain => 1,
            AudioObjectType::AacLowComplexity => 2,
            AudioObjectType::AacScalableSampleRate => 3,
            AudioObjectType::AacLongTermPrediction => 4,
            AudioObjectType::Unknown(value) => *value,
        }
    }

    /// Converts a u16 to an AudioObjectType
    pub const fn from_u16(value: u16) -> Self {
        match value {
            1 => AudioObjectType::AacMain,
            2 => AudioObjectType::AacLowComplexity,
            3 => AudioObjectType::AacScalableSampleRate,
            4 => AudioObjectType::AacLongTermPrediction,
            _ => AudioObjectType::Unknown(value),
        }
    }
}

impl From<u16> for AudioObjectType {
    fn from(value: u16) -> Self {
        Self::from_u16(value)
    }
}

impl From<AudioObjectType> for u16 {
    fn from(value: AudioObjectType) -> Self {
        value.as_u16()
    }
}

/// Sampling Frequency Index
///
/// The purpose of the FrequencyIndex is to encode commonly used frequencies in
/// 4 bits to save space. These are the set of commonly used frequencies defined
/// in the specification.
///
/// ISO/IEC 14496-3:2019(E) - 1.6.2.4 (Table 1.22)
#[derive(FromPrimitive, Debug, Clone, PartialEq, Copy, Eq, PartialOrd, Ord)]
#[repr(u8)]
#[must_use]
pub enum SampleFrequencyIndex {
    /// 96000 Hz
    Freq96000 = 0x0,
    /// 88200 Hz
    Freq88200 = 0x1,
    /// 64000 Hz
    Freq64000 = 0x2,
    /// 48000 Hz
    Freq48000 = 0x3,
    /// 44100 Hz
    Freq44100 = 0x4,
    /// 32000 Hz
    Freq32000 = 0x5,
    /// 24000 Hz
    Freq24000 = 0x6,
    /// 22050 Hz
    Freq22050 = 0x7,
    /// 16000 Hz
    Freq16000 = 0x8,
    /// 12000 Hz
    Freq12000 = 0x9,
    /// 11025 Hz
    Freq11025 = 0xA,
    /// 8000 Hz
    Freq8000 = 0xB,
    /// 7350 Hz
    Freq7350 = 0xC,
    /// Reserved
    FreqReserved = 0xD,
    /// Reserved
    FreqReserved2 = 0xE,
    /// Escape (Meaning the frequency is not in the table, and we need to read
    /// an additional 24 bits to get the frequency)
    FreqEscape = 0xF,
}

impl SampleFrequencyIndex {
    /// Convert the SampleFrequencyIndex to the actual frequency in Hz
    pub const fn to_freq(&self) -> Option<u32> {
        match self {
            SampleFrequencyIndex::Freq96000 => Some(96000),
            SampleFrequencyIndex::Freq88200 => Some(88200),
            SampleFrequencyIndex::Freq64000 => Some(64000),
            SampleFrequencyIndex::Freq48000 => Some(48000),
            SampleFrequencyIndex::Freq44100 => Some(44100),
            SampleFrequencyIndex::Freq32000 => Some(32000),
            SampleFrequencyIndex::Freq24000 => Some(24000),
            SampleFrequencyIndex::Freq22050 => Some(22050),
            SampleFrequencyIndex::Freq16000 => Some(16000),
            SampleFrequencyIndex::Freq12000 => Some(12000),
            SampleFrequencyIndex::Freq11025 => Some(11025),
            SampleFrequencyIndex::Freq8000 => Some(8000),
            SampleFrequencyIndex::Freq7350 => Some(7350),
            SampleFrequencyIndex::FreqReserved => None,
            SampleFrequencyIndex::FreqReserved2 => None,
            SampleFrequencyIndex::FreqEscape => None,
        }
    }
}

/// A fixed + variable ADTS header.
/// ISO/IEC 14496-3:2019(E) - 1.A.2.2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct AdtsHeader {
    /// MPEG version bit (0 = MPEG-4, 1 = MPEG-2)
    pub mpeg2: bool,
    /// Whether the header is followed by a CRC
    pub has_crc: bool,
    /// Audio object type (profile + 1)
    pub audio_object_type: AudioObjectType,
    /// Sampling frequency index
    pub sampling_frequency_index: SampleFrequencyIndex,
    /// Channel configuration
    pub channel_configuration: u8,
    /// Length of the whole frame including this header
    pub frame_length: usize,
    /// Number of raw data blocks minus one
    pub raw_data_blocks: u8,
}

impl AdtsHeader {
    /// Parses an ADTS header at the start of `data`.
    pub fn parse(data: &[u8]) -> io::Result<Self> {
        if data.len() < ADTS_HEADER_LEN {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "ADTS header truncated"));
        }
        if !is_adts_sync(data) {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "missing ADTS syncword"));
        }
        if (data[1] >> 1) & 0x3 != 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "ADTS layer must be 0"));
        }

        let has_crc = data[1] & 0x1 == 0;
        let profile = (data[2] >> 6) & 0x3;
        let sampling_frequency_index = SampleFrequencyIndex::from_u8((data[2] >> 2) & 0xF)
            .filter(|idx| idx.to_freq().is_some())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "Invalid sampling frequency index"))?;
        let channel_configuration = ((data[2] & 0x1) << 2) | (data[3] >> 6);
        let frame_length = (((data[3] & 0x3) as usize) << 11) | ((data[4] as usize) << 3) | ((data[5] >> 5) as usize);
        let raw_data_blocks = data[6] & 0x3;

        let header = Self {
            mpeg2: (data[1] >> 3) & 0x1 == 1,
            has_crc,
            audio_object_type: AudioObjectType::from_u16(profile as u16 + 1),
            sampling_frequency_index,
            channel_configuration,
            frame_length,
            raw_data_blocks,
        };

        if header.frame_length < header.header_len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "ADTS frame length shorter than its header",
            ));
        }
        Ok(header)
    }

    /// Header length in bytes, including the CRC when present.
    pub const fn header_len(&self) -> usize {
        if self.has_crc {
            ADTS_HEADER_LEN_WITH_CRC
        } else {
            ADTS_HEADER_LEN
        }
    }

    /// The AudioSpecificConfig equivalent of this header, as used by
    /// ADTS to ASC bitstream filters.
    pub fn audio_specific_config(&self) -> PartialAudioSpecificConfig {
        PartialAudioSpecificConfig {
            audio_object_type: self.audio_object_type,
            // parse() rejects indices without a frequency
            sampling_frequency: self.sampling_frequency_index.to_freq().unwrap_or_default(),
            channel_configuration: self.channel_configuration,
        }
    }
}

/// Returns true when `data` starts with the 12 bit ADTS syncword.
#[inline]
pub fn is_adts_sync(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0xFF && data[1] & 0xF0 == 0xF0
}

/// Returns the full length of an ID3v2 tag at the start of `data`
/// (header, body and optional footer), or `None` when there is no tag.
pub fn id3v2_tag_len(data: &[u8]) -> Option<usize> {
    if data.len() < ID3V2_HEADER_LEN || &data[..3] != b"ID3" {
        return None;
    }
    // Size is a 28 bit syncsafe integer.
    let size_bytes = &data[6..10];
    if size_bytes.iter().any(|b| b & 0x80 != 0) {
        return None;
    }
    let size = size_bytes
        .iter()
        .fold(0usize, |acc, b| (acc << 7) | (*b as usize));
    let footer = if data[5] & 0x10 != 0 { ID3V2_HEADER_LEN } else { 0 };
    Some(ID3V2_HEADER_LEN + size + footer)
}

/// A single ADTS frame borrowed from a larger buffer.
#[derive(Debug, Clone, Copy)]
pub struct AdtsFrame<'a> {
    /// Parsed header
    pub header: AdtsHeader,
    /// Whole frame, header included
    pub data: &'a [u8],
}

/// Iterates the ADTS frames of a buffer, skipping ID3v2 tags and
/// resynchronising past bytes that are not part of a frame.
#[derive(Debug)]
pub struct AdtsFrames<'a> {
    data: &'a [u8],
    pos: usize,
    skipped: usize,
    tags: usize,
    in_sync: bool,
}

impl<'a> AdtsFrames<'a> {
    /// Creates an iterator over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            skipped: 0,
            tags: 0,
            in_sync: false,
        }
    }

    /// Bytes that were neither frames nor ID3 tags.
    pub fn skipped_bytes(&self) -> usize {
        self.skipped
    }

    /// Number of ID3v2 tags stepped over.
    pub fn id3_tags(&self) -> usize {
        self.tags
    }
}

impl<'a> Iterator for AdtsFrames<'a> {
    type Item = AdtsFrame<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.data.len() {
            let rest = &self.data[self.pos..];

            if let Some(tag_len) = id3v2_tag_len(rest) {
                let tag_len = tag_len.min(rest.len());
                self.pos += tag_len;
                self.tags += 1;
                continue;
            }

            if let Ok(header) = AdtsHeader::parse(rest) {
                if header.frame_length <= rest.len() {
                    let frame = AdtsFrame {
                        header,
                        data: &rest[..header.frame_length],
                    };
                    self.pos += header.frame_length;
                    self.in_sync = true;
                    return Some(frame);
                }
                if self.in_sync {
                    // Truncated trailing frame.
                    self.skipped += rest.len();
                    self.pos = self.data.len();
                    return None;
                }
                // An oversized header outside a frame chain is a false sync.
            }

            self.pos += 1;
            self.skipped += 1;
            self.in_sync = false;
        }
        None
    }
}

/// Returns true when the buffer holds at least one complete ADTS frame.
pub fn contains_adts_frame(data: &[u8]) -> bool {
    AdtsFrames::new(data).next().is_some()
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use super::*;

    /// Builds an ADTS frame (LC, 44.1kHz stereo, no CRC) with `payload_len`
    /// filler bytes.
    fn adts_frame(payload_len: usize, fill: u8) -> Vec<u8> {
        let frame_length = ADTS_HEADER_LEN + payload_len;
        let mut frame = vec![
            0xFF,
            0xF1,
            (1 << 6) | (4 << 2),
            (2 << 6) | ((frame_length >> 11) & 0x3) as u8,
            ((frame_length >> 3) & 0xFF) as u8,
            (((frame_length & 0x7) as u8) << 5) | 0x1F,
            0xFC,
        ];
        frame.extend(std::iter::repeat_n(fill, payload_len));
        frame
    }

    fn id3_tag(body_len: usize) -> Vec<u8> {
        let mut tag = b"ID3\x04\x00\x00".to_vec();
        tag.extend_from_slice(&[
            ((body_len >> 21) & 0x7F) as u8,
            ((body_len >> 14) & 0x7F) as u8,
            ((body_len >> 7) & 0x7F) as u8,
            (body_len & 0x7F) as u8,
        ]);
        tag.extend(std::iter::repeat_n(0u8, body_len));
        tag
    }

    #[test]
    fn test_idx_to_freq() {
        let cases = [
            (SampleFrequencyIndex::FreqEscape, None),
            (SampleFrequencyIndex::FreqReserved, None),
            (SampleFrequencyIndex::Freq7350, Some(7350)),
            (SampleFrequencyIndex::Freq24000, Some(24000)),
            (SampleFrequencyIndex::Freq44100, Some(44100)),
            (SampleFrequencyIndex::Freq48000, Some(48000)),
        ];

        for (idx, freq) in cases {
            assert_eq!(freq, idx.to_freq(), "Expected frequency for {:?}", idx);
        }
    }

    #[test]
    fn test_adts_header_parse() {
        let frame = adts_frame(20, 0xAA);
        let header = AdtsHeader::parse(&frame).unwrap();
        assert!(!header.has_crc);
        assert_eq!(header.audio_object_type, AudioObjectType::AacLowComplexity);
        assert_eq!(header.sampling_frequency_index, SampleFrequencyIndex::Freq44100);
        assert_eq!(header.channel_configuration, 2);
        assert_eq!(header.frame_length, 27);

        let asc = header.audio_specific_config();
        assert_eq!(asc.audio_object_type, AudioObjectType::AacLowComplexity);
        assert_eq!(asc.sampling_frequency, 44100);
        assert_eq!(asc.channel_configuration, 2);
    }

    #[test]
    fn test_adts_header_rejects_garbage() {
        assert!(AdtsHeader::parse(&[0x00; 7]).is_err());
        assert!(AdtsHeader::parse(&[0xFF, 0xF1]).is_err());
    }

    #[test]
    fn test_id3_tag_len() {
        let tag = id3_tag(73);
        assert_eq!(id3v2_tag_len(&tag), Some(83));
        assert_eq!(id3v2_tag_len(b"not a tag at all"), None);
    }

    #[test]
    fn test_frames_skip_tags_and_garbage() {
        let mut data = id3_tag(12);
        data.extend(adts_frame(10, 0x01));
        data.extend([0x00, 0x13, 0x37]);
        data.extend(adts_frame(5, 0x02));
        // truncated frame at the end
        data.extend(&adts_frame(30, 0x03)[..12]);

        let mut frames = AdtsFrames::new(&data);
        let lens: Vec<usize> = frames.by_ref().map(|f| f.data.len()).collect();
        assert_eq!(lens, vec![17, 12]);
        assert_eq!(frames.id3_tags(), 1);
        assert_eq!(frames.skipped_bytes(), 3 + 12);
    }

    #[test]
    fn test_frames_resync_past_oversized_false_sync() {
        // Syncword whose header claims an 8191 byte frame.
        let mut data = vec![0xFF, 0xF1, 0x50, 0x83, 0xFF, 0xFF, 0xFC];
        assert_eq!(AdtsHeader::parse(&data).unwrap().frame_length, 8191);
        data.extend(adts_frame(10, 0x01));
        data.extend(adts_frame(10, 0x02));

        let mut frames = AdtsFrames::new(&data);
        let payloads: Vec<u8> = frames.by_ref().map(|f| f.data[ADTS_HEADER_LEN]).collect();
        assert_eq!(payloads, vec![0x01, 0x02]);
        assert_eq!(frames.skipped_bytes(), 7);
        assert!(contains_adts_frame(&data));
    }

    #[test]
    fn test_contains_adts_frame() {
        assert!(contains_adts_frame(&adts_frame(4, 0)));
        assert!(!contains_adts_frame(b"<html>404</html>"));
    }
}
