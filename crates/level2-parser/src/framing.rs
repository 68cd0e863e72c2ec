//! Message framing over a decompressed block.
//!
//! Each message is preceded by a 12-byte channel terminal manager (CTM)
//! header, followed by a 16-byte message header:
//!
//! | Offset | Size | Field |
//! |---|---|---|
//! | 0 | 2 | message size in half-words (includes this header) |
//! | 2 | 1 | redundant channel |
//! | 3 | 1 | message type |
//! | 4 | 2 | sequence number |
//! | 6 | 2 | modified Julian date |
//! | 8 | 4 | milliseconds of day |
//! | 12 | 2 | number of segments |
//! | 14 | 2 | segment number |

use crate::error::DecodeError;
use crate::observer::DecodeObserver;

pub const CTM_HEADER_SIZE: usize = 12;
pub const MESSAGE_HEADER_SIZE: usize = 16;

/// Digital radar data (generic format).
pub const RADIAL_DATA_MESSAGE: u8 = 31;

/// The 16-byte message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub size_halfwords: u16,
    pub redundant_channel: u8,
    pub message_type: u8,
    pub sequence_number: u16,
    pub julian_date: u16,
    pub milliseconds: u32,
    pub segment_count: u16,
    pub segment_number: u16,
}

impl MessageHeader {
    /// Parse a header from at least 16 bytes.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < MESSAGE_HEADER_SIZE {
            return None;
        }
        Some(Self {
            size_halfwords: u16::from_be_bytes([data[0], data[1]]),
            redundant_channel: data[2],
            message_type: data[3],
            sequence_number: u16::from_be_bytes([data[4], data[5]]),
            julian_date: u16::from_be_bytes([data[6], data[7]]),
            milliseconds: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
            segment_count: u16::from_be_bytes([data[12], data[13]]),
            segment_number: u16::from_be_bytes([data[14], data[15]]),
        })
    }

    /// Declared message length in bytes, header included.
    pub fn size_bytes(&self) -> usize {
        self.size_halfwords as usize * 2
    }
}

/// One framed message. `body` starts right after the message header.
#[derive(Debug, Clone, Copy)]
pub struct MessageFrame<'a> {
    pub header: MessageHeader,
    pub body: &'a [u8],
}

impl MessageFrame<'_> {
    pub fn message_type(&self) -> u8 {
        self.header.message_type
    }

    pub fn is_radial_data(&self) -> bool {
        self.header.message_type == RADIAL_DATA_MESSAGE
    }
}

/// Lazy iterator over the messages in one decompressed buffer.
///
/// Stops at the first position without room for a CTM plus message header;
/// the reason is kept in [`MessageFrames::stopped`].
pub struct MessageFrames<'a> {
    buf: &'a [u8],
    pos: usize,
    stopped: Option<DecodeError>,
}

impl<'a> MessageFrames<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            stopped: None,
        }
    }

    /// Why framing ended early, if it did.
    pub fn stopped(&self) -> Option<&DecodeError> {
        self.stopped.as_ref()
    }

    /// Iterate only Message 31 frames, reporting skipped types.
    pub fn radials<'o>(
        self,
        observer: &'o dyn DecodeObserver,
    ) -> impl Iterator<Item = MessageFrame<'a>> + 'o
    where
        'a: 'o,
    {
        self.filter(move |frame| {
            if frame.is_radial_data() {
                true
            } else {
                observer.message_skipped(frame.message_type());
                false
            }
        })
    }
}

impl<'a> Iterator for MessageFrames<'a> {
    type Item = MessageFrame<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stopped.is_some() || self.pos >= self.buf.len() {
            return None;
        }

        let header_start = self.pos + CTM_HEADER_SIZE;
        let body_start = header_start + MESSAGE_HEADER_SIZE;
        if body_start > self.buf.len() {
            self.stopped = Some(DecodeError::MessageHeaderTruncated {
                remaining: self.buf.len() - self.pos,
            });
            return None;
        }

        let header = MessageHeader::parse(&self.buf[header_start..body_start])?;

        // A size smaller than the header itself still has to make progress
        let message_end = header_start + header.size_bytes().max(MESSAGE_HEADER_SIZE);
        let body_end = message_end.min(self.buf.len());
        self.pos = message_end;

        Some(MessageFrame {
            header,
            body: &self.buf[body_start..body_end],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoopObserver;
    use test_utils::frame_message;

    #[test]
    fn test_header_fields() {
        let mut header = vec![0u8; MESSAGE_HEADER_SIZE];
        header[0..2].copy_from_slice(&1208u16.to_be_bytes());
        header[2] = 1;
        header[3] = 2;
        header[4..6].copy_from_slice(&77u16.to_be_bytes());
        header[6..8].copy_from_slice(&19841u16.to_be_bytes());
        header[8..12].copy_from_slice(&83_712_000u32.to_be_bytes());
        header[12..14].copy_from_slice(&1u16.to_be_bytes());
        header[14..16].copy_from_slice(&1u16.to_be_bytes());

        let parsed = MessageHeader::parse(&header).unwrap();
        assert_eq!(parsed.size_halfwords, 1208);
        assert_eq!(parsed.size_bytes(), 2416);
        assert_eq!(parsed.redundant_channel, 1);
        assert_eq!(parsed.message_type, 2);
        assert_eq!(parsed.sequence_number, 77);
        assert_eq!(parsed.julian_date, 19841);
        assert_eq!(parsed.milliseconds, 83_712_000);
        assert_eq!(parsed.segment_count, 1);
        assert_eq!(parsed.segment_number, 1);
    }

    #[test]
    fn test_frames_in_sequence() {
        let mut buf = frame_message(2, &[0xAA; 20]);
        buf.extend(frame_message(31, &[0xBB; 8]));
        buf.extend(frame_message(5, &[0xCC; 4]));

        let frames: Vec<_> = MessageFrames::new(&buf).collect();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].message_type(), 2);
        assert_eq!(frames[0].body, &[0xAA; 20]);
        assert_eq!(frames[1].message_type(), 31);
        assert_eq!(frames[1].body, &[0xBB; 8]);
        assert_eq!(frames[2].body, &[0xCC; 4]);
    }

    #[test]
    fn test_radials_filter() {
        let mut buf = frame_message(2, &[0u8; 12]);
        buf.extend(frame_message(31, &[1u8; 6]));
        buf.extend(frame_message(18, &[0u8; 2]));
        buf.extend(frame_message(31, &[2u8; 6]));

        let radials: Vec<_> = MessageFrames::new(&buf).radials(&NoopObserver).collect();
        assert_eq!(radials.len(), 2);
        assert!(radials.iter().all(|f| f.is_radial_data()));
        assert_eq!(radials[1].body, &[2u8; 6]);
    }

    #[test]
    fn test_partial_header_stops_framing() {
        let mut buf = frame_message(31, &[7u8; 4]);
        buf.extend_from_slice(&[0u8; CTM_HEADER_SIZE + 3]);

        let mut frames = MessageFrames::new(&buf);
        assert!(frames.next().is_some());
        assert!(frames.next().is_none());
        assert_eq!(
            frames.stopped(),
            Some(&DecodeError::MessageHeaderTruncated {
                remaining: CTM_HEADER_SIZE + 3
            })
        );
    }

    #[test]
    fn test_oversized_message_is_clipped() {
        let mut buf = frame_message(31, &[9u8; 10]);
        // Claim far more half-words than the buffer holds
        buf[CTM_HEADER_SIZE..CTM_HEADER_SIZE + 2].copy_from_slice(&500u16.to_be_bytes());

        let frames: Vec<_> = MessageFrames::new(&buf).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].body.len(), 10);
    }

    #[test]
    fn test_zero_size_still_advances() {
        let mut buf = vec![0u8; CTM_HEADER_SIZE + MESSAGE_HEADER_SIZE];
        buf[CTM_HEADER_SIZE + 3] = 2;
        buf.extend(frame_message(31, &[1u8; 2]));

        let frames: Vec<_> = MessageFrames::new(&buf).collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].body.len(), 0);
        assert_eq!(frames[1].message_type(), 31);
    }
}
