use std::io::Read;
use thiserror::Error;

const HEADER_LEN: usize = 16;

const FLAG_SHUFFLE: u8 = 0x01;
const FLAG_MEMCPYED: u8 = 0x02;
const FLAG_BITSHUFFLE: u8 = 0x04;
const FLAG_NO_SPLIT: u8 = 0x10;

const CODEC_LZ4: u8 = 1;
const CODEC_ZLIB: u8 = 3;
const CODEC_ZSTD: u8 = 4;

#[derive(Debug, Error)]
pub enum BloscError {
    #[error("frame is {0} bytes, shorter than its header")]
    Truncated(usize),
    #[error("frame declares {declared} bytes but holds {actual}")]
    Length { declared: usize, actual: usize },
    #[error("bit-shuffled frames are not supported")]
    BitShuffle,
    #[error("codec {0} is not supported")]
    Codec(u8),
    #[error("block {block} decoded to {actual} bytes, expected {expected}")]
    BlockSize {
        block: usize,
        expected: usize,
        actual: usize,
    },
    #[error("codec failed: {0}")]
    Decode(String),
}

/// The fixed header at the start of every Blosc frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameHeader {
    flags: u8,
    typesize: usize,
    nbytes: usize,
    blocksize: usize,
    cbytes: usize,
}

impl FrameHeader {
    fn parse(frame: &[u8]) -> Result<Self, BloscError> {
        if frame.len() < HEADER_LEN {
            return Err(BloscError::Truncated(frame.len()));
        }
        let word = |at: usize| u32::from_le_bytes([frame[at], frame[at + 1], frame[at + 2], frame[at + 3]]) as usize;
        let header = Self {
            flags: frame[2],
            typesize: frame[3].max(1) as usize,
            nbytes: word(4),
            blocksize: word(8),
            cbytes: word(12),
        };
        if header.cbytes > frame.len() {
            return Err(BloscError::Length {
                declared: header.cbytes,
                actual: frame.len(),
            });
        }
        Ok(header)
    }

    fn codec(&self) -> u8 {
        self.flags >> 5
    }
}

/// Decode one Blosc frame, as written by the numcodecs `Blosc` compressor.
///
/// Byte-shuffled and unshuffled frames are handled with the zstd, lz4 and zlib codecs.
pub fn decompress(frame: &[u8]) -> Result<Vec<u8>, BloscError> {
    let header = FrameHeader::parse(frame)?;
    if header.flags & FLAG_BITSHUFFLE != 0 {
        return Err(BloscError::BitShuffle);
    }

    if header.flags & FLAG_MEMCPYED != 0 {
        let end = HEADER_LEN + header.nbytes;
        if frame.len() < end {
            return Err(BloscError::Length {
                declared: end,
                actual: frame.len(),
            });
        }
        return Ok(frame[HEADER_LEN..end].to_vec());
    }

    if header.nbytes == 0 {
        return Ok(Vec::new());
    }
    let blocksize = header.blocksize.max(1);
    let nblocks = header.nbytes.div_ceil(blocksize);
    let starts_end = HEADER_LEN + nblocks * 4;
    if frame.len() < starts_end {
        return Err(BloscError::Truncated(frame.len()));
    }

    let mut out = Vec::with_capacity(header.nbytes);
    for block in 0..nblocks {
        let at = HEADER_LEN + block * 4;
        let start = i32::from_le_bytes([frame[at], frame[at + 1], frame[at + 2], frame[at + 3]]);
        let bsize = blocksize.min(header.nbytes - block * blocksize);
        let leftover = bsize < blocksize;

        let decoded = decode_block(&header, frame, start.max(0) as usize, bsize, leftover)?;
        if decoded.len() != bsize {
            return Err(BloscError::BlockSize {
                block,
                expected: bsize,
                actual: decoded.len(),
            });
        }

        if header.flags & FLAG_SHUFFLE != 0 && header.typesize > 1 {
            out.extend(unshuffle(&decoded, header.typesize));
        } else {
            out.extend(decoded);
        }
    }
    Ok(out)
}

fn decode_block(
    header: &FrameHeader,
    frame: &[u8],
    mut at: usize,
    bsize: usize,
    leftover: bool,
) -> Result<Vec<u8>, BloscError> {
    let splits = if header.flags & FLAG_NO_SPLIT == 0 && !leftover {
        header.typesize
    } else {
        1
    };
    let stream_len = bsize / splits;

    let mut block = Vec::with_capacity(bsize);
    for _ in 0..splits {
        let Some(len_bytes) = frame.get(at..at + 4) else {
            return Err(BloscError::Truncated(frame.len()));
        };
        let cbytes = i32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]).max(0) as usize;
        at += 4;
        let Some(stream) = frame.get(at..at + cbytes) else {
            return Err(BloscError::Truncated(frame.len()));
        };
        at += cbytes;

        // A stream exactly as long as its output was stored raw.
        if cbytes == stream_len {
            block.extend_from_slice(stream);
        } else {
            block.extend(decode_stream(header.codec(), stream, stream_len)?);
        }
    }
    Ok(block)
}

fn decode_stream(codec: u8, stream: &[u8], expected: usize) -> Result<Vec<u8>, BloscError> {
    match codec {
        CODEC_ZSTD => zstd::bulk::decompress(stream, expected).map_err(|e| BloscError::Decode(e.to_string())),
        CODEC_LZ4 => lz4_flex::block::decompress(stream, expected).map_err(|e| BloscError::Decode(e.to_string())),
        CODEC_ZLIB => {
            let mut out = Vec::with_capacity(expected);
            flate2::read::ZlibDecoder::new(stream)
                .read_to_end(&mut out)
                .map_err(|e| BloscError::Decode(e.to_string()))?;
            Ok(out)
        }
        other => Err(BloscError::Codec(other)),
    }
}

/// Undo the byte shuffle: byte `j` of every element was grouped into plane `j`.
/// Trailing bytes that do not fill an element are stored unshuffled.
fn unshuffle(block: &[u8], typesize: usize) -> Vec<u8> {
    let elements = block.len() / typesize;
    let mut out = vec![0u8; block.len()];
    for element in 0..elements {
        for byte in 0..typesize {
            out[element * typesize + byte] = block[byte * elements + element];
        }
    }
    let tail = elements * typesize;
    out[tail..].copy_from_slice(&block[tail..]);
    out
}
