//! GIF sequence encoding and the matching index-level reader.
//!
//! The whole batch shares one global colour table; frames carry no local
//! palette, no transparency and the default disposal method.

use std::borrow::Cow;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use gif::{ColorOutput, DecodeOptions, Encoder, Frame, Repeat};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

use super::batch::FrameBatch;
use super::palette::Palette;

/// How many times a viewer should play the sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopCount {
    #[default]
    Forever,
    /// Number of repetitions after the first play
    Finite(u16),
}

impl LoopCount {
    /// `0` means forever, as in the NETSCAPE2.0 extension.
    pub fn from_repetitions(count: u16) -> Self {
        if count == 0 {
            LoopCount::Forever
        } else {
            LoopCount::Finite(count)
        }
    }
}

impl From<LoopCount> for Repeat {
    fn from(value: LoopCount) -> Self {
        match value {
            LoopCount::Forever => Repeat::Infinite,
            LoopCount::Finite(n) => Repeat::Finite(n),
        }
    }
}

impl From<Repeat> for LoopCount {
    fn from(value: Repeat) -> Self {
        match value {
            Repeat::Infinite => LoopCount::Forever,
            Repeat::Finite(n) => LoopCount::Finite(n),
        }
    }
}

/// Serialize `batch` as an animated GIF into `sink`.
///
/// Rejects an empty batch before anything is written.
pub fn encode<W: Write>(batch: &FrameBatch, sink: W, loop_count: LoopCount) -> PipelineResult<()> {
    let (width, height) = batch.dimensions().ok_or(PipelineError::EmptyBatch)?;
    let width = to_screen_dimension(width)?;
    let height = to_screen_dimension(height)?;

    let color_table = batch.palette().to_rgb_bytes();
    let mut encoder = Encoder::new(sink, width, height, &color_table)?;
    encoder.set_repeat(loop_count.into())?;

    for (index, (frame, delay)) in batch.iter().enumerate() {
        let gif_frame = Frame {
            width,
            height,
            delay,
            buffer: Cow::Borrowed(frame.indices()),
            ..Frame::default()
        };
        encoder.write_frame(&gif_frame)?;
        debug!(frame = index, delay, "wrote frame");
    }

    // Writes the trailer; dropping the encoder would swallow its error
    let mut sink = encoder.into_inner().map_err(gif::EncodingError::from)?;
    sink.flush().map_err(gif::EncodingError::from)?;
    Ok(())
}

/// Encode into an in-memory buffer.
pub fn encode_to_vec(batch: &FrameBatch, loop_count: LoopCount) -> PipelineResult<Vec<u8>> {
    let mut buffer = Vec::new();
    encode(batch, &mut buffer, loop_count)?;
    Ok(buffer)
}

/// Encode into the file at `path`, returning the number of bytes written.
///
/// The sequence is written to a temporary file next to `path` and renamed
/// over it only after the trailer is out. On failure `path` is untouched.
pub fn encode_to_path(batch: &FrameBatch, path: &Path, loop_count: LoopCount) -> PipelineResult<u64> {
    let written = write_then_persist(path, |sink| encode(batch, sink, loop_count))?;
    debug!(path = %path.display(), bytes = written, "persisted animation");
    Ok(written)
}

fn write_then_persist<F>(path: &Path, write: F) -> PipelineResult<u64>
where
    F: FnOnce(&mut dyn Write) -> PipelineResult<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir).map_err(|e| {
        PipelineError::storage(format!("create temporary file in {}", dir.display()), e)
    })?;

    let written = {
        let mut sink = CountingWriter::new(BufWriter::new(staged.as_file_mut()));
        write(&mut sink)?;
        sink.flush()
            .map_err(|e| PipelineError::storage(format!("flush {}", path.display()), e))?;
        sink.bytes_written()
    };

    staged
        .persist(path)
        .map_err(|e| PipelineError::storage(format!("persist {}", path.display()), e.error))?;
    Ok(written)
}

fn to_screen_dimension(value: u32) -> PipelineResult<u16> {
    u16::try_from(value).map_err(|_| {
        PipelineError::invalid_dimension(format!(
            "frame edge {} does not fit a GIF logical screen",
            value
        ))
    })
}

/// One frame as stored in the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub width: u16,
    pub height: u16,
    pub delay: u16,
    pub indices: Vec<u8>,
}

/// Index-level view of an encoded sequence
#[derive(Debug, Clone)]
pub struct DecodedSequence {
    pub width: u16,
    pub height: u16,
    /// Global colour table as stored, padded to a power of two
    pub color_table: Vec<u8>,
    pub loop_count: LoopCount,
    pub frames: Vec<DecodedFrame>,
}

impl DecodedSequence {
    /// First `len` global colour table entries as a palette
    pub fn palette(&self, len: usize) -> PipelineResult<Palette> {
        let bytes = self.color_table.get(..len * 3).ok_or_else(|| {
            PipelineError::InvalidPalette(format!(
                "color table has {} entries, {} requested",
                self.color_table.len() / 3,
                len
            ))
        })?;
        Palette::from_rgb_bytes(bytes)
    }

    /// Full colour table including padding entries
    pub fn full_palette(&self) -> PipelineResult<Palette> {
        Palette::from_rgb_bytes(&self.color_table)
    }
}

/// Read back a GIF without colour expansion.
pub fn decode_sequence<R: Read>(reader: R) -> PipelineResult<DecodedSequence> {
    let mut options = DecodeOptions::new();
    options.set_color_output(ColorOutput::Indexed);
    let mut decoder = options.read_info(reader)?;

    let width = decoder.width();
    let height = decoder.height();
    let color_table = decoder.global_palette().map(<[u8]>::to_vec).unwrap_or_default();

    let mut frames = Vec::new();
    while let Some(frame) = decoder.read_next_frame()? {
        frames.push(DecodedFrame {
            width: frame.width,
            height: frame.height,
            delay: frame.delay,
            indices: frame.buffer.to_vec(),
        });
    }

    Ok(DecodedSequence {
        width,
        height,
        color_table,
        loop_count: decoder.repeat().into(),
        frames,
    })
}

/// Sink adapter that counts bytes written, for reporting
pub struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_processing::dithering::{quantize, DitherMethod};
    use image::{ImageBuffer, Rgb, RgbImage};
    use std::sync::Arc;

    fn checker_batch(palette: &Arc<Palette>, count: usize, delay: u16) -> FrameBatch {
        let frames = (0..count)
            .map(|n| {
                let img: RgbImage = ImageBuffer::from_fn(6, 4, |x, y| {
                    palette.colors()[(x as usize + y as usize + n) % palette.len()]
                });
                quantize(&img, palette, DitherMethod::FloydSteinberg)
            })
            .collect();
        FrameBatch::uniform(frames, delay, Arc::clone(palette)).unwrap()
    }

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_empty_batch_rejected() {
        let batch = FrameBatch::uniform(Vec::new(), 10, Arc::new(Palette::rgb8())).unwrap();
        let mut sink = Vec::new();

        let result = encode(&batch, &mut sink, LoopCount::Forever);
        assert!(matches!(result, Err(PipelineError::EmptyBatch)));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_failing_sink_reports_write_error() {
        let batch = checker_batch(&Arc::new(Palette::rgb8()), 1, 10);
        let result = encode(&batch, FailingSink, LoopCount::Forever);
        assert!(matches!(result, Err(PipelineError::Write(_))));
    }

    #[test]
    fn test_header_and_trailer() {
        let batch = checker_batch(&Arc::new(Palette::rgb8()), 2, 10);
        let bytes = encode_to_vec(&batch, LoopCount::Forever).unwrap();

        assert!(bytes.starts_with(b"GIF89a"));
        assert_eq!(bytes.last(), Some(&0x3B));
    }

    #[test]
    fn test_round_trip_is_lossless_at_index_level() {
        let palette = Arc::new(Palette::rgb8());
        let batch = checker_batch(&palette, 3, 7);
        let bytes = encode_to_vec(&batch, LoopCount::Finite(2)).unwrap();

        let decoded = decode_sequence(bytes.as_slice()).unwrap();
        assert_eq!((decoded.width, decoded.height), (6, 4));
        assert_eq!(decoded.full_palette().unwrap(), *palette);
        assert_eq!(decoded.loop_count, LoopCount::Finite(2));
        assert_eq!(decoded.frames.len(), 3);

        for (decoded_frame, (frame, delay)) in decoded.frames.iter().zip(batch.iter()) {
            assert_eq!(decoded_frame.delay, delay);
            assert_eq!(decoded_frame.indices, frame.indices());
        }
    }

    #[test]
    fn test_small_palette_is_padded_but_recoverable() {
        let palette = Arc::new(Palette::from_hex_list("#ff0000,#00ff00,#0000ff").unwrap());
        let batch = checker_batch(&palette, 1, 5);
        let decoded = decode_sequence(encode_to_vec(&batch, LoopCount::Forever).unwrap().as_slice()).unwrap();

        assert_eq!(decoded.color_table.len(), 4 * 3);
        assert_eq!(decoded.palette(3).unwrap(), *palette);
        assert_eq!(decoded.loop_count, LoopCount::Forever);
        assert!(decoded.palette(5).is_err());
    }

    #[test]
    fn test_counting_writer() {
        let batch = checker_batch(&Arc::new(Palette::black_white()), 2, 3);
        let mut writer = CountingWriter::new(Vec::new());
        encode(&batch, &mut writer, LoopCount::Forever).unwrap();

        assert_eq!(writer.bytes_written() as usize, writer.inner.len());
        assert!(writer.bytes_written() > 0);
    }

    #[test]
    fn test_encode_to_path_writes_complete_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("anim.gif");
        let batch = checker_batch(&Arc::new(Palette::rgb8()), 2, 4);

        let written = encode_to_path(&batch, &target, LoopCount::Forever).unwrap();

        let bytes = std::fs::read(&target).unwrap();
        assert_eq!(bytes.len() as u64, written);
        assert_eq!(bytes, encode_to_vec(&batch, LoopCount::Forever).unwrap());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_failing_partway_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("anim.gif");

        let result = write_then_persist(&target, |sink| {
            sink.write_all(b"GIF89a\x06\x00\x04\x00").unwrap();
            Err(PipelineError::Write(io::Error::other("file too large").into()))
        });

        assert!(matches!(result, Err(PipelineError::Write(_))));
        assert!(!target.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_failed_write_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("anim.gif");
        std::fs::write(&target, b"previous").unwrap();

        let result = write_then_persist(&target, |sink| {
            sink.write_all(b"GIF89a").unwrap();
            Err(PipelineError::Write(io::Error::other("disk full").into()))
        });

        assert!(result.is_err());
        assert_eq!(std::fs::read(&target).unwrap(), b"previous");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_loop_count_mapping() {
        assert_eq!(LoopCount::from_repetitions(0), LoopCount::Forever);
        assert_eq!(LoopCount::from_repetitions(3), LoopCount::Finite(3));
        assert!(matches!(Repeat::from(LoopCount::Forever), Repeat::Infinite));
    }

    #[test]
    fn test_garbage_is_not_a_sequence() {
        assert!(decode_sequence(&b"not a gif"[..]).is_err());
    }
}
