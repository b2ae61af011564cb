use super::{GifConverter, GifOptions, UploadedVideo};
use crate::{Error, Result};
use async_trait::async_trait;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling::context::Context as Scaler;
use ffmpeg_next::software::scaling::flag::Flags;
use ffmpeg_next::{Dictionary, Packet, Rational, codec, format, frame, media};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_CONVERT_TIMEOUT: Duration = Duration::from_secs(120);

const GIF_PIXEL_FORMAT: Pixel = Pixel::RGB8;

/// Converts uploads with the linked libav libraries.
///
/// The upload is spilled to a temp file (libav demuxers want a seekable
/// input) and the decode/scale/encode loop runs on the blocking pool.
#[derive(Clone, Debug)]
pub struct FfmpegGifConverter {
    timeout: Duration,
    temp_dir: Option<PathBuf>,
}

impl FfmpegGifConverter {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            temp_dir: None,
        }
    }

    /// Keep intermediate files under `dir` instead of the system temp dir.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    fn temp_file(&self, suffix: &str) -> std::io::Result<tempfile::NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("video2gif-").suffix(suffix);
        match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
    }
}

impl Default for FfmpegGifConverter {
    fn default() -> Self {
        Self::new(DEFAULT_CONVERT_TIMEOUT)
    }
}

#[async_trait]
impl GifConverter for FfmpegGifConverter {
    async fn convert(&self, video: &UploadedVideo, options: &GifOptions) -> Result<Vec<u8>> {
        let suffix = format!(
            ".{}",
            video.format.map(|format| format.extension()).unwrap_or("bin")
        );
        let input = self.temp_file(&suffix)?.into_temp_path();
        let output = self.temp_file(".gif")?.into_temp_path();
        tokio::fs::write(&input, &video.data).await?;

        let options = options.clone();
        let deadline = Instant::now() + self.timeout;
        let task = tokio::task::spawn_blocking(move || {
            let started = Instant::now();
            let frames = transcode(&input, &output, &options, deadline)?;
            let gif = std::fs::read(&output)?;
            info!(
                frames,
                bytes = gif.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "GIF encoded"
            );
            // temp paths are removed as they drop here
            Ok::<Vec<u8>, Error>(gif)
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(joined) => joined?,
            Err(_) => Err(Error::Conversion(format!(
                "timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

/// Decode the best video stream of `input` and write a GIF to `output`.
///
/// Gives up with a conversion error once `deadline` passes, checked between
/// packets. Returns the number of frames written.
pub fn transcode(
    input: &Path,
    output: &Path,
    options: &GifOptions,
    deadline: Instant,
) -> Result<usize> {
    debug!(?input, ?output, ?options, "Converting to GIF");
    let mut ictx = format::input(input)?;

    let in_stream = ictx
        .streams()
        .best(media::Type::Video)
        .ok_or_else(|| Error::Conversion("no video stream found in upload".into()))?;
    let in_stream_index = in_stream.index();
    let in_time_base = in_stream.time_base();
    let context = codec::context::Context::from_parameters(in_stream.parameters())?;
    let mut decoder = context.decoder().video()?;

    let mut writer = GifWriter::create(output, options)?;
    let mut sampler = FrameSampler::new(in_time_base, options.fps, options.max_frames());
    let mut decoded = frame::Video::empty();

    'packets: for (stream, packet) in ictx.packets() {
        if Instant::now() >= deadline {
            warn!(frames = writer.frames, "Conversion deadline passed, abandoning");
            return Err(Error::Conversion("timed out while decoding".into()));
        }
        if stream.index() != in_stream_index {
            continue;
        }
        if let Err(error) = decoder.send_packet(&packet) {
            warn!(%error, "Video decoder: error sending packet, skipping");
            continue;
        }
        while decoder.receive_frame(&mut decoded).is_ok() {
            match sampler.next(decoded.timestamp().or(decoded.pts())) {
                Sample::Keep(pts) => writer.push(&decoded, pts)?,
                Sample::Skip => {}
                Sample::Done => break 'packets,
            }
        }
    }

    if !sampler.is_done() {
        decoder.send_eof()?;
        while decoder.receive_frame(&mut decoded).is_ok() {
            match sampler.next(decoded.timestamp().or(decoded.pts())) {
                Sample::Keep(pts) => writer.push(&decoded, pts)?,
                Sample::Skip => {}
                Sample::Done => break,
            }
        }
    }

    let frames = writer.finish()?;
    if frames == 0 {
        return Err(Error::Conversion("no video frames could be decoded".into()));
    }
    Ok(frames)
}

/// Scales decoded frames to the GIF geometry and muxes the encoded packets.
struct GifWriter {
    octx: format::context::Output,
    encoder: codec::encoder::video::Encoder,
    scaler: Option<Scaler>,
    stream_index: usize,
    encoder_time_base: Rational,
    width: u32,
    height: u32,
    frames: usize,
}

impl GifWriter {
    fn create(output: &Path, options: &GifOptions) -> Result<Self> {
        let mut octx = format::output_as(output, "gif")?;

        let gif_codec = codec::encoder::find(codec::Id::GIF)
            .ok_or_else(|| Error::Conversion("GIF encoder not available".into()))?;
        let mut config = codec::Context::new_with_codec(gif_codec)
            .encoder()
            .video()?;

        let fps = i32::try_from(options.fps)
            .map_err(|_| Error::Conversion(format!("unsupported frame rate {}", options.fps)))?;
        let encoder_time_base = Rational::new(1, fps);
        config.set_width(options.width);
        config.set_height(options.height);
        config.set_format(GIF_PIXEL_FORMAT);
        config.set_time_base(encoder_time_base);
        config.set_frame_rate(Some(Rational::new(fps, 1)));

        let encoder = config.open_with(Dictionary::new())?;

        let stream_index = {
            let mut ost = octx.add_stream(codec::Id::GIF)?;
            ost.set_parameters(&encoder);
            ost.set_time_base(encoder_time_base);
            ost.index()
        };
        octx.write_header()?;

        Ok(Self {
            octx,
            encoder,
            scaler: None,
            stream_index,
            encoder_time_base,
            width: options.width,
            height: options.height,
            frames: 0,
        })
    }

    fn push(&mut self, decoded: &frame::Video, pts: i64) -> Result<()> {
        // The scaler is built from the first decoded frame; some decoders
        // only report their pixel format once data arrives.
        let mut scaler = match self.scaler.take() {
            Some(scaler) => scaler,
            None => Scaler::get(
                decoded.format(),
                decoded.width(),
                decoded.height(),
                GIF_PIXEL_FORMAT,
                self.width,
                self.height,
                Flags::BILINEAR,
            )?,
        };

        let mut scaled = frame::Video::empty();
        let scaled_ok = match scaler.run(decoded, &mut scaled) {
            Ok(()) => true,
            Err(error) => {
                warn!(%error, pts, "Video scaler: error, skipping frame");
                false
            }
        };
        self.scaler = Some(scaler);
        if !scaled_ok {
            return Ok(());
        }

        scaled.set_pts(Some(pts));
        self.encoder.send_frame(&scaled)?;
        self.frames += 1;
        self.write_pending()
    }

    fn write_pending(&mut self) -> Result<()> {
        let stream_time_base = self
            .octx
            .stream(self.stream_index)
            .map(|stream| stream.time_base())
            .ok_or_else(|| Error::Conversion("GIF output stream vanished".into()))?;

        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, stream_time_base);
            packet.write_interleaved(&mut self.octx)?;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<usize> {
        self.encoder.send_eof()?;
        self.write_pending()?;
        self.octx.write_trailer()?;
        Ok(self.frames)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Sample {
    /// Encode the frame with this output pts.
    Keep(i64),
    Skip,
    Done,
}

/// Picks at most one source frame per output slot of `1/fps` seconds,
/// measured from the first frame's timestamp.
struct FrameSampler {
    time_base: Rational,
    fps: u32,
    max_frames: i64,
    origin: Option<i64>,
    next_slot: i64,
    done: bool,
}

impl FrameSampler {
    fn new(time_base: Rational, fps: u32, max_frames: i64) -> Self {
        Self {
            time_base,
            fps,
            max_frames,
            origin: None,
            next_slot: 0,
            done: false,
        }
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn next(&mut self, timestamp: Option<i64>) -> Sample {
        if self.done {
            return Sample::Done;
        }

        let slot = match timestamp {
            Some(ts) => {
                let origin = *self.origin.get_or_insert(ts);
                slot_for(ts - origin, self.time_base, self.fps)
            }
            None => self.next_slot,
        };

        if slot >= self.max_frames {
            self.done = true;
            return Sample::Done;
        }
        if slot < self.next_slot {
            return Sample::Skip;
        }
        self.next_slot = slot + 1;
        Sample::Keep(slot)
    }
}

fn slot_for(offset: i64, time_base: Rational, fps: u32) -> i64 {
    if time_base.denominator() == 0 || offset <= 0 {
        return 0;
    }
    let scaled = i128::from(offset) * i128::from(time_base.numerator()) * i128::from(fps);
    (scaled / i128::from(time_base.denominator())) as i64
}
