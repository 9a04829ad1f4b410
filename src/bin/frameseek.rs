use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use rayon::prelude::*;

use frameseek::foundation::log;
use frameseek::{
    CacheConfig, CancelToken, Channel, CodecSettings, DecodedFrame, Decoder, DecoderCacheKey,
    DecoderOptions, Encoder, EncoderOptions, FrameCache, FrameCacheKey, FrameSink, LogLevel,
    Logger, PixelFormat, ProResProfile, Rational, SinkConfig, StreamSelector, TestPattern,
};

#[derive(Parser, Debug)]
#[command(name = "frameseek", version)]
struct Cli {
    /// Increase log verbosity (`-v` info, `-vv` debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the video stream headers of a file as JSON.
    Info(InfoArgs),
    /// Decode a range of frames to PNG files.
    Extract(ExtractArgs),
    /// Encode a synthetic test pattern.
    Synth(SynthArgs),
}

#[derive(Parser, Debug)]
struct InfoArgs {
    /// Input media file.
    input: PathBuf,
}

#[derive(Parser, Debug)]
struct ExtractArgs {
    /// Input media file.
    input: PathBuf,

    /// First frame to extract (1-based).
    #[arg(long)]
    frame: i64,

    /// Last frame to extract, inclusive. Defaults to `--frame`.
    #[arg(long)]
    to: Option<i64>,

    /// Stream index; negative selects the best video stream.
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    stream: i64,

    /// Filter graph applied before conversion (e.g. `vflip`).
    #[arg(long, default_value = "")]
    filter: String,

    /// Output directory for `frame_NNNNNN.png` files.
    #[arg(long)]
    out: PathBuf,

    /// Optional JSON cache configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override rayon worker threads.
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Parser, Debug)]
struct SynthArgs {
    /// Output movie path; the container follows the extension.
    out: PathBuf,

    /// Number of frames.
    #[arg(long, default_value_t = 48)]
    frames: i64,

    /// Frame width.
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Frame height.
    #[arg(long, default_value_t = 480)]
    height: u32,

    /// Frames per second.
    #[arg(long, default_value_t = 24)]
    fps: i32,

    /// Output codec.
    #[arg(long, value_enum, default_value_t = CodecChoice::Prores4444)]
    codec: CodecChoice,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CodecChoice {
    Prores,
    Prores4444,
    H264,
    Mjpeg,
}

impl CodecChoice {
    fn settings(self) -> CodecSettings {
        match self {
            Self::Prores => CodecSettings::ProRes {
                profile: ProResProfile::Standard,
            },
            Self::Prores4444 => CodecSettings::ProRes {
                profile: ProResProfile::P4444,
            },
            Self::H264 => CodecSettings::H264 {
                crf: 18,
                preset: "medium".to_string(),
            },
            Self::Mjpeg => CodecSettings::Mjpeg { quality: 2 },
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.cmd {
        Command::Info(args) => cmd_info(args),
        Command::Extract(args) => cmd_extract(args),
        Command::Synth(args) => cmd_synth(args),
    }
}

fn init_logging(verbose: u8) {
    let (max_level, level) = match verbose {
        0 => (tracing::Level::WARN, LogLevel::Warning),
        1 => (tracing::Level::INFO, LogLevel::Info),
        _ => (tracing::Level::DEBUG, LogLevel::Debug),
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(max_level)
        .init();
    log::install(Logger::tracing(level));
}

fn cmd_info(args: InfoArgs) -> anyhow::Result<()> {
    let decoder = Decoder::open(&args.input, DecoderOptions::default())
        .with_context(|| format!("open '{}'", args.input.display()))?;
    let json = serde_json::to_string_pretty(decoder.stream_headers())?;
    println!("{json}");
    Ok(())
}

fn cmd_extract(args: ExtractArgs) -> anyhow::Result<()> {
    let last = args.to.unwrap_or(args.frame);
    anyhow::ensure!(
        args.frame >= 1 && last >= args.frame,
        "frame range {}..={last} is empty or starts below 1",
        args.frame
    );

    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("read cache config '{}'", path.display()))?;
            CacheConfig::from_json_str(&json)?
        }
        None => CacheConfig::default(),
    };
    let span = usize::try_from(last - args.frame + 1)?;
    config.max_frames = config.max_frames.max(span);
    let cache = FrameCache::new(&config);

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("create output dir '{}'", args.out.display()))?;

    let decoder = DecoderCacheKey::new(&args.input).with_filter(args.filter.clone());
    let stream = StreamSelector::from_host(args.stream);
    let cancel = CancelToken::new();

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = args.threads {
        anyhow::ensure!(n > 0, "--threads must be >= 1");
        builder = builder.num_threads(n);
    }
    let pool = builder.build().context("build rayon thread pool")?;

    pool.install(|| {
        (args.frame..=last).into_par_iter().try_for_each(|frame_nb| {
            let key = FrameCacheKey::new(decoder.clone(), stream, frame_nb);
            let frame = cache
                .get(&key, &cancel)
                .into_result()
                .with_context(|| format!("decode frame {frame_nb}"))?;
            let path = args.out.join(format!("frame_{frame_nb:06}.png"));
            write_png(&path, &frame)
        })
    })?;

    eprintln!(
        "wrote {} frame(s) to {}",
        last - args.frame + 1,
        args.out.display()
    );
    Ok(())
}

fn cmd_synth(args: SynthArgs) -> anyhow::Result<()> {
    anyhow::ensure!(args.frames >= 1, "--frames must be >= 1");
    let frame_rate = Rational::positive(args.fps, 1)?;
    let options = EncoderOptions::new(&args.out, args.width, args.height, frame_rate)
        .with_codec(args.codec.settings());
    let pattern = TestPattern::new(args.width, args.height);

    let mut encoder = Encoder::new(options);
    encoder.begin(SinkConfig {
        width: args.width,
        height: args.height,
        frame_rate,
    })?;
    for index in 0..args.frames {
        let frame = pattern.frame(index)?;
        encoder.push_frame(frame.frame_nb, &frame)?;
    }
    encoder.end()?;

    eprintln!("wrote {} ({} frames)", args.out.display(), args.frames);
    Ok(())
}

fn write_png(path: &Path, frame: &DecodedFrame) -> anyhow::Result<()> {
    let (channels, color): (&[Channel], image::ColorType) = match frame.pix_fmt() {
        PixelFormat::Gray => (&[Channel::Gray], image::ColorType::L8),
        PixelFormat::Rgb => (&[Channel::R, Channel::G, Channel::B], image::ColorType::Rgb8),
        PixelFormat::Rgba => (
            &[Channel::R, Channel::G, Channel::B, Channel::A],
            image::ColorType::Rgba8,
        ),
        PixelFormat::None => anyhow::bail!("frame {} carries no pixels", frame.frame_nb),
    };

    let planes: Vec<&[f32]> = channels.iter().map(|&c| frame.channel(c).as_slice()).collect();
    let mut bytes = Vec::with_capacity(frame.plane_len() * planes.len());
    for i in 0..frame.plane_len() {
        for plane in &planes {
            bytes.push((plane[i].clamp(0.0, 1.0) * 255.0).round() as u8);
        }
    }

    image::save_buffer_with_format(
        path,
        &bytes,
        frame.width(),
        frame.height(),
        color,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", path.display()))
}
