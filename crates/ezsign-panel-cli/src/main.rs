//! EZ-Sign Panel Control Tool
//!
//! CLI for writing images and test patterns to EZ-Sign NFC e-paper panels
//! through a PC/SC reader.

mod config;
mod input;
mod pattern;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ezsign_panel_hw::transport::list_readers;
use ezsign_panel_hw::{
    CancelToken, Device, EncodeOptions, PcscTransport, Product, Profile, ReaderSelector,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use input::CropRect;
use pattern::Pattern;

#[derive(Parser)]
#[command(name = "ezsignctl")]
#[command(about = "Write images to EZ-Sign NFC e-paper panels")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List attached PC/SC readers
    Readers,
    /// List supported panel profiles
    Profiles {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write an image or test pattern to the panel
    Write(WriteArgs),
}

#[derive(clap::Args)]
struct WriteArgs {
    /// Content: image, random, checker, hstripe, vstripe
    #[arg(long, default_value = "image")]
    mode: String,

    /// Input image path (required in image mode)
    #[arg(long, short)]
    input: Option<PathBuf>,

    /// Crop rectangle x,y,w,h applied before resizing
    #[arg(long)]
    crop: Option<CropRect>,

    /// Enable dithering in image mode
    #[arg(long)]
    dither: bool,

    /// Random seed for random mode
    #[arg(long)]
    seed: Option<u64>,

    /// Product: 2.9-2c, 2.9-4c, 4.2-2c, 4.2-4c
    #[arg(long)]
    product: Option<String>,

    /// PC/SC reader name (default: first reader)
    #[arg(long)]
    reader: Option<String>,

    /// PC/SC reader index (zero-based)
    #[arg(long, allow_negative_numbers = true)]
    reader_index: Option<isize>,

    /// Refresh poll interval in milliseconds
    #[arg(long)]
    poll_ms: Option<u64>,

    /// Maximum refresh polls
    #[arg(long)]
    poll_attempts: Option<u32>,

    /// Image payload bytes per APDU (1-250)
    #[arg(long)]
    max_fragment: Option<usize>,
}

impl WriteArgs {
    /// Overlays command-line flags on the file configuration.
    fn apply(&self, config: &mut Config) {
        if let Some(product) = &self.product {
            config.product = product.clone();
        }
        if let Some(reader) = &self.reader {
            config.reader = Some(reader.clone());
        }
        if let Some(index) = self.reader_index {
            config.reader_index = Some(index);
        }
        if self.dither {
            config.dither = true;
        }
        if let Some(ms) = self.poll_ms {
            config.poll_ms = ms;
        }
        if let Some(attempts) = self.poll_attempts {
            config.poll_attempts = attempts;
        }
        if let Some(n) = self.max_fragment {
            config.max_fragment = n;
        }
    }
}

/// What to put on the panel.
enum Content {
    Image(image::DynamicImage),
    Pixels(Vec<u8>),
}

#[derive(Serialize)]
struct ProfileInfo {
    product: String,
    width: usize,
    height: usize,
    bits_per_pixel: u8,
    colors: usize,
    blocks: usize,
    bytes_per_row: usize,
}

impl From<Profile> for ProfileInfo {
    fn from(p: Profile) -> Self {
        Self {
            product: p.product.to_string(),
            width: p.width,
            height: p.height,
            bits_per_pixel: p.bits_per_pixel,
            colors: p.colors(),
            blocks: p.block_count(),
            bytes_per_row: p.bytes_per_row(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match &cli.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from: {}", path.display());
            config
        }
        None => Config::default(),
    };

    match cli.command {
        Commands::Readers => handle_readers(),
        Commands::Profiles { json } => handle_profiles(json),
        Commands::Write(args) => handle_write(args, config).await,
    }
}

fn handle_readers() -> Result<()> {
    let readers = list_readers().context("Failed to list PC/SC readers")?;
    if readers.is_empty() {
        println!("No readers found");
    }
    for (i, reader) in readers.iter().enumerate() {
        println!("{}: {}", i, reader);
    }
    Ok(())
}

fn handle_profiles(json: bool) -> Result<()> {
    let profiles: Vec<ProfileInfo> = Profile::presets().map(ProfileInfo::from).collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&profiles)?);
        return Ok(());
    }
    println!("Profiles:");
    for p in profiles {
        println!(
            "  {}  {}x{}, {} colors, {} blocks",
            p.product, p.width, p.height, p.colors, p.blocks
        );
    }
    Ok(())
}

async fn handle_write(args: WriteArgs, mut config: Config) -> Result<()> {
    args.apply(&mut config);

    let product: Product = config.product.parse()?;
    let profile = Profile::from_product(product);
    let session = config.session();
    session.validate().context("Invalid session settings")?;

    let mut selectors = Vec::new();
    if let Some(name) = &config.reader {
        selectors.push(ReaderSelector::Name(name.clone()));
    }
    if let Some(index) = config.reader_index {
        selectors.push(ReaderSelector::Index(index));
    }

    // Load content before touching the reader.
    let content = if args.mode.eq_ignore_ascii_case("image") {
        let path = args
            .input
            .as_deref()
            .context("--input is required for image mode")?;
        let mut img = input::load_image(path)?;
        if let Some(rect) = args.crop {
            img = input::crop(&img, rect).context("Failed to crop image")?;
        }
        Content::Image(img)
    } else {
        let pattern: Pattern = args.mode.parse()?;
        let seed = args.seed.unwrap_or_else(rand::random);
        info!("Rendering {:?} pattern (seed {})", pattern, seed);
        Content::Pixels(pattern.render(&profile, &mut StdRng::seed_from_u64(seed)))
    };
    let options = EncodeOptions {
        dither: config.dither,
    };

    let cancel = CancelToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling write");
            ctrl_c.cancel();
        }
    });

    let task = tokio::task::spawn_blocking(move || -> Result<()> {
        let mut device = Device::<PcscTransport>::open(product, &selectors)
            .context("Failed to open device")?;
        device.set_config(session)?;
        println!("reader: {}", device.reader_name());
        println!(
            "profile: {} ({}x{}, {} colors)",
            profile.product,
            profile.width,
            profile.height,
            profile.colors()
        );

        let result = match &content {
            Content::Image(img) => device.write_image(img, options, &cancel),
            Content::Pixels(pixels) => device.write_pixels(pixels, &cancel),
        };
        let closed = device.close();
        result.context("Failed to write panel")?;
        closed.context("Failed to close device")?;
        Ok(())
    });
    task.await.context("Write task panicked")??;

    println!("write complete");
    Ok(())
}
