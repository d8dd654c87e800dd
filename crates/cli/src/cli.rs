//! Command-line definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "horde", version, about = "Client for the AI Horde image generation network")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate images from a prompt
    Generate(GenerateArgs),

    /// Print a share link that reproduces a generation form
    Share {
        #[command(flatten)]
        form: GenerateArgs,
        /// Base URL of the web client the link should open
        #[arg(long, default_value = "https://aqualxx.github.io/stable-ui/")]
        base_url: String,
    },

    /// Caption, NSFW-check or tag an image
    Interrogate {
        /// Image URL, or a path to a local image
        source: String,
        /// Forms to run: caption, nsfw, interrogation
        #[arg(short, long, value_delimiter = ',', default_value = "caption")]
        forms: Vec<String>,
    },

    /// Rate images
    #[command(subcommand)]
    Rate(RateCommand),

    /// Manage generated outputs
    #[command(subcommand)]
    Outputs(OutputsCommand),

    /// Show account, server load and news
    Dashboard {
        /// Keep refreshing until interrupted
        #[arg(long)]
        watch: bool,
    },

    /// Show the kudos leaderboard
    Leaderboard {
        /// Rank by: kudos, megapixelsteps (default: stored setting)
        #[arg(short, long)]
        key: Option<String>,
        /// Lowest first
        #[arg(long)]
        ascending: bool,
    },

    /// List Horde workers
    Workers {
        /// Only online workers
        #[arg(long)]
        online: bool,
        /// Only trusted workers
        #[arg(long)]
        trusted: bool,
        /// Only workers serving a matching model
        #[arg(short, long)]
        model: Option<String>,
        /// Sort by: name, uptime, requests, megapixelsteps
        #[arg(short, long, default_value = "name")]
        sort: String,
        /// Keep refreshing until interrupted
        #[arg(long)]
        watch: bool,
    },

    /// Paint an inpainting mask from strokes
    Mask(MaskArgs),

    /// Show or change stored settings
    #[command(subcommand)]
    Settings(SettingsCommand),
}

/// The generation form.
#[derive(Args, Debug, Clone, Default)]
pub struct GenerateArgs {
    /// Positive prompt. `positive ### negative` is also accepted.
    pub prompt: Option<String>,
    /// Negative prompt
    #[arg(long)]
    pub negative: Option<String>,
    /// Start from the form encoded in a client URL (query or share link)
    #[arg(long)]
    pub url: Option<String>,
    /// Start from a bare share payload
    #[arg(long)]
    pub share: Option<String>,
    #[arg(long)]
    pub sampler: Option<String>,
    #[arg(long)]
    pub seed: Option<String>,
    #[arg(long)]
    pub steps: Option<u32>,
    #[arg(long)]
    pub cfg_scale: Option<f32>,
    #[arg(long)]
    pub width: Option<u32>,
    #[arg(long)]
    pub height: Option<u32>,
    /// Number of images
    #[arg(short, long)]
    pub n: Option<u32>,
    /// Model to request
    #[arg(short, long)]
    pub model: Option<String>,
    #[arg(long)]
    pub karras: Option<bool>,
    /// Post-processors, comma separated
    #[arg(long, value_delimiter = ',')]
    pub post_processing: Vec<String>,
    /// Source image for img2img, inpainting or outpainting
    #[arg(long)]
    pub source_image: Option<PathBuf>,
    /// Inpainting mask (white = repaint)
    #[arg(long)]
    pub source_mask: Option<PathBuf>,
    /// img2img, inpainting or outpainting
    #[arg(long)]
    pub source_processing: Option<String>,
    #[arg(long)]
    pub denoising_strength: Option<f32>,
    /// Allow NSFW results
    #[arg(long)]
    pub nsfw: bool,
    /// Only use trusted workers
    #[arg(long)]
    pub trusted_workers: bool,
}

#[derive(Subcommand)]
pub enum RateCommand {
    /// Fetch the next dataset image to rate
    Next,
    /// Rate a dataset image
    Dataset {
        image_id: String,
        /// 1-10
        rating: u8,
        /// 0 (none) to 5 (severe)
        #[arg(short, long, default_value_t = 0)]
        artifacts: u8,
    },
    /// Rate one of your own outputs
    Output {
        id: u32,
        /// 1-10
        rating: u8,
        /// 0 (none) to 5 (severe)
        #[arg(short, long)]
        artifacts: Option<u8>,
    },
}

#[derive(Subcommand)]
pub enum OutputsCommand {
    /// List outputs one page at a time
    List {
        #[arg(short, long, default_value_t = 1)]
        page: usize,
        /// Sort by: id, starred
        #[arg(short, long, default_value = "id")]
        sort: String,
    },
    /// Show one output's metadata
    Show { id: u32 },
    /// Toggle the star on an output
    Star { id: u32 },
    /// Delete outputs (ids shift down afterwards)
    Delete {
        #[arg(required = true)]
        ids: Vec<u32>,
    },
    /// Write outputs to disk
    Export {
        /// Ids to export (default: all)
        ids: Vec<u32>,
        /// Target directory, or archive path with --zip
        #[arg(short, long)]
        output: PathBuf,
        /// Write one zip archive of image + JSON pairs
        #[arg(long)]
        zip: bool,
        /// webp, png or jpeg (default: stored setting)
        #[arg(short, long)]
        format: Option<String>,
        /// Embed generation metadata as EXIF (default: stored setting)
        #[arg(long)]
        embed_metadata: Option<bool>,
    },
}

#[derive(Args)]
pub struct MaskArgs {
    /// Background image
    pub image: PathBuf,
    /// JSON file holding an array of strokes
    /// (`{"points": [[x, y], ...], "brush_size": 20, "mode": "draw"}`)
    pub strokes: PathBuf,
    /// Where to write the mask
    #[arg(short, long)]
    pub output: PathBuf,
    /// Also write the background with the overlay tint here
    #[arg(long)]
    pub preview: Option<PathBuf>,
    /// Drop this many trailing strokes (undo)
    #[arg(long, default_value_t = 0)]
    pub undo: usize,
}

#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Show all settings
    List,
    Get { key: String },
    Set { key: String, value: String },
}
