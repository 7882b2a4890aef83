//! Command-line argument parsing for the sky viewer.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Sky viewer command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "aether", about = "Precomputed atmospheric scattering viewer")]
pub struct CliArgs {
    /// Window width.
    #[arg(long)]
    pub width: Option<u32>,

    /// Window height.
    #[arg(long)]
    pub height: Option<u32>,

    /// Start in fullscreen.
    #[arg(long)]
    pub fullscreen: Option<bool>,

    /// Number of scattering orders to precompute.
    #[arg(long)]
    pub orders: Option<u32>,

    /// Exposure applied before tone mapping.
    #[arg(long)]
    pub exposure: Option<f32>,

    /// Store Mie single scattering in a separate table.
    #[arg(long)]
    pub separate_mie: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(w) = args.width {
            self.window.width = w;
        }
        if let Some(h) = args.height {
            self.window.height = h;
        }
        if let Some(fs) = args.fullscreen {
            self.window.fullscreen = fs;
        }
        if let Some(orders) = args.orders {
            self.sky.num_scattering_orders = orders;
        }
        if let Some(exposure) = args.exposure {
            self.render.exposure = exposure;
        }
        if args.separate_mie {
            self.sky.combine_scattering_textures = false;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
