//! ember-elfload: host front end for the stage loader.
//!
//! Reads an ELF file, reports how the loader classifies and describes it,
//! loads it into a heap window standing in for physical memory and reports
//! the placement, the relocations applied and the final entry point.

mod cli;
mod logger;
mod report;

use std::fs;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use ember_loader::{
    ImageContext, LoadError, LoadOptions, LoadWindow, Placement, SplitImage, load_image,
};
use log::debug;

/// Largest window the tool will allocate.
const MAX_WINDOW: u64 = 1 << 30;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    logger::init(cli.level_filter());
    run(&cli)
}

/// Formats a loader error together with its status.
fn loader_error(what: &str, e: LoadError) -> anyhow::Error {
    anyhow!("{what}: {e} [{}]", e.status())
}

fn run(cli: &cli::Cli) -> Result<()> {
    let image = fs::read(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;
    println!("{}: {} bytes", cli.input.display(), image.len());

    report::print_classification(&image);
    let ctx = ImageContext::parse(&image).map_err(|e| loader_error("cannot describe image", e))?;
    report::print_image(&ctx, &image);

    let options = if cli.direct {
        LoadOptions::direct(cli.load_address)
    } else {
        LoadOptions {
            classify: !cli.no_classify,
            placement: Placement::Rebase {
                load_address: cli.load_address.unwrap_or(ctx.preferred_address),
            },
        }
    };
    let base = match options.placement {
        Placement::Direct { .. } => ctx.preferred_address,
        Placement::Rebase { load_address } => load_address,
    };

    if ctx.image_size > MAX_WINDOW {
        bail!("image spans {:#x} bytes, more than the {MAX_WINDOW:#x} byte limit", ctx.image_size);
    }
    let size = usize::try_from(ctx.image_size).context("image size does not fit in memory")?;
    let mut window = vec![0u8; size];
    debug!("window {base:#x}..{:#x}", base.wrapping_add(ctx.image_size));

    let mut mem = SplitImage::new(&image, LoadWindow::new(base, &mut window));
    let loaded = load_image(&mut mem, &options).map_err(|e| loader_error("load failed", e))?;
    report::print_load(&loaded);

    if let Some(path) = &cli.output {
        fs::write(path, &window)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("wrote {:#x} bytes to {}", window.len(), path.display());
    }
    Ok(())
}
