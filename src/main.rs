//! The command-line front end. Argument parsing, mapping the image, invoking the core,
//! and exit-code selection all live here, not in the core.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use fat12fsck::mapped_image::MappedImage;

/// FAT12 filesystem consistency checker and repair tool.
#[derive(Parser, Debug)]
#[command(name = "fat12fsck", version, about)]
struct Cli {
    /// Path to the FAT12 image file. Scanned and repaired in place.
    image: PathBuf,

    /// Print the pre-repair directory tree before scanning (informational only).
    #[arg(long)]
    list: bool,

    /// Run detection passes but discard the mutated buffer instead of writing it back.
    #[arg(long)]
    dry_run: bool,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease log verbosity (repeatable).
    #[arg(short, long, action = clap::ArgAction::Count)]
    quiet: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("fat12fsck: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    let level = match cli.verbose as i8 - cli.quiet as i8 {
        i8::MIN..=-2 => "error",
        -1 => "warn",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    // RUST_LOG, when set, still wins over the verbosity flags.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut mapped =
        MappedImage::open(&cli.image).with_context(|| format!("opening {}", cli.image.display()))?;

    if cli.list {
        let outcome = fat12fsck::engine::list(mapped.as_mut_slice())
            .with_context(|| format!("listing {}", cli.image.display()))?;
        for entry in &outcome.listed {
            println!("{entry}");
        }
    }

    if cli.dry_run {
        // Scan a throwaway copy so the real mapping is never dirtied, then discard it:
        // print what would have changed, write nothing.
        let mut scratch = mapped.as_mut_slice().to_vec();
        let report = fat12fsck::engine::scan(&mut scratch)
            .with_context(|| format!("scanning {}", cli.image.display()))?;
        print_report(&report);
        return Ok(());
    }

    let report = fat12fsck::engine::scan(mapped.as_mut_slice())
        .with_context(|| format!("scanning {}", cli.image.display()))?;
    print_report(&report);

    mapped
        .flush()
        .with_context(|| format!("flushing {}", cli.image.display()))?;

    Ok(())
}

fn print_report(report: &fat12fsck::Report) {
    if report.is_clean() {
        println!("no inconsistencies found");
    } else {
        println!("{}", report.transcript());
    }
}
