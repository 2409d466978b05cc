use clap::{Parser, Subcommand};
use monad_tiles_core::config::ROUND_SECS_DEFAULT;
use monad_tiles_core::{tier_from_remaining, GridLayout, GLYPH_SIZE};
use tracing_subscriber::EnvFilter;

mod session;
mod sim;

#[derive(Parser)]
#[command(name = "monad-tiles-cli", version, about = "Headless tools for the Monad tiles game")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the glyph grid and the number of active tiles.
    Layout,
    /// Show the reward tier for a completion with `remaining` seconds left.
    Tier {
        remaining: u32,
        #[arg(long, env = "MONAD_TILES_ROUND_SECS", default_value_t = ROUND_SECS_DEFAULT)]
        round_secs: u32,
    },
    /// Run bot players against an in-process session.
    Sim {
        #[command(subcommand)]
        command: sim::SimCommand,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Layout => print_layout(GridLayout::standard()),
        Commands::Tier {
            remaining,
            round_secs,
        } => {
            if round_secs == 0 {
                return Err("round-secs must be positive".into());
            }
            if remaining > round_secs {
                eprintln!("note: {remaining}s remaining exceeds a {round_secs}s round");
            }
            let tier = tier_from_remaining(remaining, round_secs);
            println!("{} {} (level {})", tier.emoji(), tier.name(), tier.level());
            println!("{}", tier.description());
        }
        Commands::Sim { command } => sim::run(command).await?,
    }

    Ok(())
}

fn print_layout(layout: &GridLayout) {
    println!("word: {}", layout.word());
    for row in 0..GLYPH_SIZE {
        let line: Vec<String> = layout
            .glyphs()
            .iter()
            .map(|glyph| {
                (0..GLYPH_SIZE)
                    .map(|col| if glyph.cells[row][col] { '#' } else { '.' })
                    .collect()
            })
            .collect();
        println!("{}", line.join("  "));
    }
    for glyph in layout.glyphs() {
        println!("{}: {} active", glyph.glyph, glyph.active_count());
    }
    println!("active tiles: {}", layout.total_active_tiles());
}
