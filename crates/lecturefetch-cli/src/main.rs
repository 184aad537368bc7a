use clap::{ArgAction, Parser, Subcommand};
use commands::{browse, catalog, config, fetch};

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "lecturefetch")]
#[command(about = "LectureFetch - Browse the lecture archive and collect downloads into your library")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive session: search, browse topics and queue downloads
    #[command(long_about = "Log in, then search the archive or pick a topic, browse results page by page and queue lessons for download. Finished downloads are moved from the browser's temporary folder into the configured library folder.")]
    Browse,
    /// Search and download without prompts
    #[command(long_about = "Run a single search and download the listed result items, waiting until every download has been moved into the library folder or has failed.")]
    Fetch {
        /// Search text (a query starting with \"הרב\" searches rabbis)
        #[arg(long)]
        query: String,

        /// Comma-separated result positions to download (zero-based)
        #[arg(long, value_delimiter = ',', required = true)]
        items: Vec<usize>,

        /// Seconds to wait for outstanding downloads after the last one is queued
        #[arg(long, default_value_t = 600)]
        wait_secs: u64,
    },
    /// List the topic catalog
    Topics,
    /// List storage locations that can hold the library folder
    Locations,
    /// Manage configuration and credentials
    #[command(long_about = "View or change configuration. Running without a subcommand shows the current configuration.")]
    Config {
        #[command(subcommand)]
        cmd: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration (masks the password)
    Show {
        /// Show stored secrets unmasked
        #[arg(long, action = ArgAction::SetTrue)]
        full: bool,
    },
    /// Store the institution code and password used to log in
    Credentials {
        /// Institution code (if not provided, will prompt)
        #[arg(long)]
        code: Option<String>,
    },
    /// Choose where the library folder lives
    #[command(long_about = "Choose the storage location that holds the library folder. Without --path, pick from the detected locations.")]
    SetDestination {
        #[arg(long)]
        path: Option<std::path::PathBuf>,
    },
    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Browse);

    // Menus own the terminal during browse, so logs go to the file there
    let log_file = match command {
        Commands::Browse => Some(commands::path_manager().log_file()),
        _ => None,
    };
    logging::init_logging_with_file(cli.verbose, cli.quiet, log_file)
        .map_err(|e| color_eyre::eyre::eyre!("{}", e))?;

    let output = output::Output::new(cli.output, cli.quiet);

    match command {
        Commands::Browse => browse::run_browse(&output).await,
        Commands::Fetch { query, items, wait_secs } => fetch::run_fetch(&query, &items, wait_secs, &output).await,
        Commands::Topics => catalog::run_topics(&output),
        Commands::Locations => catalog::run_locations(&output),
        Commands::Config { cmd } => {
            let cmd = cmd.unwrap_or(ConfigCommands::Show { full: false });
            config::run_config(cmd, &output).await
        }
    }
}
