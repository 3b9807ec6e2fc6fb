use crate::demo::{run_catalog_list, run_catalog_seed, run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use enrollment_approvals::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Enrollment Approvals",
    about = "Run and demonstrate the enrollment request approval workflow",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Inspect the standard course catalog
    Catalog {
        #[command(subcommand)]
        command: CatalogCommand,
    },
    /// Walk one request through coordinator, registrar and instructor review
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum CatalogCommand {
    /// Seed the standard courses, reporting which already existed
    Seed,
    /// List active courses after seeding
    List,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Catalog {
            command: CatalogCommand::Seed,
        } => run_catalog_seed(),
        Command::Catalog {
            command: CatalogCommand::List,
        } => run_catalog_list(),
        Command::Demo(args) => run_demo(args),
    }
}
