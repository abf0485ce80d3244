use crate::server;
use crate::watch::{run_watch, WatchArgs};
use clap::{Args, Parser, Subcommand};
use site_notices::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Site Notices",
    about = "Poll service-status notices and serve the banner contract to the front end",
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
    /// Print the notice banner to the terminal as it changes
    Watch(WatchArgs),
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
        Command::Watch(args) => run_watch(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_serve_without_subcommand() {
        let cli = Cli::try_parse_from(["site-notices"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_watch_once() {
        let cli = Cli::try_parse_from(["site-notices", "watch", "--once"]).expect("parses");
        match cli.command {
            Some(Command::Watch(args)) => assert!(args.once),
            other => panic!("expected watch command, got {other:?}"),
        }
    }

    #[test]
    fn parses_serve_overrides() {
        let cli = Cli::try_parse_from(["site-notices", "serve", "--host", "0.0.0.0", "--port", "8081"])
            .expect("parses");
        match cli.command {
            Some(Command::Serve(args)) => {
                assert_eq!(args.host.as_deref(), Some("0.0.0.0"));
                assert_eq!(args.port, Some(8081));
            }
            other => panic!("expected serve command, got {other:?}"),
        }
    }
}
