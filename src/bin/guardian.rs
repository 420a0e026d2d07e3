use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use guardian::cli::{self, Command};

fn init_tracing(log_file: Option<&Path>) -> std::io::Result<()> {
    use tracing_subscriber::fmt::{time::ChronoLocal, writer::BoxMakeWriter};
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_env("GUARDIAN_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    let (writer, ansi) = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stdout), true),
    };

    // Install global collector configured based on GUARDIAN_LOG env var.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_timer(ChronoLocal::rfc_3339())
        .with_thread_ids(true)
        .with_ansi(ansi)
        .with_writer(writer)
        .init();

    Ok(())
}

fn main() {
    let command = cli::parse();

    if let Err(err) = init_tracing(command.log_file().as_deref()) {
        eprintln!("open log file {}: {}", command.logpath, err);
        std::process::exit(1);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .on_thread_start(|| tracing::trace!("thread start"))
        .on_thread_stop(|| tracing::trace!("thread stop"))
        .enable_io()
        .enable_time()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    };

    runtime.block_on(async {
        run(command.command).await;
    })
}

async fn run(command: Command) {
    let result = match command {
        Command::Server(server) => server.run().await,
        Command::Hash(hash) => hash.run().await,
    };

    if let Err(err) = result {
        tracing::error!(cause = %err, "Exit");
        eprintln!("{}", err);
        std::process::exit(1);
    }
}
