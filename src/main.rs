use clap::Parser;
use dmzj_dl::run::run;
use env_logger::{Builder, Env, Target};
use log::error;
use std::process;

/// Download a comic's chapters and pages from its dmzj listing page.
#[derive(clap::Parser)]
struct Args {
    /// URL of the comic's chapter listing page
    url: String,

    /// Override the comic title used for the output directory
    #[clap(short, long)]
    title: Option<String>,

    /// Output directory (defaults to the sanitized comic title)
    #[clap(short, long)]
    directory: Option<String>,
}

#[tokio::main]
async fn main() {
    // Init logging
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.target(Target::Stdout);
    builder.init();

    // Parse Args
    let args = Args::parse();

    // Run
    if let Err(e) = run(args.url, args.title, args.directory).await {
        error!("Application error: {}", e);
        process::exit(1);
    }
}
