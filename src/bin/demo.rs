//! Minimal end-to-end drive of one supervised session: initialize the
//! context, open a session, wait for the page, read the heading, and
//! optionally serve a screenshot.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use drover::{Drover, SessionOptions};

#[derive(Parser)]
#[command(name = "drover-demo", about = "Drive one supervised WebDriver session")]
struct Args {
    /// Port the engine listens on (spawned or adopted).
    #[arg(long, env = "DROVER_PORT", default_value_t = 9515)]
    port: u16,

    /// Page to load.
    #[arg(long, default_value = "http://example.com/")]
    url: String,

    /// Run the browser headless.
    #[arg(long)]
    headless: bool,

    /// Serve a screenshot of the final page state.
    #[arg(long)]
    snap: bool,

    /// Wire the engine's output through for debugging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let args = Args::parse();

    let drover = Drover::new();
    drover
        .initialize(args.port, args.verbose)
        .await
        .context("initializing the driver context")?;

    let outcome = run(&drover, &args).await;
    drover.shutdown().await;
    outcome
}

async fn run(drover: &Drover, args: &Args) -> anyhow::Result<()> {
    let session = drover
        .new_session(SessionOptions {
            headless: args.headless,
            timeout: Duration::from_secs(60),
            ..Default::default()
        })
        .await
        .context("opening a session")?;

    session.navigate(&args.url).await?;
    session.wait_for_any(&["//h1", "//body"]).await?;

    let heading = session.locate_one("//h1").await?;
    println!("{}", heading.text().await);

    if args.snap {
        session.capture_snapshot().await?;
    }

    session.close().await?;
    Ok(())
}
