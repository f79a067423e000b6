// SPDX-License-Identifier: GPL-2.0-or-later

mod app;

use app::run;
use std::path::PathBuf;

#[tokio::main]
async fn main() {
    #[cfg(tokio_unstable)]
    {
        println!("tokio tracing enabled");
        console_subscriber::init();
    }

    let args = match parse_args() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&args.config).await {
        eprintln!("failed to run app: {e}");
        std::process::exit(1);
    }
}

const DEFAULT_CONFIG_PATH: &str = "./configs/sentryshot.toml";

#[derive(Debug)]
pub struct Args {
    pub config: PathBuf,
}

fn parse_args() -> Result<Args, pico_args::Error> {
    let mut pargs = pico_args::Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        println!("usage: sentryshot [--config <path>]");
        std::process::exit(0);
    }

    let config = pargs
        .opt_value_from_str("--config")?
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    Ok(Args { config })
}
