//! Apply shim command-line tool.

use apply_shim::{parse_args, run};
use env_logger::{Builder, Env};
use log::{error, info};
use std::env;
use std::io;
use std::process::exit;

fn main() {
    let _log_init: Result<(), _> = Builder::from_env(Env::default().filter_or("RUST_LOG", "warn"))
        .is_test(false)
        .try_init();
    let mut args = env::args();
    let _prog_name: Option<String> = args.next();
    let options = match parse_args(args) {
        Ok(options) => options,
        Err(err) => {
            error!("{err:#}");
            exit(1);
        }
    };
    let stdout = io::stdout();
    match run(&options, &mut stdout.lock()) {
        Ok(count) => {
            info!("[APPLY_SHIM] completed: {count} stylesheets");
        }
        Err(err) => {
            error!("error: {err:#}");
            exit(1);
        }
    }
}
