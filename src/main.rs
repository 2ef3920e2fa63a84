use std::env;
use std::path::PathBuf;

use pressmark::config::{read_config, Config};
use pressmark::logger::configure_logger;
use pressmark::server::server_run;

fn open_config() -> Config {
    // Config lives next to the executable unless a path is given
    let cfg_path = match env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let exe_path = env::current_exe().unwrap();
            exe_path.parent().unwrap().join("pressmark.toml")
        }
    };
    read_config(&cfg_path).unwrap()
}

#[ntex::main]
async fn main() -> std::io::Result<()> {
    let config = open_config();
    if let Err(e) = configure_logger(&config) {
        eprintln!("Error configuring logger: {}", e);
    }
    server_run(config).await
}
