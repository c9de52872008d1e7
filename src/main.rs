use std::env;
use std::process::exit;
use std::thread::sleep;
use std::time::Duration;

use log::{error, info};

use protozoa::config;
use protozoa::error::Error;
use protozoa::logger;
use protozoa::poller::Poller;
use protozoa::stats;
use protozoa::timer::Timer;

/// Log file to use when daemonized
const LOG_FILE: &str = "/var/log/protozoa";

/// Run one configuration until it errors or the config file changes.
fn run_protozoa(dryrun: bool, stats_on: bool) -> Result<(), Error> {
    info!("protozoa: v{}", env!("CARGO_PKG_VERSION"));
    stats::init(stats_on);
    let cfg = config::Config::read(&config::config_file())?;
    if dryrun {
        return Ok(());
    }
    let mut mixer = cfg.into_mixer();
    mixer.defer.set_timer(Timer::new()?);
    let mut poller = Poller::new(mixer, &config::config_file())?;
    poller.run()
}

fn main() {
    let mut daemonize = false;
    let mut dryrun = false;
    let mut options = logger::Options::default();
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--daemonize" => daemonize = true,
            "--debug" => options.debug = true,
            "--dryrun" => dryrun = true,
            "--packet" => options.packet = true,
            "--stats" => options.stats = true,
            _ => (),
        }
    }
    let logfile = if daemonize { Some(LOG_FILE) } else { None };
    if let Err(err) = logger::init(options, logfile) {
        eprintln!("protozoa: {}", err);
        exit(err.os_code());
    }
    info!("================== protozoa init ===============");
    if daemonize {
        if unsafe { libc::daemon(0, 0) } < 0 {
            let err = std::io::Error::last_os_error();
            error!("Cannot daemonize: {}", err);
            exit(err.raw_os_error().unwrap_or(1));
        }
    }
    loop {
        let res = run_protozoa(dryrun, options.stats);
        if dryrun {
            match res {
                Ok(()) => exit(0),
                Err(err) => {
                    error!("Error: {}", err);
                    exit(err.os_code());
                }
            }
        }
        match res {
            Ok(()) => info!("{} modified", config::config_file()),
            Err(err) => error!("Error: {}", err),
        }
        info!("** reloading **");
        // don't chew through CPU
        sleep(Duration::from_secs(1));
    }
}
