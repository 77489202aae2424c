use memsegs::config::{Config, ENV, USAGE};
use memsegs::segmap::SegmentMap;
use memsegs::walk::{self, Entry};
use memsegs::{banner, logger};

use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    let config = match Config::from_env_and_args(&ENV, std::env::args().skip(1)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("memsegs: {e}");
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
    };
    if config.help {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    // Only fails if a logger is already installed.
    logger::init(config.log_level).ok();
    log::debug!("{config:?}");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let stdin = io::stdin();
    let mut input = stdin.lock();

    let entry = Entry::new("main", (main as fn() -> ExitCode) as usize);

    let res = writeln!(out, "{}\n", banner())
        .and_then(|()| walk::demonstrate(&mut out, &mut input, entry, config.pause));

    let probes = match res {
        Ok(p) => p,
        Err(e) => {
            log::error!("writing the report failed: {e}");
            eprintln!("memsegs: {e}");
            return ExitCode::FAILURE;
        }
    };

    if config.map {
        let res = writeln!(out).and_then(|()| SegmentMap::new(probes).render(&mut out));
        if let Err(e) = res {
            eprintln!("memsegs: {e}");
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}
