use memsegs::config::{DEFAULT_LOG_LEVEL, ENV};
use memsegs::segmap::SegmentMap;
use memsegs::walk::{self, Entry};
use memsegs::{banner, logger};

use std::io::{self, Write};
use std::process::ExitCode;

// Same walk as `memsegs`, but only the sorted table is printed.
fn main() -> ExitCode {
    logger::init(ENV.log_level.clone().unwrap_or(DEFAULT_LOG_LEVEL)).ok();

    let entry = Entry::new("main", (main as fn() -> ExitCode) as usize);
    let res = walk::demonstrate(&mut io::sink(), &mut io::empty(), entry, false).and_then(|probes| {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        writeln!(out, "{}\n", banner())?;
        SegmentMap::new(probes).render(&mut out)
    });

    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("print_segment_map: {e}");
            ExitCode::FAILURE
        }
    }
}
