use memsegs::platformalloc::MAPPING_SUPPORTED;
use memsegs::segmap::{SegmentMap, StackGrowth};
use memsegs::walk::{self, Entry, PAUSE_PROMPT};
use memsegs::{ADDR_HEX_DIGITS, Segment, format_addr};

use std::io::Write;
use std::process::{Command, Stdio};

fn run_bin(bin: &str, args: &[&str], stdin: &[u8]) -> (i32, String, String) {
    let mut child = Command::new(bin)
        .args(args)
        .env_remove("MEMSEGS_PAUSE")
        .env_remove("MEMSEGS_MAP")
        .env_remove("MEMSEGS_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(stdin).unwrap();
    let out = child.wait_with_output().unwrap();
    (
        out.status.code().unwrap_or(-1),
        String::from_utf8(out.stdout).unwrap(),
        String::from_utf8(out.stderr).unwrap(),
    )
}

fn address_lines(stdout: &str) -> Vec<&str> {
    stdout.lines().filter(|l| l.contains(" is at address 0x")).collect()
}

#[test]
fn demo_prints_every_storage_class() {
    let (code, stdout, _) = run_bin(env!("CARGO_BIN_EXE_memsegs"), &[], b"");
    assert_eq!(code, 0);

    let lines = address_lines(&stdout);
    assert_eq!(lines.len(), if MAPPING_SUPPORTED { 10 } else { 9 }, "{stdout}");
    assert!(lines[0].starts_with("function main is at address"));
    for name in [
        "global_initialized_var",
        "static_initialized_var",
        "static_var",
        "global_var",
        "heap_var",
        "stack_var",
        "the function's stack_var",
        "the second function's stack_var",
    ] {
        let prefix = format!("{name} is at address 0x");
        assert!(lines.iter().any(|l| l.starts_with(&prefix)), "{name} missing:\n{stdout}");
    }
}

#[test]
fn addresses_are_zero_padded_to_pointer_width() {
    let (_, stdout, _) = run_bin(env!("CARGO_BIN_EXE_memsegs"), &[], b"");
    for line in address_lines(&stdout) {
        let hex = line.rsplit("0x").next().unwrap();
        assert_eq!(hex.len(), ADDR_HEX_DIGITS, "{line}");
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()), "{line}");
    }
}

#[test]
fn map_flag_appends_the_table() {
    let (code, stdout, _) = run_bin(env!("CARGO_BIN_EXE_memsegs"), &["--map"], b"");
    assert_eq!(code, 0);
    assert!(stdout.contains("segment order"), "{stdout}");
    assert!(stdout.contains("the stack "), "{stdout}");
}

#[test]
fn pause_flag_waits_for_enter() {
    let (code, stdout, _) = run_bin(env!("CARGO_BIN_EXE_memsegs"), &["--pause"], b"\n\n\n");
    assert_eq!(code, 0);
    assert_eq!(stdout.matches(PAUSE_PROMPT).count(), 3);
}

#[test]
fn unknown_flag_exits_with_usage() {
    let (code, stdout, stderr) = run_bin(env!("CARGO_BIN_EXE_memsegs"), &["--bogus"], b"");
    assert_eq!(code, 2);
    assert!(stdout.is_empty());
    assert!(stderr.contains("unknown flag"), "{stderr}");
    assert!(stderr.contains("usage: memsegs"), "{stderr}");
}

#[test]
fn help_goes_to_stdout() {
    let (code, stdout, _) = run_bin(env!("CARGO_BIN_EXE_memsegs"), &["--help"], b"");
    assert_eq!(code, 0);
    assert!(stdout.starts_with("usage: memsegs"));
}

#[test]
fn help_survives_an_empty_log_level() {
    let out = Command::new(env!("CARGO_BIN_EXE_memsegs"))
        .arg("--help")
        .env("MEMSEGS_LOG", "")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(0));
    assert!(String::from_utf8(out.stdout).unwrap().starts_with("usage: memsegs"));
}

#[test]
fn verbose_logs_the_heap_block_to_stderr() {
    let (code, stdout, stderr) = run_bin(env!("CARGO_BIN_EXE_memsegs"), &["--verbose"], b"");
    assert_eq!(code, 0);
    assert!(stderr.contains("<DEBUG>"), "{stderr}");
    assert!(stderr.contains("freeing heap block"), "{stderr}");
    assert!(!stdout.contains("<DEBUG>"));
}

#[test]
fn segment_map_binary_prints_only_the_table() {
    let (code, stdout, _) = run_bin(env!("CARGO_BIN_EXE_print_segment_map"), &[], b"");
    assert_eq!(code, 0);
    assert!(address_lines(&stdout).is_empty(), "{stdout}");
    assert!(stdout.contains("heap_var"));
    assert!(stdout.contains("segment order"));
}

#[test]
fn live_walk_feeds_the_segment_map() {
    fn marker() {}

    let mut out = Vec::new();
    let probes = walk::run(
        &mut out,
        &mut std::io::empty(),
        Entry::new("marker", marker as fn() as usize),
        false,
    )
    .unwrap();

    let text = probes.iter().find(|p| p.segment == Segment::Text).unwrap();
    assert_eq!(text.addr, marker as fn() as usize);
    assert!(String::from_utf8(out).unwrap().contains(&format_addr(text.addr)));

    let map = SegmentMap::new(probes.clone());
    assert_eq!(map.rows().len(), probes.len());
    if cfg!(any(target_arch = "x86_64", target_arch = "aarch64")) {
        assert_eq!(map.stack_growth(), StackGrowth::Down);
    }
}
