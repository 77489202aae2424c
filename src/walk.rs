//! The demonstration itself: take the address of one variable of each storage class, print it,
//! and call down two frames to show which way the stack grows.
//!
//! Output goes to any [`Write`] and pauses read from any [`BufRead`], so the binaries hand over
//! stdout/stdin and the tests hand over buffers.

use crate::platformalloc::{AllocFailed, Backing, HeapBlock, OsBacking};
use crate::{Probe, Segment, addr_of};

use std::alloc::handle_alloc_error;
use std::fmt;
use std::hint::black_box;
use std::io::{self, BufRead, Write};
use std::mem::MaybeUninit;
use std::sync::atomic::AtomicI32;

pub const PAUSE_PROMPT: &str = "(press Enter to continue)";

#[derive(Debug)]
pub enum WalkError {
    Io(io::Error),
    Alloc(AllocFailed),
}

impl std::error::Error for WalkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WalkError::Io(e) => Some(e),
            WalkError::Alloc(e) => Some(e),
        }
    }
}

impl fmt::Display for WalkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalkError::Io(e) => write!(f, "writing the report failed: {e}"),
            WalkError::Alloc(e) => write!(f, "heap_var: {e}"),
        }
    }
}

impl From<io::Error> for WalkError {
    fn from(e: io::Error) -> Self {
        WalkError::Io(e)
    }
}

impl From<AllocFailed> for WalkError {
    fn from(e: AllocFailed) -> Self {
        WalkError::Alloc(e)
    }
}

/// The function whose code address stands in for the text segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub name: &'static str,
    pub addr: usize,
}

impl Entry {
    pub const fn new(name: &'static str, addr: usize) -> Self {
        Self { name, addr }
    }
}

struct Walk<'a, W: Write, R: BufRead> {
    out: &'a mut W,
    input: &'a mut R,
    pause: bool,
    probes: Vec<Probe>,
}

impl<W: Write, R: BufRead> Walk<'_, W, R> {
    fn report(&mut self, name: &'static str, segment: Segment, addr: usize) -> io::Result<()> {
        let probe = Probe::new(name, segment, addr);
        log::trace!("{name}: {segment} {addr:#x}");
        writeln!(self.out, "{probe}")?;
        self.probes.push(probe);
        Ok(())
    }

    fn blank(&mut self) -> io::Result<()> {
        writeln!(self.out)
    }

    fn pause(&mut self) -> io::Result<()> {
        if !self.pause {
            return Ok(());
        }
        writeln!(self.out, "{PAUSE_PROMPT}")?;
        self.out.flush()?;

        // End of input just means nobody is there to press Enter.
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(())
    }
}

/// [`run`] for the binaries: without the heap block there is nothing to demonstrate, so its
/// allocation failure aborts the process with the standard diagnostic.
pub fn demonstrate<W: Write, R: BufRead>(
    out: &mut W,
    input: &mut R,
    entry: Entry,
    pause: bool,
) -> io::Result<Vec<Probe>> {
    match run(out, input, entry, pause) {
        Ok(probes) => Ok(probes),
        Err(WalkError::Alloc(_)) => handle_alloc_error(HeapBlock::LAYOUT),
        Err(WalkError::Io(e)) => Err(e),
    }
}

/// Runs the whole demonstration from this frame, which plays the part of the entry routine.
///
/// Fails only if writing fails or the 4-byte heap block cannot be allocated; a page that cannot be
/// mapped is logged and left out.
pub fn run<W: Write, R: BufRead>(
    out: &mut W,
    input: &mut R,
    entry: Entry,
    pause: bool,
) -> Result<Vec<Probe>, WalkError> {
    run_with(&OsBacking, out, input, entry, pause)
}

#[inline(never)]
pub fn run_with<B: Backing, W: Write, R: BufRead>(
    backing: &B,
    out: &mut W,
    input: &mut R,
    entry: Entry,
    pause: bool,
) -> Result<Vec<Probe>, WalkError> {
    // Function-scoped statics: the same storage as globals, only the name is local.
    static STATIC_INITIALIZED_VAR: AtomicI32 = AtomicI32::new(5);
    static STATIC_VAR: AtomicI32 = AtomicI32::new(0);

    let stack_var = MaybeUninit::<i32>::uninit();
    let heap_var = backing.heap_block()?;
    let mapped_page = match backing.mapped_page() {
        Some(Ok(page)) => Some(page),
        Some(Err(e)) => {
            log::warn!("skipping mapped_page: {e}");
            None
        }
        None => {
            log::debug!("no page mapping on this platform, skipping mapped_page");
            None
        }
    };

    let mut w = Walk { out, input, pause, probes: Vec::new() };

    w.report(entry.name, Segment::Text, entry.addr)?;
    w.blank()?;

    let global_initialized_var = addr_of(&crate::GLOBAL_INITIALIZED_VAR);
    w.report("global_initialized_var", Segment::Data, global_initialized_var)?;
    w.report("static_initialized_var", Segment::Data, addr_of(&STATIC_INITIALIZED_VAR))?;
    w.blank()?;

    w.report("static_var", Segment::Bss, addr_of(&STATIC_VAR))?;
    w.report("global_var", Segment::Bss, addr_of(&crate::GLOBAL_VAR))?;
    w.blank()?;

    w.report("heap_var", Segment::Heap, heap_var.addr())?;
    if let Some(page) = &mapped_page {
        w.report("mapped_page", Segment::Mapped, page.addr())?;
    }
    w.blank()?;

    w.report("stack_var", Segment::Stack, addr_of(black_box(&stack_var)))?;
    function(&mut w)?;

    drop(mapped_page);
    heap_var.release();

    w.pause()?;
    w.out.flush()?;
    Ok(w.probes)
}

#[inline(never)]
fn function<W: Write, R: BufRead>(w: &mut Walk<'_, W, R>) -> io::Result<()> {
    let stack_var = MaybeUninit::<i32>::uninit();
    let addr = addr_of(black_box(&stack_var));
    w.report("the function's stack_var", Segment::Stack, addr)?;
    w.pause()?;
    test(w)
}

#[inline(never)]
fn test<W: Write, R: BufRead>(w: &mut Walk<'_, W, R>) -> io::Result<()> {
    let stack_var = MaybeUninit::<i32>::uninit();
    let addr = addr_of(black_box(&stack_var));
    w.report("the second function's stack_var", Segment::Stack, addr)?;
    w.pause()
}
