#![doc = include_str!("../README.md")]

// Table of contents of this file:
//
// * Public structs and methods
//   + The global variables whose addresses get printed
//   + Segments and probes
// * Modules

use std::fmt;
use std::sync::atomic::AtomicI32;

// --- Public structs and methods ---

// Interior mutability keeps these two out of .rodata: an immutable `static` of a plain integer is
// allowed to be placed in read-only memory, which would put it next to the text segment instead of
// in data/bss.

/// Zero-initialized global. Expected in the bss segment.
pub static GLOBAL_VAR: AtomicI32 = AtomicI32::new(0);

/// Global with an explicit non-zero initial value. Expected in the data segment.
pub static GLOBAL_INITIALIZED_VAR: AtomicI32 = AtomicI32::new(5);

/// The classic memory segments, plus the anonymous-mapping region that large allocations come
/// from. Declared in the textbook order, from lowest expected address to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    Text,
    Data,
    Bss,
    Heap,
    Mapped,
    Stack,
}

impl Segment {
    pub const ALL: [Segment; 6] = [
        Segment::Text,
        Segment::Data,
        Segment::Bss,
        Segment::Heap,
        Segment::Mapped,
        Segment::Stack,
    ];

    /// Position in the textbook layout, 0 being the lowest addresses.
    pub const fn rank(self) -> usize {
        self as usize
    }

    pub const fn label(self) -> &'static str {
        match self {
            Segment::Text => "text",
            Segment::Data => "data",
            Segment::Bss => "bss",
            Segment::Heap => "heap",
            Segment::Mapped => "mapped",
            Segment::Stack => "stack",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// One observed address: which variable, which segment it is expected to live in, and where it
/// actually is in this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    pub name: &'static str,
    pub segment: Segment,
    pub addr: usize,
}

impl Probe {
    pub const fn new(name: &'static str, segment: Segment, addr: usize) -> Self {
        Self { name, segment, addr }
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segment == Segment::Text {
            write!(f, "function {} is at address {}", self.name, format_addr(self.addr))
        } else {
            write!(f, "{} is at address {}", self.name, format_addr(self.addr))
        }
    }
}

/// Number of hex digits in an address on this target (16 on 64-bit, 8 on 32-bit).
pub const ADDR_HEX_DIGITS: usize = 2 * size_of::<usize>();

/// `0x`-prefixed, zero-padded to the full pointer width.
pub fn format_addr(addr: usize) -> String {
    format!("0x{:0width$x}", addr, width = ADDR_HEX_DIGITS)
}

/// The numeric address of whatever `r` refers to.
pub fn addr_of<T: ?Sized>(r: &T) -> usize {
    std::ptr::from_ref(r).addr()
}

/// One line identifying the build target, since every address printed depends on it.
pub fn banner() -> String {
    format!(
        "memsegs {} on {} ({}-bit addresses)",
        env!("CARGO_PKG_VERSION"),
        env!("MEMSEGS_TARGET"),
        usize::BITS
    )
}

// --- Modules ---

pub mod config;
pub mod logger;
pub mod platformalloc;
pub mod segmap;
pub mod walk;
