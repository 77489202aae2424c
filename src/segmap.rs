//! A table of every probe sorted by address, and what can be read off it.

use crate::{Probe, Segment, format_addr};

use bytesize::ByteSize;
use std::fmt;
use std::io::{self, Write};
use thousands::Separable;

fn conv(size: usize) -> String {
    ByteSize::b(size as u64).to_string_as(true) // true for binary units (KiB, MiB, GiB, etc.)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackGrowth {
    /// Each deeper frame sits at a lower address.
    Down,
    Up,
    /// Fewer than two frames, or frames that are not monotonic.
    Unknown,
}

impl fmt::Display for StackGrowth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackGrowth::Down => write!(f, "the stack grows down (toward lower addresses)"),
            StackGrowth::Up => write!(f, "the stack grows up (toward higher addresses)"),
            StackGrowth::Unknown => write!(f, "the stack growth direction could not be determined"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SegmentMap {
    /// In the order they were taken; for the stack that is outermost frame first.
    walk_order: Vec<Probe>,
    sorted: Vec<Probe>,
}

impl SegmentMap {
    pub fn new(probes: Vec<Probe>) -> Self {
        let mut sorted = probes.clone();
        sorted.sort_by_key(|p| (p.addr, p.segment));
        Self { walk_order: probes, sorted }
    }

    pub fn rows(&self) -> &[Probe] {
        &self.sorted
    }

    /// Distance from each row to the row before it; `None` for the lowest.
    pub fn gaps(&self) -> impl Iterator<Item = (&Probe, Option<usize>)> {
        self.sorted.iter().enumerate().map(|(i, p)| {
            let gap = i.checked_sub(1).map(|j| p.addr - self.sorted[j].addr);
            (p, gap)
        })
    }

    pub fn stack_growth(&self) -> StackGrowth {
        let frames: Vec<usize> = self
            .walk_order
            .iter()
            .filter(|p| p.segment == Segment::Stack)
            .map(|p| p.addr)
            .collect();
        if frames.len() < 2 {
            return StackGrowth::Unknown;
        }
        if frames.windows(2).all(|w| w[1] < w[0]) {
            StackGrowth::Down
        } else if frames.windows(2).all(|w| w[1] > w[0]) {
            StackGrowth::Up
        } else {
            StackGrowth::Unknown
        }
    }

    /// The segments present, ordered by the lowest address seen in each.
    pub fn observed_order(&self) -> Vec<Segment> {
        let mut lowest: Vec<(usize, Segment)> = Segment::ALL
            .iter()
            .filter_map(|&s| {
                self.sorted.iter().find(|p| p.segment == s).map(|p| (p.addr, s))
            })
            .collect();
        lowest.sort();
        lowest.into_iter().map(|(_, s)| s).collect()
    }

    /// Whether this run put its segments in the order text < data < bss < heap < stack (with the
    /// mapped region, if present, between heap and stack).
    pub fn matches_textbook_order(&self) -> bool {
        self.observed_order().windows(2).all(|w| w[0].rank() < w[1].rank())
    }

    pub fn render<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(
            out,
            "{:<7} {:<32} {:<w$} {:>10} {:>22}",
            "segment",
            "name",
            "address",
            "gap",
            "gap bytes",
            w = crate::ADDR_HEX_DIGITS + 2
        )?;
        writeln!(
            out,
            "{:<7} {:<32} {:<w$} {:>10} {:>22}",
            "-------",
            "----",
            "-------",
            "---",
            "---------",
            w = crate::ADDR_HEX_DIGITS + 2
        )?;
        for (p, gap) in self.gaps() {
            let (human, raw) = match gap {
                Some(g) => (conv(g), g.separate_with_commas()),
                None => (String::new(), String::new()),
            };
            writeln!(
                out,
                "{:<7} {:<32} {} {:>10} {:>22}",
                p.segment,
                p.name,
                format_addr(p.addr),
                human,
                raw
            )?;
        }
        writeln!(out)?;

        writeln!(out, "{}", self.stack_growth())?;

        let order = self
            .observed_order()
            .iter()
            .map(|s| s.label())
            .collect::<Vec<_>>()
            .join(" < ");
        if self.matches_textbook_order() {
            writeln!(out, "segment order matches the textbook model: {order}")
        } else {
            writeln!(out, "segment order differs from the textbook model: {order}")
        }
    }
}
