//! Frame resolver: recovers the source location of a log call
//!
//! Each engine calibrates a frame `depth` once at construction: the number of
//! physical frames between the stack walk and the engine's dispatch that are
//! always present. Those frames are skipped without symbolication. The walk
//! then resolves the remaining frames, lands in this crate, steps over every
//! frame that belongs to it, and finally applies the user's additional
//! `skip` for call sites wrapped in their own helpers.
//!
//! Optimised builds inline freely, so one physical frame may hold several
//! functions. Symbols are classified per function: anything inlined into a
//! function of this crate belongs to the crate, and each user function counts
//! once towards `skip` whether or not it was inlined. If the calibrated depth
//! overshoots (the first resolved frame is already user code), the walk is
//! repeated from the top of the stack.
//!
//! When symbols are unavailable, the `#[track_caller]` location captured by
//! the facade is used instead.

use std::panic::Location;
use std::path::Path;

const CRATE_PREFIX: &str = concat!(env!("CARGO_CRATE_NAME"), "::");

const RUNTIME_PREFIXES: &[&str] = &["std::", "core::", "alloc::", "backtrace::"];

/// Stack walker parameterised by a calibrated depth and a user skip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameResolver {
    depth: usize,
    skip: usize,
}

impl FrameResolver {
    pub fn new(depth: usize, skip: usize) -> Self {
        Self { depth, skip }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn skip(&self) -> usize {
        self.skip
    }

    /// `dir/file.rs:line` of the originating call
    pub fn resolve(&self, call_site: &'static Location<'static>) -> String {
        self.walk()
            .unwrap_or_else(|| format_caller(Path::new(call_site.file()), call_site.line()))
    }

    fn walk(&self) -> Option<String> {
        let step = match self.walk_from(self.depth) {
            Step::Overshot => self.walk_from(0),
            step => step,
        };
        match step {
            Step::Found(caller) => caller,
            Step::Continue | Step::Overshot => None,
        }
    }

    #[inline(never)]
    fn walk_from(&self, depth: usize) -> Step {
        let mut physical = depth;
        let mut search = CallerSearch::new(self.skip, depth > 0);
        let mut symbols: Vec<FrameSymbol> = Vec::new();
        let mut step = Step::Continue;

        backtrace::trace(|frame| {
            if physical > 0 {
                physical -= 1;
                return true;
            }

            symbols.clear();
            backtrace::resolve_frame(frame, |symbol| {
                if let Some(name) = symbol.name().map(|n| format!("{:#}", n)) {
                    symbols.push(FrameSymbol::new(&name, || {
                        match (symbol.filename(), symbol.lineno()) {
                            (Some(file), Some(line)) => Some(format_caller(file, line)),
                            _ => None,
                        }
                    }));
                }
            });

            step = search.frame(&symbols);
            step == Step::Continue
        });

        step
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Runtime,
    Internal,
    External,
}

/// One function of a physical frame; inlined callees come before callers
#[derive(Debug, Clone, PartialEq, Eq)]
struct FrameSymbol {
    owner: Owner,
    location: Option<String>,
}

impl FrameSymbol {
    fn new(name: &str, location: impl FnOnce() -> Option<String>) -> Self {
        let owner = if is_runtime(name) {
            Owner::Runtime
        } else if is_internal(name) {
            Owner::Internal
        } else {
            Owner::External
        };
        let location = if owner == Owner::External {
            location()
        } else {
            None
        };
        Self { owner, location }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Continue,
    Found(Option<String>),
    /// The first resolved frame was already past this crate
    Overshot,
}

/// Caller selection over physical frames, innermost first
struct CallerSearch {
    skip: usize,
    landed: bool,
    /// Frames were skipped blind, so the first symbol must be internal
    strict: bool,
}

impl CallerSearch {
    fn new(skip: usize, strict: bool) -> Self {
        Self {
            skip,
            landed: false,
            strict,
        }
    }

    fn frame(&mut self, symbols: &[FrameSymbol]) -> Step {
        // A symbol is internal if it, or a function it is inlined into, is.
        let mut internal = vec![false; symbols.len()];
        let mut inside = false;
        for (i, symbol) in symbols.iter().enumerate().rev() {
            inside |= symbol.owner == Owner::Internal;
            internal[i] = inside;
        }

        for (symbol, internal) in symbols.iter().zip(internal) {
            if symbol.owner == Owner::Runtime {
                continue;
            }
            if internal {
                self.landed = true;
                self.strict = false;
                continue;
            }
            if !self.landed {
                if self.strict {
                    return Step::Overshot;
                }
                continue;
            }
            if self.skip > 0 {
                self.skip -= 1;
                continue;
            }
            return Step::Found(symbol.location.clone());
        }
        Step::Continue
    }
}

/// Frames of this crate, excluding its own test modules
fn is_internal(symbol: &str) -> bool {
    let name = symbol.trim_start_matches('<');
    name.starts_with(CRATE_PREFIX) && !name.contains("::tests::")
}

/// Standard library and unwinder frames never count as callers
fn is_runtime(symbol: &str) -> bool {
    let name = symbol.trim_start_matches('<');
    RUNTIME_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Keep the last directory and the file name, like `src/main.rs:42`
pub(crate) fn format_caller(file: &Path, line: u32) -> String {
    let mut parts: Vec<String> = file
        .components()
        .rev()
        .take(2)
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.reverse();
    format!("{}:{}", parts.join("/"), line)
}
