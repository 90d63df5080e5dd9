// Greedy differencer.
//
// Single left-to-right pass with a cursor into each buffer. Matching runs
// become Equal commands. After a mismatch the cursors are resynchronized by
// a bounded lookahead: first the target side is scanned for the current base
// byte, then the base side for the current target byte. If neither scan hits
// inside the window, both cursors step forward by one and the search repeats.
// The skipped target bytes become an Insert and the skipped base bytes a
// Delete.
//
// Runtime is O(n * lookahead); extra memory is the command list.

use log::{debug, trace};

use crate::error::PatchError;
use crate::patch::{Command, MAX_LEN, Patch, PatchHeader, digest};

/// Default resynchronization window.
pub const DEFAULT_LOOKAHEAD: usize = 32;

/// Differencer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffOptions {
    /// Size of the resynchronization window. Offsets `1..lookahead` are
    /// probed on each side, so a value of 1 disables lookahead entirely.
    pub lookahead: usize,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            lookahead: DEFAULT_LOOKAHEAD,
        }
    }
}

/// Build a patch that reconstructs `new` from `old`, with default options.
pub fn diff(new: &[u8], old: &[u8]) -> Result<Patch, PatchError> {
    diff_with_options(new, old, &DiffOptions::default())
}

/// Build a patch that reconstructs `new` from `old`.
pub fn diff_with_options(new: &[u8], old: &[u8], opts: &DiffOptions) -> Result<Patch, PatchError> {
    if opts.lookahead == 0 {
        return Err(PatchError::InvalidOptions(
            "lookahead window must be at least 1".into(),
        ));
    }
    for len in [new.len(), old.len()] {
        if len > MAX_LEN {
            return Err(PatchError::InputTooLarge { len });
        }
    }

    let header = PatchHeader {
        new_len: new.len() as u32,
        old_len: old.len() as u32,
        new_digest: digest::compute(new)?,
    };
    let commands = Differ::new(new, old, opts.lookahead).run();

    debug!(
        "diff: new={} old={} commands={} lookahead={}",
        new.len(),
        old.len(),
        commands.len(),
        opts.lookahead
    );

    Ok(Patch { header, commands })
}

// ---------------------------------------------------------------------------
// Matcher state
// ---------------------------------------------------------------------------

struct Differ<'a> {
    new: &'a [u8],
    old: &'a [u8],
    lookahead: usize,
    /// Cursor into `new`.
    i: usize,
    /// Cursor into `old`.
    j: usize,
    commands: Vec<Command>,
}

impl<'a> Differ<'a> {
    fn new(new: &'a [u8], old: &'a [u8], lookahead: usize) -> Self {
        Self {
            new,
            old,
            lookahead,
            i: 0,
            j: 0,
            commands: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<Command> {
        while self.i < self.new.len() || self.j < self.old.len() {
            let run = self.common_run();
            if run > 0 {
                trace!("equal {run} at new={} old={}", self.i, self.j);
                // Both buffers are at most MAX_LEN long, so the run fits.
                self.commands.push(Command::Equal { len: run as u32 });
                self.i += run;
                self.j += run;
                continue;
            }

            let (new_start, old_start) = (self.i, self.j);
            self.resync();

            if self.i > new_start {
                trace!("insert {} at new={new_start}", self.i - new_start);
                self.commands.push(Command::Insert {
                    data: self.new[new_start..self.i].to_vec(),
                });
            }
            if self.j > old_start {
                trace!("delete {} at old={old_start}", self.j - old_start);
                self.commands.push(Command::Delete {
                    data: self.old[old_start..self.j].to_vec(),
                });
            }
        }
        self.commands
    }

    /// Length of the run where both cursors agree.
    fn common_run(&self) -> usize {
        self.new[self.i..]
            .iter()
            .zip(&self.old[self.j..])
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Advance the cursors past a mismatching region until they agree again
    /// or both buffers are exhausted.
    fn resync(&mut self) {
        let (new, old) = (self.new, self.old);
        let mut first = true;

        loop {
            // After stepping both cursors, they may already agree.
            if !first && self.i < new.len() && self.j < old.len() && new[self.i] == old[self.j] {
                return;
            }
            first = false;

            if self.j < old.len() {
                let target = old[self.j];
                let hit = (1..self.lookahead)
                    .take_while(|look| self.i + look < new.len())
                    .find(|look| new[self.i + look] == target);
                if let Some(look) = hit {
                    self.i += look;
                    return;
                }
            }

            if self.i < new.len() {
                let target = new[self.i];
                let hit = (1..self.lookahead)
                    .take_while(|look| self.j + look < old.len())
                    .find(|look| old[self.j + look] == target);
                if let Some(look) = hit {
                    self.j += look;
                    return;
                }
            }

            if self.i < new.len() {
                self.i += 1;
            }
            if self.j < old.len() {
                self.j += 1;
            }
            if self.i >= new.len() && self.j >= old.len() {
                return;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
