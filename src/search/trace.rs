//! Trace stream for improving-solution events.
//!
//! One fixed-width line is written per improving best-so-far event, with
//! a column header at the start of each trial. The default stream is
//! stderr; a file can be configured instead.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

pub struct Trace {
    out: Box<dyn Write>,
}

impl Trace {
    pub fn new(out: Box<dyn Write>) -> Self {
        Trace { out }
    }

    /// Trace to the process's diagnostic stream.
    pub fn stderr() -> Self {
        Trace::new(Box::new(io::stderr()))
    }

    /// Trace to a file, truncating any previous content.
    pub fn to_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(|e| format!("trace file {} cannot be opened: {}", path.display(), e))?;
        Ok(Trace::new(Box::new(file)))
    }

    /// Write a `#`-prefixed comment line.
    pub fn comment(&mut self, text: &str) {
        let _ = writeln!(self.out, "# {}", text);
    }

    /// Write the column header preceding each trial's events.
    pub fn header(&mut self) {
        let _ = writeln!(
            self.out,
            "# Trial Iteration     Cost  Cviols     Time  {:>8}  {:>8}",
            "TimeLS", "TimeSampling"
        );
    }

    /// Record one improving best-so-far event.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &mut self,
        trial: usize,
        iteration: u64,
        cost: f64,
        violations: u32,
        elapsed: f64,
        local_search_time: f64,
        sampling_time: f64,
    ) {
        let _ = writeln!(
            self.out,
            "{:7} {:9} {:8.2}  {:6}  {:8.1}  {:8.1}  {:8.1}",
            trial, iteration, cost, violations, elapsed, local_search_time, sampling_time
        );
        let _ = self.out.flush();
    }
}
