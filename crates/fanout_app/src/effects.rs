use std::io::{self, Write};

use fanout_core::Effect;

/// Executes report effects against the three output streams.
pub struct EffectRunner<O, P, D> {
    output: O,
    progress: P,
    diagnostics: D,
}

impl<O: Write, P: Write, D: Write> EffectRunner<O, P, D> {
    pub fn new(output: O, progress: P, diagnostics: D) -> Self {
        Self {
            output,
            progress,
            diagnostics,
        }
    }

    pub fn apply(&mut self, effects: Vec<Effect>) -> io::Result<()> {
        for effect in effects {
            match effect {
                Effect::Emit(payload) => writeln!(self.output, "{payload}")?,
                Effect::ReportFailure { url, cause } => {
                    writeln!(self.diagnostics, "fetch {url} failed: {cause}")?
                }
                Effect::Progress(line) => writeln!(self.progress, "{line}")?,
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> io::Result<()> {
        self.output.flush()?;
        self.progress.flush()?;
        self.diagnostics.flush()
    }

    #[cfg(test)]
    fn into_parts(self) -> (O, P, D) {
        (self.output, self.progress, self.diagnostics)
    }
}
