//! Reporting of generator statistics in a machine-readable format.
//!
//! Statistics are emitted as `PREFIX name=value` lines through a [`StatisticsLogger`] owned by
//! the caller; the command line front end constructs one when statistic logging is requested.
//! A configurable closing line marks the end of a block of statistics, for output formats which
//! require one.

use std::fmt::Display;
use std::io::stdout;
use std::io::Write;

use convert_case::Case;
use convert_case::Casing;
use log::debug;

/// Writes `PREFIX name=value` statistic lines to an output sink.
///
/// Write failures are reported through the [`log`] crate and otherwise ignored; statistic
/// reporting never affects the run it reports on.
pub struct StatisticsLogger {
    /// Printed in front of every statistic line.
    prefix: &'static str,
    /// Closing line written by [`StatisticsLogger::finish`].
    postfix: Option<&'static str>,
    /// Casing applied to statistic names; names are emitted unchanged when absent.
    casing: Option<Case>,
    writer: Box<dyn Write>,
}

impl StatisticsLogger {
    /// Creates a logger which writes to standard output.
    pub fn new(prefix: &'static str, postfix: Option<&'static str>, casing: Option<Case>) -> Self {
        StatisticsLogger {
            prefix,
            postfix,
            casing,
            writer: Box::new(stdout()),
        }
    }

    /// Replaces the output sink.
    pub fn with_writer(mut self, writer: Box<dyn Write>) -> Self {
        self.writer = writer;
        self
    }

    /// Writes one `name=value` statistic line.
    pub fn log(&mut self, name: impl Display, value: impl Display) {
        let name = match self.casing {
            Some(casing) => name.to_string().to_case(casing),
            None => name.to_string(),
        };
        if let Err(error) = writeln!(self.writer, "{} {name}={value}", self.prefix) {
            debug!("could not write statistic {name}: {error}");
        }
    }

    /// Writes the closing line, if one is configured, and flushes the sink.
    pub fn finish(mut self) {
        if let Some(postfix) = self.postfix {
            if let Err(error) = writeln!(self.writer, "{postfix}") {
                debug!("could not write the statistics closing line: {error}");
            }
        }
        if let Err(error) = self.writer.flush() {
            debug!("could not flush the statistics sink: {error}");
        }
    }
}
