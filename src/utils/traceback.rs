//! # Tracebacks
//!
//! Text reports for exceptions that crossed, or are about to cross, the remote
//! boundary.
//!
//! A report is a list of `\n`-terminated lines. The plain form mirrors the
//! usual "most recent call last" layout. The detailed form adds the source
//! line and a dump of the local values of every frame after the first. When
//! the exception carries a traceback from the remote side, that traceback is
//! appended between delimiter lines with each line prefixed by ` | `, so a
//! failure that crossed several hops shows one nested section per hop.
//!
//! Formatting never fails: a value whose `Debug` or `Display` implementation
//! panics or errors is shown as `<ERROR>`.

use crate::config::TracebackConfig;
use crate::core::exception::Exception;
use std::any::Any;
use std::fmt::{self, Write as _};
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Width of the separator lines in detailed reports.
pub const SEPARATOR_WIDTH: usize = 52;

/// Name under which a frame's receiver is listed among its locals.
pub const RECEIVER_NAME: &str = "self";

const ERROR_REPR: &str = "<ERROR>";
const REMOTE_HEADER: &str = " +--- This exception occurred remotely - Remote traceback:";
const REMOTE_FOOTER: &str = " +--- End of remote traceback";

fn separator() -> String {
    format!("{}\n", "-".repeat(SEPARATOR_WIDTH))
}

fn render(f: impl FnOnce(&mut String) -> fmt::Result) -> Option<String> {
    catch_unwind(AssertUnwindSafe(|| {
        let mut out = String::new();
        f(&mut out).ok().map(|()| out)
    }))
    .ok()
    .flatten()
}

/// `Debug` form, else `Display` form, else `<ERROR>`.
pub fn best_effort_repr<T>(value: &T) -> String
where
    T: fmt::Debug + fmt::Display + ?Sized,
{
    render(|out| write!(out, "{value:?}"))
        .or_else(|| render(|out| write!(out, "{value}")))
        .unwrap_or_else(|| ERROR_REPR.to_string())
}

/// `Debug` form, else `<ERROR>`.
pub fn debug_repr<T: fmt::Debug + ?Sized>(value: &T) -> String {
    render(|out| write!(out, "{value:?}")).unwrap_or_else(|| ERROR_REPR.to_string())
}

/// `Display` form, else `<ERROR>`.
pub fn display_repr<T: fmt::Display + ?Sized>(value: &T) -> String {
    render(|out| write!(out, "{value}")).unwrap_or_else(|| ERROR_REPR.to_string())
}

/// A named local value of a stack frame, already rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct Local {
    name: String,
    repr: String,
    attributes: Vec<(String, String)>,
}

impl Local {
    pub fn new<T: fmt::Debug + ?Sized>(name: impl Into<String>, value: &T) -> Self {
        Self::from_repr(name, debug_repr(value))
    }

    /// Local rendered through [`best_effort_repr`].
    pub fn best_effort<T>(name: impl Into<String>, value: &T) -> Self
    where
        T: fmt::Debug + fmt::Display + ?Sized,
    {
        Self::from_repr(name, best_effort_repr(value))
    }

    pub fn from_repr(name: impl Into<String>, repr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repr: repr.into(),
            attributes: Vec::new(),
        }
    }

    /// Add a field of the receiver; only listed when the local is `self`.
    pub fn with_attribute<T: fmt::Debug + ?Sized>(
        mut self,
        name: impl Into<String>,
        value: &T,
    ) -> Self {
        self.attributes.push((name.into(), debug_repr(value)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn repr(&self) -> &str {
        &self.repr
    }
}

/// One stack frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub file: String,
    pub line: u32,
    pub function: String,
    /// Type name of the receiver, for methods.
    pub receiver: Option<String>,
    /// Source text of the line; read from `file` when absent.
    pub source: Option<String>,
    pub locals: Vec<Local>,
}

impl Frame {
    pub fn new(file: impl Into<String>, line: u32, function: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            function: function.into(),
            ..Self::default()
        }
    }

    pub fn with_receiver(mut self, type_name: impl Into<String>) -> Self {
        self.receiver = Some(type_name.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_local(mut self, local: Local) -> Self {
        self.locals.push(local);
        self
    }

    /// `Type.function` for methods, else the bare function name.
    pub fn location(&self) -> String {
        match &self.receiver {
            Some(receiver) => format!("{receiver}.{}", self.function),
            None => self.function.clone(),
        }
    }

    pub fn source_line(&self) -> Option<String> {
        if let Some(source) = &self.source {
            return Some(source.trim().to_string());
        }
        let index = usize::try_from(self.line).ok()?.checked_sub(1)?;
        let text = std::fs::read_to_string(&self.file).ok()?;
        text.lines().nth(index).map(|l| l.trim().to_string())
    }
}

/// Call stack of a failure, outermost frame first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Traceback {
    frames: Vec<Frame>,
}

impl Traceback {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    /// Capture the current call stack. Frames without file information are
    /// left out, as are the capture machinery's own frames.
    pub fn capture() -> Self {
        let backtrace = backtrace::Backtrace::new();
        let mut frames: Vec<Frame> = backtrace
            .frames()
            .iter()
            .flat_map(|frame| frame.symbols())
            .filter_map(|symbol| {
                let function = symbol.name()?.to_string();
                if function.starts_with("backtrace::") || function.contains("Traceback::capture") {
                    return None;
                }
                let file = symbol.filename()?.display().to_string();
                Some(Frame::new(file, symbol.lineno().unwrap_or(0), function))
            })
            .collect();
        frames.reverse();
        Self { frames }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

fn exception_line(exception: &Exception) -> String {
    format!("{}\n", display_repr(exception))
}

fn plain_report(exception: &Exception, traceback: &Traceback) -> Vec<String> {
    let mut lines = Vec::new();
    if !traceback.is_empty() {
        lines.push("Traceback (most recent call last):\n".to_string());
    }
    for frame in traceback.frames() {
        lines.push(format!(
            "  File \"{}\", line {}, in {}\n",
            frame.file,
            frame.line,
            frame.location()
        ));
        if let Some(source) = frame.source_line().filter(|s| !s.is_empty()) {
            lines.push(format!("    {source}\n"));
        }
    }
    lines.push(exception_line(exception));
    lines
}

fn detailed_report(exception: &Exception, traceback: &Traceback) -> Vec<String> {
    let banner = format!(
        " EXCEPTION {}: {}\n",
        exception.class(),
        display_repr(&exception.message())
    );
    let mut lines = vec![
        separator(),
        banner.clone(),
        " Extended stacktrace follows (most recent call last)\n".to_string(),
    ];
    for (index, frame) in traceback.frames().iter().enumerate() {
        lines.push(separator());
        lines.push(format!(
            "File \"{}\", line {}, in {}\n",
            frame.file,
            frame.line,
            frame.location()
        ));
        lines.push("Source code:\n".to_string());
        lines.push(format!("    {}\n", frame.source_line().unwrap_or_default()));
        if index == 0 {
            continue;
        }
        lines.push("Local values:\n".to_string());
        let mut locals: Vec<&Local> = frame.locals.iter().collect();
        locals.sort_by(|a, b| a.name.cmp(&b.name));
        for local in locals {
            lines.push(format!("    {} = {}\n", local.name, local.repr));
            if local.name == RECEIVER_NAME {
                for (name, repr) in &local.attributes {
                    lines.push(format!("        self.{name} = {repr}\n"));
                }
            }
        }
    }
    lines.push(separator());
    lines.push(banner);
    lines.push(separator());
    lines
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Format the local part of a report.
pub fn format_traceback(exception: &Exception, traceback: &Traceback, detailed: bool) -> Vec<String> {
    if !detailed {
        return plain_report(exception, traceback);
    }
    match catch_unwind(AssertUnwindSafe(|| detailed_report(exception, traceback))) {
        Ok(lines) => lines,
        Err(payload) => {
            let plain: String = plain_report(exception, traceback).concat();
            vec![
                format!("{}Error building extended traceback!!! :\n", separator()),
                format!("{}\n{}", panic_message(payload.as_ref()), separator()),
                "Original Exception follows:\n".to_string(),
                plain,
            ]
        }
    }
}

/// Wrap a remote traceback between delimiter lines, prefixing every line.
pub fn format_remote_traceback(remote_lines: &[String]) -> Vec<String> {
    let mut lines = vec![format!("{REMOTE_HEADER}\n")];
    for chunk in remote_lines {
        let chunk = chunk.strip_suffix('\n').unwrap_or(chunk);
        lines.extend(chunk.split('\n').map(|line| format!(" | {line}\n")));
    }
    lines.push(format!("{REMOTE_FOOTER}\n"));
    lines
}

/// The local report followed by the remote section, if the exception has one.
pub fn remote_traceback_report(
    exception: &Exception,
    traceback: &Traceback,
    detailed: bool,
) -> Vec<String> {
    let mut lines = format_traceback(exception, traceback, detailed);
    if let Some(remote) = exception.remote_traceback() {
        lines.extend(format_remote_traceback(remote));
    }
    lines
}

/// [`remote_traceback_report`] in the form the configuration asks for.
pub fn configured_report(
    exception: &Exception,
    traceback: &Traceback,
    config: &TracebackConfig,
) -> Vec<String> {
    remote_traceback_report(exception, traceback, config.detailed)
}

/// Write the full report, e.g. to stderr for an uncaught remote failure.
pub fn write_report<W: io::Write>(
    out: &mut W,
    exception: &Exception,
    traceback: &Traceback,
    detailed: bool,
) -> io::Result<()> {
    for line in remote_traceback_report(exception, traceback, detailed) {
        out.write_all(line.as_bytes())?;
    }
    out.flush()
}
