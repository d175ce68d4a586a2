use std::{
    borrow::Cow,
    cell::RefCell,
    fmt,
    io::{self, Write as _},
    rc::Rc,
};

/// Trait for handling output from the engine's `print()` function.
///
/// The engine's global `print` is replaced at construction time with a host
/// function that forwards to an implementation of this trait. The default
/// implementation `StdPrint` writes to stdout.
pub trait PrintWriter {
    /// Called once for each formatted argument passed to `print()`.
    ///
    /// This method is responsible for writing only the given argument's text, and must
    /// not add separators or a trailing newline. Separators (a single space) and the
    /// final newline are emitted via [`PrintWriter::stdout_push`].
    fn stdout_write(&mut self, output: Cow<'_, str>) -> io::Result<()>;

    /// Add a single character to stdout.
    ///
    /// Called to add spaces between arguments and the terminating newline.
    fn stdout_push(&mut self, end: char) -> io::Result<()>;
}

/// Default `PrintWriter` that writes to stdout.
///
/// Output is flushed whenever a line is terminated, since the engine has no
/// teardown step that could flush it later.
#[derive(Debug, Default)]
pub struct StdPrint;

impl PrintWriter for StdPrint {
    fn stdout_write(&mut self, output: Cow<'_, str>) -> io::Result<()> {
        io::stdout().lock().write_all(output.as_bytes())
    }

    fn stdout_push(&mut self, end: char) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        let mut buf = [0; 4];
        stdout.write_all(end.encode_utf8(&mut buf).as_bytes())?;
        if end == '\n' {
            stdout.flush()?;
        }
        Ok(())
    }
}

/// A `PrintWriter` that collects all output into a string.
///
/// Clones share the same buffer, so one clone can be handed to the engine while
/// the caller keeps another to read what was printed.
#[derive(Debug, Default, Clone)]
pub struct CollectStringPrint(Rc<RefCell<String>>);

impl CollectStringPrint {
    /// Creates a new empty `CollectStringPrint`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the output collected so far.
    ///
    /// # Panics
    /// Panics if the buffer is currently borrowed mutably, which only happens while
    /// the engine is in the middle of a `print()` call.
    #[must_use]
    pub fn output(&self) -> String {
        self.0.borrow().clone()
    }

    /// Empties the buffer and returns what it held.
    pub fn take(&self) -> String {
        self.0.take()
    }
}

impl fmt::Display for CollectStringPrint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.borrow())
    }
}

impl PrintWriter for CollectStringPrint {
    fn stdout_write(&mut self, output: Cow<'_, str>) -> io::Result<()> {
        self.0.borrow_mut().push_str(&output);
        Ok(())
    }

    fn stdout_push(&mut self, end: char) -> io::Result<()> {
        self.0.borrow_mut().push(end);
        Ok(())
    }
}

/// `PrintWriter` that ignores all output.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn stdout_write(&mut self, _output: Cow<'_, str>) -> io::Result<()> {
        Ok(())
    }

    fn stdout_push(&mut self, _end: char) -> io::Result<()> {
        Ok(())
    }
}
