//! Host I/O seam
//!
//! The VM never touches the filesystem or stdout directly: module loading
//! goes through [`IoHost::read_file`] and the `std:io` natives through
//! [`IoHost::print`] and [`IoHost::read_line`].

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::{self, BufRead, Write};
use std::rc::Rc;

pub trait IoHost {
    /// File contents, or an empty string when the file cannot be read
    fn read_file(&mut self, path: &str) -> String;

    /// Write text without adding a newline
    fn print(&mut self, text: &str);

    /// One line of input without its terminator; empty at end of input
    fn read_line(&mut self) -> String {
        String::new()
    }
}

/// Filesystem + stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct StdIo;

impl IoHost for StdIo {
    fn read_file(&mut self, path: &str) -> String {
        std::fs::read_to_string(path).unwrap_or_default()
    }

    fn print(&mut self, text: &str) {
        let mut out = io::stdout().lock();
        // stdout going away is not a script error
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn read_line(&mut self) -> String {
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).is_err() {
            return String::new();
        }
        line.trim_end_matches(['\n', '\r']).to_string()
    }
}

/// In-memory files, scripted input and captured output; clones share all three
#[derive(Debug, Default, Clone)]
pub struct BufferedIo {
    files: Rc<RefCell<HashMap<String, String>>>,
    input: Rc<RefCell<VecDeque<String>>>,
    output: Rc<RefCell<String>>,
}

impl BufferedIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<String>, contents: impl Into<String>) -> Self {
        self.add_file(path, contents);
        self
    }

    pub fn add_file(&self, path: impl Into<String>, contents: impl Into<String>) {
        self.files.borrow_mut().insert(path.into(), contents.into());
    }

    /// Queue a line for [`IoHost::read_line`]
    pub fn push_input(&self, line: impl Into<String>) {
        self.input.borrow_mut().push_back(line.into());
    }

    /// Everything printed so far
    pub fn output(&self) -> String {
        self.output.borrow().clone()
    }

    /// Printed output split into lines
    pub fn lines(&self) -> Vec<String> {
        self.output.borrow().lines().map(str::to_string).collect()
    }
}

impl IoHost for BufferedIo {
    fn read_file(&mut self, path: &str) -> String {
        self.files.borrow().get(path).cloned().unwrap_or_default()
    }

    fn print(&mut self, text: &str) {
        self.output.borrow_mut().push_str(text);
    }

    fn read_line(&mut self) -> String {
        self.input.borrow_mut().pop_front().unwrap_or_default()
    }
}
