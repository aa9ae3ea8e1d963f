//! Clean line reconstruction from the output stream.
//!
//! A small line-oriented screen model: it tracks one line and a cursor
//! column, which is enough to undo carriage-return redraws, backspacing and
//! erase-line sequences in a shell. Full-screen programs are logged as the
//! lines they leave behind when the cursor jumps, bracketed by markers.

use chrono::{DateTime, Duration as ChronoDuration, Local};
use unicode_width::UnicodeWidthChar;
use vte::{Params, Parser, Perform};

use crate::tracelog::Event;

pub const ENTER_FULLSCREEN: &str = "[entered interactive mode]";
pub const EXIT_FULLSCREEN: &str = "[exited interactive mode]";

/// Placeholder for the second column of a wide character.
const WIDE_TAIL: char = '\0';

#[derive(Default)]
struct LineState {
    cells: Vec<char>,
    cursor: usize,
    alt_screen: bool,
    completed: Vec<String>,
}

impl LineState {
    fn put(&mut self, c: char) {
        let width = c.width().unwrap_or(0);
        if width == 0 {
            return;
        }
        let end = self.cursor + width;
        if self.cells.len() < end {
            self.cells.resize(end, ' ');
        }
        self.cells[self.cursor] = c;
        if width == 2 {
            self.cells[self.cursor + 1] = WIDE_TAIL;
        }
        self.cursor = end;
    }

    /// Emit the current line if it has visible content, then clear it.
    fn flush(&mut self) {
        let line: String = self.cells.iter().filter(|&&c| c != WIDE_TAIL).collect();
        let line = line.trim_end();
        if !line.is_empty() {
            self.completed.push(line.to_string());
        }
        self.cells.clear();
        self.cursor = 0;
    }

    fn erase_line(&mut self, mode: u16) {
        match mode {
            0 => self.cells.truncate(self.cursor),
            1 => {
                let end = (self.cursor + 1).min(self.cells.len());
                self.cells[..end].fill(' ');
            }
            _ => {
                self.cells.clear();
                self.cursor = 0;
            }
        }
    }

    fn delete_chars(&mut self, n: usize) {
        if self.cursor < self.cells.len() {
            let end = (self.cursor + n).min(self.cells.len());
            self.cells.drain(self.cursor..end);
        }
    }

    fn set_alt_screen(&mut self, on: bool) {
        if self.alt_screen == on {
            return;
        }
        self.flush();
        self.alt_screen = on;
        self.completed.push(if on { ENTER_FULLSCREEN } else { EXIT_FULLSCREEN }.to_string());
    }
}

impl Perform for LineState {
    fn print(&mut self, c: char) {
        self.put(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' => self.flush(),
            // Full-screen editors use CR as a line break.
            b'\r' if self.alt_screen => self.flush(),
            b'\r' => self.cursor = 0,
            0x08 => self.cursor = self.cursor.saturating_sub(1),
            b'\t' => {
                let next_tab = (self.cursor / 8 + 1) * 8;
                while self.cursor < next_tab {
                    self.put(' ');
                }
            }
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], _ignore: bool, action: char) {
        let params: Vec<u16> = params
            .iter()
            .map(|p| p.first().copied().unwrap_or(0))
            .collect();
        let first = params.first().copied().unwrap_or(0);
        let count = first.max(1) as usize;

        if intermediates.contains(&b'?') {
            if matches!(action, 'h' | 'l') && params.iter().any(|&p| p == 1049 || p == 47 || p == 1047) {
                self.set_alt_screen(action == 'h');
            }
            return;
        }

        match action {
            'K' => self.erase_line(first),
            'G' | '`' => self.cursor = count - 1,
            'C' => self.cursor += count,
            'D' => self.cursor = self.cursor.saturating_sub(count),
            'P' => self.delete_chars(count),
            'A' | 'B' | 'H' | 'f' | 'd' if self.alt_screen => self.flush(),
            _ => {}
        }
    }
}

/// Rebuilds the visible lines of a session from its output bytes.
pub struct LineReconstructor {
    parser: Parser,
    state: LineState,
    last_emitted: Option<String>,
}

impl Default for LineReconstructor {
    fn default() -> Self {
        Self::new()
    }
}

impl LineReconstructor {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
            state: LineState::default(),
            last_emitted: None,
        }
    }

    /// Feed output bytes; returns lines completed by them.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.parser.advance(&mut self.state, bytes);
        self.drain()
    }

    /// Flush the unfinished last line.
    pub fn finish(&mut self) -> Vec<String> {
        self.state.flush();
        self.drain()
    }

    /// Completed lines with consecutive duplicates (prompt redraws) dropped.
    fn drain(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        for line in std::mem::take(&mut self.state.completed) {
            if self.last_emitted.as_deref() == Some(line.as_str()) {
                continue;
            }
            self.last_emitted = Some(line.clone());
            out.push(line);
        }
        out
    }
}

/// A reconstructed line and the time of the event that completed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanLine {
    pub ts_ns: u64,
    pub text: String,
}

impl CleanLine {
    /// `[YYYY-mm-dd HH:MM:SS] text` when the wall-clock start is known,
    /// otherwise `[+seconds] text`.
    pub fn format(&self, started_at: Option<DateTime<Local>>) -> String {
        match started_at {
            Some(start) => {
                let offset = ChronoDuration::nanoseconds(i64::try_from(self.ts_ns).unwrap_or(i64::MAX));
                let at = start + offset;
                format!("[{}] {}", at.format("%Y-%m-%d %H:%M:%S"), self.text)
            }
            None => format!("[+{:.3}s] {}", self.ts_ns as f64 / 1e9, self.text),
        }
    }
}

/// Clean lines of a whole session's output.
pub fn clean_lines(events: &[Event]) -> Vec<CleanLine> {
    let mut screen = LineReconstructor::new();
    let mut lines = Vec::new();
    let mut last_ts = 0;

    for event in events.iter().filter(|e| e.is_output()) {
        last_ts = event.ts_ns;
        lines.extend(screen.feed(&event.payload).into_iter().map(|text| CleanLine {
            ts_ns: event.ts_ns,
            text,
        }));
    }
    lines.extend(
        screen
            .finish()
            .into_iter()
            .map(|text| CleanLine { ts_ns: last_ts, text }),
    );
    lines
}
