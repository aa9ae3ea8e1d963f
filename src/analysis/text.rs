//! Plain text of captured payloads, with terminal control sequences removed.

use vte::{Params, Parser, Perform};

/// Collects printable characters plus line feeds and tabs.
#[derive(Default)]
struct PlainText {
    out: String,
}

impl Perform for PlainText {
    fn print(&mut self, c: char) {
        self.out.push(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' => self.out.push('\n'),
            b'\t' => self.out.push('\t'),
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {}
}

/// Lossy UTF-8 text of `bytes` with escape sequences and control bytes
/// (other than `\n` and `\t`) stripped.
pub fn plain_text(bytes: &[u8]) -> String {
    let mut parser = Parser::new();
    let mut text = PlainText::default();
    parser.advance(&mut text, bytes);
    text.out
}

/// Text a user typed in one input event, trimmed.
pub fn command_text(bytes: &[u8]) -> String {
    plain_text(bytes).trim().to_string()
}
