//! Interactive source: blocks are typed on the console, ended with EOF.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

use super::ProposalSource;
use crate::io::context::RunContext;

const PRE_BANNER: &str =
    "Enter pre-exec Action Protocol block (Intent/Command/Expected/OnError). Press Ctrl+D when done:";
const POST_BANNER: &str =
    "Enter post-exec Action Protocol block (Observation/Inference/Next). Press Ctrl+D when done:";

pub struct ConsoleSource<R, W> {
    input: R,
    output: W,
}

impl ConsoleSource<io::StdinLock<'static>, io::Stdout> {
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsoleSource<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_block(&mut self, banner: &str) -> Result<String> {
        writeln!(self.output, "{banner}").context("write prompt banner")?;
        self.output.flush().context("flush prompt banner")?;

        let mut lines = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            let read = self.input.read_line(&mut line).context("read block")?;
            if read == 0 {
                break;
            }
            lines.push(line.trim_end_matches(['\n', '\r']).to_string());
        }
        Ok(lines.join("\n").trim().to_string())
    }
}

impl<R: BufRead, W: Write> ProposalSource for ConsoleSource<R, W> {
    fn decide(&mut self, _step: u32, _context: &RunContext) -> Result<String> {
        self.read_block(PRE_BANNER)
    }

    fn post_decide(&mut self, _step: u32, _context: &RunContext) -> Result<String> {
        self.read_block(POST_BANNER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_until_eof_and_trims() {
        let input = "<Intent>\nMap things\n\n<Command>\necho hello\n\n<Expected>\n\n";
        let mut output = Vec::new();
        let mut source = ConsoleSource::new(input.as_bytes(), &mut output);

        let block = source
            .decide(1, &RunContext::detached(100))
            .expect("decide");
        assert_eq!(
            block,
            "<Intent>\nMap things\n\n<Command>\necho hello\n\n<Expected>"
        );
        let printed = String::from_utf8(output).expect("utf8");
        assert!(printed.contains("pre-exec"));
    }

    #[test]
    fn post_banner_and_empty_input() {
        let mut output = Vec::new();
        let mut source = ConsoleSource::new("".as_bytes(), &mut output);

        let block = source
            .post_decide(1, &RunContext::detached(100))
            .expect("post");
        assert!(block.is_empty());
        let printed = String::from_utf8(output).expect("utf8");
        assert!(printed.contains("Observation/Inference/Next"));
    }

    #[test]
    fn crlf_lines_are_normalized() {
        let mut source = ConsoleSource::new("<Observation>\r\nIt worked\r\n".as_bytes(), io::sink());
        let block = source
            .post_decide(1, &RunContext::detached(100))
            .expect("post");
        assert_eq!(block, "<Observation>\nIt worked");
    }
}
