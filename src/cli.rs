//! Interactive prompts of the `pattern-stops` binary.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Removes surrounding whitespace and quote characters, as left by shells
/// and file managers when a path is pasted.
pub fn strip_quotes(input: &str) -> &str {
    input.trim().trim_matches(|c: char| c == '"' || c == '\'').trim()
}

fn ask<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
) -> io::Result<Option<String>> {
    write!(output, "{question} ")?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

/// Asks for a path until a non-empty answer is given.
pub fn prompt_path<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
) -> io::Result<PathBuf> {
    loop {
        match ask(input, output, question)? {
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("no answer to '{question}'"),
                ))
            }
            Some(line) => {
                let path = strip_quotes(&line);
                if !path.is_empty() {
                    return Ok(PathBuf::from(path));
                }
            }
        }
    }
}

/// Asks a yes/no question until the answer is one of y, yes, n or no.
/// End of input counts as no.
pub fn confirm<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
) -> io::Result<bool> {
    let question = format!("{question} [y/n]");
    loop {
        let line = match ask(input, output, &question)? {
            Some(line) => line,
            None => return Ok(false),
        };
        match line.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => writeln!(output, "Please answer y or n")?,
        }
    }
}
