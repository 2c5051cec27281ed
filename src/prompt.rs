//! Interactive questions for whatever the command line left open.

use std::io::{BufRead, Write};

use crate::block::{parse_bound, BlockId};
use crate::{Error, Result};

fn ask<R: BufRead, W: Write>(input: &mut R, out: &mut W, question: &str) -> Result<String> {
    write!(out, "{question}")?;
    out.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(Error::InputClosed);
    }
    Ok(line.trim().to_string())
}

/// Asks for a cadastral block until a valid one is given.
pub fn block_id<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> Result<BlockId> {
    loop {
        let answer = ask(input, out, "Cadastral block number (XX:XX:XXXXXXX): ")?;
        match answer.parse() {
            Ok(block) => return Ok(block),
            Err(e) => writeln!(out, "Error! {e}")?,
        }
    }
}

/// Asks for a parcel number in `min..=max`; an empty answer takes `default`.
pub fn bound<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    label: &str,
    default: u32,
    min: u32,
    max: u32,
) -> Result<u32> {
    loop {
        let answer = ask(input, out, &format!("{label} [default {default}]: "))?;
        let answer = if answer.is_empty() {
            default.to_string()
        } else {
            answer
        };
        match parse_bound(&answer, min, max) {
            Ok(num) => return Ok(num),
            Err(e) => writeln!(out, "Error! {e}")?,
        }
    }
}

/// Asks whether to resume a previous scan. Only `y` resumes.
pub fn resume<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> Result<bool> {
    writeln!(out, "\nFound a previous run for this block.")?;
    let answer = ask(input, out, "Continue scanning (y) or start over (n)? [y/n]: ")?;
    Ok(answer.eq_ignore_ascii_case("y"))
}
