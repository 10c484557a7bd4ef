use std::io::{self, BufRead, IsTerminal, Write};

/// Asks for a value on the terminal. Returns `None` when stdin is not a
/// terminal or the answer is blank.
pub fn prompt_line(label: &str) -> io::Result<Option<String>> {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        return Ok(None);
    }
    prompt_from(&mut stdin.lock(), &mut io::stderr(), label)
}

pub fn prompt_from<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    label: &str,
) -> io::Result<Option<String>> {
    write!(output, "{label}: ")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    let answer = line.trim();
    Ok((!answer.is_empty()).then(|| answer.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_trimmed_answer() {
        let mut input = io::Cursor::new(b"  h3k4me3 AND mouse \n".to_vec());
        let mut output = Vec::new();
        let answer = prompt_from(&mut input, &mut output, "GEO search query").unwrap();
        assert_eq!(answer.as_deref(), Some("h3k4me3 AND mouse"));
        assert_eq!(output, b"GEO search query: ");
    }

    #[test]
    fn blank_answer_is_none() {
        let mut input = io::Cursor::new(b"\n".to_vec());
        let answer = prompt_from(&mut input, &mut io::sink(), "query").unwrap();
        assert_eq!(answer, None);
    }
}
