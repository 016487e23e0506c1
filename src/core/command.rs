//! Launch command parsing

/// A launch command split into program and arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub program: String,
    pub args: Vec<String>,
}

/// Split a command line on whitespace, keeping double-quoted runs together.
///
/// Quotes are stripped, and a quoted run may be glued to surrounding text
/// (`--name="a b"` yields `--name=a b`). A quote without a closing partner is
/// dropped and ends the current token. Returns `None` when nothing remains.
pub fn parse_command(command: &str) -> Option<ParsedCommand> {
    let mut tokens = tokenize(command).into_iter();
    let program = tokens.next()?;
    Some(ParsedCommand {
        program,
        args: tokens.collect(),
    })
}

fn tokenize(command: &str) -> Vec<String> {
    let chars: Vec<char> = command.chars().collect();
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '"' {
            match chars[i + 1..].iter().position(|&ch| ch == '"') {
                Some(offset) => {
                    let end = i + 1 + offset;
                    current.extend(&chars[i + 1..end]);
                    in_token = true;
                    i = end + 1;
                }
                None => {
                    flush(&mut tokens, &mut current, &mut in_token);
                    i += 1;
                }
            }
        } else if c.is_whitespace() {
            flush(&mut tokens, &mut current, &mut in_token);
            i += 1;
        } else {
            current.push(c);
            in_token = true;
            i += 1;
        }
    }
    flush(&mut tokens, &mut current, &mut in_token);

    tokens
}

fn flush(tokens: &mut Vec<String>, current: &mut String, in_token: &mut bool) {
    if *in_token {
        tokens.push(std::mem::take(current));
        *in_token = false;
    }
}
