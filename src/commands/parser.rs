//! Prefix command parsing: `!name arg arg rest of text`.

#[derive(Debug, Clone)]
pub struct Arguments<'a> {
    tokens: std::str::SplitWhitespace<'a>,
    rest: &'a str,
}

impl<'a> Arguments<'a> {
    pub fn new(args: &'a str) -> Self {
        Self {
            tokens: args.split_whitespace(),
            rest: args,
        }
    }

    /// Everything not yet consumed by [`Iterator::next`], trimmed.
    pub fn remainder(&self) -> &'a str {
        self.rest.trim()
    }
}

impl<'a> Iterator for Arguments<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let arg = self.tokens.next()?;
        // `arg` is a subslice of `rest`, so its end offset tells us where the
        // unconsumed text starts.
        let start = self.rest.as_ptr() as usize;
        let end = arg.as_ptr() as usize + arg.len();
        self.rest = self.rest.get(end - start..).unwrap_or("");
        Some(arg)
    }
}

#[derive(Debug, PartialEq)]
pub struct ParsedCommand<'a> {
    pub name: &'a str,
    args: &'a str,
}

impl<'a> ParsedCommand<'a> {
    pub fn arguments(&self) -> Arguments<'a> {
        Arguments::new(self.args)
    }
}

pub fn parse<'a>(message: &'a str, prefix: &str) -> Option<ParsedCommand<'a>> {
    let body = message.strip_prefix(prefix)?.trim_start();
    if body.is_empty() {
        return None;
    }
    let (name, args) = match body.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (body, ""),
    };
    Some(ParsedCommand { name, args })
}

/// User id from `<@123>`, `<@!123>`, or a bare `123`.
pub fn parse_user_mention(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let inner = match raw.strip_prefix("<@") {
        Some(rest) => rest.strip_suffix('>')?.trim_start_matches('!'),
        None => raw,
    };
    inner.parse::<u64>().ok().filter(|id| *id != 0)
}
