/// A recognized console command. Keywords are case-insensitive; the text
/// after `write` is kept as typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Start,
    Stop,
    Continue,
    Read,
    Write(&'a str),
    Unknown,
}

impl<'a> Command<'a> {
    /// Parse one line. Returns `None` for a blank line.
    pub fn parse(line: &'a str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let (keyword, rest) = match line.split_once(|c: char| c.is_ascii_whitespace()) {
            Some((keyword, rest)) => (keyword, rest),
            None => (line, ""),
        };

        if keyword.eq_ignore_ascii_case("write") {
            return Some(if rest.is_empty() {
                Self::Unknown
            } else {
                Self::Write(rest)
            });
        }
        if !rest.is_empty() {
            return Some(Self::Unknown);
        }

        let command = [
            ("start", Self::Start),
            ("stop", Self::Stop),
            ("continue", Self::Continue),
            ("read", Self::Read),
        ]
        .into_iter()
        .find(|(name, _)| keyword.eq_ignore_ascii_case(name))
        .map_or(Self::Unknown, |(_, command)| command);
        Some(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(Command::parse("start"), Some(Command::Start));
        assert_eq!(Command::parse("STOP"), Some(Command::Stop));
        assert_eq!(Command::parse("  Continue\r"), Some(Command::Continue));
        assert_eq!(Command::parse("rEaD"), Some(Command::Read));
    }

    #[test]
    fn write_needs_a_space_separated_payload() {
        assert_eq!(
            Command::parse("write Hello, World"),
            Some(Command::Write("Hello, World"))
        );
        assert_eq!(Command::parse("WRITE x"), Some(Command::Write("x")));
        assert_eq!(Command::parse("write"), Some(Command::Unknown));
        assert_eq!(Command::parse("write   "), Some(Command::Unknown));
        assert_eq!(Command::parse("writeHello"), Some(Command::Unknown));
    }

    #[test]
    fn write_payload_keeps_its_leading_spaces() {
        assert_eq!(Command::parse("write   indented"), Some(Command::Write("  indented")));
        assert_eq!(Command::parse("write\t x"), Some(Command::Write(" x")));
    }

    #[test]
    fn blank_lines_are_ignored() {
        assert_eq!(Command::parse(""), None);
        assert_eq!(Command::parse(" \t\r"), None);
    }

    #[test]
    fn anything_else_is_unknown() {
        for line in ["stat", "start now", "delete", "readme", "continuously", "écrire x"] {
            assert_eq!(Command::parse(line), Some(Command::Unknown), "{line}");
        }
    }
}
