//! Minimal parser for the GDB/MI output syntax.
//!
//! Only the record shapes the session loop acts on are modelled: result
//! records (`^done`), exec/notify async records (`*stopped`, `=thread-...`),
//! stream records (`~"..."`), the `(gdb)` prompt, and everything else as raw
//! target output.

/// A value in an MI record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MiValue {
    Const(String),
    Tuple(Vec<(String, MiValue)>),
    List(Vec<MiValue>),
}

impl MiValue {
    /// Looks up a key inside a tuple value.
    pub fn get(&self, key: &str) -> Option<&MiValue> {
        match self {
            Self::Tuple(pairs) => {
                pairs.iter().find(|(name, _)| name == key).map(|(_, value)| value)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Const(text) => Some(text),
            _ => None,
        }
    }

    /// String value behind a tuple key.
    pub fn string(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Self::as_str)
    }
}

/// One line of MI output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MiRecord {
    /// `*stopped,reason="..."` and friends.
    ExecAsync { class: String, results: Vec<(String, MiValue)> },
    /// `=thread-group-exited,...` and friends.
    NotifyAsync { class: String, results: Vec<(String, MiValue)> },
    /// `^done`, `^running`, `^error,msg="..."`.
    Result { class: String, results: Vec<(String, MiValue)> },
    /// Console (`~`), target (`@`) and log (`&`) stream fragments.
    Stream(String),
    /// The `(gdb)` prompt.
    Prompt,
    /// A line that is not MI syntax; usually raw output of the debuggee.
    Target(String),
}

/// Looks up a key in a record's result list.
pub fn lookup<'a>(results: &'a [(String, MiValue)], key: &str) -> Option<&'a MiValue> {
    results.iter().find(|(name, _)| name == key).map(|(_, value)| value)
}

/// String value of a key in a record's result list.
pub fn lookup_str<'a>(results: &'a [(String, MiValue)], key: &str) -> Option<&'a str> {
    lookup(results, key).and_then(MiValue::as_str)
}

/// File and line of the stopping frame in a `*stopped` record.
pub fn stopped_frame(results: &[(String, MiValue)]) -> Option<(String, u32)> {
    let frame = lookup(results, "frame")?;
    let file = frame.string("file")?.to_owned();
    let line = frame.string("line")?.parse().ok()?;
    Some((file, line))
}

/// Parses one line of MI output. Never fails: unrecognised lines come back
/// as [`MiRecord::Target`].
pub fn parse_line(line: &str) -> MiRecord {
    let trimmed = line.trim_end_matches(['\r', '\n']);

    if trimmed.trim() == "(gdb)" {
        return MiRecord::Prompt;
    }

    // Result records may carry a numeric command token prefix.
    let unprefixed = trimmed.trim_start_matches(|c: char| c.is_ascii_digit());

    let mut parser = Parser { bytes: unprefixed.as_bytes(), pos: 1 };
    match unprefixed.bytes().next() {
        Some(b'*') => {
            let (class, results) = parser.async_body();
            MiRecord::ExecAsync { class, results }
        }
        Some(b'=') => {
            let (class, results) = parser.async_body();
            MiRecord::NotifyAsync { class, results }
        }
        Some(b'^') => {
            let (class, results) = parser.async_body();
            MiRecord::Result { class, results }
        }
        Some(b'~' | b'@' | b'&') => MiRecord::Stream(parser.string_literal()),
        _ => MiRecord::Target(trimmed.to_owned()),
    }
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn eat(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            return true;
        }
        false
    }

    /// `class ("," name "=" value)*`
    fn async_body(&mut self) -> (String, Vec<(String, MiValue)>) {
        let start = self.pos;
        while self.peek().is_some_and(|b| b != b',') {
            self.pos += 1;
        }
        let class = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();

        let mut results = Vec::new();
        while self.eat(b',') {
            if let Some(pair) = self.name_value() {
                results.push(pair);
            } else {
                break;
            }
        }
        (class, results)
    }

    fn name(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|b| b != b'=' && b != b',' && b != b'}' && b != b']') {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned()
    }

    fn name_value(&mut self) -> Option<(String, MiValue)> {
        let name = self.name();
        if !self.eat(b'=') {
            return None;
        }
        Some((name, self.value()))
    }

    fn value(&mut self) -> MiValue {
        match self.peek() {
            Some(b'"') => MiValue::Const(self.string_value()),
            Some(b'{') => {
                self.pos += 1;
                let mut pairs = Vec::new();
                if !self.eat(b'}') {
                    loop {
                        match self.name_value() {
                            Some(pair) => pairs.push(pair),
                            None => break,
                        }
                        if !self.eat(b',') {
                            break;
                        }
                    }
                    self.eat(b'}');
                }
                MiValue::Tuple(pairs)
            }
            Some(b'[') => {
                self.pos += 1;
                let mut items = Vec::new();
                if !self.eat(b']') {
                    loop {
                        // List items are either plain values or name=value
                        // pairs; the latter are wrapped in a tuple.
                        let item = match self.peek() {
                            Some(b'"' | b'{' | b'[') => self.value(),
                            _ => match self.name_value() {
                                Some(pair) => MiValue::Tuple(vec![pair]),
                                None => break,
                            },
                        };
                        items.push(item);
                        if !self.eat(b',') {
                            break;
                        }
                    }
                    self.eat(b']');
                }
                MiValue::List(items)
            }
            _ => MiValue::Const(self.name()),
        }
    }

    /// A `"..."` literal with C-style escapes.
    fn string_value(&mut self) -> String {
        self.eat(b'"');
        let mut text = String::new();
        while let Some(byte) = self.bump() {
            match byte {
                b'"' => break,
                b'\\' => match self.bump() {
                    Some(b'n') => text.push('\n'),
                    Some(b't') => text.push('\t'),
                    Some(other) => text.push(other as char),
                    None => break,
                },
                other => text.push(other as char),
            }
        }
        text
    }

    /// The payload of a stream record: everything after the marker, as an
    /// unescaped string literal.
    fn string_literal(&mut self) -> String {
        self.string_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_and_result_records() {
        assert_eq!(parse_line("(gdb) "), MiRecord::Prompt);
        assert_eq!(
            parse_line("^running"),
            MiRecord::Result { class: "running".to_owned(), results: vec![] }
        );
        assert_eq!(
            parse_line("12^done"),
            MiRecord::Result { class: "done".to_owned(), results: vec![] }
        );
    }

    #[test]
    fn error_results_carry_a_message() {
        let record = parse_line(r#"^error,msg="No executable specified.""#);
        let MiRecord::Result { class, results } = record else { panic!("not a result") };
        assert_eq!(class, "error");
        assert_eq!(lookup_str(&results, "msg"), Some("No executable specified."));
    }

    #[test]
    fn stream_records_unescape() {
        assert_eq!(
            parse_line(r#"~"Reading symbols...\n""#),
            MiRecord::Stream("Reading symbols...\n".to_owned())
        );
    }

    #[test]
    fn raw_debuggee_output_is_target() {
        assert_eq!(
            parse_line("a.out: example.c:4: main: Assertion `p' failed."),
            MiRecord::Target("a.out: example.c:4: main: Assertion `p' failed.".to_owned())
        );
    }

    #[test]
    fn stopped_record_with_nested_frame() {
        let line = r#"*stopped,reason="signal-received",signal-name="SIGSEGV",signal-meaning="Segmentation fault",frame={addr="0x0000555555555131",func="main",args=[{name="argc",value="1"}],file="3_example.c",fullname="/work/temp/3_example.c",line="4",arch="i386:x86-64"},thread-id="1",stopped-threads="all",core="2""#;

        let MiRecord::ExecAsync { class, results } = parse_line(line) else {
            panic!("not exec async");
        };
        assert_eq!(class, "stopped");
        assert_eq!(lookup_str(&results, "reason"), Some("signal-received"));
        assert_eq!(lookup_str(&results, "signal-name"), Some("SIGSEGV"));
        assert_eq!(lookup_str(&results, "signal-meaning"), Some("Segmentation fault"));
        assert_eq!(
            stopped_frame(&results),
            Some(("3_example.c".to_owned(), 4))
        );
    }

    #[test]
    fn exited_records() {
        let MiRecord::ExecAsync { class, results } =
            parse_line(r#"*stopped,reason="exited",exit-code="01""#)
        else {
            panic!("not exec async");
        };
        assert_eq!(class, "stopped");
        assert_eq!(lookup_str(&results, "reason"), Some("exited"));
        assert_eq!(lookup_str(&results, "exit-code"), Some("01"));

        let MiRecord::NotifyAsync { class, .. } =
            parse_line(r#"=thread-group-exited,id="i1",exit-code="0""#)
        else {
            panic!("not notify async");
        };
        assert_eq!(class, "thread-group-exited");
    }

    #[test]
    fn lists_of_tuples_parse() {
        let line = r#"*stopped,frame={args=[{name="a",value="1"},{name="b",value="2"}],file="x.c",line="1"}"#;
        let MiRecord::ExecAsync { results, .. } = parse_line(line) else { panic!() };
        let frame = lookup(&results, "frame").unwrap();
        let MiValue::List(args) = frame.get("args").unwrap() else { panic!("args not a list") };
        assert_eq!(args.len(), 2);
        assert_eq!(stopped_frame(&results), Some(("x.c".to_owned(), 1)));
    }
}
