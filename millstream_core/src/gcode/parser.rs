//! Character-driven scanner turning raw text into a [`Document`].
//!
//! The scanner runs a four-state machine (normal, paren comment, eol
//! comment, word body). A trailing newline is fed implicitly so the final
//! block always terminates.

use thiserror::Error;

use super::{Block, Document, Node, Word};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("line {line}, column {column}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Normal,
    ParenComment,
    EolComment,
    WordBody,
}

struct Scanner {
    document: Document,
    block: Block,
    state: ScanState,
    buffer: String,
    address: char,
    line: usize,
    column: usize,
}

impl Scanner {
    fn new() -> Self {
        Self {
            document: Document::default(),
            block: Block::default(),
            state: ScanState::Normal,
            buffer: String::new(),
            address: '\0',
            line: 1,
            column: 1,
        }
    }

    fn fail(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }

    fn finish_word(&mut self) {
        // An empty or malformed numeral reads as zero, as on the machines
        // this grammar comes from.
        let command = self.buffer.parse::<f64>().unwrap_or(0.0);
        self.block.append_node(Node::Word(Word::new(self.address, command)));
        self.buffer.clear();
        self.state = ScanState::Normal;
    }

    fn finish_comment(&mut self, eol: bool) {
        let text = std::mem::take(&mut self.buffer);
        self.block.append_node(Node::Comment { text, eol });
        self.state = ScanState::Normal;
    }

    fn feed(&mut self, c: char) -> Result<(), ParseError> {
        loop {
            match self.state {
                ScanState::WordBody => {
                    if c.is_ascii_digit() || c == '.' || c == '-' || c == '+' {
                        self.buffer.push(c);
                        return Ok(());
                    }
                    self.finish_word();
                    continue; // re-dispatch the terminator
                }
                ScanState::ParenComment => {
                    match c {
                        ')' => self.finish_comment(false),
                        '\n' => return Err(self.fail("non-terminated comment")),
                        _ => self.buffer.push(c),
                    }
                    return Ok(());
                }
                ScanState::EolComment => {
                    if c == '\n' {
                        self.finish_comment(true);
                        continue;
                    }
                    self.buffer.push(c);
                    return Ok(());
                }
                ScanState::Normal => return self.feed_normal(c),
            }
        }
    }

    fn feed_normal(&mut self, c: char) -> Result<(), ParseError> {
        match c {
            '/' => {
                if self.column == 1 {
                    self.block.block_delete = true;
                } else {
                    return Err(self.fail("unexpected /"));
                }
            }
            '%' => self.block.append_node(Node::FileMarker),
            '(' => self.state = ScanState::ParenComment,
            ';' => self.state = ScanState::EolComment,
            '\n' => {
                let block = std::mem::take(&mut self.block);
                self.document.append_block(block);
            }
            ' ' | '\t' | '\r' => {}
            'a'..='z' => {
                self.address = c.to_ascii_uppercase();
                self.state = ScanState::WordBody;
            }
            'A'..='Z' | '@' | '^' => {
                self.address = c;
                self.state = ScanState::WordBody;
            }
            _ => {
                return Err(self.fail(format!("expected word address, found {c:?}")));
            }
        }
        Ok(())
    }
}

/// Parses a complete source text into a [`Document`].
pub fn parse(input: &str) -> Result<Document, ParseError> {
    let mut scanner = Scanner::new();
    for c in input.chars() {
        scanner.feed(c)?;
        if c == '\n' {
            scanner.line += 1;
            scanner.column = 1;
        } else {
            scanner.column += 1;
        }
    }
    // Implicit terminating newline, unless the input already ended cleanly.
    if scanner.state != ScanState::Normal || !scanner.block.is_empty() || scanner.block.block_delete
    {
        scanner.feed('\n')?;
    }
    Ok(scanner.document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcode::Node;

    fn words_of(block: &Block) -> Vec<(char, f64)> {
        block.words().map(|w| (w.address, w.command)).collect()
    }

    #[test]
    fn parses_packed_words() {
        let doc = parse("G1X10.5Y-2Z+0.25").unwrap();
        assert_eq!(
            words_of(&doc.blocks[0]),
            vec![('G', 1.0), ('X', 10.5), ('Y', -2.0), ('Z', 0.25)]
        );
    }

    #[test]
    fn uppercases_addresses_and_skips_whitespace() {
        let doc = parse("g1 x10 \t y20\n").unwrap();
        assert_eq!(
            words_of(&doc.blocks[0]),
            vec![('G', 1.0), ('X', 10.0), ('Y', 20.0)]
        );
    }

    #[test]
    fn block_delete_only_at_line_start() {
        let doc = parse("/G1X1\nG0X0").unwrap();
        assert!(doc.blocks[0].block_delete);
        assert!(!doc.blocks[1].block_delete);

        let err = parse("G1/X1").unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 3);
    }

    #[test]
    fn comments_and_markers() {
        let doc = parse("%\nG1(plunge)X2;rest of line\nG0").unwrap();
        assert_eq!(doc.blocks[0].nodes, vec![Node::FileMarker]);
        assert_eq!(
            doc.blocks[1].nodes[1],
            Node::Comment {
                text: "plunge".into(),
                eol: false
            }
        );
        assert_eq!(
            doc.blocks[1].nodes[3],
            Node::Comment {
                text: "rest of line".into(),
                eol: true
            }
        );
    }

    #[test]
    fn unterminated_paren_comment_is_an_error() {
        let err = parse("G1 (oops\nG0").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("non-terminated"));
    }

    #[test]
    fn unknown_character_is_located() {
        let err = parse("G1\n  ?").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 3);
    }

    #[test]
    fn trailing_newline_is_implicit() {
        let doc = parse("G1X1").unwrap();
        assert_eq!(doc.blocks.len(), 1);
        assert_eq!(words_of(&doc.blocks[0]), vec![('G', 1.0), ('X', 1.0)]);
    }

    #[test]
    fn text_round_trip_preserves_words() {
        let src = "/G1X10.5(cut)\nM3S8000\n%\n";
        let doc = parse(src).unwrap();
        let doc2 = parse(&doc.to_text(None)).unwrap();
        assert_eq!(doc, doc2);
    }
}
