//! G-code document model: words, comments, blocks and the accessors the
//! interpreter consumes them through.

pub mod modal;
pub mod parser;

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WordError {
    #[error("multiple {0} words in one block")]
    Duplicate(char),
}

/// A single addressed command, e.g. `X10.5` or `G1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Word {
    pub address: char,
    pub command: f64,
}

impl Word {
    pub const fn new(address: char, command: f64) -> Self {
        Self { address, command }
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.address, self.command)
    }
}

/// One element of a block.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Word(Word),
    Comment { text: String, eol: bool },
    FileMarker,
}

/// One physical input line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub nodes: Vec<Node>,
    pub block_delete: bool,
}

impl Block {
    pub fn append_node(&mut self, node: Node) {
        self.nodes.push(node);
    }

    pub fn append_word(&mut self, address: char, command: f64) {
        self.nodes.push(Node::Word(Word::new(address, command)));
    }

    pub fn words(&self) -> impl Iterator<Item = &Word> {
        self.nodes.iter().filter_map(|n| match n {
            Node::Word(w) => Some(w),
            _ => None,
        })
    }

    /// The command of the word addressed `address`, if present exactly once.
    pub fn get_word(&self, address: char) -> Result<Option<f64>, WordError> {
        let mut found = None;
        for w in self.words() {
            if w.address == address {
                if found.is_some() {
                    return Err(WordError::Duplicate(address));
                }
                found = Some(w.command);
            }
        }
        Ok(found)
    }

    pub fn get_word_default(&self, address: char, default: f64) -> f64 {
        self.words()
            .find(|w| w.address == address)
            .map(|w| w.command)
            .unwrap_or(default)
    }

    pub fn get_all_words(&self, address: char) -> Vec<f64> {
        self.words()
            .filter(|w| w.address == address)
            .map(|w| w.command)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Renders the block as source text. `precision` bounds the fractional
    /// digits of word commands; `None` keeps the shortest round-trip form.
    pub fn to_text(&self, precision: Option<usize>) -> String {
        let mut out = String::new();
        if self.block_delete {
            out.push('/');
        }
        for node in &self.nodes {
            match node {
                Node::Word(w) => {
                    out.push(w.address);
                    out.push_str(&format_command(w.command, precision));
                }
                Node::Comment { text, eol: false } => {
                    out.push('(');
                    out.push_str(text);
                    out.push(')');
                }
                Node::Comment { text, eol: true } => {
                    out.push(';');
                    out.push_str(text);
                }
                Node::FileMarker => out.push('%'),
            }
        }
        out
    }
}

/// An ordered sequence of blocks, one per input line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn append_block(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn to_text(&self, precision: Option<usize>) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            out.push_str(&block.to_text(precision));
            out.push('\n');
        }
        out
    }
}

fn format_command(value: f64, precision: Option<usize>) -> String {
    match precision {
        None => format!("{value}"),
        Some(p) => crate::export::format_float(value, p),
    }
}
