//! Ordered word consumption for one block.
//!
//! The interpreter pulls words out of a [`Statement`] one concern at a
//! time; whatever is left when it is done was not understood and is
//! reported.

use crate::gcode::modal::ModalGroup;
use crate::gcode::{Block, Word};

use super::VmErrorKind;

#[derive(Debug, Clone, Default)]
pub struct Statement {
    words: Vec<Word>,
}

impl Statement {
    pub fn from_block(block: &Block) -> Self {
        Self {
            words: block.words().copied().collect(),
        }
    }

    pub fn has_word(&self, address: char) -> bool {
        self.words.iter().any(|w| w.address == address)
    }

    /// Removes and returns the word addressed `address`. More than one
    /// occurrence is an error.
    pub fn take_word(&mut self, address: char) -> Result<Option<f64>, VmErrorKind> {
        let mut found = None;
        let mut idx = 0;
        while idx < self.words.len() {
            if self.words[idx].address == address {
                if found.is_some() {
                    return Err(VmErrorKind::DuplicateWord { address });
                }
                found = Some(self.words.remove(idx).command);
            } else {
                idx += 1;
            }
        }
        Ok(found)
    }

    pub fn take_word_default(&mut self, address: char, default: f64) -> Result<f64, VmErrorKind> {
        Ok(self.take_word(address)?.unwrap_or(default))
    }

    /// Removes every word addressed `address`, in order.
    pub fn take_all(&mut self, address: char) -> Vec<f64> {
        let mut taken = Vec::new();
        self.words.retain(|w| {
            if w.address == address {
                taken.push(w.command);
                false
            } else {
                true
            }
        });
        taken
    }

    /// Removes and returns the block's member of `group`. Two distinct
    /// members is an error; a literally repeated member is consumed once.
    pub fn take_modal(&mut self, group: ModalGroup) -> Result<Option<Word>, VmErrorKind> {
        let mut found: Option<Word> = None;
        for w in self.words.iter() {
            if group.contains(w) {
                match found {
                    Some(prev) if prev != *w => {
                        return Err(VmErrorKind::ModalConflict(group.name()))
                    }
                    _ => found = Some(*w),
                }
            }
        }
        if let Some(word) = found {
            self.words.retain(|w| *w != word);
        }
        Ok(found)
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn remaining(&self) -> &[Word] {
        &self.words
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcode::parser::parse;

    fn stmt(src: &str) -> Statement {
        let doc = parse(src).unwrap();
        Statement::from_block(&doc.blocks[0])
    }

    #[test]
    fn take_word_consumes() {
        let mut s = stmt("G1 X4 F100");
        assert_eq!(s.take_word('F').unwrap(), Some(100.0));
        assert_eq!(s.take_word('F').unwrap(), None);
        assert_eq!(s.remaining().len(), 2);
    }

    #[test]
    fn duplicate_word_errors() {
        let mut s = stmt("X1 X2");
        assert!(matches!(
            s.take_word('X'),
            Err(VmErrorKind::DuplicateWord { address: 'X' })
        ));
    }

    #[test]
    fn take_modal_consumes_group_member() {
        let mut s = stmt("G1 X4 M3");
        let w = s.take_modal(ModalGroup::Motion).unwrap().unwrap();
        assert_eq!(w.command, 1.0);
        assert!(!s.has_word('G'));
        assert!(s.has_word('M'));
    }

    #[test]
    fn residue_is_visible() {
        let mut s = stmt("G1 X4 Q9");
        s.take_modal(ModalGroup::Motion).unwrap();
        s.take_word('X').unwrap();
        assert!(!s.is_empty());
        assert_eq!(s.remaining()[0].address, 'Q');
    }
}
