//! Exception regions expressed as instruction index ranges.
//!
//! Method bodies store exception clauses in byte offsets. After decoding, each clause is
//! translated into [`IndexRange`]s over the instruction sequence, and clauses protecting the
//! same try block are grouped into one [`ExceptionRegion`]. Regions never change after
//! decoding.

use std::{collections::HashMap, fmt};

use crate::{
    assembly::instruction::Instruction,
    metadata::{ExceptionHandler, ExceptionHandlerFlags},
    Result,
};

/// Half-open range of instruction indices `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexRange {
    /// First instruction of the range
    pub start: usize,
    /// One past the last instruction of the range
    pub end: usize,
}

impl IndexRange {
    /// Creates a new range
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        IndexRange { start, end }
    }

    /// Returns `true` if `index` lies within the range
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.start <= index && index < self.end
    }

    /// Number of instructions covered
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` for an empty range
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Returns `true` if `other` lies entirely inside this range
    #[must_use]
    pub fn encloses(&self, other: &IndexRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Returns `true` if the ranges share at least one instruction
    #[must_use]
    pub fn overlaps(&self, other: &IndexRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for IndexRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Kind of a handler block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerKind {
    /// Typed catch clause
    Catch {
        /// Caught exception type, when known
        catch_type: Option<String>,
    },
    /// Filtered catch clause
    Filter {
        /// Index of the first filter instruction
        filter_start: usize,
    },
    /// Finally block
    Finally,
    /// Fault block
    Fault,
}

/// One handler block attached to a try range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handler {
    /// Kind of handler
    pub kind: HandlerKind,
    /// Instructions of the handler block
    pub range: IndexRange,
}

/// A protected try range with all of its handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionRegion {
    /// Protected instructions
    pub try_range: IndexRange,
    /// Handlers in clause order
    pub handlers: Vec<Handler>,
}

impl ExceptionRegion {
    /// Ranges of catch and filter handlers
    pub fn catch_ranges(&self) -> impl Iterator<Item = IndexRange> + '_ {
        self.handlers
            .iter()
            .filter(|h| matches!(h.kind, HandlerKind::Catch { .. } | HandlerKind::Filter { .. }))
            .map(|h| h.range)
    }

    /// Range of the finally handler, if any
    #[must_use]
    pub fn finally_range(&self) -> Option<IndexRange> {
        self.handlers
            .iter()
            .find(|h| h.kind == HandlerKind::Finally)
            .map(|h| h.range)
    }

    /// Range of the fault handler, if any
    #[must_use]
    pub fn fault_range(&self) -> Option<IndexRange> {
        self.handlers
            .iter()
            .find(|h| h.kind == HandlerKind::Fault)
            .map(|h| h.range)
    }
}

/// All exception regions of one method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExceptionRegions {
    regions: Vec<ExceptionRegion>,
}

impl ExceptionRegions {
    /// Translates byte-offset clauses into index-based regions.
    ///
    /// # Errors
    /// Returns a malformed-body error when a boundary is not an instruction start, lies
    /// outside the body, a range is empty, or two try ranges partially overlap.
    pub fn from_handlers(
        handlers: &[ExceptionHandler],
        instructions: &[Instruction],
        code_len: u32,
    ) -> Result<Self> {
        if handlers.is_empty() {
            return Ok(ExceptionRegions::default());
        }

        let starts: HashMap<u32, usize> = instructions
            .iter()
            .map(|instr| (instr.offset, instr.index))
            .collect();
        let boundary = |offset: u32, what: &str| -> Result<usize> {
            if offset == code_len {
                return Ok(instructions.len());
            }
            starts.get(&offset).copied().ok_or_else(|| {
                malformed_error!(
                    "{} boundary IL_{:04x} is not an instruction start",
                    what,
                    offset
                )
            })
        };
        let range = |offset: u32, length: u32, what: &str| -> Result<IndexRange> {
            let end = offset
                .checked_add(length)
                .filter(|end| *end <= code_len)
                .ok_or_else(|| malformed_error!("{} block IL_{:04x}+{} exceeds the body", what, offset, length))?;
            let range = IndexRange::new(boundary(offset, what)?, boundary(end, what)?);
            if range.is_empty() {
                return Err(malformed_error!("{} block at IL_{:04x} is empty", what, offset));
            }
            Ok(range)
        };

        let mut regions: Vec<ExceptionRegion> = Vec::new();
        for clause in handlers {
            let try_range = range(clause.try_offset, clause.try_length, "try")?;
            let handler_range = range(clause.handler_offset, clause.handler_length, "handler")?;

            let kind = if clause.flags.contains(ExceptionHandlerFlags::FINALLY) {
                HandlerKind::Finally
            } else if clause.flags.contains(ExceptionHandlerFlags::FAULT) {
                HandlerKind::Fault
            } else if clause.flags.contains(ExceptionHandlerFlags::FILTER) {
                HandlerKind::Filter {
                    filter_start: boundary(clause.filter_offset, "filter")?,
                }
            } else {
                HandlerKind::Catch {
                    catch_type: clause.catch_type.clone(),
                }
            };
            let handler = Handler {
                kind,
                range: handler_range,
            };

            match regions.iter_mut().find(|r| r.try_range == try_range) {
                Some(region) => region.handlers.push(handler),
                None => regions.push(ExceptionRegion {
                    try_range,
                    handlers: vec![handler],
                }),
            }
        }

        for (i, outer) in regions.iter().enumerate() {
            for inner in &regions[i + 1..] {
                let (a, b) = (outer.try_range, inner.try_range);
                if a.overlaps(&b) && !a.encloses(&b) && !b.encloses(&a) {
                    return Err(malformed_error!(
                        "try blocks {} and {} overlap without nesting",
                        a,
                        b
                    ));
                }
            }
        }

        Ok(ExceptionRegions { regions })
    }

    /// Number of regions
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Returns `true` if the method has no exception regions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Iterates regions in clause order
    pub fn iter(&self) -> impl Iterator<Item = &ExceptionRegion> {
        self.regions.iter()
    }

    /// The region whose try block starts at `index`
    #[must_use]
    pub fn try_starting_at(&self, index: usize) -> Option<&ExceptionRegion> {
        self.regions.iter().find(|r| r.try_range.start == index)
    }

    /// The region owning a finally block that starts at `index`
    #[must_use]
    pub fn finally_starting_at(&self, index: usize) -> Option<&ExceptionRegion> {
        self.regions
            .iter()
            .find(|r| r.finally_range().is_some_and(|f| f.start == index))
    }

    /// The handler (or filter) block starting at `index`
    #[must_use]
    pub fn handler_starting_at(&self, index: usize) -> Option<(&ExceptionRegion, &Handler)> {
        self.regions.iter().find_map(|region| {
            region
                .handlers
                .iter()
                .find(|h| {
                    h.range.start == index
                        || matches!(h.kind, HandlerKind::Filter { filter_start } if filter_start == index)
                })
                .map(|h| (region, h))
        })
    }

    /// Returns `true` if control can enter `index` from the exception machinery
    #[must_use]
    pub fn is_handler_entry(&self, index: usize) -> bool {
        self.handler_starting_at(index).is_some()
    }

    /// The innermost region whose try block contains `index`
    #[must_use]
    pub fn enclosing_try(&self, index: usize) -> Option<&ExceptionRegion> {
        self.regions
            .iter()
            .filter(|r| r.try_range.contains(index))
            .min_by_key(|r| r.try_range.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assembly::decode_stream, Parser};

    // 0: nop  1: nop  2: leave.s 6  3: nop  4: endfinally  5: ret (offsets 0,1,2,4,5,6)
    const CODE: [u8; 7] = [0x00, 0x00, 0xDE, 0x02, 0x00, 0xDC, 0x2A];

    fn finally_clause(try_offset: u32, try_length: u32, handler_offset: u32, handler_length: u32) -> ExceptionHandler {
        ExceptionHandler {
            flags: ExceptionHandlerFlags::FINALLY,
            try_offset,
            try_length,
            handler_offset,
            handler_length,
            catch_type: None,
            filter_offset: 0,
        }
    }

    #[test]
    fn translates_offsets_to_indices() {
        let instructions = decode_stream(&mut Parser::new(&CODE)).unwrap();
        let regions =
            ExceptionRegions::from_handlers(&[finally_clause(0, 4, 4, 2)], &instructions, 7)
                .unwrap();

        assert_eq!(regions.len(), 1);
        let region = regions.iter().next().unwrap();
        assert_eq!(region.try_range, IndexRange::new(0, 3));
        assert_eq!(region.finally_range(), Some(IndexRange::new(3, 5)));
        assert!(regions.try_starting_at(0).is_some());
        assert!(regions.finally_starting_at(3).is_some());
        assert!(regions.finally_starting_at(2).is_none());
        assert!(regions.is_handler_entry(3));
        assert!(regions.enclosing_try(1).is_some());
        assert!(regions.enclosing_try(4).is_none());
    }

    #[test]
    fn rejects_mid_instruction_boundary() {
        let instructions = decode_stream(&mut Parser::new(&CODE)).unwrap();
        // offset 3 is the operand byte of leave.s
        let result = ExceptionRegions::from_handlers(&[finally_clause(0, 3, 4, 2)], &instructions, 7);
        assert!(result.unwrap_err().is_decode_error());

        let result = ExceptionRegions::from_handlers(&[finally_clause(0, 4, 4, 9)], &instructions, 7);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_partial_overlap() {
        let instructions = decode_stream(&mut Parser::new(&CODE)).unwrap();
        let clauses = [finally_clause(0, 2, 4, 2), finally_clause(1, 3, 4, 2)];
        let result = ExceptionRegions::from_handlers(&clauses, &instructions, 7);
        assert!(result.is_err());

        // nested is fine
        let clauses = [finally_clause(1, 1, 4, 2), finally_clause(0, 4, 4, 2)];
        let regions = ExceptionRegions::from_handlers(&clauses, &instructions, 7).unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions.enclosing_try(1).unwrap().try_range, IndexRange::new(1, 2));
    }

    #[test]
    fn groups_handlers_by_try_range() {
        let instructions = decode_stream(&mut Parser::new(&CODE)).unwrap();
        let catch = ExceptionHandler {
            flags: ExceptionHandlerFlags::EXCEPTION,
            try_offset: 0,
            try_length: 4,
            handler_offset: 4,
            handler_length: 1,
            catch_type: Some("System.Exception".into()),
            filter_offset: 0,
        };
        let clauses = [catch, finally_clause(0, 4, 5, 1)];
        let regions = ExceptionRegions::from_handlers(&clauses, &instructions, 7).unwrap();

        assert_eq!(regions.len(), 1);
        let region = regions.iter().next().unwrap();
        assert_eq!(region.catch_ranges().collect::<Vec<_>>(), vec![IndexRange::new(3, 4)]);
        assert_eq!(region.finally_range(), Some(IndexRange::new(4, 5)));
        assert!(region.fault_range().is_none());
    }
}
