//! The line-oriented streaming parser.
//!
//! The parser pulls bytes one at a time through a two-byte sliding
//! window (`cur`, `next`) and never aborts on a malformed line: every
//! syntax error is reported through the options' logger and recovery
//! resumes at the next line, with defined discard semantics for
//! whatever the broken line had materialized. Only an exhausted arena
//! or an abort request from the logger ends a parse early.
//!
//! Strings are decoded straight into the arena tail through the
//! scratch protocol: a decoded string that turns out to duplicate an
//! interned one, or whose containing entry is rejected, is given back
//! by rolling the arena cursor to where the string began. The parser
//! keeps that rollback legal by never allocating anything else between
//! materializing a string and deciding its fate.

use core::ops::ControlFlow;

use crate::document::{Document, SectionId, SectionKind};
use crate::error::{Error, Result};
use crate::map;
use crate::options::ParseOptions;
use crate::reader::ByteSource;
use crate::strtab::{self, Scratch};

pub(crate) struct Parser<'doc, 'cb, S: ByteSource> {
    doc: &'doc mut Document,
    src: S,
    opts: ParseOptions<'cb>,
    cur: Option<u8>,
    next: Option<u8>,
    line: u32,
    /// Where entries go; cleared whenever a header is skipped.
    current: Option<(SectionId, SectionKind)>,
    /// Whether any header line has been seen, usable or not. Entry
    /// lines before the first one are errors; entry lines under a
    /// skipped header are discarded silently.
    had_header: bool,
    created: usize,
}

fn hex_value(byte: u8) -> Option<u32> {
    match byte {
        b'0'..=b'9' => Some(u32::from(byte - b'0')),
        b'a'..=b'f' => Some(u32::from(byte - b'a') + 10),
        b'A'..=b'F' => Some(u32::from(byte - b'A') + 10),
        _ => None,
    }
}

impl<'doc, 'cb, S: ByteSource> Parser<'doc, 'cb, S> {
    pub(crate) fn new(doc: &'doc mut Document, src: S, opts: ParseOptions<'cb>) -> Self {
        let mut parser = Parser {
            doc,
            src,
            opts,
            cur: None,
            next: None,
            line: 1,
            current: None,
            had_header: false,
            created: 0,
        };
        parser.advance();
        parser.advance();
        parser
    }

    /// Shifts the window one byte. The line counter ticks when a
    /// newline becomes the current byte, so anything detected while
    /// sitting on a line's terminator reports the following line.
    fn advance(&mut self) {
        self.cur = self.next;
        self.next = self.src.next_byte();
        if self.cur == Some(b'\n') {
            self.line += 1;
        }
    }

    fn skip_blank(&mut self) {
        while matches!(self.cur, Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n')) {
            self.advance();
        }
    }

    fn skip_spaces(&mut self) {
        while matches!(self.cur, Some(b' ') | Some(b'\t') | Some(b'\r')) {
            self.advance();
        }
    }

    fn skip_to_eol(&mut self) {
        while !matches!(self.cur, None | Some(b'\n')) {
            self.advance();
        }
    }

    fn skip_line(&mut self) {
        if self.cur == Some(b'\n') {
            self.advance();
        }
    }

    /// Reports a recovered error; [Error::ParseAborted] if the logger
    /// breaks.
    fn log(&mut self, err: Error) -> Result<()> {
        log::warn!("line {}: {}", self.line, err);
        if let Some(logger) = self.opts.error_logger.as_mut() {
            if let ControlFlow::Break(()) = logger(err, self.line) {
                return Err(Error::ParseAborted);
            }
        }
        Ok(())
    }

    fn at_budget(&self) -> bool {
        self.opts.max_sections != 0 && self.created >= self.opts.max_sections
    }

    pub(crate) fn run(mut self) -> Result<()> {
        loop {
            self.skip_blank();
            let first = match self.cur {
                None => break,
                Some(first) => first,
            };
            match first {
                b'{' if self.next != Some(b'}') => {
                    if self.at_budget() {
                        log::debug!("stopping at section budget, line {}", self.line);
                        return Ok(());
                    }
                    self.section_header(SectionKind::Table, b'}')?;
                }
                b'[' if self.next != Some(b']') => {
                    if self.at_budget() {
                        log::debug!("stopping at section budget, line {}", self.line);
                        return Ok(());
                    }
                    self.section_header(SectionKind::Array, b']')?;
                }
                b'#' => self.skip_to_eol(),
                _ => self.entry()?,
            }
            // Sub-parsers leave the current byte on the terminating
            // newline (or end of input), never past it.
            debug_assert!(matches!(self.cur, None | Some(b'\n')));
            self.skip_line();
        }
        log::debug!("parse done: {} sections created", self.created);
        Ok(())
    }

    /// `{name}` or `[name]`, then optional whitespace and a comment.
    fn section_header(&mut self, kind: SectionKind, delim: u8) -> Result<()> {
        self.had_header = true;
        self.advance(); // past the opening delimiter
        let name = self.parse_string(delim)?;
        let closed = self.cur == Some(delim);
        if closed {
            self.advance();
            self.skip_spaces();
            if !matches!(self.cur, None | Some(b'\n') | Some(b'#')) {
                if let Err(err) = self.log(Error::TextAfterSectionHeader) {
                    name.discard(&mut self.doc.arena);
                    return Err(err);
                }
                while !matches!(self.cur, None | Some(b'\n') | Some(b'#')) {
                    self.advance();
                }
            }
        }
        if self.cur == Some(b'#') {
            self.skip_to_eol();
        }
        if !closed {
            // The name was cut at the end of the line; the section is
            // still created under the cut name.
            if let Err(err) = self.log(Error::SectionHeaderUnclosed) {
                name.discard(&mut self.doc.arena);
                return Err(err);
            }
        }
        if name.len() == 0 {
            name.discard(&mut self.doc.arena);
            self.current = None;
            return self.log(Error::SectionNameEmpty);
        }
        let duplicate = {
            let bytes = name.bytes(&self.doc.arena);
            let hash = strtab::hash_bytes(bytes);
            map::find_bytes(&self.doc.arena, self.doc.sections, hash, bytes).is_some()
        };
        if duplicate {
            name.discard(&mut self.doc.arena);
            self.current = None;
            return self.log(Error::SectionNameReused);
        }
        if let Some(filter) = self.opts.section_filter.as_mut() {
            let bytes = name.bytes(&self.doc.arena);
            if !filter(bytes, kind) {
                name.discard(&mut self.doc.arena);
                self.current = None;
                log::debug!("section filtered out at line {}", self.line);
                return Ok(());
            }
        }
        let atom = name.finish(&mut self.doc.arena, self.doc.strings)?;
        let id = self.doc.add_section_with(kind, atom)?;
        self.created += 1;
        self.current = Some((id, kind));
        Ok(())
    }

    /// A non-header, non-comment line: a table entry or an array row
    /// for the current section.
    fn entry(&mut self) -> Result<()> {
        match self.current {
            Some((id, SectionKind::Table)) => self.table_entry(id),
            Some((id, SectionKind::Array)) => self.array_row(id),
            None => {
                if !self.had_header {
                    self.log(Error::TextOutsideSection)?;
                }
                self.skip_to_eol();
                Ok(())
            }
        }
    }

    /// `key = value`. A reused key still consumes the whole line; its
    /// value string is materialized and then given back to the arena.
    fn table_entry(&mut self, id: SectionId) -> Result<()> {
        let key = self.parse_string(b'=')?;
        if self.cur != Some(b'=') {
            key.discard(&mut self.doc.arena);
            if self.cur == Some(b'#') {
                self.skip_to_eol();
            }
            return self.log(Error::TableEntryMissingEquals);
        }
        self.advance(); // past '='
        let key = key.finish(&mut self.doc.arena, self.doc.strings)?;
        let header = self.doc.table_header_unchecked(id);
        let reused = self.doc.table_contains(header, key);
        let value = self.parse_string(b'\n')?;
        if self.cur == Some(b'#') {
            self.skip_to_eol();
        }
        if reused {
            value.discard(&mut self.doc.arena);
            return self.log(Error::TableKeyReused);
        }
        let value = value.finish(&mut self.doc.arena, self.doc.strings)?;
        self.doc.table_add_with(header, key, value)
    }

    /// A comma-separated row. The first value pushed starts a new row;
    /// a trailing comma does not produce an empty last value.
    fn array_row(&mut self, id: SectionId) -> Result<()> {
        let state = self.doc.array_state_unchecked(id);
        let mut new_row = true;
        loop {
            let value = self.parse_string(b',')?;
            let atom = value.finish(&mut self.doc.arena, self.doc.strings)?;
            self.doc.array_push_with(state, atom, new_row)?;
            new_row = false;
            if self.cur != Some(b',') {
                break;
            }
            self.advance(); // past ','
            self.skip_spaces();
            if matches!(self.cur, None | Some(b'\n') | Some(b'#')) {
                break;
            }
        }
        if self.cur == Some(b'#') {
            self.skip_to_eol();
        }
        Ok(())
    }

    /// Decodes one string of any flavor into a scratch at the arena
    /// tail. On return the current byte is the terminator the caller
    /// asked about: `delim`, `#`, the newline, or end of input.
    fn parse_string(&mut self, delim: u8) -> Result<Scratch> {
        self.skip_spaces();
        let mut scratch = Scratch::begin(&mut self.doc.arena)?;
        match self.fill_string(&mut scratch, delim) {
            Ok(()) => Ok(scratch),
            Err(err) => {
                scratch.discard(&mut self.doc.arena);
                Err(err)
            }
        }
    }

    fn fill_string(&mut self, s: &mut Scratch, delim: u8) -> Result<()> {
        // A section-reference prefix is copied verbatim ahead of the
        // flavor; it does not alter terminator semantics.
        if (self.cur == Some(b'{') && self.next == Some(b'}'))
            || (self.cur == Some(b'[') && self.next == Some(b']'))
        {
            if let (Some(open), Some(close)) = (self.cur, self.next) {
                s.push(&mut self.doc.arena, open)?;
                s.push(&mut self.doc.arena, close)?;
            }
            self.advance();
            self.advance();
            self.skip_spaces();
        }
        match self.cur {
            Some(quote @ (b'"' | b'\'')) => self.quoted(s, quote, delim),
            Some(b'`') => self.escaped(s, delim),
            _ => self.unquoted(s, delim),
        }
    }

    /// Bare text up to the delimiter, a comment or the end of the
    /// line; trailing whitespace is trimmed.
    fn unquoted(&mut self, s: &mut Scratch, delim: u8) -> Result<()> {
        loop {
            match self.cur {
                None | Some(b'\n') | Some(b'#') => break,
                Some(c) if c == delim => break,
                Some(c) => {
                    s.push(&mut self.doc.arena, c)?;
                    self.advance();
                }
            }
        }
        s.trim_trailing_whitespace(&mut self.doc.arena);
        Ok(())
    }

    /// `"…"` or `'…'`: bytes copied verbatim. A string that hits the
    /// end of its line is cut there.
    fn quoted(&mut self, s: &mut Scratch, quote: u8, delim: u8) -> Result<()> {
        loop {
            match self.next {
                None | Some(b'\n') => {
                    self.log(Error::MissingEndQuote)?;
                    self.advance();
                    return Ok(());
                }
                Some(c) if c == quote => {
                    self.advance();
                    self.advance();
                    return self.after_quote(delim);
                }
                Some(c) => {
                    self.advance();
                    s.push(&mut self.doc.arena, c)?;
                }
            }
        }
    }

    /// Consumes whatever sits between a closing quote and the
    /// delimiter; non-whitespace there is reported once and dropped.
    fn after_quote(&mut self, delim: u8) -> Result<()> {
        self.skip_spaces();
        if matches!(self.cur, None | Some(b'\n') | Some(b'#')) || self.cur == Some(delim) {
            return Ok(());
        }
        self.log(Error::TextAfterEndQuote)?;
        while !(matches!(self.cur, None | Some(b'\n') | Some(b'#')) || self.cur == Some(delim)) {
            self.advance();
        }
        Ok(())
    }

    /// `` `…` ``: the only flavor that decodes escape sequences.
    fn escaped(&mut self, s: &mut Scratch, delim: u8) -> Result<()> {
        loop {
            match self.next {
                None | Some(b'\n') => {
                    self.log(Error::MissingEndQuote)?;
                    self.advance();
                    return Ok(());
                }
                Some(b'`') => {
                    self.advance();
                    self.advance();
                    return self.after_quote(delim);
                }
                Some(b'\\') => {
                    self.advance();
                    self.escape(s)?;
                }
                Some(c) => {
                    self.advance();
                    s.push(&mut self.doc.arena, c)?;
                }
            }
        }
    }

    /// Decodes one escape sequence; the current byte is the backslash.
    /// On a malformed sequence a literal backslash (plus whatever was
    /// already consumed) is emitted and decoding continues in place.
    fn escape(&mut self, s: &mut Scratch) -> Result<()> {
        let letter = match self.next {
            None | Some(b'\n') => {
                self.log(Error::TextInvalidEscape)?;
                return s.push(&mut self.doc.arena, b'\\');
            }
            Some(letter) => letter,
        };
        match letter {
            b'a' => self.emit(s, 0x07),
            b'b' => self.emit(s, 0x08),
            b'e' => self.emit(s, 0x1B),
            b'f' => self.emit(s, 0x0C),
            b'n' => self.emit(s, 0x0A),
            b'r' => self.emit(s, 0x0D),
            b't' => self.emit(s, 0x09),
            b'\\' => self.emit(s, 0x5C),
            b'\'' => self.emit(s, 0x27),
            b'"' => self.emit(s, 0x22),
            b'`' => self.emit(s, 0x60),
            b'?' => self.emit(s, 0x3F),
            b'0'..=b'7' => self.octal_escape(s),
            b'x' => self.hex_escape(s),
            b'u' => self.unicode_escape(s, b'u', 4),
            b'U' => self.unicode_escape(s, b'U', 8),
            _ => {
                // Unknown escape: emit the backslash and let the copy
                // loop take the follow-up byte as-is.
                self.log(Error::TextInvalidEscape)?;
                s.push(&mut self.doc.arena, b'\\')
            }
        }
    }

    fn emit(&mut self, s: &mut Scratch, byte: u8) -> Result<()> {
        self.advance(); // consume the escape letter
        s.push(&mut self.doc.arena, byte)
    }

    /// `\ooo`: up to three octal digits; values past 255 clamp.
    fn octal_escape(&mut self, s: &mut Scratch) -> Result<()> {
        self.advance(); // onto the first digit
        let mut value = match self.cur {
            Some(digit @ b'0'..=b'7') => u32::from(digit - b'0'),
            _ => 0,
        };
        for _ in 0..2 {
            match self.next {
                Some(digit @ b'0'..=b'7') => {
                    self.advance();
                    value = value * 8 + u32::from(digit - b'0');
                }
                _ => break,
            }
        }
        s.push(&mut self.doc.arena, value.min(255) as u8)
    }

    /// `\xHH`: exactly two hex digits; anything less replays the bytes
    /// already read as literal text.
    fn hex_escape(&mut self, s: &mut Scratch) -> Result<()> {
        self.advance(); // onto the 'x'
        let hi = match self.next.and_then(hex_value) {
            Some(hi) => {
                self.advance();
                hi
            }
            None => {
                self.log(Error::TextInvalidEscape)?;
                s.push(&mut self.doc.arena, b'\\')?;
                return s.push(&mut self.doc.arena, b'x');
            }
        };
        let hi_digit = self.cur;
        let lo = match self.next.and_then(hex_value) {
            Some(lo) => {
                self.advance();
                lo
            }
            None => {
                self.log(Error::TextInvalidEscape)?;
                s.push(&mut self.doc.arena, b'\\')?;
                s.push(&mut self.doc.arena, b'x')?;
                if let Some(digit) = hi_digit {
                    s.push(&mut self.doc.arena, digit)?;
                }
                return Ok(());
            }
        };
        s.push(&mut self.doc.arena, (hi * 16 + lo) as u8)
    }

    /// `\uHHHH` / `\UHHHHHHHH`: a hex codepoint encoded as UTF-8. A
    /// short digit run or a codepoint past U+10FFFF replays what was
    /// read, verbatim.
    fn unicode_escape(&mut self, s: &mut Scratch, letter: u8, count: usize) -> Result<()> {
        self.advance(); // onto the letter
        let mut digits = [0u8; 8];
        let mut value: u32 = 0;
        for i in 0..count {
            match self.next.and_then(hex_value) {
                Some(v) => {
                    self.advance();
                    if let Some(digit) = self.cur {
                        digits[i] = digit;
                    }
                    value = (value << 4) | v;
                }
                None => {
                    self.log(Error::TextInvalidEscape)?;
                    s.push(&mut self.doc.arena, b'\\')?;
                    s.push(&mut self.doc.arena, letter)?;
                    for &digit in &digits[..i] {
                        s.push(&mut self.doc.arena, digit)?;
                    }
                    return Ok(());
                }
            }
        }
        if value > 0x0010_FFFF {
            self.log(Error::TextInvalidEscape)?;
            s.push(&mut self.doc.arena, b'\\')?;
            s.push(&mut self.doc.arena, letter)?;
            for &digit in &digits[..count] {
                s.push(&mut self.doc.arena, digit)?;
            }
            return Ok(());
        }
        self.push_utf8(s, value)
    }

    fn push_utf8(&mut self, s: &mut Scratch, cp: u32) -> Result<()> {
        let arena = &mut self.doc.arena;
        if cp < 0x80 {
            s.push(arena, cp as u8)
        } else if cp < 0x800 {
            s.push(arena, 0xC0 | (cp >> 6) as u8)?;
            s.push(arena, 0x80 | (cp & 0x3F) as u8)
        } else if cp < 0x10000 {
            s.push(arena, 0xE0 | (cp >> 12) as u8)?;
            s.push(arena, 0x80 | ((cp >> 6) & 0x3F) as u8)?;
            s.push(arena, 0x80 | (cp & 0x3F) as u8)
        } else {
            s.push(arena, 0xF0 | (cp >> 18) as u8)?;
            s.push(arena, 0x80 | ((cp >> 12) & 0x3F) as u8)?;
            s.push(arena, 0x80 | ((cp >> 6) & 0x3F) as u8)?;
            s.push(arena, 0x80 | (cp & 0x3F) as u8)
        }
    }
}
