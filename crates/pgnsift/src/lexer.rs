use pgnsift_base::prelude::*;
use tracing::debug;

/// PGN lexical tokens. Move suffix annotations are rewritten as NAG
/// tokens and trailing check indicators as CheckSymbol tokens, both
/// emitted directly after their move.
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Tag(String),
    Str(String),
    TagEnd,
    Comment(String),
    MoveText(String),
    MoveNumber(u32),
    Nag(Nag),
    CheckSymbol(char),
    RavStart,
    RavEnd,
    Result(Outcome),
    Error(String),
}

pub type Nag = u16;

pub struct Lexer<'a> {
    chars:         Vec<char>,
    pos:           usize,
    line:          u32,
    at_line_start: bool,
    nested_comments: bool,
    pending:       Vec<(Token, u32)>,
    src:           &'a str,
}

/// Tokenize a whole source buffer. Lexical errors become Error tokens so
/// the parser can recover per game.
pub fn tokenize(src: &str, nested_comments: bool) -> Vec<(Token, u32)> {
    Lexer::new(src, nested_comments).run()
}

const MOVE_CHARS: &str = "/=+#!?-";

fn is_move_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || MOVE_CHARS.contains(ch)
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str, nested_comments: bool) -> Lexer<'a> {
        Lexer {
            chars: src.chars().collect(),
            pos: 0,
            line: 1,
            at_line_start: true,
            nested_comments,
            pending: Vec::new(),
            src,
        }
    }

    fn run(mut self) -> Vec<(Token, u32)> {
        let mut tokens = Vec::new();
        while let Some(tok) = self.next_token() {
            tokens.push(tok);
        }
        debug!("lexed {} tokens from {} chars", tokens.len(), self.src.len());
        tokens
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.at_line_start = true;
        } else {
            self.at_line_start = false;
        }
        Some(ch)
    }

    fn skip_to_eol(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn next_token(&mut self) -> Option<(Token, u32)> {
        if !self.pending.is_empty() {
            return Some(self.pending.remove(0));
        }
        loop {
            // '%' escapes a whole line, only from column 0
            if self.at_line_start && self.peek() == Some('%') {
                self.skip_to_eol();
            }
            let ch = self.peek()?;
            if ch.is_whitespace() {
                self.bump();
                continue;
            }
            let line = self.line;
            let token = match ch {
                '[' => {
                    self.bump();
                    self.lex_tag_name()
                }
                '"' => {
                    self.bump();
                    self.lex_string()
                }
                ']' => {
                    self.bump();
                    Token::TagEnd
                }
                '{' => {
                    self.bump();
                    self.lex_brace_comment()
                }
                ';' => {
                    self.bump();
                    let start = self.pos;
                    self.skip_to_eol();
                    Token::Comment(self.chars[start..self.pos].iter().collect())
                }
                '(' => {
                    self.bump();
                    Token::RavStart
                }
                ')' => {
                    self.bump();
                    Token::RavEnd
                }
                '$' => {
                    self.bump();
                    self.lex_nag()
                }
                '*' => {
                    self.bump();
                    Token::Result(Outcome::Unterminated)
                }
                '.' => {
                    // stray dots ride on black-to-move continuations
                    self.bump();
                    continue;
                }
                _ if is_move_char(ch) => match self.lex_move_run() {
                    Some(t) => t,
                    None => continue, // a skipped bare number
                },
                _ => {
                    self.bump();
                    Token::Error(format!("unknown character '{ch}'"))
                }
            };
            return Some((token, line));
        }
    }

    fn lex_tag_name(&mut self) -> Token {
        while matches!(self.peek(), Some(ch) if ch.is_whitespace()) {
            self.bump();
        }
        let start = self.pos;
        while matches!(self.peek(), Some(ch) if ch.is_ascii_alphanumeric() || ch == '_') {
            self.bump();
        }
        if self.pos == start {
            return Token::Error("missing tag name after '['".to_string());
        }
        Token::Tag(self.chars[start..self.pos].iter().collect())
    }

    fn lex_string(&mut self) -> Token {
        let mut s = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Token::Error("unterminated string".to_string()),
                Some('"') => return Token::Str(s),
                Some('\\') => match self.bump() {
                    Some(esc @ ('"' | '\\')) => s.push(esc),
                    Some(other) => {
                        s.push('\\');
                        s.push(other);
                    }
                    None => return Token::Error("unterminated string".to_string()),
                },
                Some(ch) => s.push(ch),
            }
        }
    }

    fn lex_brace_comment(&mut self) -> Token {
        let mut s = String::new();
        let mut depth = 1;
        loop {
            match self.bump() {
                None => return Token::Error("unterminated comment".to_string()),
                Some('{') if self.nested_comments => {
                    depth += 1;
                    s.push('{');
                }
                Some('{') => return Token::Error("nested comment without --nestedcomments".to_string()),
                Some('}') => {
                    depth -= 1;
                    if depth == 0 {
                        return Token::Comment(s);
                    }
                    s.push('}');
                }
                Some(ch) => s.push(ch),
            }
        }
    }

    fn lex_nag(&mut self) -> Token {
        let start = self.pos;
        while matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
            self.bump();
        }
        if self.pos == start {
            return Token::Error("'$' without a NAG number".to_string());
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        match digits.parse::<Nag>() {
            Ok(n) => Token::Nag(n),
            Err(_) => Token::Error(format!("NAG '${digits}' out of range")),
        }
    }

    /// suffix glyph → numeric annotation glyph
    fn glyph_nag(glyphs: &str) -> Option<Nag> {
        match glyphs {
            "!" => Some(1),
            "?" => Some(2),
            "!!" => Some(3),
            "??" => Some(4),
            "!?" => Some(5),
            "?!" => Some(6),
            _ => None,
        }
    }

    fn lex_move_run(&mut self) -> Option<Token> {
        let line = self.line;
        let start = self.pos;
        while matches!(self.peek(), Some(ch) if is_move_char(ch)) {
            self.bump();
        }
        let run: String = self.chars[start..self.pos].iter().collect();

        match run.as_str() {
            "1-0" => return Some(Token::Result(Outcome::Win(Color::White))),
            "0-1" => return Some(Token::Result(Outcome::Win(Color::Black))),
            "1/2-1/2" | "1/2" => return Some(Token::Result(Outcome::Draw)),
            _ => {}
        }

        if run.chars().all(|ch| ch.is_ascii_digit()) {
            if self.peek() == Some('.') {
                while self.peek() == Some('.') {
                    self.bump();
                }
                return match run.parse::<u32>() {
                    Ok(n) => Some(Token::MoveNumber(n)),
                    Err(_) => Some(Token::Error(format!("move number '{run}' out of range"))),
                };
            }
            // a bare number: skipped per the PGN export convention
            return None;
        }

        // peel suffix annotations off the move text
        let mut text = run.as_str();
        let glyphs_at = text.len() - text.chars().rev().take_while(|c| *c == '!' || *c == '?').count();
        let glyphs = &text[glyphs_at..];
        text = &text[..glyphs_at];

        let checks_at = text.len() - text.chars().rev().take_while(|c| *c == '+' || *c == '#').count();
        let checks = &text[checks_at..];
        text = &text[..checks_at];

        if text.is_empty() {
            return Some(Token::Error(format!("'{run}' is not a move")));
        }
        for ch in checks.chars() {
            self.pending.push((Token::CheckSymbol(ch), line));
        }
        if !glyphs.is_empty() {
            match Self::glyph_nag(glyphs) {
                Some(nag) => self.pending.push((Token::Nag(nag), line)),
                None => self.pending.push((Token::Error(format!("bad suffix '{glyphs}'")), line)),
            }
        }
        Some(Token::MoveText(text.to_string()))
    }
}
