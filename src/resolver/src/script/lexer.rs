use crate::error::{ScriptError, ScriptResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Template(Vec<TemplatePart>),
    Punct(Punct),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Text(String),
    // `${...}` 内的源码，pos 为其在整体源码中的位置
    Expr { source: String, pos: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punct {
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Colon,
    Dot,
    Ellipsis,
    QuestionDot,
    Question,
    Nullish,
    Arrow,
    Assign,
    PlusAssign,
    MinusAssign,
    Eq,
    StrictEq,
    Ne,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

const PUNCTS: &[(&str, Punct)] = &[
    ("...", Punct::Ellipsis),
    ("===", Punct::StrictEq),
    ("!==", Punct::StrictNe),
    ("=>", Punct::Arrow),
    ("==", Punct::Eq),
    ("!=", Punct::Ne),
    ("<=", Punct::Le),
    (">=", Punct::Ge),
    ("&&", Punct::And),
    ("||", Punct::Or),
    ("??", Punct::Nullish),
    ("+=", Punct::PlusAssign),
    ("-=", Punct::MinusAssign),
    ("(", Punct::LParen),
    (")", Punct::RParen),
    ("{", Punct::LBrace),
    ("}", Punct::RBrace),
    ("[", Punct::LBracket),
    ("]", Punct::RBracket),
    (",", Punct::Comma),
    (";", Punct::Semi),
    (":", Punct::Colon),
    (".", Punct::Dot),
    ("?", Punct::Question),
    ("=", Punct::Assign),
    ("<", Punct::Lt),
    (">", Punct::Gt),
    ("+", Punct::Plus),
    ("-", Punct::Minus),
    ("*", Punct::Star),
    ("/", Punct::Slash),
    ("%", Punct::Percent),
    ("!", Punct::Bang),
];

pub fn tokenize(input: &str, base: usize) -> ScriptResult<Vec<Spanned>> {
    let mut lexer = Lexer {
        chars: input.chars().collect(),
        pos: 0,
        base,
    };
    let mut tokens = Vec::new();
    loop {
        lexer.skip_trivia()?;
        let pos = lexer.offset();
        let Some(c) = lexer.peek() else {
            tokens.push(Spanned {
                token: Token::Eof,
                pos,
            });
            return Ok(tokens);
        };

        let token = if c.is_ascii_digit()
            || (c == '.' && lexer.peek_at(1).is_some_and(|c| c.is_ascii_digit()))
        {
            lexer.number()?
        } else if is_ident_start(c) {
            lexer.ident()
        } else if c == '"' || c == '\'' {
            lexer.string(c)?
        } else if c == '`' {
            lexer.template()?
        } else {
            Token::Punct(lexer.punct()?)
        };
        tokens.push(Spanned { token, pos });
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    base: usize,
}

impl Lexer {
    fn offset(&self) -> usize {
        self.base + self.pos
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.chars.get(self.pos + n).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn error<T>(&self, message: impl Into<String>) -> ScriptResult<T> {
        Err(ScriptError::Syntax {
            message: message.into(),
            pos: self.offset(),
        })
    }

    fn skip_trivia(&mut self) -> ScriptResult<()> {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(c), _) if c.is_whitespace() => self.pos += 1,
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                (Some('/'), Some('*')) => {
                    self.pos += 2;
                    loop {
                        match (self.peek(), self.peek_at(1)) {
                            (Some('*'), Some('/')) => {
                                self.pos += 2;
                                break;
                            }
                            (Some(_), _) => self.pos += 1,
                            (None, _) => return self.error("unterminated comment"),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn number(&mut self) -> ScriptResult<Token> {
        let start = self.pos;
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X')) {
            self.pos += 2;
            let digits_start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let digits: String = self.chars[digits_start..self.pos].iter().collect();
            return match u64::from_str_radix(&digits, 16) {
                Ok(n) => Ok(Token::Number(n as f64)),
                Err(_) => self.error("invalid hex literal"),
            };
        }

        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some('.') {
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let mark = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.pos += 1;
            }
            if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
            } else {
                self.pos = mark;
            }
        }
        if self.peek().is_some_and(is_ident_start) {
            return self.error("identifier directly after number");
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        match text.parse::<f64>() {
            Ok(n) => Ok(Token::Number(n)),
            Err(_) => self.error(format!("invalid number {}", text)),
        }
    }

    fn ident(&mut self) -> Token {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_continue) {
            self.pos += 1;
        }
        Token::Ident(self.chars[start..self.pos].iter().collect())
    }

    fn string(&mut self, quote: char) -> ScriptResult<Token> {
        self.pos += 1;
        let mut s = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return self.error("unterminated string"),
                Some(c) if c == quote => return Ok(Token::Str(s)),
                Some('\\') => self.escape(&mut s)?,
                Some(c) => s.push(c),
            }
        }
    }

    fn escape(&mut self, s: &mut String) -> ScriptResult<()> {
        let Some(c) = self.bump() else {
            return self.error("unterminated escape");
        };
        match c {
            'n' => s.push('\n'),
            't' => s.push('\t'),
            'r' => s.push('\r'),
            'b' => s.push('\u{8}'),
            'f' => s.push('\u{c}'),
            'v' => s.push('\u{b}'),
            '0' => s.push('\0'),
            '\n' => {}
            'x' => {
                let code = self.hex_digits(2)?;
                s.push(self.code_point(code)?);
            }
            'u' => {
                let code = if self.peek() == Some('{') {
                    self.pos += 1;
                    let start = self.pos;
                    while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                        self.pos += 1;
                    }
                    let digits: String = self.chars[start..self.pos].iter().collect();
                    if self.bump() != Some('}') {
                        return self.error("invalid unicode escape");
                    }
                    u32::from_str_radix(&digits, 16).or_else(|_| self.error("invalid unicode escape"))?
                } else {
                    self.hex_digits(4)?
                };
                s.push(self.code_point(code)?);
            }
            c => s.push(c),
        }
        Ok(())
    }

    fn hex_digits(&mut self, n: usize) -> ScriptResult<u32> {
        let mut code = 0;
        for _ in 0..n {
            match self.bump().and_then(|c| c.to_digit(16)) {
                Some(d) => code = code * 16 + d,
                None => return self.error("invalid escape sequence"),
            }
        }
        Ok(code)
    }

    fn code_point(&self, code: u32) -> ScriptResult<char> {
        match char::from_u32(code) {
            Some(c) => Ok(c),
            None => self.error("invalid code point"),
        }
    }

    fn template(&mut self) -> ScriptResult<Token> {
        self.pos += 1;
        let mut parts = Vec::new();
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return self.error("unterminated template literal"),
                Some('`') => break,
                Some('\\') => self.escape(&mut text)?,
                Some('$') if self.peek() == Some('{') => {
                    self.pos += 1;
                    if !text.is_empty() {
                        parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                    }
                    let pos = self.offset();
                    let source = self.template_expr()?;
                    parts.push(TemplatePart::Expr { source, pos });
                }
                Some(c) => text.push(c),
            }
        }
        if !text.is_empty() {
            parts.push(TemplatePart::Text(text));
        }
        Ok(Token::Template(parts))
    }

    // 读取到与 `${` 匹配的 `}`，跳过其中的字符串
    fn template_expr(&mut self) -> ScriptResult<String> {
        let start = self.pos;
        let mut depth = 1;
        loop {
            match self.bump() {
                None => return self.error("unterminated template expression"),
                Some('{') => depth += 1,
                Some('}') => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(self.chars[start..self.pos - 1].iter().collect());
                    }
                }
                Some(quote @ ('"' | '\'' | '`')) => loop {
                    match self.bump() {
                        None => return self.error("unterminated string"),
                        Some('\\') => {
                            self.bump();
                        }
                        Some(c) if c == quote => break,
                        Some(_) => {}
                    }
                },
                Some(_) => {}
            }
        }
    }

    fn punct(&mut self) -> ScriptResult<Punct> {
        // `a?.5:1` 是条件表达式
        if self.peek() == Some('?')
            && self.peek_at(1) == Some('.')
            && !self.peek_at(2).is_some_and(|c| c.is_ascii_digit())
        {
            self.pos += 2;
            return Ok(Punct::QuestionDot);
        }
        for (text, punct) in PUNCTS {
            let len = text.chars().count();
            if self.chars.len() >= self.pos + len
                && text.chars().zip(&self.chars[self.pos..]).all(|(a, b)| a == *b)
            {
                self.pos += len;
                return Ok(*punct);
            }
        }
        match self.peek() {
            Some(c) => self.error(format!("unexpected character '{}'", c)),
            None => self.error("unexpected end of input"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        tokenize(input, 0)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn arrow_function_tokens() {
        assert_eq!(
            tokens("(repo, filter) => repo"),
            vec![
                Token::Punct(Punct::LParen),
                Token::Ident("repo".to_owned()),
                Token::Punct(Punct::Comma),
                Token::Ident("filter".to_owned()),
                Token::Punct(Punct::RParen),
                Token::Punct(Punct::Arrow),
                Token::Ident("repo".to_owned()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn strings_numbers_and_comments() {
        assert_eq!(
            tokens("'a\\'b' \"c\\n\" // tail\n 1.5e2 0x1F /* x */ .5"),
            vec![
                Token::Str("a'b".to_owned()),
                Token::Str("c\n".to_owned()),
                Token::Number(150.0),
                Token::Number(31.0),
                Token::Number(0.5),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn optional_chaining_versus_ternary() {
        assert_eq!(
            tokens("a?.b")[1],
            Token::Punct(Punct::QuestionDot),
        );
        assert_eq!(tokens("a?.5:1")[1], Token::Punct(Punct::Question));
        assert_eq!(tokens("a ?? b")[1], Token::Punct(Punct::Nullish));
    }

    #[test]
    fn template_parts() {
        assert_eq!(
            tokens("`SELECT ${ {a: 1}.a } FROM ${repo}`"),
            vec![
                Token::Template(vec![
                    TemplatePart::Text("SELECT ".to_owned()),
                    TemplatePart::Expr {
                        source: " {a: 1}.a ".to_owned(),
                        pos: 10,
                    },
                    TemplatePart::Text(" FROM ".to_owned()),
                    TemplatePart::Expr {
                        source: "repo".to_owned(),
                        pos: 29,
                    },
                ]),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn errors_carry_positions() {
        assert_eq!(
            tokenize("let a = 'open", 0),
            Err(ScriptError::Syntax {
                message: "unterminated string".to_owned(),
                pos: 13,
            })
        );
        assert!(matches!(
            tokenize("a # b", 0),
            Err(ScriptError::Syntax { pos: 2, .. })
        ));
    }
}
