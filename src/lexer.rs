//! 命令行的词法分析器
//!
//! 单词以空白分隔；双引号包围的字符串可以包含空白，不支持转义。

use crate::token::{Span, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    /// 输入字符串中的当前位置（字节索引）
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, position: 0 }
    }

    /// 返回当前位置的字符，不推进位置
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// 推进位置一个字符并返回该字符
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    /// 跳过空白字符
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    /// 读取双引号包围的字符串字面量
    /// 注意：开始的引号已经被调用者消费
    fn read_string(&mut self, start: usize) -> Token<'a> {
        let content_start = self.position;
        while let Some(c) = self.peek() {
            if c == '"' {
                let content = &self.input[content_start..self.position];
                self.bump(); // 消费结束引号
                return Token {
                    kind: TokenKind::String(content),
                    span: Span::new(start, self.position),
                };
            }
            self.bump();
        }
        // 缺少结束引号
        Token {
            kind: TokenKind::Illegal,
            span: Span::new(start, self.position),
        }
    }

    /// 读取单词或关键字，直到空白或引号
    fn read_word(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == '"' {
                break;
            }
            self.bump();
        }
        let literal = &self.input[start..self.position];
        Token {
            kind: match_keyword(literal),
            span: Span::new(start, self.position),
        }
    }
}

fn match_keyword(s: &str) -> TokenKind<'_> {
    match s.to_ascii_lowercase().as_str() {
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        _ => TokenKind::Word(s),
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();
        let start = self.position;

        let c = self.bump()?; // 到达输入末尾

        let token = match c {
            '"' => self.read_string(start),
            _ => self.read_word(start),
        };
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_command() {
        let input = "add role equals router";
        let mut lexer = Lexer::new(input);

        assert_eq!(lexer.next().unwrap().kind, TokenKind::Word("add"));
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Word("role"));
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Word("equals"));
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Word("router"));
        assert_eq!(lexer.next(), None);
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let kinds: Vec<_> = Lexer::new("group OR Not and").map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Word("group"),
                TokenKind::Or,
                TokenKind::Not,
                TokenKind::And,
            ]
        );
    }

    #[test]
    fn test_quoted_strings_and_spans() {
        let input = r#"add name contains "core rtr" "#;
        let tokens: Vec<_> = Lexer::new(input).collect();
        assert_eq!(tokens[3].kind, TokenKind::String("core rtr"));
        assert_eq!(tokens[3].span, Span::new(18, 28));
        assert_eq!(tokens.len(), 4);
    }

    #[test]
    fn test_quote_ends_word() {
        let kinds: Vec<_> = Lexer::new(r#"cf_net"lab""#).map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TokenKind::Word("cf_net"), TokenKind::String("lab")]);
    }

    #[test]
    fn test_symbols_and_unicode() {
        let kinds: Vec<_> = Lexer::new("!= ~ 机房-1").map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![TokenKind::Word("!="), TokenKind::Word("~"), TokenKind::Word("机房-1")]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let tokens: Vec<_> = Lexer::new(r#"values "DC1"#).collect();
        assert_eq!(tokens[1].kind, TokenKind::Illegal);
        assert_eq!(tokens[1].span, Span::new(7, 11));
    }
}
