//! 交互式命令的语法分析器
//!
//! ## 解析流程图
//!
//! ```text
//! parse()
//!   ├─ 空输入 → None
//!   ├─ 命令关键字 (Word)
//!   │   ├─ add    → parse_text() ×1, parse_operator(), parse_text()
//!   │   ├─ group  → parse_logic() [not]
//!   │   ├─ enter / rm → parse_node_id()
//!   │   ├─ logic / inner → parse_node_id(), parse_logic()
//!   │   ├─ combine → parse_logic()
//!   │   ├─ save / export → parse_text() (文件), parse_text() (名称)
//!   │   ├─ load / import / values → parse_text()
//!   │   └─ 无参数命令 (show, flat, ops, preview, sql, fields, clear, help, quit)
//!   └─ expect_end() 确认没有多余的 token
//! ```
//!
//! ## 参数
//!
//! - **文本**: 单词或 `"双引号字符串"`；关键字 `and`/`or`/`not` 在文本位置按原文处理
//! - **运算符**: `equals`, `contains`, `not_equals`, `not_contains`，以及 `=`, `~`, `!=`, `!~`
//! - **逻辑**: `and`, `or`（不区分大小写）
//!
//! ## 示例
//!
//! ```text
//! add role equals router
//! add name contains "core rtr"
//! group or not
//! logic group-6f1c... and
//! save routers.json "DC1 routers"
//! ```

use crate::ast::Command;
use crate::lexer::Lexer;
use crate::token::{Span, Token, TokenKind};
use crate::tree::{Logic, NodeId, Operator};
use std::path::PathBuf;
use thiserror::Error;

pub struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token<'a>],
    position: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Option<Span>,
}

impl ParseError {
    fn new(message: String, span: Option<Span>) -> Self {
        Self { message, span }
    }

    fn at_position(message: String, span: Span) -> Self {
        Self {
            message,
            span: Some(span),
        }
    }
}

/// 对一行输入做词法和语法分析；空行返回 `None`
pub fn parse_command(line: &str) -> Result<Option<Command>, ParseError> {
    let tokens: Vec<_> = Lexer::new(line).collect();
    Parser::new(line, &tokens).parse()
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, tokens: &'a [Token<'a>]) -> Self {
        Self {
            source,
            tokens,
            position: 0,
        }
    }

    /// 返回当前 token，不推进位置
    fn peek(&self) -> Option<&'a Token<'a>> {
        self.tokens.get(self.position)
    }

    /// 返回当前 token 并推进位置
    fn advance(&mut self) -> Option<&'a Token<'a>> {
        let token = self.tokens.get(self.position)?;
        self.position += 1;
        Some(token)
    }

    /// 期望一个参数 token 并推进，否则返回错误
    fn expect_argument(&mut self, what: &str) -> Result<&'a Token<'a>, ParseError> {
        self.advance().ok_or_else(|| {
            ParseError::new(format!("Expected {what}, but reached end of input"), None)
        })
    }

    /// 确认输入已经结束
    fn expect_end(&self) -> Result<(), ParseError> {
        match self.peek() {
            Some(token) => Err(ParseError::at_position(
                format!("Unexpected token: {}", token.kind.describe()),
                token.span,
            )),
            None => Ok(()),
        }
    }

    pub fn parse(&mut self) -> Result<Option<Command>, ParseError> {
        let Some(token) = self.advance() else {
            return Ok(None);
        };
        let TokenKind::Word(keyword) = token.kind else {
            return Err(ParseError::at_position(
                format!("Expected a command, found {}", token.kind.describe()),
                token.span,
            ));
        };

        let command = match keyword.to_ascii_lowercase().as_str() {
            "add" => {
                let field = self.parse_text("field name")?;
                let operator = self.parse_operator()?;
                let value = self.parse_text("value")?;
                Command::Add {
                    field,
                    operator,
                    value,
                }
            }
            "group" => self.parse_group()?,
            "enter" => Command::Enter(self.parse_node_id()?),
            "root" => Command::Root,
            "rm" | "remove" => Command::Remove(self.parse_node_id()?),
            "logic" => Command::Logic {
                group: self.parse_node_id()?,
                logic: self.parse_logic()?,
            },
            "inner" => Command::Inner {
                group: self.parse_node_id()?,
                logic: self.parse_logic()?,
            },
            "combine" => Command::Combine(self.parse_logic()?),
            "show" => Command::Show,
            "flat" => Command::Flat,
            "ops" => Command::Ops,
            "preview" => Command::Preview,
            "sql" => Command::Sql,
            "fields" => Command::Fields,
            "values" => Command::Values(self.parse_text("field name")?),
            "save" => Command::Save {
                path: self.parse_path()?,
                name: self.parse_text("inventory name")?,
            },
            "load" => Command::Load(self.parse_path()?),
            "export" => Command::Export {
                path: self.parse_path()?,
                name: self.parse_text("inventory name")?,
            },
            "import" => Command::Import(self.parse_path()?),
            "clear" => Command::Clear,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            _ => {
                return Err(ParseError::at_position(
                    format!("Unknown command '{keyword}', type 'help' for a list"),
                    token.span,
                ))
            }
        };

        self.expect_end()?;
        Ok(Some(command))
    }

    /// 解析文本参数：单词、字符串或按原文处理的关键字
    fn parse_text(&mut self, what: &str) -> Result<String, ParseError> {
        let token = self.expect_argument(what)?;
        match token.kind {
            TokenKind::Word(text) | TokenKind::String(text) => Ok(text.to_string()),
            TokenKind::And | TokenKind::Or | TokenKind::Not => {
                Ok(self.source[token.span.start..token.span.end].to_string())
            }
            TokenKind::Illegal => Err(ParseError::at_position(
                "Unterminated string".to_string(),
                token.span,
            )),
        }
    }

    fn parse_path(&mut self) -> Result<PathBuf, ParseError> {
        self.parse_text("file path").map(PathBuf::from)
    }

    fn parse_node_id(&mut self) -> Result<NodeId, ParseError> {
        self.parse_text("node id").map(NodeId)
    }

    fn parse_operator(&mut self) -> Result<Operator, ParseError> {
        let span = self.peek().map(|token| token.span);
        let text = self.parse_text("operator")?;
        text.parse().map_err(|_| {
            ParseError::new(
                format!(
                    "Unknown operator '{text}', expected one of equals, contains, not_equals, not_contains"
                ),
                span,
            )
        })
    }

    /// 解析逻辑关键字 `and` / `or`
    fn parse_logic(&mut self) -> Result<Logic, ParseError> {
        let token = self.expect_argument("'and' or 'or'")?;
        match token.kind {
            TokenKind::And => Ok(Logic::And),
            TokenKind::Or => Ok(Logic::Or),
            _ => Err(ParseError::at_position(
                format!("Expected 'and' or 'or', found {}", token.kind.describe()),
                token.span,
            )),
        }
    }

    /// 解析 `group` 的参数：`<and|or> [not]`，单独的 `not` 等价于 `and not`
    fn parse_group(&mut self) -> Result<Command, ParseError> {
        if let Some(Token {
            kind: TokenKind::Not,
            ..
        }) = self.peek()
        {
            self.advance(); // 消费 NOT
            return Ok(Command::Group {
                logic: Logic::And,
                negate: true,
            });
        }
        let logic = self.parse_logic()?;
        let negate = matches!(self.peek(), Some(token) if token.kind == TokenKind::Not);
        if negate {
            self.advance(); // 消费 NOT
        }
        Ok(Command::Group { logic, negate })
    }
}
