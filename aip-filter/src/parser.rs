use crate::ast::{Constant, Expr};
use crate::error::FilterError;
use crate::token::{lex, Token};

/// Parse a filter string into the untyped expression tree.
///
/// Precedence, lowest to highest: OR, AND, NOT/`-`, comparison/has,
/// primary. Comparisons do not chain.
pub fn parse(input: &str) -> Result<Expr, FilterError> {
    let tokens = lex(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if let Some((token, at)) = parser.peek_with_pos() {
        if *token == Token::RParen {
            return Err(FilterError::UnbalancedParen { pos: at });
        }
        return Err(FilterError::TrailingInput {
            pos: at,
            found: token.describe(),
        });
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_with_pos(&self) -> Option<(&Token, usize)> {
        self.tokens.get(self.pos).map(|(t, p)| (t, *p))
    }

    fn next(&mut self) -> Option<(Token, usize)> {
        let item = self.tokens.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> Result<usize, FilterError> {
        match self.next() {
            Some((found, at)) if found == token => Ok(at),
            Some((found, at)) => Err(FilterError::UnexpectedToken {
                pos: at,
                found: found.describe(),
            }),
            None => Err(FilterError::UnexpectedEnd { expected }),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, FilterError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            lhs = Expr::call("||", vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, FilterError> {
        let mut lhs = self.parse_not()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_not()?;
            lhs = Expr::call("&&", vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, FilterError> {
        if self.eat(&Token::Not) || self.eat(&Token::Minus) {
            let inner = self.parse_not()?;
            return Ok(Expr::call("!", vec![inner]));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, FilterError> {
        let lhs = self.parse_primary()?;
        let op = match self.peek() {
            Some(Token::Eq) => "=",
            Some(Token::Ne) => "!=",
            Some(Token::Lt) => "<",
            Some(Token::Le) => "<=",
            Some(Token::Gt) => ">",
            Some(Token::Ge) => ">=",
            Some(Token::Colon) => {
                self.pos += 1;
                let rhs = self.parse_has_rhs()?;
                return Ok(Expr::call(":", vec![lhs, rhs]));
            }
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.parse_primary()?;
        Ok(Expr::call(op, vec![lhs, rhs]))
    }

    /// Right-hand side of `:`, a literal or the `*` marker.
    fn parse_has_rhs(&mut self) -> Result<Expr, FilterError> {
        match self.next() {
            Some((Token::Star, _)) => Ok(Expr::Star),
            Some((Token::Str(value), _)) => Ok(Expr::Constant(Constant::Str(value))),
            Some((Token::Int(value), _)) => Ok(Expr::Constant(Constant::Int(value))),
            Some((Token::Float(value), _)) => Ok(Expr::Constant(Constant::Float(value))),
            Some((Token::Bool(value), _)) => Ok(Expr::Constant(Constant::Bool(value))),
            Some((found, at)) => Err(FilterError::UnexpectedToken {
                pos: at,
                found: found.describe(),
            }),
            None => Err(FilterError::UnexpectedEnd {
                expected: "a literal or *",
            }),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, FilterError> {
        match self.next() {
            Some((Token::Str(value), _)) => Ok(Expr::Constant(Constant::Str(value))),
            Some((Token::Int(value), _)) => Ok(Expr::Constant(Constant::Int(value))),
            Some((Token::Float(value), _)) => Ok(Expr::Constant(Constant::Float(value))),
            Some((Token::Bool(value), _)) => Ok(Expr::Constant(Constant::Bool(value))),
            Some((Token::LParen, open_at)) => {
                let inner = self.parse_or()?;
                if self.eat(&Token::RParen) {
                    Ok(inner)
                } else {
                    Err(FilterError::UnbalancedParen { pos: open_at })
                }
            }
            Some((Token::Ident(name), _)) => self.parse_path_or_call(name),
            Some((found, at)) => Err(FilterError::UnexpectedToken {
                pos: at,
                found: found.describe(),
            }),
            None => Err(FilterError::UnexpectedEnd {
                expected: "an expression",
            }),
        }
    }

    /// An identifier, continued into a call (`name(args)`) and/or a
    /// dotted selection chain (`name.a.b`, `JSONB(x).key`).
    fn parse_path_or_call(&mut self, name: String) -> Result<Expr, FilterError> {
        let mut expr = if self.eat(&Token::LParen) {
            let mut args = Vec::new();
            if !self.eat(&Token::RParen) {
                loop {
                    args.push(self.parse_or()?);
                    if self.eat(&Token::Comma) {
                        continue;
                    }
                    self.expect(Token::RParen, ")")?;
                    break;
                }
            }
            Expr::Call { func: name, args }
        } else {
            Expr::Ident(name)
        };
        while self.eat(&Token::Dot) {
            match self.next() {
                Some((Token::Ident(field), _)) => {
                    expr = Expr::Select {
                        base: Box::new(expr),
                        field,
                    };
                }
                Some((found, at)) => {
                    return Err(FilterError::UnexpectedToken {
                        pos: at,
                        found: found.describe(),
                    })
                }
                None => {
                    return Err(FilterError::UnexpectedEnd {
                        expected: "a field name after '.'",
                    })
                }
            }
        }
        Ok(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_chain_left_associative() {
        let expr = parse("a = \"x\" AND b > 2 AND NOT c").unwrap();
        // ((a = x) AND (b > 2)) AND (NOT c)
        let Expr::Call { func, args } = expr else { panic!() };
        assert_eq!(func, "&&");
        let Expr::Call { func: inner, .. } = &args[0] else { panic!() };
        assert_eq!(inner, "&&");
        let Expr::Call { func: not, .. } = &args[1] else { panic!() };
        assert_eq!(not, "!");
    }

    #[test]
    fn or_binds_looser_than_and() {
        let expr = parse("a OR b AND c").unwrap();
        let Expr::Call { func, args } = expr else { panic!() };
        assert_eq!(func, "||");
        assert_eq!(args[0], Expr::Ident("a".into()));
    }

    #[test]
    fn parses_dotted_paths() {
        let expr = parse("nested.field2 > 3").unwrap();
        let Expr::Call { args, .. } = expr else { panic!() };
        assert_eq!(args[0].as_path().as_deref(), Some("nested.field2"));
    }

    #[test]
    fn parses_call_with_selection() {
        let expr = parse("JSONB(nested@labels).env = \"prod\"").unwrap();
        let Expr::Call { func, args } = expr else { panic!() };
        assert_eq!(func, "=");
        let Expr::Select { base, field } = &args[0] else { panic!() };
        assert_eq!(field, "env");
        assert!(matches!(**base, Expr::Call { .. }));
    }

    #[test]
    fn parses_timestamp_call() {
        let expr = parse("ts >= timestamp(\"2021-01-01T00:00:00Z\")").unwrap();
        let Expr::Call { func, args } = expr else { panic!() };
        assert_eq!(func, ">=");
        let Expr::Call { func: inner, args: inner_args } = &args[1] else { panic!() };
        assert_eq!(inner, "timestamp");
        assert_eq!(inner_args.len(), 1);
    }

    #[test]
    fn parses_has_star() {
        let expr = parse("tags:*").unwrap();
        let Expr::Call { func, args } = expr else { panic!() };
        assert_eq!(func, ":");
        assert_eq!(args[1], Expr::Star);
    }

    #[test]
    fn minus_is_not() {
        let expr = parse("-deleted").unwrap();
        let Expr::Call { func, .. } = expr else { panic!() };
        assert_eq!(func, "!");
    }

    #[test]
    fn unbalanced_open_paren() {
        assert!(matches!(
            parse("(a = \"x\"").unwrap_err(),
            FilterError::UnbalancedParen { .. }
        ));
    }

    #[test]
    fn stray_close_paren() {
        assert!(matches!(
            parse("a = \"x\")").unwrap_err(),
            FilterError::UnbalancedParen { .. }
        ));
    }

    #[test]
    fn trailing_operator() {
        assert!(matches!(
            parse("a = \"x\" AND").unwrap_err(),
            FilterError::UnexpectedEnd { .. }
        ));
    }

    #[test]
    fn trailing_garbage() {
        assert!(matches!(
            parse("a = \"x\" b").unwrap_err(),
            FilterError::TrailingInput { .. }
        ));
    }
}
