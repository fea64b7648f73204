use crate::{
    error::{ParseError, PdfResult},
    lex::LexBase,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum CalculatorToken {
    Int(i32),
    Real(f32),
    Operator(CalculatorOperator),
    ProcedureStart,
    ProcedureEnd,
}

/// The calculator-function operator vocabulary. `if` and `ifelse` never
/// reach the executor; they are resolved into jumps when the code array is
/// built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum CalculatorOperator {
    Abs,
    Add,
    And,
    Atan,
    Bitshift,
    Ceiling,
    Copy,
    Cos,
    Cvi,
    Cvr,
    Div,
    Dup,
    Eq,
    Exch,
    Exp,
    False,
    Floor,
    Ge,
    Gt,
    Idiv,
    If,
    IfElse,
    Index,
    Le,
    Ln,
    Log,
    Lt,
    Mod,
    Mul,
    Ne,
    Neg,
    Not,
    Or,
    Pop,
    Roll,
    Round,
    Sin,
    Sqrt,
    Sub,
    True,
    Truncate,
    Xor,
}

fn operator_from_bytes(bytes: &[u8]) -> PdfResult<CalculatorOperator> {
    Ok(match bytes {
        b"abs" => CalculatorOperator::Abs,
        b"add" => CalculatorOperator::Add,
        b"and" => CalculatorOperator::And,
        b"atan" => CalculatorOperator::Atan,
        b"bitshift" => CalculatorOperator::Bitshift,
        b"ceiling" => CalculatorOperator::Ceiling,
        b"copy" => CalculatorOperator::Copy,
        b"cos" => CalculatorOperator::Cos,
        b"cvi" => CalculatorOperator::Cvi,
        b"cvr" => CalculatorOperator::Cvr,
        b"div" => CalculatorOperator::Div,
        b"dup" => CalculatorOperator::Dup,
        b"eq" => CalculatorOperator::Eq,
        b"exch" => CalculatorOperator::Exch,
        b"exp" => CalculatorOperator::Exp,
        b"false" => CalculatorOperator::False,
        b"floor" => CalculatorOperator::Floor,
        b"ge" => CalculatorOperator::Ge,
        b"gt" => CalculatorOperator::Gt,
        b"idiv" => CalculatorOperator::Idiv,
        b"if" => CalculatorOperator::If,
        b"ifelse" => CalculatorOperator::IfElse,
        b"index" => CalculatorOperator::Index,
        b"le" => CalculatorOperator::Le,
        b"ln" => CalculatorOperator::Ln,
        b"log" => CalculatorOperator::Log,
        b"lt" => CalculatorOperator::Lt,
        b"mod" => CalculatorOperator::Mod,
        b"mul" => CalculatorOperator::Mul,
        b"ne" => CalculatorOperator::Ne,
        b"neg" => CalculatorOperator::Neg,
        b"not" => CalculatorOperator::Not,
        b"or" => CalculatorOperator::Or,
        b"pop" => CalculatorOperator::Pop,
        b"roll" => CalculatorOperator::Roll,
        b"round" => CalculatorOperator::Round,
        b"sin" => CalculatorOperator::Sin,
        b"sqrt" => CalculatorOperator::Sqrt,
        b"sub" => CalculatorOperator::Sub,
        b"true" => CalculatorOperator::True,
        b"truncate" => CalculatorOperator::Truncate,
        b"xor" => CalculatorOperator::Xor,
        found => anyhow::bail!(ParseError::UnrecognizedVariant {
            found: String::from_utf8_lossy(found).into_owned(),
            ty: "CalculatorOperator",
        }),
    })
}

#[derive(Debug)]
pub(super) struct CalculatorLexer<'a> {
    cursor: usize,
    buffer: &'a [u8],
}

impl LexBase for CalculatorLexer<'_> {
    fn buffer(&self) -> &[u8] {
        self.buffer
    }

    fn cursor(&self) -> usize {
        self.cursor
    }

    fn cursor_mut(&mut self) -> &mut usize {
        &mut self.cursor
    }
}

impl<'a> CalculatorLexer<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, cursor: 0 }
    }

    fn lex_token(&mut self) -> PdfResult<Option<CalculatorToken>> {
        self.skip_whitespace();

        Ok(Some(match self.peek_byte() {
            Some(b'{') => {
                self.next_byte();
                CalculatorToken::ProcedureStart
            }
            Some(b'}') => {
                self.next_byte();
                CalculatorToken::ProcedureEnd
            }
            Some(b'0'..=b'9' | b'.' | b'+' | b'-') => self.lex_number()?,
            Some(..) => self.lex_operator()?,
            None => return Ok(None),
        }))
    }

    /// Collects one run of regular characters
    fn lex_word(&mut self) -> &'a [u8] {
        let start = self.cursor;

        while let Some(b) = self.peek_byte() {
            if !Self::is_regular(b) {
                break;
            }

            self.next_byte();
        }

        &self.buffer[start..self.cursor]
    }

    fn lex_number(&mut self) -> PdfResult<CalculatorToken> {
        let word = self.lex_word();
        let text = std::str::from_utf8(word)?;

        if let Ok(i) = text.parse::<i32>() {
            return Ok(CalculatorToken::Int(i));
        }

        match text.parse::<f32>() {
            Ok(r) => Ok(CalculatorToken::Real(r)),
            Err(..) => anyhow::bail!("malformed number {:?} in calculator program", text),
        }
    }

    fn lex_operator(&mut self) -> PdfResult<CalculatorToken> {
        let word = self.lex_word();

        if word.is_empty() {
            anyhow::bail!(
                "unexpected delimiter {:?} in calculator program",
                self.peek_byte().map(char::from)
            );
        }

        operator_from_bytes(word).map(CalculatorToken::Operator)
    }
}

impl Iterator for CalculatorLexer<'_> {
    type Item = PdfResult<CalculatorToken>;

    fn next(&mut self) -> Option<Self::Item> {
        self.lex_token().transpose()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn tokens(source: &str) -> Vec<CalculatorToken> {
        CalculatorLexer::new(source.as_bytes())
            .collect::<PdfResult<Vec<CalculatorToken>>>()
            .unwrap()
    }

    #[test]
    fn numbers_operators_and_braces() {
        assert_eq!(
            tokens("{ 2.5 .5 -3 +4 dup }"),
            vec![
                CalculatorToken::ProcedureStart,
                CalculatorToken::Real(2.5),
                CalculatorToken::Real(0.5),
                CalculatorToken::Int(-3),
                CalculatorToken::Int(4),
                CalculatorToken::Operator(CalculatorOperator::Dup),
                CalculatorToken::ProcedureEnd,
            ]
        );
    }

    #[test]
    fn braces_need_no_surrounding_whitespace() {
        assert_eq!(
            tokens("{dup}"),
            vec![
                CalculatorToken::ProcedureStart,
                CalculatorToken::Operator(CalculatorOperator::Dup),
                CalculatorToken::ProcedureEnd,
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            tokens("% squares the input\n{ dup mul % multiply\n}"),
            vec![
                CalculatorToken::ProcedureStart,
                CalculatorToken::Operator(CalculatorOperator::Dup),
                CalculatorToken::Operator(CalculatorOperator::Mul),
                CalculatorToken::ProcedureEnd,
            ]
        );
    }

    #[test]
    fn unknown_word_is_rejected() {
        let mut lexer = CalculatorLexer::new(b"frobnicate");

        assert!(lexer.next().unwrap().is_err());
    }

    #[test]
    fn bare_sign_is_rejected() {
        let mut lexer = CalculatorLexer::new(b"-");

        assert!(lexer.next().unwrap().is_err());
    }
}
