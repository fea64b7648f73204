use std::cell::RefCell;

use crate::{error::PdfResult, stream::Stream};

pub use self::error::PostScriptError;

use self::{
    error::PostScriptResult,
    lexer::{CalculatorLexer, CalculatorOperator, CalculatorToken},
    object::{CalculatorStack, CalculatorValue},
};

mod error;
mod lexer;
mod object;

/// Capacity of the calculator operand stack, comfortably above the largest
/// input and output tuples a function may declare
pub const PS_STACK_SIZE: usize = 100;

/// A type 4 function (PDF 1.3), also called a PostScript calculator function, shall be
/// represented as a stream containing code written in a small subset of the PostScript language.
///
/// The program is tokenized and flattened into a linear code array with
/// resolved branch targets once, at construction; evaluation replays the
/// array against a bounded operand stack
#[derive(Debug, Clone)]
pub struct PostScriptCalculatorFunction {
    /// The program source as it appeared in the stream, retained for
    /// diagnostics
    code_string: String,

    code: Vec<CodeOp>,

    n_outputs: usize,

    cache: RefCell<Option<(Vec<f32>, Vec<f32>)>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CodeOp {
    Push(CalculatorValue),
    Operator(CalculatorOperator),
    Jump(usize),

    /// Pops a boolean; jumps only when it is false
    JumpIfFalse(usize),
}

impl PostScriptCalculatorFunction {
    pub(crate) fn from_stream(stream: Stream, n_outputs: usize) -> PdfResult<Self> {
        let code_string = String::from_utf8_lossy(&stream.data).into_owned();

        let mut lexer = CalculatorLexer::new(&stream.data);

        match lexer.next().transpose()? {
            Some(CalculatorToken::ProcedureStart) => {}
            _ => anyhow::bail!("calculator program must begin with a procedure block"),
        }

        let mut code = Vec::new();
        Self::parse_block(&mut lexer, &mut code)?;

        if let Some(token) = lexer.next().transpose()? {
            anyhow::bail!("unexpected {:?} after the calculator program body", token);
        }

        Ok(Self {
            code_string,
            code,
            n_outputs,
            cache: RefCell::new(None),
        })
    }

    /// Compiles the body of one `{ ... }` onto the end of `code`.
    ///
    /// A nested `{` emits a placeholder jump and compiles the block inline;
    /// the `if`/`ifelse` that follows patches the placeholder(s) into
    /// resolved branches. An `if` body therefore executes by falling through
    /// its (false-taken) conditional jump, and an `ifelse` true-branch ends
    /// at the unconditional jump sitting where the else-branch begins
    fn parse_block(lexer: &mut CalculatorLexer, code: &mut Vec<CodeOp>) -> PdfResult<()> {
        // procedure blocks compiled but not yet claimed by `if`/`ifelse`,
        // as (placeholder index, body end) pairs
        let mut blocks: Vec<(usize, usize)> = Vec::new();

        loop {
            let token = match lexer.next().transpose()? {
                Some(token) => token,
                None => anyhow::bail!("unterminated procedure block"),
            };

            match token {
                CalculatorToken::ProcedureStart => {
                    let placeholder = code.len();
                    code.push(CodeOp::Jump(0));

                    Self::parse_block(lexer, code)?;

                    blocks.push((placeholder, code.len()));

                    continue;
                }
                CalculatorToken::ProcedureEnd => {
                    if !blocks.is_empty() {
                        anyhow::bail!("procedure block not followed by `if` or `ifelse`");
                    }

                    return Ok(());
                }
                CalculatorToken::Operator(CalculatorOperator::If) => {
                    let (placeholder, end) = blocks.pop().ok_or_else(|| {
                        anyhow::anyhow!("`if` is not preceded by a procedure block")
                    })?;

                    code[placeholder] = CodeOp::JumpIfFalse(end);
                }
                CalculatorToken::Operator(CalculatorOperator::IfElse) => {
                    let (else_placeholder, end) = blocks.pop().ok_or_else(|| {
                        anyhow::anyhow!("`ifelse` is not preceded by two procedure blocks")
                    })?;
                    let (placeholder, _) = blocks.pop().ok_or_else(|| {
                        anyhow::anyhow!("`ifelse` is not preceded by two procedure blocks")
                    })?;

                    code[placeholder] = CodeOp::JumpIfFalse(else_placeholder + 1);
                    code[else_placeholder] = CodeOp::Jump(end);
                }
                token => {
                    if !blocks.is_empty() {
                        anyhow::bail!("procedure block not followed by `if` or `ifelse`");
                    }

                    code.push(match token {
                        CalculatorToken::Int(i) => CodeOp::Push(CalculatorValue::Int(i)),
                        CalculatorToken::Real(r) => CodeOp::Push(CalculatorValue::Real(r)),
                        CalculatorToken::Operator(op) => CodeOp::Operator(op),
                        CalculatorToken::ProcedureStart | CalculatorToken::ProcedureEnd => {
                            unreachable!()
                        }
                    });
                }
            }
        }
    }

    /// The inputs arrive already clipped to the domain
    pub(crate) fn transform(&self, input: &[f32]) -> PdfResult<Vec<f32>> {
        if let Some((cache_in, cache_out)) = &*self.cache.borrow() {
            if cache_in == input {
                return Ok(cache_out.clone());
            }
        }

        let mut stack = CalculatorStack::new();

        for &x in input {
            stack.push(CalculatorValue::Real(x))?;
        }

        self.exec(&mut stack)?;

        let mut out = vec![0.0; self.n_outputs];
        for j in (0..self.n_outputs).rev() {
            out[j] = stack.pop_number()?;
        }

        if stack.len() != 0 {
            log::warn!(
                "calculator program left {} extra values on the stack",
                stack.len()
            );
        }

        *self.cache.borrow_mut() = Some((input.to_vec(), out.clone()));

        Ok(out)
    }

    fn exec(&self, stack: &mut CalculatorStack) -> PostScriptResult<()> {
        let mut pc = 0;

        while let Some(op) = self.code.get(pc) {
            match *op {
                CodeOp::Push(value) => {
                    stack.push(value)?;
                }
                CodeOp::Operator(op) => {
                    execute_operator(op, stack)?;
                }
                CodeOp::Jump(target) => {
                    pc = target;
                    continue;
                }
                CodeOp::JumpIfFalse(target) => {
                    if !stack.pop_bool()? {
                        pc = target;
                        continue;
                    }
                }
            }

            pc += 1;
        }

        Ok(())
    }

    pub fn code_string(&self) -> &str {
        &self.code_string
    }
}

fn execute_operator(op: CalculatorOperator, stack: &mut CalculatorStack) -> PostScriptResult<()> {
    match op {
        CalculatorOperator::Abs => match stack.pop()? {
            CalculatorValue::Int(i) => stack.push(match i.checked_abs() {
                Some(i) => CalculatorValue::Int(i),
                None => CalculatorValue::Real(-(i as f32)),
            })?,
            CalculatorValue::Real(r) => stack.push(CalculatorValue::Real(r.abs()))?,
            CalculatorValue::Bool(..) => anyhow::bail!(PostScriptError::TypeCheck),
        },
        CalculatorOperator::Add => arithmetic(stack, i32::checked_add, |a, b| a + b)?,
        CalculatorOperator::Sub => arithmetic(stack, i32::checked_sub, |a, b| a - b)?,
        CalculatorOperator::Mul => arithmetic(stack, i32::checked_mul, |a, b| a * b)?,
        CalculatorOperator::Div => {
            let b = stack.pop_number()?;
            let a = stack.pop_number()?;

            if b == 0.0 {
                anyhow::bail!(PostScriptError::UndefinedResult);
            }

            stack.push(CalculatorValue::Real(a / b))?;
        }
        CalculatorOperator::Idiv => {
            let b = stack.pop_int()?;
            let a = stack.pop_int()?;

            let quotient = a
                .checked_div(b)
                .ok_or_else(|| anyhow::anyhow!(PostScriptError::UndefinedResult))?;

            stack.push(CalculatorValue::Int(quotient))?;
        }
        CalculatorOperator::Mod => {
            let b = stack.pop_int()?;
            let a = stack.pop_int()?;

            let remainder = a
                .checked_rem(b)
                .ok_or_else(|| anyhow::anyhow!(PostScriptError::UndefinedResult))?;

            stack.push(CalculatorValue::Int(remainder))?;
        }
        CalculatorOperator::Neg => match stack.pop()? {
            CalculatorValue::Int(i) => stack.push(match i.checked_neg() {
                Some(i) => CalculatorValue::Int(i),
                None => CalculatorValue::Real(-(i as f32)),
            })?,
            CalculatorValue::Real(r) => stack.push(CalculatorValue::Real(-r))?,
            CalculatorValue::Bool(..) => anyhow::bail!(PostScriptError::TypeCheck),
        },
        CalculatorOperator::Sqrt => {
            let x = stack.pop_number()?;

            if x < 0.0 {
                anyhow::bail!(PostScriptError::RangeCheck);
            }

            stack.push(CalculatorValue::Real(x.sqrt()))?;
        }
        CalculatorOperator::Sin => {
            let x = stack.pop_number()?;
            stack.push(CalculatorValue::Real(x.to_radians().sin()))?;
        }
        CalculatorOperator::Cos => {
            let x = stack.pop_number()?;
            stack.push(CalculatorValue::Real(x.to_radians().cos()))?;
        }
        CalculatorOperator::Atan => {
            // num den atan => angle in degrees, [0, 360)
            let den = stack.pop_number()?;
            let num = stack.pop_number()?;

            let mut angle = num.atan2(den).to_degrees();
            if angle < 0.0 {
                angle += 360.0;
            }

            stack.push(CalculatorValue::Real(angle))?;
        }
        CalculatorOperator::Exp => {
            let exponent = stack.pop_number()?;
            let base = stack.pop_number()?;

            stack.push(CalculatorValue::Real(base.powf(exponent)))?;
        }
        CalculatorOperator::Ln => {
            let x = stack.pop_number()?;

            if x <= 0.0 {
                anyhow::bail!(PostScriptError::RangeCheck);
            }

            stack.push(CalculatorValue::Real(x.ln()))?;
        }
        CalculatorOperator::Log => {
            let x = stack.pop_number()?;

            if x <= 0.0 {
                anyhow::bail!(PostScriptError::RangeCheck);
            }

            stack.push(CalculatorValue::Real(x.log10()))?;
        }
        CalculatorOperator::Cvi => match stack.pop()? {
            CalculatorValue::Int(i) => stack.push(CalculatorValue::Int(i))?,
            CalculatorValue::Real(r) => stack.push(CalculatorValue::Int(r as i32))?,
            CalculatorValue::Bool(..) => anyhow::bail!(PostScriptError::TypeCheck),
        },
        CalculatorOperator::Cvr => {
            let x = stack.pop_number()?;
            stack.push(CalculatorValue::Real(x))?;
        }
        CalculatorOperator::Ceiling => rounding(stack, f32::ceil)?,
        CalculatorOperator::Floor => rounding(stack, f32::floor)?,
        CalculatorOperator::Truncate => rounding(stack, f32::trunc)?,
        // half-way cases resolve to the greater integer
        CalculatorOperator::Round => rounding(stack, |r| (r + 0.5).floor())?,
        CalculatorOperator::And => logical(stack, |a, b| a & b, |a, b| a & b)?,
        CalculatorOperator::Or => logical(stack, |a, b| a | b, |a, b| a | b)?,
        CalculatorOperator::Xor => logical(stack, |a, b| a ^ b, |a, b| a ^ b)?,
        CalculatorOperator::Not => match stack.pop()? {
            CalculatorValue::Bool(b) => stack.push(CalculatorValue::Bool(!b))?,
            CalculatorValue::Int(i) => stack.push(CalculatorValue::Int(!i))?,
            CalculatorValue::Real(..) => anyhow::bail!(PostScriptError::TypeCheck),
        },
        CalculatorOperator::Bitshift => {
            let shift = stack.pop_int()?;
            let value = stack.pop_int()?;

            let shifted = match shift {
                0..=31 => value << shift,
                32.. => 0,
                -31..=-1 => value >> -shift,
                _ => value >> 31,
            };

            stack.push(CalculatorValue::Int(shifted))?;
        }
        CalculatorOperator::Eq => {
            let eq = popped_equal(stack)?;
            stack.push(CalculatorValue::Bool(eq))?;
        }
        CalculatorOperator::Ne => {
            let eq = popped_equal(stack)?;
            stack.push(CalculatorValue::Bool(!eq))?;
        }
        CalculatorOperator::Gt => comparison(stack, |a, b| a > b)?,
        CalculatorOperator::Ge => comparison(stack, |a, b| a >= b)?,
        CalculatorOperator::Lt => comparison(stack, |a, b| a < b)?,
        CalculatorOperator::Le => comparison(stack, |a, b| a <= b)?,
        CalculatorOperator::True => stack.push(CalculatorValue::Bool(true))?,
        CalculatorOperator::False => stack.push(CalculatorValue::Bool(false))?,
        CalculatorOperator::Dup => {
            let value = stack.pop()?;
            stack.push(value)?;
            stack.push(value)?;
        }
        CalculatorOperator::Pop => {
            stack.pop()?;
        }
        CalculatorOperator::Exch => {
            let b = stack.pop()?;
            let a = stack.pop()?;
            stack.push(b)?;
            stack.push(a)?;
        }
        CalculatorOperator::Copy => {
            let n = stack.pop_int()?;

            if n < 0 {
                anyhow::bail!(PostScriptError::RangeCheck);
            }

            stack.copy(n as usize)?;
        }
        CalculatorOperator::Index => {
            let n = stack.pop_int()?;

            if n < 0 {
                anyhow::bail!(PostScriptError::RangeCheck);
            }

            stack.index(n as usize)?;
        }
        CalculatorOperator::Roll => {
            let j = stack.pop_int()?;
            let n = stack.pop_int()?;

            if n < 0 {
                anyhow::bail!(PostScriptError::RangeCheck);
            }

            stack.roll(n as usize, j)?;
        }
        CalculatorOperator::If | CalculatorOperator::IfElse => {
            unreachable!("`if` and `ifelse` are compiled to jumps")
        }
    }

    Ok(())
}

/// Binary arithmetic with the integer-preserving promotion rule: two integer
/// operands produce an integer unless the result leaves integer range
fn arithmetic(
    stack: &mut CalculatorStack,
    int_op: fn(i32, i32) -> Option<i32>,
    real_op: fn(f32, f32) -> f32,
) -> PostScriptResult<()> {
    let b = stack.pop()?;
    let a = stack.pop()?;

    let value = match (a, b) {
        (CalculatorValue::Int(a), CalculatorValue::Int(b)) => match int_op(a, b) {
            Some(i) => CalculatorValue::Int(i),
            None => CalculatorValue::Real(real_op(a as f32, b as f32)),
        },
        (a, b) => CalculatorValue::Real(real_op(a.real()?, b.real()?)),
    };

    stack.push(value)
}

fn rounding(stack: &mut CalculatorStack, round: fn(f32) -> f32) -> PostScriptResult<()> {
    match stack.pop()? {
        CalculatorValue::Int(i) => stack.push(CalculatorValue::Int(i)),
        CalculatorValue::Real(r) => stack.push(CalculatorValue::Real(round(r))),
        CalculatorValue::Bool(..) => anyhow::bail!(PostScriptError::TypeCheck),
    }
}

/// Boolean operands combine logically, integer operands bitwise
fn logical(
    stack: &mut CalculatorStack,
    int_op: fn(i32, i32) -> i32,
    bool_op: fn(bool, bool) -> bool,
) -> PostScriptResult<()> {
    let b = stack.pop()?;
    let a = stack.pop()?;

    match (a, b) {
        (CalculatorValue::Bool(a), CalculatorValue::Bool(b)) => {
            stack.push(CalculatorValue::Bool(bool_op(a, b)))
        }
        (CalculatorValue::Int(a), CalculatorValue::Int(b)) => {
            stack.push(CalculatorValue::Int(int_op(a, b)))
        }
        _ => anyhow::bail!(PostScriptError::TypeCheck),
    }
}

fn comparison(stack: &mut CalculatorStack, cmp: fn(f32, f32) -> bool) -> PostScriptResult<()> {
    let b = stack.pop_number()?;
    let a = stack.pop_number()?;

    stack.push(CalculatorValue::Bool(cmp(a, b)))
}

fn popped_equal(stack: &mut CalculatorStack) -> PostScriptResult<bool> {
    let b = stack.pop()?;
    let a = stack.pop()?;

    Ok(match (a, b) {
        (CalculatorValue::Bool(a), CalculatorValue::Bool(b)) => a == b,
        (a, b) => a.real()? == b.real()?,
    })
}

#[cfg(test)]
mod test {
    use super::super::{test::*, Function};
    use crate::{objects::Object, resolve::NoResolve, stream::Stream};

    fn calculator(domain: &[f32], range: &[f32], program: &str) -> Function {
        let obj = Object::Stream(Stream {
            dict: dict(vec![
                ("FunctionType", Object::Integer(4)),
                ("Domain", real_arr(domain)),
                ("Range", real_arr(range)),
            ]),
            data: program.as_bytes().to_vec(),
        });

        Function::from_obj(obj, &mut NoResolve).unwrap()
    }

    fn malformed(program: &str) -> bool {
        let obj = Object::Stream(Stream {
            dict: dict(vec![
                ("FunctionType", Object::Integer(4)),
                ("Domain", real_arr(&[0.0, 1.0])),
                ("Range", real_arr(&[0.0, 1.0])),
            ]),
            data: program.as_bytes().to_vec(),
        });

        Function::from_obj(obj, &mut NoResolve).is_err()
    }

    #[test]
    fn square_program() {
        let func = calculator(&[-10.0, 10.0], &[-100.0, 100.0], "{ dup mul }");

        assert_eq!(func.transform(&[2.0]).unwrap(), vec![4.0]);
        assert_eq!(func.transform(&[-3.0]).unwrap(), vec![9.0]);
    }

    #[test]
    fn if_runs_its_block_only_on_true() {
        let func = calculator(&[-5.0, 5.0], &[-5.0, 5.0], "{ dup 0 lt { neg } if }");

        assert_eq!(func.transform(&[-3.0]).unwrap(), vec![3.0]);
        assert_eq!(func.transform(&[2.0]).unwrap(), vec![2.0]);
    }

    #[test]
    fn ifelse_chooses_between_blocks() {
        let func = calculator(&[0.0, 1.0], &[0.0, 1.0], "{ 0.5 le { 0 } { 1 } ifelse }");

        assert_eq!(func.transform(&[0.3]).unwrap(), vec![0.0]);
        assert_eq!(func.transform(&[0.7]).unwrap(), vec![1.0]);
    }

    #[test]
    fn nested_conditionals() {
        let func = calculator(
            &[-5.0, 5.0],
            &[0.0, 1.0],
            "{ dup 0 lt { pop 0 } { dup 1 gt { pop 1 } if } ifelse }",
        );

        assert_eq!(func.transform(&[-2.0]).unwrap(), vec![0.0]);
        assert_eq!(func.transform(&[0.25]).unwrap(), vec![0.25]);
        assert_eq!(func.transform(&[3.0]).unwrap(), vec![1.0]);
    }

    #[test]
    fn division_always_yields_a_real() {
        let func = calculator(&[0.0, 10.0, 0.0, 10.0], &[0.0, 10.0], "{ div }");

        assert_eq!(func.transform(&[1.0, 2.0]).unwrap(), vec![0.5]);
    }

    #[test]
    fn division_by_zero_faults_the_call_only() {
        let func = calculator(&[0.0, 10.0, 0.0, 10.0], &[0.0, 10.0], "{ div }");

        assert!(func.transform(&[1.0, 0.0]).is_err());
        assert_eq!(func.transform(&[1.0, 2.0]).unwrap(), vec![0.5]);
    }

    #[test]
    fn square_root_of_negative_faults() {
        let func = calculator(&[-10.0, 10.0], &[0.0, 10.0], "{ sqrt }");

        assert_eq!(func.transform(&[4.0]).unwrap(), vec![2.0]);
        assert!(func.transform(&[-4.0]).is_err());
    }

    #[test]
    fn stack_underflow_faults() {
        let func = calculator(&[0.0, 1.0], &[0.0, 1.0], "{ pop pop }");

        assert!(func.transform(&[0.5]).is_err());
    }

    #[test]
    fn type_mismatch_faults() {
        let func = calculator(&[0.0, 1.0], &[0.0, 10.0], "{ pop true 1 add }");

        assert!(func.transform(&[0.5]).is_err());
    }

    #[test]
    fn integer_arithmetic_promotes_on_overflow() {
        let func = calculator(
            &[0.0, 1.0],
            &[0.0, 3000000000.0],
            "{ pop 2147483647 1 add }",
        );

        assert_eq!(func.transform(&[0.0]).unwrap(), vec![2147483648.0]);
    }

    #[test]
    fn stack_manipulation_operators() {
        let roll = calculator(
            &[0.0, 10.0, 0.0, 10.0, 0.0, 10.0],
            &[0.0, 10.0, 0.0, 10.0, 0.0, 10.0],
            "{ 3 1 roll }",
        );

        assert_eq!(
            roll.transform(&[1.0, 2.0, 3.0]).unwrap(),
            vec![3.0, 1.0, 2.0]
        );

        let index = calculator(
            &[0.0, 10.0, 0.0, 10.0],
            &[0.0, 10.0, 0.0, 10.0, 0.0, 10.0],
            "{ 1 index }",
        );

        assert_eq!(
            index.transform(&[5.0, 7.0]).unwrap(),
            vec![5.0, 7.0, 5.0]
        );

        let copy = calculator(
            &[0.0, 10.0, 0.0, 10.0],
            &[0.0, 10.0, 0.0, 10.0, 0.0, 10.0, 0.0, 10.0],
            "{ 2 copy }",
        );

        assert_eq!(
            copy.transform(&[1.0, 2.0]).unwrap(),
            vec![1.0, 2.0, 1.0, 2.0]
        );
    }

    #[test]
    fn comparison_feeds_conditional() {
        let func = calculator(
            &[0.0, 10.0, 0.0, 10.0],
            &[0.0, 1.0],
            "{ eq { 1 } { 0 } ifelse }",
        );

        assert_eq!(func.transform(&[3.0, 3.0]).unwrap(), vec![1.0]);
        assert_eq!(func.transform(&[3.0, 4.0]).unwrap(), vec![0.0]);
    }

    #[test]
    fn bitshift_shifts_both_directions() {
        let func = calculator(&[0.0, 1.0], &[0.0, 100.0], "{ pop 1 3 bitshift }");

        assert_eq!(func.transform(&[0.0]).unwrap(), vec![8.0]);

        let func = calculator(&[0.0, 1.0], &[0.0, 100.0], "{ pop 8 -2 bitshift }");

        assert_eq!(func.transform(&[0.0]).unwrap(), vec![2.0]);
    }

    #[test]
    fn trigonometry_works_in_degrees() {
        let func = calculator(&[0.0, 360.0], &[-1.0, 1.0], "{ sin }");

        assert!((func.transform(&[90.0]).unwrap()[0] - 1.0).abs() < 1e-6);

        let func = calculator(&[0.0, 1.0], &[0.0, 360.0], "{ pop 0 1 sub 1 atan }");

        assert!((func.transform(&[0.0]).unwrap()[0] - 315.0).abs() < 1e-3);
    }

    #[test]
    fn extra_values_on_the_stack_are_tolerated() {
        let func = calculator(&[0.0, 1.0], &[0.0, 1.0], "{ dup dup }");

        assert_eq!(func.transform(&[0.5]).unwrap(), vec![0.5]);
    }

    #[test]
    fn repeated_input_hits_the_memo() {
        let func = calculator(&[-10.0, 10.0], &[-100.0, 100.0], "{ dup mul }");

        assert_eq!(func.transform(&[7.0]).unwrap(), vec![49.0]);
        assert_eq!(func.transform(&[7.0]).unwrap(), vec![49.0]);
    }

    #[test]
    fn malformed_programs_are_rejected_at_construction() {
        assert!(malformed("{ frobnicate }"));
        assert!(malformed("{ dup mul"));
        assert!(malformed("dup mul }"));
        assert!(malformed("{ { dup } }"));
        assert!(malformed("{ if }"));
        assert!(malformed("{ { 1 } ifelse }"));
        assert!(malformed("{ dup } 5"));
        assert!(malformed(""));
    }
}
