use super::{
    error::{PostScriptError, PostScriptResult},
    PS_STACK_SIZE,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum CalculatorValue {
    Bool(bool),
    Int(i32),
    Real(f32),
}

impl CalculatorValue {
    pub fn real(self) -> PostScriptResult<f32> {
        match self {
            Self::Int(i) => Ok(i as f32),
            Self::Real(r) => Ok(r),
            Self::Bool(..) => anyhow::bail!(PostScriptError::TypeCheck),
        }
    }

    pub fn int(self) -> PostScriptResult<i32> {
        match self {
            Self::Int(i) => Ok(i),
            _ => anyhow::bail!(PostScriptError::TypeCheck),
        }
    }

    pub fn bool(self) -> PostScriptResult<bool> {
        match self {
            Self::Bool(b) => Ok(b),
            _ => anyhow::bail!(PostScriptError::TypeCheck),
        }
    }
}

/// The calculator operand stack, capped at [`PS_STACK_SIZE`] entries so a
/// misbehaving program overflows into a reported fault instead of unbounded
/// growth
#[derive(Debug, Clone)]
pub(super) struct CalculatorStack {
    values: Vec<CalculatorValue>,
}

impl CalculatorStack {
    pub fn new() -> Self {
        Self {
            values: Vec::with_capacity(PS_STACK_SIZE),
        }
    }

    pub fn push(&mut self, value: CalculatorValue) -> PostScriptResult<()> {
        if self.values.len() == PS_STACK_SIZE {
            anyhow::bail!(PostScriptError::StackOverflow);
        }

        self.values.push(value);

        Ok(())
    }

    pub fn pop(&mut self) -> PostScriptResult<CalculatorValue> {
        self.values
            .pop()
            .ok_or_else(|| anyhow::anyhow!(PostScriptError::StackUnderflow))
    }

    pub fn pop_number(&mut self) -> PostScriptResult<f32> {
        self.pop()?.real()
    }

    pub fn pop_int(&mut self) -> PostScriptResult<i32> {
        self.pop()?.int()
    }

    pub fn pop_bool(&mut self) -> PostScriptResult<bool> {
        self.pop()?.bool()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `any1 ... anyn n copy`: duplicate the top n entries in order
    pub fn copy(&mut self, n: usize) -> PostScriptResult<()> {
        if n > self.values.len() {
            anyhow::bail!(PostScriptError::StackUnderflow);
        }

        if self.values.len() + n > PS_STACK_SIZE {
            anyhow::bail!(PostScriptError::StackOverflow);
        }

        let start = self.values.len() - n;
        for i in start..start + n {
            let value = self.values[i];
            self.values.push(value);
        }

        Ok(())
    }

    /// `n index`: push a copy of the entry n positions below the top
    pub fn index(&mut self, n: usize) -> PostScriptResult<()> {
        if n >= self.values.len() {
            anyhow::bail!(PostScriptError::StackUnderflow);
        }

        let value = self.values[self.values.len() - 1 - n];

        self.push(value)
    }

    /// `n j roll`: circularly shift the top n entries by j positions, upward
    /// for positive j
    pub fn roll(&mut self, n: usize, j: i32) -> PostScriptResult<()> {
        if n > self.values.len() {
            anyhow::bail!(PostScriptError::StackUnderflow);
        }

        if n == 0 {
            return Ok(());
        }

        let start = self.values.len() - n;
        let j = j.rem_euclid(n as i32) as usize;
        self.values[start..].rotate_right(j);

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn push_beyond_capacity_overflows() {
        let mut stack = CalculatorStack::new();

        for i in 0..PS_STACK_SIZE {
            stack.push(CalculatorValue::Int(i as i32)).unwrap();
        }

        assert!(stack.push(CalculatorValue::Int(-1)).is_err());
    }

    #[test]
    fn pop_of_empty_stack_underflows() {
        let mut stack = CalculatorStack::new();

        assert!(stack.pop().is_err());
    }

    #[test]
    fn roll_rotates_in_both_directions() {
        let mut stack = CalculatorStack::new();

        for i in [1, 2, 3] {
            stack.push(CalculatorValue::Int(i)).unwrap();
        }

        stack.roll(3, 1).unwrap();

        // 1 2 3 -> 3 1 2
        assert_eq!(stack.pop_int().unwrap(), 2);
        assert_eq!(stack.pop_int().unwrap(), 1);
        assert_eq!(stack.pop_int().unwrap(), 3);

        for i in [1, 2, 3] {
            stack.push(CalculatorValue::Int(i)).unwrap();
        }

        stack.roll(3, -1).unwrap();

        // 1 2 3 -> 2 3 1
        assert_eq!(stack.pop_int().unwrap(), 1);
        assert_eq!(stack.pop_int().unwrap(), 3);
        assert_eq!(stack.pop_int().unwrap(), 2);
    }

    #[test]
    fn index_counts_down_from_the_top() {
        let mut stack = CalculatorStack::new();

        for i in [10, 20, 30] {
            stack.push(CalculatorValue::Int(i)).unwrap();
        }

        stack.index(2).unwrap();

        assert_eq!(stack.pop_int().unwrap(), 10);
        assert!(stack.index(3).is_err());
    }
}
