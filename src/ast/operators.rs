use std::fmt;

/// Binary operators of the expression tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // Logical, short-circuiting
    /// `||`, `or`
    OrElse,
    /// `&&`, `and`
    AndAlso,

    // Comparison
    /// `=`, `==`
    Equal,
    /// `!=`, `<>`
    NotEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,

    // Arithmetic
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`, `mod`
    Modulo,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::OrElse => "||",
            BinaryOp::AndAlso => "&&",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
        }
    }

    /// Comparison operators produce a Boolean whatever their operand types.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LessThan
                | BinaryOp::LessThanOrEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanOrEqual
        )
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `-`
    Negate,
    /// `!`, `not`
    Not,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::Not => "!",
        }
    }
}

/// Sequence operations recognized on `IEnumerable<T>` receivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateMethod {
    Where,
    Any,
    All,
    Count,
    Min,
    Max,
    Sum,
    Average,
}

impl AggregateMethod {
    pub const ALL: [AggregateMethod; 8] = [
        AggregateMethod::Where,
        AggregateMethod::Any,
        AggregateMethod::All,
        AggregateMethod::Count,
        AggregateMethod::Min,
        AggregateMethod::Max,
        AggregateMethod::Sum,
        AggregateMethod::Average,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AggregateMethod::Where => "Where",
            AggregateMethod::Any => "Any",
            AggregateMethod::All => "All",
            AggregateMethod::Count => "Count",
            AggregateMethod::Min => "Min",
            AggregateMethod::Max => "Max",
            AggregateMethod::Sum => "Sum",
            AggregateMethod::Average => "Average",
        }
    }

    /// Looks up an aggregate by name, ignoring letter case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for AggregateMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
