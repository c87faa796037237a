//! Error codes raised by operators and by the interpreter loop.
//!
//! Operators report failure by returning an `ErrorCode`; the interpreter
//! turns it into a handler invocation looked up by the code's PostScript
//! name. The `Display` text is the diagnostic wording, [`ErrorCode::name`]
//! is the key used in the error table.

/// Coarse grouping used by propagation policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Program errors: bad operands, missing names, stack misuse.
    Definitional,
    /// Limits and exhausted resources.
    Resource,
    /// Not an error: a request to unwind a nested interpreter cleanly.
    Control,
    /// Interrupt and timeout. Unclearable.
    Asynchronous,
}

/// Every failure the engine can report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ErrorCode {
    // Definitional
    #[error("undefined name")]
    Undefined,
    #[error("operand of the wrong type")]
    TypeCheck,
    #[error("operand out of range")]
    RangeCheck,
    #[error("operand stack underflow")]
    StackUnderflow,
    #[error("operand stack overflow")]
    StackOverflow,
    #[error("execution stack overflow")]
    ExecStackOverflow,
    #[error("dictionary stack overflow")]
    DictStackOverflow,
    #[error("dictionary stack underflow")]
    DictStackUnderflow,
    #[error("undefined numeric result")]
    UndefinedResult,
    #[error("exit outside of a loop context")]
    InvalidExit,
    #[error("restore to an invalid save level")]
    InvalidRestore,
    #[error("syntax error in scanned source")]
    SyntaxError,
    #[error("mark not found")]
    UnmatchedMark,

    // Resource
    #[error("virtual memory exhausted")]
    VmError,
    #[error("implementation limit exceeded")]
    LimitCheck,
    #[error("access to a protected object")]
    InvalidAccess,
    #[error("input/output failure")]
    IoError,
    #[error("disk-backed virtual memory exhausted")]
    DiskVmError,

    // Control
    #[error("nested interpreter unwound")]
    NotAnError,

    // Asynchronous
    #[error("job interrupted")]
    Interrupt,
    #[error("job timed out")]
    Timeout,

    // Context
    #[error("interpreter entered from a foreign thread")]
    InvalidContext,
}

impl ErrorCode {
    /// PostScript error name, the key into the error table.
    pub fn name(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::TypeCheck => "typecheck",
            Self::RangeCheck => "rangecheck",
            Self::StackUnderflow => "stackunderflow",
            Self::StackOverflow => "stackoverflow",
            Self::ExecStackOverflow => "execstackoverflow",
            Self::DictStackOverflow => "dictstackoverflow",
            Self::DictStackUnderflow => "dictstackunderflow",
            Self::UndefinedResult => "undefinedresult",
            Self::InvalidExit => "invalidexit",
            Self::InvalidRestore => "invalidrestore",
            Self::SyntaxError => "syntaxerror",
            Self::UnmatchedMark => "unmatchedmark",
            // DiskVMError is reported to PostScript as VMerror.
            Self::VmError | Self::DiskVmError => "VMerror",
            Self::LimitCheck => "limitcheck",
            Self::InvalidAccess => "invalidaccess",
            Self::IoError => "ioerror",
            Self::NotAnError => "notanerror",
            Self::Interrupt => "interrupt",
            Self::Timeout => "timeout",
            Self::InvalidContext => "invalidcontext",
        }
    }

    pub fn class(self) -> ErrorClass {
        match self {
            Self::Undefined
            | Self::TypeCheck
            | Self::RangeCheck
            | Self::StackUnderflow
            | Self::StackOverflow
            | Self::ExecStackOverflow
            | Self::DictStackOverflow
            | Self::DictStackUnderflow
            | Self::UndefinedResult
            | Self::InvalidExit
            | Self::InvalidRestore
            | Self::SyntaxError
            | Self::UnmatchedMark => ErrorClass::Definitional,
            Self::VmError
            | Self::LimitCheck
            | Self::InvalidAccess
            | Self::IoError
            | Self::DiskVmError
            | Self::InvalidContext => ErrorClass::Resource,
            Self::NotAnError => ErrorClass::Control,
            Self::Interrupt | Self::Timeout => ErrorClass::Asynchronous,
        }
    }

    /// Interrupt and timeout cannot be cleared by the program; they always
    /// reach the job boundary eventually.
    #[inline]
    pub fn is_unclearable(self) -> bool {
        self.class() == ErrorClass::Asynchronous
    }

    #[inline]
    pub fn is_stack_overflow(self) -> bool {
        matches!(
            self,
            Self::StackOverflow | Self::ExecStackOverflow | Self::DictStackOverflow
        )
    }

    /// Every code, in declaration order.
    pub const ALL: [ErrorCode; 22] = [
        Self::Undefined,
        Self::TypeCheck,
        Self::RangeCheck,
        Self::StackUnderflow,
        Self::StackOverflow,
        Self::ExecStackOverflow,
        Self::DictStackOverflow,
        Self::DictStackUnderflow,
        Self::UndefinedResult,
        Self::InvalidExit,
        Self::InvalidRestore,
        Self::SyntaxError,
        Self::UnmatchedMark,
        Self::VmError,
        Self::LimitCheck,
        Self::InvalidAccess,
        Self::IoError,
        Self::DiskVmError,
        Self::NotAnError,
        Self::Interrupt,
        Self::Timeout,
        Self::InvalidContext,
    ];
}
